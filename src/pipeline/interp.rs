//! Interpolation of `{{ expr }}` and `{!! expr !!}` output.

use super::RenderCx;
use crate::context::Context;
use crate::error::{Error, ErrorKind};
use crate::expr::evaluate;
use crate::utils::HtmlEscape;

/// Renders one interpolation to its output text.
///
/// Outside of strict mode a failed expression renders as the empty
/// string; sandbox violations abort the render either way.
pub(super) fn render(
    cx: &RenderCx<'_>,
    scope: &Context,
    expr: &str,
    raw: bool,
    filename: &str,
    lineno: usize,
) -> Result<String, Error> {
    let value = match evaluate(expr, &cx.eval_env(scope)) {
        Ok(value) => value,
        Err(err) if err.kind() == ErrorKind::SandboxViolation => {
            return Err(err.at(filename, lineno));
        }
        Err(err) if cx.env.strict() => return Err(err.at(filename, lineno)),
        Err(_) => return Ok(String::new()),
    };
    if value.is_undefined() || value.is_none() {
        return Ok(String::new());
    }
    let text = value.to_string();
    if raw || value.is_safe() {
        Ok(text)
    } else {
        Ok(HtmlEscape(&text).to_string())
    }
}
