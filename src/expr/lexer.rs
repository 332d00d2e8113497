use crate::error::{Error, ErrorKind};
use crate::expr::tokens::Token;

fn syntax_error(detail: String) -> Error {
    Error::new(ErrorKind::MalformedTemplate, detail)
}

fn lex_ident(rest: &str) -> (&str, usize) {
    let end = rest
        .char_indices()
        .find(|&(_, c)| !c.is_alphanumeric() && c != '_')
        .map_or(rest.len(), |(idx, _)| idx);
    (&rest[..end], end)
}

fn lex_string(rest: &str, quote: char) -> Result<(Token<'_>, usize), Error> {
    let mut escaped = false;
    let mut has_escapes = false;
    for (idx, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                has_escapes = true;
            }
            c if c == quote => {
                let body = &rest[1..idx];
                let token = if has_escapes {
                    Token::String(unescape_string(body))
                } else {
                    Token::Str(body)
                };
                return Ok((token, idx + 1));
            }
            _ => {}
        }
    }
    Err(syntax_error("unexpected end of string literal".into()))
}

fn unescape_string(s: &str) -> String {
    let mut rv = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => rv.push('\n'),
                Some('t') => rv.push('\t'),
                Some('r') => rv.push('\r'),
                Some('0') => rv.push('\0'),
                Some(other) => rv.push(other),
                None => rv.push('\\'),
            }
        } else {
            rv.push(c);
        }
    }
    rv
}

fn lex_number(rest: &str) -> Result<(Token<'_>, usize), Error> {
    let mut end = 0;
    let mut is_float = false;
    let bytes = rest.as_bytes();
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            // a dot is part of the number only when a digit follows, so
            // that `1.upper` style attribute access keeps working
            b'.' if !is_float && matches!(bytes.get(end + 1), Some(b'0'..=b'9')) => {
                is_float = true;
                end += 1;
            }
            b'_' => end += 1,
            _ => break,
        }
    }
    let raw = rest[..end].replace('_', "");
    if is_float {
        raw.parse::<f64>()
            .map(|f| (Token::Float(f), end))
            .map_err(|_| syntax_error(format!("invalid float literal {raw:?}")))
    } else {
        raw.parse::<i64>()
            .map(|i| (Token::Int(i), end))
            .map_err(|_| syntax_error(format!("invalid integer literal {raw:?}")))
    }
}

/// Tokenizes an expression into tokens with byte offsets.
///
/// A `$` immediately in front of an identifier is accepted and stripped
/// (Blade variable style).  Word operators (`and`, `or`, `not`, `in`) are
/// turned into their operator tokens; `not in` is folded by the parser.
pub fn tokenize(source: &str) -> Result<Vec<(Token<'_>, usize)>, Error> {
    let mut rv = Vec::new();
    let mut offset = 0;

    while offset < source.len() {
        let rest = &source[offset..];
        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };

        if c.is_whitespace() {
            offset += c.len_utf8();
            continue;
        }

        let (token, consumed) = match c {
            '$' => {
                let after = &rest[1..];
                match after.chars().next() {
                    Some(next) if next.is_alphabetic() || next == '_' => {
                        let (ident, len) = lex_ident(after);
                        (Token::Ident(ident), len + 1)
                    }
                    _ => {
                        return Err(syntax_error(format!(
                            "unexpected `$` at offset {offset} in expression"
                        )))
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let (ident, len) = lex_ident(rest);
                let token = match ident {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "lambda" => Token::Lambda,
                    other => Token::Ident(other),
                };
                (token, len)
            }
            '0'..='9' => ok!(lex_number(rest)),
            '\'' | '"' => ok!(lex_string(rest, c)),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '*' if rest.starts_with("**") => (Token::Pow, 2),
            '*' => (Token::Mul, 1),
            '/' if rest.starts_with("//") => (Token::FloorDiv, 2),
            '/' => (Token::Div, 1),
            '%' => (Token::Mod, 1),
            '=' if rest.starts_with("==") => (Token::Eq, 2),
            '!' if rest.starts_with("!=") => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '<' if rest.starts_with("<=") => (Token::Lte, 2),
            '<' => (Token::Lt, 1),
            '>' if rest.starts_with(">=") => (Token::Gte, 2),
            '>' => (Token::Gt, 1),
            '&' if rest.starts_with("&&") => (Token::And, 2),
            '|' if rest.starts_with("||") => (Token::Or, 2),
            '?' => (Token::Question, 1),
            '.' => (Token::Dot, 1),
            ',' => (Token::Comma, 1),
            ':' => (Token::Colon, 1),
            '(' => (Token::ParenOpen, 1),
            ')' => (Token::ParenClose, 1),
            '[' => (Token::BracketOpen, 1),
            ']' => (Token::BracketClose, 1),
            '{' => (Token::BraceOpen, 1),
            '}' => (Token::BraceClose, 1),
            other => {
                return Err(syntax_error(format!(
                    "unexpected character {other:?} in expression"
                )))
            }
        };
        rv.push((token, offset));
        offset += consumed;
    }

    Ok(rv)
}
