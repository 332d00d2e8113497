//! A small, sandboxed expression language.
//!
//! Expressions are lexed and parsed into a closed syntax tree and then
//! evaluated against a layered scope.  The surface is deliberately tiny:
//! literals, collection displays, arithmetic, comparisons, boolean logic,
//! both ternary spellings, attribute/index traversal, calls resolved
//! against a fixed function table, and single expression lambdas.  Nothing
//! else parses, which is what makes the evaluator safe to point at
//! untrusted templates.

pub mod ast;
pub mod eval;
mod lexer;
mod parser;
mod tokens;

pub use self::ast::Expr;
pub use self::eval::{evaluate, evaluate_bool, EvalEnv, FunctionTable};
pub use self::parser::parse_expr;
