use crate::value::Value;

/// The closed set of expression nodes the evaluator accepts.
///
/// Anything the parser cannot express here cannot be evaluated; the
/// sandbox is an allow-list by construction.
#[derive(Debug, Clone)]
pub enum Expr {
    Const(Value),
    Var(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
    UnaryOp(UnaryOpKind, Box<Expr>),
    BinOp(BinOpKind, Box<Expr>, Box<Expr>),
    /// `then if cond else otherwise` / `cond ? then : otherwise`
    IfExpr {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    GetAttr(Box<Expr>, String),
    GetItem(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    /// `lambda a, b: body` — single expression functions for
    /// filter/map style calls.
    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    And,
    Or,
}
