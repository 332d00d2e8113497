use std::fmt;

/// A token of the expression mini language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// An identifier (a leading `$` is stripped by the lexer).
    Ident(&'a str),
    /// A borrowed string literal without escapes.
    Str(&'a str),
    /// An owned string literal that required unescaping.
    String(String),
    /// An integer literal.
    Int(i64),
    /// A float literal.
    Float(f64),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `**`
    Pow,
    /// `%`
    Mod,
    /// `!` or the `not` keyword
    Not,
    /// `&&` or the `and` keyword
    And,
    /// `||` or the `or` keyword
    Or,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// the `in` keyword
    In,
    /// the `if` keyword
    If,
    /// the `else` keyword
    Else,
    /// the `lambda` keyword
    Lambda,
    /// `?`
    Question,
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// `(`
    ParenOpen,
    /// `)`
    ParenClose,
    /// `[`
    BracketOpen,
    /// `]`
    BracketClose,
    /// `{`
    BraceOpen,
    /// `}`
    BraceClose,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(i) => write!(f, "identifier {i}"),
            Token::Str(_) | Token::String(_) => write!(f, "string"),
            Token::Int(_) | Token::Float(_) => write!(f, "number"),
            Token::Plus => write!(f, "`+`"),
            Token::Minus => write!(f, "`-`"),
            Token::Mul => write!(f, "`*`"),
            Token::Div => write!(f, "`/`"),
            Token::FloorDiv => write!(f, "`//`"),
            Token::Pow => write!(f, "`**`"),
            Token::Mod => write!(f, "`%`"),
            Token::Not => write!(f, "`not`"),
            Token::And => write!(f, "`and`"),
            Token::Or => write!(f, "`or`"),
            Token::Eq => write!(f, "`==`"),
            Token::Ne => write!(f, "`!=`"),
            Token::Lt => write!(f, "`<`"),
            Token::Lte => write!(f, "`<=`"),
            Token::Gt => write!(f, "`>`"),
            Token::Gte => write!(f, "`>=`"),
            Token::In => write!(f, "`in`"),
            Token::If => write!(f, "`if`"),
            Token::Else => write!(f, "`else`"),
            Token::Lambda => write!(f, "`lambda`"),
            Token::Question => write!(f, "`?`"),
            Token::Dot => write!(f, "`.`"),
            Token::Comma => write!(f, "`,`"),
            Token::Colon => write!(f, "`:`"),
            Token::ParenOpen => write!(f, "`(`"),
            Token::ParenClose => write!(f, "`)`"),
            Token::BracketOpen => write!(f, "`[`"),
            Token::BracketClose => write!(f, "`]`"),
            Token::BraceOpen => write!(f, "`{{`"),
            Token::BraceClose => write!(f, "`}}`"),
        }
    }
}
