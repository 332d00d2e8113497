use crate::error::{Error, ErrorKind};
use crate::expr::ast::{BinOpKind, Expr, UnaryOpKind};
use crate::expr::lexer::tokenize;
use crate::expr::tokens::Token;
use crate::value::Value;

/// Parses a single expression into its syntax form.
pub fn parse_expr(source: &str) -> Result<Expr, Error> {
    let tokens = ok!(tokenize(source));
    let mut parser = Parser {
        tokens,
        pos: 0,
        source,
    };
    let expr = ok!(parser.parse());
    if let Some((token, offset)) = parser.peek_with_offset() {
        return Err(parser.syntax_error(format!(
            "unexpected {token} at offset {offset}, expected end of expression"
        )));
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: Vec<(Token<'a>, usize)>,
    pos: usize,
    source: &'a str,
}

macro_rules! binop {
    ($func:ident, $next:ident, { $($tok:pat => $op:expr),* $(,)? }) => {
        fn $func(&mut self) -> Result<Expr, Error> {
            let mut left = ok!(self.$next());
            loop {
                let op = match self.peek() {
                    $(Some($tok) => $op,)*
                    _ => break,
                };
                self.pos += 1;
                let right = ok!(self.$next());
                left = Expr::BinOp(op, Box::new(left), Box::new(right));
            }
            Ok(left)
        }
    };
}

impl<'a> Parser<'a> {
    fn syntax_error(&self, detail: String) -> Error {
        Error::new(
            ErrorKind::MalformedTemplate,
            format!("{} (in expression {:?})", detail, self.source),
        )
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek2(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + 1).map(|(token, _)| token)
    }

    fn peek_with_offset(&self) -> Option<(&Token<'a>, usize)> {
        self.tokens.get(self.pos).map(|(token, offset)| (token, *offset))
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let rv = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        if rv.is_some() {
            self.pos += 1;
        }
        rv
    }

    fn skip(&mut self, token: &Token<'_>) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token<'_>) -> Result<(), Error> {
        match self.next() {
            Some(ref found) if found == token => Ok(()),
            Some(found) => Err(self.syntax_error(format!("expected {token}, found {found}"))),
            None => Err(self.syntax_error(format!("expected {token}, found end of expression"))),
        }
    }

    fn parse(&mut self) -> Result<Expr, Error> {
        if self.skip(&Token::Lambda) {
            return self.parse_lambda();
        }
        let expr = ok!(self.parse_or());
        match self.peek() {
            // python style: `a if cond else b`
            Some(Token::If) => {
                self.pos += 1;
                let cond = ok!(self.parse_or());
                let otherwise = if self.skip(&Token::Else) {
                    Some(Box::new(ok!(self.parse())))
                } else {
                    None
                };
                Ok(Expr::IfExpr {
                    cond: Box::new(cond),
                    then: Box::new(expr),
                    otherwise,
                })
            }
            // c style: `cond ? a : b`
            Some(Token::Question) => {
                self.pos += 1;
                let then = ok!(self.parse());
                ok!(self.expect(&Token::Colon));
                let otherwise = ok!(self.parse());
                Ok(Expr::IfExpr {
                    cond: Box::new(expr),
                    then: Box::new(then),
                    otherwise: Some(Box::new(otherwise)),
                })
            }
            _ => Ok(expr),
        }
    }

    fn parse_lambda(&mut self) -> Result<Expr, Error> {
        let mut params = Vec::new();
        loop {
            match self.next() {
                Some(Token::Ident(name)) => params.push(name.to_string()),
                Some(Token::Colon) if params.is_empty() => break,
                Some(other) => {
                    return Err(
                        self.syntax_error(format!("expected parameter name, found {other}"))
                    )
                }
                None => return Err(self.syntax_error("unterminated lambda".into())),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::Colon) => break,
                _ => return Err(self.syntax_error("expected `,` or `:` in lambda".into())),
            }
        }
        let body = ok!(self.parse());
        Ok(Expr::Lambda {
            params,
            body: Box::new(body),
        })
    }

    binop!(parse_or, parse_and, { Token::Or => BinOpKind::Or });
    binop!(parse_and, parse_not, { Token::And => BinOpKind::And });

    fn parse_not(&mut self) -> Result<Expr, Error> {
        if self.skip(&Token::Not) {
            let expr = ok!(self.parse_not());
            return Ok(Expr::UnaryOp(UnaryOpKind::Not, Box::new(expr)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, Error> {
        let mut left = ok!(self.parse_math1());
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinOpKind::Eq,
                Some(Token::Ne) => BinOpKind::Ne,
                Some(Token::Lt) => BinOpKind::Lt,
                Some(Token::Lte) => BinOpKind::Lte,
                Some(Token::Gt) => BinOpKind::Gt,
                Some(Token::Gte) => BinOpKind::Gte,
                Some(Token::In) => BinOpKind::In,
                Some(Token::Not) if self.peek2() == Some(&Token::In) => {
                    self.pos += 1;
                    BinOpKind::NotIn
                }
                _ => break,
            };
            self.pos += 1;
            let right = ok!(self.parse_math1());
            left = Expr::BinOp(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    binop!(parse_math1, parse_math2, {
        Token::Plus => BinOpKind::Add,
        Token::Minus => BinOpKind::Sub,
    });
    binop!(parse_math2, parse_pow, {
        Token::Mul => BinOpKind::Mul,
        Token::Div => BinOpKind::Div,
        Token::FloorDiv => BinOpKind::FloorDiv,
        Token::Mod => BinOpKind::Mod,
    });

    fn parse_pow(&mut self) -> Result<Expr, Error> {
        let left = ok!(self.parse_unary());
        if self.skip(&Token::Pow) {
            // right associative
            let right = ok!(self.parse_pow());
            return Ok(Expr::BinOp(
                BinOpKind::Pow,
                Box::new(left),
                Box::new(right),
            ));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let expr = ok!(self.parse_unary());
                Ok(Expr::UnaryOp(UnaryOpKind::Neg, Box::new(expr)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let mut expr = ok!(self.parse_primary());
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next() {
                        Some(Token::Ident(name)) => {
                            expr = Expr::GetAttr(Box::new(expr), name.to_string());
                        }
                        _ => {
                            return Err(
                                self.syntax_error("expected attribute name after `.`".into())
                            )
                        }
                    }
                }
                Some(Token::BracketOpen) => {
                    self.pos += 1;
                    let index = ok!(self.parse());
                    ok!(self.expect(&Token::BracketClose));
                    expr = Expr::GetItem(Box::new(expr), Box::new(index));
                }
                Some(Token::ParenOpen) => {
                    self.pos += 1;
                    let args = ok!(self.parse_list_until(&Token::ParenClose));
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_list_until(&mut self, close: &Token<'_>) -> Result<Vec<Expr>, Error> {
        let mut items = Vec::new();
        loop {
            if self.skip(close) {
                break;
            }
            if !items.is_empty() {
                ok!(self.expect(&Token::Comma));
                // allow trailing commas
                if self.skip(close) {
                    break;
                }
            }
            items.push(ok!(self.parse()));
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        match self.next() {
            Some(Token::Ident(ident)) => Ok(match ident {
                "true" | "True" => Expr::Const(Value::from(true)),
                "false" | "False" => Expr::Const(Value::from(false)),
                "none" | "None" | "null" => Expr::Const(Value::from(())),
                other => Expr::Var(other.to_string()),
            }),
            Some(Token::Str(s)) => Ok(Expr::Const(Value::from(s))),
            Some(Token::String(s)) => Ok(Expr::Const(Value::from(s))),
            Some(Token::Int(i)) => Ok(Expr::Const(Value::from(i))),
            Some(Token::Float(f)) => Ok(Expr::Const(Value::from(f))),
            Some(Token::ParenOpen) => {
                if self.skip(&Token::ParenClose) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = ok!(self.parse());
                if self.skip(&Token::Comma) {
                    let mut items = vec![first];
                    items.extend(ok!(self.parse_list_until(&Token::ParenClose)));
                    Ok(Expr::Tuple(items))
                } else {
                    ok!(self.expect(&Token::ParenClose));
                    Ok(first)
                }
            }
            Some(Token::BracketOpen) => {
                let items = ok!(self.parse_list_until(&Token::BracketClose));
                Ok(Expr::List(items))
            }
            Some(Token::BraceOpen) => self.parse_map_or_set(),
            Some(other) => Err(self.syntax_error(format!("unexpected {other}"))),
            None => Err(self.syntax_error("unexpected end of expression".into())),
        }
    }

    fn parse_map_or_set(&mut self) -> Result<Expr, Error> {
        if self.skip(&Token::BraceClose) {
            return Ok(Expr::Map(Vec::new()));
        }
        let first = ok!(self.parse());
        if self.skip(&Token::Colon) {
            // mapping literal
            let mut pairs = vec![(first, ok!(self.parse()))];
            while self.skip(&Token::Comma) {
                if self.peek() == Some(&Token::BraceClose) {
                    break;
                }
                let key = ok!(self.parse());
                ok!(self.expect(&Token::Colon));
                pairs.push((key, ok!(self.parse())));
            }
            ok!(self.expect(&Token::BraceClose));
            Ok(Expr::Map(pairs))
        } else if self.skip(&Token::Comma) {
            let mut items = vec![first];
            items.extend(ok!(self.parse_list_until(&Token::BraceClose)));
            Ok(Expr::Set(items))
        } else {
            ok!(self.expect(&Token::BraceClose));
            Ok(Expr::Set(vec![first]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        // 1 + 2 * 3 parses as 1 + (2 * 3)
        match parse_expr("1 + 2 * 3").unwrap() {
            Expr::BinOp(BinOpKind::Add, _, right) => {
                assert!(matches!(*right, Expr::BinOp(BinOpKind::Mul, ..)));
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn test_ternary_forms() {
        assert!(matches!(
            parse_expr("a if b else c").unwrap(),
            Expr::IfExpr { .. }
        ));
        assert!(matches!(
            parse_expr("b ? a : c").unwrap(),
            Expr::IfExpr { .. }
        ));
    }

    #[test]
    fn test_collections() {
        assert!(matches!(parse_expr("[1, 2, 3]").unwrap(), Expr::List(_)));
        assert!(matches!(parse_expr("{'a': 1}").unwrap(), Expr::Map(_)));
        assert!(matches!(parse_expr("{1, 2}").unwrap(), Expr::Set(_)));
        assert!(matches!(parse_expr("(1, 2)").unwrap(), Expr::Tuple(_)));
    }

    #[test]
    fn test_not_in() {
        assert!(matches!(
            parse_expr("a not in b").unwrap(),
            Expr::BinOp(BinOpKind::NotIn, ..)
        ));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(parse_expr("1 1").is_err());
        assert!(parse_expr("(1").is_err());
    }

    #[test]
    fn test_lambda() {
        match parse_expr("lambda x: x + 1").unwrap() {
            Expr::Lambda { params, .. } => assert_eq!(params, vec!["x"]),
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
