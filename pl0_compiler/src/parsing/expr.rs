//! Condition and expression parsing.
//!
//! Unary sign binds to a term; `*` and `/` bind tighter than `+` and `-`;
//! relational operators and `odd` appear only in condition position. All
//! binary operators associate to the left.
use super::{Parse, Parser};
use crate::{
    ast::{BinOp, Cond, Expr, NameRef, RelOp, UnaryOp},
    tokens::{Keyword, TokenKind},
};

impl Parser {
    /// `odd <expression>` or `<expression> <relop> <expression>`
    pub(super) fn condition(&mut self) -> Parse<Cond> {
        let line = self.stream.line();

        if self.stream.match_keyword(Keyword::Odd) {
            let expr = self.expression()?;
            return Ok(Cond::Odd { expr, line });
        }

        let lhs = self.expression()?;
        let op = match self.rel_op() {
            Some(op) => op,
            None => {
                let line = self.stream.line();
                let found = self.stream.peek_kind().clone();
                return Err(self.error(
                    line,
                    format!("expected a relational operator, found '{}'", found),
                ));
            }
        };
        let rhs = self.expression()?;

        Ok(Cond::Rel { op, lhs, rhs, line })
    }

    fn rel_op(&mut self) -> Option<RelOp> {
        use TokenKind as T;

        let op = match self.stream.peek_kind() {
            T::Eq => RelOp::Eq,
            T::Ne => RelOp::Ne,
            T::Lt => RelOp::Lt,
            T::Le => RelOp::Le,
            T::Gt => RelOp::Gt,
            T::Ge => RelOp::Ge,
            _ => return None,
        };
        self.stream.next_token();
        Some(op)
    }

    /// `[+|-] <term> {(+|-) <term>}`
    pub(super) fn expression(&mut self) -> Parse<Expr> {
        use TokenKind as T;

        let line = self.stream.line();
        let mut node = if self.stream.match_token(&T::Minus) {
            Expr::Unary {
                op: UnaryOp::Minus,
                expr: Box::new(self.term()?),
                line,
            }
        } else if self.stream.match_token(&T::Plus) {
            Expr::Unary {
                op: UnaryOp::Plus,
                expr: Box::new(self.term()?),
                line,
            }
        } else {
            self.term()?
        };

        loop {
            let op = if self.stream.match_token(&T::Plus) {
                BinOp::Add
            } else if self.stream.match_token(&T::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let rhs = self.term()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line,
            };
        }

        Ok(node)
    }

    /// `<factor> {(* | /) <factor>}`
    fn term(&mut self) -> Parse<Expr> {
        use TokenKind as T;

        let line = self.stream.line();
        let mut node = self.factor()?;

        loop {
            let op = if self.stream.match_token(&T::Star) {
                BinOp::Mul
            } else if self.stream.match_token(&T::Slash) {
                BinOp::Div
            } else {
                break;
            };
            let rhs = self.factor()?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
                line,
            };
        }

        Ok(node)
    }

    /// `<id> | <number> | ( <expression> )`
    fn factor(&mut self) -> Parse<Expr> {
        use TokenKind as T;

        let line = self.stream.line();
        match self.stream.peek_kind() {
            T::Ident(name) => {
                let name = name.clone();
                self.stream.next_token();
                Ok(Expr::Name(NameRef {
                    name,
                    line,
                    target: None,
                }))
            }
            T::Number(value) => {
                let value = *value;
                self.stream.next_token();
                Ok(Expr::Num { value, line })
            }
            T::LParen => {
                self.stream.next_token();
                let inner = self.expression()?;
                self.expect(T::RParen)?;
                Ok(inner)
            }
            found => {
                let found = found.clone();
                Err(self.error(line, format!("expected an expression, found '{}'", found)))
            }
        }
    }
}
