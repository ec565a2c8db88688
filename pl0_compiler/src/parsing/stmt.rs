//! Statement parsing.
use super::{starts_statement, Parse, Parser, SyntaxError};
use crate::{
    ast::{Stmt, VarRef},
    tokens::{Keyword, TokenKind},
};

impl Parser {
    /// `begin <statement> {; <statement>} end`
    ///
    /// Statements inside the compound are individually guarded: a bad
    /// statement is reported and skipped, and parsing resumes at the next
    /// synchronization token so later statements still get checked.
    pub(super) fn compound(&mut self) -> Parse<Stmt> {
        use Keyword as K;
        use TokenKind as T;

        self.expect_keyword(K::Begin)?;

        let mut stmts = vec![];
        loop {
            // Separators double as empty statements.
            if self.stream.match_token(&T::Semicolon) {
                continue;
            }
            if self.stream.at_keyword(K::End)
                || self.stream.at(&T::Period)
                || self.stream.at_end()
            {
                break;
            }

            if starts_statement(self.stream.peek_kind()) {
                match self.statement() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(SyntaxError) => self.recover(),
                }
            } else {
                let line = self.stream.line();
                let found = self.stream.peek_kind().clone();
                self.error(line, format!("expected a statement, found '{}'", found));
                // Skip the offender before synchronizing, so tokens in the
                // synchronization set cannot wedge the loop.
                self.stream.next_token();
                self.recover();
                continue;
            }

            if self.stream.at(&T::Semicolon)
                || self.stream.at_keyword(K::End)
                || self.stream.at(&T::Period)
                || self.stream.at_end()
            {
                continue;
            }
            let line = self.stream.line();
            let found = self.stream.peek_kind().clone();
            self.error(line, format!("expected ';' or 'end', found '{}'", found));
            self.recover();
        }

        self.expect_keyword(K::End)?;
        Ok(Stmt::Compound { stmts })
    }

    fn statement(&mut self) -> Parse<Stmt> {
        use Keyword as K;
        use TokenKind as T;

        match self.stream.peek_kind() {
            T::Ident(_) => self.assignment(),
            T::Keyword(K::Call) => self.call(),
            T::Keyword(K::Begin) => self.compound(),
            T::Keyword(K::If) => self.if_statement(),
            T::Keyword(K::While) => self.while_statement(),
            T::Keyword(K::Read) => self.read(),
            T::Keyword(K::Write) => self.write(),
            kind => {
                let line = self.stream.line();
                let found = kind.clone();
                Err(self.error(line, format!("expected a statement, found '{}'", found)))
            }
        }
    }

    /// A single subordinate statement (after `then`, `else` or `do`).
    ///
    /// The empty statement is permitted here, encoded as an empty compound.
    fn subordinate(&mut self) -> Parse<Stmt> {
        if starts_statement(self.stream.peek_kind()) {
            self.statement()
        } else {
            Ok(Stmt::Compound { stmts: vec![] })
        }
    }

    /// `<id> := <expression>`
    fn assignment(&mut self) -> Parse<Stmt> {
        let (name, line) = self.expect_ident()?;
        self.expect(TokenKind::Assign)?;
        let value = self.expression()?;
        Ok(Stmt::Assign {
            target: VarRef {
                name,
                line,
                slot: None,
            },
            value,
        })
    }

    /// `call <id> [ ( [<expression> {, <expression>}] ) ]`
    fn call(&mut self) -> Parse<Stmt> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::Call)?;
        let (name, _) = self.expect_ident()?;

        let mut args = vec![];
        if self.stream.match_token(&TokenKind::LParen) {
            if !self.stream.at(&TokenKind::RParen) {
                loop {
                    args.push(self.expression()?);
                    if !self.stream.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        Ok(Stmt::Call {
            name,
            args,
            line,
            target: None,
        })
    }

    /// `if <condition> then <statement> [else <statement>]`
    fn if_statement(&mut self) -> Parse<Stmt> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::If)?;
        let cond = self.condition()?;
        self.expect_keyword(Keyword::Then)?;
        let then = Box::new(self.subordinate()?);

        let otherwise = if self.stream.match_keyword(Keyword::Else) {
            Some(Box::new(self.subordinate()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            line,
        })
    }

    /// `while <condition> do <statement>`
    fn while_statement(&mut self) -> Parse<Stmt> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::While)?;
        let cond = self.condition()?;
        self.expect_keyword(Keyword::Do)?;
        let body = Box::new(self.subordinate()?);

        Ok(Stmt::While { cond, body, line })
    }

    /// `read ( <id> {, <id>} )`
    fn read(&mut self) -> Parse<Stmt> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::Read)?;
        self.expect(TokenKind::LParen)?;

        let mut targets = vec![];
        loop {
            let (name, line) = self.expect_ident()?;
            targets.push(VarRef {
                name,
                line,
                slot: None,
            });
            if !self.stream.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Stmt::Read { targets, line })
    }

    /// `write ( <expression> {, <expression>} )`
    fn write(&mut self) -> Parse<Stmt> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::Write)?;
        self.expect(TokenKind::LParen)?;

        let mut exprs = vec![];
        loop {
            exprs.push(self.expression()?);
            if !self.stream.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        Ok(Stmt::Write { exprs, line })
    }
}
