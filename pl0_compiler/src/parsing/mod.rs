//! Recursive-descent parser with panic-mode recovery.
//!
//! Each statement- and block-level production is wrapped in an error guard.
//! On a mismatch the guard records a `(line, expected, found)` diagnostic,
//! discards tokens until the current token belongs to the level's
//! synchronization set, and resumes. The parser therefore always returns a
//! `Program`, possibly partial; callers decide what the diagnostics mean
//! for the rest of the pipeline.
mod expr;
mod stmt;

use log::debug;
use smol_str::SmolStr;

use pl0::error::{Diagnostic, Phase};

use crate::{
    ast::{Block, ConstDecl, Param, Procedure, Program, Stmt, VarDecl},
    token_stream::TokenStream,
    tokens::{Keyword, Token, TokenKind},
};

/// Marker for a reported syntax error.
///
/// The diagnostic is recorded at the point of failure; the marker only
/// unwinds to the closest recovery guard.
pub(crate) struct SyntaxError;

pub(crate) type Parse<T> = Result<T, SyntaxError>;

/// Synchronization set shared by the statement and block guards.
///
/// The sets are cumulative: the tokens that can follow or start a statement,
/// the declaration keywords of the enclosing block, and the program
/// terminators.
#[rustfmt::skip]
fn in_sync_set(kind: &TokenKind) -> bool {
    use Keyword as K;
    use TokenKind as T;
    matches!(
        kind,
        T::Semicolon | T::Ident(_) | T::Period | T::Eof
            | T::Keyword(
                K::End | K::If | K::While | K::Begin | K::Call | K::Read | K::Write
                | K::Else | K::Const | K::Var | K::Procedure
            )
    )
}

/// Tokens that may begin a statement.
fn starts_statement(kind: &TokenKind) -> bool {
    use Keyword as K;
    use TokenKind as T;
    matches!(
        kind,
        T::Ident(_) | T::Keyword(K::Call | K::Begin | K::If | K::While | K::Read | K::Write)
    )
}

pub struct Parser {
    stream: TokenStream,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    /// Parse a whole program.
    pub fn parse(tokens: Vec<Token>) -> (Program, Vec<Diagnostic>) {
        let mut parser = Parser {
            stream: TokenStream::new(tokens),
            diagnostics: vec![],
        };
        let program = parser.program();
        (program, parser.diagnostics)
    }

    // ------------------------------------------------------------------------
    // Diagnostics and recovery

    fn error(&mut self, line: u32, message: impl ToString) -> SyntaxError {
        self.diagnostics
            .push(Diagnostic::error(Phase::Syntax, line, message));
        SyntaxError
    }

    /// Panic mode: discard tokens until the synchronization set is reached.
    fn recover(&mut self) {
        let mut skipped = 0usize;
        while !in_sync_set(self.stream.peek_kind()) {
            self.stream.next_token();
            skipped += 1;
        }
        if skipped > 0 {
            debug!(
                "recovered after skipping {} tokens, resuming at '{}' on line {}",
                skipped,
                self.stream.peek_kind(),
                self.stream.line()
            );
        }
    }

    /// Consume the expected token or report `(line, expected, found)`.
    fn expect(&mut self, expected: TokenKind) -> Parse<Token> {
        if self.stream.at(&expected) {
            Ok(self.stream.next_token())
        } else {
            let line = self.stream.line();
            let found = self.stream.peek_kind().clone();
            Err(self.error(line, format!("expected '{}', found '{}'", expected, found)))
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Parse<Token> {
        self.expect(TokenKind::Keyword(keyword))
    }

    fn expect_ident(&mut self) -> Parse<(SmolStr, u32)> {
        let line = self.stream.line();
        match self.stream.peek_kind() {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.stream.next_token();
                Ok((name, line))
            }
            found => {
                let found = found.clone();
                Err(self.error(line, format!("expected an identifier, found '{}'", found)))
            }
        }
    }

    fn expect_number(&mut self) -> Parse<(i64, u32)> {
        let line = self.stream.line();
        match self.stream.peek_kind() {
            TokenKind::Number(value) => {
                let value = *value;
                self.stream.next_token();
                Ok((value, line))
            }
            found => {
                let found = found.clone();
                Err(self.error(line, format!("expected a number, found '{}'", found)))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Program and block structure

    /// `[ program <id> ; ] <block> .`
    fn program(&mut self) -> Program {
        let line = self.stream.line();

        // The header is optional; unnamed programs run as `main`.
        let name = if self.stream.at_keyword(Keyword::Program) {
            match self.header() {
                Ok(name) => name,
                Err(SyntaxError) => {
                    self.recover();
                    SmolStr::new("main")
                }
            }
        } else {
            SmolStr::new("main")
        };

        let block = self.block();

        if self.stream.match_token(&TokenKind::Period) {
            if !self.stream.at_end() {
                let line = self.stream.line();
                self.error(line, "unexpected text after the final '.'");
            }
        } else {
            let line = self.stream.line();
            let found = self.stream.peek_kind().clone();
            self.error(line, format!("expected '.', found '{}'", found));
        }

        Program { name, line, block }
    }

    fn header(&mut self) -> Parse<SmolStr> {
        self.expect_keyword(Keyword::Program)?;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(name)
    }

    /// `[const-decl] [var-decl] {proc-decl} begin … end`
    ///
    /// Out-of-order declaration sections are parsed anyway so later errors
    /// still surface, but the ordering violation is reported.
    fn block(&mut self) -> Block {
        let mut consts = vec![];
        let mut vars = vec![];
        let mut procs = vec![];

        // 0 = nothing seen, 1 = const, 2 = var, 3 = procedures.
        let mut stage = 0u8;

        loop {
            if self.stream.at_keyword(Keyword::Const) {
                if stage > 1 {
                    let line = self.stream.line();
                    self.error(
                        line,
                        "'const' declarations must precede 'var' and 'procedure' declarations",
                    );
                }
                if self.const_decl(&mut consts).is_err() {
                    self.recover();
                }
                stage = stage.max(1);
            } else if self.stream.at_keyword(Keyword::Var) {
                if stage > 2 {
                    let line = self.stream.line();
                    self.error(line, "'var' declarations must precede 'procedure' declarations");
                }
                if self.var_decl(&mut vars).is_err() {
                    self.recover();
                }
                stage = stage.max(2);
            } else if self.stream.at_keyword(Keyword::Procedure) {
                match self.proc_decl() {
                    Ok(proc) => procs.push(proc),
                    Err(SyntaxError) => self.recover(),
                }
                stage = 3;
            } else {
                break;
            }
        }

        let body = if self.stream.at_keyword(Keyword::Begin) {
            match self.compound() {
                Ok(body) => body,
                Err(SyntaxError) => {
                    self.recover();
                    Stmt::Compound { stmts: vec![] }
                }
            }
        } else {
            let line = self.stream.line();
            let found = self.stream.peek_kind().clone();
            self.error(line, format!("expected 'begin', found '{}'", found));
            self.recover();
            // A late `begin` may still be sitting at the recovery point.
            if self.stream.at_keyword(Keyword::Begin) {
                self.compound().unwrap_or(Stmt::Compound { stmts: vec![] })
            } else {
                Stmt::Compound { stmts: vec![] }
            }
        };

        Block {
            consts,
            vars,
            procs,
            body,
        }
    }

    /// `const <id> (= | :=) <number> {, <id> (= | :=) <number>} ;`
    fn const_decl(&mut self, out: &mut Vec<ConstDecl>) -> Parse<()> {
        self.expect_keyword(Keyword::Const)?;
        loop {
            let (name, line) = self.expect_ident()?;
            // Both spellings of the binding operator are accepted.
            if !self.stream.match_token(&TokenKind::Assign) {
                self.expect(TokenKind::Eq)?;
            }
            let (value, _) = self.expect_number()?;
            out.push(ConstDecl { name, value, line });

            if !self.stream.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `var <id> {, <id>} ;`
    fn var_decl(&mut self, out: &mut Vec<VarDecl>) -> Parse<()> {
        self.expect_keyword(Keyword::Var)?;
        loop {
            let (name, line) = self.expect_ident()?;
            out.push(VarDecl { name, line });

            if !self.stream.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    /// `procedure <id> [ ( [<id> {, <id>}] ) ] ; <block> ;`
    ///
    /// The parameter list is optional; a bare name declares a parameterless
    /// procedure.
    fn proc_decl(&mut self) -> Parse<Procedure> {
        let line = self.stream.line();
        self.expect_keyword(Keyword::Procedure)?;
        let (name, _) = self.expect_ident()?;

        let mut params = vec![];
        if self.stream.match_token(&TokenKind::LParen) {
            if !self.stream.at(&TokenKind::RParen) {
                loop {
                    let (name, line) = self.expect_ident()?;
                    params.push(Param { name, line });
                    if !self.stream.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Semicolon)?;

        let block = self.block();
        self.expect(TokenKind::Semicolon)?;

        Ok(Procedure {
            name,
            params,
            block,
            line,
            id: None,
        })
    }
}
