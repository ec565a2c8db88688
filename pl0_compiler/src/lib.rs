//! PL/0 front end.
//!
//! Source text goes in one end; P-Code for the [`pl0`] virtual machine
//! comes out the other, together with every diagnostic the stages raised
//! along the way. The stages run strictly in sequence — lexing, parsing,
//! semantic analysis, code generation — and each later stage works with
//! whatever its predecessor could salvage, so a single compile reports as
//! many findings as possible. Code generation alone is withheld once any
//! error-severity diagnostic exists.
pub mod ast;
pub mod compile;
pub mod lex;
pub mod parsing;
pub mod token_stream;
pub mod tokens;

use log::debug;

use pl0::{error::Diagnostic, pcode::Instruction};

/// Outcome of a compilation.
pub struct CompileResult {
    /// Generated code; present only when no error was raised.
    pub code: Option<Vec<Instruction>>,
    /// All diagnostics in source order, warnings included.
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Run the whole pipeline over one source text.
pub fn compile(source: &str) -> CompileResult {
    let (tokens, mut diagnostics) = lex::Lexer::tokenize(source);
    debug!("lexed {} tokens", tokens.len());

    let (mut program, parse_diags) = parsing::Parser::parse(tokens);
    diagnostics.extend(parse_diags);

    let analysis = compile::Analyzer::analyze(&mut program);
    diagnostics.extend(analysis.diagnostics);

    // Report in source order; the sort is stable so findings on the same
    // line keep the order the stages raised them in.
    diagnostics.sort_by_key(|d| d.line);

    let code = if diagnostics.iter().any(|d| d.is_error()) {
        None
    } else {
        Some(compile::CodeGen::generate(&program, analysis.proc_count))
    };

    CompileResult { code, diagnostics }
}
