//! Semantic analysis.
//!
//! A single `&mut` walk over the tree that resolves every use site against
//! the scope stack, folds constant subexpressions, and records diagnostics.
//! Successful resolution decorates the node with everything the code
//! generator needs — level difference and offset for storage, procedure
//! identity for calls — so the symbol table can be dropped afterwards.
use log::debug;

use pl0::error::{Diagnostic, Phase};

use crate::{
    ast::{
        Block, Cond, Expr, NameTarget, ProcId, ProcRef, Procedure, Program, Slot, Stmt, VarRef,
    },
    compile::{
        fold,
        symbol::{SymbolKind, SymbolTable},
    },
};

/// What the analyzer hands to the rest of the pipeline.
pub struct Analysis {
    /// Number of procedures declared; sizes the code generator's entry
    /// table.
    pub proc_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Analyzer {
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    next_proc: ProcId,
}

impl Analyzer {
    /// Walk the program, decorating it in place.
    pub fn analyze(program: &mut Program) -> Analysis {
        let mut analyzer = Analyzer {
            symbols: SymbolTable::new(),
            diagnostics: vec![],
            next_proc: 0,
        };

        // The main block is level 0.
        analyzer.symbols.enter_scope();
        analyzer.block(&mut program.block);
        analyzer.finish_scope();

        let errors = analyzer.diagnostics.iter().filter(|d| d.is_error()).count();
        debug!(
            "analyzed program '{}': {} procedure(s), {} error(s)",
            program.name, analyzer.next_proc, errors
        );

        Analysis {
            proc_count: analyzer.next_proc,
            diagnostics: analyzer.diagnostics,
        }
    }

    fn error(&mut self, line: u32, message: impl ToString) {
        self.diagnostics
            .push(Diagnostic::error(Phase::Semantic, line, message));
    }

    fn warning(&mut self, line: u32, message: impl ToString) {
        self.diagnostics
            .push(Diagnostic::warning(Phase::Semantic, line, message));
    }

    // ------------------------------------------------------------------------
    // Declarations

    fn block(&mut self, block: &mut Block) {
        for decl in &block.consts {
            self.shadow_check("constant", &decl.name, decl.line);
            if let Err(previous) =
                self.symbols
                    .declare_const(decl.name.clone(), decl.value, decl.line)
            {
                self.duplicate(&decl.name, decl.line, previous);
            }
        }

        for decl in &block.vars {
            self.shadow_check("variable", &decl.name, decl.line);
            if let Err(previous) = self.symbols.declare_var(decl.name.clone(), decl.line, false) {
                self.duplicate(&decl.name, decl.line, previous);
            }
        }

        // Procedures are declared and analyzed one after another: a body may
        // call the procedure itself or a previously declared sibling, but
        // never a later one.
        for proc in &mut block.procs {
            self.shadow_check("procedure", &proc.name, proc.line);
            let id = self.next_proc;
            self.next_proc += 1;
            proc.id = Some(id);
            if let Err(previous) =
                self.symbols
                    .declare_proc(proc.name.clone(), id, proc.params.len(), proc.line)
            {
                self.duplicate(&proc.name, proc.line, previous);
            }
            self.procedure(proc);
        }

        self.statement(&mut block.body);
    }

    fn procedure(&mut self, proc: &mut Procedure) {
        self.symbols.enter_scope();

        // Parameters occupy the first frame slots and arrive assigned.
        for param in &proc.params {
            self.shadow_check("parameter", &param.name, param.line);
            if let Err(previous) = self.symbols.declare_var(param.name.clone(), param.line, true) {
                self.duplicate(&param.name, param.line, previous);
            }
        }

        self.block(&mut proc.block);
        self.finish_scope();
    }

    /// Close the innermost scope, reporting variables that were never read
    /// or written.
    fn finish_scope(&mut self) {
        for symbol in self.symbols.exit_scope() {
            if matches!(symbol.kind, SymbolKind::Var { .. }) && !symbol.referenced {
                self.warning(
                    symbol.line,
                    format!("variable '{}' is never used", symbol.name),
                );
            }
        }
    }

    fn shadow_check(&mut self, what: &str, name: &str, line: u32) {
        if self.symbols.is_shadowing(name) {
            self.warning(
                line,
                format!("{} '{}' shadows a declaration from an enclosing scope", what, name),
            );
        }
    }

    fn duplicate(&mut self, name: &str, line: u32, previous: u32) {
        self.error(
            line,
            format!(
                "'{}' is already declared in this scope (line {})",
                name, previous
            ),
        );
    }

    // ------------------------------------------------------------------------
    // Use sites

    /// Resolve a use site, marking the symbol referenced.
    ///
    /// Returns the symbol's kind, the level difference to the use site, and
    /// whether an assignment has been seen yet.
    fn lookup(&mut self, name: &str) -> Option<(SymbolKind, usize, bool)> {
        let (symbol, diff) = self.symbols.resolve(name)?;
        symbol.referenced = true;
        Some((symbol.kind.clone(), diff, symbol.assigned))
    }

    fn mark_assigned(&mut self, name: &str) {
        if let Some((symbol, _)) = self.symbols.resolve(name) {
            symbol.assigned = true;
        }
    }

    fn undeclared(&mut self, name: &str, line: u32) {
        let mut message = format!("Undeclared identifier '{}'.", name);
        if let Some(candidate) = self.symbols.suggest(name) {
            message.push_str(&format!(" Did you mean '{}'?", candidate));
        }
        self.error(line, message);
    }

    // ------------------------------------------------------------------------
    // Statements

    fn statement(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Assign { target, value } => {
                // Right-hand side first: in `x := x + 1` the read of `x`
                // happens before this assignment counts.
                self.expression(value);
                self.write_target(target, "assign to");
            }
            Stmt::Call {
                name,
                args,
                line,
                target,
            } => {
                for arg in args.iter_mut() {
                    self.expression(arg);
                }
                match self.lookup(name) {
                    None => self.undeclared(name, *line),
                    Some((SymbolKind::Proc { id, params }, diff, _)) => {
                        if params != args.len() {
                            self.error(
                                *line,
                                format!(
                                    "procedure '{}' expects {} argument(s), found {}",
                                    name,
                                    params,
                                    args.len()
                                ),
                            );
                        }
                        *target = Some(ProcRef {
                            id,
                            level: diff as u32,
                        });
                    }
                    Some((kind, _, _)) => {
                        self.error(
                            *line,
                            format!("cannot call {} '{}'", kind.name(), name),
                        );
                    }
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                line,
            } => {
                let truth = self.condition(cond);
                if truth == Some(false) {
                    self.warning(*line, "'if' condition is always false; the branch never runs");
                }
                self.statement(then);
                if let Some(else_branch) = otherwise {
                    if truth == Some(true) {
                        self.warning(
                            *line,
                            "'if' condition is always true; the 'else' branch never runs",
                        );
                    }
                    self.statement(else_branch);
                }
            }
            Stmt::While { cond, body, line } => {
                let truth = self.condition(cond);
                match truth {
                    Some(true) => {
                        self.warning(*line, "'while' condition is always true; the loop never ends")
                    }
                    Some(false) => self.warning(
                        *line,
                        "'while' condition is always false; the loop body never runs",
                    ),
                    None => {}
                }
                self.statement(body);
            }
            Stmt::Compound { stmts } => {
                for stmt in stmts {
                    self.statement(stmt);
                }
            }
            Stmt::Read { targets, .. } => {
                for target in targets {
                    self.write_target(target, "read into");
                }
            }
            Stmt::Write { exprs, .. } => {
                for expr in exprs {
                    self.expression(expr);
                }
            }
        }
    }

    /// Resolve a name that is written to: an assignment or read target.
    fn write_target(&mut self, target: &mut VarRef, action: &str) {
        match self.lookup(&target.name) {
            None => self.undeclared(&target.name, target.line),
            Some((SymbolKind::Var { offset }, diff, _)) => {
                target.slot = Some(Slot {
                    level: diff as u32,
                    offset,
                });
                self.mark_assigned(&target.name);
            }
            Some((kind, _, _)) => {
                self.error(
                    target.line,
                    format!("cannot {} {} '{}'", action, kind.name(), target.name),
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Expressions and conditions

    /// Resolve and fold one full expression.
    fn expression(&mut self, expr: &mut Expr) {
        self.resolve_expr(expr);
        fold::fold_expr(expr, &mut self.diagnostics);
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Num { .. } => {}
            Expr::Name(name) => match self.lookup(&name.name) {
                None => self.undeclared(&name.name, name.line),
                Some((SymbolKind::Const { value }, _, _)) => {
                    name.target = Some(NameTarget::Const(value));
                }
                Some((SymbolKind::Var { offset }, diff, assigned)) => {
                    name.target = Some(NameTarget::Var(Slot {
                        level: diff as u32,
                        offset,
                    }));
                    // Outer variables may be assigned by code that has not
                    // been analyzed yet, so only the current scope is
                    // checked.
                    if diff == 0 && !assigned {
                        self.warning(
                            name.line,
                            format!("variable '{}' may be used before it is assigned", name.name),
                        );
                    }
                }
                Some((kind @ SymbolKind::Proc { .. }, _, _)) => {
                    self.error(
                        name.line,
                        format!("{} '{}' cannot appear in an expression", kind.name(), name.name),
                    );
                }
            },
            Expr::Unary { expr, .. } => self.resolve_expr(expr),
            Expr::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
        }
    }

    fn condition(&mut self, cond: &mut Cond) -> Option<bool> {
        match cond {
            Cond::Odd { expr, .. } => self.resolve_expr(expr),
            Cond::Rel { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
        }
        fold::fold_cond(cond, &mut self.diagnostics)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{lex::Lexer, parsing::Parser};

    fn analyze(source: &str) -> (Program, Vec<Diagnostic>) {
        let (tokens, lex_diags) = Lexer::tokenize(source);
        assert!(lex_diags.is_empty(), "unexpected: {:?}", lex_diags);
        let (mut program, parse_diags) = Parser::parse(tokens);
        assert!(parse_diags.is_empty(), "unexpected: {:?}", parse_diags);
        let analysis = Analyzer::analyze(&mut program);
        (program, analysis.diagnostics)
    }

    fn errors(diagnostics: &[Diagnostic]) -> Vec<&Diagnostic> {
        diagnostics.iter().filter(|d| d.is_error()).collect()
    }

    #[test]
    fn test_undeclared_with_suggestion() {
        let (_, diagnostics) = analyze(
            "var counter;\n\
             begin countr := 1 end.",
        );
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].message,
            "Undeclared identifier 'countr'. Did you mean 'counter'?"
        );
    }

    #[test]
    fn test_undeclared_without_candidate() {
        let (_, diagnostics) = analyze("var alpha;\nbegin alpha := zz end.");
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Undeclared identifier 'zz'.");
    }

    #[test]
    fn test_duplicate_declaration() {
        let (_, diagnostics) = analyze("var x, x;\nbegin x := 1 end.");
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("already declared"));
    }

    #[test]
    fn test_shadowing_is_a_warning_not_an_error() {
        let (_, diagnostics) = analyze(
            "var g;\n\
             procedure p;\n\
             var g;\n\
             begin g := 1 end;\n\
             begin g := 0; call p end.",
        );
        assert!(errors(&diagnostics).is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("shadows a declaration")));
    }

    #[test]
    fn test_assign_to_const_rejected() {
        let (_, diagnostics) = analyze("const c = 1;\nbegin c := 2 end.");
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot assign to constant 'c'"));
    }

    #[test]
    fn test_call_of_variable_rejected() {
        let (_, diagnostics) = analyze("var x;\nbegin x := 1; call x end.");
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot call variable 'x'"));
    }

    #[test]
    fn test_procedure_in_expression_rejected() {
        let (_, diagnostics) = analyze(
            "var x;\n\
             procedure p; begin x := 1 end;\n\
             begin x := p + 1 end.",
        );
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("cannot appear in an expression"));
    }

    #[test]
    fn test_arity_mismatch() {
        let (_, diagnostics) = analyze(
            "var f;\n\
             procedure fac(n); begin f := n end;\n\
             begin call fac(1, 2) end.",
        );
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .message
            .contains("expects 1 argument(s), found 2"));
    }

    #[test]
    fn test_later_sibling_not_visible() {
        // `first` calls `second`, which is declared after it.
        let (_, diagnostics) = analyze(
            "var x;\n\
             procedure first; begin call second end;\n\
             procedure second; begin x := 1 end;\n\
             begin call first end.",
        );
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Undeclared identifier 'second'"));
    }

    #[test]
    fn test_direct_recursion_allowed() {
        let (_, diagnostics) = analyze(
            "var f;\n\
             procedure fac(n);\n\
             begin if n = 0 then f := 1 else begin call fac(n - 1); f := n * f end end;\n\
             begin call fac(5) end.",
        );
        assert!(errors(&diagnostics).is_empty(), "got {:?}", diagnostics);
    }

    #[test]
    fn test_division_by_folded_zero() {
        let (_, diagnostics) = analyze("var a;\nbegin a := 10 / (5 - 5); write(a) end.");
        let errors = errors(&diagnostics);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 2);
        assert!(errors[0].message.contains("division by zero"));
    }

    #[test]
    fn test_division_by_folded_const_zero() {
        let (_, diagnostics) = analyze("const zero = 0;\nvar a;\nbegin a := 1 / zero; write(a) end.");
        assert_eq!(errors(&diagnostics).len(), 1);
    }

    #[test]
    fn test_dead_branch_warnings() {
        let (_, diagnostics) = analyze(
            "var x;\n\
             begin\n\
               x := 0;\n\
               if 1 = 2 then x := 1;\n\
               if 1 = 1 then x := 2 else x := 3;\n\
               while 1 = 1 do x := 4\n\
             end.",
        );
        assert!(errors(&diagnostics).is_empty());
        assert!(diagnostics.iter().any(|d| d.line == 4
            && d.message.contains("always false")));
        assert!(diagnostics.iter().any(|d| d.line == 5
            && d.message.contains("'else' branch never runs")));
        assert!(diagnostics.iter().any(|d| d.line == 6
            && d.message.contains("loop never ends")));
    }

    #[test]
    fn test_unused_variable_warning() {
        let (_, diagnostics) = analyze("var used, unused;\nbegin used := 1 end.");
        assert!(errors(&diagnostics).is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| d.message == "variable 'unused' is never used"));
        assert!(!diagnostics.iter().any(|d| d.message.contains("'used'")));
    }

    #[test]
    fn test_use_before_assignment_warning() {
        let (_, diagnostics) = analyze("var x, y;\nbegin y := x; x := 1 end.");
        assert!(errors(&diagnostics).is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.contains("'x' may be used before it is assigned")));
    }

    #[test]
    fn test_folding_rewrites_expression() {
        use crate::ast::{Expr, Stmt};

        let (program, diagnostics) = analyze("var x;\nbegin x := 2 + 3 * 4 end.");
        assert!(errors(&diagnostics).is_empty());
        let Stmt::Compound { stmts } = &program.block.body else {
            panic!("body must be a compound");
        };
        let Stmt::Assign { value, .. } = &stmts[0] else {
            panic!("expected an assignment");
        };
        assert!(matches!(value, Expr::Num { value: 14, .. }));
    }

    #[test]
    fn test_decorations_filled() {
        use crate::ast::{NameTarget, Stmt};

        let (program, _) = analyze(
            "var a;\n\
             procedure p;\n\
               procedure q; begin a := a + 1 end;\n\
             begin call q end;\n\
             begin a := 0; call p; write(a) end.",
        );

        // Inside q, `a` is two levels away from its declaration.
        let q = &program.block.procs[0].block.procs[0];
        let Stmt::Compound { stmts } = &q.block.body else {
            panic!("q body must be a compound");
        };
        let Stmt::Assign { target, value } = &stmts[0] else {
            panic!("expected an assignment");
        };
        let slot = target.slot.expect("assignment target resolved");
        assert_eq!(slot.level, 2);
        assert_eq!(slot.offset, 3);
        let Expr::Binary { lhs, .. } = value else {
            panic!("rhs must stay a sum");
        };
        let Expr::Name(name) = &**lhs else {
            panic!("lhs of the sum must be a name");
        };
        assert_eq!(
            name.target,
            Some(NameTarget::Var(Slot { level: 2, offset: 3 }))
        );
    }
}
