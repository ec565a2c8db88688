//! P-Code generation.
//!
//! Linearizes the decorated tree into an append-and-patch instruction
//! buffer. Forward control transfers are emitted with a placeholder target
//! and patched once the destination address is known; call sites that refer
//! to a procedure whose body has not been emitted yet are collected and
//! rewritten when its entry address lands.
//!
//! Runs only after an error-free analysis: every use site the generator
//! touches carries its resolution.
use log::{debug, trace};

use pl0::pcode::{opr, Instruction, OpCode};

use crate::ast::{
    BinOp, Block, Cond, Expr, NameTarget, ProcId, Program, RelOp, Slot, Stmt, UnaryOp, VarRef,
};

pub struct CodeGen {
    code: Vec<Instruction>,
    /// Entry address per procedure, filled as bodies are emitted.
    entries: Vec<Option<usize>>,
    /// Call sites waiting for their procedure's entry address.
    pending: Vec<(usize, ProcId)>,
}

impl CodeGen {
    /// Generate the whole program.
    ///
    /// `proc_count` is the number of procedures the analyzer assigned ids
    /// to; it sizes the entry table.
    pub fn generate(program: &Program, proc_count: usize) -> Vec<Instruction> {
        let mut gen = CodeGen {
            code: vec![],
            entries: vec![None; proc_count],
            pending: vec![],
        };

        gen.block(&program.block, 0, None);

        debug_assert!(gen.pending.is_empty(), "unpatched call sites remain");
        debug!(
            "generated {} instructions for program '{}'",
            gen.code.len(),
            program.name
        );
        gen.code
    }

    fn emit(&mut self, op: OpCode, l: i32, a: i64) -> usize {
        let instr = Instruction::new(op, l, a);
        trace!("{:04}: {}", self.code.len(), instr);
        self.code.push(instr);
        self.code.len() - 1
    }

    /// Address of the next instruction to be emitted.
    #[inline]
    fn here(&self) -> usize {
        self.code.len()
    }

    /// Backpatch the target field of a control transfer.
    fn patch(&mut self, index: usize, addr: usize) {
        debug_assert!(matches!(
            self.code[index].op,
            OpCode::Jmp | OpCode::Jpc | OpCode::Cal
        ));
        self.code[index].a = addr as i64;
    }

    /// Block prelude, inner procedures, body and return.
    ///
    /// The leading jump skips the inner procedures to the body; for the
    /// outermost block it is instruction 0, where execution starts. A
    /// procedure's recorded entry is the address of its `INT`, so calls
    /// land directly on the body.
    fn block(&mut self, block: &Block, params: usize, id: Option<ProcId>) {
        let jump = self.emit(OpCode::Jmp, 0, 0);

        for proc in &block.procs {
            let pid = proc.id.expect("procedure numbered during analysis");
            self.block(&proc.block, proc.params.len(), Some(pid));
        }

        let entry = self.here();
        self.patch(jump, entry);
        if let Some(id) = id {
            self.entries[id] = Some(entry);
            // Rewrite call sites emitted before this entry was known:
            // direct recursion never lands here, but an inner procedure
            // calling its enclosing one does.
            let mut sites = vec![];
            self.pending.retain(|&(site, pid)| {
                if pid == id {
                    sites.push(site);
                    false
                } else {
                    true
                }
            });
            for site in sites {
                self.patch(site, entry);
            }
        }

        let frame = 3 + params + block.vars.len();
        self.emit(OpCode::Int, 0, frame as i64);
        self.statement(&block.body);
        self.emit(OpCode::Opr, 0, opr::RET);
    }

    fn statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value } => {
                self.expression(value);
                let slot = resolved(target);
                self.emit(OpCode::Sto, slot.level as i32, slot.offset as i64);
            }
            Stmt::Call { args, target, .. } => {
                // Arguments are staged into the callee's future frame: the
                // i-th value lands in what becomes offset 3+i once `CAL`
                // builds the header below it.
                for (i, arg) in args.iter().enumerate() {
                    self.expression(arg);
                    self.emit(OpCode::Sto, -1, (3 + i) as i64);
                }

                let proc = target.expect("call target resolved during analysis");
                match self.entries[proc.id] {
                    Some(entry) => {
                        self.emit(OpCode::Cal, proc.level as i32, entry as i64);
                    }
                    None => {
                        let site = self.emit(OpCode::Cal, proc.level as i32, 0);
                        self.pending.push((site, proc.id));
                    }
                }
            }
            Stmt::If {
                cond,
                then,
                otherwise,
                ..
            } => {
                self.condition(cond);
                let skip = self.emit(OpCode::Jpc, 0, 0);
                self.statement(then);
                match otherwise {
                    None => {
                        let after = self.here();
                        self.patch(skip, after);
                    }
                    Some(else_branch) => {
                        let exit = self.emit(OpCode::Jmp, 0, 0);
                        let else_entry = self.here();
                        self.patch(skip, else_entry);
                        self.statement(else_branch);
                        let after = self.here();
                        self.patch(exit, after);
                    }
                }
            }
            Stmt::While { cond, body, .. } => {
                let start = self.here();
                self.condition(cond);
                let exit = self.emit(OpCode::Jpc, 0, 0);
                self.statement(body);
                self.emit(OpCode::Jmp, 0, start as i64);
                let after = self.here();
                self.patch(exit, after);
            }
            Stmt::Compound { stmts } => {
                for stmt in stmts {
                    self.statement(stmt);
                }
            }
            Stmt::Read { targets, .. } => {
                for target in targets {
                    let slot = resolved(target);
                    self.emit(OpCode::Red, slot.level as i32, slot.offset as i64);
                }
            }
            Stmt::Write { exprs, .. } => {
                for expr in exprs {
                    self.expression(expr);
                    self.emit(OpCode::Wrt, 0, 0);
                }
            }
        }
    }

    fn condition(&mut self, cond: &Cond) {
        match cond {
            Cond::Odd { expr, .. } => {
                self.expression(expr);
                self.emit(OpCode::Opr, 0, opr::ODD);
            }
            Cond::Rel { op, lhs, rhs, .. } => {
                self.expression(lhs);
                self.expression(rhs);
                let subcode = match op {
                    RelOp::Eq => opr::EQL,
                    RelOp::Ne => opr::NEQ,
                    RelOp::Lt => opr::LSS,
                    RelOp::Le => opr::LEQ,
                    RelOp::Gt => opr::GTR,
                    RelOp::Ge => opr::GEQ,
                };
                self.emit(OpCode::Opr, 0, subcode);
            }
        }
    }

    /// Post-order expression walk.
    fn expression(&mut self, expr: &Expr) {
        match expr {
            Expr::Num { value, .. } => {
                self.emit(OpCode::Lit, 0, *value);
            }
            Expr::Name(name) => {
                match name.target.expect("name resolved during analysis") {
                    NameTarget::Const(value) => self.emit(OpCode::Lit, 0, value),
                    NameTarget::Var(slot) => {
                        self.emit(OpCode::Lod, slot.level as i32, slot.offset as i64)
                    }
                };
            }
            Expr::Unary { op, expr, .. } => {
                self.expression(expr);
                if *op == UnaryOp::Minus {
                    self.emit(OpCode::Opr, 0, opr::NEG);
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.expression(lhs);
                self.expression(rhs);
                let subcode = match op {
                    BinOp::Add => opr::ADD,
                    BinOp::Sub => opr::SUB,
                    BinOp::Mul => opr::MUL,
                    BinOp::Div => opr::DIV,
                };
                self.emit(OpCode::Opr, 0, subcode);
            }
        }
    }
}

fn resolved(target: &VarRef) -> Slot {
    target.slot.expect("variable resolved during analysis")
}
