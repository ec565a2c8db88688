//! Stack virtual machine.
use log::trace;

use crate::{
    error::{Pl0Error, Pl0Result},
    io::IoPort,
    pcode::{opr, Instruction, OpCode},
};

/// Machine configuration.
#[derive(Debug, Clone, Copy)]
pub struct Pl0Conf {
    /// Number of stack cells available to the program.
    pub stack_limit: usize,
}

impl Default for Pl0Conf {
    fn default() -> Self {
        Self { stack_limit: 4096 }
    }
}

/// Executes P-Code against an integer stack.
///
/// Every active call owns an activation record `[SL, DL, RA, params…,
/// locals…]` on the stack. Non-local variable access walks the static links
/// with [`base`](Pl0Vm::base); returning restores the caller's frame from
/// the dynamic link and discards the whole record.
pub struct Pl0Vm<IO> {
    /// Instruction memory; read-only during execution.
    code: Vec<Instruction>,
    /// Data stack holding every activation record.
    stack: Vec<i64>,
    /// Program counter.
    p: usize,
    /// Base of the current frame.
    b: usize,
    /// Top of the stack.
    t: usize,
    io: IO,
}

impl<IO: IoPort> Pl0Vm<IO> {
    pub fn new(code: Vec<Instruction>, io: IO) -> Self {
        Self::with_conf(code, io, Pl0Conf::default())
    }

    pub fn with_conf(code: Vec<Instruction>, io: IO, conf: Pl0Conf) -> Self {
        Self {
            code,
            stack: vec![0; conf.stack_limit],
            p: 0,
            b: 0,
            t: 2,
            io,
        }
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn into_io(self) -> IO {
        self.io
    }

    /// Walk `l` static links up from the frame at `b`.
    ///
    /// The main frame stores 0 as its own static link; the code generator
    /// never produces a level difference that walks past it.
    fn base(&self, l: i32) -> usize {
        let mut b1 = self.b;
        for _ in 0..l {
            b1 = self.stack[b1] as usize;
        }
        b1
    }

    #[inline(never)]
    #[cold]
    fn fault(&self, addr: usize, cause: impl ToString) -> Pl0Error {
        Pl0Error::Runtime {
            addr,
            cause: cause.to_string(),
        }
    }

    /// Run until the main frame returns or a fault occurs.
    ///
    /// Execution starts at address 0, the jump to the program body. A return
    /// that restores a saved address of 0 halts the machine.
    pub fn run(&mut self) -> Pl0Result<()> {
        // Header of the main frame: SL, DL and RA are all zero.
        self.stack[0] = 0;
        self.stack[1] = 0;
        self.stack[2] = 0;
        self.b = 0;
        self.t = 2;
        self.p = 0;

        loop {
            let addr = self.p;
            let instr = *self
                .code
                .get(addr)
                .ok_or_else(|| self.fault(addr, "program counter out of range"))?;
            self.p += 1;

            trace!("{:04}: {:<12} B={} T={}", addr, instr.to_string(), self.b, self.t);

            let Instruction { op, l, a } = instr;
            match op {
                OpCode::Lit => self.push(addr, a)?,
                OpCode::Lod => {
                    let value = self.stack[self.base(l) + a as usize];
                    self.push(addr, value)?;
                }
                OpCode::Sto => {
                    if l == -1 {
                        // Argument staging: the target slot belongs to the
                        // frame the upcoming `Cal` will build at `T + 1`.
                        let target = self.t + a as usize;
                        if target >= self.stack.len() {
                            return Err(self.fault(addr, "stack overflow"));
                        }
                        self.stack[target] = self.stack[self.t];
                    } else {
                        let target = self.base(l) + a as usize;
                        self.stack[target] = self.stack[self.t];
                    }
                    self.t -= 1;
                }
                OpCode::Cal => {
                    if self.t + 3 >= self.stack.len() {
                        return Err(self.fault(addr, "stack overflow"));
                    }
                    self.stack[self.t + 1] = self.base(l) as i64;
                    self.stack[self.t + 2] = self.b as i64;
                    self.stack[self.t + 3] = self.p as i64;
                    self.b = self.t + 1;
                    self.p = a as usize;
                }
                OpCode::Int => {
                    let top = self.b + a as usize - 1;
                    if top >= self.stack.len() {
                        return Err(self.fault(addr, "stack overflow"));
                    }
                    self.t = top;
                }
                OpCode::Jmp => self.p = a as usize,
                OpCode::Jpc => {
                    if self.stack[self.t] == 0 {
                        self.p = a as usize;
                    }
                    self.t -= 1;
                }
                OpCode::Opr => {
                    if self.operation(addr, a)? {
                        return Ok(());
                    }
                }
                OpCode::Red => {
                    let value = self
                        .io
                        .read_int()
                        .map_err(|err| self.fault(addr, err))?;
                    let target = self.base(l) + a as usize;
                    self.stack[target] = value;
                }
                OpCode::Wrt => {
                    let value = self.stack[self.t];
                    self.io
                        .write_int(value)
                        .map_err(|err| self.fault(addr, err))?;
                    self.t -= 1;
                }
            }
        }
    }

    #[inline]
    fn push(&mut self, addr: usize, value: i64) -> Pl0Result<()> {
        self.t += 1;
        if self.t >= self.stack.len() {
            return Err(self.fault(addr, "stack overflow"));
        }
        self.stack[self.t] = value;
        Ok(())
    }

    /// Execute an `Opr` subcode. Returns `true` when the machine halted.
    fn operation(&mut self, addr: usize, subcode: i64) -> Pl0Result<bool> {
        match subcode {
            opr::RET => {
                let frame = self.b;
                let ra = self.stack[frame + 2] as usize;
                if ra == 0 {
                    // Returning from the main frame.
                    return Ok(true);
                }
                self.p = ra;
                self.b = self.stack[frame + 1] as usize;
                self.t = frame - 1;
            }
            opr::NEG => self.stack[self.t] = self.stack[self.t].wrapping_neg(),
            opr::ODD => self.stack[self.t] = (self.stack[self.t] % 2 != 0) as i64,
            _ => {
                let rhs = self.stack[self.t];
                self.t -= 1;
                let lhs = self.stack[self.t];
                self.stack[self.t] = match subcode {
                    opr::ADD => lhs.wrapping_add(rhs),
                    opr::SUB => lhs.wrapping_sub(rhs),
                    opr::MUL => lhs.wrapping_mul(rhs),
                    opr::DIV => {
                        if rhs == 0 {
                            return Err(self.fault(addr, "division by zero"));
                        }
                        lhs.wrapping_div(rhs)
                    }
                    opr::EQL => (lhs == rhs) as i64,
                    opr::NEQ => (lhs != rhs) as i64,
                    opr::LSS => (lhs < rhs) as i64,
                    opr::GEQ => (lhs >= rhs) as i64,
                    opr::GTR => (lhs > rhs) as i64,
                    opr::LEQ => (lhs <= rhs) as i64,
                    _ => return Err(self.fault(addr, "unsupported operation subcode")),
                };
            }
        }
        Ok(false)
    }
}
