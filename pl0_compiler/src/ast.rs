//! Abstract syntax tree.
//!
//! Nodes carry the source line they start on for diagnostics. Use sites
//! additionally carry an `Option`-typed resolution slot which the semantic
//! analyzer fills in place; the code generator reads only those decorations
//! and the tree structure, never the symbol table.
use smol_str::SmolStr;

/// Identity of a procedure declaration, assigned during analysis and used
/// by the code generator to patch call sites with entry addresses.
pub type ProcId = usize;

#[derive(Debug)]
pub struct Program {
    pub name: SmolStr,
    pub line: u32,
    pub block: Block,
}

#[derive(Debug)]
pub struct Block {
    pub consts: Vec<ConstDecl>,
    pub vars: Vec<VarDecl>,
    pub procs: Vec<Procedure>,
    /// The `begin … end` body.
    pub body: Stmt,
}

#[derive(Debug)]
pub struct ConstDecl {
    pub name: SmolStr,
    pub value: i64,
    pub line: u32,
}

#[derive(Debug)]
pub struct VarDecl {
    pub name: SmolStr,
    pub line: u32,
}

#[derive(Debug)]
pub struct Procedure {
    pub name: SmolStr,
    pub params: Vec<Param>,
    pub block: Block,
    pub line: u32,
    /// Filled during analysis.
    pub id: Option<ProcId>,
}

/// Value parameter of a procedure, bound like a local variable at the
/// start of the frame.
#[derive(Debug)]
pub struct Param {
    pub name: SmolStr,
    pub line: u32,
}

#[derive(Debug)]
pub enum Stmt {
    Assign {
        target: VarRef,
        value: Expr,
    },
    Call {
        name: SmolStr,
        args: Vec<Expr>,
        line: u32,
        /// Filled during analysis.
        target: Option<ProcRef>,
    },
    If {
        cond: Cond,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        line: u32,
    },
    While {
        cond: Cond,
        body: Box<Stmt>,
        line: u32,
    },
    /// Statement sequence; the empty statement is an empty sequence.
    Compound { stmts: Vec<Stmt> },
    Read {
        targets: Vec<VarRef>,
        line: u32,
    },
    Write {
        exprs: Vec<Expr>,
        line: u32,
    },
}

#[derive(Debug)]
pub enum Cond {
    Odd {
        expr: Expr,
        line: u32,
    },
    Rel {
        op: RelOp,
        lhs: Expr,
        rhs: Expr,
        line: u32,
    },
}

#[derive(Debug)]
pub enum Expr {
    Num {
        value: i64,
        line: u32,
    },
    /// Reference to a constant or a variable.
    Name(NameRef),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        line: u32,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::Num { line, .. }
            | Expr::Unary { line, .. }
            | Expr::Binary { line, .. } => *line,
            Expr::Name(name) => name.line,
        }
    }
}

/// A name used where only a variable is legal (assignment and read targets).
#[derive(Debug)]
pub struct VarRef {
    pub name: SmolStr,
    pub line: u32,
    /// Filled during analysis.
    pub slot: Option<Slot>,
}

/// A name used in expression position.
#[derive(Debug)]
pub struct NameRef {
    pub name: SmolStr,
    pub line: u32,
    /// Filled during analysis.
    pub target: Option<NameTarget>,
}

/// Resolved storage of a variable: level difference between the use site
/// and the defining frame, and the offset within that frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub level: u32,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTarget {
    /// Constant reference, replaced by its value.
    Const(i64),
    Var(Slot),
}

/// Resolved call target: the procedure's identity and the level difference
/// between the call site and the declaring block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcRef {
    pub id: ProcId,
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
