pub mod error;
pub mod io;
pub mod pcode;
pub mod vm;

pub use self::{
    error::{Diagnostic, Phase, Pl0Error, Pl0Result, Severity},
    io::{IoPort, MemoryIo, StdIo},
    pcode::{Instruction, OpCode},
    vm::{Pl0Conf, Pl0Vm},
};

/// Version of *this* implementation.
pub const IMPL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use super::{
        error::{Pl0Error, Pl0Result},
        io::{IoPort, MemoryIo, StdIo},
        pcode::{Instruction, OpCode},
        vm::{Pl0Conf, Pl0Vm},
    };
}
