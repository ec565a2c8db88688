//! Result, errors and diagnostics.
use std::{
    fmt::{self, Display, Formatter},
    io,
};

pub type Pl0Result<T> = std::result::Result<T, Pl0Error>;

#[derive(Debug)]
pub enum Pl0Error {
    /// VM error during the interpreter loop, carrying the address of the
    /// faulting instruction and a short cause.
    Runtime { addr: usize, cause: String },
    Io(io::Error),
}

impl Display for Pl0Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Runtime { addr, cause } => {
                write!(f, "[Runtime Error] Address {}: {}", addr, cause)
            }
            Self::Io(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Pl0Error {}

impl From<io::Error> for Pl0Error {
    fn from(err: io::Error) -> Self {
        Pl0Error::Io(err)
    }
}

/// Pipeline stage that raised a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexical,
    Syntax,
    Semantic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One compile-time finding, tied to a source line.
///
/// Each stage appends to a shared list; the pipeline moves past code
/// generation only when no `Error`-severity entry exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub phase: Phase,
    pub severity: Severity,
    pub line: u32,
    pub message: String,
}

impl Diagnostic {
    pub fn error(phase: Phase, line: u32, message: impl ToString) -> Self {
        Self {
            phase,
            severity: Severity::Error,
            line,
            message: message.to_string(),
        }
    }

    pub fn warning(phase: Phase, line: u32, message: impl ToString) -> Self {
        Self {
            phase,
            severity: Severity::Warning,
            line,
            message: message.to_string(),
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Lexical => write!(f, "Lexical"),
            Self::Syntax => write!(f, "Syntax"),
            Self::Semantic => write!(f, "Semantic"),
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Error => write!(f, "Error"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "[{} {}] Line {}: {}",
            self.phase, self.severity, self.line, self.message
        )
    }
}
