//! Semantic analysis and code generation.
mod analyze;
mod codegen;
mod fold;
pub mod symbol;

pub use analyze::{Analysis, Analyzer};
pub use codegen::CodeGen;
