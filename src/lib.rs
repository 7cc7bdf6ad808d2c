pub mod cli;
pub mod config;
pub mod contract;
pub mod manifest;
pub mod transpiler;

// Re-export commonly used types
pub use contract::module::{Contract, Function, Module, Pattern};
pub use transpiler::{compile, compile_to, parser, codegen, CompileOptions, CompileOutput, TranspileError};
