// src/transpiler/errors.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranspileError {
    #[error("Parse error in '{file}' at line {line}, column {column}: expected {expected}\n  | {snippet}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        expected: String,
        snippet: String,
    },

    #[error("Failed to read '{file}': {message}")]
    Unreadable { file: String, message: String },

    #[error("Transform error in '{item}' of module '{module}': {message}")]
    Transform {
        module: String,
        item: String,
        message: String,
    },

    #[error("Generation error in '{item}' of module '{module}': {message}")]
    Generation {
        module: String,
        item: String,
        message: String,
    },

    #[error("I/O error writing '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl TranspileError {
    /// Pipeline stage the error belongs to, used to prefix user-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            TranspileError::Parse { .. } | TranspileError::Unreadable { .. } => "parse",
            TranspileError::Transform { .. } => "transform",
            TranspileError::Generation { .. } => "generate",
            TranspileError::Io { .. } => "write",
        }
    }

    pub(crate) fn transform(module: &str, item: &str, message: impl Into<String>) -> Self {
        TranspileError::Transform {
            module: module.to_string(),
            item: item.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn generation(module: &str, item: &str, message: impl Into<String>) -> Self {
        TranspileError::Generation {
            module: module.to_string(),
            item: item.to_string(),
            message: message.into(),
        }
    }
}
