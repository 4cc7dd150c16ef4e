use thiserror::Error;

/// Every failure that can happen while evaluating a statement. Break,
/// continue and return are not errors; they travel as interpreter signals.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("[line {line}] Undeclared variable '{name}'")]
    UndeclaredName { line: i32, name: String },

    #[error("[line {line}] Can't redeclare the variable '{name}'")]
    DuplicateName { line: i32, name: String },

    #[error("[line {line}] {msg}")]
    TypeError { line: i32, msg: String },

    #[error("[line {line}] Array index {index} out of bounds (length {length})")]
    IndexOutOfBounds { line: i32, index: f64, length: usize },

    #[error("[line {line}] Expression '{expr}' is not a reference")]
    NotAReference { line: i32, expr: String },

    #[error("[line {line}] '{value}' is not a function or a class")]
    NotCallable { line: i32, value: String },

    #[error("[line {line}] Invalid number of arguments (expected {expected}, received {received})")]
    ArityMismatch { line: i32, expected: usize, received: usize },

    #[error("[line {line}] Undefined member '{name}'")]
    UndefinedMember { line: i32, name: String },

    #[error("[line {line}] {keyword} called with a loop depth of {depth}")]
    ControlFlowError { line: i32, keyword: String, depth: usize },

    #[error("[line {line}] Module '{path}' panicked")]
    ModulePanic { line: i32, path: String },

    #[error("[line {line}] Can't read module '{path}': {msg}")]
    IoError { line: i32, path: String, msg: String },

    #[error("[line {line}] Module '{path}' is already being loaded")]
    CircularModule { line: i32, path: String },

    #[error("[line {line}] {msg}")]
    InvalidTarget { line: i32, msg: String },

    #[error("[line {line}] Reference chain is too deep")]
    ReferenceDepth { line: i32 },

    #[error("[line {line}] Stack overflow")]
    StackOverflow { line: i32 },
}

impl RuntimeError {
    pub fn line(&self) -> i32 {
        match self {
            Self::UndeclaredName { line, .. }
            | Self::DuplicateName { line, .. }
            | Self::TypeError { line, .. }
            | Self::IndexOutOfBounds { line, .. }
            | Self::NotAReference { line, .. }
            | Self::NotCallable { line, .. }
            | Self::ArityMismatch { line, .. }
            | Self::UndefinedMember { line, .. }
            | Self::ControlFlowError { line, .. }
            | Self::ModulePanic { line, .. }
            | Self::IoError { line, .. }
            | Self::CircularModule { line, .. }
            | Self::InvalidTarget { line, .. }
            | Self::ReferenceDepth { line }
            | Self::StackOverflow { line } => *line,
        }
    }

    pub fn type_error(line: i32, msg: impl Into<String>) -> Self {
        Self::TypeError { line, msg: msg.into() }
    }
}
