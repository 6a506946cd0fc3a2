use thiserror::Error;

/// A value fell outside the domain declared by its wrapper type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{entity} {reason}")]
pub struct InvalidData {
    /// Name of the value type that rejected the input.
    pub entity: &'static str,
    /// Human-readable explanation.
    pub reason: String,
}

impl InvalidData {
    pub fn new(entity: &'static str, reason: impl Into<String>) -> Self {
        Self {
            entity,
            reason: reason.into(),
        }
    }
}

/// A due string or recurrence descriptor could not be understood.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Due string is empty")]
    Empty,

    #[error("Could not understand due date \"{0}\"")]
    Unrecognized(String),

    #[error("Invalid recurrence rule: {0}")]
    Rule(String),

    #[error("Invalid recurrence anchor: {0}")]
    Anchor(String),

    #[error(transparent)]
    Invalid(#[from] InvalidData),
}

/// Errors raised by task lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("Validation error: {0}")]
    Validation(#[from] InvalidData),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Task \"{0}\" is already done")]
    AlreadyDone(String),

    #[error("Task \"{0}\" not found")]
    NotFound(String),

    #[error("Category \"{0}\" not found")]
    CategoryNotFound(String),
}
