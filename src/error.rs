use thiserror::Error;

use crate::codegen::error::{BytecodeError, ConstPoolError};
use crate::verify::VerifyError;

/// Result type for bean definition generation
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for bean definition generation
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A writer operation was called in the wrong order or twice
    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },

    #[error("Unresolvable type '{name}': {message}")]
    UnresolvableType { name: String, message: String },

    /// The element model handed to the writer is inconsistent
    #[error("Malformed model: {message}")]
    MalformedModel { message: String },

    #[error("Bytecode error: {0}")]
    Bytecode(#[from] BytecodeError),

    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Invalid value for option '{key}': {message}")]
    Config { key: String, message: String },
}

impl Error {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation { message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedModel { message: message.into() }
    }

    pub fn unresolvable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnresolvableType { name: name.into(), message: message.into() }
    }

    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { key: key.into(), message: message.into() }
    }
}

impl From<ConstPoolError> for Error {
    fn from(err: ConstPoolError) -> Self {
        Self::Bytecode(BytecodeError::ConstPool(err))
    }
}
