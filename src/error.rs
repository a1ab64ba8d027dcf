//! Error types for element generation.
//!
//! Generators report recoverable failures through [`EmitterError`]. Malformed
//! graphs (rank mismatches, missing operand generators) are caller bugs and
//! panic instead.

use std::fmt;

/// Errors that can occur while building or invoking an element generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// The opcode, element type or distribution is not supported.
    Unimplemented {
        /// Human-readable error message.
        message: String,
    },
    /// The instruction asks for something its types cannot express.
    InvalidArgument {
        /// Human-readable error message.
        message: String,
    },
}

impl fmt::Display for EmitterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitterError::Unimplemented { message } => write!(f, "Unimplemented: {}", message),
            EmitterError::InvalidArgument { message } => {
                write!(f, "Invalid argument: {}", message)
            }
        }
    }
}

impl std::error::Error for EmitterError {}

/// Result type alias for element generation.
pub type Result<T> = std::result::Result<T, EmitterError>;

/// Creates an unimplemented error.
pub fn unimplemented(message: impl Into<String>) -> EmitterError {
    EmitterError::Unimplemented {
        message: message.into(),
    }
}

/// Creates an invalid argument error.
pub fn invalid_argument(message: impl Into<String>) -> EmitterError {
    EmitterError::InvalidArgument {
        message: message.into(),
    }
}

impl EmitterError {
    /// Returns `true` for [`EmitterError::Unimplemented`].
    pub fn is_unimplemented(&self) -> bool {
        matches!(self, EmitterError::Unimplemented { .. })
    }

    /// Returns `true` for [`EmitterError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, EmitterError::InvalidArgument { .. })
    }

    /// The message without the category prefix `Display` adds.
    pub fn message(&self) -> &str {
        match self {
            EmitterError::Unimplemented { message } | EmitterError::InvalidArgument { message } => {
                message
            }
        }
    }
}
