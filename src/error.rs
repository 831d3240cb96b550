//! Error types for the crazymatrix runtime.
//!
//! This module provides a unified error type for all operations in the
//! crate, using the `thiserror` crate for ergonomic error handling.
//!
//! Domain violations during arithmetic (division by zero, square root of a
//! negative number, ...) are *not* errors: they produce
//! [`Value::Undefined`](crate::Value::Undefined) and propagate through the
//! circuit. Everything here is structural or referential and aborts the
//! operation that caused it.

use crate::network::BlockId;
use thiserror::Error;

/// The main error type for crazymatrix operations.
#[derive(Error, Debug)]
pub enum CrazyMatrixError {
    /// Pin index outside the declared arity of a block
    #[error("Pin out of range: pin {pin}, arity {len}")]
    PinRange {
        /// The pin that was addressed
        pin: usize,
        /// Number of pins on that side of the block
        len: usize,
    },

    /// Block handle does not belong to this network
    #[error("Unknown block {0:?}")]
    UnknownBlock(BlockId),

    /// Connecting would close a cycle in the connection graph
    #[error("Connecting {from:?} into {dest:?} would create a cycle")]
    Cycle {
        /// Source of the rejected connection
        from: BlockId,
        /// Destination of the rejected connection
        dest: BlockId,
    },

    /// A connection or bond names a template id that was never added
    #[error("Unknown template id '{0}'")]
    UnknownTemplateId(String),

    /// A box-kind template names a definition that cannot be loaded
    #[error("Unresolved box reference '{0}'")]
    UnresolvedBoxReference(String),

    /// A box definition (transitively) contains itself
    #[error("Recursive box reference '{0}'")]
    RecursiveBoxReference(String),

    /// A box template declares a different arity than its definition
    #[error("Arity mismatch for '{name}': declared {declared_in} -> {declared_out}, definition has {actual_in} -> {actual_out}")]
    ArityMismatch {
        /// Referenced definition
        name: String,
        /// Inputs declared by the template
        declared_in: usize,
        /// Outputs declared by the template
        declared_out: usize,
        /// Inputs of the definition
        actual_in: usize,
        /// Outputs of the definition
        actual_out: usize,
    },

    /// Box arity and bond set do not match
    #[error("Incomplete box bonding for '{name}': {reason}")]
    IncompleteBoxBonding {
        /// Name of the box definition (or "<anonymous>")
        name: String,
        /// What is missing
        reason: String,
    },

    /// Raw definition document does not have the required structure
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// Definition parsed but failed a semantic check
    #[error("Cross-check failed: {0}")]
    CrossCheck(String),

    /// Malformed record in a definition document
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number (0 when not line oriented)
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Registry refuses to overwrite an existing name
    #[error("Name '{0}' already exists")]
    NameExists(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error occurred
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary serialization error occurred
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// A specialized `Result` type for crazymatrix operations.
pub type Result<T> = std::result::Result<T, CrazyMatrixError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CrazyMatrixError::PinRange { pin: 3, len: 2 };
        assert_eq!(err.to_string(), "Pin out of range: pin 3, arity 2");

        let err = CrazyMatrixError::IncompleteBoxBonding {
            name: "and4".into(),
            reason: "no OUT bond".into(),
        };
        assert_eq!(
            err.to_string(),
            "Incomplete box bonding for 'and4': no OUT bond"
        );
    }

    #[test]
    fn test_io_conversion() {
        fn fails() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }

        assert!(matches!(fails(), Err(CrazyMatrixError::Io(_))));
    }
}
