//! Error types for archive access

use thiserror::Error;

use crate::node::NodeKind;

/// Result type alias
pub type Result<T> = core::result::Result<T, ArchiveError>;

/// Errors raised while reading, writing or navigating an archive tree
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Access pattern incompatible with the node's current kind
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// Numeric value outside the range a strict extraction allows
    #[error("Value {value} out of range [{min}, {max}]")]
    OutOfRange { value: f64, min: f64, max: f64 },

    /// Fixed-size vector field with the wrong element count
    #[error("Length mismatch: expected {expected} elements, found {found}")]
    Length { expected: usize, found: usize },

    /// Required field absent from an object node
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Text (JSON) archive could not be parsed or written
    #[error("Text archive error: {0}")]
    Text(#[from] serde_json::Error),

    /// Packed (binary) archive could not be decoded or encoded
    #[error("Packed archive error: {0}")]
    Packed(#[from] bincode::Error),
}

impl ArchiveError {
    /// Build a type mismatch from the required and the actual kind
    pub fn type_mismatch(expected: NodeKind, found: NodeKind) -> Self {
        Self::TypeMismatch {
            expected: expected.name(),
            found: found.name(),
        }
    }

    /// Check if this is a type mismatch
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_names_both_kinds() {
        let err = ArchiveError::type_mismatch(NodeKind::String, NodeKind::Integer);
        let msg = err.to_string();
        assert!(msg.contains("string"));
        assert!(msg.contains("integer"));
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn test_missing_field_display() {
        let err = ArchiveError::MissingField("diffuse".into());
        assert!(!err.is_type_mismatch());
        assert!(err.to_string().contains("diffuse"));
    }
}
