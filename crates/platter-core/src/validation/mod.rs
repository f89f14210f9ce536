//! Validation errors shared by upload policies and upload targets.

/// Rejections raised before any byte of an upload reaches disk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported file format: {extension} (allowed: {})", .allowed.join(", "))]
    UnsupportedFormat {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            message: message.into(),
        }
    }
}
