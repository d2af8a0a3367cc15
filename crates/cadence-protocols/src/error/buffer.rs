//! Admission log errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Buffer backend error: {0}")]
    Backend(String),

    #[error("Invalid entry id: {0}")]
    InvalidEntryId(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_entry_id() {
        let err = BufferError::InvalidEntryId("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }
}
