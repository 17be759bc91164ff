use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfOpsError {
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Failed to decrypt PDF: {0}")]
    DecryptError(String),

    #[error("Failed to encrypt PDF: {0}")]
    EncryptError(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Coarse failure classes, one per process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Input could not be opened, parsed or decrypted
    Open,
    /// Output could not be written
    Write,
    /// Caller supplied an invalid option
    InvalidInput,
    /// The PDF engine failed while transforming the document
    Operation,
}

impl PdfOpsError {
    pub fn class(&self) -> FailureClass {
        match self {
            PdfOpsError::ReadError { .. }
            | PdfOpsError::ParseError(_)
            | PdfOpsError::DecryptError(_) => FailureClass::Open,
            PdfOpsError::WriteError { .. } => FailureClass::Write,
            PdfOpsError::InvalidOption(_) => FailureClass::InvalidInput,
            PdfOpsError::EncryptError(_) | PdfOpsError::OperationError(_) => {
                FailureClass::Operation
            }
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PdfOpsError::WriteError {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_password_is_open_failure() {
        let err = PdfOpsError::DecryptError("incorrect password".into());
        assert_eq!(err.class(), FailureClass::Open);
    }

    #[test]
    fn test_write_error_names_path() {
        let err = PdfOpsError::write(
            "/tmp/out.pdf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.class(), FailureClass::Write);
        assert!(err.to_string().contains("/tmp/out.pdf"));
    }
}
