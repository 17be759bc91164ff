//! Password change
//!
//! Opens the document with the current password, throws away its security
//! handler and installs a new standard security handler keyed on the new
//! owner/user passwords. The encryption itself is lopdf's.

use std::path::Path;

use lopdf::{Document, EncryptionState, EncryptionVersion, Permissions};

use crate::document::{ensure_file_id, open_document, open_document_bytes};
use crate::error::PdfOpsError;
use crate::safe_write::write_bytes_atomic;

/// Settings of the security handler written by [`passwd`]
#[derive(Debug, Clone)]
pub struct PasswdOptions {
    /// RC4 key length in bits, 40 or 128
    pub key_length: usize,
}

impl Default for PasswdOptions {
    fn default() -> Self {
        Self { key_length: 128 }
    }
}

impl PasswdOptions {
    pub fn validate(&self) -> Result<(), PdfOpsError> {
        match self.key_length {
            40 | 128 => Ok(()),
            other => Err(PdfOpsError::InvalidOption(format!(
                "key length must be 40 or 128 bits, got {}",
                other
            ))),
        }
    }
}

/// Change the passwords of the PDF at `input` and write it to `output`.
///
/// `password` unlocks an encrypted input and is ignored otherwise. `output`
/// may be the input itself; the file is then replaced atomically.
pub fn passwd(
    input: &Path,
    output: &Path,
    password: &str,
    new_owner_password: &str,
    new_user_password: &str,
) -> Result<(), PdfOpsError> {
    passwd_with_options(
        input,
        output,
        password,
        new_owner_password,
        new_user_password,
        &PasswdOptions::default(),
    )
}

/// [`passwd`] with an explicit security handler configuration
pub fn passwd_with_options(
    input: &Path,
    output: &Path,
    password: &str,
    new_owner_password: &str,
    new_user_password: &str,
    options: &PasswdOptions,
) -> Result<(), PdfOpsError> {
    options.validate()?;
    tracing::info!(input = %input.display(), output = %output.display(), "changing password");

    let (mut doc, original) = open_document(input, password)?;
    let encrypted = encrypt_document(
        &mut doc,
        &original,
        new_owner_password,
        new_user_password,
        options,
    )?;

    write_bytes_atomic(output, &encrypted)
}

/// In-memory password change, returning the re-encrypted file
pub fn change_password(
    bytes: &[u8],
    password: &str,
    new_owner_password: &str,
    new_user_password: &str,
    options: &PasswdOptions,
) -> Result<Vec<u8>, PdfOpsError> {
    options.validate()?;
    let mut doc = open_document_bytes(bytes, password)?;
    encrypt_document(&mut doc, bytes, new_owner_password, new_user_password, options)
}

fn encrypt_document(
    doc: &mut Document,
    original: &[u8],
    new_owner_password: &str,
    new_user_password: &str,
    options: &PasswdOptions,
) -> Result<Vec<u8>, PdfOpsError> {
    ensure_file_id(doc, original);

    // Forget the handler used to open the input; the new one replaces it
    doc.encryption_state = None;

    let version = EncryptionVersion::V2 {
        document: &*doc,
        owner_password: new_owner_password,
        user_password: new_user_password,
        key_length: options.key_length,
        permissions: Permissions::all(),
    };
    let state =
        EncryptionState::try_from(version).map_err(|e| PdfOpsError::EncryptError(e.to_string()))?;
    doc.encrypt(&state)
        .map_err(|e| PdfOpsError::EncryptError(e.to_string()))?;

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfOpsError::OperationError(format!("Save failed: {}", e)))?;

    tracing::debug!(bytes = buffer.len(), key_length = options.key_length, "document re-encrypted");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::create_test_pdf;

    #[test]
    fn test_passwd_encrypts_plain_document() {
        let pdf = create_test_pdf(3, "Plain");

        let encrypted =
            change_password(&pdf, "", "owner", "user", &PasswdOptions::default()).unwrap();

        let raw = Document::load_mem(&encrypted).unwrap();
        assert!(raw.is_encrypted());

        let doc = open_document_bytes(&encrypted, "user").unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_wrong_password_fails_to_open() {
        let pdf = create_test_pdf(1, "Locked");
        let encrypted =
            change_password(&pdf, "", "owner", "user", &PasswdOptions::default()).unwrap();

        let result = open_document_bytes(&encrypted, "not-the-password");

        assert!(matches!(result, Err(PdfOpsError::DecryptError(_))));
    }

    #[test]
    fn test_passwd_replaces_previous_passwords() {
        let pdf = create_test_pdf(2, "Twice");
        let first = change_password(&pdf, "", "o1", "u1", &PasswdOptions::default()).unwrap();

        let second = change_password(&first, "u1", "o2", "u2", &PasswdOptions::default()).unwrap();

        let doc = open_document_bytes(&second, "u2").unwrap();
        assert_eq!(doc.get_pages().len(), 2);
        assert!(open_document_bytes(&second, "u1").is_err());
    }

    #[test]
    fn test_passwd_with_40_bit_key() {
        let pdf = create_test_pdf(1, "Short");
        let options = PasswdOptions { key_length: 40 };

        let encrypted = change_password(&pdf, "", "owner", "user", &options).unwrap();

        let doc = open_document_bytes(&encrypted, "user").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        let pdf = create_test_pdf(1, "Bad");
        let options = PasswdOptions { key_length: 64 };

        let result = change_password(&pdf, "", "owner", "user", &options);

        assert!(matches!(result, Err(PdfOpsError::InvalidOption(_))));
    }

    #[test]
    fn test_passwd_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, create_test_pdf(2, "InPlace")).unwrap();

        passwd(&path, &path, "", "owner", "user").unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let doc = open_document_bytes(&bytes, "user").unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_passwd_to_separate_output_leaves_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.pdf");
        let output = dir.path().join("out.pdf");
        let pdf = create_test_pdf(1, "Separate");
        std::fs::write(&input, &pdf).unwrap();

        passwd(&input, &output, "", "owner", "user").unwrap();

        assert_eq!(std::fs::read(&input).unwrap(), pdf);
        assert!(Document::load(&output).unwrap().is_encrypted());
    }

    #[test]
    fn test_passwd_on_corrupt_input_keeps_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 not really a pdf").unwrap();

        let result = passwd(&path, &path, "", "owner", "user");

        assert!(matches!(result, Err(PdfOpsError::ParseError(_))));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 not really a pdf");
    }
}
