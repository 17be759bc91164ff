//! Opening (and unlocking) input documents
//!
//! All parsing and security-handler work is done by lopdf. This module only
//! wires the password through and maps failures into [`PdfOpsError`].

use std::path::Path;

use lopdf::{Document, Object, StringFormat};
use sha2::{Digest, Sha256};

use crate::error::PdfOpsError;

/// Read and parse the PDF at `path`, decrypting it with `password` if needed.
///
/// The password is ignored for unencrypted input. An empty password is valid
/// and is what lopdf already tries while loading.
pub fn open_document(path: &Path, password: &str) -> Result<(Document, Vec<u8>), PdfOpsError> {
    let bytes = std::fs::read(path).map_err(|source| PdfOpsError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    let doc = open_document_bytes(&bytes, password)?;
    Ok((doc, bytes))
}

/// Parse an in-memory PDF, decrypting it with `password` if needed.
pub fn open_document_bytes(bytes: &[u8], password: &str) -> Result<Document, PdfOpsError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(PdfOpsError::ParseError(
            "Not a valid PDF file (missing %PDF- header)".into(),
        ));
    }

    let mut doc = Document::load_mem(bytes).map_err(|e| PdfOpsError::ParseError(e.to_string()))?;

    if doc.is_encrypted() {
        tracing::debug!("input is encrypted, authenticating");
        doc.decrypt(password)
            .map_err(|e| PdfOpsError::DecryptError(e.to_string()))?;
    }

    Ok(doc)
}

/// Make sure the trailer carries a file identifier.
///
/// The standard security handler keys its encryption on `/ID`, so documents
/// written without one get an identifier derived from `seed`.
pub fn ensure_file_id(doc: &mut Document, seed: &[u8]) {
    let has_id = matches!(doc.trailer.get(b"ID"), Ok(Object::Array(ids)) if ids.len() == 2);
    if has_id {
        return;
    }

    let digest = Sha256::digest(seed);
    let id = digest[..16].to_vec();
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(id.clone(), StringFormat::Hexadecimal),
            Object::String(id, StringFormat::Hexadecimal),
        ]),
    );
}

/// Number of bytes a document would occupy, used for reporting only
pub(crate) fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
