//! PDF password and optimization operations
//!
//! This crate provides file-level PDF maintenance using lopdf:
//! - `passwd`: re-encrypt a document with new owner and user passwords
//! - `optimize`: shrink a document by merging duplicates, compressing
//!   streams and optionally downsampling images
//!
//! Both operations write through [`safe_write`], so the output may be the
//! input file itself.

pub mod document;
pub mod error;
pub mod optimize;
pub mod passwd;
pub mod safe_write;
pub mod writer;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

pub use document::{open_document, open_document_bytes};
pub use error::{FailureClass, PdfOpsError};
pub use optimize::{
    optimize, optimize_bytes, optimize_with_options, OptimizeOptions, OptimizeOpts,
    OptimizeReport,
};
pub use passwd::{change_password, passwd, passwd_with_options, PasswdOptions};
pub use writer::{serialize_document, WriteOptions};

/// Where an operation writes: the explicit output, or the input itself
pub fn output_path(input: &Path, output: Option<&Path>) -> PathBuf {
    match output {
        Some(path) if !path.as_os_str().is_empty() => path.to_path_buf(),
        _ => input.to_path_buf(),
    }
}

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8], password: &str) -> Result<u32, PdfOpsError> {
    let doc = open_document_bytes(bytes, password)?;
    Ok(doc.get_pages().len() as u32)
}
