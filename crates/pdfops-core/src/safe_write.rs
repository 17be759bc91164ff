//! Write-then-rename output handling
//!
//! Output always goes to a temporary file next to the destination and is
//! renamed over it only after everything was written and synced. A failure at
//! any point leaves the destination untouched, which is what makes in-place
//! operation safe.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::PdfOpsError;

/// Atomically replace `path` with whatever `write` produces.
///
/// If `write` returns an error, the temporary file is removed and the
/// destination keeps its previous contents. Permissions of an existing
/// destination are carried over to the new file.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), PdfOpsError>
where
    F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdfops-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| PdfOpsError::write(path, e))?;

    write(&mut tmp).map_err(|e| PdfOpsError::write(path, e))?;
    tmp.flush().map_err(|e| PdfOpsError::write(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PdfOpsError::write(path, e))?;

    if let Ok(metadata) = fs::metadata(path) {
        tmp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| PdfOpsError::write(path, e))?;
    }

    tmp.persist(path)
        .map_err(|e| PdfOpsError::write(path, e.error))?;

    tracing::debug!(path = %path.display(), "output replaced");
    Ok(())
}

/// Atomically replace `path` with `bytes`
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), PdfOpsError> {
    write_atomic(path, |writer| writer.write_all(bytes))
}

/// Whether two paths name the same file.
///
/// An output path that does not exist yet is never the same file as the input.
pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
