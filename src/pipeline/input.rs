//! Input validation: check the user-supplied path before any worker runs.
//!
//! We validate existence, readability, and the PDF magic bytes (`%PDF`)
//! up front so callers get a typed error rather than a pdfium failure from
//! inside a worker.

use crate::error::AuditError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_local(path: &Path) -> Result<PathBuf, AuditError> {
    let path = path.to_path_buf();

    if !path.exists() {
        return Err(AuditError::FileNotFound { path });
    }

    // Check read permission by attempting to open.
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(AuditError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(AuditError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(AuditError::FileNotFound { path });
        }
    }

    debug!("Resolved payroll PDF: {}", path.display());
    Ok(path)
}
