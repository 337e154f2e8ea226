//! Error types for the bordro-audit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AuditError`] — **Fatal**: the operation cannot produce a trustworthy
//!   result at all (bad input file, corrupt document, a crashed worker, a
//!   store failure). Returned as `Err(AuditError)` from the top-level
//!   `parse`/`evaluate` entry points. A crashed worker fails the whole
//!   parse; partial payroll data never reaches downstream consumers as if
//!   it were complete.
//!
//! * [`ChunkError`] — **Non-fatal**: one page (or one worker's page range)
//!   could not be decoded but the rest of the document is fine. Stored inside
//!   [`crate::record::ParseOutput`] so callers can inspect degraded
//!   extractions rather than losing the whole document to one bad page.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the bordro-audit library.
///
/// Page-level decode failures use [`ChunkError`] and are stored in
/// [`crate::record::ParseOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum AuditError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{}'\nCheck the path exists and is readable.", .path.display())]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{}'\nTry: chmod +r '{}'", .path.display(), .path.display())]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{}'\nFirst bytes: {:?}", .path.display(), .magic)]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{}' is corrupt: {}", .path.display(), .detail)]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{}' is encrypted and requires a password.", .path.display())]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{}'", .path.display())]
    WrongPassword { path: PathBuf },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// A worker crashed; the affected page range could not be processed.
    #[error("Extraction worker failed on pages {pages_start}-{pages_end}: {detail}")]
    WorkerFailed {
        /// First affected page, 1-based.
        pages_start: usize,
        /// Last affected page, 1-based.
        pages_end: usize,
        detail: String,
    },

    /// Total worker wall-clock exceeded the configured bound.
    #[error("Parse timed out after {secs}s\nIncrease the parse timeout for very large documents.")]
    ParseTimeout { secs: u64 },

    /// The document parsed cleanly but contained no employee rows.
    ///
    /// Distinguished from a processing error so an upload surface can reject
    /// the document with "no extractable data" rather than "internal error".
    #[error("No payroll data could be extracted from '{}'", .path.display())]
    NoExtractableData { path: PathBuf },

    // ── Store errors ──────────────────────────────────────────────────────
    /// The record store rejected an operation.
    #[error("record store error: {0}")]
    Store(#[from] rusqlite::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal extraction failure inside one worker.
///
/// Recorded in [`crate::record::ParseOutput::chunk_errors`]; the affected
/// pages contribute whatever rows were accumulated before the failure.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The worker could not open its own document handle; its whole page
    /// range yielded nothing.
    #[error("pages {pages_start}-{pages_end}: could not open document: {detail}")]
    Open {
        pages_start: usize,
        pages_end: usize,
        detail: String,
    },

    /// A single page failed to decode; remaining pages were still processed.
    #[error("page {page}: {detail}")]
    Page { page: usize, detail: String },
}
