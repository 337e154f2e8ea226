//! Pipeline stages for payroll-PDF extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. switch the table-detection strategy) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ partition ──▶ chunk ──▶ period + table ──▶ currency ──▶ merge
//! (path)   (page ranges) (worker)     (per page)       (per cell)  (parse)
//! ```
//!
//! 1. [`input`]     — validate the user-supplied path and PDF magic bytes
//! 2. [`partition`] — split the document's pages into contiguous ranges,
//!    one per worker
//! 3. [`chunk`]     — per-worker extraction; runs in `spawn_blocking` because
//!    pdfium table scanning is CPU-bound
//! 4. [`period`]    — recognise the `"<year> <month> Dönemi"` phrase in page
//!    text
//! 5. [`table`]     — line-based grid detection over page geometry
//! 6. [`currency`]  — locale-formatted numeric cell to `f64`
//!
//! The merge step lives in [`crate::parse`], the orchestrator that owns the
//! worker fan-out.

pub mod chunk;
pub mod currency;
pub mod input;
pub mod partition;
pub mod period;
pub mod table;
