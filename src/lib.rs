//! # bordro-audit
//!
//! Extract employee payroll records from payroll PDF exports and flag
//! compensation anomalies.
//!
//! Payroll summary sheets ("bordro icmali") print one ruled table per page,
//! seventeen columns wide, one employee per row, with a
//! `"<year> <month> Dönemi"` header naming the payroll cycle. This crate
//! parses those documents into typed records, persists them, and evaluates
//! three audit rules against each record: earnings/deductions balance,
//! month-over-month earnings spike, and the monthly overtime ceiling.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      validate path and %PDF magic bytes
//!  ├─ 2. Partition  split pages into contiguous per-worker ranges
//!  ├─ 3. Extract    per range: ruled-grid detection, row qualification,
//!  │                currency normalisation (CPU-bound, spawn_blocking)
//!  ├─ 4. Merge      restore page order, resolve the document period,
//!  │                stamp all records once
//!  └─ 5. Evaluate   three audit rules per record against stored history
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bordro_audit::{parse, AnomalyEngine, AuditConfig, RecordStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuditConfig::default();
//!     let output = parse("bordro_2024_03.pdf", &config).await?;
//!
//!     let mut store = RecordStore::open("bordro.db")?;
//!     let engine = AnomalyEngine::new(&config);
//!     let reports = engine.evaluate(&output.records, &store)?;
//!     store.insert_batch(&output.records)?;
//!
//!     for report in &reports {
//!         eprintln!("{}: {}", report.record.personel_ad, report.issues.join("; "));
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bordro` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bordro-audit = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod parse;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AuditConfig, AuditConfigBuilder};
pub use engine::{AnomalyEngine, HistoryLookup};
pub use error::{AuditError, ChunkError};
pub use parse::{inspect, parse, parse_from_bytes};
pub use pipeline::partition::PageRange;
pub use progress::{NoopParseCallback, ParseProgressCallback, ProgressCallback};
pub use record::{
    AnomalyDetails, AnomalyReport, DocumentInfo, ParseOutput, ParseStats, PayrollRecord,
    SalaryIncrease,
};
pub use store::{MemoryHistory, RecordStore};
