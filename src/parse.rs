//! Document-level parse orchestration.
//!
//! The orchestrator probes the document once for its page count, partitions
//! the pages into contiguous ranges, dispatches one blocking worker per
//! range, and merges their results. Workers own isolated document handles
//! and share no mutable state; results flow back only as return values.
//!
//! ## Period resolution
//!
//! Raw rows are buffered un-stamped until every chunk has completed, then
//! stamped once with the resolved period. Resolution is deterministic: among
//! all period phrases found, the one on the lowest page index wins,
//! regardless of which worker finished first. A document with no period
//! phrase falls back to the ingestion date, and `ParseOutput::period` stays
//! `None` so callers can treat spike-rule output as unreliable.
//!
//! ## Failure semantics
//!
//! Decode problems inside a worker degrade locally (see
//! [`crate::pipeline::chunk`]). A worker that panics, or a parse that
//! exceeds the configured timeout, fails the whole call: partial payroll
//! data is never handed downstream as if it were complete. On timeout or
//! worker failure, workers still running on the blocking pool cannot be
//! interrupted; they finish in the background and their results are
//! discarded.

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::pipeline::chunk::{self, ChunkOutput};
use crate::pipeline::input;
use crate::pipeline::partition::{partition, PageRange};
use crate::record::{DocumentInfo, ParseOutput, ParseStats};
use chrono::{Local, NaiveDate};
use futures::stream::{FuturesUnordered, StreamExt};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Parse a payroll PDF into records.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`  — path to a local payroll PDF
/// * `config` — audit configuration
///
/// # Returns
/// `Ok(ParseOutput)` on success, even if some pages degraded
/// (check `output.chunk_errors`). A zero-page document yields an empty
/// output, not an error.
///
/// # Errors
/// Returns `Err(AuditError)` only for fatal conditions:
/// - File not found / permission denied / not a PDF
/// - Corrupt or password-protected document
/// - A crashed worker ([`AuditError::WorkerFailed`], naming the page range)
/// - Total wall-clock over the configured bound ([`AuditError::ParseTimeout`])
pub async fn parse(
    input: impl AsRef<Path>,
    config: &AuditConfig,
) -> Result<ParseOutput, AuditError> {
    let total_start = Instant::now();
    let path = input::resolve_local(input.as_ref())?;
    info!("Starting parse: {}", path.display());

    // ── Step 1: Probe page count ─────────────────────────────────────────
    let info = {
        let probe_path = path.clone();
        let password = config.password.clone();
        tokio::task::spawn_blocking(move || {
            chunk::probe_document(&probe_path, password.as_deref())
        })
        .await
        .map_err(|e| AuditError::Internal(format!("Probe task panicked: {e}")))??
    };

    if info.page_count == 0 {
        info!("Document has zero pages; returning empty result");
        return Ok(ParseOutput::empty());
    }

    // ── Step 2: Partition pages across workers ───────────────────────────
    let workers = config.effective_workers(info.page_count);
    let ranges = partition(info.page_count, workers);
    debug!(
        pages = info.page_count,
        chunks = ranges.len(),
        "dispatching extraction workers"
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_parse_start(info.page_count, ranges.len());
    }

    // ── Step 3: Fan out and collect in completion order ──────────────────
    let mut tasks = FuturesUnordered::new();
    for &range in &ranges {
        let worker_path = path.clone();
        let worker_config = config.clone();
        let handle = tokio::task::spawn_blocking(move || {
            chunk::extract_chunk(&worker_path, range, &worker_config)
        });
        tasks.push(async move { (range, handle.await) });
    }

    let collect = async {
        let mut outputs: Vec<(PageRange, ChunkOutput)> = Vec::with_capacity(ranges.len());
        while let Some((range, joined)) = tasks.next().await {
            match joined {
                Ok(output) => {
                    if let Some(cb) = &config.progress_callback {
                        match output.errors.first() {
                            None => cb.on_chunk_complete(range, output.raw.len()),
                            Some(error) => cb.on_chunk_error(range, error.to_string()),
                        }
                    }
                    outputs.push((range, output));
                }
                Err(join_error) => {
                    return Err(AuditError::WorkerFailed {
                        pages_start: range.start + 1,
                        pages_end: range.end,
                        detail: join_error.to_string(),
                    });
                }
            }
        }
        Ok(outputs)
    };

    let timeout = Duration::from_secs(config.parse_timeout_secs);
    let outputs = match tokio::time::timeout(timeout, collect).await {
        Ok(collected) => collected?,
        Err(_) => {
            return Err(AuditError::ParseTimeout {
                secs: config.parse_timeout_secs,
            })
        }
    };

    // ── Step 4: Merge and stamp ──────────────────────────────────────────
    let mut output = merge_chunks(outputs, info.page_count, Local::now().date_naive());
    output.stats.parse_duration_ms = total_start.elapsed().as_millis() as u64;

    if output.period.is_none() && !output.records.is_empty() {
        warn!(
            "no period phrase found in document; records stamped with ingestion date \
             and spike evaluation will be unreliable"
        );
    }
    for error in &output.chunk_errors {
        warn!(%error, "degraded extraction");
    }
    info!(
        records = output.records.len(),
        pages = output.stats.total_pages,
        duration_ms = output.stats.parse_duration_ms,
        "parse complete"
    );

    if let Some(cb) = &config.progress_callback {
        cb.on_parse_complete(info.page_count, output.records.len());
    }

    Ok(output)
}

/// Parse payroll PDF bytes held in memory.
///
/// Writes `bytes` to a managed [`tempfile`] and cleans it up on return or
/// panic. This is the entry point for upload-style callers that never have
/// the document on disk.
pub async fn parse_from_bytes(
    bytes: &[u8],
    config: &AuditConfig,
) -> Result<ParseOutput, AuditError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| AuditError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| AuditError::Internal(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_path_buf();
    // `tmp` is dropped (and the file deleted) when `parse` returns.
    parse(&path, config).await
}

/// Probe a document's page count and version without extraction.
pub async fn inspect(
    input: impl AsRef<Path>,
    password: Option<&str>,
) -> Result<DocumentInfo, AuditError> {
    let path = input::resolve_local(input.as_ref())?;
    let password = password.map(|s| s.to_string());
    tokio::task::spawn_blocking(move || chunk::probe_document(&path, password.as_deref()))
        .await
        .map_err(|e| AuditError::Internal(format!("Probe task panicked: {e}")))?
}

// ── Merge ────────────────────────────────────────────────────────────────

/// Merge chunk outputs into the final record set.
///
/// Chunks arrive in completion order; sorting by range start restores
/// page-then-row order. The period candidate with the lowest page index
/// wins. `fallback` stamps the records of a period-less document, while
/// the returned `period` field stays `None` for such documents.
fn merge_chunks(
    mut outputs: Vec<(PageRange, ChunkOutput)>,
    total_pages: usize,
    fallback: NaiveDate,
) -> ParseOutput {
    outputs.sort_by_key(|(range, _)| range.start);

    let resolved = outputs
        .iter()
        .filter_map(|(_, output)| output.period)
        .min_by_key(|candidate| candidate.page);
    let donem = resolved.map(|c| c.donem).unwrap_or(fallback);

    let mut stats = ParseStats {
        total_pages,
        chunks: outputs.len(),
        ..ParseStats::default()
    };
    let mut records = Vec::new();
    let mut chunk_errors = Vec::new();

    for (_, output) in outputs {
        stats.scanned_pages += output.pages_scanned;
        stats.rows_seen += output.rows_seen;
        stats.rows_skipped += output.rows_skipped;
        if !output.errors.is_empty() {
            stats.degraded_chunks += 1;
        }
        chunk_errors.extend(output.errors);
        records.extend(output.raw.into_iter().map(|raw| raw.into_record(donem)));
    }
    stats.records_extracted = records.len();

    ParseOutput {
        records,
        period: resolved.map(|c| c.donem),
        period_page: resolved.map(|c| c.page),
        stats,
        chunk_errors,
    }
}
