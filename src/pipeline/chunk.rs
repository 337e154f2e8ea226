//! Per-worker extraction: one page range, one isolated document handle.
//!
//! Every worker opens the document itself, scans its assigned pages in
//! index order, and returns raw rows plus the first period phrase it saw.
//! Workers share nothing; the orchestrator in [`crate::parse`] is the sole
//! merger of their results.
//!
//! All functions here are blocking and run inside
//! `tokio::task::spawn_blocking`: pdfium table scanning is CPU-bound.
//!
//! Failure handling is local wherever possible. A page that cannot be
//! decoded contributes a [`ChunkError`] and the scan continues; a document
//! handle that cannot be opened degrades the whole range to an empty
//! result. The document handle is dropped on every exit path.

use crate::config::AuditConfig;
use crate::error::{AuditError, ChunkError};
use crate::pipeline::currency;
use crate::pipeline::partition::PageRange;
use crate::pipeline::period;
use crate::pipeline::table::{self, Glyph, LayoutSettings, PageGeometry, RuleLine};
use crate::record::{DocumentInfo, RawRecord};
use chrono::NaiveDate;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, warn};

/// Row marker for the sheet's grand-total line.
const TOTAL_ROW_MARKER: &str = "TOPLAM";

/// A period phrase found by a worker, tagged with the page it came from so
/// the orchestrator can resolve ties deterministically (lowest page wins).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodCandidate {
    /// 0-based page index.
    pub page: usize,
    pub donem: NaiveDate,
}

/// Everything one worker hands back to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    /// Raw rows in page-then-row order, un-stamped.
    pub raw: Vec<RawRecord>,
    /// First period phrase in this range, if any.
    pub period: Option<PeriodCandidate>,
    pub pages_scanned: usize,
    pub rows_seen: usize,
    pub rows_skipped: usize,
    /// Non-fatal failures inside this range.
    pub errors: Vec<ChunkError>,
}

/// Probe a document for page count and version without extracting anything.
///
/// This is the orchestrator's first touch of the file; open failures are
/// fatal and typed here (corrupt, password-protected, wrong password).
pub fn probe_document(path: &Path, password: Option<&str>) -> Result<DocumentInfo, AuditError> {
    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, path, password)?;

    Ok(DocumentInfo {
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

/// Extract raw payroll rows from one page range.
///
/// Never fails: degradations are recorded in [`ChunkOutput::errors`] and
/// whatever was accumulated before a failure is returned.
pub fn extract_chunk(path: &Path, range: PageRange, config: &AuditConfig) -> ChunkOutput {
    if let Some(cb) = &config.progress_callback {
        cb.on_chunk_start(range);
    }

    let mut output = ChunkOutput::default();

    let pdfium = Pdfium::default();
    let document = match open_document(&pdfium, path, config.password.as_deref()) {
        Ok(document) => document,
        Err(error) => {
            warn!(%range, %error, "chunk could not open document");
            output.errors.push(ChunkError::Open {
                pages_start: range.start + 1,
                pages_end: range.end,
                detail: error.to_string(),
            });
            return output;
        }
    };

    let settings = LayoutSettings {
        snap_tolerance: config.snap_tolerance,
        join_tolerance: config.join_tolerance,
    };
    let pages = document.pages();

    for index in range.pages() {
        match scan_page(&pages, index, &settings, config, output.period.is_none()) {
            Ok(scan) => {
                output.pages_scanned += 1;
                output.rows_seen += scan.rows_seen;
                output.rows_skipped += scan.rows_skipped;
                output.raw.extend(scan.raw);
                if output.period.is_none() {
                    output.period = scan.period;
                }
            }
            Err(detail) => {
                warn!(page = index + 1, %detail, "page failed to decode, continuing");
                output.errors.push(ChunkError::Page {
                    page: index + 1,
                    detail,
                });
            }
        }
    }

    debug!(
        %range,
        records = output.raw.len(),
        rows_skipped = output.rows_skipped,
        "chunk complete"
    );
    output
}

// ── Per-page scanning ────────────────────────────────────────────────────

struct PageScan {
    raw: Vec<RawRecord>,
    period: Option<PeriodCandidate>,
    rows_seen: usize,
    rows_skipped: usize,
}

fn scan_page(
    pages: &PdfPages<'_>,
    index: usize,
    settings: &LayoutSettings,
    config: &AuditConfig,
    want_period: bool,
) -> Result<PageScan, String> {
    let page = pages
        .get(index as u16)
        .map_err(|e| format!("could not load page: {e:?}"))?;
    let text_page = page
        .text()
        .map_err(|e| format!("text layer unreadable: {e:?}"))?;

    let mut scan = PageScan {
        raw: Vec::new(),
        period: None,
        rows_seen: 0,
        rows_skipped: 0,
    };

    // Period scan stops at the first hit inside a chunk; later pages in the
    // same range cannot override an earlier one.
    if want_period {
        scan.period = period::extract_period(&text_page.all()).map(|donem| PeriodCandidate {
            page: index,
            donem,
        });
    }

    let geometry = collect_geometry(&page, &text_page, settings);
    let Some(rows) = table::detect_table(&geometry, settings) else {
        return Ok(scan);
    };

    for cells in &rows {
        scan.rows_seen += 1;
        match row_to_raw(cells, index, config.min_row_columns) {
            Some(raw) => scan.raw.push(raw),
            None => scan.rows_skipped += 1,
        }
    }

    Ok(scan)
}

/// Gather rule lines and positioned glyphs from one page.
fn collect_geometry(
    page: &PdfPage<'_>,
    text_page: &PdfPageText<'_>,
    settings: &LayoutSettings,
) -> PageGeometry {
    let mut geometry = PageGeometry {
        width: page.width().value,
        height: page.height().value,
        rules: Vec::new(),
        glyphs: Vec::new(),
    };

    // Grid rules are thin stroked or filled paths; anything thicker than the
    // snap tolerance on its short side is artwork, not a rule.
    let thinness = settings.snap_tolerance.max(1.0);
    for object in page.objects().iter() {
        if object.object_type() != PdfPageObjectType::Path {
            continue;
        }
        let Ok(bounds) = object.bounds() else {
            continue;
        };
        let left = bounds.left().value;
        let right = bounds.right().value;
        let top = bounds.top().value;
        let bottom = bounds.bottom().value;
        let width = right - left;
        let height = top - bottom;

        if width <= thinness && height > thinness {
            let x = (left + right) / 2.0;
            geometry.rules.push(RuleLine {
                x0: x,
                y0: bottom,
                x1: x,
                y1: top,
            });
        } else if height <= thinness && width > thinness {
            let y = (top + bottom) / 2.0;
            geometry.rules.push(RuleLine {
                x0: left,
                y0: y,
                x1: right,
                y1: y,
            });
        }
    }

    for character in text_page.chars().iter() {
        let Some(text) = character.unicode_string() else {
            continue;
        };
        let Some(ch) = text.chars().next() else {
            continue;
        };
        let Ok(bounds) = character.loose_bounds() else {
            continue;
        };
        let left = bounds.left().value;
        let right = bounds.right().value;
        geometry.glyphs.push(Glyph {
            ch,
            x: left,
            y: (bounds.top().value + bounds.bottom().value) / 2.0,
            width: (right - left).abs(),
        });
    }

    geometry
}

/// Qualify one table row and map it onto the payroll columns.
///
/// Returns `None` for rows that are not employee rows: fewer populated
/// columns than the sheet defines, the grand-total line, or a first column
/// that is not a pure-digit row identifier.
fn row_to_raw(cells: &[String], page: usize, min_columns: usize) -> Option<RawRecord> {
    if cells.len() < min_columns {
        return None;
    }

    let row_id = cells[0].trim();
    if row_id.is_empty() || row_id == TOTAL_ROW_MARKER {
        return None;
    }
    if !row_id.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let cell = |index: usize| currency::normalize(cells.get(index).map(String::as_str));

    Some(RawRecord {
        page,
        personel_ad: cells[1].trim().to_string(),
        mesai_saati: cell(6),
        maas: cell(7),
        mesai: cell(8),
        ek: cell(9),
        yardim: cell(10),
        bes: cell(11),
        avans: cell(12),
        icra: cell(13),
        borc: cell(14),
        banka: cell(15),
        kasa: cell(16),
    })
}

/// Open a document, classifying pdfium failures into typed errors.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, AuditError> {
    pdfium.load_pdf_from_file(path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.contains("Password") || detail.contains("password") {
            if password.is_some() {
                AuditError::WrongPassword {
                    path: path.to_path_buf(),
                }
            } else {
                AuditError::PasswordRequired {
                    path: path.to_path_buf(),
                }
            }
        } else {
            AuditError::CorruptPdf {
                path: path.to_path_buf(),
                detail,
            }
        }
    })
}
