//! Record and report types produced by the pipeline.
//!
//! Field names follow the source documents (`maas`, `mesai`, `bes`, ...);
//! they are the vocabulary payroll auditors use and they appear verbatim in
//! the JSON output and the store schema.

use crate::error::ChunkError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One employee's payroll line for one period.
///
/// All monetary fields are non-negative floats in currency units; `donem` is
/// the payroll period normalised to the first day of its month. Employee
/// names are not guaranteed unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayrollRecord {
    /// Employee name as printed on the sheet.
    pub personel_ad: String,
    /// Payroll period (calendar month, day 1).
    pub donem: NaiveDate,

    // Earnings
    /// Base salary.
    pub maas: f64,
    /// Overtime pay.
    pub mesai: f64,
    /// Overtime hours worked.
    pub mesai_saati: f64,
    /// Extra earnings.
    pub ek: f64,
    /// Allowances.
    pub yardim: f64,

    // Deductions
    /// Private pension contribution.
    pub bes: f64,
    /// Salary advance.
    pub avans: f64,
    /// Garnishment.
    pub icra: f64,
    /// Debt repayment.
    pub borc: f64,

    // Payments
    /// Paid by bank transfer.
    pub banka: f64,
    /// Paid in cash.
    pub kasa: f64,
}

impl PayrollRecord {
    /// Total earnings: `maas + mesai + ek + yardim`.
    pub fn toplam_kazanc(&self) -> f64 {
        self.maas + self.mesai + self.ek + self.yardim
    }

    /// Total deductions: `bes + avans + icra + borc`.
    pub fn toplam_kesinti(&self) -> f64 {
        self.bes + self.avans + self.icra + self.borc
    }

    /// Total payments: `banka + kasa`.
    pub fn toplam_odeme(&self) -> f64 {
        self.banka + self.kasa
    }
}

/// A payroll row as extracted by a worker, before the document's period is
/// known.
///
/// Workers cannot stamp periods: the period-bearing page may live in another
/// worker's range. Raw rows are buffered until every chunk completes and the
/// orchestrator stamps them all at once with the resolved period.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 0-based page the row was found on.
    pub page: usize,
    pub personel_ad: String,
    pub maas: f64,
    pub mesai: f64,
    pub mesai_saati: f64,
    pub ek: f64,
    pub yardim: f64,
    pub bes: f64,
    pub avans: f64,
    pub icra: f64,
    pub borc: f64,
    pub banka: f64,
    pub kasa: f64,
}

impl RawRecord {
    /// Finalise the row into a [`PayrollRecord`] with the resolved period.
    pub fn into_record(self, donem: NaiveDate) -> PayrollRecord {
        PayrollRecord {
            personel_ad: self.personel_ad,
            donem,
            maas: self.maas,
            mesai: self.mesai,
            mesai_saati: self.mesai_saati,
            ek: self.ek,
            yardim: self.yardim,
            bes: self.bes,
            avans: self.avans,
            icra: self.icra,
            borc: self.borc,
            banka: self.banka,
            kasa: self.kasa,
        }
    }
}

/// Result of parsing one document.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutput {
    /// Extracted records in page-then-row order.
    pub records: Vec<PayrollRecord>,
    /// The resolved period, or `None` when no page carried a period phrase.
    ///
    /// When `None`, records were stamped with the ingestion date as a
    /// fallback and Rule-2 (spike) output for this document is unreliable:
    /// no historical match is possible without a trustworthy period.
    pub period: Option<NaiveDate>,
    /// 0-based page the period was found on, lowest page wins.
    pub period_page: Option<usize>,
    /// Extraction counters.
    pub stats: ParseStats,
    /// Non-fatal per-page failures; empty for a clean parse.
    pub chunk_errors: Vec<ChunkError>,
}

impl ParseOutput {
    /// Output for a zero-page document: no records, no error.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            period: None,
            period_page: None,
            stats: ParseStats::default(),
            chunk_errors: Vec::new(),
        }
    }
}

/// Counters describing one parse run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseStats {
    /// Pages in the document.
    pub total_pages: usize,
    /// Pages actually scanned (all of them unless a chunk failed to open).
    pub scanned_pages: usize,
    /// Worker chunks dispatched.
    pub chunks: usize,
    /// Chunks that recorded at least one error.
    pub degraded_chunks: usize,
    /// Table rows seen across all detected grids.
    pub rows_seen: usize,
    /// Rows discarded (too few columns, total-row marker, missing row id).
    pub rows_skipped: usize,
    /// Rows converted into records.
    pub records_extracted: usize,
    /// Wall-clock for the whole parse call.
    pub parse_duration_ms: u64,
}

/// One flagged record: the record's fields plus its findings.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    #[serde(flatten)]
    pub record: PayrollRecord,
    /// Human-readable finding per violated rule, in rule order.
    pub issues: Vec<String>,
    /// Domain tags ("maaş", "mesai") in first-seen order.
    pub categories: Vec<String>,
    /// Structured payloads for findings that carry numbers.
    pub details: AnomalyDetails,
}

/// Structured detail payloads attached to an [`AnomalyReport`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyDetails {
    /// Present when the spike rule fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_increase: Option<SalaryIncrease>,
}

/// The spike rule's computation: previous total, current total, percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryIncrease {
    pub prev_total: f64,
    pub current_total: f64,
    /// Increase as a percentage (30.0 means +30%).
    pub increase_pct: f64,
}

/// Lightweight document facts from a probe, no extraction.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, donem: NaiveDate) -> PayrollRecord {
        PayrollRecord {
            personel_ad: name.to_string(),
            donem,
            maas: 0.0,
            mesai: 0.0,
            mesai_saati: 0.0,
            ek: 0.0,
            yardim: 0.0,
            bes: 0.0,
            avans: 0.0,
            icra: 0.0,
            borc: 0.0,
            banka: 0.0,
            kasa: 0.0,
        }
    }

    #[test]
    fn totals() {
        let mut r = record("Ali", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        r.maas = 3000.0;
        r.mesai = 250.0;
        r.ek = 50.0;
        r.yardim = 100.0;
        r.bes = 500.0;
        r.avans = 100.0;
        r.banka = 2500.0;
        r.kasa = 300.0;

        assert_eq!(r.toplam_kazanc(), 3400.0);
        assert_eq!(r.toplam_kesinti(), 600.0);
        assert_eq!(r.toplam_odeme(), 2800.0);
    }

    #[test]
    fn raw_record_stamping() {
        let raw = RawRecord {
            page: 2,
            personel_ad: "Ali".into(),
            maas: 3000.0,
            mesai: 0.0,
            mesai_saati: 0.0,
            ek: 0.0,
            yardim: 0.0,
            bes: 0.0,
            avans: 0.0,
            icra: 0.0,
            borc: 0.0,
            banka: 0.0,
            kasa: 0.0,
        };
        let donem = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let rec = raw.into_record(donem);
        assert_eq!(rec.donem, donem);
        assert_eq!(rec.maas, 3000.0);
    }

    #[test]
    fn report_serialises_flattened() {
        let report = AnomalyReport {
            record: record("Ali", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            issues: vec!["Maaş sorunu: Ödeme dengesizliği (Fark: 500.00 TL)".into()],
            categories: vec!["maaş".into()],
            details: AnomalyDetails::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        // Record fields sit at the top level, next to the findings.
        assert_eq!(json["personel_ad"], "Ali");
        assert!(json["issues"].is_array());
        assert!(json.get("salary_increase").is_none());
    }
}
