//! Anomaly evaluation: three independent domain rules per record.
//!
//! | Rule | Check | Category |
//! |------|-------|----------|
//! | Balance  | `|kazanç − (kesinti + ödeme)| ≤ tolerance`          | `maaş`  |
//! | Spike    | month-over-month earnings increase `>` threshold    | `maaş`  |
//! | Overtime | `mesai_saati ≤ ceiling`                             | `mesai` |
//!
//! Evaluation is stateless per record; the spike rule is the only one that
//! reaches into history, through the [`HistoryLookup`] capability. To keep
//! bulk evaluation at one query per distinct period rather than one per
//! record, the engine prefetches each needed previous period with
//! [`HistoryLookup::find_period`] and indexes the candidates by employee
//! name.
//!
//! All three rules run for every record (no short-circuiting); a record can
//! trigger several rules at once and then carries one issue string per
//! violated rule.

use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::pipeline::period::previous_period;
use crate::record::{AnomalyDetails, AnomalyReport, PayrollRecord, SalaryIncrease};
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::debug;

/// Category tag for salary findings.
const CATEGORY_SALARY: &str = "maaş";
/// Category tag for overtime findings.
const CATEGORY_OVERTIME: &str = "mesai";

/// Read access to previously persisted records.
///
/// Implemented by [`crate::store::RecordStore`] and
/// [`crate::store::MemoryHistory`]. The engine never opens transactions;
/// it only reads.
pub trait HistoryLookup {
    /// The record for one employee in one period, if present.
    fn find_record(
        &self,
        personel_ad: &str,
        donem: NaiveDate,
    ) -> Result<Option<PayrollRecord>, AuditError>;

    /// All records for one period. Used to batch-prefetch spike-rule
    /// candidates.
    fn find_period(&self, donem: NaiveDate) -> Result<Vec<PayrollRecord>, AuditError>;
}

/// Evaluates the three payroll rules against records.
pub struct AnomalyEngine<'a> {
    config: &'a AuditConfig,
}

impl<'a> AnomalyEngine<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self { config }
    }

    /// Balance rule: total earnings must equal deductions plus payments
    /// within the configured tolerance.
    ///
    /// Returns the validity flag and the signed difference
    /// `kazanç − (kesinti + ödeme)`.
    pub fn check_balance(&self, record: &PayrollRecord) -> (bool, f64) {
        let diff =
            record.toplam_kazanc() - (record.toplam_kesinti() + record.toplam_odeme());
        (diff.abs() <= self.config.balance_tolerance, diff)
    }

    /// Spike rule: flag a month-over-month earnings increase strictly above
    /// the configured threshold.
    ///
    /// `previous` is the same employee's record for the preceding calendar
    /// month. No previous record, or a non-positive previous total, means
    /// the rule cannot be evaluated and is treated as no anomaly.
    pub fn check_spike(
        &self,
        record: &PayrollRecord,
        previous: Option<&PayrollRecord>,
    ) -> Option<SalaryIncrease> {
        let previous = previous?;
        let prev_total = previous.toplam_kazanc();
        if prev_total <= 0.0 {
            return None;
        }

        let current_total = record.toplam_kazanc();
        let increase = (current_total - prev_total) / prev_total;
        if increase > self.config.spike_threshold {
            Some(SalaryIncrease {
                prev_total,
                current_total,
                increase_pct: increase * 100.0,
            })
        } else {
            None
        }
    }

    /// Overtime rule: monthly overtime hours must not exceed the ceiling.
    pub fn check_overtime(&self, record: &PayrollRecord) -> bool {
        record.mesai_saati <= self.config.overtime_ceiling
    }

    /// Evaluate all rules for every record and collect reports for records
    /// with at least one finding.
    ///
    /// Input records are not mutated; evaluating the same records against
    /// the same history twice yields identical reports.
    pub fn evaluate(
        &self,
        records: &[PayrollRecord],
        history: &dyn HistoryLookup,
    ) -> Result<Vec<AnomalyReport>, AuditError> {
        let previous = prefetch_previous(records, history)?;
        let mut reports = Vec::new();

        for record in records {
            let mut issues = Vec::new();
            let mut categories: Vec<String> = Vec::new();
            let mut details = AnomalyDetails::default();

            let tag = |categories: &mut Vec<String>, category: &str| {
                if !categories.iter().any(|c| c == category) {
                    categories.push(category.to_string());
                }
            };

            let (balanced, diff) = self.check_balance(record);
            if !balanced {
                issues.push(format!(
                    "Maaş sorunu: Ödeme dengesizliği (Fark: {diff:.2} TL)"
                ));
                tag(&mut categories, CATEGORY_SALARY);
            }

            let key = (record.personel_ad.clone(), previous_period(record.donem));
            if let Some(increase) = self.check_spike(record, previous.get(&key)) {
                issues.push(format!(
                    "Maaş sorunu: %{:.1} yüksek artış tespit edildi.",
                    increase.increase_pct
                ));
                tag(&mut categories, CATEGORY_SALARY);
                details.salary_increase = Some(increase);
            }

            if !self.check_overtime(record) {
                issues.push(format!(
                    "Mesai sorunu: Aylık mesai sınırı aşıldı ({} saat)",
                    record.mesai_saati
                ));
                tag(&mut categories, CATEGORY_OVERTIME);
            }

            if !issues.is_empty() {
                reports.push(AnomalyReport {
                    record: record.clone(),
                    issues,
                    categories,
                    details,
                });
            }
        }

        debug!(
            records = records.len(),
            flagged = reports.len(),
            "anomaly evaluation complete"
        );
        Ok(reports)
    }
}

/// Fetch each needed previous period once and index candidates by employee
/// name.
///
/// A parsed document shares a single period, so this is normally exactly one
/// `find_period` round trip regardless of record count. Duplicate names
/// within a period resolve to the first candidate, matching single-record
/// lookup semantics.
fn prefetch_previous(
    records: &[PayrollRecord],
    history: &dyn HistoryLookup,
) -> Result<HashMap<(String, NaiveDate), PayrollRecord>, AuditError> {
    let mut periods: Vec<NaiveDate> = records
        .iter()
        .map(|record| previous_period(record.donem))
        .collect();
    periods.sort_unstable();
    periods.dedup();

    let mut index = HashMap::new();
    for donem in periods {
        for candidate in history.find_period(donem)? {
            index
                .entry((candidate.personel_ad.clone(), donem))
                .or_insert(candidate);
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryHistory;

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

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

    /// maas=3000, bes=500, banka=2500: perfectly balanced.
    fn balanced_record() -> PayrollRecord {
        let mut r = record("Ali Kaya", date(2024, 2));
        r.maas = 3000.0;
        r.bes = 500.0;
        r.banka = 2500.0;
        r
    }

    #[test]
    fn balance_holds_for_balanced_record() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);
        let (valid, diff) = engine.check_balance(&balanced_record());
        assert!(valid);
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn balance_fires_with_signed_difference() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        let mut r = balanced_record();
        r.banka = 2000.0;
        let (valid, diff) = engine.check_balance(&r);
        assert!(!valid);
        assert_eq!(diff, 500.0);
    }

    #[test]
    fn balance_is_symmetric_around_tolerance() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        // Overpayment and underpayment of the same magnitude are judged
        // identically.
        let mut over = balanced_record();
        over.banka = 2500.0 - 10.0;
        let mut under = balanced_record();
        under.banka = 2500.0 + 10.0;

        assert!(engine.check_balance(&over).0);
        assert!(engine.check_balance(&under).0);

        over.banka -= 0.01;
        under.banka += 0.01;
        assert!(!engine.check_balance(&over).0);
        assert!(!engine.check_balance(&under).0);
    }

    #[test]
    fn spike_boundary_is_strict() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        let mut previous = record("Ali", date(2024, 1));
        previous.maas = 10_000.0;

        // Exactly +20.00% must NOT flag.
        let mut current = record("Ali", date(2024, 2));
        current.maas = 12_000.0;
        assert!(engine.check_spike(&current, Some(&previous)).is_none());

        // +20.01% must flag.
        current.maas = 12_001.0;
        let increase = engine.check_spike(&current, Some(&previous)).unwrap();
        assert!(increase.increase_pct > 20.0);
    }

    #[test]
    fn spike_without_history_is_no_anomaly() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        let mut current = record("Ali", date(2024, 2));
        current.maas = 50_000.0;
        assert!(engine.check_spike(&current, None).is_none());

        // Non-positive previous total cannot be evaluated either.
        let previous = record("Ali", date(2024, 1));
        assert!(engine.check_spike(&current, Some(&previous)).is_none());
    }

    #[test]
    fn spike_computes_percentage() {
        // Prior total 10,000; current 13,000: a 30% increase.
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        let mut previous = record("Ayşe Yılmaz", date(2024, 1));
        previous.maas = 10_000.0;
        let mut current = record("Ayşe Yılmaz", date(2024, 2));
        current.maas = 13_000.0;

        let increase = engine.check_spike(&current, Some(&previous)).unwrap();
        assert_eq!(increase.prev_total, 10_000.0);
        assert_eq!(increase.current_total, 13_000.0);
        assert!((increase.increase_pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn overtime_boundary_is_inclusive() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);

        let mut r = record("Ali", date(2024, 2));
        r.mesai_saati = 48.0;
        assert!(engine.check_overtime(&r));
        r.mesai_saati = 48.01;
        assert!(!engine.check_overtime(&r));
    }

    #[test]
    fn evaluate_aggregates_multiple_rules() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);
        let mut history = MemoryHistory::new();

        let mut previous = record("Ayşe Yılmaz", date(2024, 1));
        previous.maas = 10_000.0;
        history.insert(previous);

        // Unbalanced, spiking, and over the overtime ceiling at once.
        let mut current = record("Ayşe Yılmaz", date(2024, 2));
        current.maas = 13_000.0;
        current.mesai_saati = 50.0;

        let reports = engine.evaluate(&[current], &history).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.issues.len(), 3);
        assert_eq!(report.categories, vec!["maaş", "mesai"]);
        let increase = report.details.salary_increase.as_ref().unwrap();
        assert!((increase.increase_pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn evaluate_reports_only_flagged_records() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);
        let history = MemoryHistory::new();

        let clean = balanced_record();
        let mut dirty = balanced_record();
        dirty.personel_ad = "Veli Demir".into();
        dirty.banka = 2000.0;

        let reports = engine.evaluate(&[clean, dirty], &history).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].record.personel_ad, "Veli Demir");
        assert!(reports[0].issues[0].contains("500.00"));
    }

    #[test]
    fn evaluate_is_idempotent() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);
        let mut history = MemoryHistory::new();

        let mut previous = record("Ali", date(2024, 1));
        previous.maas = 10_000.0;
        history.insert(previous);

        let mut current = record("Ali", date(2024, 2));
        current.maas = 13_000.0;
        let records = vec![current];

        let first = engine.evaluate(&records, &history).unwrap();
        let second = engine.evaluate(&records, &history).unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            serde_json::to_value(&second).unwrap()
        );
    }

    #[test]
    fn year_boundary_lookup_uses_december() {
        let config = AuditConfig::default();
        let engine = AnomalyEngine::new(&config);
        let mut history = MemoryHistory::new();

        let mut previous = record("Ali", date(2023, 12));
        previous.maas = 10_000.0;
        history.insert(previous);

        let mut current = record("Ali", date(2024, 1));
        current.maas = 15_000.0;

        let reports = engine.evaluate(&[current], &history).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].details.salary_increase.is_some());
    }

    #[test]
    fn thresholds_come_from_config() {
        let config = AuditConfig::builder()
            .balance_tolerance(0.0)
            .spike_threshold(0.50)
            .overtime_ceiling(40.0)
            .build()
            .unwrap();
        let engine = AnomalyEngine::new(&config);

        let mut r = balanced_record();
        r.banka -= 1.0;
        assert!(!engine.check_balance(&r).0);

        let mut previous = record("Ali", date(2024, 1));
        previous.maas = 10_000.0;
        let mut current = record("Ali", date(2024, 2));
        current.maas = 13_000.0;
        // 30% is under the raised 50% threshold.
        assert!(engine.check_spike(&current, Some(&previous)).is_none());

        let mut overtime = record("Ali", date(2024, 2));
        overtime.mesai_saati = 41.0;
        assert!(!engine.check_overtime(&overtime));
    }
}
