//! Configuration for parsing and anomaly evaluation.
//!
//! All behaviour is controlled through [`AuditConfig`], built via its
//! [`AuditConfigBuilder`] and constructed once at process start. Keeping
//! every knob in one immutable struct lets the orchestrator hand workers a
//! cheap clone and makes two runs diffable from their logged configs. Rule
//! thresholds live here rather than as literals in the engine.

use crate::error::AuditError;
use crate::progress::ProgressCallback;
use std::fmt;

/// Configuration for a payroll audit run.
///
/// Built via [`AuditConfig::builder()`] or [`AuditConfig::default()`].
///
/// # Example
/// ```rust
/// use bordro_audit::AuditConfig;
///
/// let config = AuditConfig::builder()
///     .workers(4)
///     .balance_tolerance(10.0)
///     .parse_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AuditConfig {
    // ── Rule thresholds ───────────────────────────────────────────────────
    /// Maximum allowed absolute difference between total earnings and
    /// deductions-plus-payments, in currency units. Default: 10.0.
    pub balance_tolerance: f64,

    /// Month-over-month earnings increase that triggers the spike rule,
    /// as a fraction. The rule fires on strictly greater than this value.
    /// Default: 0.20.
    pub spike_threshold: f64,

    /// Maximum monthly overtime hours before the overtime rule fires.
    /// Default: 48.0.
    pub overtime_ceiling: f64,

    // ── Extraction tuning ─────────────────────────────────────────────────
    /// Minimum populated columns for a table row to qualify as an employee
    /// row. Default: 17 (the payroll sheet's full column count).
    pub min_row_columns: usize,

    /// Rules whose positions differ by at most this many page points snap
    /// into one grid boundary. Default: 3.0.
    pub snap_tolerance: f32,

    /// Collinear line fragments separated by at most this many page points
    /// join into one boundary. Default: 3.0.
    pub join_tolerance: f32,

    // ── Execution ─────────────────────────────────────────────────────────
    /// Worker count for page-chunk extraction. `0` means one worker per
    /// available CPU. The effective count never exceeds the page count.
    /// Default: 0.
    pub workers: usize,

    /// Bound on total parse wall-clock, in seconds. Exceeding it fails the
    /// whole parse. Default: 300.
    pub parse_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Optional chunk-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            balance_tolerance: 10.0,
            spike_threshold: 0.20,
            overtime_ceiling: 48.0,
            min_row_columns: 17,
            snap_tolerance: 3.0,
            join_tolerance: 3.0,
            workers: 0,
            parse_timeout_secs: 300,
            password: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AuditConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditConfig")
            .field("balance_tolerance", &self.balance_tolerance)
            .field("spike_threshold", &self.spike_threshold)
            .field("overtime_ceiling", &self.overtime_ceiling)
            .field("min_row_columns", &self.min_row_columns)
            .field("snap_tolerance", &self.snap_tolerance)
            .field("join_tolerance", &self.join_tolerance)
            .field("workers", &self.workers)
            .field("parse_timeout_secs", &self.parse_timeout_secs)
            .field("password", &self.password.as_ref().map(|_| "<set>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl AuditConfig {
    /// Create a new builder for `AuditConfig`.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder {
            config: Self::default(),
        }
    }

    /// Worker count to use for a document with `total_pages` pages.
    ///
    /// Resolves `workers == 0` to the available parallelism and clamps to
    /// the page count, so no worker is ever dispatched without pages.
    pub fn effective_workers(&self, total_pages: usize) -> usize {
        let configured = if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        };
        configured.clamp(1, total_pages.max(1))
    }
}

/// Builder for [`AuditConfig`].
#[derive(Debug)]
pub struct AuditConfigBuilder {
    config: AuditConfig,
}

impl AuditConfigBuilder {
    pub fn balance_tolerance(mut self, tolerance: f64) -> Self {
        self.config.balance_tolerance = tolerance.max(0.0);
        self
    }

    pub fn spike_threshold(mut self, threshold: f64) -> Self {
        self.config.spike_threshold = threshold.max(0.0);
        self
    }

    pub fn overtime_ceiling(mut self, hours: f64) -> Self {
        self.config.overtime_ceiling = hours.max(0.0);
        self
    }

    pub fn min_row_columns(mut self, columns: usize) -> Self {
        self.config.min_row_columns = columns.max(1);
        self
    }

    pub fn snap_tolerance(mut self, points: f32) -> Self {
        self.config.snap_tolerance = points.max(0.0);
        self
    }

    pub fn join_tolerance(mut self, points: f32) -> Self {
        self.config.join_tolerance = points.max(0.0);
        self
    }

    /// `0` selects one worker per available CPU.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    pub fn parse_timeout_secs(mut self, secs: u64) -> Self {
        self.config.parse_timeout_secs = secs.max(1);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AuditConfig, AuditError> {
        let c = &self.config;
        if !c.balance_tolerance.is_finite() || c.balance_tolerance < 0.0 {
            return Err(AuditError::InvalidConfig(format!(
                "balance tolerance must be a non-negative number, got {}",
                c.balance_tolerance
            )));
        }
        if !c.spike_threshold.is_finite() || c.spike_threshold < 0.0 {
            return Err(AuditError::InvalidConfig(format!(
                "spike threshold must be a non-negative fraction, got {}",
                c.spike_threshold
            )));
        }
        if c.min_row_columns == 0 {
            return Err(AuditError::InvalidConfig(
                "minimum row columns must be at least 1".into(),
            ));
        }
        if c.parse_timeout_secs == 0 {
            return Err(AuditError::InvalidConfig(
                "parse timeout must be at least 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
