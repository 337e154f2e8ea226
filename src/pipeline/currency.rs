//! Currency normalisation: locale-formatted numeric cells to `f64`.
//!
//! Payroll exports format amounts with `.` as the thousands separator and
//! `,` as the decimal separator (`"12.345,67"`). Table cells are frequently
//! empty, the literal `"0"`, or garbled by the text layer; a malformed cell
//! must never abort the pipeline, so every failure mode normalises to `0.0`.

/// Convert a locale-formatted cell value to a float.
///
/// - `None`, empty, or the literal `"0"` yield `0.0`.
/// - `.` is treated as a thousands separator (removed); `,` becomes the
///   decimal point.
/// - Any residual non-numeric content yields `0.0` rather than an error.
///
/// # Example
/// ```rust
/// use bordro_audit::pipeline::currency::normalize;
///
/// assert_eq!(normalize(Some("1.234,56")), 1234.56);
/// assert_eq!(normalize(Some("")), 0.0);
/// assert_eq!(normalize(None), 0.0);
/// ```
pub fn normalize(raw: Option<&str>) -> f64 {
    let Some(raw) = raw else {
        return 0.0;
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "0" {
        return 0.0;
    }

    let cleaned = trimmed.replace('.', "").replace(',', ".");
    cleaned.parse::<f64>().unwrap_or(0.0)
}
