//! CLI binary for bordro-audit.
//!
//! A thin shim over the library crate that maps CLI flags to `AuditConfig`,
//! drives the record store, and prints findings.

use anyhow::{Context, Result};
use bordro_audit::{
    inspect, parse, AnomalyEngine, AuditConfig, AuditError, PageRange, ParseOutput,
    ParseProgressCallback, ProgressCallback, RecordStore,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: renders a live progress bar and per-chunk log
/// lines using [indicatif]. Chunks complete out of order, so the bar length
/// is set once by `on_parse_start` and each completion increments it.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_parse_start` (called once the document has been probed).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_parse_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} chunks  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Extracting");
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_parse_start(&self, total_pages: usize, chunk_count: usize) {
        self.activate_bar(chunk_count);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Extracting {total_pages} pages across {chunk_count} workers…"
            ))
        ));
    }

    fn on_chunk_start(&self, range: PageRange) {
        self.bar.set_message(range.to_string());
    }

    fn on_chunk_complete(&self, range: PageRange, records: usize) {
        self.bar.println(format!(
            "  {} {:<12}  {}",
            green("✓"),
            range.to_string(),
            dim(&format!("{records} records")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, range: PageRange, error: String) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.len() > 80 {
            format!("{}\u{2026}", &error[..79])
        } else {
            error
        };

        self.bar.println(format!(
            "  {} {:<12}  {}",
            yellow("⚠"),
            range.to_string(),
            yellow(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_parse_complete(&self, _total_pages: usize, records: usize) {
        self.bar.finish_and_clear();
        let degraded = self.errors.load(Ordering::SeqCst);

        if degraded == 0 {
            eprintln!(
                "{} {} records extracted",
                green("✔"),
                bold(&records.to_string())
            );
        } else {
            eprintln!(
                "{} {} records extracted  ({} degraded chunks)",
                yellow("⚠"),
                bold(&records.to_string()),
                yellow(&degraded.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze a payroll PDF against the local store
  bordro analyze bordro_2024_03.pdf

  # Evaluate without persisting the records
  bordro analyze --dry-run bordro_2024_03.pdf

  # Machine-readable findings
  bordro analyze --json bordro_2024_03.pdf > findings.json

  # Pin the worker count and timeout for a very large export
  bordro analyze --workers 8 --timeout-secs 900 yillik_bordro.pdf

  # Page count and PDF version, no extraction
  bordro inspect bordro_2024_03.pdf

  # Stored records, newest period last
  bordro records

  # Start a fresh audit session
  bordro clear --yes

AUDIT RULES:
  balance    |kazanç − (kesinti + ödeme)| ≤ 10.00 TL
  spike      month-over-month earnings increase > 20%
  overtime   monthly overtime ≤ 48 hours

  A record may trigger several rules at once; every rule is evaluated
  independently. The spike rule needs the same employee's record for the
  preceding month in the store, so analyze months in calendar order.

ENVIRONMENT VARIABLES:
  BORDRO_DB        Record store path (default: bordro.db)
  PDFIUM_LIB_PATH  Path to an existing libpdfium
  RUST_LOG         Tracing filter, e.g. bordro_audit=debug
"#;

/// Extract payroll records from PDF exports and flag compensation anomalies.
#[derive(Parser, Debug)]
#[command(
    name = "bordro",
    version,
    about = "Extract payroll records from PDF exports and flag compensation anomalies",
    long_about = "Parse payroll summary PDFs into structured per-employee records, persist \
them in a local SQLite store, and evaluate three audit rules against each record: \
earnings/deductions balance, month-over-month earnings spike, and the monthly \
overtime ceiling.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Record store path.
    #[arg(long, global = true, env = "BORDRO_DB", default_value = "bordro.db")]
    db: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "BORDRO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and findings.
    #[arg(short, long, global = true, env = "BORDRO_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a payroll PDF, evaluate anomalies, and store the records.
    Analyze {
        /// Path to the payroll PDF.
        input: PathBuf,

        /// Output structured JSON instead of text.
        #[arg(long, env = "BORDRO_JSON")]
        json: bool,

        /// Evaluate but do not persist the parsed records.
        #[arg(long)]
        dry_run: bool,

        /// Worker count for page extraction (0 = one per CPU).
        #[arg(short, long, env = "BORDRO_WORKERS", default_value_t = 0)]
        workers: usize,

        /// Bound on total parse wall-clock in seconds.
        #[arg(long, env = "BORDRO_TIMEOUT", default_value_t = 300)]
        timeout_secs: u64,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "BORDRO_PASSWORD")]
        password: Option<String>,

        /// Disable the progress bar.
        #[arg(long, env = "BORDRO_NO_PROGRESS")]
        no_progress: bool,
    },

    /// Print a document's page count and PDF version, no extraction.
    Inspect {
        /// Path to the payroll PDF.
        input: PathBuf,

        /// Output structured JSON instead of text.
        #[arg(long)]
        json: bool,

        /// PDF user password for encrypted documents.
        #[arg(long, env = "BORDRO_PASSWORD")]
        password: Option<String>,
    },

    /// List stored payroll records.
    Records {
        /// Output structured JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Delete every stored record.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides the feedback that matters to the user.
    let show_progress = matches!(
        &cli.command,
        Commands::Analyze {
            no_progress: false,
            json: false,
            ..
        }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Commands::Analyze {
            ref input,
            json,
            dry_run,
            workers,
            timeout_secs,
            ref password,
            ..
        } => {
            run_analyze(
                input,
                &cli.db,
                json,
                dry_run,
                workers,
                timeout_secs,
                password.clone(),
                show_progress,
                cli.quiet,
            )
            .await
        }
        Commands::Inspect {
            ref input,
            json,
            ref password,
        } => run_inspect(input, json, password.as_deref()).await,
        Commands::Records { json } => run_records(&cli.db, json),
        Commands::Clear { yes } => run_clear(&cli.db, yes),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_analyze(
    input: &PathBuf,
    db: &PathBuf,
    json: bool,
    dry_run: bool,
    workers: usize,
    timeout_secs: u64,
    password: Option<String>,
    show_progress: bool,
    quiet: bool,
) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ParseProgressCallback>)
    } else {
        None
    };

    let mut builder = AuditConfig::builder()
        .workers(workers)
        .parse_timeout_secs(timeout_secs);
    if let Some(password) = password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let output = parse(input, &config).await.context("Parse failed")?;

    // A clean parse with zero employee rows is a rejected upload, not a
    // processing error; keep the two failure modes distinguishable.
    if output.records.is_empty() {
        return Err(AuditError::NoExtractableData {
            path: input.clone(),
        })
        .context("The document parsed but contained no employee rows");
    }

    let mut store = RecordStore::open(db)
        .with_context(|| format!("Failed to open record store at {}", db.display()))?;
    let engine = AnomalyEngine::new(&config);
    let reports = engine
        .evaluate(&output.records, &store)
        .context("Anomaly evaluation failed")?;

    if !dry_run {
        store
            .insert_batch(&output.records)
            .context("Failed to persist records")?;
    }

    if json {
        let value = serde_json::json!({
            "message": format!("{} kayıt başarıyla işlendi.", output.records.len()),
            "period": output.period.map(|d| d.format("%Y-%m").to_string()),
            "stats": output.stats,
            "chunk_errors": output.chunk_errors,
            "anomalies": reports,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_analyze_summary(&output, reports.len(), dry_run, quiet);
    for report in &reports {
        println!(
            "{} {}  {}",
            red("✗"),
            bold(&report.record.personel_ad),
            dim(&report.record.donem.format("%Y-%m").to_string()),
        );
        for issue in &report.issues {
            println!("    {issue}");
        }
    }
    if reports.is_empty() && !quiet {
        println!("{} No anomalies found", green("✔"));
    }

    Ok(())
}

fn print_analyze_summary(output: &ParseOutput, anomalies: usize, dry_run: bool, quiet: bool) {
    if quiet {
        return;
    }

    match output.period {
        Some(period) => eprintln!(
            "{} {} records  ·  period {}  ·  {} anomalies{}",
            green("✔"),
            output.records.len(),
            bold(&period.format("%Y-%m").to_string()),
            anomalies,
            if dry_run { dim("  (dry run)") } else { String::new() },
        ),
        None => {
            eprintln!(
                "{} {} records  ·  {} anomalies{}",
                green("✔"),
                output.records.len(),
                anomalies,
                if dry_run { dim("  (dry run)") } else { String::new() },
            );
            eprintln!(
                "{} no period phrase found; records carry the ingestion date and \
                 spike findings for this document are unreliable",
                yellow("⚠"),
            );
        }
    }

    for error in &output.chunk_errors {
        eprintln!("{} {}", yellow("⚠"), error);
    }
}

async fn run_inspect(input: &PathBuf, json: bool, password: Option<&str>) -> Result<()> {
    let info = inspect(input, password)
        .await
        .context("Failed to inspect PDF")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File:         {}", input.display());
        println!("Pages:        {}", info.page_count);
        println!("PDF Version:  {}", info.pdf_version);
    }
    Ok(())
}

fn run_records(db: &PathBuf, json: bool) -> Result<()> {
    let store = RecordStore::open(db)
        .with_context(|| format!("Failed to open record store at {}", db.display()))?;
    let records = store.list_all().context("Failed to list records")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for record in &records {
        writeln!(
            handle,
            "{}  {:<30}  maaş {:>12.2}  kazanç {:>12.2}  ödeme {:>12.2}",
            record.donem.format("%Y-%m"),
            record.personel_ad,
            record.maas,
            record.toplam_kazanc(),
            record.toplam_odeme(),
        )?;
    }
    eprintln!("{} records in {}", records.len(), db.display());
    Ok(())
}

fn run_clear(db: &PathBuf, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("This deletes every stored record; re-run with --yes to confirm.");
    }

    let store = RecordStore::open(db)
        .with_context(|| format!("Failed to open record store at {}", db.display()))?;
    let removed = store.clear_all().context("Failed to clear store")?;
    eprintln!("{} Removed {} records", green("✔"), removed);
    Ok(())
}
