//! Metaflux CLI - Command-line interface for Metabolic Flux
//!
//! Commands:
//! - log-event: Record a food/workout/weather/sleep event in the journal
//! - log-symptom: Record a symptom episode
//! - correlations: Events that keep preceding a symptom
//! - patterns: Monthly Clue/Evidence patterns
//! - targets: Compute adaptive targets from a snapshot and a profile
//! - doctor: Diagnose journal and configuration health

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use metabolic_flux::config::{EngineConfig, Profile};
use metabolic_flux::journal::BioJournal;
use metabolic_flux::pipeline::compute_target_report;
use metabolic_flux::store::{EventStore, LazyEventStore};
use metabolic_flux::types::{DailyBioSnapshot, EventType, EventValue};
use metabolic_flux::{FLUX_VERSION, PRODUCER_NAME};

/// Metaflux - Symptom journal and adaptive metabolic targets
#[derive(Parser)]
#[command(name = "metaflux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Correlate symptoms with meals and compute daily metabolic targets", long_about = None)]
struct Cli {
    /// Journal database path
    #[arg(long, global = true, default_value = "metaflux.db")]
    db: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record an event
    LogEvent {
        /// Event type
        #[arg(long = "type", value_enum)]
        event_type: EventKind,

        /// Event name (e.g. "Pizza")
        #[arg(long)]
        name: String,

        /// Payload: plain text, a number, or JSON (e.g. '{"ingredients":["flour"]}')
        #[arg(long, default_value = "")]
        value: String,

        /// Timestamp (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Record a symptom episode
    LogSymptom {
        /// Symptom name (e.g. "Nausea")
        #[arg(long)]
        name: String,

        /// Intensity 1-10 (clamped)
        #[arg(long, default_value = "5", allow_hyphen_values = true)]
        intensity: i64,

        /// Timestamp (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Show events correlated with a symptom
    Correlations {
        /// Symptom name
        #[arg(long)]
        symptom: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recurring patterns for a month
    Patterns {
        #[arg(long)]
        year: i32,

        /// Month 1-12
        #[arg(long)]
        month: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute adaptive targets
    Targets {
        /// Snapshot JSON file (use - for stdin)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Profile JSON file; defaults to the built-in profile
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Reference time for the fasting clock (RFC 3339); defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,

        /// Include the carb, protein, coach and sodium breakdown
        #[arg(long)]
        report: bool,
    },

    /// Diagnose journal and configuration health
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EventKind {
    Food,
    Workout,
    Weather,
    Sleep,
}

impl From<EventKind> for EventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Food => EventType::Food,
            EventKind::Workout => EventType::Workout,
            EventKind::Weather => EventType::Weather,
            EventKind::Sleep => EventType::Sleep,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), MetafluxCliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::LogEvent {
            event_type,
            name,
            value,
            at,
        } => {
            let journal = open_journal(&cli.db, &config);
            let id = journal.log_event_at(
                event_type.into(),
                &name,
                EventValue::from_input(&value),
                at.unwrap_or_else(Utc::now),
            );
            report_id(id)
        }

        Commands::LogSymptom {
            name,
            intensity,
            at,
        } => {
            let journal = open_journal(&cli.db, &config);
            let id = journal.log_symptom_at(&name, intensity, at.unwrap_or_else(Utc::now));
            report_id(id)
        }

        Commands::Correlations { symptom, json } => {
            let journal = open_journal(&cli.db, &config);
            let results = journal.find_correlations(&symptom);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No correlations for {symptom:?} yet");
            } else {
                println!("Before {symptom:?} ({} episodes):", results[0].symptom_episodes);
                for r in &results {
                    println!(
                        "  {:>3}%  {} ({}) - {} episodes",
                        r.percentage_of_episodes,
                        r.event_name,
                        r.event_type.as_str(),
                        r.occurrences
                    );
                }
            }
            Ok(())
        }

        Commands::Patterns { year, month, json } => {
            if !(1..=12).contains(&month) {
                return Err(MetafluxCliError::InvalidArgument(format!(
                    "month must be 1-12, got {month}"
                )));
            }

            let journal = open_journal(&cli.db, &config);
            let patterns = journal.monthly_patterns(year, month);

            if json {
                println!("{}", serde_json::to_string_pretty(&patterns)?);
            } else if patterns.is_empty() {
                println!("No patterns in {year}-{month:02}");
            } else {
                for p in &patterns {
                    let dates: Vec<String> =
                        p.symptom_dates.iter().map(|d| d.to_string()).collect();
                    println!(
                        "  [{}] {} ({}) -> {}: {} days ({})",
                        p.tier.as_str(),
                        p.event_name,
                        p.event_type.as_str(),
                        p.symptom_name,
                        p.count,
                        dates.join(", ")
                    );
                    if let Some(ingredients) = &p.ingredients {
                        println!("        ingredients: {}", ingredients.join(", "));
                    }
                }
            }
            Ok(())
        }

        Commands::Targets {
            snapshot,
            profile,
            now,
            report,
        } => cmd_targets(&snapshot, profile.as_deref(), now, report, &config),

        Commands::Doctor { json } => cmd_doctor(&cli.db, cli.config.as_deref(), json),
    }
}

fn open_journal(db: &Path, config: &EngineConfig) -> BioJournal {
    BioJournal::with_store_and_config(Box::new(LazyEventStore::new(db)), config)
}

fn report_id(id: i64) -> Result<(), MetafluxCliError> {
    if id == 0 {
        return Err(MetafluxCliError::NotPersisted);
    }
    println!("{id}");
    Ok(())
}

fn read_input(path: &Path) -> Result<String, MetafluxCliError> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn cmd_targets(
    snapshot_path: &Path,
    profile_path: Option<&Path>,
    now: Option<DateTime<Utc>>,
    full_report: bool,
    config: &EngineConfig,
) -> Result<(), MetafluxCliError> {
    let snapshot: DailyBioSnapshot = serde_json::from_str(&read_input(snapshot_path)?)?;
    let profile = match profile_path {
        Some(path) => Profile::from_json(&read_input(path)?)?,
        None => Profile::default(),
    };

    let report = compute_target_report(&snapshot, &profile, config, now.unwrap_or_else(Utc::now));
    if full_report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&report.targets)?);
    }
    Ok(())
}

fn cmd_doctor(db: &Path, config_path: Option<&Path>, json: bool) -> Result<(), MetafluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Metabolic Flux version {FLUX_VERSION}"),
    });

    // Check configuration file if provided
    match config_path {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid ({}h window, Clue >= {}, Evidence >= {})",
                    config.lookback_hours, config.clue_min_dates, config.evidence_min_dates
                ),
            }),
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    // Check the journal opens and can be read
    let store = LazyEventStore::new(db);
    if !db.exists() && db.as_os_str() != ":memory:" {
        checks.push(DoctorCheck {
            name: "journal".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Journal at {} does not exist yet; it is created on first write",
                db.display()
            ),
        });
    } else if store.is_available() {
        match (store.recent_events(1), store.distinct_symptom_names()) {
            (Ok(_), Ok(names)) => checks.push(DoctorCheck {
                name: "journal".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Journal at {} readable ({} distinct symptoms)",
                    db.display(),
                    names.len()
                ),
            }),
            (Err(e), _) | (_, Err(e)) => checks.push(DoctorCheck {
                name: "journal".to_string(),
                status: CheckStatus::Error,
                message: format!("Journal at {} unreadable: {e}", db.display()),
            }),
        }
    } else {
        checks.push(DoctorCheck {
            name: "journal".to_string(),
            status: CheckStatus::Error,
            message: format!(
                "Journal at {} cannot be opened; writes would be dropped",
                db.display()
            ),
        });
    }

    // Check stdin is available (for `targets --snapshot -`)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (snapshot can be piped in)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Metaflux Doctor Report");
        println!("======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(MetafluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum MetafluxCliError {
    Io(io::Error),
    Compute(metabolic_flux::ComputeError),
    Json(serde_json::Error),
    InvalidArgument(String),
    NotPersisted,
    DoctorFailed,
}

impl From<io::Error> for MetafluxCliError {
    fn from(e: io::Error) -> Self {
        MetafluxCliError::Io(e)
    }
}

impl From<metabolic_flux::ComputeError> for MetafluxCliError {
    fn from(e: metabolic_flux::ComputeError) -> Self {
        MetafluxCliError::Compute(e)
    }
}

impl From<serde_json::Error> for MetafluxCliError {
    fn from(e: serde_json::Error) -> Self {
        MetafluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<MetafluxCliError> for CliError {
    fn from(e: MetafluxCliError) -> Self {
        match e {
            MetafluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            MetafluxCliError::Compute(e) => CliError {
                code: "COMPUTE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the config and profile files".to_string()),
            },
            MetafluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax; snapshots need at least a date".to_string()),
            },
            MetafluxCliError::InvalidArgument(msg) => CliError {
                code: "INVALID_ARGUMENT".to_string(),
                message: msg,
                hint: None,
            },
            MetafluxCliError::NotPersisted => CliError {
                code: "NOT_PERSISTED".to_string(),
                message: "The journal did not record the entry".to_string(),
                hint: Some("Run 'metaflux doctor' to check the database path".to_string()),
            },
            MetafluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
