//! Dosecycle CLI
//!
//! Usage:
//!   dosecycle medication add <name> --frequency daily [--fixed-dose 5] [--class anticoagulant]
//!   dosecycle pattern create <medication-id> --sequence 4,4,3 --start 2025-01-15
//!   dosecycle schedule <medication-id> --start 2025-01-15 --days 30
//!   dosecycle dose record <medication-id> 3.5 [--taken-at 2025-01-15T08:00:00]
//!   dosecycle logs [--medication <id>] [--variance-only]

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use dosecycle_lib::commands::{self, EngineContext};
use dosecycle_lib::config::{self, ConfigError};
use dosecycle_lib::db::{open_database_with_timeout, DatabaseError};
use dosecycle_lib::dosing::DosingError;
use dosecycle_lib::models::{
    Frequency, LogFilter, NewDoseLog, NewMedication, NewPattern, PageRequest, PatternHistoryFilter,
};

#[derive(Parser)]
#[command(name = "dosecycle")]
#[command(version)]
#[command(about = "Cyclic medication dosage patterns, schedules and dose variance", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// SQLite database file (defaults to ~/Dosecycle/dosecycle.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Engine config JSON (defaults to ~/Dosecycle/engine.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Owner scope for every read and write
    #[arg(long, global = true, default_value = "local")]
    owner: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Medication master data
    Medication {
        #[command(subcommand)]
        action: MedicationAction,
    },

    /// Class dose caps
    Cap {
        #[command(subcommand)]
        action: CapAction,
    },

    /// Dosage patterns
    Pattern {
        #[command(subcommand)]
        action: PatternAction,
    },

    /// Dose lookups and recording
    Dose {
        #[command(subcommand)]
        action: DoseAction,
    },

    /// Day-by-day schedule
    Schedule {
        medication_id: Uuid,

        /// First day (defaults to today)
        #[arg(long)]
        start: Option<NaiveDate>,

        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Query recorded doses
    Logs {
        #[arg(long)]
        medication: Option<Uuid>,

        /// Earliest taken date, inclusive
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest taken date, inclusive
        #[arg(long)]
        to: Option<NaiveDate>,

        #[arg(long)]
        variance_only: bool,

        #[arg(long, default_value = "0.01")]
        threshold: Decimal,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,
    },
}

#[derive(Subcommand)]
enum MedicationAction {
    /// Register a medication
    Add {
        name: String,

        /// daily, every_other_day, weekly, or custom:mon,wed,fri
        #[arg(long, default_value = "daily")]
        frequency: Frequency,

        /// Day zero for interval frequencies (defaults to today)
        #[arg(long)]
        anchor: Option<NaiveDate>,

        #[arg(long)]
        fixed_dose: Option<Decimal>,

        #[arg(long)]
        class: Option<String>,
    },

    /// List medications for the owner
    List,
}

#[derive(Subcommand)]
enum CapAction {
    /// Set the maximum single dose for a class
    Set { class: String, max_single_dose: Decimal },
}

#[derive(Subcommand)]
enum PatternAction {
    /// Create a pattern, closing the active one the day before
    Create {
        medication_id: Uuid,

        /// Comma-separated doses, e.g. 4,4,3
        #[arg(long, value_delimiter = ',', required = true)]
        sequence: Vec<Decimal>,

        #[arg(long)]
        start: NaiveDate,

        /// Last effective day, inclusive
        #[arg(long)]
        end: Option<NaiveDate>,

        #[arg(long)]
        notes: Option<String>,

        /// Fail instead of closing the active pattern
        #[arg(long)]
        keep_previous: bool,
    },

    /// Show the open-ended pattern
    Active { medication_id: Uuid },

    /// Page through pattern history, newest first
    History {
        medication_id: Uuid,

        #[arg(long)]
        active_only: bool,

        #[arg(long, default_value = "1")]
        page: u32,

        #[arg(long, default_value = "20")]
        page_size: u32,
    },
}

#[derive(Subcommand)]
enum DoseAction {
    /// Expected dose on a date (defaults to today)
    Expected {
        medication_id: Uuid,

        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Record a dose taken
    Record {
        medication_id: Uuid,

        dosage: Decimal,

        /// Local time, e.g. 2025-01-15T08:00:00 (defaults to now)
        #[arg(long)]
        taken_at: Option<NaiveDateTime>,

        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Dosing(#[from] DosingError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            CliError::Dosing(e) => e.code(),
            CliError::Database(_) => "STORAGE",
            CliError::Config(_) => "CONFIG",
            CliError::Output(_) => "INTERNAL",
        }
    }

    fn body(&self) -> Value {
        let mut detail = json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let CliError::Dosing(DosingError::Validation(v)) = self {
            detail["violations"] = json!(v.violations);
        }
        json!({ "error": detail })
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let config_path = cli.config.unwrap_or_else(config::engine_config_path);
    let engine_config = config::load_engine_config(&config_path)?;
    let db_path = cli.db.unwrap_or_else(config::database_path);
    let conn = open_database_with_timeout(
        &db_path,
        std::time::Duration::from_millis(engine_config.busy_timeout_ms),
    )?;

    let ctx = EngineContext::for_owner(cli.owner, engine_config);
    tracing::debug!(db = %db_path.display(), owner = %ctx.owner_id, "Database opened");

    match cli.command {
        Commands::Medication { action } => match action {
            MedicationAction::Add {
                name,
                frequency,
                anchor,
                fixed_dose,
                class,
            } => {
                let input = NewMedication {
                    name,
                    frequency,
                    schedule_anchor: anchor.unwrap_or_else(|| ctx.today()),
                    fixed_dose,
                    medication_class: class,
                };
                to_json(commands::register_medication(&conn, &ctx, input)?)
            }
            MedicationAction::List => to_json(commands::get_medications(&conn, &ctx)?),
        },

        Commands::Cap {
            action: CapAction::Set {
                class,
                max_single_dose,
            },
        } => to_json(commands::upsert_dose_cap(&conn, &ctx, &class, max_single_dose)?),

        Commands::Pattern { action } => match action {
            PatternAction::Create {
                medication_id,
                sequence,
                start,
                end,
                notes,
                keep_previous,
            } => {
                let input = NewPattern {
                    medication_id,
                    sequence,
                    start_date: start,
                    end_date: end,
                    notes,
                    close_previous: !keep_previous,
                };
                to_json(commands::create_pattern(&conn, &ctx, input)?)
            }
            PatternAction::Active { medication_id } => {
                to_json(commands::get_active_pattern(&conn, &ctx, &medication_id)?)
            }
            PatternAction::History {
                medication_id,
                active_only,
                page,
                page_size,
            } => to_json(commands::get_pattern_history(
                &conn,
                &ctx,
                &medication_id,
                &PatternHistoryFilter { active_only },
                PageRequest::new(page, page_size),
            )?),
        },

        Commands::Dose { action } => match action {
            DoseAction::Expected { medication_id, date } => {
                let date = date.unwrap_or_else(|| ctx.today());
                to_json(commands::get_expected_dose(&conn, &ctx, &medication_id, date)?)
            }
            DoseAction::Record {
                medication_id,
                dosage,
                taken_at,
                notes,
            } => {
                let input = NewDoseLog {
                    medication_id,
                    dosage,
                    taken_at: taken_at.unwrap_or(ctx.now),
                    notes,
                };
                to_json(commands::record_dose(&conn, &ctx, input)?)
            }
        },

        Commands::Schedule {
            medication_id,
            start,
            days,
        } => {
            let start = start.unwrap_or_else(|| ctx.today());
            to_json(commands::generate_schedule(&conn, &ctx, &medication_id, start, days)?)
        }

        Commands::Logs {
            medication,
            from,
            to,
            variance_only,
            threshold,
            page,
            page_size,
        } => {
            let filter = LogFilter {
                medication_id: medication,
                start_date: from,
                end_date: to,
                variance_only,
                variance_threshold: threshold,
            };
            to_json(commands::get_logs(
                &conn,
                &ctx,
                &filter,
                PageRequest::new(page, page_size),
            )?)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    dosecycle_lib::init_tracing();

    match run(cli) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "Command failed");
            eprintln!("{}", serde_json::to_string_pretty(&e.body()).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}
