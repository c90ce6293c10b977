use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use sqlx::postgres::PgPoolOptions;

mod config;
mod db;
mod engine;
mod error;
mod grading;
mod merge;
mod models;
mod report;
mod store;
mod trend;
mod validate;

use crate::config::AppConfig;
use crate::db::PgBackend;
use crate::engine::SimulationEngine;
use crate::error::SimulationError;
use crate::models::Track;

#[derive(Parser)]
#[command(name = "academic-simulation")]
#[command(about = "What-if GPA simulation for a future semester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import finalized grades from a CSV file
    ImportGrades {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Simulate a semester and keep it as the student's active session
    Calculate {
        #[arg(long)]
        nim: String,
        /// JSON request body, or `-` for stdin
        #[arg(long, default_value = "-")]
        payload: PathBuf,
        /// Also write a markdown report
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// List the default course plan for a semester
    Plan {
        #[arg(long)]
        semester: u32,
        #[arg(long, default_value_t = Track::Regular)]
        track: Track,
    },
    /// Show the student's saved simulation session
    Resume {
        #[arg(long)]
        nim: String,
    },
    /// Discard the student's simulation session
    EndSession {
        #[arg(long)]
        nim: String,
    },
}

/// Envelope printed for every engine command.
#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn respond<T: Serialize>(outcome: Result<(String, Option<T>), SimulationError>) -> anyhow::Result<()> {
    match outcome {
        Ok((message, data)) => {
            let response = Response {
                success: true,
                status: 200,
                message,
                data,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(err) => {
            log::error!("request failed ({}): {err}", err.status());
            let response: Response<()> = Response {
                success: false,
                status: err.status(),
                message: err.to_string(),
                data: None,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
            std::process::exit(err.exit_code());
        }
    }
}

fn read_payload(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read payload from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read payload {}", path.display()))?
    };
    // Unparseable bodies are reported by the engine as malformed requests.
    Ok(serde_json::from_str(&raw).unwrap_or_else(|err| {
        log::warn!("payload is not valid JSON: {err}");
        serde_json::Value::Null
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    TermLogger::init(
        config.log_level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("failed to initialize logging")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let backend = PgBackend::new(pool.clone(), config.grade_scale.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool, &config.grade_scale).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportGrades { csv } => {
            let inserted = db::import_csv(&pool, &config.grade_scale, &csv).await?;
            println!("Inserted {inserted} grades from {}.", csv.display());
        }
        Commands::Calculate {
            nim,
            payload,
            report,
        } => {
            let student = backend.find_student(&nim).await?;
            let body = read_payload(&payload)?;
            let engine = SimulationEngine::new(backend, config.grade_scale);
            let outcome = engine.calculate(student.id, &body).await;

            if let (Ok(calculation), Some(out)) = (&outcome, &report) {
                std::fs::write(
                    out,
                    crate::report::build_report(
                        &student,
                        calculation.target_period,
                        calculation.track,
                        &calculation.result,
                    ),
                )
                .with_context(|| format!("failed to write report {}", out.display()))?;
                log::info!("report written to {}", out.display());
            }

            respond(outcome.map(|calculation| {
                (
                    "Simulation calculated and saved until the session ends.".to_string(),
                    Some(calculation.result),
                )
            }))?;
        }
        Commands::Plan { semester, track } => {
            let engine = SimulationEngine::new(backend, config.grade_scale);
            let outcome = engine.default_plan(semester, track).await;
            respond(outcome.map(|courses| {
                let message = if courses.is_empty() {
                    format!("No default study plan for semester {semester} ({track}).")
                } else {
                    format!("Study plan for semester {semester} ({track}) retrieved.")
                };
                (message, Some(courses))
            }))?;
        }
        Commands::Resume { nim } => {
            let student = backend.find_student(&nim).await?;
            let engine = SimulationEngine::new(backend, config.grade_scale);
            let outcome = engine.resume(student.id).await;
            respond(outcome.map(|session| match session {
                Some(session) => ("Simulation session restored.".to_string(), Some(session)),
                None => ("No active simulation session.".to_string(), None),
            }))?;
        }
        Commands::EndSession { nim } => {
            let student = backend.find_student(&nim).await?;
            let engine = SimulationEngine::new(backend, config.grade_scale);
            let outcome = engine.end_session(student.id).await;
            respond(outcome.map(|()| {
                (
                    "Simulation session ended and temporary data removed.".to_string(),
                    None::<()>,
                )
            }))?;
        }
    }

    Ok(())
}
