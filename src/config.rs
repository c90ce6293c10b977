use std::path::PathBuf;

use anyhow::Context;
use simplelog::LevelFilter;

use crate::grading::GradeScale;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub log_level: LevelFilter,
    pub grade_scale: GradeScale,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match std::env::var("SIMULATION_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("SIMULATION_MAX_CONNECTIONS is not a number: {raw}"))?,
            Err(_) => 5,
        };

        let log_level = match std::env::var("SIMULATION_LOG_LEVEL") {
            Ok(raw) => parse_level(&raw)?,
            Err(_) => LevelFilter::Info,
        };

        let grade_scale = match std::env::var_os("SIMULATION_GRADE_SCALE") {
            Some(path) => GradeScale::from_json_file(&PathBuf::from(path))?,
            None => GradeScale::default(),
        };

        Ok(Self {
            database_url,
            max_connections,
            log_level,
            grade_scale,
        })
    }
}

pub fn parse_level(raw: &str) -> anyhow::Result<LevelFilter> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" => Ok(LevelFilter::Off),
        "error" => Ok(LevelFilter::Error),
        "warn" => Ok(LevelFilter::Warn),
        "info" => Ok(LevelFilter::Info),
        "debug" => Ok(LevelFilter::Debug),
        "trace" => Ok(LevelFilter::Trace),
        other => anyhow::bail!("unknown log level '{other}'"),
    }
}
