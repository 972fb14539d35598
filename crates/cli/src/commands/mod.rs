pub mod config;
pub mod doctor;
pub mod history;
pub mod migrate;
pub mod run;
pub mod seed;

use adpilot_core::config::{AppConfig, LoadOptions, LogFormat};
use adpilot_db::{connect_with_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\
             \"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads configuration and a current-thread runtime, or the failure to print.
pub(crate) fn prepare(command: &str) -> Result<(AppConfig, Runtime), CommandResult> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    Ok((config, runtime))
}

/// Connects and applies pending migrations.
pub(crate) async fn open_database(
    config: &AppConfig,
) -> Result<DbPool, (&'static str, String, u8)> {
    let pool = connect_with_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool).await.map_err(|error| ("migration", error.to_string(), 5u8))?;
    Ok(pool)
}

/// Installs the stderr subscriber once per process; stdout carries command payloads.
pub(crate) fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
