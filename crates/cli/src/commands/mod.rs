pub mod applicable;
pub mod config;
pub mod issue;
pub mod migrate;
pub mod offer;
pub mod seed;
pub mod voucher;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

use offerly_core::config::{AppConfig, LoadOptions};
use offerly_core::domain::fact::Fact;
use offerly_db::repositories::{SqlTemplateRepository, SqlVoucherRepository};
use offerly_db::{connect_with_settings, migrations, DbPool};
use offerly_engine::{PromotionService, ServiceError};

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

    fn from_failure(command: &str, failure: Failure) -> Self {
        let (error_class, message, exit_code) = failure;
        Self::failure(command, error_class, message, exit_code)
    }
}

/// `(error_class, message, exit_code)` carried out of an async command body.
pub(crate) type Failure = (&'static str, String, u8);

pub(crate) const EXIT_CONFIG: u8 = 2;
pub(crate) const EXIT_RUNTIME: u8 = 3;
pub(crate) const EXIT_DATABASE: u8 = 4;
pub(crate) const EXIT_MIGRATION: u8 = 5;
pub(crate) const EXIT_SERVICE: u8 = 6;
pub(crate) const EXIT_TIMEOUT: u8 = 7;

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads configuration and a current-thread runtime, then runs `body` to
/// completion. Every command goes through here so failures map to the same
/// error classes and exit codes.
pub(crate) fn execute<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: std::future::Future<Output = Result<CommandResult, Failure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match build_runtime() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    match runtime.block_on(body(config)) {
        Ok(result) => result,
        Err(failure) => CommandResult::from_failure(command, failure),
    }
}

fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, Failure> {
    let pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
    Ok(pool)
}

pub(crate) fn build_service(pool: &DbPool, config: &AppConfig) -> PromotionService {
    PromotionService::new(
        Arc::new(SqlTemplateRepository::new(pool.clone())),
        Arc::new(SqlVoucherRepository::new(pool.clone())),
        config.engine.rule_engine.build(),
    )
}

/// Bounds one service call by the configured evaluation deadline.
pub(crate) async fn with_deadline<T>(
    config: &AppConfig,
    call: impl std::future::Future<Output = Result<T, ServiceError>>,
) -> Result<T, Failure> {
    let deadline = Duration::from_millis(config.engine.evaluation_timeout_ms);
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(service_failure(error)),
        Err(_) => Err((
            "evaluation_timeout",
            format!("evaluation exceeded {} ms", config.engine.evaluation_timeout_ms),
            EXIT_TIMEOUT,
        )),
    }
}

pub(crate) fn service_failure(error: ServiceError) -> Failure {
    (error.class(), error.to_string(), EXIT_SERVICE)
}

pub(crate) fn read_fact(path: &Path) -> anyhow::Result<Fact> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read fact file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("fact file `{}` is not a valid fact", path.display()))
}

pub(crate) fn load_fact(path: &Path) -> Result<Fact, Failure> {
    read_fact(path).map_err(|error| ("fact_input", format!("{error:#}"), EXIT_CONFIG))
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Result<Value, Failure> {
    serde_json::to_value(value)
        .map_err(|error| ("serialization", error.to_string(), EXIT_SERVICE))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::Value;

    use super::{read_fact, CommandResult};

    #[test]
    fn failure_payload_carries_class_without_data() {
        let result = CommandResult::failure("offer", "fact_input", "bad fact", 2);
        let payload: Value = serde_json::from_str(&result.output).expect("valid JSON");

        assert_eq!(result.exit_code, 2);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "fact_input");
        assert!(payload.get("data").is_none());
    }

    #[test]
    fn read_fact_reports_path_and_cause() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fact.json");
        fs::write(&path, "{\"user\":{}}").expect("write fact");

        let error = read_fact(&path).expect_err("user id is required");
        let rendered = format!("{error:#}");

        assert!(rendered.contains("fact.json"));
        assert!(rendered.contains("id"));
    }
}
