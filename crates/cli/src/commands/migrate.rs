use offerly_core::config::AppConfig;

use crate::commands::{execute, open_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    execute("migrate", migrate)
}

async fn migrate(config: AppConfig) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    pool.close().await;
    Ok(CommandResult::success("migrate", "applied pending migrations"))
}
