use chrono::Utc;

use offerly_core::config::AppConfig;
use offerly_db::repositories::{SqlTemplateRepository, SqlVoucherRepository};
use offerly_db::{DemoDataset, SeedResult};

use crate::commands::{
    execute, open_database, to_data, CommandResult, Failure, EXIT_MIGRATION,
};

pub fn run() -> CommandResult {
    execute("seed", seed)
}

async fn seed(config: AppConfig) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    let templates = SqlTemplateRepository::new(pool.clone());
    let vouchers = SqlVoucherRepository::new(pool.clone());

    let loaded =
        DemoDataset::load(&templates, &vouchers, config.engine.rule_engine, Utc::now()).await;
    pool.close().await;

    let seeded = loaded.map_err(|error| ("seed_execution", error.to_string(), EXIT_MIGRATION))?;
    Ok(CommandResult::success_with_data("seed", summary(&seeded), Some(to_data(&seeded)?)))
}

fn summary(seeded: &SeedResult) -> String {
    if seeded.templates_created == 0 && seeded.vouchers_created == 0 {
        return "demo dataset already present".to_string();
    }
    format!(
        "demo dataset loaded: {} templates, {} vouchers",
        seeded.templates_created, seeded.vouchers_created
    )
}
