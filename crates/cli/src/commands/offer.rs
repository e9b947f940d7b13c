use std::path::PathBuf;

use offerly_core::config::AppConfig;
use offerly_core::domain::offer::format_minor_units;

use crate::commands::{
    build_service, execute, load_fact, open_database, to_data, with_deadline, CommandResult,
    Failure,
};

pub fn run(fact_path: PathBuf) -> CommandResult {
    execute("offer", move |config| best_offer(config, fact_path))
}

async fn best_offer(config: AppConfig, fact_path: PathBuf) -> Result<CommandResult, Failure> {
    let fact = load_fact(&fact_path)?;
    let pool = open_database(&config).await?;
    let service = build_service(&pool, &config);

    let selection = with_deadline(&config, service.select_best_offer(&fact)).await;
    pool.close().await;
    let selection = selection?;

    let message = match &selection.coupon_code {
        Some(code) => format!(
            "best offer saves {} with voucher {code}",
            format_minor_units(selection.application.amount)
        ),
        None => selection.application.description.clone(),
    };
    Ok(CommandResult::success_with_data("offer", message, Some(to_data(&selection)?)))
}
