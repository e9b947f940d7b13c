use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;

use offerly_core::config::AppConfig;
use offerly_core::domain::voucher::{Voucher, VoucherStatus};

use crate::commands::{
    build_service, execute, load_fact, open_database, to_data, with_deadline, CommandResult,
    Failure,
};

#[derive(Debug, Serialize)]
struct ApplicableVoucher {
    #[serde(flatten)]
    voucher: Voucher,
    effective_status: VoucherStatus,
}

pub fn run(fact_path: PathBuf, user_id: Option<i64>) -> CommandResult {
    execute("applicable", move |config| applicable(config, fact_path, user_id))
}

async fn applicable(
    config: AppConfig,
    fact_path: PathBuf,
    user_id: Option<i64>,
) -> Result<CommandResult, Failure> {
    let fact = load_fact(&fact_path)?;
    let user_id = user_id.unwrap_or(fact.user.id);
    let pool = open_database(&config).await?;
    let service = build_service(&pool, &config);

    let listed = with_deadline(&config, service.list_applicable(&fact, user_id)).await;
    pool.close().await;

    let now = Utc::now();
    let vouchers: Vec<ApplicableVoucher> = listed?
        .into_iter()
        .map(|voucher| ApplicableVoucher { effective_status: voucher.effective_status(now), voucher })
        .collect();

    let message = format!("{} applicable vouchers for user {user_id}", vouchers.len());
    Ok(CommandResult::success_with_data("applicable", message, Some(to_data(&vouchers)?)))
}
