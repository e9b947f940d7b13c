use clap::ValueEnum;

use offerly_core::config::AppConfig;
use offerly_engine::VoucherActionRequest;

use crate::commands::{
    build_service, execute, open_database, service_failure, to_data, CommandResult, Failure,
};

/// Step of the reserve/commit/rollback protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum VoucherAction {
    Freeze,
    Use,
    Unfreeze,
}

impl VoucherAction {
    fn command(&self) -> &'static str {
        match self {
            Self::Freeze => "voucher.freeze",
            Self::Use => "voucher.use",
            Self::Unfreeze => "voucher.unfreeze",
        }
    }
}

pub fn run(action: VoucherAction, user_id: i64, code: String) -> CommandResult {
    execute(action.command(), move |config| apply(config, action, user_id, code))
}

async fn apply(
    config: AppConfig,
    action: VoucherAction,
    user_id: i64,
    code: String,
) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    let service = build_service(&pool, &config);
    let request = VoucherActionRequest::new(user_id, code);

    let outcome = match action {
        VoucherAction::Freeze => service.freeze(request).await,
        VoucherAction::Use => service.use_voucher(request).await,
        VoucherAction::Unfreeze => service.unfreeze(request).await,
    };
    pool.close().await;

    let voucher = outcome.map_err(service_failure)?;
    let message = format!("voucher {} is {}", voucher.coupon_code, voucher.status.as_str());
    Ok(CommandResult::success_with_data(action.command(), message, Some(to_data(&voucher)?)))
}
