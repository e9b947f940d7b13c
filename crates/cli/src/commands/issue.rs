use offerly_core::config::AppConfig;
use offerly_core::domain::template::TemplateId;
use offerly_engine::{BatchIssueRequest, IssueVoucherRequest};

use crate::commands::{
    build_service, execute, open_database, service_failure, to_data, CommandResult, Failure,
};

pub fn run(template_id: i64, user_ids: Vec<i64>) -> CommandResult {
    execute("issue", move |config| issue(config, TemplateId(template_id), user_ids))
}

async fn issue(
    config: AppConfig,
    template_id: TemplateId,
    user_ids: Vec<i64>,
) -> Result<CommandResult, Failure> {
    let pool = open_database(&config).await?;
    let service = build_service(&pool, &config);

    let issued = match user_ids.as_slice() {
        [user_id] => service
            .issue(IssueVoucherRequest { template_id, user_id: *user_id })
            .await
            .map(|voucher| vec![voucher]),
        _ => service.batch_issue(BatchIssueRequest { template_id, user_ids }).await,
    };
    pool.close().await;

    let issued = issued.map_err(service_failure)?;
    let message = format!("issued {} vouchers from template {template_id}", issued.len());
    Ok(CommandResult::success_with_data("issue", message, Some(to_data(&issued)?)))
}
