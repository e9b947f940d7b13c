use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use offerly_core::domain::template::{
    PromotionTemplate, TemplateDraft, TemplateGroupId, TemplateId,
};
use offerly_core::domain::voucher::{CouponCode, Voucher, VoucherDraft, VoucherId};

pub mod memory;
pub mod template;
pub mod voucher;

pub use memory::{InMemoryTemplateRepository, InMemoryVoucherRepository};
pub use template::SqlTemplateRepository;
pub use voucher::SqlVoucherRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("conflicting record: {0}")]
    Conflict(String),
}

/// Campaign definitions. Rows are immutable apart from the `is_active` flag;
/// a revision is a new row with the next version in the same group.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn find_by_id(&self, id: TemplateId)
        -> Result<Option<PromotionTemplate>, RepositoryError>;

    /// Highest version in the group, active or not.
    async fn find_latest_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError>;

    async fn find_active_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError>;

    async fn find_by_group_and_version(
        &self,
        group_id: &TemplateGroupId,
        version: i32,
    ) -> Result<Option<PromotionTemplate>, RepositoryError>;

    async fn find_all_active(&self) -> Result<Vec<PromotionTemplate>, RepositoryError>;

    async fn create(&self, draft: TemplateDraft) -> Result<PromotionTemplate, RepositoryError>;

    /// Replaces the whole row.
    async fn update(&self, template: PromotionTemplate) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait VoucherRepository: Send + Sync {
    async fn find_by_id(&self, id: VoucherId) -> Result<Option<Voucher>, RepositoryError>;

    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Voucher>, RepositoryError>;

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Voucher>, RepositoryError>;

    /// Inserts a new voucher; a duplicate coupon code is a `Conflict`.
    async fn save(&self, draft: VoucherDraft) -> Result<Voucher, RepositoryError>;

    /// Replaces the whole row.
    async fn update(&self, voucher: Voucher) -> Result<(), RepositoryError>;
}

pub(crate) fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column} `{raw}`: {e}")))
}

pub(crate) fn map_unique_violation(error: sqlx::Error, what: String) -> RepositoryError {
    let is_unique = error.as_database_error().is_some_and(|db| db.is_unique_violation());
    if is_unique {
        RepositoryError::Conflict(what)
    } else {
        RepositoryError::Database(error)
    }
}
