use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use offerly_core::domain::template::{
    PromotionTemplate, TemplateDraft, TemplateGroupId, TemplateId,
};
use offerly_core::domain::voucher::{CouponCode, Voucher, VoucherDraft, VoucherId};

use super::{RepositoryError, TemplateRepository, VoucherRepository};

struct Table<T> {
    last_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { last_id: 0, rows: BTreeMap::new() }
    }
}

impl<T> Table<T> {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Default)]
pub struct InMemoryTemplateRepository {
    templates: RwLock<Table<PromotionTemplate>>,
}

impl InMemoryTemplateRepository {
    /// Test seam for simulating a template row that disappeared.
    pub async fn remove(&self, id: TemplateId) -> Option<PromotionTemplate> {
        self.templates.write().await.rows.remove(&id.0)
    }
}

#[async_trait::async_trait]
impl TemplateRepository for InMemoryTemplateRepository {
    async fn find_by_id(
        &self,
        id: TemplateId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.rows.get(&id.0).cloned())
    }

    async fn find_latest_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates
            .rows
            .values()
            .filter(|template| &template.group_id == group_id)
            .max_by_key(|template| template.version)
            .cloned())
    }

    async fn find_active_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates
            .rows
            .values()
            .filter(|template| &template.group_id == group_id && template.is_active)
            .max_by_key(|template| template.version)
            .cloned())
    }

    async fn find_by_group_and_version(
        &self,
        group_id: &TemplateGroupId,
        version: i32,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates
            .rows
            .values()
            .find(|template| &template.group_id == group_id && template.version == version)
            .cloned())
    }

    async fn find_all_active(&self) -> Result<Vec<PromotionTemplate>, RepositoryError> {
        let templates = self.templates.read().await;
        Ok(templates.rows.values().filter(|template| template.is_active).cloned().collect())
    }

    async fn create(&self, draft: TemplateDraft) -> Result<PromotionTemplate, RepositoryError> {
        let mut templates = self.templates.write().await;
        let duplicate = templates
            .rows
            .values()
            .any(|existing| existing.group_id == draft.group_id && existing.version == draft.version);
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "template group {} already has version {}",
                draft.group_id, draft.version
            )));
        }

        let id = templates.next_id();
        let template = draft.into_template(TemplateId(id), Utc::now());
        templates.rows.insert(id, template.clone());
        Ok(template)
    }

    async fn update(&self, template: PromotionTemplate) -> Result<(), RepositoryError> {
        let mut templates = self.templates.write().await;
        match templates.rows.get_mut(&template.id.0) {
            Some(slot) => {
                *slot = template;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("template {}", template.id))),
        }
    }
}

#[derive(Default)]
pub struct InMemoryVoucherRepository {
    vouchers: RwLock<Table<Voucher>>,
}

#[async_trait::async_trait]
impl VoucherRepository for InMemoryVoucherRepository {
    async fn find_by_id(&self, id: VoucherId) -> Result<Option<Voucher>, RepositoryError> {
        let vouchers = self.vouchers.read().await;
        Ok(vouchers.rows.get(&id.0).cloned())
    }

    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Voucher>, RepositoryError> {
        let vouchers = self.vouchers.read().await;
        Ok(vouchers.rows.values().find(|voucher| &voucher.coupon_code == code).cloned())
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Voucher>, RepositoryError> {
        let vouchers = self.vouchers.read().await;
        Ok(vouchers.rows.values().filter(|voucher| voucher.user_id == user_id).cloned().collect())
    }

    async fn save(&self, draft: VoucherDraft) -> Result<Voucher, RepositoryError> {
        let mut vouchers = self.vouchers.write().await;
        if vouchers.rows.values().any(|existing| existing.coupon_code == draft.coupon_code) {
            return Err(RepositoryError::Conflict(format!(
                "coupon code {} already issued",
                draft.coupon_code
            )));
        }

        let id = vouchers.next_id();
        let voucher = draft.into_voucher(VoucherId(id));
        vouchers.rows.insert(id, voucher.clone());
        Ok(voucher)
    }

    async fn update(&self, voucher: Voucher) -> Result<(), RepositoryError> {
        let mut vouchers = self.vouchers.write().await;
        match vouchers.rows.get_mut(&voucher.id.0) {
            Some(slot) => {
                *slot = voucher;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("voucher {}", voucher.id))),
        }
    }
}
