use chrono::Utc;
use sqlx::Row;

use offerly_core::domain::template::{
    DiscountType, PromotionTemplate, TemplateDraft, TemplateGroupId, TemplateId,
};

use super::{map_unique_violation, parse_timestamp, RepositoryError, TemplateRepository};
use crate::DbPool;

const TEMPLATE_COLUMNS: &str = "id, template_group_id, version, name, description, promotion_type,
     rule_definition, discount_type, discount_properties, start_date, end_date,
     is_exclusive, priority, is_active, created_at, updated_at";

pub struct SqlTemplateRepository {
    pool: DbPool,
}

impl SqlTemplateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_template(row: &sqlx::sqlite::SqliteRow) -> Result<PromotionTemplate, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let group_id: String =
        row.try_get("template_group_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let version: i32 = row.try_get("version").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let promotion_type: String =
        row.try_get("promotion_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let rule_definition: String =
        row.try_get("rule_definition").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let discount_type_str: String =
        row.try_get("discount_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let discount_properties: String =
        row.try_get("discount_properties").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let start_date_str: String =
        row.try_get("start_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let end_date_str: String =
        row.try_get("end_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_exclusive: bool =
        row.try_get("is_exclusive").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority: i32 =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let discount_type = DiscountType::parse(&discount_type_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown discount_type `{discount_type_str}`"))
    })?;

    Ok(PromotionTemplate {
        id: TemplateId(id),
        group_id: TemplateGroupId(group_id),
        version,
        name,
        description,
        promotion_type,
        rule_definition,
        discount_type,
        discount_properties,
        start_date: parse_timestamp("start_date", &start_date_str)?,
        end_date: parse_timestamp("end_date", &end_date_str)?,
        is_exclusive,
        priority,
        is_active,
        created_at: parse_timestamp("created_at", &created_at_str)?,
        updated_at: parse_timestamp("updated_at", &updated_at_str)?,
    })
}

#[async_trait::async_trait]
impl TemplateRepository for SqlTemplateRepository {
    async fn find_by_id(
        &self,
        id: TemplateId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {TEMPLATE_COLUMNS} FROM promotion_template WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_template).transpose()
    }

    async fn find_latest_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM promotion_template
             WHERE template_group_id = ?
             ORDER BY version DESC
             LIMIT 1"
        ))
        .bind(&group_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_template).transpose()
    }

    async fn find_active_by_group(
        &self,
        group_id: &TemplateGroupId,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM promotion_template
             WHERE template_group_id = ? AND is_active = 1
             ORDER BY version DESC
             LIMIT 1"
        ))
        .bind(&group_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_template).transpose()
    }

    async fn find_by_group_and_version(
        &self,
        group_id: &TemplateGroupId,
        version: i32,
    ) -> Result<Option<PromotionTemplate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM promotion_template
             WHERE template_group_id = ? AND version = ?"
        ))
        .bind(&group_id.0)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_template).transpose()
    }

    async fn find_all_active(&self) -> Result<Vec<PromotionTemplate>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM promotion_template
             WHERE is_active = 1
             ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_template).collect::<Result<Vec<_>, _>>()
    }

    async fn create(&self, draft: TemplateDraft) -> Result<PromotionTemplate, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO promotion_template (template_group_id, version, name, description,
                                             promotion_type, rule_definition, discount_type,
                                             discount_properties, start_date, end_date,
                                             is_exclusive, priority, is_active,
                                             created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.group_id.0)
        .bind(draft.version)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(&draft.promotion_type)
        .bind(&draft.rule_definition)
        .bind(draft.discount_type.as_str())
        .bind(&draft.discount_properties)
        .bind(draft.start_date.to_rfc3339())
        .bind(draft.end_date.to_rfc3339())
        .bind(draft.is_exclusive)
        .bind(draft.priority)
        .bind(draft.is_active)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(
                error,
                format!("template group {} already has version {}", draft.group_id, draft.version),
            )
        })?;

        Ok(draft.into_template(TemplateId(result.last_insert_rowid()), now))
    }

    async fn update(&self, template: PromotionTemplate) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE promotion_template SET
                 template_group_id = ?, version = ?, name = ?, description = ?,
                 promotion_type = ?, rule_definition = ?, discount_type = ?,
                 discount_properties = ?, start_date = ?, end_date = ?,
                 is_exclusive = ?, priority = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&template.group_id.0)
        .bind(template.version)
        .bind(&template.name)
        .bind(&template.description)
        .bind(&template.promotion_type)
        .bind(&template.rule_definition)
        .bind(template.discount_type.as_str())
        .bind(&template.discount_properties)
        .bind(template.start_date.to_rfc3339())
        .bind(template.end_date.to_rfc3339())
        .bind(template.is_exclusive)
        .bind(template.priority)
        .bind(template.is_active)
        .bind(template.updated_at.to_rfc3339())
        .bind(template.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("template {}", template.id)));
        }
        Ok(())
    }
}
