use sqlx::Row;

use offerly_core::domain::template::TemplateId;
use offerly_core::domain::voucher::{CouponCode, Voucher, VoucherDraft, VoucherId, VoucherStatus};

use super::{map_unique_violation, parse_timestamp, RepositoryError, VoucherRepository};
use crate::DbPool;

const VOUCHER_COLUMNS: &str =
    "id, user_id, coupon_code, template_id, status, issue_date, expiry_date, used_at";

pub struct SqlVoucherRepository {
    pool: DbPool,
}

impl SqlVoucherRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_voucher(row: &sqlx::sqlite::SqliteRow) -> Result<Voucher, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: i64 = row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let coupon_code: String =
        row.try_get("coupon_code").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let template_id: i64 =
        row.try_get("template_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let issue_date_str: String =
        row.try_get("issue_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let expiry_date_str: String =
        row.try_get("expiry_date").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let used_at_str: Option<String> =
        row.try_get("used_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = VoucherStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown voucher status `{status_str}`")))?;
    let used_at = used_at_str.map(|raw| parse_timestamp("used_at", &raw)).transpose()?;

    Ok(Voucher {
        id: VoucherId(id),
        user_id,
        coupon_code: CouponCode(coupon_code),
        template_id: TemplateId(template_id),
        status,
        issue_date: parse_timestamp("issue_date", &issue_date_str)?,
        expiry_date: parse_timestamp("expiry_date", &expiry_date_str)?,
        used_at,
    })
}

#[async_trait::async_trait]
impl VoucherRepository for SqlVoucherRepository {
    async fn find_by_id(&self, id: VoucherId) -> Result<Option<Voucher>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VOUCHER_COLUMNS} FROM user_voucher WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_voucher).transpose()
    }

    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Voucher>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM user_voucher WHERE coupon_code = ?"
        ))
        .bind(&code.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_voucher).transpose()
    }

    async fn find_by_user_id(&self, user_id: i64) -> Result<Vec<Voucher>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {VOUCHER_COLUMNS} FROM user_voucher WHERE user_id = ? ORDER BY id ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_voucher).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, draft: VoucherDraft) -> Result<Voucher, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO user_voucher (user_id, coupon_code, template_id, status,
                                       issue_date, expiry_date, used_at)
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(draft.user_id)
        .bind(&draft.coupon_code.0)
        .bind(draft.template_id.0)
        .bind(draft.status.as_str())
        .bind(draft.issue_date.to_rfc3339())
        .bind(draft.expiry_date.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            map_unique_violation(error, format!("coupon code {} already issued", draft.coupon_code))
        })?;

        Ok(draft.into_voucher(VoucherId(result.last_insert_rowid())))
    }

    async fn update(&self, voucher: Voucher) -> Result<(), RepositoryError> {
        let used_at = voucher.used_at.map(|dt| dt.to_rfc3339());
        let result = sqlx::query(
            "UPDATE user_voucher SET
                 user_id = ?, coupon_code = ?, template_id = ?, status = ?,
                 issue_date = ?, expiry_date = ?, used_at = ?
             WHERE id = ?",
        )
        .bind(voucher.user_id)
        .bind(&voucher.coupon_code.0)
        .bind(voucher.template_id.0)
        .bind(voucher.status.as_str())
        .bind(voucher.issue_date.to_rfc3339())
        .bind(voucher.expiry_date.to_rfc3339())
        .bind(&used_at)
        .bind(voucher.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("voucher {}", voucher.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use offerly_core::domain::template::TemplateId;
    use offerly_core::domain::voucher::{CouponCode, VoucherDraft, VoucherStatus};

    use super::SqlVoucherRepository;
    use crate::repositories::{RepositoryError, VoucherRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlVoucherRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlVoucherRepository::new(pool)
    }

    fn draft(user_id: i64) -> VoucherDraft {
        let now = Utc::now();
        VoucherDraft::unused(user_id, TemplateId(1), now, now + Duration::days(7))
    }

    #[tokio::test]
    async fn save_assigns_increasing_ids() {
        let repo = setup().await;

        let first = repo.save(draft(1)).await.expect("save first");
        let second = repo.save(draft(1)).await.expect("save second");

        assert!(second.id > first.id);
        assert_eq!(first.status, VoucherStatus::Unused);
    }

    #[tokio::test]
    async fn lookups_by_code_id_and_user() {
        let repo = setup().await;
        let mine = repo.save(draft(1)).await.expect("save mine");
        repo.save(draft(1)).await.expect("save mine again");
        repo.save(draft(2)).await.expect("save theirs");

        let by_code = repo.find_by_code(&mine.coupon_code).await.expect("by code");
        assert_eq!(by_code.as_ref().map(|voucher| voucher.id), Some(mine.id));
        let by_id = repo.find_by_id(mine.id).await.expect("by id").expect("some");
        assert_eq!(by_id.coupon_code, mine.coupon_code);

        assert_eq!(repo.find_by_user_id(1).await.expect("user 1").len(), 2);
        assert_eq!(repo.find_by_user_id(3).await.expect("user 3").len(), 0);
        assert_eq!(repo.find_by_code(&CouponCode("nope".into())).await.expect("missing"), None);
    }

    #[tokio::test]
    async fn update_persists_status_and_used_at() {
        let repo = setup().await;
        let mut voucher = repo.save(draft(1)).await.expect("save");

        voucher.freeze().expect("freeze");
        voucher.confirm(Utc::now()).expect("confirm");
        repo.update(voucher.clone()).await.expect("update");

        let stored = repo.find_by_id(voucher.id).await.expect("find").expect("some");
        assert_eq!(stored.status, VoucherStatus::Used);
        assert_eq!(
            stored.used_at.map(|dt| dt.timestamp()),
            voucher.used_at.map(|dt| dt.timestamp())
        );
    }

    #[tokio::test]
    async fn duplicate_coupon_code_is_a_conflict() {
        let repo = setup().await;
        let first = draft(1);
        let mut second = draft(2);
        second.coupon_code = first.coupon_code.clone();

        repo.save(first).await.expect("save first");
        let error = repo.save(second).await.expect_err("duplicate code");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }
}
