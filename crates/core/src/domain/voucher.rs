use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::template::TemplateId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VoucherId(pub i64);

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponCode(pub String);

impl CouponCode {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stored lifecycle state. `Expired` is never written by the lifecycle; it is
/// reported by [`Voucher::effective_status`] once an unused voucher lapses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    Unused,
    Frozen,
    Used,
    Expired,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "UNUSED",
            Self::Frozen => "FROZEN",
            Self::Used => "USED",
            Self::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNUSED" => Some(Self::Unused),
            "FROZEN" => Some(Self::Frozen),
            "USED" => Some(Self::Used),
            "EXPIRED" => Some(Self::Expired),
            _ => None,
        }
    }
}

/// One issued, user-owned instance of a template version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: VoucherId,
    pub user_id: i64,
    pub coupon_code: CouponCode,
    /// Pinned forever; later campaign revisions never change it.
    pub template_id: TemplateId,
    pub status: VoucherStatus,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Voucher {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_date
    }

    /// The single gate for both offer evaluation and reservation.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.status == VoucherStatus::Unused && !self.is_expired(now)
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> VoucherStatus {
        if self.status == VoucherStatus::Unused && self.is_expired(now) {
            return VoucherStatus::Expired;
        }
        self.status
    }

    /// Reserve: `Unused -> Frozen`. Anything else would double-reserve.
    pub fn freeze(&mut self) -> Result<(), DomainError> {
        if self.status != VoucherStatus::Unused {
            return Err(self.invalid_state("freeze"));
        }
        self.status = VoucherStatus::Frozen;
        Ok(())
    }

    /// Commit: `Frozen -> Used`, stamping `used_at`.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != VoucherStatus::Frozen {
            return Err(self.invalid_state("confirm"));
        }
        self.status = VoucherStatus::Used;
        self.used_at = Some(now);
        Ok(())
    }

    /// Rollback: `Frozen -> Unused`. From any other state this is a successful
    /// no-op so that retried cancellations never fail. Returns whether the
    /// status changed.
    pub fn unfreeze(&mut self) -> bool {
        if self.status != VoucherStatus::Frozen {
            return false;
        }
        self.status = VoucherStatus::Unused;
        true
    }

    fn invalid_state(&self, action: &'static str) -> DomainError {
        DomainError::InvalidState { code: self.coupon_code.clone(), status: self.status, action }
    }
}

/// A voucher that has not been persisted yet; the repository assigns its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherDraft {
    pub user_id: i64,
    pub coupon_code: CouponCode,
    pub template_id: TemplateId,
    pub status: VoucherStatus,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
}

impl VoucherDraft {
    pub fn unused(
        user_id: i64,
        template_id: TemplateId,
        issue_date: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            coupon_code: CouponCode::generate(),
            template_id,
            status: VoucherStatus::Unused,
            issue_date,
            expiry_date,
        }
    }

    pub fn into_voucher(self, id: VoucherId) -> Voucher {
        Voucher {
            id,
            user_id: self.user_id,
            coupon_code: self.coupon_code,
            template_id: self.template_id,
            status: self.status,
            issue_date: self.issue_date,
            expiry_date: self.expiry_date,
            used_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::template::TemplateId;
    use crate::errors::DomainError;

    use super::{CouponCode, Voucher, VoucherDraft, VoucherId, VoucherStatus};

    fn voucher(status: VoucherStatus) -> Voucher {
        let now = Utc::now();
        Voucher {
            id: VoucherId(1),
            user_id: 7,
            coupon_code: CouponCode("C-1".to_string()),
            template_id: TemplateId(3),
            status,
            issue_date: now,
            expiry_date: now + Duration::days(7),
            used_at: None,
        }
    }

    #[test]
    fn freeze_then_confirm_reaches_used_with_timestamp() {
        let mut voucher = voucher(VoucherStatus::Unused);
        let now = Utc::now();

        voucher.freeze().expect("unused -> frozen");
        voucher.confirm(now).expect("frozen -> used");

        assert_eq!(voucher.status, VoucherStatus::Used);
        assert_eq!(voucher.used_at, Some(now));
    }

    #[test]
    fn freeze_then_unfreeze_returns_to_unused() {
        let mut voucher = voucher(VoucherStatus::Unused);
        voucher.freeze().expect("unused -> frozen");

        assert!(voucher.unfreeze());
        assert_eq!(voucher.status, VoucherStatus::Unused);
        assert_eq!(voucher.used_at, None);
    }

    #[test]
    fn unfreeze_is_a_noop_outside_frozen() {
        for status in [VoucherStatus::Unused, VoucherStatus::Used] {
            let mut voucher = voucher(status);
            assert!(!voucher.unfreeze());
            assert_eq!(voucher.status, status);
        }
    }

    #[test]
    fn double_freeze_is_rejected() {
        let mut voucher = voucher(VoucherStatus::Unused);
        voucher.freeze().expect("first freeze");

        let error = voucher.freeze().expect_err("second freeze must fail");
        assert!(matches!(
            error,
            DomainError::InvalidState { status: VoucherStatus::Frozen, action: "freeze", .. }
        ));
    }

    #[test]
    fn confirm_requires_frozen() {
        for status in [VoucherStatus::Unused, VoucherStatus::Used] {
            let mut voucher = voucher(status);
            let error = voucher.confirm(Utc::now()).expect_err("confirm must fail");
            assert!(matches!(error, DomainError::InvalidState { action: "confirm", .. }));
            assert_eq!(voucher.status, status);
        }
    }

    #[test]
    fn availability_and_effective_status_follow_expiry() {
        let voucher = voucher(VoucherStatus::Unused);
        let before = voucher.expiry_date - Duration::seconds(1);
        let after = voucher.expiry_date + Duration::seconds(1);

        assert!(voucher.is_available(before));
        assert!(!voucher.is_available(after));
        assert!(!voucher.is_available(voucher.expiry_date));
        assert_eq!(voucher.effective_status(before), VoucherStatus::Unused);
        assert_eq!(voucher.effective_status(after), VoucherStatus::Expired);

        let frozen = self::voucher(VoucherStatus::Frozen);
        assert!(!frozen.is_available(before));
        assert_eq!(frozen.effective_status(after), VoucherStatus::Frozen);
    }

    #[test]
    fn status_round_trips_from_storage_encoding() {
        for status in [
            VoucherStatus::Unused,
            VoucherStatus::Frozen,
            VoucherStatus::Used,
            VoucherStatus::Expired,
        ] {
            assert_eq!(VoucherStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VoucherStatus::parse("redeemed"), None);
    }

    #[test]
    fn drafts_generate_distinct_codes() {
        let now = Utc::now();
        let first = VoucherDraft::unused(1, TemplateId(1), now, now + Duration::days(1));
        let second = VoucherDraft::unused(1, TemplateId(1), now, now + Duration::days(1));

        assert_ne!(first.coupon_code, second.coupon_code);
        let stored = first.into_voucher(VoucherId(9));
        assert_eq!(stored.status, VoucherStatus::Unused);
        assert_eq!(stored.used_at, None);
    }
}
