//! Request and response payloads of the promotion service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use offerly_core::domain::offer::DiscountApplication;
use offerly_core::domain::template::{TemplateGroupId, TemplateId};
use offerly_core::domain::voucher::{CouponCode, VoucherId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub promotion_type: String,
    #[serde(default)]
    pub rule_definition: String,
    /// Storage tag such as `PERCENTAGE`; unknown tags are rejected.
    pub discount_type: String,
    pub discount_properties: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub is_exclusive: bool,
    #[serde(default)]
    pub priority: i32,
}

/// A revision of an existing campaign. The promotion type is fixed at creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub group_id: TemplateGroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_definition: String,
    pub discount_type: String,
    pub discount_properties: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub is_exclusive: bool,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueVoucherRequest {
    pub template_id: TemplateId,
    pub user_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchIssueRequest {
    pub template_id: TemplateId,
    pub user_ids: Vec<i64>,
}

/// Addresses one voucher on behalf of its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherActionRequest {
    pub user_id: i64,
    pub coupon_code: CouponCode,
}

impl VoucherActionRequest {
    pub fn new(user_id: i64, coupon_code: impl Into<String>) -> Self {
        Self { user_id, coupon_code: CouponCode(coupon_code.into()) }
    }
}

/// Outcome of best-offer selection: the benefit plus the voucher that earns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferSelection {
    #[serde(flatten)]
    pub application: DiscountApplication,
    pub voucher_id: Option<VoucherId>,
    pub coupon_code: Option<CouponCode>,
    pub template_id: Option<TemplateId>,
}

impl OfferSelection {
    pub fn no_offer() -> Self {
        Self {
            application: DiscountApplication::no_offer(),
            voucher_id: None,
            coupon_code: None,
            template_id: None,
        }
    }

    pub fn is_offer(&self) -> bool {
        self.coupon_code.is_some() && self.application.is_benefit()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use offerly_core::domain::offer::NO_OFFER_DESCRIPTION;

    use super::{CreateTemplateRequest, OfferSelection};

    #[test]
    fn create_request_defaults_optional_fields() {
        let request: CreateTemplateRequest = serde_json::from_value(json!({
            "name": "Always on",
            "discountType": "FIXED_AMOUNT",
            "discountProperties": "{\"threshold\":0,\"amount\":500}",
            "startDate": "2026-01-01T00:00:00Z",
            "endDate": "2026-12-31T00:00:00Z"
        }))
        .expect("decode request");

        assert!(request.rule_definition.is_empty());
        assert_eq!(request.priority, 0);
        assert!(!request.is_exclusive);
    }

    #[test]
    fn no_offer_serializes_flat() {
        let value = serde_json::to_value(OfferSelection::no_offer()).expect("encode");

        assert_eq!(value["amount"], json!(0));
        assert_eq!(value["description"], json!(NO_OFFER_DESCRIPTION));
        assert_eq!(value["couponCode"], json!(null));
        assert!(!OfferSelection::no_offer().is_offer());
    }
}
