use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use offerly_core::domain::template::{
    DiscountType, PromotionTemplate, TemplateDraft, TemplateGroupId,
};
use offerly_core::domain::voucher::{CouponCode, VoucherDraft, VoucherStatus};
use offerly_core::rules::RuleEngineKind;

use crate::repositories::{RepositoryError, TemplateRepository, VoucherRepository};

pub const DEMO_VIP_USER: i64 = 1001;
pub const DEMO_NEW_USER: i64 = 1002;
pub const DEMO_REGULAR_USER: i64 = 1003;

struct DemoTemplate {
    group_id: &'static str,
    name: &'static str,
    description: &'static str,
    promotion_type: &'static str,
    expression_rule: &'static str,
    condition_tree_rule: &'static str,
    discount_type: DiscountType,
    discount_properties: &'static str,
}

const DEMO_TEMPLATES: &[DemoTemplate] = &[
    DemoTemplate {
        group_id: "demo-vip-percentage",
        name: "VIP 12% off",
        description: "12% off the whole cart for VIP members, capped at 50.00",
        promotion_type: "PLATFORM_SALE",
        expression_rule: "user.isVip == true",
        condition_tree_rule: r#"{"all":[{"path":"user.isVip","operator":"equal","value":true}]}"#,
        discount_type: DiscountType::Percentage,
        discount_properties: r#"{"percentage":88,"ceiling":5000}"#,
    },
    DemoTemplate {
        group_id: "demo-new-user-fixed",
        name: "Welcome: spend 100, save 20",
        description: "First-order voucher for newly registered shoppers",
        promotion_type: "NEW_USER",
        expression_rule: "'new_user' in user.labels",
        // Labels serialize as a sorted list; shoppers without labels fail to
        // resolve the path and are skipped.
        condition_tree_rule: r#"{"any":[{"path":"user.labels.0","operator":"equal","value":"new_user"}]}"#,
        discount_type: DiscountType::FixedAmount,
        discount_properties: r#"{"threshold":10000,"amount":2000}"#,
    },
    DemoTemplate {
        group_id: "demo-always-on",
        name: "5.00 off anything",
        description: "No-threshold store voucher",
        promotion_type: "STORE_COUPON",
        expression_rule: "",
        condition_tree_rule: "",
        discount_type: DiscountType::FixedAmount,
        discount_properties: r#"{"threshold":0,"amount":500}"#,
    },
];

/// `(user, template group, coupon code)`
const DEMO_VOUCHERS: &[(i64, &str, &str)] = &[
    (DEMO_VIP_USER, "demo-vip-percentage", "DEMO-VIP-0001"),
    (DEMO_VIP_USER, "demo-always-on", "DEMO-ALWAYS-1001"),
    (DEMO_NEW_USER, "demo-new-user-fixed", "DEMO-WELCOME-1002"),
    (DEMO_NEW_USER, "demo-always-on", "DEMO-ALWAYS-1002"),
    (DEMO_REGULAR_USER, "demo-new-user-fixed", "DEMO-WELCOME-1003"),
    (DEMO_REGULAR_USER, "demo-always-on", "DEMO-ALWAYS-1003"),
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedResult {
    pub templates_created: usize,
    pub vouchers_created: usize,
    pub coupon_codes: Vec<String>,
}

/// Deterministic demo campaigns and vouchers, written through the repository
/// contracts so any backend can be seeded. Loading twice is a no-op.
pub struct DemoDataset;

impl DemoDataset {
    pub async fn load(
        templates: &dyn TemplateRepository,
        vouchers: &dyn VoucherRepository,
        rule_engine: RuleEngineKind,
        now: DateTime<Utc>,
    ) -> Result<SeedResult, RepositoryError> {
        let mut result = SeedResult::default();
        let mut seeded: Vec<PromotionTemplate> = Vec::with_capacity(DEMO_TEMPLATES.len());

        for demo in DEMO_TEMPLATES {
            let group_id = TemplateGroupId(demo.group_id.to_string());
            if let Some(existing) = templates.find_by_group_and_version(&group_id, 1).await? {
                seeded.push(existing);
                continue;
            }

            let rule_definition = match rule_engine {
                RuleEngineKind::Expression => demo.expression_rule,
                RuleEngineKind::ConditionTree => demo.condition_tree_rule,
            };
            let template = templates
                .create(TemplateDraft {
                    group_id,
                    version: 1,
                    name: demo.name.to_string(),
                    description: demo.description.to_string(),
                    promotion_type: demo.promotion_type.to_string(),
                    rule_definition: rule_definition.to_string(),
                    discount_type: demo.discount_type,
                    discount_properties: demo.discount_properties.to_string(),
                    start_date: now - Duration::days(1),
                    end_date: now + Duration::days(90),
                    is_exclusive: false,
                    priority: 0,
                    is_active: true,
                })
                .await?;
            result.templates_created += 1;
            seeded.push(template);
        }

        for (user_id, group, code) in DEMO_VOUCHERS {
            let coupon_code = CouponCode((*code).to_string());
            if vouchers.find_by_code(&coupon_code).await?.is_some() {
                continue;
            }
            let Some(template) = seeded.iter().find(|template| template.group_id.0 == *group)
            else {
                return Err(RepositoryError::NotFound(format!("demo template group {group}")));
            };

            vouchers
                .save(VoucherDraft {
                    user_id: *user_id,
                    coupon_code: coupon_code.clone(),
                    template_id: template.id,
                    status: VoucherStatus::Unused,
                    issue_date: now,
                    expiry_date: template.end_date,
                })
                .await?;
            result.vouchers_created += 1;
            result.coupon_codes.push(coupon_code.0);
        }

        tracing::info!(
            event_name = "seed.demo.loaded",
            templates_created = result.templates_created,
            vouchers_created = result.vouchers_created,
            "demo dataset loaded"
        );
        Ok(result)
    }
}
