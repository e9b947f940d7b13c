use serde::{Deserialize, Serialize};

use crate::domain::fact::Fact;
use crate::domain::offer::{format_minor_units, DiscountApplication};
use crate::domain::template::{DiscountType, PromotionTemplate};
use crate::errors::DiscountError;

use super::{parse_properties, DiscountStrategy};

/// Both values are minor currency units.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedAmountProperties {
    pub threshold: i64,
    pub amount: i64,
}

impl FixedAmountProperties {
    fn parse(raw: &str) -> Result<Self, DiscountError> {
        let properties: Self = parse_properties(DiscountType::FixedAmount, raw)?;
        if properties.threshold < 0 || properties.amount < 0 {
            return Err(DiscountError::InvalidParameters {
                discount_type: DiscountType::FixedAmount.as_str(),
                reason: "threshold and amount must not be negative".to_string(),
            });
        }
        Ok(properties)
    }
}

/// Spend at least `threshold`, save `amount`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedAmountStrategy;

impl DiscountStrategy for FixedAmountStrategy {
    fn name(&self) -> &'static str {
        "FixedAmount"
    }

    fn validate(&self, discount_properties: &str) -> Result<(), DiscountError> {
        FixedAmountProperties::parse(discount_properties).map(|_| ())
    }

    fn calculate(
        &self,
        fact: &Fact,
        template: &PromotionTemplate,
    ) -> Result<DiscountApplication, DiscountError> {
        let properties = FixedAmountProperties::parse(&template.discount_properties)?;

        if fact.total_amount < properties.threshold {
            return Ok(DiscountApplication {
                amount: 0,
                strategy_name: self.name().to_string(),
                description: format!(
                    "spend {} more to unlock",
                    format_minor_units(properties.threshold.saturating_sub(fact.total_amount))
                ),
            });
        }

        Ok(DiscountApplication {
            amount: properties.amount,
            strategy_name: self.name().to_string(),
            description: format!(
                "Spend {}, save {}",
                format_minor_units(properties.threshold),
                format_minor_units(properties.amount)
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::discount::DiscountStrategy;
    use crate::domain::fact::Fact;
    use crate::domain::template::{
        DiscountType, PromotionTemplate, TemplateGroupId, TemplateId,
    };
    use crate::errors::DiscountError;

    use super::FixedAmountStrategy;

    fn template(properties: &str) -> PromotionTemplate {
        let now = Utc::now();
        PromotionTemplate {
            id: TemplateId(1),
            group_id: TemplateGroupId("grp".to_string()),
            version: 1,
            name: "Spend 100 save 20".to_string(),
            description: String::new(),
            promotion_type: "STORE_COUPON".to_string(),
            rule_definition: String::new(),
            discount_type: DiscountType::FixedAmount,
            discount_properties: properties.to_string(),
            start_date: now,
            end_date: now,
            is_exclusive: false,
            priority: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn fact(total_amount: i64) -> Fact {
        Fact { total_amount, ..Fact::default() }
    }

    #[test]
    fn below_threshold_yields_zero_benefit() {
        let template = template(r#"{"threshold":10000,"amount":2000}"#);

        for total in [0, 5_000, 9_999] {
            let offer = FixedAmountStrategy.calculate(&fact(total), &template).expect("calculate");
            assert_eq!(offer.amount, 0, "total {total} is below threshold");
        }
    }

    #[test]
    fn at_or_above_threshold_yields_exact_amount() {
        let template = template(r#"{"threshold":10000,"amount":2000}"#);

        for total in [10_000, 10_001, 250_000] {
            let offer = FixedAmountStrategy.calculate(&fact(total), &template).expect("calculate");
            assert_eq!(offer.amount, 2_000);
            assert_eq!(offer.strategy_name, "FixedAmount");
        }
        let offer = FixedAmountStrategy.calculate(&fact(10_000), &template).expect("calculate");
        assert_eq!(offer.description, "Spend 100.00, save 20.00");
    }

    #[test]
    fn extreme_totals_do_not_overflow() {
        let template = template(r#"{"threshold":10000,"amount":2000}"#);

        let rich = FixedAmountStrategy.calculate(&fact(i64::MAX), &template).expect("calculate");
        assert_eq!(rich.amount, 2_000);

        let refund = FixedAmountStrategy.calculate(&fact(i64::MIN), &template).expect("calculate");
        assert_eq!(refund.amount, 0);
        assert!(refund.description.starts_with("spend "));
    }

    #[test]
    fn malformed_properties_are_invalid_parameters() {
        for raw in ["", "{}", r#"{"threshold":"lots","amount":1}"#, r#"{"threshold":-1,"amount":1}"#]
        {
            let error = FixedAmountStrategy
                .calculate(&fact(10_000), &template(raw))
                .expect_err("malformed properties must fail");
            assert!(matches!(error, DiscountError::InvalidParameters { .. }), "raw: {raw}");
        }
    }
}
