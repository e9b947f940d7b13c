use serde::{Deserialize, Serialize};

use crate::domain::fact::Fact;
use crate::domain::offer::{format_minor_units, DiscountApplication};
use crate::domain::template::{DiscountType, PromotionTemplate};
use crate::errors::DiscountError;

use super::{parse_properties, DiscountStrategy};

/// `percentage` is the share of the total the shopper pays (88 means 12% off);
/// `ceiling` caps the benefit in minor units, 0 meaning uncapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PercentageProperties {
    pub percentage: i64,
    #[serde(default)]
    pub ceiling: i64,
}

impl PercentageProperties {
    fn parse(raw: &str) -> Result<Self, DiscountError> {
        let properties: Self = parse_properties(DiscountType::Percentage, raw)?;
        if properties.percentage <= 0 || properties.percentage >= 100 {
            return Err(DiscountError::InvalidParameters {
                discount_type: DiscountType::Percentage.as_str(),
                reason: format!(
                    "percentage must be within 1..=99, got {}",
                    properties.percentage
                ),
            });
        }
        if properties.ceiling < 0 {
            return Err(DiscountError::InvalidParameters {
                discount_type: DiscountType::Percentage.as_str(),
                reason: "ceiling must not be negative".to_string(),
            });
        }
        Ok(properties)
    }

    /// Widened to `i128` so the product cannot overflow; the quotient is
    /// never larger in magnitude than `total_amount`.
    pub fn benefit(&self, total_amount: i64) -> i64 {
        let raw = (i128::from(total_amount) * i128::from(100 - self.percentage)).div_euclid(100);
        let capped = if self.ceiling > 0 { raw.min(i128::from(self.ceiling)) } else { raw };
        i64::try_from(capped).unwrap_or(if capped < 0 { i64::MIN } else { i64::MAX })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PercentageStrategy;

impl DiscountStrategy for PercentageStrategy {
    fn name(&self) -> &'static str {
        "Percentage"
    }

    fn validate(&self, discount_properties: &str) -> Result<(), DiscountError> {
        PercentageProperties::parse(discount_properties).map(|_| ())
    }

    fn calculate(
        &self,
        fact: &Fact,
        template: &PromotionTemplate,
    ) -> Result<DiscountApplication, DiscountError> {
        let properties = PercentageProperties::parse(&template.discount_properties)?;

        let mut description = format!("{}% off", 100 - properties.percentage);
        if properties.ceiling > 0 {
            description.push_str(&format!(", up to {}", format_minor_units(properties.ceiling)));
        }

        Ok(DiscountApplication {
            amount: properties.benefit(fact.total_amount),
            strategy_name: self.name().to_string(),
            description,
        })
    }
}
