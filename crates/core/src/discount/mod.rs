//! Discount strategies: each turns a matched template's parameters plus the
//! fact into a concrete monetary benefit.
//!
//! New discount kinds are added as a new strategy type plus one new arm in
//! [`StrategyFactory::strategy_for`]; existing strategies are never touched.

pub mod fixed_amount;
pub mod percentage;

use serde::de::DeserializeOwned;

use crate::domain::fact::Fact;
use crate::domain::offer::DiscountApplication;
use crate::domain::template::{DiscountType, PromotionTemplate};
use crate::errors::DiscountError;

pub use fixed_amount::{FixedAmountProperties, FixedAmountStrategy};
pub use percentage::{PercentageProperties, PercentageStrategy};

pub trait DiscountStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Checks that serialized parameters have the shape this strategy expects.
    fn validate(&self, discount_properties: &str) -> Result<(), DiscountError>;

    fn calculate(
        &self,
        fact: &Fact,
        template: &PromotionTemplate,
    ) -> Result<DiscountApplication, DiscountError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StrategyFactory;

impl StrategyFactory {
    pub fn new() -> Self {
        Self
    }

    /// Resolves a stored discount-type tag such as `PERCENTAGE`.
    pub fn create_strategy(&self, tag: &str) -> Result<Box<dyn DiscountStrategy>, DiscountError> {
        let discount_type = DiscountType::parse(tag)
            .ok_or_else(|| DiscountError::UnsupportedDiscountType(tag.to_string()))?;
        Ok(self.strategy_for(discount_type))
    }

    pub fn strategy_for(&self, discount_type: DiscountType) -> Box<dyn DiscountStrategy> {
        match discount_type {
            DiscountType::FixedAmount => Box::new(FixedAmountStrategy),
            DiscountType::Percentage => Box::new(PercentageStrategy),
        }
    }
}

pub(crate) fn parse_properties<T: DeserializeOwned>(
    discount_type: DiscountType,
    raw: &str,
) -> Result<T, DiscountError> {
    serde_json::from_str(raw).map_err(|error| DiscountError::InvalidParameters {
        discount_type: discount_type.as_str(),
        reason: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use crate::domain::template::DiscountType;
    use crate::errors::DiscountError;

    use super::StrategyFactory;

    #[test]
    fn factory_resolves_known_tags() {
        let factory = StrategyFactory::new();

        assert_eq!(factory.create_strategy("FIXED_AMOUNT").expect("fixed").name(), "FixedAmount");
        assert_eq!(factory.create_strategy("PERCENTAGE").expect("pct").name(), "Percentage");
        assert_eq!(factory.strategy_for(DiscountType::Percentage).name(), "Percentage");
    }

    #[test]
    fn factory_rejects_unknown_tags() {
        let error = StrategyFactory::new()
            .create_strategy("BUY_ONE_GET_ONE")
            .err()
            .expect("unknown tag must fail");

        assert_eq!(error, DiscountError::UnsupportedDiscountType("BUY_ONE_GET_ONE".to_string()));
    }
}
