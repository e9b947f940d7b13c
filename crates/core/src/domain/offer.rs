use serde::{Deserialize, Serialize};

pub const NO_OFFER_DESCRIPTION: &str = "no applicable offer";

/// Monetary benefit computed by a discount strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountApplication {
    /// Minor currency units.
    pub amount: i64,
    pub strategy_name: String,
    pub description: String,
}

impl DiscountApplication {
    /// Canonical zero-amount result returned when nothing applies.
    pub fn no_offer() -> Self {
        Self {
            amount: 0,
            strategy_name: String::new(),
            description: NO_OFFER_DESCRIPTION.to_string(),
        }
    }

    pub fn is_benefit(&self) -> bool {
        self.amount > 0
    }
}

/// Renders minor units as a major-unit decimal, e.g. `2000 -> "20.00"`.
pub fn format_minor_units(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::{format_minor_units, DiscountApplication};

    #[test]
    fn no_offer_is_zero_and_not_a_benefit() {
        let none = DiscountApplication::no_offer();
        assert_eq!(none.amount, 0);
        assert!(!none.is_benefit());
    }

    #[test]
    fn minor_units_render_with_two_decimals() {
        assert_eq!(format_minor_units(2000), "20.00");
        assert_eq!(format_minor_units(1805), "18.05");
        assert_eq!(format_minor_units(7), "0.07");
        assert_eq!(format_minor_units(-150), "-1.50");
    }
}
