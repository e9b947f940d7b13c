use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::RuleError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub id: i64,
    #[serde(default)]
    pub is_vip: bool,
    #[serde(default)]
    pub labels: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub sku: String,
    /// Minor currency units.
    pub unit_price: i64,
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentContext {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub channel: String,
}

impl Default for EnvironmentContext {
    fn default() -> Self {
        Self { timestamp: Utc::now(), channel: String::new() }
    }
}

/// Read-only snapshot of shopper, cart and environment handed to every evaluation.
///
/// `total_amount` is computed by the caller; evaluators trust it and never
/// re-derive it from `items`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub user: UserContext,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub environment: EnvironmentContext,
    pub total_amount: i64,
}

impl Fact {
    /// Canonical key-value tree of the fact. Dotted rule paths and expression
    /// identifiers resolve against this shape (`user.isVip`, `items.0.sku`,
    /// `environment.channel`, `totalAmount`).
    pub fn to_value(&self) -> Result<serde_json::Value, RuleError> {
        serde_json::to_value(self).map_err(|error| RuleError::FactEncoding(error.to_string()))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.user.labels.contains(label)
    }
}
