//! Eligibility rules: the condition-evaluator contract and its two variants.

pub mod condition_tree;
pub mod expression;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::fact::Fact;
use crate::errors::RuleError;

pub use condition_tree::ConditionTreeRuleEngine;
pub use expression::ExpressionRuleEngine;

/// Decides whether a fact satisfies a template's rule text.
///
/// An empty (or all-whitespace) rule matches every fact.
pub trait RuleEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, rule: &str, fact: &Fact) -> Result<bool, RuleError>;

    /// Compile-only check used when a template is created or revised.
    fn validate(&self, rule: &str) -> Result<(), RuleError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEngineKind {
    #[default]
    Expression,
    ConditionTree,
}

impl RuleEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expression => "expression",
            Self::ConditionTree => "condition_tree",
        }
    }

    pub fn build(&self) -> Arc<dyn RuleEngine> {
        match self {
            Self::Expression => Arc::new(ExpressionRuleEngine::new()),
            Self::ConditionTree => Arc::new(ConditionTreeRuleEngine::new()),
        }
    }
}

impl fmt::Display for RuleEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleEngineKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "expression" | "cel" => Ok(Self::Expression),
            "condition_tree" | "json" => Ok(Self::ConditionTree),
            other => Err(format!(
                "unsupported rule engine `{other}`; expected `expression` or `condition_tree`"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::fact::{Fact, UserContext};

    use super::RuleEngineKind;

    #[test]
    fn kind_parses_names_and_aliases() {
        assert_eq!("expression".parse::<RuleEngineKind>(), Ok(RuleEngineKind::Expression));
        assert_eq!("Condition-Tree".parse::<RuleEngineKind>(), Ok(RuleEngineKind::ConditionTree));
        assert_eq!("json".parse::<RuleEngineKind>(), Ok(RuleEngineKind::ConditionTree));
        assert!("lua".parse::<RuleEngineKind>().is_err());
    }

    #[test]
    fn both_variants_answer_the_same_question() {
        let fact = Fact {
            user: UserContext { id: 1, is_vip: true, ..UserContext::default() },
            total_amount: 15_000,
            ..Fact::default()
        };
        let cases = [
            (RuleEngineKind::Expression, "user.isVip == true && totalAmount >= 10000"),
            (
                RuleEngineKind::ConditionTree,
                r#"{"all":[
                    {"path":"user.isVip","operator":"equal","value":true},
                    {"path":"totalAmount","operator":"greaterThanInclusive","value":10000}
                ]}"#,
            ),
        ];

        for (kind, rule) in cases {
            let engine = kind.build();
            assert_eq!(engine.name(), kind.as_str());
            assert_eq!(engine.evaluate(rule, &fact), Ok(true));
            assert_eq!(engine.evaluate("", &fact), Ok(true));
        }
    }
}
