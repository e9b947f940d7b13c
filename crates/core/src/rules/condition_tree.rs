//! JSON condition-tree rule engine.
//!
//! A rule is either a group `{"all": [..]}` / `{"any": [..]}` or a leaf
//! `{"path": "user.isVip", "operator": "equal", "value": true}`. Paths are
//! dotted and resolve against [`Fact::to_value`]; a numeric segment indexes
//! into an array (`items.0.category`).

use serde_json::{Map, Value};

use crate::domain::fact::Fact;
use crate::errors::RuleError;

use super::RuleEngine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanInclusive,
    LessThanInclusive,
}

impl Operator {
    pub fn parse(value: &str) -> Result<Self, RuleError> {
        match value {
            "equal" => Ok(Self::Equal),
            "notEqual" => Ok(Self::NotEqual),
            "greaterThan" => Ok(Self::GreaterThan),
            "lessThan" => Ok(Self::LessThan),
            "greaterThanInclusive" => Ok(Self::GreaterThanInclusive),
            "lessThanInclusive" => Ok(Self::LessThanInclusive),
            other => Err(RuleError::UnsupportedOperator(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "equal",
            Self::NotEqual => "notEqual",
            Self::GreaterThan => "greaterThan",
            Self::LessThan => "lessThan",
            Self::GreaterThanInclusive => "greaterThanInclusive",
            Self::LessThanInclusive => "lessThanInclusive",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    /// When both lists are present a non-empty `all` decides and `any` is ignored.
    Group { all: Vec<Condition>, any: Vec<Condition> },
    Leaf { path: String, operator: Operator, value: Value },
}

impl Condition {
    pub fn parse(rule: &str) -> Result<Self, RuleError> {
        let node: Value = serde_json::from_str(rule).map_err(|error| RuleError::Parse {
            position: error.column().saturating_sub(1),
            message: error.to_string(),
        })?;
        Self::from_node(&node)
    }

    fn from_node(node: &Value) -> Result<Self, RuleError> {
        let Value::Object(fields) = node else {
            return Err(RuleError::InvalidRule(format!("expected an object, found {node}")));
        };

        if fields.contains_key("all") || fields.contains_key("any") {
            let all = children(fields, "all")?;
            let any = children(fields, "any")?;
            if all.is_empty() && any.is_empty() {
                return Err(RuleError::InvalidRule("condition group is empty".to_string()));
            }
            return Ok(Self::Group { all, any });
        }

        let path = fields
            .get("path")
            .or_else(|| fields.get("fact"))
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::InvalidRule(format!("condition has no `path`: {node}")))?;
        let operator = fields
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| RuleError::InvalidRule(format!("condition has no `operator`: {node}")))?;

        Ok(Self::Leaf {
            path: path.to_string(),
            operator: Operator::parse(operator)?,
            value: fields.get("value").cloned().unwrap_or(Value::Null),
        })
    }

    pub fn evaluate(&self, root: &Value) -> Result<bool, RuleError> {
        match self {
            Self::Group { all, any } => {
                if !all.is_empty() {
                    for condition in all {
                        if !condition.evaluate(root)? {
                            return Ok(false);
                        }
                    }
                    return Ok(true);
                }
                for condition in any {
                    if condition.evaluate(root)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Leaf { path, operator, value } => {
                let actual = resolve(root, path)?;
                compare(path, *operator, actual, value)
            }
        }
    }
}

fn children(fields: &Map<String, Value>, key: &str) -> Result<Vec<Condition>, RuleError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(nodes)) => nodes.iter().map(Condition::from_node).collect(),
        Some(other) => Err(RuleError::InvalidRule(format!("`{key}` must be a list, found {other}"))),
    }
}

pub fn resolve<'a>(root: &'a Value, path: &str) -> Result<&'a Value, RuleError> {
    let mut current = root;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
            _ => None,
        };
        current = next.ok_or_else(|| RuleError::UnresolvedPath(path.to_string()))?;
    }
    Ok(current)
}

fn compare(path: &str, operator: Operator, actual: &Value, expected: &Value) -> Result<bool, RuleError> {
    let numbers = actual.as_f64().zip(expected.as_f64());

    match operator {
        Operator::Equal => Ok(match numbers {
            Some((a, b)) => a == b,
            None => actual == expected,
        }),
        Operator::NotEqual => Ok(match numbers {
            Some((a, b)) => a != b,
            None => actual != expected,
        }),
        _ => {
            let Some((a, b)) = numbers else {
                return Err(RuleError::TypeMismatch(format!(
                    "operator `{}` requires numeric values for `{path}`",
                    operator.as_str()
                )));
            };
            Ok(match operator {
                Operator::GreaterThan => a > b,
                Operator::LessThan => a < b,
                Operator::GreaterThanInclusive => a >= b,
                _ => a <= b,
            })
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConditionTreeRuleEngine;

impl ConditionTreeRuleEngine {
    pub fn new() -> Self {
        Self
    }
}

impl RuleEngine for ConditionTreeRuleEngine {
    fn name(&self) -> &'static str {
        "condition_tree"
    }

    fn evaluate(&self, rule: &str, fact: &Fact) -> Result<bool, RuleError> {
        if rule.trim().is_empty() {
            return Ok(true);
        }
        let condition = Condition::parse(rule)?;
        condition.evaluate(&fact.to_value()?)
    }

    fn validate(&self, rule: &str) -> Result<(), RuleError> {
        if rule.trim().is_empty() {
            return Ok(());
        }
        Condition::parse(rule).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::fact::{CartItem, Fact, UserContext};
    use crate::errors::RuleError;
    use crate::rules::RuleEngine;

    use super::ConditionTreeRuleEngine;

    fn fact() -> Fact {
        Fact {
            user: UserContext {
                id: 9,
                is_vip: true,
                labels: ["new_user".to_string()].into_iter().collect(),
            },
            items: vec![CartItem {
                sku: "B-1".to_string(),
                unit_price: 1_200,
                quantity: 2,
                category: "books".to_string(),
                brand: "acme".to_string(),
            }],
            total_amount: 15_000,
            ..Fact::default()
        }
    }

    fn evaluate(rule: &str) -> Result<bool, RuleError> {
        ConditionTreeRuleEngine::new().evaluate(rule, &fact())
    }

    #[test]
    fn empty_rule_always_matches() {
        assert_eq!(evaluate(""), Ok(true));
        assert_eq!(evaluate("  "), Ok(true));
    }

    #[test]
    fn leaves_compare_numbers_numerically_and_others_structurally() {
        assert_eq!(evaluate(r#"{"path":"user.isVip","operator":"equal","value":true}"#), Ok(true));
        assert_eq!(evaluate(r#"{"path":"totalAmount","operator":"equal","value":15000.0}"#), Ok(true));
        assert_eq!(
            evaluate(r#"{"path":"user.labels","operator":"equal","value":["new_user"]}"#),
            Ok(true)
        );
        assert_eq!(
            evaluate(r#"{"path":"items.0.category","operator":"notEqual","value":"books"}"#),
            Ok(false)
        );
        assert_eq!(
            evaluate(r#"{"fact":"totalAmount","operator":"greaterThanInclusive","value":15000}"#),
            Ok(true)
        );
    }

    #[test]
    fn groups_short_circuit() {
        // The second `all` child would fail to resolve if it were evaluated.
        let all = r#"{"all":[
            {"path":"totalAmount","operator":"lessThan","value":100},
            {"path":"user.missing","operator":"equal","value":1}
        ]}"#;
        assert_eq!(evaluate(all), Ok(false));

        let any = r#"{"any":[
            {"path":"user.isVip","operator":"equal","value":true},
            {"path":"user.missing","operator":"equal","value":1}
        ]}"#;
        assert_eq!(evaluate(any), Ok(true));

        let nested = r#"{"all":[
            {"path":"totalAmount","operator":"greaterThan","value":10000},
            {"any":[
                {"path":"user.isVip","operator":"equal","value":false},
                {"path":"items.0.brand","operator":"equal","value":"acme"}
            ]}
        ]}"#;
        assert_eq!(evaluate(nested), Ok(true));
    }

    #[test]
    fn non_empty_all_overrides_any_in_the_same_group() {
        let both = r#"{
            "all":[{"path":"user.isVip","operator":"equal","value":true}],
            "any":[{"path":"totalAmount","operator":"lessThan","value":1}]
        }"#;
        assert_eq!(evaluate(both), Ok(true));

        let empty_all = r#"{
            "all":[],
            "any":[{"path":"totalAmount","operator":"lessThan","value":1}]
        }"#;
        assert_eq!(evaluate(empty_all), Ok(false));
    }

    #[test]
    fn malformed_rules_are_rule_errors() {
        assert!(matches!(evaluate("{not json"), Err(RuleError::Parse { .. })));
        assert_eq!(
            evaluate(r#"{"path":"user.isVip","operator":"like","value":true}"#),
            Err(RuleError::UnsupportedOperator("like".to_string()))
        );
        assert_eq!(
            evaluate(r#"{"path":"user.age","operator":"equal","value":1}"#),
            Err(RuleError::UnresolvedPath("user.age".to_string()))
        );
        assert!(matches!(
            evaluate(r#"{"path":"items.0.sku","operator":"greaterThan","value":1}"#),
            Err(RuleError::TypeMismatch(_))
        ));
        assert!(matches!(evaluate(r#"{"all":[]}"#), Err(RuleError::InvalidRule(_))));
        assert!(matches!(evaluate("[1, 2]"), Err(RuleError::InvalidRule(_))));
    }

    #[test]
    fn validate_checks_structure_without_a_fact() {
        let engine = ConditionTreeRuleEngine::new();
        assert!(engine.validate(r#"{"any":[{"path":"a","operator":"equal","value":1}]}"#).is_ok());
        assert!(engine.validate(r#"{"any":[{"path":"a","operator":"between"}]}"#).is_err());
    }
}
