//! Compiled-expression rule engine.
//!
//! Rules are small boolean expressions over the canonical fact tree, for
//! example `user.isVip == true && 'new_user' in user.labels`. A rule is
//! tokenized, parsed and type-checked once; the resulting [`Program`] is kept
//! in a process-wide cache keyed by the raw rule text.

pub mod ast;
pub mod checker;
pub mod eval;
pub mod lexer;
pub mod parser;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::domain::fact::Fact;
use crate::errors::RuleError;

use self::ast::Expr;
use self::eval::Value;
use super::RuleEngine;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    expr: Expr,
}

impl Program {
    pub fn compile(source: &str) -> Result<Self, RuleError> {
        let expr = parser::parse(source)?;
        checker::check_rule(&expr)?;
        Ok(Self { expr })
    }

    pub fn evaluate(&self, root: &Value) -> Result<bool, RuleError> {
        match eval::evaluate(&self.expr, root)? {
            Value::Bool(matched) => Ok(matched),
            other => Err(RuleError::NotBoolean { found: other.type_name().to_string() }),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExpressionRuleEngine {
    programs: DashMap<String, Arc<Program>>,
}

impl ExpressionRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_programs(&self) -> usize {
        self.programs.len()
    }

    /// Compiles on a cache miss. Concurrent first use may compile the same
    /// text more than once; the first insert wins.
    fn program(&self, rule: &str) -> Result<Arc<Program>, RuleError> {
        if let Some(program) = self.programs.get(rule) {
            return Ok(Arc::clone(program.value()));
        }

        let compiled = Arc::new(Program::compile(rule)?);
        debug!(event_name = "rules.expression.compiled", rule = %rule, "compiled rule");
        let cached = self.programs.entry(rule.to_string()).or_insert(compiled);
        Ok(Arc::clone(cached.value()))
    }
}

impl RuleEngine for ExpressionRuleEngine {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn evaluate(&self, rule: &str, fact: &Fact) -> Result<bool, RuleError> {
        if rule.trim().is_empty() {
            return Ok(true);
        }
        let program = self.program(rule)?;
        let root = Value::from(fact.to_value()?);
        program.evaluate(&root)
    }

    fn validate(&self, rule: &str) -> Result<(), RuleError> {
        if rule.trim().is_empty() {
            return Ok(());
        }
        self.program(rule).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use crate::domain::fact::{Fact, UserContext};
    use crate::errors::RuleError;
    use crate::rules::RuleEngine;

    use super::ExpressionRuleEngine;

    fn fact(is_vip: bool, labels: &[&str], total_amount: i64) -> Fact {
        Fact {
            user: UserContext {
                id: 1,
                is_vip,
                labels: labels.iter().map(|label| label.to_string()).collect(),
            },
            total_amount,
            ..Fact::default()
        }
    }

    #[test]
    fn empty_rule_always_matches() {
        let engine = ExpressionRuleEngine::new();
        for rule in ["", "   ", "\n\t"] {
            assert_eq!(engine.evaluate(rule, &fact(false, &[], 0)), Ok(true));
        }
        assert_eq!(engine.cached_programs(), 0);
    }

    #[test]
    fn vip_and_label_rules_match_expected_users() {
        let engine = ExpressionRuleEngine::new();

        assert_eq!(engine.evaluate("user.isVip == true", &fact(true, &[], 15_000)), Ok(true));
        assert_eq!(engine.evaluate("user.isVip == true", &fact(false, &[], 15_000)), Ok(false));
        assert_eq!(
            engine.evaluate("'new_user' in user.labels", &fact(false, &["new_user"], 0)),
            Ok(true)
        );
        assert_eq!(engine.evaluate("'new_user' in user.labels", &fact(false, &[], 0)), Ok(false));
    }

    #[test]
    fn successful_compiles_are_cached_once() {
        let engine = ExpressionRuleEngine::new();
        let rule = "totalAmount >= 10000";

        for total in [5_000, 10_000, 20_000] {
            engine.evaluate(rule, &fact(false, &[], total)).expect("evaluate");
        }
        assert_eq!(engine.cached_programs(), 1);
    }

    #[test]
    fn failed_compiles_are_not_cached() {
        let engine = ExpressionRuleEngine::new();

        assert!(matches!(engine.evaluate("user.isVip ==", &fact(true, &[], 0)), Err(RuleError::Parse { .. })));
        assert_eq!(
            engine.evaluate("totalAmount * 2", &fact(true, &[], 0)),
            Err(RuleError::NotBoolean { found: "int".to_string() })
        );
        assert!(engine.validate("user.unknown").is_err());
        assert_eq!(engine.cached_programs(), 0);
    }

    #[test]
    fn deeply_nested_rule_is_rejected_not_fatal() {
        let engine = ExpressionRuleEngine::new();
        let rule = format!("{}true{}", "(".repeat(10_000), ")".repeat(10_000));

        assert!(matches!(engine.evaluate(&rule, &fact(true, &[], 0)), Err(RuleError::Parse { .. })));
        assert!(matches!(engine.validate(&rule), Err(RuleError::Parse { .. })));
        assert_eq!(engine.cached_programs(), 0);
    }

    #[test]
    fn concurrent_first_use_shares_one_cache_entry() {
        let engine = Arc::new(ExpressionRuleEngine::new());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    engine.evaluate("totalAmount > 100 && user.isVip", &fact(true, &[], 100 + index))
                })
            })
            .collect();

        for (index, handle) in handles.into_iter().enumerate() {
            let matched = handle.join().expect("thread").expect("evaluate");
            assert_eq!(matched, index > 0);
        }
        assert_eq!(engine.cached_programs(), 1);
    }
}
