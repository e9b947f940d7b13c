use std::collections::BTreeMap;

use crate::errors::RuleError;

use super::ast::{BinaryOp, Expr, Literal, Quantifier, UnaryOp};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    /// Numbers compare across int and double; everything else structurally.
    fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, x)| b.get(key).is_some_and(|y| x.loosely_equals(y)))
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Double(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Self::String(text),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(fields) => {
                Self::Map(fields.into_iter().map(|(key, value)| (key, Self::from(value))).collect())
            }
        }
    }
}

/// Evaluates a checked expression. `root` is the canonical fact tree; its
/// top-level keys are the rule's global identifiers and `fact` names the whole.
pub fn evaluate(expr: &Expr, root: &Value) -> Result<Value, RuleError> {
    let mut evaluator = Evaluator { root, scope: Vec::new() };
    evaluator.eval(expr)
}

struct Evaluator<'a> {
    root: &'a Value,
    scope: Vec<(String, Value)>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, RuleError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Value::Null,
                Literal::Bool(flag) => Value::Bool(*flag),
                Literal::Int(value) => Value::Int(*value),
                Literal::Double(value) => Value::Double(*value),
                Literal::String(text) => Value::String(text.clone()),
            }),
            Expr::Ident(name) => self.lookup(name),
            Expr::List(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element)?);
                }
                Ok(Value::List(values))
            }
            Expr::Member { target, field } => match self.eval(target)? {
                Value::Map(mut fields) => fields
                    .remove(field)
                    .ok_or_else(|| RuleError::Evaluation(format!("no such key `{field}`"))),
                other => Err(RuleError::TypeMismatch(format!(
                    "cannot select field `{field}` on {}",
                    other.type_name()
                ))),
            },
            Expr::Index { target, index } => {
                let target = self.eval(target)?;
                let index = self.eval(index)?;
                match (target, index) {
                    (Value::List(mut items), Value::Int(position)) => {
                        let slot = usize::try_from(position).ok().filter(|slot| *slot < items.len());
                        match slot {
                            Some(slot) => Ok(items.swap_remove(slot)),
                            None => Err(RuleError::Evaluation(format!(
                                "index {position} out of range for list of {}",
                                items.len()
                            ))),
                        }
                    }
                    (target, index) => Err(RuleError::TypeMismatch(format!(
                        "cannot index {} with {}",
                        target.type_name(),
                        index.type_name()
                    ))),
                }
            }
            Expr::Call { target, function, args } => {
                let mut operands = Vec::with_capacity(args.len() + 1);
                if let Some(target) = target {
                    operands.push(self.eval(target)?);
                }
                for arg in args {
                    operands.push(self.eval(arg)?);
                }
                call(function, operands)
            }
            Expr::Unary { op, operand } => match (op, self.eval(operand)?) {
                (UnaryOp::Not, Value::Bool(flag)) => Ok(Value::Bool(!flag)),
                (UnaryOp::Negate, Value::Int(value)) => value
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| RuleError::Evaluation("integer overflow".to_string())),
                (UnaryOp::Negate, Value::Double(value)) => Ok(Value::Double(-value)),
                (_, other) => Err(RuleError::TypeMismatch(format!(
                    "unary operator not defined for {}",
                    other.type_name()
                ))),
            },
            Expr::Binary { op: BinaryOp::And, left, right } => {
                if !self.boolean(left)? {
                    return Ok(Value::Bool(false));
                }
                self.boolean(right).map(Value::Bool)
            }
            Expr::Binary { op: BinaryOp::Or, left, right } => {
                if self.boolean(left)? {
                    return Ok(Value::Bool(true));
                }
                self.boolean(right).map(Value::Bool)
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, left, right)
            }
            Expr::Conditional { condition, then_branch, else_branch } => {
                if self.boolean(condition)? {
                    self.eval(then_branch)
                } else {
                    self.eval(else_branch)
                }
            }
            Expr::Comprehension { quantifier, range, variable, predicate } => {
                let items = match self.eval(range)? {
                    Value::List(items) => items,
                    other => {
                        return Err(RuleError::TypeMismatch(format!(
                            "list macro needs a list, found {}",
                            other.type_name()
                        )))
                    }
                };
                self.quantify(*quantifier, items, variable, predicate).map(Value::Bool)
            }
        }
    }

    fn boolean(&mut self, expr: &Expr) -> Result<bool, RuleError> {
        match self.eval(expr)? {
            Value::Bool(flag) => Ok(flag),
            other => Err(RuleError::TypeMismatch(format!(
                "expected bool, found {}",
                other.type_name()
            ))),
        }
    }

    fn quantify(
        &mut self,
        quantifier: Quantifier,
        items: Vec<Value>,
        variable: &str,
        predicate: &Expr,
    ) -> Result<bool, RuleError> {
        let mut matches = 0usize;
        for item in items {
            self.scope.push((variable.to_string(), item));
            let outcome = self.boolean(predicate);
            self.scope.pop();

            let matched = outcome?;
            match quantifier {
                Quantifier::Exists if matched => return Ok(true),
                Quantifier::All if !matched => return Ok(false),
                Quantifier::ExistsOne if matched => matches += 1,
                _ => {}
            }
        }

        Ok(match quantifier {
            Quantifier::Exists => false,
            Quantifier::All => true,
            Quantifier::ExistsOne => matches == 1,
        })
    }

    fn lookup(&self, name: &str) -> Result<Value, RuleError> {
        if let Some((_, bound)) = self.scope.iter().rev().find(|(bound, _)| bound == name) {
            return Ok(bound.clone());
        }
        if name == "fact" {
            return Ok(self.root.clone());
        }
        match self.root {
            Value::Map(fields) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| RuleError::UnknownIdentifier(name.to_string())),
            _ => Err(RuleError::UnknownIdentifier(name.to_string())),
        }
    }
}

fn call(function: &str, operands: Vec<Value>) -> Result<Value, RuleError> {
    match (function, operands.as_slice()) {
        ("size", [Value::String(text)]) => Ok(Value::Int(text.chars().count() as i64)),
        ("size", [Value::List(items)]) => Ok(Value::Int(items.len() as i64)),
        ("size", [Value::Map(fields)]) => Ok(Value::Int(fields.len() as i64)),
        ("contains", [Value::String(text), Value::String(needle)]) => {
            Ok(Value::Bool(text.contains(needle.as_str())))
        }
        ("startsWith", [Value::String(text), Value::String(prefix)]) => {
            Ok(Value::Bool(text.starts_with(prefix.as_str())))
        }
        ("endsWith", [Value::String(text), Value::String(suffix)]) => {
            Ok(Value::Bool(text.ends_with(suffix.as_str())))
        }
        _ => {
            let kinds: Vec<&str> = operands.iter().map(Value::type_name).collect();
            Err(RuleError::TypeMismatch(format!(
                "no overload of {function}() for ({})",
                kinds.join(", ")
            )))
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuleError> {
    let mismatch = |left: &Value, right: &Value| {
        RuleError::TypeMismatch(format!(
            "no `{}` operator for {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
    };
    let overflow = || RuleError::Evaluation("integer overflow".to_string());

    match op {
        BinaryOp::Equal => Ok(Value::Bool(left.loosely_equals(&right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!left.loosely_equals(&right))),
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordering = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                (a, b) => match (a.as_f64(), b.as_f64()) {
                    (Some(x), Some(y)) => x.partial_cmp(&y),
                    _ => return Err(mismatch(a, b)),
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEqual => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::In => match &right {
            Value::List(items) => Ok(Value::Bool(items.iter().any(|item| item.loosely_equals(&left)))),
            Value::Map(fields) => match &left {
                Value::String(key) => Ok(Value::Bool(fields.contains_key(key))),
                _ => Err(mismatch(&left, &right)),
            },
            _ => Err(mismatch(&left, &right)),
        },
        BinaryOp::Add => match (left, right) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            (Value::String(mut a), Value::String(b)) => {
                a.push_str(&b);
                Ok(Value::String(a))
            }
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(Value::Double(x + y)),
                _ => Err(mismatch(&a, &b)),
            },
        },
        BinaryOp::Subtract | BinaryOp::Multiply => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => {
                let result = if op == BinaryOp::Subtract { a.checked_sub(*b) } else { a.checked_mul(*b) };
                result.map(Value::Int).ok_or_else(overflow)
            }
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) if op == BinaryOp::Subtract => Ok(Value::Double(x - y)),
                (Some(x), Some(y)) => Ok(Value::Double(x * y)),
                _ => Err(mismatch(a, b)),
            },
        },
        BinaryOp::Divide => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(RuleError::Evaluation("division by zero".to_string())),
            (Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int).ok_or_else(overflow),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => Ok(Value::Double(x / y)),
                _ => Err(mismatch(a, b)),
            },
        },
        BinaryOp::Modulo => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(RuleError::Evaluation("modulus by zero".to_string())),
            (Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int).ok_or_else(overflow),
            (a, b) => Err(mismatch(a, b)),
        },
        BinaryOp::And | BinaryOp::Or => match (&left, &right) {
            (Value::Bool(a), Value::Bool(b)) => {
                Ok(Value::Bool(if op == BinaryOp::And { *a && *b } else { *a || *b }))
            }
            (a, b) => Err(mismatch(a, b)),
        },
    }
}
