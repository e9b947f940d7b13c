//! Static type check of a parsed rule against the shape of the canonical Fact.

use std::fmt;

use crate::errors::RuleError;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Schema {
    Fact,
    User,
    Item,
    Environment,
}

impl Schema {
    fn name(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::User => "user",
            Self::Item => "item",
            Self::Environment => "environment",
        }
    }

    fn field(&self, field: &str) -> Option<Type> {
        let found = match (self, field) {
            (Self::Fact, "user") => Type::Object(Self::User),
            (Self::Fact, "items") => Type::List(Box::new(Type::Object(Self::Item))),
            (Self::Fact, "environment") => Type::Object(Self::Environment),
            (Self::Fact, "totalAmount") => Type::Int,
            (Self::User, "id") => Type::Int,
            (Self::User, "isVip") => Type::Bool,
            (Self::User, "labels") => Type::List(Box::new(Type::String)),
            (Self::Item, "sku" | "category" | "brand") => Type::String,
            (Self::Item, "unitPrice" | "quantity") => Type::Int,
            // RFC3339 text in the canonical tree.
            (Self::Environment, "timestamp" | "channel") => Type::String,
            _ => return None,
        };
        Some(found)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Int,
    Double,
    String,
    List(Box<Type>),
    Object(Schema),
    /// Statically unknown; checked at evaluation time.
    Dyn,
}

impl Type {
    fn is_numeric(&self) -> bool {
        matches!(self, Self::Int | Self::Double)
    }

    fn accepts_bool(&self) -> bool {
        matches!(self, Self::Bool | Self::Dyn)
    }

    fn is(&self, other: &Type) -> bool {
        self == other || *self == Type::Dyn
    }

    /// Whether values of the two types can ever be equal.
    fn comparable(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) | (Type::Null, _) | (_, Type::Null) => true,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (Type::List(a), Type::List(b)) => a.comparable(b),
            (a, b) => a == b,
        }
    }

    fn unify(self, other: Type) -> Type {
        match (self, other) {
            (a, b) if a == b => a,
            (a, b) if a.is_numeric() && b.is_numeric() => Type::Double,
            _ => Type::Dyn,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("int"),
            Self::Double => f.write_str("double"),
            Self::String => f.write_str("string"),
            Self::List(element) => write!(f, "list({element})"),
            Self::Object(schema) => f.write_str(schema.name()),
            Self::Dyn => f.write_str("dyn"),
        }
    }
}

/// Checks `expr` and requires the result to be boolean.
pub fn check_rule(expr: &Expr) -> Result<Type, RuleError> {
    let mut checker = Checker { scope: Vec::new() };
    let found = checker.check(expr)?;
    if !found.accepts_bool() {
        return Err(RuleError::NotBoolean { found: found.to_string() });
    }
    Ok(found)
}

struct Checker {
    scope: Vec<(String, Type)>,
}

impl Checker {
    fn check(&mut self, expr: &Expr) -> Result<Type, RuleError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Null => Type::Null,
                Literal::Bool(_) => Type::Bool,
                Literal::Int(_) => Type::Int,
                Literal::Double(_) => Type::Double,
                Literal::String(_) => Type::String,
            }),
            Expr::Ident(name) => self.identifier(name),
            Expr::List(elements) => {
                let mut element = None;
                for item in elements {
                    let found = self.check(item)?;
                    element = Some(match element {
                        None => found,
                        Some(previous) => Type::unify(previous, found),
                    });
                }
                Ok(Type::List(Box::new(element.unwrap_or(Type::Dyn))))
            }
            Expr::Member { target, field } => match self.check(target)? {
                Type::Object(schema) => schema.field(field).ok_or_else(|| RuleError::UnknownField {
                    field: field.clone(),
                    on: schema.name().to_string(),
                }),
                Type::Dyn => Ok(Type::Dyn),
                other => Err(RuleError::TypeMismatch(format!(
                    "cannot select field `{field}` on {other}"
                ))),
            },
            Expr::Index { target, index } => {
                let target = self.check(target)?;
                let index = self.check(index)?;
                if !index.is(&Type::Int) {
                    return Err(RuleError::TypeMismatch(format!(
                        "list index must be int, found {index}"
                    )));
                }
                match target {
                    Type::List(element) => Ok(*element),
                    Type::Dyn => Ok(Type::Dyn),
                    other => Err(RuleError::TypeMismatch(format!("cannot index into {other}"))),
                }
            }
            Expr::Call { target, function, args } => self.call(target.as_deref(), function, args),
            Expr::Unary { op, operand } => {
                let operand = self.check(operand)?;
                match op {
                    UnaryOp::Not if operand.accepts_bool() => Ok(Type::Bool),
                    UnaryOp::Negate if operand.is_numeric() || operand == Type::Dyn => Ok(operand),
                    UnaryOp::Not => {
                        Err(RuleError::TypeMismatch(format!("`!` expects bool, found {operand}")))
                    }
                    UnaryOp::Negate => Err(RuleError::TypeMismatch(format!(
                        "`-` expects a number, found {operand}"
                    ))),
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.check(left)?;
                let right = self.check(right)?;
                binary(*op, left, right)
            }
            Expr::Conditional { condition, then_branch, else_branch } => {
                let condition = self.check(condition)?;
                if !condition.accepts_bool() {
                    return Err(RuleError::TypeMismatch(format!(
                        "condition must be bool, found {condition}"
                    )));
                }
                let then_type = self.check(then_branch)?;
                let else_type = self.check(else_branch)?;
                Ok(then_type.unify(else_type))
            }
            Expr::Comprehension { quantifier: _, range, variable, predicate } => {
                let element = match self.check(range)? {
                    Type::List(element) => *element,
                    Type::Dyn => Type::Dyn,
                    other => {
                        return Err(RuleError::TypeMismatch(format!(
                            "list macro needs a list, found {other}"
                        )))
                    }
                };

                self.scope.push((variable.clone(), element));
                let predicate = self.check(predicate);
                self.scope.pop();

                let predicate = predicate?;
                if !predicate.accepts_bool() {
                    return Err(RuleError::TypeMismatch(format!(
                        "list macro predicate must be bool, found {predicate}"
                    )));
                }
                Ok(Type::Bool)
            }
        }
    }

    fn identifier(&self, name: &str) -> Result<Type, RuleError> {
        if let Some((_, bound)) = self.scope.iter().rev().find(|(bound, _)| bound == name) {
            return Ok(bound.clone());
        }
        if name == "fact" {
            return Ok(Type::Object(Schema::Fact));
        }
        Schema::Fact.field(name).ok_or_else(|| RuleError::UnknownIdentifier(name.to_string()))
    }

    fn call(
        &mut self,
        target: Option<&Expr>,
        function: &str,
        args: &[Expr],
    ) -> Result<Type, RuleError> {
        let mut operands = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            operands.push(self.check(target)?);
        }
        for arg in args {
            operands.push(self.check(arg)?);
        }

        match (function, operands.as_slice()) {
            ("size", [subject]) => match subject {
                Type::String | Type::List(_) | Type::Dyn => Ok(Type::Int),
                other => Err(RuleError::TypeMismatch(format!("size() is undefined for {other}"))),
            },
            ("contains" | "startsWith" | "endsWith", [subject, needle])
                if target.is_some() =>
            {
                if subject.is(&Type::String) && needle.is(&Type::String) {
                    Ok(Type::Bool)
                } else {
                    Err(RuleError::TypeMismatch(format!(
                        "{function}() expects strings, found {subject} and {needle}"
                    )))
                }
            }
            ("size" | "contains" | "startsWith" | "endsWith", _) => Err(RuleError::TypeMismatch(
                format!("wrong number of arguments for {function}()"),
            )),
            _ => Err(RuleError::UnknownIdentifier(format!("{function}()"))),
        }
    }
}

fn binary(op: BinaryOp, left: Type, right: Type) -> Result<Type, RuleError> {
    let mismatch = || {
        RuleError::TypeMismatch(format!(
            "no `{}` operator for {left} and {right}",
            op.symbol()
        ))
    };

    match op {
        BinaryOp::And | BinaryOp::Or => {
            if left.accepts_bool() && right.accepts_bool() {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            if left.comparable(&right) {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            let ordered = match (&left, &right) {
                (Type::Dyn, _) | (_, Type::Dyn) => true,
                (a, b) if a.is_numeric() && b.is_numeric() => true,
                (Type::String, Type::String) => true,
                _ => false,
            };
            if ordered {
                Ok(Type::Bool)
            } else {
                Err(mismatch())
            }
        }
        BinaryOp::In => match &right {
            Type::List(element) if left.comparable(element) => Ok(Type::Bool),
            Type::Dyn => Ok(Type::Bool),
            _ => Err(mismatch()),
        },
        BinaryOp::Add => match (&left, &right) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (Type::String, Type::String) => Ok(Type::String),
            (Type::List(_), Type::List(_)) => Ok(left.clone().unify(right.clone())),
            (a, b) if a.is_numeric() && b.is_numeric() => Ok(a.clone().unify(b.clone())),
            _ => Err(mismatch()),
        },
        BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide => match (&left, &right) {
            (Type::Dyn, _) | (_, Type::Dyn) => Ok(Type::Dyn),
            (a, b) if a.is_numeric() && b.is_numeric() => Ok(a.clone().unify(b.clone())),
            _ => Err(mismatch()),
        },
        BinaryOp::Modulo => {
            if left.is(&Type::Int) && right.is(&Type::Int) {
                Ok(Type::Int)
            } else {
                Err(mismatch())
            }
        }
    }
}
