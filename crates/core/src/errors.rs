use thiserror::Error;

use crate::domain::template::TemplateId;
use crate::domain::voucher::{CouponCode, VoucherStatus};

/// Failures raised while compiling or evaluating an eligibility rule.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule parse error at offset {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("unknown identifier `{0}`")]
    UnknownIdentifier(String),
    #[error("unknown field `{field}` on {on}")]
    UnknownField { field: String, on: String },
    #[error("rule must produce a boolean, but produces {found}")]
    NotBoolean { found: String },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),
    #[error("fact path `{0}` cannot be resolved")]
    UnresolvedPath(String),
    #[error("invalid rule structure: {0}")]
    InvalidRule(String),
    #[error("rule evaluation failed: {0}")]
    Evaluation(String),
    #[error("fact could not be encoded for evaluation: {0}")]
    FactEncoding(String),
}

/// Failures raised while resolving or running a discount strategy.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    #[error("unsupported discount type `{0}`")]
    UnsupportedDiscountType(String),
    #[error("invalid {discount_type} parameters: {reason}")]
    InvalidParameters { discount_type: &'static str, reason: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("voucher {code} cannot {action} while {status:?}")]
    InvalidState { code: CouponCode, status: VoucherStatus, action: &'static str },
    #[error("voucher {0} has expired")]
    VoucherExpired(CouponCode),
    #[error("template {template_id} is not valid for issuance: {reason}")]
    TemplateInvalid { template_id: TemplateId, reason: String },
    #[error("template group `{0}` not found")]
    TemplateGroupNotFound(String),
    #[error("voucher {code} not found for user {user_id}")]
    VoucherNotFound { code: CouponCode, user_id: i64 },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
