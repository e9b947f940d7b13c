use thiserror::Error;

use offerly_core::errors::{DiscountError, DomainError, RuleError};
use offerly_db::RepositoryError;

/// Everything a promotion operation can surface to its caller.
///
/// Collaborator failures are wrapped transparently so their messages reach the
/// caller unchanged.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error(transparent)]
    Discount(#[from] DiscountError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("concurrent task failed: {0}")]
    TaskFailed(String),
}

impl ServiceError {
    /// Stable snake_case label for machine consumers.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(error) => match error {
                DomainError::InvalidState { .. } => "invalid_state",
                DomainError::VoucherExpired(_) => "voucher_expired",
                DomainError::TemplateInvalid { .. } => "template_invalid",
                DomainError::TemplateGroupNotFound(_) => "template_group_not_found",
                DomainError::VoucherNotFound { .. } => "voucher_not_found",
                DomainError::InvariantViolation(_) => "invariant_violation",
            },
            Self::Rule(_) => "rule_error",
            Self::Discount(DiscountError::UnsupportedDiscountType(_)) => {
                "unsupported_discount_type"
            }
            Self::Discount(DiscountError::InvalidParameters { .. }) => "invalid_parameters",
            Self::Repository(_) => "repository_error",
            Self::TaskFailed(_) => "task_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use offerly_core::domain::voucher::{CouponCode, VoucherStatus};
    use offerly_core::errors::{DiscountError, DomainError, RuleError};
    use offerly_db::RepositoryError;

    use super::ServiceError;

    #[test]
    fn classes_are_stable_labels() {
        let cases = [
            (
                ServiceError::from(DomainError::InvalidState {
                    code: CouponCode("C".to_string()),
                    status: VoucherStatus::Used,
                    action: "freeze",
                }),
                "invalid_state",
            ),
            (ServiceError::from(DomainError::TemplateGroupNotFound("g".into())), "template_group_not_found"),
            (ServiceError::from(RuleError::UnknownIdentifier("x".into())), "rule_error"),
            (
                ServiceError::from(DiscountError::UnsupportedDiscountType("BOGO".into())),
                "unsupported_discount_type",
            ),
            (ServiceError::from(RepositoryError::NotFound("voucher 3".into())), "repository_error"),
            (ServiceError::TaskFailed("panicked".into()), "task_failed"),
        ];

        for (error, class) in cases {
            assert_eq!(error.class(), class, "{error}");
        }
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let error = ServiceError::from(DomainError::VoucherExpired(CouponCode("C-9".into())));
        assert_eq!(error.to_string(), "voucher C-9 has expired");
    }
}
