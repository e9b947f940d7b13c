pub mod config;
pub mod discount;
pub mod domain;
pub mod errors;
pub mod rules;

pub use discount::{DiscountStrategy, StrategyFactory};
pub use domain::fact::{CartItem, EnvironmentContext, Fact, UserContext};
pub use domain::offer::DiscountApplication;
pub use domain::template::{
    DiscountType, PromotionTemplate, TemplateDraft, TemplateGroupId, TemplateId, TemplateRevision,
};
pub use domain::voucher::{CouponCode, Voucher, VoucherDraft, VoucherId, VoucherStatus};
pub use errors::{DiscountError, DomainError, RuleError};
pub use rules::{RuleEngine, RuleEngineKind};
