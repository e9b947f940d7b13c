pub mod errors;
pub mod requests;
pub mod service;

pub use errors::ServiceError;
pub use requests::{
    BatchIssueRequest, CreateTemplateRequest, IssueVoucherRequest, OfferSelection,
    UpdateTemplateRequest, VoucherActionRequest,
};
pub use service::PromotionService;
