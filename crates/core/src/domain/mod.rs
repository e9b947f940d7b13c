pub mod fact;
pub mod offer;
pub mod template;
pub mod voucher;
