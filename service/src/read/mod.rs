//! Read entities definitions.

pub mod coupon;
pub mod listing;
pub mod package;
pub mod transaction;
