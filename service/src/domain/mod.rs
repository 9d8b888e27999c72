//! Domain entities definitions.

pub mod coupon;
pub mod listing;
pub mod package;
pub mod transaction;
pub mod user;

pub use self::{
    coupon::Coupon, listing::Listing, package::Package,
    transaction::Transaction,
};
