//! [`Command`] definition.

pub mod create_payment_order;
pub mod moderate_listing;
pub mod redeem_coupon;
pub mod submit_listing;
pub mod verify_payment;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    create_payment_order::CreatePaymentOrder,
    moderate_listing::ModerateListing, redeem_coupon::RedeemCoupon,
    submit_listing::SubmitListing, verify_payment::VerifyPayment,
};
