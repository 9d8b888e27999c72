//! REST API definitions.

pub mod coupons;
pub mod listings;
pub mod packages;
pub mod payments;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::Error;

/// Builds the [`Router`] serving the REST API.
pub fn router() -> Router {
    Router::new()
        .route("/listings", post(listings::submit))
        .route("/listings/:id", get(listings::get))
        .route("/admin/listings/pending", get(listings::pending))
        .route("/admin/listings/:id/moderation", put(listings::moderate))
        .route("/packages", get(packages::list))
        .route("/packages/:id", get(packages::get))
        .route("/payments/orders", post(payments::create_order))
        .route("/payments/orders/:id/status", get(payments::order_status))
        .route("/payments/verify", post(payments::verify))
        .route("/coupons/preview", post(coupons::preview))
        .route("/coupons/commit", post(coupons::commit))
}

/// Creates a new `BAD_REQUEST` [`Error`] about the provided invalid `field`.
pub(crate) fn invalid(field: &str) -> Error {
    Error {
        code: "INVALID_REQUEST",
        status_code: http::StatusCode::BAD_REQUEST,
        backtrace: None,
        message: format!("Invalid `{field}` provided"),
    }
}
