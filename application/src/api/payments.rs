//! Payment order endpoints.

use axum::{extract::Path, Extension, Json};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{listing, package, transaction, user},
    query, Command as _, Query as _,
};

use crate::{
    api, context::Role, define_error, AsError, Error, Identity,
};

/// Handler of `POST /payments/orders`.
///
/// Opens a payment order for a package purchase. The charged amount is the
/// current server-side package price; nothing in the request can influence
/// it.
pub async fn create_order(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<Order>, Error> {
    let CreateOrderRequest {
        package_id,
        listing_id,
    } = req;

    let transaction = service
        .execute(command::CreatePaymentOrder {
            user_id: identity.user_id,
            package_id,
            listing_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(transaction.into()))
}

/// Handler of `POST /payments/verify`.
///
/// Accepts a payment proof from the gateway callback. The HMAC signature is
/// the authentication here, so no caller identity is required. Re-delivery
/// of an already verified proof is a success, not an error.
pub async fn verify(
    Extension(service): Extension<crate::Service>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<Order>, Error> {
    let VerifyRequest {
        order_id,
        payment_id,
        signature,
    } = req;

    let transaction = service
        .execute(command::VerifyPayment {
            order_id: order_id
                .parse()
                .map_err(|_| api::invalid("orderId"))?,
            payment_id: payment_id
                .parse()
                .map_err(|_| api::invalid("paymentId"))?,
            signature,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(transaction.into()))
}

/// Handler of `GET /payments/orders/:id/status`.
///
/// An order is visible to the user who opened it and to admins only.
pub async fn order_status(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Path(id): Path<String>,
) -> Result<Json<Order>, Error> {
    let order_id = id
        .parse::<transaction::OrderId>()
        .map_err(|_| api::invalid("orderId"))?;

    let transaction = service
        .execute(query::transaction::ByOrderId::by(order_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(PaymentError::OrderNotExists)?;

    if transaction.user_id != identity.user_id && identity.role != Role::Admin
    {
        return Err(PaymentError::OrderNotExists.into());
    }

    Ok(Json(transaction.into()))
}

/// Request body of the order creation endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// ID of the purchased package.
    pub package_id: package::Id,

    /// ID of the listing the purchase promotes, if any.
    pub listing_id: Option<listing::Id>,
}

/// Request body of the payment verification endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// Order ID reported by the gateway.
    pub order_id: String,

    /// Payment ID reported by the gateway.
    pub payment_id: String,

    /// Hex-encoded payment proof signature.
    pub signature: String,
}

/// A payment order, as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Internal ID of the transaction.
    pub transaction_id: transaction::Id,

    /// Order ID assigned by the gateway.
    pub order_id: String,

    /// ID of the purchasing user.
    pub user_id: user::Id,

    /// ID of the purchased package.
    pub package_id: package::Id,

    /// ID of the promoted listing, if any.
    pub listing_id: Option<listing::Id>,

    /// Charged amount.
    pub amount: api::packages::Price,

    /// Status of the transaction.
    pub status: String,

    /// Payment ID reported by the gateway, once verified.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    /// When the order was created, as an RFC 3339 string.
    pub created_at: String,

    /// When the payment settled, as an RFC 3339 string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<String>,
}

impl From<transaction::Transaction> for Order {
    fn from(t: transaction::Transaction) -> Self {
        let transaction::Transaction {
            id,
            order_id,
            user_id,
            package_id,
            listing_id,
            amount,
            status,
            payment_id,
            created_at,
            settled_at,
        } = t;

        Self {
            transaction_id: id,
            order_id: order_id.to_string(),
            user_id,
            package_id,
            listing_id,
            amount: amount.into(),
            status: status.to_string(),
            payment_id: payment_id.map(|p| p.to_string()),
            created_at: created_at.to_rfc3339(),
            settled_at: settled_at.map(|at| at.to_rfc3339()),
        }
    }
}

impl AsError for command::create_payment_order::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Gateway(e) => e.try_as_error(),
            Self::ListingNotExists(_) => {
                Some(api::listings::ListingError::NotExists.into())
            }
            Self::ListingNotOwned(_) => {
                Some(PaymentError::ListingNotOwned.into())
            }
            Self::PackageNotExists(_) => {
                Some(api::packages::PackageError::NotExists.into())
            }
            Self::PriceNotChargeable(_) => {
                Some(PaymentError::PriceNotChargeable.into())
            }
        }
    }
}

impl AsError for command::verify_payment::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) | Self::PackageNotExists(_) => None,
            Self::SignatureMismatch => {
                Some(PaymentError::SignatureMismatch.into())
            }
            Self::TransactionNotExists(_) => {
                Some(PaymentError::OrderNotExists.into())
            }
            Self::TransactionNotPending(_) => {
                Some(PaymentError::TransactionNotPending.into())
            }
        }
    }
}

define_error! {
    enum PaymentError {
        #[code = "ORDER_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Payment order not found"]
        OrderNotExists,

        #[code = "LISTING_NOT_OWNED"]
        #[status = FORBIDDEN]
        #[message = "Listing is not owned by the purchasing user"]
        ListingNotOwned,

        #[code = "PRICE_NOT_CHARGEABLE"]
        #[status = BAD_REQUEST]
        #[message = "Package price cannot be charged"]
        PriceNotChargeable,

        #[code = "SIGNATURE_MISMATCH"]
        #[status = BAD_REQUEST]
        #[message = "Payment proof signature mismatch"]
        SignatureMismatch,

        #[code = "TRANSACTION_NOT_PENDING"]
        #[status = CONFLICT]
        #[message = "Transaction can no longer be settled"]
        TransactionNotPending,
    }
}

#[cfg(test)]
mod spec {
    use axum::{response::IntoResponse as _, Json};
    use rust_decimal::Decimal;
    use service::domain::{package, transaction, user};

    use crate::api;

    use super::Order;

    #[test]
    fn opened_order_answers_ok() {
        let order = Order {
            transaction_id: transaction::Id::new(),
            order_id: "order_N5lT9MPGbCfnmB".to_owned(),
            user_id: user::Id::new(),
            package_id: package::Id::new(),
            listing_id: None,
            amount: api::packages::Price {
                amount: Decimal::from(499),
                currency: "INR".to_owned(),
            },
            status: "PENDING".to_owned(),
            payment_id: None,
            created_at: "2026-08-28T00:00:00Z".to_owned(),
            settled_at: None,
        };

        let response = Json(order).into_response();

        assert_eq!(response.status(), http::StatusCode::OK);
    }
}
