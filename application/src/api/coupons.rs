//! Coupon endpoints.

use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{coupon, package, transaction},
    query, Command as _, Query as _,
};

use crate::{api, define_error, AsError, Error, Identity};

/// Handler of `POST /coupons/preview`.
///
/// Side-effect free dry run: reports what the coupon would grant on the
/// claimed purchase, without consuming anything. The commit re-validates
/// everything, so the preview promises nothing.
pub async fn preview(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Json(req): Json<PreviewRequest>,
) -> Result<Json<Preview>, Error> {
    let purchase_amount = req.purchase_amount()?;
    let PreviewRequest {
        code, package_id, ..
    } = req;

    let preview = service
        .execute(query::PreviewCoupon {
            code: code.parse().map_err(|_| api::invalid("code"))?,
            user_id: identity.user_id,
            package_id,
            purchase_amount,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Preview {
        coupon_id: preview.coupon_id,
        discount_amount: preview.discount_amount,
        final_amount: preview.final_amount,
    }))
}

/// Handler of `POST /coupons/commit`.
///
/// Commits a coupon redemption against a settled transaction of the caller.
pub async fn commit(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Json(req): Json<CommitRequest>,
) -> Result<Json<Redemption>, Error> {
    let CommitRequest {
        coupon_id,
        transaction_id,
    } = req;

    let discount_amount = service
        .execute(command::RedeemCoupon {
            coupon_id,
            user_id: identity.user_id,
            transaction_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Redemption {
        coupon_id,
        discount_amount,
    }))
}

/// Request body of the coupon preview endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    /// Code of the previewed coupon.
    pub code: String,

    /// ID of the package intended for purchase, if chosen already.
    pub package_id: Option<package::Id>,

    /// Intended purchase amount, in major currency units.
    pub purchase_amount: Decimal,
}

impl PreviewRequest {
    /// Returns the claimed purchase amount, refusing non-positive values a
    /// discount cannot apply to.
    fn purchase_amount(&self) -> Result<Decimal, Error> {
        if self.purchase_amount > Decimal::ZERO {
            Ok(self.purchase_amount)
        } else {
            Err(api::invalid("purchaseAmount"))
        }
    }
}

/// Request body of the coupon commit endpoint.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// ID of the redeemed coupon.
    pub coupon_id: coupon::Id,

    /// ID of the settled transaction the discount is granted on.
    pub transaction_id: transaction::Id,
}

/// Response body of the coupon preview endpoint.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    /// ID of the previewed coupon.
    pub coupon_id: coupon::Id,

    /// Discount the coupon would grant.
    pub discount_amount: Decimal,

    /// Amount remaining after the discount.
    pub final_amount: Decimal,
}

/// Response body of the coupon commit endpoint.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    /// ID of the redeemed coupon.
    pub coupon_id: coupon::Id,

    /// Granted discount amount.
    pub discount_amount: Decimal,
}

/// Converts a [`coupon::RuleViolation`] into a `BAD_REQUEST` [`Error`]
/// carrying the concrete violated rule.
fn rule_violation(v: &coupon::RuleViolation) -> Error {
    Error {
        code: "COUPON_NOT_APPLICABLE",
        status_code: http::StatusCode::BAD_REQUEST,
        backtrace: None,
        message: v.to_string(),
    }
}

impl AsError for query::coupon::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::CouponNotExists(_) => {
                Some(CouponError::NotExists.into())
            }
            Self::Db(e) => e.try_as_error(),
            Self::Rule(v) => Some(rule_violation(v)),
        }
    }
}

impl AsError for command::redeem_coupon::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::AlreadyUsed(_) => Some(CouponError::AlreadyUsed.into()),
            Self::CouponNotExists(_) => Some(CouponError::NotExists.into()),
            Self::Db(e) => e.try_as_error(),
            Self::LimitExceeded(_) => Some(CouponError::LimitExceeded.into()),
            Self::Rule(v) => Some(rule_violation(v)),
            Self::TransactionNotExists(_) => {
                Some(CouponError::TransactionNotExists.into())
            }
            Self::TransactionNotOwned(_) => {
                Some(CouponError::TransactionNotOwned.into())
            }
            Self::TransactionNotSettled(_) => {
                Some(CouponError::TransactionNotSettled.into())
            }
        }
    }
}

define_error! {
    enum CouponError {
        #[code = "COUPON_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Coupon not found"]
        NotExists,

        #[code = "COUPON_ALREADY_USED"]
        #[status = CONFLICT]
        #[message = "Coupon was already used by this user"]
        AlreadyUsed,

        #[code = "COUPON_LIMIT_EXCEEDED"]
        #[status = CONFLICT]
        #[message = "Coupon usage limit is reached"]
        LimitExceeded,

        #[code = "TRANSACTION_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Transaction not found"]
        TransactionNotExists,

        #[code = "TRANSACTION_NOT_OWNED"]
        #[status = FORBIDDEN]
        #[message = "Transaction is not owned by the redeeming user"]
        TransactionNotOwned,

        #[code = "TRANSACTION_NOT_SETTLED"]
        #[status = CONFLICT]
        #[message = "Transaction has not settled yet"]
        TransactionNotSettled,
    }
}

#[cfg(test)]
mod spec {
    use rust_decimal::Decimal;

    use super::PreviewRequest;

    fn preview(amount: Decimal) -> PreviewRequest {
        PreviewRequest {
            code: "WELCOME10".to_owned(),
            package_id: None,
            purchase_amount: amount,
        }
    }

    #[test]
    fn refuses_non_positive_purchase_amount() {
        assert_eq!(
            preview(Decimal::ZERO).purchase_amount().unwrap_err().code,
            "INVALID_REQUEST",
        );
        assert!(preview(Decimal::from(-100)).purchase_amount().is_err());
        assert_eq!(
            preview(Decimal::from(500)).purchase_amount().unwrap(),
            Decimal::from(500),
        );
    }
}
