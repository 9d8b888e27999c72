//! Listing-related endpoints.

use axum::{extract::Path, Extension, Json};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{listing, package, user},
    query, read, Command as _, Query as _,
};

use crate::{api, context::Role, define_error, AsError, Error, Identity};

/// Handler of `POST /listings`.
///
/// Submits a new listing. The created listing is always hidden until it
/// passes moderation (and payment, if a package was selected).
pub async fn submit(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Json(req): Json<SubmitRequest>,
) -> Result<(http::StatusCode, Json<Listing>), Error> {
    let SubmitRequest {
        title,
        description,
        location,
        package_id,
    } = req;

    let listing = service
        .execute(command::SubmitListing {
            owner_id: identity.user_id,
            title: title.parse().map_err(|_| api::invalid("title"))?,
            description: description
                .parse()
                .map_err(|_| api::invalid("description"))?,
            location: location.parse().map_err(|_| api::invalid("location"))?,
            package_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((http::StatusCode::CREATED, Json(listing.into())))
}

/// Handler of `GET /listings/:id`.
///
/// A hidden listing is visible to its owner and to admins only; everyone
/// else gets a not-found, not a forbidden, to avoid leaking its existence.
pub async fn get(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Path(id): Path<listing::Id>,
) -> Result<Json<Listing>, Error> {
    let listing = service
        .execute(query::listing::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .ok_or(ListingError::NotExists)?;

    if !listing.is_live()
        && listing.owner_id != identity.user_id
        && identity.role != Role::Admin
    {
        return Err(ListingError::NotExists.into());
    }

    Ok(Json(listing.into()))
}

/// Handler of `GET /admin/listings/pending`.
///
/// Returns the moderation backlog, oldest submissions first.
pub async fn pending(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
) -> Result<Json<Vec<Listing>>, Error> {
    identity.require_admin()?;

    let listings = service
        .execute(query::listings::AwaitingReview::by(
            read::listing::AwaitingReview,
        ))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(listings.into_iter().map(Into::into).collect()))
}

/// Handler of `PUT /admin/listings/:id/moderation`.
pub async fn moderate(
    Extension(service): Extension<crate::Service>,
    identity: Identity,
    Path(id): Path<listing::Id>,
    Json(req): Json<ModerationRequest>,
) -> Result<Json<Listing>, Error> {
    identity.require_admin()?;

    let ModerationRequest {
        decision,
        comment,
        rejection_reason,
    } = req;

    let decision = match decision.as_str() {
        "APPROVE" => command::moderate_listing::Decision::Approve {
            comment: comment
                .map(|c| c.parse())
                .transpose()
                .map_err(|_| api::invalid("comment"))?,
        },
        "REJECT" => command::moderate_listing::Decision::Reject {
            reason: rejection_reason
                .ok_or_else(|| api::invalid("rejectionReason"))?
                .parse()
                .map_err(|_| api::invalid("rejectionReason"))?,
        },
        _ => return Err(api::invalid("decision")),
    };

    let listing = service
        .execute(command::ModerateListing {
            listing_id: id,
            moderator_id: identity.user_id,
            decision,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(listing.into()))
}

/// Request body of the listing submission endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    /// Title of the listing.
    pub title: String,

    /// Description of the listing.
    pub description: String,

    /// Location of the advertised property.
    pub location: String,

    /// ID of the visibility package to purchase, if any.
    pub package_id: Option<package::Id>,
}

/// Request body of the moderation endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationRequest {
    /// Decision upon the listing: `APPROVE` or `REJECT`.
    pub decision: String,

    /// Optional moderator comment, on approval.
    pub comment: Option<String>,

    /// Reason of the rejection, required on rejection.
    pub rejection_reason: Option<String>,
}

/// A listing, as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// ID of this listing.
    pub id: listing::Id,

    /// ID of the user who submitted this listing.
    pub owner_id: user::Id,

    /// Title of this listing.
    pub title: String,

    /// Description of this listing.
    pub description: String,

    /// Location of the advertised property.
    pub location: String,

    /// ID of the selected package, if any.
    pub package_id: Option<package::Id>,

    /// Payment state of the selected package.
    pub payment: String,

    /// Review state of this listing.
    pub review: Review,

    /// Derived public visibility of this listing.
    pub lifecycle: String,

    /// Snapshot of the purchased package, if payment was verified.
    pub package: Option<PackageSnapshot>,

    /// When this listing was created, as an RFC 3339 string.
    pub created_at: String,
}

impl From<listing::Listing> for Listing {
    fn from(l: listing::Listing) -> Self {
        let lifecycle = l.lifecycle().to_string();
        let listing::Listing {
            id,
            owner_id,
            title,
            description,
            location,
            package_id,
            payment,
            review,
            package,
            created_at,
        } = l;

        Self {
            id,
            owner_id,
            title: title.to_string(),
            description: description.to_string(),
            location: location.to_string(),
            package_id,
            payment: payment.to_string(),
            review: review.into(),
            lifecycle,
            package: package.map(Into::into),
            created_at: created_at.to_rfc3339(),
        }
    }
}

/// Review state of a [`Listing`], as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Kind of the review state.
    pub kind: String,

    /// ID of the approving moderator, if approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<user::Id>,

    /// Moderator comment, if any was left on approval.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// When the listing was approved, as an RFC 3339 string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,

    /// Reason of the rejection, if rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,

    /// When the listing was rejected, as an RFC 3339 string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<String>,
}

impl From<listing::Review> for Review {
    fn from(review: listing::Review) -> Self {
        let kind = review.kind().to_string();
        let mut body = Self {
            kind,
            approved_by: None,
            comment: None,
            approved_at: None,
            rejection_reason: None,
            rejected_at: None,
        };
        match review {
            listing::Review::Pending
            | listing::Review::PendingPaymentApproval => {}
            listing::Review::Approved { by, comment, at } => {
                body.approved_by = Some(by);
                body.comment = comment.map(|c| c.to_string());
                body.approved_at = Some(at.to_rfc3339());
            }
            listing::Review::Rejected { reason, at } => {
                body.rejection_reason = Some(reason.to_string());
                body.rejected_at = Some(at.to_rfc3339());
            }
        }
        body
    }
}

/// Snapshot of a purchased package, as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSnapshot {
    /// ID of the purchased package.
    pub package_id: package::Id,

    /// Name of the package at purchase time.
    pub name: String,

    /// Tier of the package at purchase time.
    pub tier: String,

    /// Features granted at purchase time.
    pub features: Vec<String>,

    /// Number of days the purchase lasts.
    pub duration_days: u16,

    /// When the purchase was verified, as an RFC 3339 string.
    pub purchased_at: String,

    /// When the purchased features lapse, as an RFC 3339 string.
    pub expires_at: String,

    /// Indicator whether the purchased features have lapsed already.
    pub expired: bool,
}

impl From<listing::PackageSnapshot> for PackageSnapshot {
    fn from(s: listing::PackageSnapshot) -> Self {
        let expired = s.is_expired(common::DateTime::now());
        let listing::PackageSnapshot {
            package_id,
            name,
            tier,
            features,
            duration_days,
            purchased_at,
            expires_at,
        } = s;

        Self {
            package_id,
            name,
            tier,
            features,
            duration_days,
            purchased_at: purchased_at.to_rfc3339(),
            expires_at: expires_at.to_rfc3339(),
            expired,
        }
    }
}

impl AsError for command::submit_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::PackageNotExists(_) => {
                Some(api::packages::PackageError::NotExists.into())
            }
        }
    }
}

impl AsError for command::moderate_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => Some(ListingError::NotExists.into()),
            Self::Moderation(e) => match e {
                listing::ModerationError::AlreadyModerated(_) => {
                    Some(ListingError::AlreadyModerated.into())
                }
                listing::ModerationError::PaymentNotSettled => {
                    Some(ListingError::PaymentNotSettled.into())
                }
            },
        }
    }
}

define_error! {
    enum ListingError {
        #[code = "LISTING_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Listing not found"]
        NotExists,

        #[code = "ALREADY_MODERATED"]
        #[status = CONFLICT]
        #[message = "Listing was already moderated"]
        AlreadyModerated,

        #[code = "PAYMENT_NOT_SETTLED"]
        #[status = CONFLICT]
        #[message = "Listing payment has not settled yet"]
        PaymentNotSettled,
    }
}
