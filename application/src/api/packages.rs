//! Package catalog endpoints.

use axum::{
    extract::{Path, Query as QueryParams},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service::{
    domain::package,
    query, read, Query as _,
};

use crate::{api, define_error, AsError, Error};

/// Handler of `GET /packages`.
///
/// Returns active packages only, cheapest tiers first.
pub async fn list(
    Extension(service): Extension<crate::Service>,
    QueryParams(params): QueryParams<ListParams>,
) -> Result<Json<Vec<Package>>, Error> {
    let tier = params
        .tier
        .map(|t| t.parse::<package::Tier>())
        .transpose()
        .map_err(|_| api::invalid("tier"))?;

    let packages = service
        .execute(query::packages::Active::by(read::package::ActiveFilter {
            tier,
        }))
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(packages.into_iter().map(Into::into).collect()))
}

/// Handler of `GET /packages/:id`.
///
/// Deactivated packages are not part of the public catalog anymore, so they
/// answer with a not-found.
pub async fn get(
    Extension(service): Extension<crate::Service>,
    Path(id): Path<package::Id>,
) -> Result<Json<Package>, Error> {
    service
        .execute(query::package::ById::by(id))
        .await
        .map_err(AsError::into_error)?
        .filter(|p| p.is_active)
        .ok_or(PackageError::NotExists.into())
        .map(|p| Json(p.into()))
}

/// Query parameters of the package list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Tier to narrow the catalog to.
    pub tier: Option<String>,
}

/// A visibility package, as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// ID of this package.
    pub id: package::Id,

    /// Name of this package.
    pub name: String,

    /// Tier of this package.
    pub tier: String,

    /// Price of this package.
    pub price: Price,

    /// Number of days the purchased visibility lasts.
    pub duration_days: u16,

    /// Features granted by this package.
    pub features: Vec<String>,

    /// When this package was created, as an RFC 3339 string.
    pub created_at: String,
}

/// A money amount, as represented on the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    /// Amount in major currency units.
    pub amount: Decimal,

    /// Three-letter currency code.
    pub currency: String,
}

impl From<common::Money> for Price {
    fn from(money: common::Money) -> Self {
        Self {
            amount: money.amount,
            currency: money.currency.to_string(),
        }
    }
}

impl From<package::Package> for Package {
    fn from(p: package::Package) -> Self {
        let package::Package {
            id,
            name,
            tier,
            price,
            duration,
            features,
            is_active: _,
            created_at,
        } = p;

        Self {
            id,
            name: name.to_string(),
            tier: tier.to_string(),
            price: price.into(),
            duration_days: duration.into(),
            features: features.iter().map(ToString::to_string).collect(),
            created_at: created_at.to_rfc3339(),
        }
    }
}

define_error! {
    enum PackageError {
        #[code = "PACKAGE_NOT_FOUND"]
        #[status = NOT_FOUND]
        #[message = "Package not found"]
        NotExists,
    }
}
