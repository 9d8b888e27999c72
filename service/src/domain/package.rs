//! [`Package`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Paid visibility tier a [`Listing`] may be promoted with.
///
/// [`Listing`]: crate::domain::Listing
#[derive(Clone, Debug)]
pub struct Package {
    /// ID of this [`Package`].
    pub id: Id,

    /// [`Name`] of this [`Package`].
    pub name: Name,

    /// [`Tier`] of this [`Package`].
    pub tier: Tier,

    /// Price of this [`Package`].
    ///
    /// May be zero for free tiers, which cannot go through the payment
    /// pipeline.
    pub price: Money,

    /// Number of days the purchased visibility lasts.
    pub duration: DurationDays,

    /// [`Feature`]s granted by this [`Package`].
    pub features: Vec<Feature>,

    /// Indicator whether this [`Package`] is available for purchase.
    pub is_active: bool,

    /// [`DateTime`] when this [`Package`] was created.
    pub created_at: CreationDateTime,
}

/// ID of a [`Package`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Name of a [`Package`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 128
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Feature granted by a [`Package`] (highlighted card, top-of-search
/// placement, etc).
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Feature(String);

impl Feature {
    /// Creates a new [`Feature`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `feature` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(feature: impl Into<String>) -> Self {
        Self(feature.into())
    }

    /// Creates a new [`Feature`] if the given `feature` is valid.
    #[must_use]
    pub fn new(feature: impl Into<String>) -> Option<Self> {
        let feature = feature.into();
        Self::check(&feature).then_some(Self(feature))
    }

    /// Checks whether the given `feature` is a valid [`Feature`].
    fn check(feature: impl AsRef<str>) -> bool {
        let feature = feature.as_ref();
        feature.trim() == feature && !feature.is_empty() && feature.len() <= 256
    }
}

impl FromStr for Feature {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Feature`")
    }
}

/// Number of days a purchased [`Package`] lasts.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Into, PartialEq,
    Serialize,
)]
pub struct DurationDays(u16);

impl DurationDays {
    /// Creates a new [`DurationDays`] if the given `days` value is positive.
    #[must_use]
    pub fn new(days: u16) -> Option<Self> {
        (days > 0).then_some(Self(days))
    }
}

impl FromStr for DurationDays {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .ok()
            .and_then(Self::new)
            .ok_or("invalid `DurationDays`")
    }
}

define_kind! {
    #[doc = "Tier of a [`Package`]."]
    enum Tier {
        #[doc = "Entry-level visibility."]
        Basic = 1,

        #[doc = "Featured placement in category listings."]
        Featured = 2,

        #[doc = "Top-of-search placement with all features."]
        Premium = 3,
    }
}

/// [`DateTime`] when a [`Package`] was created.
pub type CreationDateTime = DateTimeOf<(Package, unit::Creation)>;
