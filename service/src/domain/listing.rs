//! [`Listing`] definitions.

use std::time::Duration;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{package, user, Package};

/// Property advertisement going through the activation pipeline.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the user who submitted this [`Listing`].
    pub owner_id: user::Id,

    /// [`Title`] of this [`Listing`].
    pub title: Title,

    /// [`Description`] of this [`Listing`].
    pub description: Description,

    /// [`Location`] of the advertised property.
    pub location: Location,

    /// ID of the [`Package`] selected at submission, if any.
    pub package_id: Option<package::Id>,

    /// [`Payment`] state of the selected [`Package`].
    pub payment: Payment,

    /// [`Review`] state of this [`Listing`].
    pub review: Review,

    /// Immutable [`PackageSnapshot`] taken when payment was verified.
    ///
    /// Later catalog edits cannot retroactively change what was purchased.
    pub package: Option<PackageSnapshot>,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,
}

impl Listing {
    /// Indicates whether this [`Listing`] is publicly visible.
    ///
    /// Derived, never stored: a [`Listing`] is live only once approved, and a
    /// [`Listing`] with a selected [`Package`] only once its payment settled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.review.is_approved()
            && (self.package_id.is_none() || self.payment == Payment::Paid)
    }

    /// Returns the [`Lifecycle`] of this [`Listing`].
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        if self.is_live() {
            Lifecycle::Active
        } else {
            Lifecycle::Inactive
        }
    }

    /// Approves this [`Listing`], making it publicly visible.
    ///
    /// # Errors
    ///
    /// - [`ModerationError::AlreadyModerated`] if this [`Listing`] was
    ///   already approved or rejected (terminal states are not re-enterable,
    ///   preserving the audit trail).
    /// - [`ModerationError::PaymentNotSettled`] if a [`Package`] was selected
    ///   but its payment has not settled yet.
    pub fn approve(
        &mut self,
        by: user::Id,
        comment: Option<ModerationComment>,
    ) -> Result<(), ModerationError> {
        use ModerationError as E;

        if self.review.is_terminal() {
            return Err(E::AlreadyModerated(self.review.kind()));
        }
        if self.package_id.is_some() && self.payment != Payment::Paid {
            return Err(E::PaymentNotSettled);
        }

        self.review = Review::Approved {
            by,
            comment,
            at: DateTimeOf::now(),
        };
        Ok(())
    }

    /// Rejects this [`Listing`], keeping it hidden and storing the `reason`.
    ///
    /// # Errors
    ///
    /// [`ModerationError::AlreadyModerated`] if this [`Listing`] was already
    /// approved or rejected.
    pub fn reject(
        &mut self,
        reason: RejectionReason,
    ) -> Result<(), ModerationError> {
        if self.review.is_terminal() {
            return Err(ModerationError::AlreadyModerated(self.review.kind()));
        }

        self.review = Review::Rejected {
            reason,
            at: DateTimeOf::now(),
        };
        Ok(())
    }

    /// Applies a verified [`Package`] purchase to this [`Listing`].
    ///
    /// Marks the payment settled and attaches the `snapshot`, but never makes
    /// the [`Listing`] live: a paid [`Listing`] still requires a moderation
    /// pass, so a non-terminal [`Review`] moves to
    /// [`Review::PendingPaymentApproval`]. Terminal [`Review`] states are
    /// left untouched.
    pub fn apply_purchase(&mut self, snapshot: PackageSnapshot) {
        self.payment = Payment::Paid;
        self.package_id = Some(snapshot.package_id);
        self.package = Some(snapshot);
        if !self.review.is_terminal() {
            self.review = Review::PendingPaymentApproval;
        }
    }
}

/// Review state of a [`Listing`].
///
/// One tagged state instead of separate status/approved/visibility fields, so
/// contradictory combinations are unrepresentable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Review {
    /// Awaiting moderation, no [`Package`] involved.
    Pending,

    /// Awaiting moderation of a [`Listing`] that selected a [`Package`].
    PendingPaymentApproval,

    /// Approved by a moderator.
    Approved {
        /// ID of the moderator who approved the [`Listing`].
        by: user::Id,

        /// Optional moderator comment.
        comment: Option<ModerationComment>,

        /// [`DateTime`] when the [`Listing`] was approved.
        at: ApprovalDateTime,
    },

    /// Rejected by a moderator.
    Rejected {
        /// Reason of the rejection.
        reason: RejectionReason,

        /// [`DateTime`] when the [`Listing`] was rejected.
        at: RejectionDateTime,
    },
}

impl Review {
    /// Returns the [`ReviewKind`] of this [`Review`] state.
    #[must_use]
    pub fn kind(&self) -> ReviewKind {
        match self {
            Self::Pending => ReviewKind::Pending,
            Self::PendingPaymentApproval => ReviewKind::PendingPaymentApproval,
            Self::Approved { .. } => ReviewKind::Approved,
            Self::Rejected { .. } => ReviewKind::Rejected,
        }
    }

    /// Indicates whether this [`Review`] state is an approval.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }

    /// Indicates whether this [`Review`] state is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::Rejected { .. })
    }
}

/// Error of moderating a [`Listing`].
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum ModerationError {
    /// [`Listing`] is already in a terminal [`Review`] state.
    #[display("`Listing` review is already terminal: {_0}")]
    AlreadyModerated(#[error(not(source))] ReviewKind),

    /// [`Listing`] selected a [`Package`] whose payment has not settled.
    #[display("`Listing` payment has not settled yet")]
    PaymentNotSettled,
}

/// Field-scoped update of a [`Listing`]'s [`Review`] state.
///
/// Touches moderation columns only, leaving payment columns to concurrent
/// payment verification.
#[derive(Clone, Debug)]
pub struct ModerationUpdate {
    /// ID of the moderated [`Listing`].
    pub listing_id: Id,

    /// New [`Review`] state of the [`Listing`].
    pub review: Review,
}

/// Field-scoped update of a [`Listing`] applying a verified purchase.
///
/// Touches payment columns only, leaving moderation columns to concurrent
/// moderation.
#[derive(Clone, Debug)]
pub struct PurchaseUpdate {
    /// ID of the paid [`Listing`].
    pub listing_id: Id,

    /// New [`Payment`] state of the [`Listing`].
    pub payment: Payment,

    /// New [`Review`] state of the [`Listing`].
    pub review: Review,

    /// ID of the purchased [`Package`].
    pub package_id: package::Id,

    /// [`PackageSnapshot`] captured at payment verification.
    pub snapshot: PackageSnapshot,
}

/// ID of a [`Listing`].
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

/// Title of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Title(String);

impl Title {
    /// Creates a new [`Title`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `title` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    /// Creates a new [`Title`] if the given `title` is valid.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Option<Self> {
        let title = title.into();
        Self::check(&title).then_some(Self(title))
    }

    /// Checks whether the given `title` is a valid [`Title`].
    fn check(title: impl AsRef<str>) -> bool {
        let title = title.as_ref();
        title.trim() == title && !title.is_empty() && title.len() <= 256
    }
}

impl FromStr for Title {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Title`")
    }
}

/// Description of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Description(String);

impl Description {
    /// Creates a new [`Description`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `description` matches the
    /// format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(description: impl Into<String>) -> Self {
        Self(description.into())
    }

    /// Creates a new [`Description`] if the given `description` is valid.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Option<Self> {
        let description = description.into();
        Self::check(&description).then_some(Self(description))
    }

    /// Checks whether the given `description` is a valid [`Description`].
    fn check(description: impl AsRef<str>) -> bool {
        let description = description.as_ref();
        description.trim() == description
            && !description.is_empty()
            && description.len() <= 8192
    }
}

impl FromStr for Description {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Description`")
    }
}

/// Location of the property advertised by a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Location(String);

impl Location {
    /// Creates a new [`Location`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `location` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Creates a new [`Location`] if the given `location` is valid.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Option<Self> {
        let location = location.into();
        Self::check(&location).then_some(Self(location))
    }

    /// Checks whether the given `location` is a valid [`Location`].
    fn check(location: impl AsRef<str>) -> bool {
        let location = location.as_ref();
        location.trim() == location
            && !location.is_empty()
            && location.len() <= 512
    }
}

impl FromStr for Location {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Location`")
    }
}

/// Comment left by a moderator when approving a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct ModerationComment(String);

impl ModerationComment {
    /// Creates a new [`ModerationComment`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `comment` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(comment: impl Into<String>) -> Self {
        Self(comment.into())
    }

    /// Creates a new [`ModerationComment`] if the given `comment` is valid.
    #[must_use]
    pub fn new(comment: impl Into<String>) -> Option<Self> {
        let comment = comment.into();
        Self::check(&comment).then_some(Self(comment))
    }

    /// Checks whether the given `comment` is a valid [`ModerationComment`].
    fn check(comment: impl AsRef<str>) -> bool {
        let comment = comment.as_ref();
        comment.trim() == comment
            && !comment.is_empty()
            && comment.len() <= 1024
    }
}

impl FromStr for ModerationComment {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `ModerationComment`")
    }
}

/// Reason a moderator rejected a [`Listing`] with.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct RejectionReason(String);

impl RejectionReason {
    /// Creates a new [`RejectionReason`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reason` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Creates a new [`RejectionReason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        Self::check(&reason).then_some(Self(reason))
    }

    /// Checks whether the given `reason` is a valid [`RejectionReason`].
    fn check(reason: impl AsRef<str>) -> bool {
        let reason = reason.as_ref();
        reason.trim() == reason && !reason.is_empty() && reason.len() <= 1024
    }
}

impl FromStr for RejectionReason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `RejectionReason`")
    }
}

define_kind! {
    #[doc = "Kind of a [`Review`] state, as persisted."]
    enum ReviewKind {
        #[doc = "Awaiting moderation without a [`Package`]."]
        Pending = 1,

        #[doc = "Awaiting moderation with a [`Package`] involved."]
        PendingPaymentApproval = 2,

        #[doc = "Approved by a moderator."]
        Approved = 3,

        #[doc = "Rejected by a moderator."]
        Rejected = 4,
    }
}

define_kind! {
    #[doc = "Payment state of a [`Listing`]'s selected [`Package`]."]
    enum Payment {
        #[doc = "No settled payment yet."]
        Unpaid = 1,

        #[doc = "Payment verified and settled."]
        Paid = 2,

        #[doc = "Payment attempt failed."]
        Failed = 3,
    }
}

define_kind! {
    #[doc = "Public visibility of a [`Listing`], derived from its state."]
    enum Lifecycle {
        #[doc = "Hidden from public browsing."]
        Inactive = 1,

        #[doc = "Publicly visible."]
        Active = 2,
    }
}

/// Immutable copy of a [`Package`] taken at payment verification time.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageSnapshot {
    /// ID of the purchased [`Package`].
    pub package_id: package::Id,

    /// Name of the [`Package`] at purchase time.
    pub name: String,

    /// [`package::Tier`] of the [`Package`] at purchase time.
    pub tier: String,

    /// Features granted by the [`Package`] at purchase time.
    pub features: Vec<String>,

    /// Number of days the purchase lasts.
    pub duration_days: u16,

    /// [`DateTime`] when the purchase was verified.
    #[serde(with = "common::datetime::serde::unix_timestamp")]
    pub purchased_at: PurchaseDateTime,

    /// [`DateTime`] when the purchased features lapse.
    #[serde(with = "common::datetime::serde::unix_timestamp")]
    pub expires_at: ExpirationDateTime,
}

impl PackageSnapshot {
    /// Number of seconds in a day.
    const DAY: u64 = 24 * 60 * 60;

    /// Captures a new [`PackageSnapshot`] of the provided [`Package`] at the
    /// `purchased_at` moment.
    #[must_use]
    pub fn capture(package: &Package, purchased_at: PurchaseDateTime) -> Self {
        let duration_days = u16::from(package.duration);
        Self {
            package_id: package.id,
            name: package.name.to_string(),
            tier: package.tier.to_string(),
            features: package
                .features
                .iter()
                .map(ToString::to_string)
                .collect(),
            duration_days,
            purchased_at,
            expires_at: (purchased_at
                + Duration::from_secs(u64::from(duration_days) * Self::DAY))
            .coerce(),
        }
    }

    /// Indicates whether the purchased features have lapsed at the provided
    /// `now` moment.
    ///
    /// Expiry is a read-time check, not a background job.
    #[must_use]
    pub fn is_expired(&self, now: common::DateTime) -> bool {
        self.expires_at.coerce() <= now
    }
}

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;

/// [`DateTime`] when a [`Listing`] was approved.
pub type ApprovalDateTime = DateTimeOf<(Listing, unit::Approval)>;

/// [`DateTime`] when a [`Listing`] was rejected.
pub type RejectionDateTime = DateTimeOf<(Listing, unit::Rejection)>;

/// [`DateTime`] when a [`Listing`]'s [`Package`] purchase was verified.
pub type PurchaseDateTime = DateTimeOf<(Listing, unit::Purchase)>;

/// [`DateTime`] when a [`Listing`]'s purchased [`Package`] lapses.
pub type ExpirationDateTime = DateTimeOf<(Listing, unit::Expiration)>;

#[cfg(test)]
mod spec {
    use std::{str::FromStr as _, time::Duration};

    use common::{DateTimeOf, Money};

    use crate::domain::{package, user, Package};

    use super::{
        Lifecycle, Listing, ModerationError, PackageSnapshot, Payment, Review,
        ReviewKind,
    };

    fn package(price: &str) -> Package {
        Package {
            id: package::Id::new(),
            name: package::Name::new("Premium boost").unwrap(),
            tier: package::Tier::Premium,
            price: Money::from_str(price).unwrap(),
            duration: package::DurationDays::new(30).unwrap(),
            features: vec![package::Feature::new("top-of-search").unwrap()],
            is_active: true,
            created_at: DateTimeOf::now(),
        }
    }

    fn listing(package_id: Option<package::Id>) -> Listing {
        Listing {
            id: super::Id::new(),
            owner_id: user::Id::new(),
            title: super::Title::new("2BHK in Indiranagar").unwrap(),
            description: super::Description::new("Bright, airy, furnished.")
                .unwrap(),
            location: super::Location::new("Bengaluru").unwrap(),
            review: if package_id.is_some() {
                Review::PendingPaymentApproval
            } else {
                Review::Pending
            },
            package_id,
            payment: Payment::Unpaid,
            package: None,
            created_at: DateTimeOf::now(),
        }
    }

    #[test]
    fn new_listing_is_never_live() {
        assert_eq!(listing(None).lifecycle(), Lifecycle::Inactive);
        assert_eq!(
            listing(Some(package::Id::new())).lifecycle(),
            Lifecycle::Inactive,
        );
    }

    #[test]
    fn approval_makes_free_listing_live() {
        let mut l = listing(None);
        l.approve(user::Id::new(), None).unwrap();

        assert!(l.review.is_approved());
        assert_eq!(l.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn approval_refused_until_payment_settles() {
        let pkg = package("500INR");
        let mut l = listing(Some(pkg.id));

        assert!(matches!(
            l.approve(user::Id::new(), None),
            Err(ModerationError::PaymentNotSettled),
        ));
        assert_eq!(l.lifecycle(), Lifecycle::Inactive);

        l.apply_purchase(PackageSnapshot::capture(&pkg, DateTimeOf::now()));
        assert_eq!(l.payment, Payment::Paid);
        // Money does not buy visibility, only eligibility for review.
        assert_eq!(l.lifecycle(), Lifecycle::Inactive);
        assert_eq!(l.review.kind(), ReviewKind::PendingPaymentApproval);

        l.approve(user::Id::new(), None).unwrap();
        assert_eq!(l.lifecycle(), Lifecycle::Active);
    }

    #[test]
    fn terminal_states_refuse_re_moderation() {
        let mut l = listing(None);
        l.reject(super::RejectionReason::new("duplicate").unwrap())
            .unwrap();

        assert_eq!(l.review.kind(), ReviewKind::Rejected);
        assert_eq!(l.lifecycle(), Lifecycle::Inactive);
        assert!(matches!(
            l.approve(user::Id::new(), None),
            Err(ModerationError::AlreadyModerated(ReviewKind::Rejected)),
        ));
        assert!(matches!(
            l.reject(super::RejectionReason::new("again").unwrap()),
            Err(ModerationError::AlreadyModerated(ReviewKind::Rejected)),
        ));
    }

    #[test]
    fn purchase_keeps_terminal_review_untouched() {
        let pkg = package("500INR");
        let mut l = listing(Some(pkg.id));
        l.reject(super::RejectionReason::new("spam").unwrap()).unwrap();

        l.apply_purchase(PackageSnapshot::capture(&pkg, DateTimeOf::now()));

        assert_eq!(l.payment, Payment::Paid);
        assert_eq!(l.review.kind(), ReviewKind::Rejected);
        assert_eq!(l.lifecycle(), Lifecycle::Inactive);
    }

    #[test]
    fn snapshot_outlives_catalog_edits() {
        let mut pkg = package("500INR");
        let purchased_at = DateTimeOf::now();
        let snapshot = PackageSnapshot::capture(&pkg, purchased_at);

        pkg.name = package::Name::new("Renamed").unwrap();
        pkg.features.clear();

        assert_eq!(snapshot.name, "Premium boost");
        assert_eq!(snapshot.features, vec!["top-of-search".to_owned()]);
        assert_eq!(
            snapshot.expires_at,
            (purchased_at + Duration::from_secs(30 * 24 * 60 * 60)).coerce(),
        );
        assert!(!snapshot.is_expired(purchased_at.coerce()));
        assert!(snapshot.is_expired(
            (purchased_at + Duration::from_secs(31 * 24 * 60 * 60)).coerce(),
        ));
    }
}
