//! [`Coupon`] definitions.

use std::sync::LazyLock;

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Percent};
use derive_more::{AsRef, Display, Error, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{package, transaction, user};
#[cfg(doc)]
use crate::domain::Package;

/// Discount code with eligibility rules.
#[derive(Clone, Debug)]
pub struct Coupon {
    /// ID of this [`Coupon`].
    pub id: Id,

    /// [`Code`] of this [`Coupon`].
    pub code: Code,

    /// [`Discount`] granted by this [`Coupon`].
    pub discount: Discount,

    /// Minimum purchase amount this [`Coupon`] applies from, if any.
    pub min_purchase: Option<Decimal>,

    /// [`DateTime`] this [`Coupon`] is valid from (inclusive).
    pub valid_from: ValidityDateTime,

    /// [`DateTime`] this [`Coupon`] is valid until (exclusive).
    pub valid_until: ValidityDateTime,

    /// Total number of redemptions allowed, if capped.
    pub usage_limit: Option<u32>,

    /// Number of redemptions recorded so far.
    ///
    /// Never exceeds [`Coupon::usage_limit`] when the latter is set.
    pub used_count: u32,

    /// [`Applicability`] of this [`Coupon`].
    pub applicability: Applicability,

    /// Indicator whether this [`Coupon`] is redeemable at all.
    pub is_active: bool,
}

impl Coupon {
    /// Runs the full eligibility rule set against the provided [`Redemption`]
    /// context.
    ///
    /// Preview and commit run the same rules; commit feeds in the settled
    /// transaction's amount and package instead of caller claims.
    ///
    /// # Errors
    ///
    /// The first violated rule, as a [`RuleViolation`].
    pub fn check(&self, redemption: &Redemption) -> Result<(), RuleViolation> {
        use RuleViolation as E;

        if !self.is_active {
            return Err(E::Inactive);
        }

        let now = redemption.now;
        if now < self.valid_from.coerce() {
            return Err(E::NotStarted);
        }
        if now >= self.valid_until.coerce() {
            return Err(E::Expired);
        }

        if let Some(limit) = self.usage_limit {
            if self.used_count >= limit {
                return Err(E::LimitExceeded);
            }
        }

        if redemption.used_before {
            return Err(E::AlreadyUsed);
        }

        if matches!(self.applicability, Applicability::FirstTimeUsers)
            && redemption.prior_settled_purchases > 0
        {
            return Err(E::NotFirstPurchase);
        }

        if let Some(required) = self.min_purchase {
            if redemption.amount < required {
                return Err(E::MinPurchaseNotMet { required });
            }
        }

        if let Applicability::SpecificPackages(ids) = &self.applicability {
            if !redemption
                .package_id
                .is_some_and(|id| ids.contains(&id))
            {
                return Err(E::PackageNotEligible);
            }
        }

        Ok(())
    }

    /// Computes the discount this [`Coupon`] grants on the provided `amount`.
    ///
    /// Never negative and never exceeds `amount`: a coupon cannot produce a
    /// negative charge.
    #[must_use]
    pub fn discount_for(&self, amount: Decimal) -> Decimal {
        self.discount.apply(amount)
    }
}

/// Context a [`Coupon`] redemption is checked against.
#[derive(Clone, Copy, Debug)]
pub struct Redemption {
    /// Moment the rules are evaluated at.
    pub now: common::DateTime,

    /// Purchase amount the [`Coupon`] is applied to.
    pub amount: Decimal,

    /// ID of the purchased [`Package`], if known.
    pub package_id: Option<package::Id>,

    /// Whether the redeeming user has already used this [`Coupon`].
    pub used_before: bool,

    /// Number of the redeeming user's prior settled purchases, excluding the
    /// one being discounted.
    pub prior_settled_purchases: i64,
}

/// Discount granted by a [`Coupon`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Discount {
    /// Percentage of the purchase amount, optionally capped.
    Percentage {
        /// Percentage to subtract.
        value: Percent,

        /// Upper bound of the granted discount, if any.
        cap: Option<Decimal>,
    },

    /// Fixed amount.
    Fixed(Decimal),
}

impl Discount {
    /// Applies this [`Discount`] to the provided `amount`, clamping the
    /// result into `[0, amount]`.
    #[must_use]
    pub fn apply(&self, amount: Decimal) -> Decimal {
        let raw = match self {
            Self::Percentage { value, cap } => {
                let d = value.of(amount);
                cap.map_or(d, |cap| d.min(cap))
            }
            Self::Fixed(value) => *value,
        };
        raw.clamp(Decimal::ZERO, amount.max(Decimal::ZERO))
    }

    /// Returns the [`DiscountKind`] of this [`Discount`].
    #[must_use]
    pub fn kind(&self) -> DiscountKind {
        match self {
            Self::Percentage { .. } => DiscountKind::Percentage,
            Self::Fixed(_) => DiscountKind::Fixed,
        }
    }
}

/// [`Applicability`] scope of a [`Coupon`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Applicability {
    /// Applicable to any purchase.
    All,

    /// Applicable only to the listed [`Package`]s.
    SpecificPackages(Vec<package::Id>),

    /// Applicable only to users with no prior settled purchase.
    FirstTimeUsers,
}

impl Applicability {
    /// Returns the [`ApplicabilityKind`] of this [`Applicability`].
    #[must_use]
    pub fn kind(&self) -> ApplicabilityKind {
        match self {
            Self::All => ApplicabilityKind::All,
            Self::SpecificPackages(_) => ApplicabilityKind::SpecificPackages,
            Self::FirstTimeUsers => ApplicabilityKind::FirstTimeUsers,
        }
    }
}

/// Violation of a [`Coupon`] eligibility rule.
#[derive(Clone, Copy, Debug, Display, Error)]
pub enum RuleViolation {
    /// [`Coupon`] is deactivated.
    #[display("`Coupon` is not active")]
    Inactive,

    /// [`Coupon`] validity window has not opened yet.
    #[display("`Coupon` is not valid yet")]
    NotStarted,

    /// [`Coupon`] validity window has closed.
    #[display("`Coupon` has expired")]
    Expired,

    /// [`Coupon`] usage limit is reached.
    #[display("`Coupon` usage limit is reached")]
    LimitExceeded,

    /// Redeeming user has already used this [`Coupon`].
    #[display("`Coupon` was already used by this user")]
    AlreadyUsed,

    /// [`Coupon`] is for first-time buyers only.
    #[display("`Coupon` is only for first-time buyers")]
    NotFirstPurchase,

    /// Purchase amount is below the [`Coupon`]'s minimum.
    #[display("purchase amount is below the required minimum {required}")]
    MinPurchaseNotMet {
        /// Minimum purchase amount required by the [`Coupon`].
        required: Decimal,
    },

    /// Purchased [`Package`] is not in the [`Coupon`]'s allow-list.
    #[display("`Coupon` is not applicable to this `Package`")]
    PackageNotEligible,
}

/// Record of a [`Coupon`] redemption by a user.
///
/// At most one exists per `(coupon, user)` pair, ever.
#[derive(Clone, Copy, Debug)]
pub struct Usage {
    /// ID of the redeemed [`Coupon`].
    pub coupon_id: Id,

    /// ID of the redeeming user.
    pub user_id: user::Id,

    /// ID of the [`Transaction`] the discount was granted on.
    ///
    /// [`Transaction`]: crate::domain::Transaction
    pub transaction_id: transaction::Id,

    /// Discount amount actually granted, computed server-side at
    /// usage-recording time.
    pub discount_amount: Decimal,

    /// [`DateTime`] when the redemption was recorded.
    pub used_at: UsageDateTime,
}

/// Guarded increment of a [`Coupon`]'s usage counter.
///
/// Applies only while the counter is below the usage limit, closing the race
/// of two redemptions competing for the last remaining use.
#[derive(Clone, Copy, Debug)]
pub struct UsageIncrement {
    /// ID of the redeemed [`Coupon`].
    pub coupon_id: Id,
}

/// ID of a [`Coupon`].
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

/// Code of a [`Coupon`].
///
/// Case-insensitive: stored and compared uppercase.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct Code(String);

impl Code {
    /// Creates a new [`Code`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `code` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Creates a new [`Code`] if the given `code` is valid, uppercasing it.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Option<Self> {
        let code = code.into().to_uppercase();
        Self::check(&code).then_some(Self(code))
    }

    /// Checks whether the given `code` is a valid [`Code`].
    fn check(code: impl AsRef<str>) -> bool {
        /// Regular expression checking [`Code`] format.
        static REGEX: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^[A-Z0-9][A-Z0-9_-]{2,31}$").expect("valid regex")
        });

        REGEX.is_match(code.as_ref())
    }
}

impl FromStr for Code {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Code`")
    }
}

define_kind! {
    #[doc = "Kind of a [`Discount`], as persisted."]
    enum DiscountKind {
        #[doc = "Percentage of the purchase amount."]
        Percentage = 1,

        #[doc = "Fixed amount."]
        Fixed = 2,
    }
}

define_kind! {
    #[doc = "Kind of an [`Applicability`], as persisted."]
    enum ApplicabilityKind {
        #[doc = "Applicable to any purchase."]
        All = 1,

        #[doc = "Applicable only to listed packages."]
        SpecificPackages = 2,

        #[doc = "Applicable only to first-time buyers."]
        FirstTimeUsers = 3,
    }
}

/// [`DateTime`] bounding a [`Coupon`]'s validity window.
pub type ValidityDateTime = DateTimeOf<(Coupon, unit::Validity)>;

/// [`DateTime`] when a [`Coupon`] [`Usage`] was recorded.
pub type UsageDateTime = DateTimeOf<(Usage, unit::Creation)>;

#[cfg(test)]
mod spec {
    use std::{str::FromStr as _, time::Duration};

    use common::{DateTime, Percent};
    use rust_decimal::Decimal;

    use crate::domain::package;

    use super::{
        Applicability, Code, Coupon, Discount, Redemption, RuleViolation,
    };

    fn decimal(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn coupon(discount: Discount) -> Coupon {
        let now = DateTime::now();
        Coupon {
            id: super::Id::new(),
            code: Code::new("SAVE10").unwrap(),
            discount,
            min_purchase: None,
            valid_from: (now - Duration::from_secs(60)).coerce(),
            valid_until: (now + Duration::from_secs(3600)).coerce(),
            usage_limit: None,
            used_count: 0,
            applicability: Applicability::All,
            is_active: true,
        }
    }

    fn redemption(amount: Decimal) -> Redemption {
        Redemption {
            now: DateTime::now(),
            amount,
            package_id: None,
            used_before: false,
            prior_settled_purchases: 0,
        }
    }

    #[test]
    fn code_is_case_insensitive() {
        assert_eq!(
            Code::new("save10").unwrap(),
            Code::new("SAVE10").unwrap(),
        );
        assert!(Code::new("x").is_none());
        assert!(Code::new("has space").is_none());
    }

    #[test]
    fn percentage_discount_clamps_to_cap() {
        // 10%, max discount 50, min purchase 100 against amount 1000:
        // the raw 100 is clamped to 50.
        let mut c = coupon(Discount::Percentage {
            value: Percent::from_str("10").unwrap(),
            cap: Some(decimal("50")),
        });
        c.min_purchase = Some(decimal("100"));

        c.check(&redemption(decimal("1000"))).unwrap();
        assert_eq!(c.discount_for(decimal("1000")), decimal("50"));
    }

    #[test]
    fn discount_never_exceeds_amount() {
        let c = coupon(Discount::Fixed(decimal("700")));
        assert_eq!(c.discount_for(decimal("500")), decimal("500"));

        let c = coupon(Discount::Percentage {
            value: Percent::from_str("100").unwrap(),
            cap: None,
        });
        assert_eq!(c.discount_for(decimal("500")), decimal("500"));
    }

    #[test]
    fn inactive_coupon_is_refused() {
        let mut c = coupon(Discount::Fixed(decimal("10")));
        c.is_active = false;

        assert!(matches!(
            c.check(&redemption(decimal("1000"))),
            Err(RuleViolation::Inactive),
        ));
    }

    #[test]
    fn validity_window_is_half_open() {
        let c = coupon(Discount::Fixed(decimal("10")));

        let mut r = redemption(decimal("1000"));
        r.now = c.valid_from.coerce();
        c.check(&r).unwrap();

        r.now = c.valid_until.coerce();
        assert!(matches!(c.check(&r), Err(RuleViolation::Expired)));

        r.now = c.valid_from.coerce() - Duration::from_secs(1);
        assert!(matches!(c.check(&r), Err(RuleViolation::NotStarted)));
    }

    #[test]
    fn usage_limit_is_enforced() {
        let mut c = coupon(Discount::Fixed(decimal("10")));
        c.usage_limit = Some(1);
        c.used_count = 1;

        assert!(matches!(
            c.check(&redemption(decimal("1000"))),
            Err(RuleViolation::LimitExceeded),
        ));
    }

    #[test]
    fn reuse_by_same_user_is_refused() {
        let c = coupon(Discount::Fixed(decimal("10")));
        let mut r = redemption(decimal("1000"));
        r.used_before = true;

        assert!(matches!(c.check(&r), Err(RuleViolation::AlreadyUsed)));
    }

    #[test]
    fn first_time_coupon_requires_no_prior_purchases() {
        let mut c = coupon(Discount::Fixed(decimal("10")));
        c.applicability = Applicability::FirstTimeUsers;

        let mut r = redemption(decimal("1000"));
        c.check(&r).unwrap();

        r.prior_settled_purchases = 2;
        assert!(matches!(c.check(&r), Err(RuleViolation::NotFirstPurchase)));
    }

    #[test]
    fn min_purchase_is_enforced() {
        let mut c = coupon(Discount::Fixed(decimal("10")));
        c.min_purchase = Some(decimal("100"));

        assert!(matches!(
            c.check(&redemption(decimal("99.99"))),
            Err(RuleViolation::MinPurchaseNotMet { .. }),
        ));
        c.check(&redemption(decimal("100"))).unwrap();
    }

    #[test]
    fn package_allow_list_is_enforced() {
        let eligible = package::Id::new();
        let mut c = coupon(Discount::Fixed(decimal("10")));
        c.applicability = Applicability::SpecificPackages(vec![eligible]);

        let mut r = redemption(decimal("1000"));
        assert!(matches!(
            c.check(&r),
            Err(RuleViolation::PackageNotEligible),
        ));

        r.package_id = Some(package::Id::new());
        assert!(matches!(
            c.check(&r),
            Err(RuleViolation::PackageNotEligible),
        ));

        r.package_id = Some(eligible);
        c.check(&r).unwrap();
    }
}
