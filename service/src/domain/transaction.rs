//! [`Transaction`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{define_kind, unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{listing, package, user};
#[cfg(doc)]
use crate::domain::{Listing, Package};

/// One payment attempt and its terminal outcome.
///
/// Created `pending` at order-creation time and mutated exactly once, at
/// verification time. The stored [`Money`] amount is the only trusted amount
/// anywhere downstream.
#[derive(Clone, Debug)]
pub struct Transaction {
    /// ID of this [`Transaction`].
    pub id: Id,

    /// [`OrderId`] assigned by the payment gateway.
    ///
    /// Exactly one [`Transaction`] may transition to [`Status::Paid`] per
    /// [`OrderId`].
    pub order_id: OrderId,

    /// ID of the user who initiated this [`Transaction`].
    pub user_id: user::Id,

    /// ID of the purchased [`Package`].
    pub package_id: package::Id,

    /// ID of the [`Listing`] this purchase promotes, if any.
    pub listing_id: Option<listing::Id>,

    /// Amount of this [`Transaction`].
    pub amount: Money,

    /// [`Status`] of this [`Transaction`].
    pub status: Status,

    /// [`PaymentId`] reported by the gateway at verification time, if any.
    pub payment_id: Option<PaymentId>,

    /// [`DateTime`] when this [`Transaction`] was created.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Transaction`] settled, if it did.
    pub settled_at: Option<SettlementDateTime>,
}

impl Transaction {
    /// Indicates whether this [`Transaction`] has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.status == Status::Paid
    }
}

/// Compare-and-set settlement of a [`Transaction`].
///
/// Applies only while the [`Transaction`] is still [`Status::Pending`], so a
/// concurrent settlement of the same [`OrderId`] turns into a no-op instead
/// of a double write.
#[derive(Clone, Debug)]
pub struct Settlement {
    /// [`OrderId`] of the settled [`Transaction`].
    pub order_id: OrderId,

    /// [`PaymentId`] reported by the gateway.
    pub payment_id: PaymentId,

    /// [`DateTime`] when the [`Transaction`] settled.
    pub settled_at: SettlementDateTime,
}

/// ID of a [`Transaction`].
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

/// Order ID assigned by the payment gateway.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct OrderId(String);

impl OrderId {
    /// Creates a new [`OrderId`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `id` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new [`OrderId`] if the given `id` is valid.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        Self::check(&id).then_some(Self(id))
    }

    /// Checks whether the given `id` is a valid [`OrderId`].
    fn check(id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        id.trim() == id && !id.is_empty() && id.len() <= 128
    }
}

impl FromStr for OrderId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `OrderId`")
    }
}

/// Payment ID assigned by the payment gateway to a completed payment.
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[as_ref(forward)]
pub struct PaymentId(String);

impl PaymentId {
    /// Creates a new [`PaymentId`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `id` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a new [`PaymentId`] if the given `id` is valid.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        Self::check(&id).then_some(Self(id))
    }

    /// Checks whether the given `id` is a valid [`PaymentId`].
    fn check(id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        id.trim() == id && !id.is_empty() && id.len() <= 128
    }
}

impl FromStr for PaymentId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `PaymentId`")
    }
}

define_kind! {
    #[doc = "Status of a [`Transaction`]."]
    enum Status {
        #[doc = "Order created, payment not verified yet."]
        Pending = 1,

        #[doc = "Payment verified; the transition here is one-way."]
        Paid = 2,

        #[doc = "Payment attempt failed."]
        Failed = 3,
    }
}

/// [`DateTime`] when a [`Transaction`] was created.
pub type CreationDateTime = DateTimeOf<(Transaction, unit::Creation)>;

/// [`DateTime`] when a [`Transaction`] settled.
pub type SettlementDateTime = DateTimeOf<(Transaction, unit::Settlement)>;
