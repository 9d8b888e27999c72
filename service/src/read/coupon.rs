//! [`Coupon`] read model definition.

#[cfg(doc)]
use crate::domain::{coupon::Usage, Coupon};

/// Wrapper indicating whether a [`Usage`] row exists for a
/// `(coupon, user)` pair.
#[derive(Clone, Copy, Debug)]
pub struct Used(pub bool);
