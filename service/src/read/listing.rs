//! [`Listing`] read model definition.

#[cfg(doc)]
use crate::domain::{listing::Review, Listing};

/// Selector of [`Listing`]s awaiting a moderation pass, i.e. with a
/// [`Review`] state of `Pending` or `PendingPaymentApproval`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AwaitingReview;
