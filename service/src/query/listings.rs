//! [`Query`] collection related to multiple [`Listing`]s.

use common::operations::By;

use crate::read;
#[cfg(doc)]
use crate::{domain::Listing, Query};

use super::DatabaseQuery;

/// Queries the moderation backlog: [`Listing`]s awaiting a review pass,
/// oldest first.
pub type AwaitingReview =
    DatabaseQuery<By<Vec<crate::domain::Listing>, read::listing::AwaitingReview>>;
