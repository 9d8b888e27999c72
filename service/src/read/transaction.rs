//! [`Transaction`] read model definition.

use crate::domain::{transaction, user};
#[cfg(doc)]
use crate::domain::Transaction;

/// Number of a user's settled [`Transaction`]s.
#[derive(Clone, Copy, Debug)]
pub struct SettledCount(pub i64);

/// Selector of a user's [`SettledCount`].
#[derive(Clone, Copy, Debug)]
pub struct SettledCountOf {
    /// ID of the user whose settled [`Transaction`]s are counted.
    pub user_id: user::Id,

    /// [`Transaction`] to exclude from the count (the one currently being
    /// discounted), if any.
    pub excluding: Option<transaction::Id>,
}
