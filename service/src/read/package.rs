//! [`Package`] read model definition.

use crate::domain::package;
#[cfg(doc)]
use crate::domain::Package;

/// Selector of active [`Package`]s, optionally narrowed to a single
/// [`package::Tier`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ActiveFilter {
    /// [`package::Tier`] to narrow the selection to.
    pub tier: Option<package::Tier>,
}
