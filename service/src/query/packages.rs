//! [`Query`] collection related to multiple [`Package`]s.

use common::operations::By;

use crate::read;
#[cfg(doc)]
use crate::{domain::Package, Query};

use super::DatabaseQuery;

/// Queries active [`Package`]s, optionally narrowed to a tier.
pub type Active =
    DatabaseQuery<By<Vec<crate::domain::Package>, read::package::ActiveFilter>>;
