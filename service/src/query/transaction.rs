//! [`Query`] collection related to a single [`Transaction`].

use common::operations::By;

use crate::domain::{transaction, Transaction};
#[cfg(doc)]
use crate::Query;

use super::DatabaseQuery;

/// Queries a [`Transaction`] by its gateway [`transaction::OrderId`].
pub type ByOrderId =
    DatabaseQuery<By<Option<Transaction>, transaction::OrderId>>;
