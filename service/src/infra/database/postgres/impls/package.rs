//! [`Package`]-related [`Database`] implementations.

use common::{operations::{By, Select}, Money};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{package, Package},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Package`] row, in the order [`package_from_row`] expects.
const COLUMNS: &str = "\
    id, name, tier, price_amount, price_currency, \
    duration_days, features, is_active, created_at";

/// Reconstructs a [`Package`] from its row.
fn package_from_row(row: &Row) -> Package {
    Package {
        id: row.get("id"),
        name: row.get("name"),
        tier: row.get("tier"),
        price: Money {
            amount: row.get("price_amount"),
            currency: row.get("price_currency"),
        },
        duration: u16::try_from(row.get::<_, i32>("duration_days"))
            .ok()
            .and_then(package::DurationDays::new)
            .expect("`duration_days` is positive"),
        features: row.get("features"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Package>, package::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Package>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Package>, package::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: package::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM packages \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(package_from_row))
    }
}

impl<C> Database<Select<By<Vec<Package>, read::package::ActiveFilter>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Package>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Package>, read::package::ActiveFilter>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::package::ActiveFilter { tier } = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM packages \
             WHERE is_active \
               AND ($1::INT2 IS NULL OR tier = $1::INT2) \
             ORDER BY tier ASC, price_amount ASC",
        );
        Ok(self
            .query(&sql, &[&tier])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(package_from_row)
            .collect())
    }
}
