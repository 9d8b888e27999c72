//! [`Transaction`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{transaction, Transaction},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Transaction`] row, in the order [`transaction_from_row`]
/// expects.
const COLUMNS: &str = "\
    id, order_id, user_id, package_id, listing_id, \
    amount, currency, status, payment_id, \
    created_at, settled_at";

/// Reconstructs a [`Transaction`] from its row.
fn transaction_from_row(row: &Row) -> Transaction {
    Transaction {
        id: row.get("id"),
        order_id: row.get("order_id"),
        user_id: row.get("user_id"),
        package_id: row.get("package_id"),
        listing_id: row.get("listing_id"),
        amount: Money {
            amount: row.get("amount"),
            currency: row.get("currency"),
        },
        status: row.get("status"),
        payment_id: row.get("payment_id"),
        created_at: row.get("created_at"),
        settled_at: row.get("settled_at"),
    }
}

impl<C> Database<Select<By<Option<Transaction>, transaction::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Transaction>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Transaction>, transaction::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: transaction::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM transactions \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(transaction_from_row))
    }
}

impl<C> Database<Select<By<Option<Transaction>, transaction::OrderId>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Transaction>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Transaction>, transaction::OrderId>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let order_id: transaction::OrderId = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM transactions \
             WHERE order_id = $1::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&order_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(transaction_from_row))
    }
}

impl<C> Database<Insert<Transaction>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(transaction): Insert<Transaction>,
    ) -> Result<Self::Ok, Self::Err> {
        let Transaction {
            id,
            order_id,
            user_id,
            package_id,
            listing_id,
            amount,
            status,
            payment_id,
            created_at,
            settled_at,
        } = transaction;

        const SQL: &str = "\
            INSERT INTO transactions (\
                id, order_id, user_id, package_id, listing_id, \
                amount, currency, status, payment_id, \
                created_at, settled_at \
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::UUID, $4::UUID, $5::UUID, \
                $6::NUMERIC, $7::INT2, $8::INT2, $9::VARCHAR, \
                $10::TIMESTAMPTZ, $11::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &order_id,
                &user_id,
                &package_id,
                &listing_id,
                &amount.amount,
                &amount.currency,
                &status,
                &payment_id,
                &created_at,
                &settled_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<transaction::Settlement>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(settlement): Update<transaction::Settlement>,
    ) -> Result<Self::Ok, Self::Err> {
        let transaction::Settlement {
            order_id,
            payment_id,
            settled_at,
        } = settlement;

        // Compare-and-set: only a `pending` row settles, so a concurrent
        // settlement of the same order becomes a no-op.
        const SQL: &str = "\
            UPDATE transactions \
            SET status = $2::INT2, \
                payment_id = $3::VARCHAR, \
                settled_at = $4::TIMESTAMPTZ \
            WHERE order_id = $1::VARCHAR \
              AND status = $5::INT2";
        self.exec(
            SQL,
            &[
                &order_id,
                &transaction::Status::Paid,
                &payment_id,
                &settled_at,
                &transaction::Status::Pending,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|affected| affected > 0)
    }
}

impl<C> Database<Lock<By<Transaction, transaction::OrderId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Transaction, transaction::OrderId>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let order_id: transaction::OrderId = by.into_inner();

        const SQL: &str = "\
            INSERT INTO transactions_lock \
            VALUES ($1::VARCHAR) \
            ON CONFLICT (order_id) DO NOTHING";
        self.query(SQL, &[&order_id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C>
    Database<
        Select<
            By<read::transaction::SettledCount, read::transaction::SettledCountOf>,
        >,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::transaction::SettledCount;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                read::transaction::SettledCount,
                read::transaction::SettledCountOf,
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::transaction::SettledCountOf { user_id, excluding } =
            by.into_inner();

        const SQL: &str = "\
            SELECT COUNT(*)::INT8 \
            FROM transactions \
            WHERE user_id = $1::UUID \
              AND status = $2::INT2 \
              AND ($3::UUID IS NULL OR id != $3::UUID)";
        self.query_opt(SQL, &[&user_id, &transaction::Status::Paid, &excluding])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                read::transaction::SettledCount(
                    row.expect("always exists").get::<_, i64>(0),
                )
            })
    }
}
