//! [`Coupon`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{coupon, user, Coupon},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Coupon`] row, in the order [`coupon_from_row`] expects.
const COLUMNS: &str = "\
    id, code, discount_kind, discount_value, max_discount, \
    min_purchase, valid_from, valid_until, \
    usage_limit, used_count, \
    applicability, package_ids, is_active";

/// Reconstructs a [`Coupon`] from its row.
fn coupon_from_row(row: &Row) -> Coupon {
    let discount = match row.get::<_, coupon::DiscountKind>("discount_kind") {
        coupon::DiscountKind::Percentage => coupon::Discount::Percentage {
            value: row.get("discount_value"),
            cap: row.get("max_discount"),
        },
        coupon::DiscountKind::Fixed => {
            coupon::Discount::Fixed(row.get("discount_value"))
        }
    };

    let applicability =
        match row.get::<_, coupon::ApplicabilityKind>("applicability") {
            coupon::ApplicabilityKind::All => coupon::Applicability::All,
            coupon::ApplicabilityKind::SpecificPackages => {
                coupon::Applicability::SpecificPackages(row.get("package_ids"))
            }
            coupon::ApplicabilityKind::FirstTimeUsers => {
                coupon::Applicability::FirstTimeUsers
            }
        };

    Coupon {
        id: row.get("id"),
        code: row.get("code"),
        discount,
        min_purchase: row.get("min_purchase"),
        valid_from: row.get("valid_from"),
        valid_until: row.get("valid_until"),
        usage_limit: row
            .get::<_, Option<i32>>("usage_limit")
            .map(u32::try_from)
            .transpose()
            .expect("`usage_limit` is non-negative"),
        used_count: u32::try_from(row.get::<_, i32>("used_count"))
            .expect("`used_count` is non-negative"),
        applicability,
        is_active: row.get("is_active"),
    }
}

impl<C> Database<Select<By<Option<Coupon>, coupon::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Coupon>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Coupon>, coupon::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: coupon::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM coupons \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(coupon_from_row))
    }
}

impl<C> Database<Select<By<Option<Coupon>, coupon::Code>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Coupon>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Coupon>, coupon::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let code: coupon::Code = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM coupons \
             WHERE code = $1::VARCHAR \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&code])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(coupon_from_row))
    }
}

impl<C> Database<Lock<By<Coupon, coupon::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Coupon, coupon::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: coupon::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO coupons_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Select<By<read::coupon::Used, (coupon::Id, user::Id)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::coupon::Used;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::coupon::Used, (coupon::Id, user::Id)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (coupon_id, user_id) = by.into_inner();

        const SQL: &str = "\
            SELECT coupon_id \
            FROM coupon_usages \
            WHERE coupon_id = $1::UUID \
              AND user_id = $2::UUID \
            LIMIT 1";
        self.query_opt(SQL, &[&coupon_id, &user_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| read::coupon::Used(row.is_some()))
    }
}

impl<C> Database<Insert<coupon::Usage>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(usage): Insert<coupon::Usage>,
    ) -> Result<Self::Ok, Self::Err> {
        let coupon::Usage {
            coupon_id,
            user_id,
            transaction_id,
            discount_amount,
            used_at,
        } = usage;

        // The unique `(coupon_id, user_id)` constraint is the at-most-once
        // backstop: a lost race reports `false` instead of erroring.
        const SQL: &str = "\
            INSERT INTO coupon_usages (\
                coupon_id, user_id, transaction_id, \
                discount_amount, used_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::NUMERIC, $5::TIMESTAMPTZ \
            ) \
            ON CONFLICT (coupon_id, user_id) DO NOTHING";
        self.exec(
            SQL,
            &[
                &coupon_id,
                &user_id,
                &transaction_id,
                &discount_amount,
                &used_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|affected| affected > 0)
    }
}

impl<C> Database<Update<coupon::UsageIncrement>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(increment): Update<coupon::UsageIncrement>,
    ) -> Result<Self::Ok, Self::Err> {
        let coupon::UsageIncrement { coupon_id } = increment;

        // Atomic in SQL: the limit is re-checked in the same statement, so
        // two redemptions cannot both take the last remaining use.
        const SQL: &str = "\
            UPDATE coupons \
            SET used_count = used_count + 1 \
            WHERE id = $1::UUID \
              AND (usage_limit IS NULL \
                   OR used_count < usage_limit)";
        self.exec(SQL, &[&coupon_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|affected| affected > 0)
    }
}
