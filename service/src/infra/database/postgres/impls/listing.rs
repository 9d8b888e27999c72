//! [`Listing`]-related [`Database`] implementations.

use common::operations::{By, Insert, Lock, Select, Update};
use postgres_types::Json;
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{listing, user, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

/// Columns of a [`Listing`] row, in the order [`listing_from_row`] expects.
const COLUMNS: &str = "\
    id, owner_id, title, description, location, \
    package_id, payment, review, \
    approved_by, approval_comment, approved_at, \
    rejection_reason, rejected_at, \
    package_snapshot, created_at";

/// Reconstructs a [`Listing`] from its row.
fn listing_from_row(row: &Row) -> Listing {
    let review = match row.get::<_, listing::ReviewKind>("review") {
        listing::ReviewKind::Pending => listing::Review::Pending,
        listing::ReviewKind::PendingPaymentApproval => {
            listing::Review::PendingPaymentApproval
        }
        listing::ReviewKind::Approved => listing::Review::Approved {
            by: row
                .get::<_, Option<user::Id>>("approved_by")
                .expect("`approved_by` is set on approved rows"),
            comment: row.get("approval_comment"),
            at: row
                .get::<_, Option<listing::ApprovalDateTime>>("approved_at")
                .expect("`approved_at` is set on approved rows"),
        },
        listing::ReviewKind::Rejected => listing::Review::Rejected {
            reason: row
                .get::<_, Option<listing::RejectionReason>>("rejection_reason")
                .expect("`rejection_reason` is set on rejected rows"),
            at: row
                .get::<_, Option<listing::RejectionDateTime>>("rejected_at")
                .expect("`rejected_at` is set on rejected rows"),
        },
    };

    Listing {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        package_id: row.get("package_id"),
        payment: row.get("payment"),
        review,
        package: row
            .get::<_, Option<Json<listing::PackageSnapshot>>>(
                "package_snapshot",
            )
            .map(|Json(snapshot)| snapshot),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM listings \
             WHERE id = $1::UUID \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.as_ref().map(listing_from_row))
    }
}

impl<C> Database<Select<By<Vec<Listing>, read::listing::AwaitingReview>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(_): Select<By<Vec<Listing>, read::listing::AwaitingReview>>,
    ) -> Result<Self::Ok, Self::Err> {
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM listings \
             WHERE review = ANY($1::INT2[]) \
             ORDER BY created_at ASC",
        );
        let awaiting = [
            listing::ReviewKind::Pending,
            listing::ReviewKind::PendingPaymentApproval,
        ];
        Ok(self
            .query(&sql, &[&awaiting.as_slice()])
            .await
            .map_err(tracerr::wrap!())?
            .iter()
            .map(listing_from_row)
            .collect())
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            owner_id,
            title,
            description,
            location,
            package_id,
            payment,
            review,
            package,
            created_at,
        } = listing;

        let snapshot = package.map(Json);

        const SQL: &str = "\
            INSERT INTO listings (\
                id, owner_id, title, description, location, \
                package_id, payment, review, \
                package_snapshot, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, \
                $3::VARCHAR, $4::VARCHAR, $5::VARCHAR, \
                $6::UUID, $7::INT2, $8::INT2, \
                $9::JSONB, $10::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &owner_id,
                &title,
                &description,
                &location,
                &package_id,
                &payment,
                &review.kind(),
                &snapshot,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<listing::ModerationUpdate>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(update): Update<listing::ModerationUpdate>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::ModerationUpdate { listing_id, review } = update;

        // Moderation columns only: a concurrent purchase application must not
        // be overwritten.
        let (by, comment, approved_at, reason, rejected_at) = match &review {
            listing::Review::Approved { by, comment, at } => {
                (Some(*by), comment.clone(), Some(*at), None, None)
            }
            listing::Review::Rejected { reason, at } => {
                (None, None, None, Some(reason.clone()), Some(*at))
            }
            listing::Review::Pending
            | listing::Review::PendingPaymentApproval => {
                (None, None, None, None, None)
            }
        };

        const SQL: &str = "\
            UPDATE listings \
            SET review = $2::INT2, \
                approved_by = $3::UUID, \
                approval_comment = $4::VARCHAR, \
                approved_at = $5::TIMESTAMPTZ, \
                rejection_reason = $6::VARCHAR, \
                rejected_at = $7::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &listing_id,
                &review.kind(),
                &by,
                &comment,
                &approved_at,
                &reason,
                &rejected_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<listing::PurchaseUpdate>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(update): Update<listing::PurchaseUpdate>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::PurchaseUpdate {
            listing_id,
            payment,
            review,
            package_id,
            snapshot,
        } = update;

        // Payment columns plus the review tag: moderation outcome columns are
        // left untouched, since a purchase never overrides a terminal review.
        const SQL: &str = "\
            UPDATE listings \
            SET payment = $2::INT2, \
                review = $3::INT2, \
                package_id = $4::UUID, \
                package_snapshot = $5::JSONB \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &listing_id,
                &payment,
                &review.kind(),
                &package_id,
                &Json(snapshot),
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Listing, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO listings_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
