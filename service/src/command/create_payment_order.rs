//! [`Command`] for creating a payment order for a [`Package`] purchase.

use common::{
    operations::{By, Insert, Select},
    DateTime, Money,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, package, transaction, user, Listing, Package, Transaction,
    },
    infra::{
        database,
        gateway::{self, OpenOrder, RemoteOrder},
        Database, Gateway,
    },
    Service,
};

use super::Command;

/// [`Command`] for creating a payment order for a [`Package`] purchase.
///
/// The charged amount is always the current server-side [`Package`] price;
/// any client-provided amount is ignored. The pending [`Transaction`] is
/// persisted before returning, so a crash after the remote order was opened
/// still leaves a traceable record.
#[derive(Clone, Copy, Debug)]
pub struct CreatePaymentOrder {
    /// ID of the purchasing user.
    pub user_id: user::Id,

    /// ID of the purchased [`Package`].
    pub package_id: package::Id,

    /// ID of the [`Listing`] the purchase promotes, if any.
    pub listing_id: Option<listing::Id>,
}

impl<Db, Gw> Command<CreatePaymentOrder> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Package>, package::Id>>,
            Ok = Option<Package>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<Insert<Transaction>, Err = Traced<database::Error>>,
    Gw: Gateway<OpenOrder, Ok = RemoteOrder, Err = Traced<gateway::Error>>,
{
    type Ok = Transaction;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePaymentOrder,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePaymentOrder {
            user_id,
            package_id,
            listing_id,
        } = cmd;

        let package = self
            .database()
            .execute(Select(By::<Option<Package>, _>::new(package_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|p| p.is_active)
            .ok_or(E::PackageNotExists(package_id))
            .map_err(tracerr::wrap!())?;

        if let Some(listing_id) = listing_id {
            let listing = self
                .database()
                .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::ListingNotExists(listing_id))
                .map_err(tracerr::wrap!())?;
            if listing.owner_id != user_id {
                return Err(tracerr::new!(E::ListingNotOwned(listing_id)));
            }
        }

        if !package.price.is_chargeable() {
            return Err(tracerr::new!(E::PriceNotChargeable(package.price)));
        }
        let amount = package
            .price
            .minor_units()
            .ok_or(E::PriceNotChargeable(package.price))
            .map_err(tracerr::wrap!())?;

        let transaction_id = transaction::Id::new();
        let RemoteOrder { order_id } = self
            .gateway()
            .execute(OpenOrder {
                amount,
                currency: package.price.currency,
                receipt: transaction_id,
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let transaction = Transaction {
            id: transaction_id,
            order_id,
            user_id,
            package_id,
            listing_id,
            amount: package.price,
            status: transaction::Status::Pending,
            payment_id: None,
            created_at: DateTime::now().coerce(),
            settled_at: None,
        };

        self.database()
            .execute(Insert(transaction.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(transaction)
    }
}

/// Error of [`CreatePaymentOrder`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Payment gateway error.
    #[display("payment gateway operation failed: {_0}")]
    #[from]
    Gateway(gateway::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Listing`] is not owned by the purchasing user.
    #[display("`Listing(id: {_0})` is not owned by the purchasing user")]
    ListingNotOwned(#[error(not(source))] listing::Id),

    /// [`Package`] with the provided ID does not exist or is inactive.
    #[display("`Package(id: {_0})` does not exist")]
    PackageNotExists(#[error(not(source))] package::Id),

    /// [`Package`] price cannot be charged.
    #[display("`Package` price `{_0}` cannot be charged")]
    PriceNotChargeable(#[error(not(source))] Money),
}
