//! [`Command`] for verifying a payment and settling its [`Transaction`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use secrecy::ExposeSecret as _;
use tracerr::Traced;

use crate::{
    domain::{listing, package, transaction, Listing, Package, Transaction},
    infra::{database, gateway::signature, Database},
    Service,
};

use super::Command;

/// [`Command`] for verifying a payment proof and settling its
/// [`Transaction`].
///
/// The signature is checked before anything else: a mismatch mutates
/// nothing and reveals nothing, not even whether the order exists. Only a
/// valid proof reaches the idempotent short-circuit, so re-delivery of the
/// same proof for an already settled [`Transaction`] succeeds without
/// touching any state.
///
/// Settlement and purchase application run in separate database
/// transactions: once the `pending` to `paid` transition is committed, a
/// failure to promote the [`Listing`] is logged for manual reconciliation
/// instead of failing the verification, since the money has already moved.
#[derive(Clone, Debug)]
pub struct VerifyPayment {
    /// [`transaction::OrderId`] reported by the gateway.
    pub order_id: transaction::OrderId,

    /// [`transaction::PaymentId`] reported by the gateway.
    pub payment_id: transaction::PaymentId,

    /// Hex-encoded payment proof signature.
    pub signature: String,
}

impl<Db, Gw> Command<VerifyPayment> for Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Transaction>, transaction::OrderId>>,
            Ok = Option<Transaction>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Transaction, transaction::OrderId>>,
            Err = Traced<database::Error>,
        > + Database<
            Update<transaction::Settlement>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Transaction>, transaction::OrderId>>,
            Ok = Option<Transaction>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Package>, package::Id>>,
            Ok = Option<Package>,
            Err = Traced<database::Error>,
        > + Database<
            Update<listing::PurchaseUpdate>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Transaction;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: VerifyPayment,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let VerifyPayment {
            order_id,
            payment_id,
            signature,
        } = cmd;

        // The proof is the caller's authentication: nothing is looked up,
        // mutated or returned until it checks out.
        let secret = self.config().gateway.key_secret.expose_secret();
        if !signature::verify(
            secret.as_bytes(),
            &order_id,
            &payment_id,
            &signature,
        ) {
            tracing::warn!(order_id = %order_id, "payment signature mismatch");
            return Err(tracerr::new!(E::SignatureMismatch));
        }

        let transaction = self
            .database()
            .execute(Select(By::<Option<Transaction>, _>::new(
                order_id.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TransactionNotExists(order_id.clone()))
            .map_err(tracerr::wrap!())?;

        if transaction.is_settled() {
            return Ok(transaction);
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize concurrent verifications of the same order.
        tx.execute(Lock(By::new(order_id.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let settled = tx
            .execute(Update(transaction::Settlement {
                order_id: order_id.clone(),
                payment_id: payment_id.clone(),
                settled_at: DateTime::now().coerce(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let transaction = tx
            .execute(Select(By::<Option<Transaction>, _>::new(
                order_id.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or_else(|| E::TransactionNotExists(order_id.clone()))
            .map_err(tracerr::wrap!())?;

        if !settled && !transaction.is_settled() {
            // Not `pending` and not `paid`: the `Transaction` was failed out
            // of band, and a valid proof cannot resurrect it.
            return Err(tracerr::new!(E::TransactionNotPending(
                transaction.status
            )));
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if settled {
            if let Some(listing_id) = transaction.listing_id {
                if let Err(e) =
                    self.apply_purchase(&transaction, listing_id).await
                {
                    tracing::error!(
                        order_id = %transaction.order_id,
                        listing_id = %listing_id,
                        error = %e,
                        "settled payment could not be applied to the \
                         listing, manual reconciliation required",
                    );
                }
            }
        }

        Ok(transaction)
    }
}

impl<Db, Gw> Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Package>, package::Id>>,
            Ok = Option<Package>,
            Err = Traced<database::Error>,
        > + Database<
            Update<listing::PurchaseUpdate>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    /// Applies a settled [`Package`] purchase to its [`Listing`].
    ///
    /// Captures the [`listing::PackageSnapshot`] from the catalog as of now,
    /// so later catalog edits cannot change what was purchased.
    async fn apply_purchase(
        &self,
        transaction: &Transaction,
        listing_id: listing::Id,
    ) -> Result<(), Traced<ExecutionError>> {
        use ExecutionError as E;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize with concurrent moderation of the same `Listing`.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        let package = tx
            .execute(Select(By::<Option<Package>, _>::new(
                transaction.package_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PackageNotExists(transaction.package_id))
            .map_err(tracerr::wrap!())?;

        let snapshot = listing::PackageSnapshot::capture(
            &package,
            DateTime::now().coerce(),
        );
        listing.apply_purchase(snapshot.clone());

        tx.execute(Update(listing::PurchaseUpdate {
            listing_id,
            payment: listing.payment,
            review: listing.review.clone(),
            package_id: package.id,
            snapshot,
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(())
    }
}

/// Error of [`VerifyPayment`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the settled [`Transaction`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Package`] of the settled [`Transaction`] does not exist.
    #[display("`Package(id: {_0})` does not exist")]
    PackageNotExists(#[error(not(source))] package::Id),

    /// Payment proof signature does not match.
    #[display("payment proof signature mismatch")]
    SignatureMismatch,

    /// [`Transaction`] with the provided order ID does not exist.
    #[display("`Transaction(order_id: {_0})` does not exist")]
    TransactionNotExists(#[error(not(source))] transaction::OrderId),

    /// [`Transaction`] is in a state a payment proof cannot settle.
    #[display("`Transaction` is `{_0}`, not `pending`")]
    TransactionNotPending(#[error(not(source))] transaction::Status),
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use common::{
        money::Currency,
        operations::{By, Commit, Lock, Select, Transact, Update},
        DateTime, Money,
    };
    use futures::executor::block_on;
    use rust_decimal::Decimal;
    use secrecy::SecretString;
    use tracerr::Traced;

    use crate::{
        domain::{
            listing, package, transaction, user, Listing, Package,
            Transaction,
        },
        infra::{database, gateway, gateway::signature, Database},
        Command as _, Config, Service,
    };

    use super::{ExecutionError, VerifyPayment};

    const SECRET: &str = "test-gateway-secret";

    fn order() -> transaction::OrderId {
        transaction::OrderId::new("order_N5lT9MPGbCfnmB").unwrap()
    }

    fn payment() -> transaction::PaymentId {
        transaction::PaymentId::new("pay_29QQoUBi66xm2f").unwrap()
    }

    /// [`Database`] stub holding a single settled [`Transaction`] and
    /// refusing to open any database transaction.
    #[derive(Clone, Debug)]
    struct Settled(Transaction);

    impl Database<Select<By<Option<Transaction>, transaction::OrderId>>>
        for Settled
    {
        type Ok = Option<Transaction>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Select<By<Option<Transaction>, transaction::OrderId>>,
        ) -> Result<Self::Ok, Self::Err> {
            Ok(Some(self.0.clone()))
        }
    }

    impl Database<Transact> for Settled {
        type Ok = Untouched;
        type Err = Traced<database::Error>;

        async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
            unreachable!("a settled order opens no database transaction")
        }
    }

    /// Transacted side of [`Settled`], never reachable in these scenarios.
    #[derive(Clone, Copy, Debug)]
    struct Untouched;

    impl Database<Lock<By<Transaction, transaction::OrderId>>> for Untouched {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Lock<By<Transaction, transaction::OrderId>>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Update<transaction::Settlement>> for Untouched {
        type Ok = bool;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Update<transaction::Settlement>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Select<By<Option<Transaction>, transaction::OrderId>>>
        for Untouched
    {
        type Ok = Option<Transaction>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Select<By<Option<Transaction>, transaction::OrderId>>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Commit> for Untouched {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Lock<By<Listing, listing::Id>>> for Untouched {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Lock<By<Listing, listing::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Select<By<Option<Listing>, listing::Id>>> for Untouched {
        type Ok = Option<Listing>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Select<By<Option<Listing>, listing::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Select<By<Option<Package>, package::Id>>> for Untouched {
        type Ok = Option<Package>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Select<By<Option<Package>, package::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    impl Database<Update<listing::PurchaseUpdate>> for Untouched {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Update<listing::PurchaseUpdate>,
        ) -> Result<Self::Ok, Self::Err> {
            unreachable!()
        }
    }

    fn settled_transaction() -> Transaction {
        Transaction {
            id: transaction::Id::new(),
            order_id: order(),
            user_id: user::Id::new(),
            package_id: package::Id::new(),
            listing_id: None,
            amount: Money {
                amount: Decimal::from(499),
                currency: Currency::Inr,
            },
            status: transaction::Status::Paid,
            payment_id: Some(payment()),
            created_at: DateTime::now().coerce(),
            settled_at: Some(DateTime::now().coerce()),
        }
    }

    fn service() -> Service<Settled, ()> {
        Service::new(
            Config {
                gateway: gateway::Config {
                    endpoint: "https://gateway.test".to_owned(),
                    key_id: "key".to_owned(),
                    key_secret: SecretString::from(SECRET.to_owned()),
                    timeout: Duration::from_secs(1),
                },
            },
            Settled(settled_transaction()),
            (),
        )
    }

    #[test]
    fn refuses_forged_signature_for_settled_order() {
        let err = block_on(service().execute(VerifyPayment {
            order_id: order(),
            payment_id: payment(),
            signature: "deadbeef".to_owned(),
        }))
        .unwrap_err();

        assert!(matches!(err.as_ref(), ExecutionError::SignatureMismatch));
    }

    #[test]
    fn redelivered_valid_proof_settles_idempotently() {
        let signature =
            signature::sign(SECRET.as_bytes(), &order(), &payment());

        let transaction = block_on(service().execute(VerifyPayment {
            order_id: order(),
            payment_id: payment(),
            signature,
        }))
        .unwrap();

        assert!(transaction.is_settled());
    }
}
