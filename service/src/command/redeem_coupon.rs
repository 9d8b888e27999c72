//! [`Command`] for committing a [`Coupon`] redemption.

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{coupon, transaction, user, Coupon, Transaction},
    infra::{database, Database},
    read,
    Service,
};

use super::Command;

/// [`Command`] for committing a [`Coupon`] redemption against a settled
/// [`Transaction`].
///
/// Re-validates the full eligibility rule set against the settled
/// [`Transaction`]'s amount and package, never against any earlier preview:
/// the state of the world may have changed in between.
#[derive(Clone, Copy, Debug)]
pub struct RedeemCoupon {
    /// ID of the redeemed [`Coupon`].
    pub coupon_id: coupon::Id,

    /// ID of the redeeming user.
    pub user_id: user::Id,

    /// ID of the settled [`Transaction`] the discount is granted on.
    pub transaction_id: transaction::Id,
}

impl<Db, Gw> Command<RedeemCoupon> for Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Transaction>, transaction::Id>>,
            Ok = Option<Transaction>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Coupon, coupon::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Coupon>, coupon::Id>>,
            Ok = Option<Coupon>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::coupon::Used, (coupon::Id, user::Id)>>,
            Ok = read::coupon::Used,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<
                    read::transaction::SettledCount,
                    read::transaction::SettledCountOf,
                >,
            >,
            Ok = read::transaction::SettledCount,
            Err = Traced<database::Error>,
        > + Database<
            Insert<coupon::Usage>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<
            Update<coupon::UsageIncrement>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Decimal;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: RedeemCoupon) -> Result<Self::Ok, Self::Err> {
        use coupon::RuleViolation;
        use ExecutionError as E;

        let RedeemCoupon {
            coupon_id,
            user_id,
            transaction_id,
        } = cmd;

        let transaction = self
            .database()
            .execute(Select(By::<Option<Transaction>, _>::new(transaction_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::TransactionNotExists(transaction_id))
            .map_err(tracerr::wrap!())?;
        if transaction.user_id != user_id {
            return Err(tracerr::new!(E::TransactionNotOwned(transaction_id)));
        }
        if !transaction.is_settled() {
            return Err(tracerr::new!(E::TransactionNotSettled(
                transaction_id
            )));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize concurrent redemptions of the same `Coupon`.
        tx.execute(Lock(By::new(coupon_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let coupon = tx
            .execute(Select(By::<Option<Coupon>, _>::new(coupon_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::CouponNotExists(coupon_id))
            .map_err(tracerr::wrap!())?;

        let read::coupon::Used(used_before) = tx
            .execute(Select(By::<read::coupon::Used, _>::new((
                coupon_id, user_id,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let read::transaction::SettledCount(prior) = tx
            .execute(Select(By::<read::transaction::SettledCount, _>::new(
                read::transaction::SettledCountOf {
                    user_id,
                    excluding: Some(transaction_id),
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        coupon
            .check(&coupon::Redemption {
                now: DateTime::now(),
                amount: transaction.amount.amount,
                package_id: Some(transaction.package_id),
                used_before,
                prior_settled_purchases: prior,
            })
            .map_err(|v| match v {
                RuleViolation::AlreadyUsed => E::AlreadyUsed(coupon_id),
                RuleViolation::LimitExceeded => E::LimitExceeded(coupon_id),
                RuleViolation::Inactive
                | RuleViolation::NotStarted
                | RuleViolation::Expired
                | RuleViolation::NotFirstPurchase
                | RuleViolation::MinPurchaseNotMet { .. }
                | RuleViolation::PackageNotEligible => E::Rule(v),
            })
            .map_err(tracerr::wrap!())?;

        let discount = coupon.discount_for(transaction.amount.amount);

        let inserted = tx
            .execute(Insert(coupon::Usage {
                coupon_id,
                user_id,
                transaction_id,
                discount_amount: discount,
                used_at: DateTime::now().coerce(),
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !inserted {
            // The unique `(coupon, user)` constraint refused the row: a
            // concurrent redemption won the race.
            return Err(tracerr::new!(E::AlreadyUsed(coupon_id)));
        }

        let incremented = tx
            .execute(Update(coupon::UsageIncrement { coupon_id }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !incremented {
            return Err(tracerr::new!(E::LimitExceeded(coupon_id)));
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(discount)
    }
}

/// Error of [`RedeemCoupon`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Coupon`] was already used by the redeeming user.
    #[display("`Coupon(id: {_0})` was already used by this user")]
    AlreadyUsed(#[error(not(source))] coupon::Id),

    /// [`Coupon`] with the provided ID does not exist.
    #[display("`Coupon(id: {_0})` does not exist")]
    CouponNotExists(#[error(not(source))] coupon::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Coupon`] usage limit is reached.
    #[display("`Coupon(id: {_0})` usage limit is reached")]
    LimitExceeded(#[error(not(source))] coupon::Id),

    /// Another [`Coupon`] eligibility rule is violated.
    #[display("`Coupon` is not applicable: {_0}")]
    Rule(coupon::RuleViolation),

    /// [`Transaction`] with the provided ID does not exist.
    #[display("`Transaction(id: {_0})` does not exist")]
    TransactionNotExists(#[error(not(source))] transaction::Id),

    /// [`Transaction`] is not owned by the redeeming user.
    #[display("`Transaction(id: {_0})` is not owned by the redeeming user")]
    TransactionNotOwned(#[error(not(source))] transaction::Id),

    /// [`Transaction`] has not settled.
    #[display("`Transaction(id: {_0})` has not settled")]
    TransactionNotSettled(#[error(not(source))] transaction::Id),
}
