//! [`Query`] collection related to a single [`Coupon`].

use common::{
    operations::{By, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use rust_decimal::Decimal;
use tracerr::Traced;

use crate::{
    domain::{coupon, package, user, Coupon},
    infra::{database, Database},
    read, Service,
};

use super::Query;

/// [`Query`] previewing a [`Coupon`] redemption.
///
/// Entirely side-effect free: runs the same eligibility rule set as the
/// redemption commit, but against the caller-claimed amount and package, and
/// records nothing. The returned amounts are display-only; the commit
/// re-validates everything against the settled transaction.
#[derive(Clone, Debug)]
pub struct PreviewCoupon {
    /// [`coupon::Code`] of the previewed [`Coupon`].
    pub code: coupon::Code,

    /// ID of the user intending to redeem.
    pub user_id: user::Id,

    /// ID of the [`Package`] intended for purchase, if chosen already.
    ///
    /// [`Package`]: crate::domain::Package
    pub package_id: Option<package::Id>,

    /// Intended purchase amount.
    pub purchase_amount: Decimal,
}

/// Successful outcome of a [`PreviewCoupon`] [`Query`].
#[derive(Clone, Copy, Debug)]
pub struct Preview {
    /// ID of the previewed [`Coupon`].
    pub coupon_id: coupon::Id,

    /// Discount the [`Coupon`] would grant.
    pub discount_amount: Decimal,

    /// Amount remaining after the discount.
    pub final_amount: Decimal,
}

impl<Db, Gw> Query<PreviewCoupon> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Coupon>, coupon::Code>>,
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
        >,
{
    type Ok = Preview;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        query: PreviewCoupon,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let PreviewCoupon {
            code,
            user_id,
            package_id,
            purchase_amount,
        } = query;

        let coupon = self
            .database()
            .execute(Select(By::<Option<Coupon>, _>::new(code.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::CouponNotExists(code))
            .map_err(tracerr::wrap!())?;

        let read::coupon::Used(used_before) = self
            .database()
            .execute(Select(By::<read::coupon::Used, _>::new((
                coupon.id, user_id,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let read::transaction::SettledCount(prior) = self
            .database()
            .execute(Select(By::<read::transaction::SettledCount, _>::new(
                read::transaction::SettledCountOf {
                    user_id,
                    excluding: None,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        coupon
            .check(&coupon::Redemption {
                now: DateTime::now(),
                amount: purchase_amount,
                package_id,
                used_before,
                prior_settled_purchases: prior,
            })
            .map_err(tracerr::from_and_wrap!(=> E))?;

        let discount_amount = coupon.discount_for(purchase_amount);
        Ok(Preview {
            coupon_id: coupon.id,
            discount_amount,
            final_amount: purchase_amount - discount_amount,
        })
    }
}

/// Error of [`PreviewCoupon`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Coupon`] with the provided [`coupon::Code`] does not exist.
    #[display("`Coupon(code: {_0})` does not exist")]
    CouponNotExists(#[error(not(source))] coupon::Code),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// A [`Coupon`] eligibility rule is violated.
    #[display("`Coupon` is not applicable: {_0}")]
    #[from]
    Rule(coupon::RuleViolation),
}
