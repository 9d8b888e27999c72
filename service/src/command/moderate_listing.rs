//! [`Command`] for moderating a submitted [`Listing`].

use common::operations::{By, Commit, Lock, Select, Transact, Transacted, Update};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, user, Listing},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for moderating a submitted [`Listing`].
///
/// Approval of a [`Listing`] with an unsettled [`Package`] payment is
/// refused: money alone never makes a [`Listing`] visible, and neither does
/// approval alone while a purchase is pending.
///
/// [`Package`]: crate::domain::Package
#[derive(Clone, Debug)]
pub struct ModerateListing {
    /// ID of the moderated [`Listing`].
    pub listing_id: listing::Id,

    /// ID of the moderator.
    pub moderator_id: user::Id,

    /// Moderation [`Decision`] upon the [`Listing`].
    pub decision: Decision,
}

/// Moderation decision upon a [`Listing`].
#[derive(Clone, Debug)]
pub enum Decision {
    /// Approve the [`Listing`].
    Approve {
        /// Optional moderator comment.
        comment: Option<listing::ModerationComment>,
    },

    /// Reject the [`Listing`], keeping it hidden.
    Reject {
        /// Reason of the rejection, shown to the owner.
        reason: listing::RejectionReason,
    },
}

impl<Db, Gw> Command<ModerateListing> for Service<Db, Gw>
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
            Update<listing::ModerationUpdate>,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ModerateListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ModerateListing {
            listing_id,
            moderator_id,
            decision,
        } = cmd;

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serialize with concurrent payment application upon the same
        // `Listing`.
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

        match decision {
            Decision::Approve { comment } => {
                listing.approve(moderator_id, comment)
            }
            Decision::Reject { reason } => listing.reject(reason),
        }
        .map_err(tracerr::from_and_wrap!(=> E))?;

        tx.execute(Update(listing::ModerationUpdate {
            listing_id,
            review: listing.review.clone(),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(listing)
    }
}

/// Error of [`ModerateListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Moderation is not applicable to the [`Listing`]'s current state.
    #[display("moderation refused: {_0}")]
    #[from]
    Moderation(listing::ModerationError),
}
