//! [`Command`] for submitting a new [`Listing`].

use common::{
    operations::{By, Insert, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, package, user, Listing, Package},
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for submitting a new [`Listing`].
///
/// The submitted [`Listing`] always starts hidden: with a selected
/// [`Package`] it awaits payment and moderation, without one it awaits
/// moderation only.
#[derive(Clone, Debug)]
pub struct SubmitListing {
    /// ID of the user submitting the [`Listing`].
    pub owner_id: user::Id,

    /// [`listing::Title`] of the new [`Listing`].
    pub title: listing::Title,

    /// [`listing::Description`] of the new [`Listing`].
    pub description: listing::Description,

    /// [`listing::Location`] of the advertised property.
    pub location: listing::Location,

    /// ID of the visibility [`Package`] to purchase, if any.
    pub package_id: Option<package::Id>,
}

impl<Db, Gw> Command<SubmitListing> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Package>, package::Id>>,
            Ok = Option<Package>,
            Err = Traced<database::Error>,
        > + Database<Insert<Listing>, Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitListing {
            owner_id,
            title,
            description,
            location,
            package_id,
        } = cmd;

        if let Some(package_id) = package_id {
            self.database()
                .execute(Select(By::<Option<Package>, _>::new(package_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .filter(|p| p.is_active)
                .ok_or(E::PackageNotExists(package_id))
                .map_err(tracerr::wrap!())
                .map(drop)?;
        }

        let review = if package_id.is_some() {
            listing::Review::PendingPaymentApproval
        } else {
            listing::Review::Pending
        };
        let listing = Listing {
            id: listing::Id::new(),
            owner_id,
            title,
            description,
            location,
            package_id,
            payment: listing::Payment::Unpaid,
            review,
            package: None,
            created_at: DateTime::now().coerce(),
        };

        self.database()
            .execute(Insert(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(listing)
    }
}

/// Error of [`SubmitListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Package`] with the provided ID does not exist or is inactive.
    #[display("`Package(id: {_0})` does not exist")]
    PackageNotExists(#[error(not(source))] package::Id),
}
