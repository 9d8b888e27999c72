//! Payment [`Gateway`]-related implementations.

pub mod http;
pub mod signature;

use std::time::Duration;

use common::money::Currency;
use derive_more::{Debug, Display, Error as StdError, From};
use secrecy::SecretString;

use crate::domain::transaction;

pub use self::http::Http;

/// Payment gateway operation.
pub use common::Handler as Gateway;

/// Operation to open a remote payment order on the [`Gateway`].
#[derive(Clone, Debug)]
pub struct OpenOrder {
    /// Amount of the order, in minor units of the `currency`.
    pub amount: i64,

    /// [`Currency`] of the order.
    pub currency: Currency,

    /// Internal [`transaction::Id`] passed to the gateway as the order
    /// receipt, for reconciliation.
    pub receipt: transaction::Id,
}

/// Remote payment order opened on the [`Gateway`].
#[derive(Clone, Debug)]
pub struct RemoteOrder {
    /// [`transaction::OrderId`] the gateway assigned to the order.
    pub order_id: transaction::OrderId,
}

/// Payment [`Gateway`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the gateway API.
    pub endpoint: String,

    /// API key identifying the merchant account.
    pub key_id: String,

    /// Shared secret used for API authentication and payment proof
    /// signatures.
    #[debug(skip)]
    pub key_secret: SecretString,

    /// Timeout of a single gateway HTTP call.
    pub timeout: Duration,
}

/// Payment [`Gateway`] error.
#[derive(Debug, Display, StdError, From)]
pub enum Error {
    /// Transport-level failure talking to the gateway.
    #[display("gateway transport error: {_0}")]
    #[from]
    Http(reqwest::Error),

    /// Gateway responded with a non-success status.
    #[display("gateway API error (status {status}): {body}")]
    Api {
        /// HTTP status code of the response.
        status: u16,

        /// Raw response body.
        #[error(not(source))]
        body: String,
    },

    /// Gateway response could not be decoded.
    #[display("invalid gateway response: {_0}")]
    InvalidResponse(#[error(not(source))] String),
}
