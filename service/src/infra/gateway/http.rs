//! [`Http`] payment gateway client.

use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use tracerr::Traced;

use crate::domain::transaction;

use super::{Config, Error, Gateway, OpenOrder, RemoteOrder};

/// HTTP client to the payment gateway's orders API.
#[derive(Clone, Debug)]
pub struct Http {
    /// Underlying HTTP client.
    client: reqwest::Client,

    /// Base URL of the gateway API.
    endpoint: String,

    /// API key identifying the merchant account.
    key_id: String,

    /// Shared secret used for API authentication.
    key_secret: SecretString,
}

impl Http {
    /// Creates a new [`Http`] gateway client with the provided [`Config`].
    ///
    /// # Errors
    ///
    /// If the underlying HTTP client fails to initialize.
    pub fn new(conf: &Config) -> Result<Self, Traced<Error>> {
        let client = reqwest::Client::builder()
            .timeout(conf.timeout)
            .build()
            .map_err(tracerr::from_and_wrap!(=> Error))?;
        Ok(Self {
            client,
            endpoint: conf.endpoint.trim_end_matches('/').to_owned(),
            key_id: conf.key_id.clone(),
            key_secret: conf.key_secret.clone(),
        })
    }
}

/// Request body of the gateway's order creation endpoint.
#[derive(Debug, Serialize)]
struct OrderRequest {
    /// Amount in minor currency units.
    amount: i64,

    /// Three-letter currency code.
    currency: String,

    /// Merchant-side receipt identifier.
    receipt: String,
}

/// Response body of the gateway's order creation endpoint.
#[derive(Debug, Deserialize)]
struct OrderResponse {
    /// Gateway-assigned order ID.
    id: String,
}

impl Gateway<OpenOrder> for Http {
    type Ok = RemoteOrder;
    type Err = Traced<Error>;

    async fn execute(&self, op: OpenOrder) -> Result<Self::Ok, Self::Err> {
        let OpenOrder {
            amount,
            currency,
            receipt,
        } = op;

        let resp = self
            .client
            .post(format!("{}/v1/orders", self.endpoint))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&OrderRequest {
                amount,
                currency: currency.to_string(),
                receipt: receipt.to_string(),
            })
            .send()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(tracerr::from_and_wrap!(=> Error))?;

        if !status.is_success() {
            return Err(tracerr::new!(Error::Api {
                status: status.as_u16(),
                body,
            }));
        }

        let order: OrderResponse =
            serde_json::from_str(&body).map_err(|e| {
                tracerr::new!(Error::InvalidResponse(e.to_string()))
            })?;
        let order_id = transaction::OrderId::new(order.id).ok_or_else(|| {
            tracerr::new!(Error::InvalidResponse(
                "malformed order id".to_owned(),
            ))
        })?;

        Ok(RemoteOrder { order_id })
    }
}
