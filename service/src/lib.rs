//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;

pub use self::{command::Command, query::Query};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Payment gateway configuration.
    pub gateway: infra::gateway::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Gw> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    ///
    /// [`Database`]: infra::Database
    database: Db,

    /// Payment [`Gateway`] of this [`Service`].
    ///
    /// [`Gateway`]: infra::Gateway
    gateway: Gw,
}

impl<Db, Gw> Service<Db, Gw> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(config: Config, database: Db, gateway: Gw) -> Self {
        Self {
            config,
            database,
            gateway,
        }
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    ///
    /// [`Database`]: infra::Database
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns payment [`Gateway`] of this [`Service`].
    ///
    /// [`Gateway`]: infra::Gateway
    #[must_use]
    pub fn gateway(&self) -> &Gw {
        &self.gateway
    }
}
