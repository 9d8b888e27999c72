//! Infrastructure layer.

pub mod database;
pub mod gateway;

#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
pub use self::{database::Database, gateway::Gateway};
