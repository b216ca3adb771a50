//! Database endpoints.
//!
//! A [`Connector`] opens [`Database`] sessions. Connectors are registered by
//! URL scheme: `duckdb:<path>` / `duckdb:memory`, and `postgres://` /
//! `postgresql://`.

mod duckdb;
mod postgres;

pub use self::duckdb::{DuckdbConnector, DuckdbDatabase};
pub use self::postgres::{PostgresConnector, PostgresDatabase};

use std::sync::Arc;

use crate::error::{SneaqlError, SneaqlResult};
use crate::registry::{Capability, Registry};
use crate::value::{Record, Value};

/// Connection parameters.
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    /// URL scheme used to look up the connector. A leading `jdbc:` is skipped.
    pub fn scheme(&self) -> SneaqlResult<String> {
        let url = self.url.trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        match url.split_once(':') {
            Some((scheme, _)) if !scheme.is_empty() => Ok(scheme.to_lowercase()),
            _ => Err(SneaqlError::Configuration(format!(
                "database url '{}' has no scheme",
                self.url
            ))),
        }
    }
}

/// An open database session.
///
/// Statements run one at a time in the order they are issued; each session
/// sees its own uncommitted work.
pub trait Database: Send {
    /// Run a statement and return the number of rows affected.
    fn execute(&self, sql: &str) -> SneaqlResult<u64>;

    /// First column of the first row, or `Null` when there are no rows.
    fn query_single_value(&self, sql: &str) -> SneaqlResult<Value>;

    /// All rows of a query.
    fn query_rows(&self, sql: &str) -> SneaqlResult<Vec<Record>>;

    fn close(&mut self) -> SneaqlResult<()>;
}

/// Opens database sessions.
pub trait Connector: Send + Sync {
    fn name(&self) -> &'static str;

    fn connect(&self, config: &DatabaseConfig) -> SneaqlResult<Box<dyn Database>>;
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register(
        "duckdb",
        Capability::connector(|| Arc::new(DuckdbConnector::new())),
    );
    registry.register(
        "postgres",
        Capability::connector(|| Arc::new(PostgresConnector::new())),
    );
    registry.register(
        "postgresql",
        Capability::connector(|| Arc::new(PostgresConnector::new())),
    );
}
