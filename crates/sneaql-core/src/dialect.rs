//! Per-database feature flags and statement templates.

use crate::registry::{Capability, Registry};

/// Database dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub name: String,
    pub has_boolean: bool,
    /// Issued on the main connection right after it is opened.
    pub autocommit_off_statement: Option<String>,
    pub supports_transactions: bool,
    pub supports_table_locking: bool,
    pub begin_statement: String,
    pub commit_statement: String,
    pub rollback_statement: String,
}

impl Dialect {
    /// A dialect with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_boolean: false,
            autocommit_off_statement: None,
            supports_transactions: true,
            supports_table_locking: false,
            begin_statement: "begin;".to_string(),
            commit_statement: "commit;".to_string(),
            rollback_statement: "rollback;".to_string(),
        }
    }

    pub fn with_boolean(mut self, has_boolean: bool) -> Self {
        self.has_boolean = has_boolean;
        self
    }

    pub fn with_autocommit_off(mut self, statement: impl Into<String>) -> Self {
        self.autocommit_off_statement = Some(statement.into());
        self
    }

    pub fn with_transactions(mut self, supported: bool) -> Self {
        self.supports_transactions = supported;
        self
    }

    pub fn with_table_locking(mut self, supported: bool) -> Self {
        self.supports_table_locking = supported;
        self
    }

    pub fn lock_table_statement(&self, table: &str) -> String {
        format!("lock table {};", table)
    }

    /// SQL literal for a boolean.
    pub fn boolean_literal(&self, value: bool) -> &'static str {
        match (self.has_boolean, value) {
            (true, true) => "true",
            (true, false) => "false",
            (false, true) => "1",
            (false, false) => "0",
        }
    }

    /// Column type used for boolean flags.
    pub fn boolean_type(&self) -> &'static str {
        if self.has_boolean {
            "boolean"
        } else {
            "smallint"
        }
    }
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register("sqlite", Capability::dialect(|| Dialect::new("sqlite")));
    registry.register("duckdb", Capability::dialect(|| Dialect::new("duckdb").with_boolean(true)));
    registry.register(
        "postgres",
        Capability::dialect(|| {
            Dialect::new("postgres")
                .with_boolean(true)
                .with_table_locking(true)
        }),
    );
    registry.register(
        "redshift",
        Capability::dialect(|| {
            Dialect::new("redshift")
                .with_boolean(true)
                .with_autocommit_off("set autocommit=off;")
        }),
    );
    registry.register(
        "vertica",
        Capability::dialect(|| {
            Dialect::new("vertica")
                .with_boolean(true)
                .with_autocommit_off("set session autocommit to off;")
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let d = Dialect::new("sqlite");
        assert!(!d.has_boolean);
        assert!(d.supports_transactions);
        assert!(!d.supports_table_locking);
        assert_eq!(d.begin_statement, "begin;");
        assert_eq!(d.lock_table_statement("transform_lock"), "lock table transform_lock;");
        assert_eq!(d.boolean_literal(true), "1");
    }

    #[test]
    fn test_builtin_dialects() {
        let registry = Registry::with_builtins();
        let redshift = registry.dialect("redshift").unwrap();
        assert!(redshift.has_boolean);
        assert_eq!(
            redshift.autocommit_off_statement.as_deref(),
            Some("set autocommit=off;")
        );
        assert!(registry.dialect("postgres").unwrap().supports_table_locking);
        assert_eq!(registry.dialect("duckdb").unwrap().boolean_literal(false), "false");
    }
}
