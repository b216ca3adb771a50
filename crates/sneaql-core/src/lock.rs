//! Transform lock backed by a database table.
//!
//! Every acquire and release opens its own connection, so lock commits never
//! touch the main transform session.

use std::sync::Arc;

use crate::database::{Connector, Database, DatabaseConfig};
use crate::dialect::Dialect;
use crate::error::SneaqlResult;
use crate::value::Value;

pub struct TransformLockManager {
    connector: Arc<dyn Connector>,
    config: DatabaseConfig,
    dialect: Dialect,
    table: String,
}

impl TransformLockManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        config: DatabaseConfig,
        dialect: Dialect,
        table: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            config,
            dialect,
            table: table.into(),
        }
    }

    /// Take the lock for `transform_name` unless another holder has it.
    ///
    /// Re-acquiring a lock already held by `holder` succeeds.
    pub fn acquire(&self, transform_name: &str, holder: i64) -> SneaqlResult<bool> {
        let mut db = self.connector.connect(&self.config)?;
        let result = self.try_acquire(db.as_ref(), transform_name, holder);
        close(db.as_mut());

        let acquired = result?;
        if acquired {
            tracing::info!(transform = %transform_name, holder, "Transform lock acquired");
        } else {
            tracing::info!(transform = %transform_name, holder, "Transform is locked by another process");
        }
        Ok(acquired)
    }

    fn try_acquire(&self, db: &dyn Database, transform_name: &str, holder: i64) -> SneaqlResult<bool> {
        self.begin(db)?;

        let held_by_others = db.query_single_value(&format!(
            "select count(*) from {} where transform_name='{}' and transform_lock_id!={};",
            self.table,
            escape(transform_name),
            holder
        ))?;

        if held_by_others.as_i64() == Some(0) {
            db.execute(&format!(
                "insert into {} (transform_lock_id, transform_name, transform_lock_time) \
                 values ({}, '{}', current_timestamp);",
                self.table,
                holder,
                escape(transform_name)
            ))?;
            if self.dialect.supports_transactions {
                db.execute(&self.dialect.commit_statement)?;
            }
            Ok(true)
        } else {
            if self.dialect.supports_transactions {
                db.execute(&self.dialect.rollback_statement)?;
            }
            Ok(false)
        }
    }

    /// Remove the lock row for this holder. Releasing a lock that is not held
    /// is not an error.
    pub fn release(&self, transform_name: &str, holder: i64) -> bool {
        let result = self.connector.connect(&self.config).and_then(|mut db| {
            let deleted = self.try_release(db.as_ref(), transform_name, holder);
            close(db.as_mut());
            deleted
        });

        match result {
            Ok(rows) => {
                tracing::info!(transform = %transform_name, holder, rows, "Transform lock released");
            }
            Err(e) => {
                tracing::error!(transform = %transform_name, holder, error = %e, "Failed to release transform lock");
            }
        }
        true
    }

    fn try_release(&self, db: &dyn Database, transform_name: &str, holder: i64) -> SneaqlResult<u64> {
        self.begin(db)?;
        let rows = db.execute(&format!(
            "delete from {} where transform_name='{}' and transform_lock_id={};",
            self.table,
            escape(transform_name),
            holder
        ))?;
        if self.dialect.supports_transactions {
            db.execute(&self.dialect.commit_statement)?;
        }
        Ok(rows)
    }

    fn begin(&self, db: &dyn Database) -> SneaqlResult<()> {
        if self.dialect.supports_transactions {
            db.execute(&self.dialect.begin_statement)?;
        }
        if self.dialect.supports_table_locking {
            db.execute(&self.dialect.lock_table_statement(&self.table))?;
        }
        Ok(())
    }

    /// Holder ids currently recorded for a transform.
    pub fn holders(&self, transform_name: &str) -> SneaqlResult<Vec<i64>> {
        let mut db = self.connector.connect(&self.config)?;
        let rows = db.query_rows(&format!(
            "select transform_lock_id from {} where transform_name='{}' order by transform_lock_id;",
            self.table,
            escape(transform_name)
        ));
        close(db.as_mut());
        Ok(rows?
            .iter()
            .filter_map(|r| r.get("transform_lock_id").and_then(Value::as_i64))
            .collect())
    }
}

fn escape(text: &str) -> String {
    text.replace('\'', "''")
}

fn close(db: &mut dyn Database) {
    if let Err(e) = db.close() {
        tracing::warn!(error = %e, "Failed to close lock connection");
    }
}
