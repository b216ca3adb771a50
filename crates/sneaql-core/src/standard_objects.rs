//! Bookkeeping tables used by a standard deployment.

use crate::database::Database;
use crate::dialect::Dialect;
use crate::error::SneaqlResult;

/// Row for the transforms table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformRecord {
    pub transform_name: String,
    pub repository_type: String,
    pub sql_repository: String,
    pub sql_repository_branch: String,
    pub is_active: bool,
    pub notify_on_success: bool,
    pub notify_on_non_precondition_failure: bool,
    pub notify_on_precondition_failure: bool,
}

/// Creates and recreates the transforms, steps, lock and log tables.
pub struct StandardObjects<'a> {
    db: &'a dyn Database,
    dialect: &'a Dialect,
}

impl<'a> StandardObjects<'a> {
    pub fn new(db: &'a dyn Database, dialect: &'a Dialect) -> Self {
        Self { db, dialect }
    }

    fn recreate(&self, table: &str, create: String) -> SneaqlResult<()> {
        tracing::info!(table = %table, "Recreating table");
        self.db.execute(&format!("drop table if exists {};", table))?;
        self.db.execute(&create)?;
        Ok(())
    }

    pub fn transforms_table_statement(&self, table: &str) -> String {
        let flag = self.dialect.boolean_type();
        format!(
            "create table if not exists {table} (\
             transform_name varchar(255) not null, \
             repository_type varchar(255), \
             sql_repository varchar(255), \
             sql_repository_branch varchar(255), \
             is_active {flag}, \
             notify_on_success {flag}, \
             notify_on_non_precondition_failure {flag}, \
             notify_on_precondition_failure {flag}, \
             updated_ts timestamp);"
        )
    }

    pub fn create_transforms_table(&self, table: &str) -> SneaqlResult<()> {
        self.db.execute(&self.transforms_table_statement(table))?;
        Ok(())
    }

    pub fn recreate_transforms_table(&self, table: &str) -> SneaqlResult<()> {
        self.recreate(table, self.transforms_table_statement(table))
    }

    pub fn create_transform_statement(&self, table: &str, record: &TransformRecord) -> String {
        let b = |v: bool| self.dialect.boolean_literal(v);
        format!(
            "insert into {} (transform_name, repository_type, sql_repository, \
             sql_repository_branch, is_active, notify_on_success, \
             notify_on_non_precondition_failure, notify_on_precondition_failure, updated_ts) \
             values ('{}', '{}', '{}', '{}', {}, {}, {}, {}, current_timestamp);",
            table,
            quote(&record.transform_name),
            quote(&record.repository_type),
            quote(&record.sql_repository),
            quote(&record.sql_repository_branch),
            b(record.is_active),
            b(record.notify_on_success),
            b(record.notify_on_non_precondition_failure),
            b(record.notify_on_precondition_failure),
        )
    }

    /// Insert one row into the transforms table.
    pub fn create_transform(&self, table: &str, record: &TransformRecord) -> SneaqlResult<()> {
        self.db.execute(&self.create_transform_statement(table, record))?;
        Ok(())
    }

    pub fn transform_steps_table_statement(&self, table: &str) -> String {
        let flag = self.dialect.boolean_type();
        format!(
            "create table if not exists {table} (\
             transform_name varchar(255) not null, \
             transform_step integer not null, \
             sql_file_path_in_repo varchar(1024), \
             is_active {flag}, \
             is_precondition {flag}, \
             updated_ts timestamp);"
        )
    }

    pub fn create_transform_steps_table(&self, table: &str) -> SneaqlResult<()> {
        self.db.execute(&self.transform_steps_table_statement(table))?;
        Ok(())
    }

    pub fn recreate_transform_steps_table(&self, table: &str) -> SneaqlResult<()> {
        self.recreate(table, self.transform_steps_table_statement(table))
    }

    pub fn transform_lock_table_statement(&self, table: &str) -> String {
        format!(
            "create table if not exists {table} (\
             transform_lock_id bigint, \
             transform_name varchar(255), \
             transform_lock_time timestamp);"
        )
    }

    pub fn create_transform_lock_table(&self, table: &str) -> SneaqlResult<()> {
        self.db.execute(&self.transform_lock_table_statement(table))?;
        Ok(())
    }

    pub fn recreate_transform_lock_table(&self, table: &str) -> SneaqlResult<()> {
        self.recreate(table, self.transform_lock_table_statement(table))
    }

    pub fn transform_log_table_statement(&self, table: &str) -> String {
        let flag = self.dialect.boolean_type();
        format!(
            "create table if not exists {table} (\
             transform_run_id bigint, \
             transform_lock_id bigint, \
             transform_name varchar(255), \
             transform_step integer, \
             transform_statement integer, \
             all_steps_complete {flag}, \
             failed_in_precondition {flag}, \
             message varchar(65000), \
             transform_start_time timestamp, \
             transform_end_time timestamp);"
        )
    }

    pub fn create_transform_log_table(&self, table: &str) -> SneaqlResult<()> {
        self.db.execute(&self.transform_log_table_statement(table))?;
        Ok(())
    }

    pub fn recreate_transform_log_table(&self, table: &str) -> SneaqlResult<()> {
        self.recreate(table, self.transform_log_table_statement(table))
    }
}

fn quote(text: &str) -> String {
    text.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Connector, DatabaseConfig, DuckdbConnector};
    use crate::value::Value;

    fn duckdb() -> Box<dyn Database> {
        DuckdbConnector::new()
            .connect(&DatabaseConfig::new("duckdb:memory"))
            .unwrap()
    }

    #[test]
    fn test_boolean_columns_follow_dialect() {
        let db = duckdb();
        let sqlite = Dialect::new("sqlite");
        let objects = StandardObjects::new(db.as_ref(), &sqlite);
        assert!(objects
            .transform_steps_table_statement("steps")
            .contains("is_active smallint"));

        let duck = Dialect::new("duckdb").with_boolean(true);
        let objects = StandardObjects::new(db.as_ref(), &duck);
        assert!(objects
            .transform_steps_table_statement("steps")
            .contains("is_active boolean"));
    }

    #[test]
    fn test_create_all_tables() {
        let db = duckdb();
        let dialect = Dialect::new("duckdb").with_boolean(true);
        let objects = StandardObjects::new(db.as_ref(), &dialect);

        objects.create_transforms_table("transforms").unwrap();
        objects.create_transform_steps_table("transform_steps").unwrap();
        objects.create_transform_lock_table("transform_lock").unwrap();
        objects.create_transform_log_table("transform_log").unwrap();
        // create is idempotent
        objects.create_transform_lock_table("transform_lock").unwrap();

        for table in ["transforms", "transform_steps", "transform_lock", "transform_log"] {
            assert_eq!(
                db.query_single_value(&format!("select count(*) from {}", table))
                    .unwrap(),
                Value::Integer(0)
            );
        }
    }

    #[test]
    fn test_recreate_drops_rows() {
        let db = duckdb();
        let dialect = Dialect::new("duckdb").with_boolean(true);
        let objects = StandardObjects::new(db.as_ref(), &dialect);

        objects.create_transforms_table("transforms").unwrap();
        objects
            .create_transform(
                "transforms",
                &TransformRecord {
                    transform_name: "o'hare".to_string(),
                    repository_type: "local".to_string(),
                    is_active: true,
                    ..Default::default()
                },
            )
            .unwrap();
        let rows = db
            .query_rows("select transform_name, is_active from transforms")
            .unwrap();
        assert_eq!(rows[0]["transform_name"], Value::from("o'hare"));
        assert_eq!(rows[0]["is_active"], Value::Boolean(true));

        objects.recreate_transforms_table("transforms").unwrap();
        assert_eq!(
            db.query_single_value("select count(*) from transforms").unwrap(),
            Value::Integer(0)
        );
    }
}
