//! DuckDB endpoint.

use std::sync::Mutex;

use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::Connection;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::{Connector, Database, DatabaseConfig};
use crate::error::{SneaqlError, SneaqlResult};
use crate::value::{Record, Value};

/// Opens DuckDB sessions.
///
/// The first `connect` opens the database; later calls clone sessions from
/// it, so every session of one connector sees the same data.
pub struct DuckdbConnector {
    root: Mutex<Option<(String, Connection)>>,
}

impl DuckdbConnector {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(None),
        }
    }

    /// Path portion of a `duckdb:` URL. `None` means in-memory.
    fn target(url: &str) -> Option<String> {
        let url = url.trim();
        let rest = url.strip_prefix("duckdb:").unwrap_or(url);
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        match rest {
            "" | "memory" | ":memory:" => None,
            path => Some(path.to_string()),
        }
    }
}

impl Default for DuckdbConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for DuckdbConnector {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn connect(&self, config: &DatabaseConfig) -> SneaqlResult<Box<dyn Database>> {
        let mut root = self
            .root
            .lock()
            .map_err(|e| SneaqlError::Database(format!("Failed to acquire connection lock: {}", e)))?;

        if root.is_none() {
            let conn = match Self::target(&config.url) {
                Some(path) => {
                    tracing::debug!(path = %path, "Opening DuckDB database");
                    Connection::open(&path)?
                }
                None => {
                    tracing::debug!("Opening in-memory DuckDB database");
                    Connection::open_in_memory()?
                }
            };
            *root = Some((config.url.clone(), conn));
        }

        match root.as_ref() {
            Some((url, conn)) if *url == config.url => Ok(Box::new(DuckdbDatabase {
                conn: Some(conn.try_clone()?),
            })),
            Some((url, _)) => Err(SneaqlError::Configuration(format!(
                "connector is bound to '{}', cannot open '{}'",
                url, config.url
            ))),
            None => Err(SneaqlError::Database("DuckDB database is not open".to_string())),
        }
    }
}

/// One DuckDB session.
pub struct DuckdbDatabase {
    conn: Option<Connection>,
}

impl DuckdbDatabase {
    fn conn(&self) -> SneaqlResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| SneaqlError::Database("connection is closed".to_string()))
    }

    /// Rows as ordered `(column, value)` pairs.
    fn query_columns(&self, sql: &str) -> SneaqlResult<Vec<Vec<(String, Value)>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;

        let mapped_rows = stmt.query_map([], |row| {
            // Column count is only known once the statement has run
            let mut values = Vec::new();
            let mut idx = 0;
            while let Ok(v) = row.get::<_, DuckValue>(idx) {
                values.push(duckdb_value_to_value(v));
                idx += 1;
            }
            Ok(values)
        })?;

        let mut results = Vec::new();
        for row in mapped_rows {
            results.push(row?);
        }

        let column_names: Vec<String> = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).map_or("", |v| v).to_string())
            .collect();

        Ok(results
            .into_iter()
            .map(|values| {
                values
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let name = column_names
                            .get(i)
                            .cloned()
                            .unwrap_or_else(|| format!("column{}", i));
                        (name, v)
                    })
                    .collect()
            })
            .collect())
    }
}

impl Database for DuckdbDatabase {
    fn execute(&self, sql: &str) -> SneaqlResult<u64> {
        let affected = self.conn()?.execute(sql, [])?;
        Ok(affected as u64)
    }

    fn query_single_value(&self, sql: &str) -> SneaqlResult<Value> {
        Ok(self
            .query_columns(sql)?
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, v)| v)
            .unwrap_or(Value::Null))
    }

    fn query_rows(&self, sql: &str) -> SneaqlResult<Vec<Record>> {
        Ok(self
            .query_columns(sql)?
            .into_iter()
            .map(|row| row.into_iter().collect())
            .collect())
    }

    fn close(&mut self) -> SneaqlResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| SneaqlError::from(e))?;
        }
        Ok(())
    }
}

fn timestamp_from(unit: TimeUnit, t: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => t.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => t.checked_mul(1_000)?,
        TimeUnit::Microsecond => t,
        TimeUnit::Nanosecond => t / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|t| t.naive_utc())
}

fn duckdb_value_to_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Boolean(b),
        DuckValue::TinyInt(n) => Value::Integer(n.into()),
        DuckValue::SmallInt(n) => Value::Integer(n.into()),
        DuckValue::Int(n) => Value::Integer(n.into()),
        DuckValue::BigInt(n) => Value::Integer(n),
        DuckValue::HugeInt(n) => i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(n.to_string())),
        DuckValue::UTinyInt(n) => Value::Integer(n.into()),
        DuckValue::USmallInt(n) => Value::Integer(n.into()),
        DuckValue::UInt(n) => Value::Integer(n.into()),
        DuckValue::UBigInt(n) => i64::try_from(n)
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::String(n.to_string())),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .map(Value::Float)
                .unwrap_or(Value::String(text))
        }
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
        DuckValue::Timestamp(unit, t) => timestamp_from(unit, t)
            .map(Value::Timestamp)
            .unwrap_or(Value::Integer(t)),
        DuckValue::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(days.into())))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .unwrap_or(Value::Integer(days.into())),
        DuckValue::Union(inner) => duckdb_value_to_value(*inner),
        other => Value::String(format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Box<dyn Database> {
        DuckdbConnector::new()
            .connect(&DatabaseConfig::new("duckdb:memory"))
            .unwrap()
    }

    #[test]
    fn test_duckdb_simple_query() {
        let db = memory();
        let rows = db.query_rows("SELECT 1 AS num, 'hello' AS msg").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["num"], Value::Integer(1));
        assert_eq!(rows[0]["msg"], Value::from("hello"));
    }

    #[test]
    fn test_duckdb_single_value_uses_first_column() {
        let db = memory();
        assert_eq!(
            db.query_single_value("SELECT 'z' AS b, 2 AS a").unwrap(),
            Value::from("z")
        );
        assert_eq!(
            db.query_single_value("SELECT 1 WHERE 1 = 0").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_duckdb_execute_rows_affected() {
        let db = memory();
        db.execute("CREATE TABLE t (id INTEGER, name VARCHAR)").unwrap();
        let affected = db
            .execute("INSERT INTO t VALUES (1, 'Alice'), (2, 'Bob')")
            .unwrap();
        assert_eq!(affected, 2);
        assert_eq!(db.execute("DELETE FROM t WHERE id = 1").unwrap(), 1);
    }

    #[test]
    fn test_duckdb_sessions_share_data() {
        let connector = DuckdbConnector::new();
        let config = DatabaseConfig::new("duckdb:memory");
        let a = connector.connect(&config).unwrap();
        let b = connector.connect(&config).unwrap();

        a.execute("CREATE TABLE shared (x INTEGER)").unwrap();
        a.execute("INSERT INTO shared VALUES (5)").unwrap();
        assert_eq!(
            b.query_single_value("SELECT x FROM shared").unwrap(),
            Value::Integer(5)
        );
    }

    #[test]
    fn test_duckdb_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("duckdb:{}", dir.path().join("test.db").display());
        let connector = DuckdbConnector::new();
        let mut db = connector.connect(&DatabaseConfig::new(&url)).unwrap();
        db.execute("CREATE TABLE t (x INTEGER)").unwrap();
        db.close().unwrap();
        assert!(db.execute("SELECT 1").is_err());
        assert!(connector.connect(&DatabaseConfig::new("duckdb:memory")).is_err());
    }

    #[test]
    fn test_duckdb_types() {
        let db = memory();
        let rows = db
            .query_rows(
                "SELECT 1.5::DOUBLE AS f, true AS b, NULL AS n, \
                 TIMESTAMP '2020-01-02 03:04:05' AS ts, 12.25::DECIMAL(6,2) AS d",
            )
            .unwrap();
        let row = &rows[0];
        assert_eq!(row["f"], Value::Float(1.5));
        assert_eq!(row["b"], Value::Boolean(true));
        assert_eq!(row["n"], Value::Null);
        assert_eq!(row["d"], Value::Float(12.25));
        assert_eq!(row["ts"].to_string(), "2020-01-02 03:04:05");
    }
}
