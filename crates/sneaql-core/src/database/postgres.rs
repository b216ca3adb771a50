//! PostgreSQL endpoint.
//!
//! The driver is async; each session owns a current-thread runtime and
//! blocks on every call.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::runtime::Runtime;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Config, NoTls, Row};

use super::{Connector, Database, DatabaseConfig};
use crate::error::{SneaqlError, SneaqlResult};
use crate::value::{Record, Value};

/// Opens PostgreSQL sessions.
#[derive(Debug, Default)]
pub struct PostgresConnector;

impl PostgresConnector {
    pub fn new() -> Self {
        Self
    }

    fn pg_config(config: &DatabaseConfig) -> SneaqlResult<Config> {
        let url = config.url.trim();
        let url = url.strip_prefix("jdbc:").unwrap_or(url);
        let mut pg_config = Config::from_str(url)
            .map_err(|e| SneaqlError::Configuration(format!("Invalid postgres url: {}", e)))?;
        if let Some(user) = &config.user {
            pg_config.user(user);
        }
        if let Some(password) = &config.password {
            pg_config.password(password);
        }
        Ok(pg_config)
    }
}

impl Connector for PostgresConnector {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn connect(&self, config: &DatabaseConfig) -> SneaqlResult<Box<dyn Database>> {
        let pg_config = Self::pg_config(config)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = runtime.block_on(async {
            let (client, connection) = pg_config.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::error!(error = %e, "PostgreSQL connection error");
                }
            });
            Ok::<_, SneaqlError>(client)
        })?;

        tracing::debug!("Opened PostgreSQL session");
        Ok(Box::new(PostgresDatabase {
            client: Some(client),
            runtime,
        }))
    }
}

/// One PostgreSQL session.
pub struct PostgresDatabase {
    client: Option<Client>,
    runtime: Runtime,
}

impl PostgresDatabase {
    fn client(&self) -> SneaqlResult<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| SneaqlError::Database("connection is closed".to_string()))
    }

    fn query(&self, sql: &str) -> SneaqlResult<Vec<Row>> {
        let client = self.client()?;
        Ok(self.runtime.block_on(client.query(sql, &[]))?)
    }
}

impl Database for PostgresDatabase {
    fn execute(&self, sql: &str) -> SneaqlResult<u64> {
        let client = self.client()?;
        Ok(self.runtime.block_on(client.execute(sql, &[]))?)
    }

    fn query_single_value(&self, sql: &str) -> SneaqlResult<Value> {
        Ok(self
            .query(sql)?
            .first()
            .filter(|row| !row.is_empty())
            .map(|row| pg_value_to_value(row, 0))
            .unwrap_or(Value::Null))
    }

    fn query_rows(&self, sql: &str) -> SneaqlResult<Vec<Record>> {
        Ok(self
            .query(sql)?
            .iter()
            .map(|row| {
                row.columns()
                    .iter()
                    .enumerate()
                    .map(|(i, col)| (col.name().to_string(), pg_value_to_value(row, i)))
                    .collect()
            })
            .collect())
    }

    fn close(&mut self) -> SneaqlResult<()> {
        // dropping the client ends the connection task
        self.client.take();
        Ok(())
    }
}

/// Convert a PostgreSQL row value.
fn pg_value_to_value(row: &Row, idx: usize) -> Value {
    fn or_null<T: Into<Value>>(v: Option<T>) -> Value {
        v.map(Into::into).unwrap_or(Value::Null)
    }

    if let Ok(v) = row.try_get::<_, Option<i64>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<i32>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<i16>>(idx) {
        return or_null(v.map(i32::from));
    }
    if let Ok(v) = row.try_get::<_, Option<f64>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<f32>>(idx) {
        return or_null(v.map(f64::from));
    }
    if let Ok(v) = row.try_get::<_, Option<PgNumeric>>(idx) {
        return v.map(|n| numeric_to_value(&n.0)).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<_, Option<bool>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<String>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<NaiveDateTime>>(idx) {
        return or_null(v);
    }
    if let Ok(v) = row.try_get::<_, Option<DateTime<Utc>>>(idx) {
        return or_null(v.map(|t| t.naive_utc()));
    }
    if let Ok(v) = row.try_get::<_, Option<NaiveDate>>(idx) {
        return or_null(v.and_then(|d| d.and_hms_opt(0, 0, 0)));
    }
    if let Ok(v) = row.try_get::<_, Option<serde_json::Value>>(idx) {
        return v.map(|j| Value::String(j.to_string())).unwrap_or(Value::Null);
    }
    Value::Null
}

/// A `numeric` column rendered as exact decimal text.
struct PgNumeric(String);

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(PgNumeric(decode_numeric(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

const NUMERIC_NEGATIVE: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_POS_INF: u16 = 0xD000;
const NUMERIC_NEG_INF: u16 = 0xF000;

/// Decode the binary `numeric` wire format: digit count, weight, sign and
/// display scale headers followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> Result<String, String> {
    let word = |i: usize| -> Result<u16, String> {
        raw.get(i * 2..i * 2 + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated numeric value".to_string())
    };

    let ndigits = usize::from(word(0)?);
    let weight = i32::from(word(1)? as i16);
    let sign = word(2)?;
    let dscale = usize::from(word(3)?);
    let digits = (0..ndigits)
        .map(|i| word(4 + i))
        .collect::<Result<Vec<_>, _>>()?;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_POS_INF => return Ok("Infinity".to_string()),
        NUMERIC_NEG_INF => return Ok("-Infinity".to_string()),
        _ => {}
    }
    let digit = |i: i32| -> u16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEGATIVE {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit(0).to_string());
        for i in 1..=weight {
            text.push_str(&format!("{:04}", digit(i)));
        }
    }
    if dscale > 0 {
        let fraction: String = (0..dscale.div_ceil(4))
            .map(|k| format!("{:04}", digit(weight + 1 + k as i32)))
            .collect();
        text.push('.');
        text.push_str(&fraction[..dscale]);
    }
    Ok(text)
}

/// Whole numbers become integers, everything else a float; text that fits
/// neither (NaN, out of range) stays a string.
fn numeric_to_value(text: &str) -> Value {
    if !text.contains('.') {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Integer(n);
        }
    }
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::Float(f),
        _ => Value::String(text.to_string()),
    }
}
