//! Named in-memory recordsets.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{SneaqlError, SneaqlResult};
use crate::expression::ExpressionEvaluator;
use crate::value::{Record, Value};

static RECORDSET_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Whether a matching record is kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    Include,
    Exclude,
}

/// One `include|exclude field op expr` filter of an `iterate` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordCondition {
    pub mode: ConditionMode,
    pub field: String,
    pub operator: String,
    pub expression: Value,
}

impl RecordCondition {
    /// Parse the filter groups that follow the recordset name.
    pub fn parse_all(args: &[Value]) -> SneaqlResult<Vec<RecordCondition>> {
        if args.len() % 4 != 0 {
            return Err(SneaqlError::StatementParsing(format!(
                "recordset conditions come in groups of four, got {} arguments",
                args.len()
            )));
        }
        args.chunks(4)
            .map(|group| {
                let mode = match group[0].to_string().to_lowercase().as_str() {
                    "include" => ConditionMode::Include,
                    "exclude" => ConditionMode::Exclude,
                    other => {
                        return Err(SneaqlError::StatementParsing(format!(
                            "expected include or exclude, got '{}'",
                            other
                        )))
                    }
                };
                Ok(RecordCondition {
                    mode,
                    field: group[1].to_string(),
                    operator: group[2].to_string(),
                    expression: group[3].clone(),
                })
            })
            .collect()
    }
}

/// Recordsets owned by one transform run.
#[derive(Debug, Default)]
pub struct RecordsetStore {
    recordsets: HashMap<String, Vec<Record>>,
}

impl RecordsetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid_recordset_name(name: &str) -> bool {
        RECORDSET_NAME.is_match(name.trim())
    }

    /// Every record must carry the first record's field names, and every
    /// value must be an integer, float or string.
    pub fn validate(records: &[Record]) -> SneaqlResult<()> {
        let Some(first) = records.first() else {
            return Ok(());
        };

        for (index, record) in records.iter().enumerate() {
            if !record.keys().eq(first.keys()) {
                return Err(SneaqlError::InvalidRecordset(format!(
                    "record {} has fields {:?}, expected {:?}",
                    index + 1,
                    record.keys().collect::<Vec<_>>(),
                    first.keys().collect::<Vec<_>>()
                )));
            }
            if let Some((field, value)) = record.iter().find(|(_, v)| !v.is_recordset_scalar()) {
                return Err(SneaqlError::InvalidRecordset(format!(
                    "record {} field '{}' holds a {} value",
                    index + 1,
                    field,
                    value.type_name()
                )));
            }
        }
        Ok(())
    }

    /// Store a recordset, replacing any recordset of the same name.
    pub fn store(&mut self, name: &str, records: Vec<Record>) -> SneaqlResult<()> {
        Self::validate(&records)?;
        tracing::debug!(recordset = %name, records = records.len(), "Storing recordset");
        self.recordsets.insert(name.to_string(), records);
        Ok(())
    }

    /// Remove a recordset. Returns false if it did not exist.
    pub fn remove(&mut self, name: &str) -> bool {
        self.recordsets.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> SneaqlResult<&[Record]> {
        self.recordsets
            .get(name)
            .map(|r| r.as_slice())
            .ok_or_else(|| SneaqlError::RecordsetNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recordsets.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.recordsets.keys().map(|s| s.as_str()).collect()
    }

    /// True when the record passes every condition.
    pub fn record_matches(
        evaluator: &ExpressionEvaluator,
        record: &Record,
        conditions: &[RecordCondition],
    ) -> SneaqlResult<bool> {
        for condition in conditions {
            let field_value = record.get(&condition.field).cloned().unwrap_or(Value::Null);
            let result = evaluator.compare(&condition.operator, &field_value, &condition.expression)?;
            let keep = match condition.mode {
                ConditionMode::Include => result,
                ConditionMode::Exclude => !result,
            };
            if !keep {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
