//! Step metadata sources.
//!
//! A step source lists the step files of a transform in execution order.

use std::sync::Arc;

use serde::Deserialize;

use crate::config::TransformConfig;
use crate::database::Connector;
use crate::dialect::Dialect;
use crate::error::{SneaqlError, SneaqlResult};
use crate::registry::{Capability, Registry};
use crate::value::Value;

/// One step: its number and its file, relative to the repo base directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepMetadata {
    pub step_number: i64,
    pub step_file: String,
}

/// Lists the steps of a transform.
pub trait StepSource {
    /// Steps ordered by ascending step number.
    fn steps(&self) -> SneaqlResult<Vec<StepMetadata>>;
}

/// What a step source factory may use.
pub struct StepSourceContext<'a> {
    pub config: &'a TransformConfig,
    pub connector: Arc<dyn Connector>,
    pub dialect: &'a Dialect,
}

/// Steps from a JSON file: `[{"step_number": 1, "step_file": "a.sql"}, ...]`.
pub struct LocalFileStepSource {
    path: String,
}

impl LocalFileStepSource {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl StepSource for LocalFileStepSource {
    fn steps(&self) -> SneaqlResult<Vec<StepMetadata>> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            SneaqlError::Io(format!("Failed to read step metadata file {}: {}", self.path, e))
        })?;
        let mut steps: Vec<StepMetadata> = serde_json::from_str(&contents)?;
        steps.sort_by_key(|s| s.step_number);
        tracing::debug!(path = %self.path, steps = steps.len(), "Loaded step metadata");
        Ok(steps)
    }
}

/// Steps from the transform steps table, active rows only.
pub struct TransformStepsTableSource {
    connector: Arc<dyn Connector>,
    config: TransformConfig,
    dialect: Dialect,
}

impl TransformStepsTableSource {
    pub fn new(connector: Arc<dyn Connector>, config: TransformConfig, dialect: Dialect) -> Self {
        Self {
            connector,
            config,
            dialect,
        }
    }

    fn query(&self) -> String {
        format!(
            "select transform_step, sql_file_path_in_repo from {} \
             where transform_name='{}' and is_active={} order by transform_step asc;",
            self.config.transform_steps_table,
            self.config.transform_name.replace('\'', "''"),
            self.dialect.boolean_literal(true)
        )
    }
}

impl StepSource for TransformStepsTableSource {
    fn steps(&self) -> SneaqlResult<Vec<StepMetadata>> {
        let mut db = self.connector.connect(&self.config.database_config())?;
        let rows = db.query_rows(&self.query());
        if let Err(e) = db.close() {
            tracing::warn!(error = %e, "Failed to close step metadata connection");
        }

        rows?
            .into_iter()
            .map(|row| {
                let step_number = row
                    .get("transform_step")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        SneaqlError::Configuration("transform_step is not a number".to_string())
                    })?;
                let step_file = match row.get("sql_file_path_in_repo") {
                    Some(Value::String(path)) => path.clone(),
                    _ => {
                        return Err(SneaqlError::Configuration(format!(
                            "step {} has no sql_file_path_in_repo",
                            step_number
                        )))
                    }
                };
                Ok(StepMetadata {
                    step_number,
                    step_file,
                })
            })
            .collect()
    }
}

pub(crate) fn register_builtins(registry: &mut Registry) {
    registry.register(
        "local_file",
        Capability::step_metadata_manager(|ctx| {
            let path = ctx.config.step_metadata_file_path.clone().ok_or_else(|| {
                SneaqlError::Configuration(
                    "step_metadata_file_path is required for local_file steps".to_string(),
                )
            })?;
            Ok(Box::new(LocalFileStepSource::new(path)) as Box<dyn StepSource>)
        }),
    );
    registry.register(
        "transform_steps_table",
        Capability::step_metadata_manager(|ctx| {
            Ok(Box::new(TransformStepsTableSource::new(
                Arc::clone(&ctx.connector),
                ctx.config.clone(),
                ctx.dialect.clone(),
            )) as Box<dyn StepSource>)
        }),
    );
}
