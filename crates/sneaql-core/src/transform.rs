//! Transform engine.
//!
//! Builds every component from a [`TransformConfig`], validates all step
//! files, then runs their statements in order against one database session.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::commands::{reserved_references, CommandContext, ControlSignal};
use crate::config::TransformConfig;
use crate::database::{Connector, Database};
use crate::dialect::Dialect;
use crate::error::{SneaqlError, SneaqlResult};
use crate::exceptions::ErrorChannel;
use crate::expression::{EvaluatorOptions, ExpressionEvaluator};
use crate::lock::TransformLockManager;
use crate::parser::{validate_all, Statement, StepParser};
use crate::recordset::RecordsetStore;
use crate::registry::Registry;
use crate::steps::StepSourceContext;
use crate::value::Value;

/// Lifecycle of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    Initializing,
    Validating,
    Validated,
    ConnectingToDatabase,
    Running,
    Completed,
    Error,
}

impl TransformStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformStatus::Initializing => "initializing",
            TransformStatus::Validating => "validating",
            TransformStatus::Validated => "validated",
            TransformStatus::ConnectingToDatabase => "connecting_to_database",
            TransformStatus::Running => "running",
            TransformStatus::Completed => "completed",
            TransformStatus::Error => "error",
        }
    }
}

impl fmt::Display for TransformStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed step file.
#[derive(Debug, Clone)]
pub struct ParsedStep {
    pub step_number: i64,
    pub statements: Vec<Statement>,
}

/// Everything built before the main connection is opened.
struct Prepared {
    evaluator: ExpressionEvaluator,
    recordsets: RecordsetStore,
    dialect: Dialect,
    connector: Arc<dyn Connector>,
    steps: Vec<ParsedStep>,
}

/// One SneaQL transform.
pub struct Transform {
    config: TransformConfig,
    registry: Arc<Registry>,
    evaluator_options: EvaluatorOptions,
    environment: Option<Vec<(String, String)>>,
    status: TransformStatus,
    exit_code: i32,
    current_step: Option<i64>,
    current_statement: Option<usize>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    transform_error: Option<SneaqlError>,
}

impl Transform {
    /// Create a transform. Runs immediately when `config.run` is set.
    pub fn new(config: TransformConfig, registry: Arc<Registry>) -> Self {
        let run = config.run;
        let mut transform = Self {
            config,
            registry,
            evaluator_options: EvaluatorOptions::from_env(),
            environment: None,
            status: TransformStatus::Initializing,
            exit_code: 0,
            current_step: None,
            current_statement: None,
            start_time: Utc::now(),
            end_time: None,
            transform_error: None,
        };
        if run {
            transform.run();
        }
        transform
    }

    /// Use `environment` instead of the process environment for `:env_`
    /// references.
    pub fn with_environment<I>(mut self, environment: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.environment = Some(environment.into_iter().collect());
        self
    }

    pub fn with_evaluator_options(mut self, options: EvaluatorOptions) -> Self {
        self.evaluator_options = options;
        self
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn status(&self) -> TransformStatus {
        self.status
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn current_step(&self) -> Option<i64> {
        self.current_step
    }

    /// 1-based index of the statement within the current step.
    pub fn current_statement(&self) -> Option<usize> {
        self.current_statement
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn transform_error(&self) -> Option<&SneaqlError> {
        self.transform_error.as_ref()
    }

    /// Build and validate every step without connecting or locking.
    pub fn validate(&mut self) -> TransformStatus {
        self.reset();
        let outcome = self.prepare().map(|_| ());
        self.finish(outcome, TransformStatus::Validated)
    }

    /// Validate, lock if configured, connect and run every step.
    pub fn run(&mut self) -> TransformStatus {
        self.reset();
        let mut lock: Option<TransformLockManager> = None;
        let mut database: Option<Box<dyn Database>> = None;

        let outcome = self.execute(&mut lock, &mut database);

        if let Some(lock) = lock {
            lock.release(&self.config.transform_name, self.config.transform_lock_id);
        }
        if let Some(mut database) = database {
            if let Err(e) = database.close() {
                tracing::warn!(error = %e, "Failed to close database connection");
            }
        }
        self.finish(outcome, TransformStatus::Completed)
    }

    fn reset(&mut self) {
        self.status = TransformStatus::Initializing;
        self.exit_code = 0;
        self.current_step = None;
        self.current_statement = None;
        self.start_time = Utc::now();
        self.end_time = None;
        self.transform_error = None;
    }

    fn execute(
        &mut self,
        lock: &mut Option<TransformLockManager>,
        database: &mut Option<Box<dyn Database>>,
    ) -> SneaqlResult<()> {
        let Prepared {
            mut evaluator,
            mut recordsets,
            dialect,
            connector,
            steps,
        } = self.prepare()?;
        let db_config = self.config.database_config();

        if self.config.locked_transform {
            let manager = TransformLockManager::new(
                Arc::clone(&connector),
                db_config.clone(),
                dialect.clone(),
                &self.config.transform_lock_table,
            );
            if !manager.acquire(&self.config.transform_name, self.config.transform_lock_id)? {
                return Err(SneaqlError::TransformIsLocked(self.config.transform_name.clone()));
            }
            *lock = Some(manager);
        }

        self.status = TransformStatus::ConnectingToDatabase;
        let db: &dyn Database = &**database.insert(connector.connect(&db_config)?);
        if let Some(statement) = &dialect.autocommit_off_statement {
            db.execute(statement)?;
        }

        self.status = TransformStatus::Running;
        self.iterate_steps_and_statements(&steps, db, &mut evaluator, &mut recordsets)
    }

    fn prepare(&mut self) -> SneaqlResult<Prepared> {
        let evaluator = match &self.environment {
            Some(environment) => {
                ExpressionEvaluator::with_environment(environment.clone(), &self.evaluator_options)?
            }
            None => ExpressionEvaluator::new(&self.evaluator_options)?,
        };
        let recordsets = RecordsetStore::new();
        let dialect = self.resolve_dialect()?;
        let connector = self
            .registry
            .connector(&self.config.database_config().scheme()?)?;

        let repo = self
            .registry
            .repo_source(self.config.resolved_repo_type(), &self.config)?;
        let metadata = self
            .registry
            .step_source(
                &self.config.step_metadata_manager_type,
                &StepSourceContext {
                    config: &self.config,
                    connector: Arc::clone(&connector),
                    dialect: &dialect,
                },
            )?
            .steps()?;

        let parser = StepParser::new();
        let steps = metadata
            .iter()
            .map(|step| {
                Ok(ParsedStep {
                    step_number: step.step_number,
                    statements: parse_step_file(&parser, &repo.base_directory().join(&step.step_file))?,
                })
            })
            .collect::<SneaqlResult<Vec<_>>>()?;

        self.status = TransformStatus::Validating;
        for step in &steps {
            if !validate_all(&step.statements, &self.registry) {
                return Err(SneaqlError::StatementParsing(format!(
                    "step {} has invalid statements",
                    step.step_number
                )));
            }
        }
        tracing::info!(
            transform = %self.config.transform_name,
            steps = steps.len(),
            dialect = %dialect.name,
            "Transform validated"
        );

        Ok(Prepared {
            evaluator,
            recordsets,
            dialect,
            connector,
            steps,
        })
    }

    /// Configured dialect, or the first registered dialect named in the URL.
    fn resolve_dialect(&self) -> SneaqlResult<Dialect> {
        let name = match self.config.database.as_deref() {
            Some(name) => name,
            None => self
                .registry
                .database_type(&self.config.database_url)
                .ok_or_else(|| {
                    SneaqlError::Configuration(format!(
                        "cannot determine database type from '{}'",
                        self.config.database_url
                    ))
                })?,
        };
        self.registry.dialect(name)
    }

    fn iterate_steps_and_statements(
        &mut self,
        steps: &[ParsedStep],
        db: &dyn Database,
        evaluator: &mut ExpressionEvaluator,
        recordsets: &mut RecordsetStore,
    ) -> SneaqlResult<()> {
        let mut errors = ErrorChannel::new();

        'steps: for step in steps {
            self.current_step = Some(step.step_number);

            for (index, statement) in step.statements.iter().enumerate() {
                self.current_statement = Some(index + 1);
                tracing::info!(
                    step = step.step_number,
                    statement = index + 1,
                    command = %statement.command,
                    "Running statement"
                );
                evaluator.log_session_variables();

                if statement.command != "on_error" {
                    if let Some(e) = errors.take() {
                        return Err(SneaqlError::UnhandledError(Box::new(e)));
                    }
                }

                let args = statement
                    .arguments
                    .iter()
                    .map(|a| evaluator.evaluate(&Value::from(a.as_str())))
                    .collect::<SneaqlResult<Vec<_>>>()?;
                let body = evaluator
                    .evaluate_all_reserving(&statement.body, &reserved_references(recordsets))?;
                let command = self.registry.command(&statement.command)?;

                let mut ctx = CommandContext {
                    database: Some(db),
                    evaluator: &mut *evaluator,
                    errors: &mut errors,
                    recordsets: &mut *recordsets,
                    statement: &body,
                };
                match command.execute(&mut ctx, &args)? {
                    Some(ControlSignal::StepExit) => {
                        tracing::info!(step = step.step_number, statement = index + 1, "Exiting step");
                        continue 'steps;
                    }
                    Some(ControlSignal::TransformExit) => {
                        tracing::info!(step = step.step_number, statement = index + 1, "Exiting transform");
                        return Ok(());
                    }
                    None => {}
                }
            }

            if let Some(e) = errors.take() {
                return Err(SneaqlError::UnhandledError(Box::new(e)));
            }
        }
        Ok(())
    }

    fn finish(&mut self, outcome: SneaqlResult<()>, success: TransformStatus) -> TransformStatus {
        self.end_time = Some(Utc::now());
        match outcome {
            Ok(()) => self.status = success,
            Err(e) => {
                match &e {
                    SneaqlError::TransformIsLocked(_) => tracing::info!(error = %e, "Transform not run"),
                    _ => tracing::error!(
                        error = %e,
                        step = ?self.current_step,
                        statement = ?self.current_statement,
                        "Transform failed"
                    ),
                }
                self.exit_code = 1;
                self.transform_error = Some(e);
                self.status = TransformStatus::Error;
            }
        }

        let elapsed_ms = (Utc::now() - self.start_time).num_milliseconds();
        tracing::info!(
            transform = %self.config.transform_name,
            exit_code = self.exit_code,
            status = %self.status,
            elapsed_ms,
            "Transform finished"
        );
        self.status
    }
}

fn parse_step_file(parser: &StepParser, path: &Path) -> SneaqlResult<Vec<Statement>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SneaqlError::Io(format!("Failed to read step file {}: {}", path.display(), e))
    })?;
    parser.parse(&contents)
}
