//! SneaQL Core Library
//!
//! Interpreter for SneaQL step files: plain SQL annotated with
//! `/*-command args-*/` tags that add variables, conditionals, recordset
//! iteration and error handling to a sequence of statements.
//!
//! This crate provides:
//! - Tag tokenizer and step parser
//! - Expression evaluator for session and environment variables
//! - Built-in commands with a pending-error channel for `on_error`
//! - Capability registry for commands, dialects, connectors, repo and step sources
//! - DuckDB and PostgreSQL endpoints
//! - Table-backed transform lock
//! - Transform engine with validate and run
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sneaql_core::{Registry, Transform, TransformConfig};
//!
//! let config = TransformConfig::from_env()?;
//! let mut transform = Transform::new(config, Arc::new(Registry::with_builtins()));
//! transform.run();
//! std::process::exit(transform.exit_code());
//! ```

pub mod commands;
pub mod config;
pub mod database;
pub mod dialect;
pub mod error;
pub mod exceptions;
pub mod expression;
pub mod lock;
pub mod parser;
pub mod recordset;
pub mod registry;
pub mod repo;
pub mod standard_objects;
pub mod steps;
pub mod tokenizer;
pub mod transform;
pub mod value;

pub use commands::{Command, CommandContext, CommandOutcome, ControlSignal};
pub use config::TransformConfig;
pub use database::{Connector, Database, DatabaseConfig};
pub use dialect::Dialect;
pub use error::{SneaqlError, SneaqlResult};
pub use expression::{EvaluatorOptions, ExpressionEvaluator};
pub use registry::{Capability, CapabilityKind, Registry};
pub use transform::{Transform, TransformStatus};
pub use value::{Record, Value};
