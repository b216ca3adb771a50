//! Shared fixtures: a temporary repo of step files and a registry whose
//! DuckDB connector is visible to the test.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use sneaql_core::database::DuckdbConnector;
use sneaql_core::{
    Capability, Connector, Database, DatabaseConfig, EvaluatorOptions, Registry, Transform,
    TransformConfig, Value,
};

pub const DATABASE_URL: &str = "duckdb:memory";

pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub connector: Arc<DuckdbConnector>,
    pub registry: Arc<Registry>,
}

impl TestRepo {
    /// One step file per entry, numbered from 1.
    pub fn new(steps: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_steps(dir.path(), steps);

        let connector = Arc::new(DuckdbConnector::new());
        let shared = Arc::clone(&connector);
        let mut registry = Registry::new();
        registry.register(
            "duckdb",
            Capability::connector(move || Arc::clone(&shared) as Arc<dyn Connector>),
        );
        registry.register_builtins();

        Self {
            dir,
            connector,
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self, name: &str) -> TransformConfig {
        TransformConfig {
            transform_name: name.to_string(),
            repo_base_dir: self.dir.path().display().to_string(),
            step_metadata_file_path: Some(self.dir.path().join("steps.json").display().to_string()),
            database_url: DATABASE_URL.to_string(),
            ..Default::default()
        }
    }

    pub fn transform(&self, config: TransformConfig) -> Transform {
        Transform::new(config, Arc::clone(&self.registry))
            .with_environment(Vec::new())
            .with_evaluator_options(EvaluatorOptions::default())
    }

    pub fn session(&self) -> Box<dyn Database> {
        self.connector
            .connect(&DatabaseConfig::new(DATABASE_URL))
            .unwrap()
    }

    pub fn execute(&self, sql: &str) {
        self.session().execute(sql).unwrap();
    }

    pub fn value(&self, sql: &str) -> Value {
        self.session().query_single_value(sql).unwrap()
    }

    pub fn table_exists(&self, table: &str) -> bool {
        self.session()
            .query_rows(&format!("select * from {}", table))
            .is_ok()
    }
}

fn write_steps(dir: &Path, steps: &[&str]) {
    let mut metadata = Vec::new();
    for (i, contents) in steps.iter().enumerate() {
        let file = format!("step_{}.sql", i + 1);
        std::fs::write(dir.join(&file), contents).unwrap();
        metadata.push(serde_json::json!({ "step_number": i + 1, "step_file": file }));
    }
    std::fs::write(
        dir.join("steps.json"),
        serde_json::to_string_pretty(&metadata).unwrap(),
    )
    .unwrap();
}
