//! Transform configuration.

use serde::Deserialize;

use crate::database::DatabaseConfig;
use crate::error::SneaqlResult;
use crate::repo::repo_type_from_url;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SNEAQL_";

/// Configuration for one transform run.
///
/// Loaded from `SNEAQL_`-prefixed environment variables:
/// - `SNEAQL_TRANSFORM_NAME`: name used for locking and step lookup
/// - `SNEAQL_REPO_TYPE`: `local`, `git` or `http` (inferred from `SNEAQL_REPO_URL`, else local)
/// - `SNEAQL_REPO_BASE_DIR`: directory holding the step files
/// - `SNEAQL_STEP_METADATA_MANAGER_TYPE`: `local_file` or `transform_steps_table`
/// - `SNEAQL_DATABASE_URL`: connection URL, e.g. `duckdb:memory`
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransformConfig {
    #[serde(default)]
    pub transform_name: String,

    /// Lock holder id
    #[serde(default)]
    pub transform_lock_id: i64,

    /// Acquire the transform lock before running
    #[serde(default)]
    pub locked_transform: bool,

    #[serde(default = "default_lock_table")]
    pub transform_lock_table: String,

    /// `local`, `git` or `http`; inferred from `repo_url` when unset
    #[serde(default)]
    pub repo_type: Option<String>,

    #[serde(default = "default_repo_base_dir")]
    pub repo_base_dir: String,

    /// Remote location for `git` and `http` repos
    #[serde(default)]
    pub repo_url: Option<String>,

    #[serde(default)]
    pub git_branch: Option<String>,

    /// `zip` to extract a downloaded archive
    #[serde(default)]
    pub compression: Option<String>,

    #[serde(default = "default_step_metadata_manager_type")]
    pub step_metadata_manager_type: String,

    #[serde(default)]
    pub step_metadata_file_path: Option<String>,

    #[serde(default = "default_steps_table")]
    pub transform_steps_table: String,

    /// Dialect name; detected from the database URL when unset
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    #[serde(default)]
    pub db_user: Option<String>,

    #[serde(default)]
    pub db_pass: Option<String>,

    /// Run as soon as the transform is constructed
    #[serde(default)]
    pub run: bool,
}

fn default_lock_table() -> String {
    "transform_lock".to_string()
}

fn default_repo_base_dir() -> String {
    ".".to_string()
}

fn default_step_metadata_manager_type() -> String {
    "local_file".to_string()
}

fn default_steps_table() -> String {
    "transform_steps".to_string()
}

fn default_database_url() -> String {
    "duckdb:memory".to_string()
}

impl TransformConfig {
    /// Load configuration from `SNEAQL_`-prefixed environment variables.
    pub fn from_env() -> SneaqlResult<Self> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<TransformConfig>()?)
    }

    /// Load configuration from explicit variables, prefix included.
    pub fn from_vars<I>(vars: I) -> SneaqlResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, TransformConfig>(vars)?)
    }

    /// The configured repo type, else the one implied by `repo_url`, else
    /// `local`.
    pub fn resolved_repo_type(&self) -> &str {
        self.repo_type
            .as_deref()
            .or_else(|| self.repo_url.as_deref().and_then(repo_type_from_url))
            .unwrap_or("local")
    }

    /// Connection parameters for the main and lock connections.
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database_url)
            .with_credentials(self.db_user.clone(), self.db_pass.clone())
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            transform_name: String::new(),
            transform_lock_id: 0,
            locked_transform: false,
            transform_lock_table: default_lock_table(),
            repo_type: None,
            repo_base_dir: default_repo_base_dir(),
            repo_url: None,
            git_branch: None,
            compression: None,
            step_metadata_manager_type: default_step_metadata_manager_type(),
            step_metadata_file_path: None,
            transform_steps_table: default_steps_table(),
            database: None,
            database_url: default_database_url(),
            db_user: None,
            db_pass: None,
            run: false,
        }
    }
}
