use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sneaql_core::{Registry, Transform, TransformConfig, TransformStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sneaql")]
#[command(version, about = "SneaQL transform runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and parse every step without touching the database
    Validate(TransformArgs),

    /// Validate, then execute every step in order
    ///
    /// Examples:
    ///     sneaql run --transform-name nightly --repo-base-dir ./steps \
    ///         --step-metadata-file-path ./steps/steps.json
    ///     SNEAQL_DATABASE_URL=postgres://localhost/dw sneaql run --transform-name nightly
    #[command(verbatim_doc_comment)]
    Run(TransformArgs),
}

/// Overrides for `SNEAQL_*` environment configuration.
#[derive(Args, Debug, Default)]
struct TransformArgs {
    /// Transform name
    #[arg(short = 'n', long)]
    transform_name: Option<String>,

    /// Lock holder id
    #[arg(long)]
    lock_id: Option<i64>,

    /// Acquire the transform lock before running
    #[arg(long)]
    locked: bool,

    #[arg(long)]
    lock_table: Option<String>,

    /// Repository type: local, git, http (inferred from --repo-url when omitted)
    #[arg(long)]
    repo_type: Option<String>,

    #[arg(long)]
    repo_base_dir: Option<String>,

    #[arg(long)]
    repo_url: Option<String>,

    #[arg(long)]
    git_branch: Option<String>,

    /// Archive format of an http repo (zip)
    #[arg(long)]
    compression: Option<String>,

    /// Step metadata source: local_file, transform_steps_table
    #[arg(long)]
    step_metadata_manager_type: Option<String>,

    #[arg(long)]
    step_metadata_file_path: Option<String>,

    #[arg(long)]
    steps_table: Option<String>,

    /// Dialect name (detected from the URL when omitted)
    #[arg(long)]
    database: Option<String>,

    /// Connection URL, e.g. duckdb:memory or postgres://host/db
    #[arg(short = 'd', long)]
    database_url: Option<String>,

    #[arg(long)]
    db_user: Option<String>,

    #[arg(long)]
    db_pass: Option<String>,
}

impl TransformArgs {
    fn apply(self, mut config: TransformConfig) -> TransformConfig {
        if let Some(v) = self.transform_name {
            config.transform_name = v;
        }
        if let Some(v) = self.lock_id {
            config.transform_lock_id = v;
        }
        if self.locked {
            config.locked_transform = true;
        }
        if let Some(v) = self.lock_table {
            config.transform_lock_table = v;
        }
        if self.repo_type.is_some() {
            config.repo_type = self.repo_type;
        }
        if let Some(v) = self.repo_base_dir {
            config.repo_base_dir = v;
        }
        if self.repo_url.is_some() {
            config.repo_url = self.repo_url;
        }
        if self.git_branch.is_some() {
            config.git_branch = self.git_branch;
        }
        if self.compression.is_some() {
            config.compression = self.compression;
        }
        if let Some(v) = self.step_metadata_manager_type {
            config.step_metadata_manager_type = v;
        }
        if self.step_metadata_file_path.is_some() {
            config.step_metadata_file_path = self.step_metadata_file_path;
        }
        if let Some(v) = self.steps_table {
            config.transform_steps_table = v;
        }
        if self.database.is_some() {
            config.database = self.database;
        }
        if let Some(v) = self.database_url {
            config.database_url = v;
        }
        if self.db_user.is_some() {
            config.db_user = self.db_user;
        }
        if self.db_pass.is_some() {
            config.db_pass = self.db_pass;
        }
        // the subcommand decides when to run
        config.run = false;
        config
    }
}

/// Initialize tracing/logging.
fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sneaql_core=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.json);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting SneaQL");

    let base = TransformConfig::from_env().context("Failed to load SNEAQL_ configuration")?;
    let (args, validate_only) = match cli.command {
        Commands::Validate(args) => (args, true),
        Commands::Run(args) => (args, false),
    };
    let config = args.apply(base);
    if config.transform_name.is_empty() {
        anyhow::bail!("transform name is required (--transform-name or SNEAQL_TRANSFORM_NAME)");
    }

    let mut transform = Transform::new(config, Arc::new(Registry::with_builtins()));
    let status = if validate_only {
        transform.validate()
    } else {
        transform.run()
    };
    if status == TransformStatus::Error {
        if let Some(e) = transform.transform_error() {
            eprintln!("sneaql: {}", e);
        }
    }

    std::process::exit(transform.exit_code());
}
