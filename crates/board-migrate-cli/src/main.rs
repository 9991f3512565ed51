//! board-migrate CLI - schema migrations and cross-engine data migration.

use std::path::PathBuf;
use std::process::ExitCode;

use board_migrate::orchestrator::ensure_database_exists;
use board_migrate::{
    Config, DatabaseConfig, Driver, MigrateError, MigrationOptions, Migrator, Orchestrator,
    PoolImpl,
};
use clap::{ArgAction, Parser, ValueEnum};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

/// Exit code of runs stopped by the error ceiling.
const EXIT_ABORTED: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Op {
    /// Apply all pending schema migrations
    Up,
    /// Roll back the latest applied schema migration
    Down,
    /// List schema migrations and whether they are applied
    Status,
    /// Drop every table and re-apply all schema migrations
    Purge,
    /// Copy all data from the source database to the target database
    DataMigrate,
}

#[derive(Parser, Debug)]
#[command(name = "board-migrate")]
#[command(about = "Board schema migrations and cross-database data migration")]
#[command(version)]
struct Cli {
    /// Source database driver: postgres, mysql, sqlite
    #[arg(long)]
    source_driver: Option<String>,

    /// Target database driver: postgres, mysql, sqlite
    #[arg(long)]
    target_driver: Option<String>,

    /// Env file with the source connection [default: .env]
    #[arg(long)]
    source_env: Option<PathBuf>,

    /// Env file with the target connection [default: the source env file]
    #[arg(long)]
    target_env: Option<PathBuf>,

    /// Operation to run
    #[arg(long, value_enum, default_value = "up")]
    op: Op,

    /// YAML configuration file (replaces the env files and migration flags)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rows fetched per batch
    #[arg(long, default_value = "1000")]
    batch_size: usize,

    /// Comma-separated tables to skip
    #[arg(long, value_delimiter = ',')]
    skip_tables: Vec<String>,

    /// Copy only board tables
    #[arg(long)]
    dynamic_only: bool,

    /// Copy only fixed tables
    #[arg(long)]
    basic_only: bool,

    /// Copy tables of inactive boards
    #[arg(long, action = ArgAction::Set, num_args = 0..=1, default_value = "true", default_missing_value = "true")]
    include_inactive: bool,

    /// Copy data without synchronizing the schema first
    #[arg(long)]
    data_only: bool,

    /// Synchronize the schema without copying data
    #[arg(long)]
    schema_only: bool,

    /// Never wrap batches in transactions
    #[arg(long)]
    disable_transactions: bool,

    /// Abort once more errors than this accumulate
    #[arg(long, default_value = "10")]
    max_errors: usize,

    /// Decode base64-looking text values before writing them
    #[arg(long)]
    decode_base64: bool,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,
}

impl Cli {
    fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            batch_size: self.batch_size,
            skip_tables: self
                .skip_tables
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            dynamic_only: self.dynamic_only,
            basic_only: self.basic_only,
            include_inactive: self.include_inactive,
            data_only: self.data_only,
            schema_only: self.schema_only,
            use_transactions: !self.disable_transactions,
            max_errors: self.max_errors,
            decode_base64: self.decode_base64,
            ..MigrationOptions::default()
        }
    }

    /// Resolve the run configuration from `--config` or the env files.
    fn load_config(&self) -> Result<Config, MigrateError> {
        if let Some(path) = &self.config {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            return Ok(config);
        }

        let source_driver = parse_driver(self.source_driver.as_deref())?;
        let target_driver = parse_driver(self.target_driver.as_deref())?;

        let target = if self.op == Op::DataMigrate {
            if source_driver.is_none() || target_driver.is_none() {
                return Err(MigrateError::Config(
                    "data-migrate requires --source-driver and --target-driver".into(),
                ));
            }
            let env = self.target_env.as_deref().or(self.source_env.as_deref());
            Some(DatabaseConfig::from_env_file(env, target_driver)?)
        } else {
            None
        };

        let config = Config {
            source: DatabaseConfig::from_env_file(self.source_env.as_deref(), source_driver)?,
            target,
            migration: self.migration_options(),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_driver(name: Option<&str>) -> Result<Option<Driver>, MigrateError> {
    name.map(str::parse::<Driver>).transpose()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.verbosity, &cli.log_format) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, MigrateError> {
    let config = cli.load_config()?;

    match cli.op {
        Op::DataMigrate => {
            let report = Orchestrator::from_config(&config)?.run().await?;
            if cli.output_json {
                println!("{}", report.to_json()?);
            } else {
                print!("{}", report.summary());
            }
            if report.is_completed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_ABORTED))
            }
        }
        op => {
            run_schema_op(op, &config.source, cli.output_json).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Versioned schema operations against the source database.
async fn run_schema_op(op: Op, db: &DatabaseConfig, output_json: bool) -> Result<(), MigrateError> {
    if matches!(op, Op::Up | Op::Purge) {
        ensure_database_exists(db).await?;
    }
    let pool = PoolImpl::connect(db, true).await?;
    let result = schema_op_on_pool(op, &pool, output_json).await;
    pool.close().await;
    result
}

async fn schema_op_on_pool(op: Op, pool: &PoolImpl, output_json: bool) -> Result<(), MigrateError> {
    let mut session = pool.session().await?;
    let mut migrator = Migrator::new(&mut *session)?;

    match op {
        Op::Up => {
            let applied = migrator.up().await?;
            println!("Applied {} migrations", applied);
        }
        Op::Down => match migrator.down().await? {
            Some(version) => println!("Rolled back version {}", version),
            None => println!("No applied migrations to roll back"),
        },
        Op::Status => {
            let status = migrator.status().await?;
            if output_json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{:<10} {:<8} NAME", "VERSION", "APPLIED");
                for entry in &status {
                    println!(
                        "{:<10} {:<8} {}",
                        entry.version,
                        if entry.applied { "yes" } else { "no" },
                        entry.name
                    );
                }
            }
        }
        Op::Purge => {
            let applied = migrator.purge().await?;
            println!("Purged database and applied {} migrations", applied);
        }
        Op::DataMigrate => unreachable!("data-migrate is not a schema operation"),
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
