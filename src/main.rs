//! catalogctl entrypoint.
//!
//! This is the main entrypoint for the catalogctl command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use catalog_reconcile::catalog::{InMemoryCatalog, ObjectClient, RestCatalogClient};
use catalog_reconcile::cli::{Cli, Commands, LogFormatArg, OutputFormatter};
use catalog_reconcile::config::{
    find_config_file, ConfigHasher, ConfigParser, ConfigValidator, Endpoint, EndpointConfig,
    LogFormat, LoggerConfig, MigrateConfig,
};
use catalog_reconcile::error::{CatalogError, ConfigError, MigrationError, Result};
use catalog_reconcile::migrator::{MigrateOptions, Migrator};
use catalog_reconcile::planner::TargetState;
use catalog_reconcile::session::{RunReport, RunReportStore, RunSession, DEFAULT_REPORT_DIR};

use chrono::Utc;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let logger = peek_logger_config(cli.config.as_ref());
    init_logging(cli.verbose, cli.log_format, &logger);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: Option<LogFormatArg>, logger: &LoggerConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logger.level))
    };

    let json = match format {
        Some(LogFormatArg::Json) => true,
        Some(LogFormatArg::Text) => false,
        None => logger.format == LogFormat::Json,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Reads the `logger` section if a configuration file can be found.
fn peek_logger_config(config_path: Option<&PathBuf>) -> LoggerConfig {
    resolve_config_path(config_path)
        .and_then(|path| ConfigParser::new().load_file(path))
        .map(|config| config.logger)
        .unwrap_or_default()
}

/// Main async entry point. Returns false when the run recorded issues.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Migrate {
            checkmode,
            include,
            exclude,
            prefix,
            run_id,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            let migrate = &mut config.migrate;
            migrate.state = TargetState::Present;
            migrate.checkmode |= checkmode;
            if !include.is_empty() {
                migrate.domains.include = include;
            }
            migrate.domains.exclude.extend(exclude);
            if let Some(prefix) = prefix {
                migrate.application_domain_prefix = prefix;
            }
            validate_config(&config)?;
            cmd_migrate(&config, run_id, cli.verbose, &formatter).await
        }
        Commands::Absent {
            run_id,
            prefix,
            checkmode,
            max_passes,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            let migrate = &mut config.migrate;
            migrate.state = TargetState::Absent;
            migrate.checkmode |= checkmode;
            if run_id.is_some() || prefix.is_some() {
                migrate.absent_run_id = run_id;
                migrate.absent_prefix = prefix;
            }
            if let Some(max_passes) = max_passes {
                migrate.max_absent_passes = max_passes;
            }
            validate_config(&config)?;
            cmd_absent(&config, cli.verbose, &formatter).await
        }
        Commands::Report { run_id } => cmd_report(cli.config.as_ref(), run_id, cli.verbose, &formatter).await,
    }
}

/// Validate configuration.
fn cmd_validate(config_path: Option<&PathBuf>, show_warnings: bool, formatter: &OutputFormatter) -> Result<bool> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    println!("{}", formatter.format_validation(&config, &result, show_warnings));
    Ok(true)
}

/// Migrate application domains (PRESENT).
async fn cmd_migrate(
    config: &MigrateConfig,
    run_id: Option<String>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let source = open_catalog(&config.source, false).await?;
    let target = open_catalog(&config.target, true).await?;
    let options = migrate_options(config);
    let checkmode = options.checkmode;

    let mut session = run_id.map_or_else(RunSession::generated, RunSession::new);
    let started_at = Utc::now();
    info!("Run id: {}", session.run_id());

    let migrator = Migrator::new(source.client(), target.client(), options);
    let outcome = migrator.run_present(&mut session).await;

    finish(config, &target, &session, TargetState::Present, checkmode, started_at, detailed, formatter)
        .await?;
    outcome?;
    Ok(session.issues().is_empty())
}

/// Remove objects by run id or domains by prefix (ABSENT).
async fn cmd_absent(config: &MigrateConfig, detailed: bool, formatter: &OutputFormatter) -> Result<bool> {
    let source = open_catalog(&config.source, false).await?;
    let target = open_catalog(&config.target, true).await?;
    let options = migrate_options(config);
    let checkmode = options.checkmode;

    let mut session = RunSession::generated();
    let started_at = Utc::now();
    let migrator = Migrator::new(source.client(), target.client(), options);

    let outcome = match (&config.migrate.absent_run_id, &config.migrate.absent_prefix) {
        (Some(run_id), _) => migrator.run_absent_by_run_id(&mut session, run_id).await,
        (None, Some(prefix)) => migrator.run_absent_by_prefix(&mut session, prefix).await,
        (None, None) => Err(ConfigError::validation_general("ABSENT needs a run id or a prefix").into()),
    };

    finish(config, &target, &session, TargetState::Absent, checkmode, started_at, detailed, formatter)
        .await?;
    outcome?;
    Ok(session.issues().is_empty())
}

/// Show a stored report or list stored reports.
async fn cmd_report(
    config_path: Option<&PathBuf>,
    run_id: Option<String>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let report_dir = resolve_config_path(config_path)
        .and_then(|path| parser_for(&path).load_file(&path))
        .map_or_else(|_| PathBuf::from(DEFAULT_REPORT_DIR), |config| config.migrate.report_dir);
    let store = RunReportStore::new(report_dir);

    match run_id {
        Some(run_id) => {
            let report = store.load(&run_id).await?.ok_or_else(|| {
                CatalogError::from(MigrationError::Report {
                    message: format!("no report for run {run_id} in {}", store.dir().display()),
                })
            })?;
            println!("{}", formatter.format_report(&report, detailed));
            Ok(report.is_success())
        }
        None => {
            let run_ids = store.list().await?;
            println!("{}", formatter.format_report_list(&run_ids));
            Ok(true)
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// An opened catalog endpoint.
enum OpenedCatalog {
    Rest(RestCatalogClient),
    Snapshot { catalog: InMemoryCatalog, path: PathBuf },
}

impl OpenedCatalog {
    fn client(&self) -> &dyn ObjectClient {
        match self {
            Self::Rest(client) => client,
            Self::Snapshot { catalog, .. } => catalog,
        }
    }

    /// Writes snapshot catalogs back to their file.
    async fn persist(&self) -> Result<()> {
        match self {
            Self::Rest(_) => Ok(()),
            Self::Snapshot { catalog, path } => catalog.save(path).await,
        }
    }
}

/// Opens an endpoint. A missing target snapshot starts empty.
async fn open_catalog(endpoint: &EndpointConfig, is_target: bool) -> Result<OpenedCatalog> {
    match endpoint.endpoint() {
        Some(Endpoint::Rest(rest)) => {
            let token = ConfigParser::token(&rest.token_env)?;
            let client = RestCatalogClient::with_timeout(&rest.base_url, &token, rest.timeout_secs)?;
            Ok(OpenedCatalog::Rest(client))
        }
        Some(Endpoint::Snapshot(snapshot)) => {
            let catalog = if is_target && !snapshot.path.exists() {
                warn!("Target snapshot {} does not exist, starting empty", snapshot.path.display());
                InMemoryCatalog::new()
            } else {
                InMemoryCatalog::load(&snapshot.path).await?
            };
            Ok(OpenedCatalog::Snapshot {
                catalog,
                path: snapshot.path.clone(),
            })
        }
        None => Err(ConfigError::validation_general("endpoint needs exactly one of 'rest' or 'snapshot'").into()),
    }
}

/// Persists the target, writes the run report and prints it.
#[allow(clippy::too_many_arguments)]
async fn finish(
    config: &MigrateConfig,
    target: &OpenedCatalog,
    session: &RunSession,
    state: TargetState,
    checkmode: bool,
    started_at: chrono::DateTime<Utc>,
    detailed: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    if checkmode {
        debug!("Checkmode: target left untouched");
    } else {
        target.persist().await?;
    }

    let fingerprint = ConfigHasher::new().hash_config(config);
    let report = RunReport::from_session(session, state, checkmode, started_at).with_fingerprint(fingerprint);
    let path = RunReportStore::new(config.migrate.report_dir.clone()).save(&report).await?;
    info!("Run report written to {}", path.display());

    println!("{}", formatter.format_report(&report, detailed));
    Ok(())
}

fn migrate_options(config: &MigrateConfig) -> MigrateOptions {
    let migrate = &config.migrate;
    MigrateOptions {
        application_domain_prefix: migrate.application_domain_prefix.clone(),
        checkmode: migrate.checkmode,
        domains: migrate.domains.clone(),
        objects: migrate.objects.clone(),
        page_size: migrate.page_size,
        max_absent_passes: migrate.max_absent_passes,
        pass_delay: Duration::from_secs(migrate.pass_delay_secs),
    }
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads configuration, `.env` and environment overrides included.
fn load_config(config_path: Option<&PathBuf>) -> Result<MigrateConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    parser.load_with_env(&config_file)
}

/// Validates the final configuration, after command-line overrides.
fn validate_config(config: &MigrateConfig) -> Result<()> {
    let result = ConfigValidator::new().validate(config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }
    Ok(())
}
