//! Configuration parser for loading migration configuration.
//!
//! Values come from the YAML file first, then from `CATALOG_*` environment
//! variables. Command-line flags are applied last by the binary.

use crate::error::{CatalogError, ConfigError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::{EndpointConfig, MigrateConfig};
use crate::planner::TargetState;

/// Environment variables that override file values.
pub const ENV_OVERRIDES: &[&str] = &[
    "CATALOG_APPLICATION_DOMAIN_PREFIX",
    "CATALOG_CHECKMODE",
    "CATALOG_RUN_STATE",
    "CATALOG_ABSENT_RUN_ID",
    "CATALOG_SOURCE_BASE_URL",
    "CATALOG_TARGET_BASE_URL",
];

/// Configuration parser for loading migration configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for `.env` and relative snapshot paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for `.env` lookup and relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<MigrateConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(CatalogError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            CatalogError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let mut config = self.parse_yaml(&content, Some(path))?;
        self.resolve_paths(&mut config);
        Ok(config)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<MigrateConfig> {
        debug!("Parsing YAML configuration");

        let config: MigrateConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            CatalogError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed configuration: state {}, {} included domain(s)",
            config.migrate.state,
            config.migrate.domains.include.len()
        );
        Ok(config)
    }

    /// Loads configuration and applies `CATALOG_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an override
    /// has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<MigrateConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean or state override cannot be parsed.
    pub fn apply_env_overrides(
        config: &mut MigrateConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        let migrate = &mut config.migrate;

        if let Some(prefix) = lookup("CATALOG_APPLICATION_DOMAIN_PREFIX") {
            debug!("Overriding migrate.application_domain_prefix from environment");
            migrate.application_domain_prefix = prefix;
        }

        if let Some(checkmode) = lookup("CATALOG_CHECKMODE") {
            debug!("Overriding migrate.checkmode from environment");
            migrate.checkmode = parse_bool(&checkmode).ok_or_else(|| {
                ConfigError::validation(format!("invalid boolean '{checkmode}'"), "CATALOG_CHECKMODE")
            })?;
        }

        if let Some(state) = lookup("CATALOG_RUN_STATE") {
            debug!("Overriding migrate.state from environment");
            migrate.state = parse_state(&state).ok_or_else(|| {
                ConfigError::validation(
                    format!("invalid run state '{state}', expected PRESENT or ABSENT"),
                    "CATALOG_RUN_STATE",
                )
            })?;
        }

        if let Some(run_id) = lookup("CATALOG_ABSENT_RUN_ID") {
            debug!("Overriding migrate.absent_run_id from environment");
            migrate.absent_run_id = Some(run_id);
        }

        if let Some(url) = lookup("CATALOG_SOURCE_BASE_URL") {
            debug!("Overriding source base url from environment");
            override_base_url(&mut config.source, url, "source")?;
        }

        if let Some(url) = lookup("CATALOG_TARGET_BASE_URL") {
            debug!("Overriding target base url from environment");
            override_base_url(&mut config.target, url, "target")?;
        }

        Ok(())
    }

    /// Makes snapshot paths absolute relative to the base path and expands `~/`.
    fn resolve_paths(&self, config: &mut MigrateConfig) {
        for endpoint in [&mut config.source, &mut config.target] {
            if let Some(snapshot) = &mut endpoint.snapshot {
                snapshot.path = self.resolve(&snapshot.path);
            }
        }
        config.migrate.report_dir = self.resolve(&config.migrate.report_dir);
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if let Ok(rest) = path.strip_prefix("~") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                CatalogError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Reads the API token named by a REST endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn token(token_env: &str) -> Result<String> {
        match std::env::var(token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(token),
            _ => Err(CatalogError::Config(ConfigError::MissingEnvVar {
                name: token_env.to_string(),
            })),
        }
    }
}

fn override_base_url(endpoint: &mut EndpointConfig, url: String, side: &str) -> Result<()> {
    match &mut endpoint.rest {
        Some(rest) => {
            rest.base_url = url;
            Ok(())
        }
        None => Err(ConfigError::validation(
            format!("{side} is not a REST endpoint, cannot override its base url"),
            format!("{side}.rest.base_url"),
        )
        .into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_state(value: &str) -> Option<TargetState> {
    match value.trim().to_ascii_uppercase().as_str() {
        "PRESENT" => Some(TargetState::Present),
        "ABSENT" => Some(TargetState::Absent),
        _ => None,
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["catalog.migrate.yaml", "catalog.migrate.yml", "migrate.yaml"];

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(CatalogError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const FULL: &str = r"
source:
  rest:
    base_url: https://source.example.com
    token_env: SOURCE_TOKEN
target:
  snapshot:
    path: target.json
migrate:
  state: PRESENT
  application_domain_prefix: 'copy/'
  domains:
    include: [Acme Rideshare]
  objects:
    exclude: [Legacy]
  page_size: 50
logger:
  level: debug
  format: json
";

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
source:
  snapshot:
    path: source.json
target:
  snapshot:
    path: target.json
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(config.migrate.state, TargetState::Present);
        assert!(!config.migrate.checkmode);
        assert_eq!(config.migrate.max_absent_passes, 10);
        assert_eq!(config.logger.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let config = ConfigParser::new().parse_yaml(FULL, None).unwrap();
        let rest = config.source.rest.as_ref().unwrap();
        assert_eq!(rest.base_url, "https://source.example.com");
        assert_eq!(rest.timeout_secs, 30);
        assert_eq!(config.migrate.application_domain_prefix, "copy/");
        assert_eq!(config.migrate.domains.include, vec![String::from("Acme Rideshare")]);
        assert_eq!(config.migrate.objects.exclude, vec![String::from("Legacy")]);
        assert_eq!(config.migrate.page_size, 50);
        assert_eq!(config.logger.format, super::super::spec::LogFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(FULL, None).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("CATALOG_CHECKMODE", "yes"),
            ("CATALOG_RUN_STATE", "absent"),
            ("CATALOG_ABSENT_RUN_ID", "2026_01_02_03_04_05_006"),
            ("CATALOG_SOURCE_BASE_URL", "https://other.example.com"),
        ]);

        ConfigParser::apply_env_overrides(&mut config, |k| env.get(k).map(|v| (*v).to_string())).unwrap();

        assert!(config.migrate.checkmode);
        assert_eq!(config.migrate.state, TargetState::Absent);
        assert_eq!(config.migrate.absent_run_id.as_deref(), Some("2026_01_02_03_04_05_006"));
        assert_eq!(config.source.rest.unwrap().base_url, "https://other.example.com");
    }

    #[test]
    fn test_env_override_errors() {
        let mut config = ConfigParser::new().parse_yaml(FULL, None).unwrap();
        let bad_bool = ConfigParser::apply_env_overrides(&mut config, |k| {
            (k == "CATALOG_CHECKMODE").then(|| String::from("maybe"))
        });
        assert!(bad_bool.is_err());

        let snapshot_url = ConfigParser::apply_env_overrides(&mut config, |k| {
            (k == "CATALOG_TARGET_BASE_URL").then(|| String::from("https://x.example.com"))
        });
        assert!(snapshot_url.is_err());
    }

    #[test]
    fn test_load_and_find_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("catalog.migrate.yaml"), FULL).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("catalog.migrate.yaml"));

        let config = ConfigParser::new()
            .with_base_path(dir.path())
            .load_file(&found)
            .unwrap();
        assert_eq!(
            config.target.snapshot.unwrap().path,
            dir.path().join("target.json")
        );
        assert_eq!(config.migrate.report_dir, dir.path().join(crate::session::DEFAULT_REPORT_DIR));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigParser::new().load_file("/nonexistent/catalog.migrate.yaml").unwrap_err();
        assert!(matches!(err, CatalogError::Config(ConfigError::FileNotFound { .. })));
    }
}
