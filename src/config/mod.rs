//! Configuration for migration runs.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `catalog.migrate.yaml` and applying `CATALOG_*` overrides
//! - Validation of field values and cross-field rules
//! - Fingerprinting the migration scope for run reports

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::ConfigHasher;
pub use parser::{find_config_file, ConfigParser, DEFAULT_CONFIG_FILES, ENV_OVERRIDES};
pub use spec::{
    Endpoint, EndpointConfig, LogFormat, LoggerConfig, MigrateConfig, MigrateSection, RestEndpoint,
    SnapshotEndpoint,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
