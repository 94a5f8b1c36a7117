//! Configuration validation.
//!
//! Field constraints come from the `validator` derive on the config types;
//! the rules that span several fields are checked here.

use crate::error::{CatalogError, ConfigError, Result};
use crate::planner::TargetState;
use tracing::debug;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::spec::{EndpointConfig, MigrateConfig};

/// Validator for migration configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a migration configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found.
    pub fn validate(&self, config: &MigrateConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        if let Err(errors) = config.validate() {
            collect_field_errors("", &errors, &mut result);
        }
        Self::validate_endpoints(config, &mut result);
        Self::validate_migrate(config, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(CatalogError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_endpoints(config: &MigrateConfig, result: &mut ValidationResult) {
        for (field, endpoint) in [("source", &config.source), ("target", &config.target)] {
            if endpoint.endpoint().is_none() {
                result.error(field, format!("{field} needs exactly one of 'rest' or 'snapshot'"));
            }
            if let Some(rest) = &endpoint.rest {
                if std::env::var(&rest.token_env).is_err() {
                    result
                        .warnings
                        .push(format!("{field}: token variable {} is not set", rest.token_env));
                }
            }
        }

        if is_same(&config.source, &config.target) {
            result.error("target", "source and target must be different catalogs");
        }
    }

    fn validate_migrate(config: &MigrateConfig, result: &mut ValidationResult) {
        let migrate = &config.migrate;

        match migrate.state {
            TargetState::Absent => {
                if migrate.absent_run_id.is_none() && migrate.absent_prefix.is_none() {
                    result.error(
                        "migrate.absent_run_id",
                        "state ABSENT needs absent_run_id or absent_prefix",
                    );
                }
                if migrate.absent_run_id.is_some() && migrate.absent_prefix.is_some() {
                    result.error(
                        "migrate.absent_prefix",
                        "absent_run_id and absent_prefix are mutually exclusive",
                    );
                }
            }
            TargetState::Present => {
                if migrate.absent_run_id.is_some() || migrate.absent_prefix.is_some() {
                    result
                        .warnings
                        .push(String::from("absent_run_id and absent_prefix are ignored with state PRESENT"));
                }
            }
        }

        if let Some(prefix) = &migrate.absent_prefix {
            if prefix.trim().chars().count() < 2 {
                result.error("migrate.absent_prefix", "prefix must have at least 2 characters");
            }
        }

        for name in &migrate.domains.include {
            if migrate.domains.exclude.contains(name) {
                result.warnings.push(format!("domain '{name}' is both included and excluded"));
            }
        }

        if migrate.application_domain_prefix.is_empty() && is_rest(&config.target) {
            result.warnings.push(String::from(
                "no application_domain_prefix: target domains get the source names",
            ));
        }
    }
}

fn is_rest(endpoint: &EndpointConfig) -> bool {
    endpoint.rest.is_some()
}

fn is_same(a: &EndpointConfig, b: &EndpointConfig) -> bool {
    let (a, b) = (a.locator(), b.locator());
    !a.is_empty() && a == b
}

/// Flattens derive errors into `field: message` entries.
fn collect_field_errors(prefix: &str, errors: &ValidationErrors, result: &mut ValidationResult) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for error in list {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| format!("invalid value ({})", error.code), ToString::to_string);
                    result.error(path.clone(), format!("{path}: {message}"));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect_field_errors(&path, inner, result),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_field_errors(&format!("{path}[{index}]"), inner, result);
                }
            }
        }
    }
}
