//! Configuration fingerprints.
//!
//! The fingerprint covers the migration scope only: endpoints, state, prefix
//! and filters. Logging and paging settings do not change what a run does,
//! so two reports with the same fingerprint describe comparable runs.

use sha2::{Digest, Sha256};

use super::spec::{EndpointConfig, MigrateConfig};
use crate::migrator::NameFilter;

/// Hasher for computing configuration fingerprints.
#[derive(Debug, Default)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a migration configuration.
    #[must_use]
    pub fn hash_config(&self, config: &MigrateConfig) -> String {
        let mut hasher = Sha256::new();
        let migrate = &config.migrate;

        update_field(&mut hasher, "source", &endpoint_key(&config.source));
        update_field(&mut hasher, "target", &endpoint_key(&config.target));
        update_field(&mut hasher, "state", &migrate.state.to_string());
        update_field(&mut hasher, "prefix", &migrate.application_domain_prefix);
        update_field(&mut hasher, "checkmode", if migrate.checkmode { "1" } else { "0" });
        update_filter(&mut hasher, "domains", &migrate.domains);
        update_filter(&mut hasher, "objects", &migrate.objects);
        if let Some(run_id) = &migrate.absent_run_id {
            update_field(&mut hasher, "absent_run_id", run_id);
        }
        if let Some(prefix) = &migrate.absent_prefix {
            update_field(&mut hasher, "absent_prefix", prefix);
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}

fn endpoint_key(endpoint: &EndpointConfig) -> String {
    match (&endpoint.rest, &endpoint.snapshot) {
        (Some(_), _) => format!("rest:{}", endpoint.locator()),
        (None, Some(_)) => format!("snapshot:{}", endpoint.locator()),
        (None, None) => String::new(),
    }
}

/// Length-prefixed so adjacent fields cannot run into each other.
fn update_field(hasher: &mut Sha256, name: &str, value: &str) {
    hasher.update(name.as_bytes());
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

fn update_filter(hasher: &mut Sha256, name: &str, filter: &NameFilter) {
    // order of names does not change the selection
    let mut include: Vec<&str> = filter.include.iter().map(String::as_str).collect();
    let mut exclude: Vec<&str> = filter.exclude.iter().map(String::as_str).collect();
    include.sort_unstable();
    exclude.sort_unstable();
    update_field(hasher, &format!("{name}.include"), &include.join("\n"));
    update_field(hasher, &format!("{name}.exclude"), &exclude.join("\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn config() -> MigrateConfig {
        ConfigParser::new()
            .parse_yaml(
                r"
source:
  rest:
    base_url: https://source.example.com
    token_env: SOURCE_TOKEN
target:
  snapshot:
    path: target.json
migrate:
  domains:
    include: [Acme Rideshare, Nils Rideshare]
",
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_hash_deterministic() {
        let hasher = ConfigHasher::new();
        assert_eq!(hasher.hash_config(&config()), hasher.hash_config(&config()));
        assert_eq!(hasher.hash_config(&config()).len(), 64);
    }

    #[test]
    fn test_scope_changes_hash() {
        let hasher = ConfigHasher::new();
        let base = hasher.hash_config(&config());

        let mut prefixed = config();
        prefixed.migrate.application_domain_prefix = String::from("copy/");
        assert_ne!(hasher.hash_config(&prefixed), base);

        let mut checkmode = config();
        checkmode.migrate.checkmode = true;
        assert_ne!(hasher.hash_config(&checkmode), base);
    }

    #[test]
    fn test_non_scope_settings_keep_hash() {
        let hasher = ConfigHasher::new();
        let base = hasher.hash_config(&config());

        let mut other = config();
        other.migrate.page_size = 7;
        other.logger.level = String::from("trace");
        other.migrate.domains.include.reverse();
        assert_eq!(hasher.hash_config(&other), base);
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let short = hasher.short_hash("abcdef1234567890abcdef1234567890");
        assert_eq!(short, "abcdef12");
    }
}
