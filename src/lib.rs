// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Catalog Reconcile
//!
//! Declarative, idempotent reconciliation of versioned catalog objects, and a
//! migrator that copies application domains between two catalogs.
//!
//! ## Overview
//!
//! Every object kind (application domains, enums, schemas, events,
//! applications, event APIs and their versions) is driven by a task that is
//! given a target state:
//!
//! - **PRESENT**: create the object if it is missing, update it if mutable
//!   fields differ, leave it alone otherwise
//! - **ABSENT**: delete the object if it exists
//!
//! Version kinds are append-only: a change creates a new version chosen by a
//! version strategy (`EXACT`, `BUMP_MINOR`, `BUMP_PATCH`). In checkmode every
//! task reports what it would do (`WOULD_CREATE`, `WOULD_UPDATE`, ...) without
//! touching the catalog.
//!
//! ## Modules
//!
//! - [`planner`]: Diff engine, version policy and the decision table
//! - [`catalog`]: Object model, the `ObjectClient` facade, REST and in-memory catalogs
//! - [`tasks`]: Object and version tasks, one type per kind
//! - [`session`]: Run session, summary log, issues and run reports
//! - [`migrator`]: PRESENT and ABSENT migration passes
//! - [`config`]: Configuration parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! source:
//!   rest:
//!     base_url: https://api.source.example.com
//!     token_env: SOURCE_TOKEN
//! target:
//!   rest:
//!     base_url: https://api.target.example.com
//!     token_env: TARGET_TOKEN
//! migrate:
//!   application_domain_prefix: "copy/"
//!   domains:
//!     include: ["Acme Rideshare"]
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod migrator;
pub mod planner;
pub mod session;
pub mod tasks;

// ============================================================================
// Re-exports
// ============================================================================

pub use catalog::{CatalogObject, InMemoryCatalog, ObjectClient, ObjectKind, RestCatalogClient};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, MigrateConfig};
pub use error::{CatalogError, ErrorKind, Result};
pub use migrator::{MigrateOptions, Migrator, NameFilter};
pub use planner::{DiffEngine, TargetState, TaskAction, VersionPolicy, VersionStrategy};
pub use session::{RunReport, RunReportStore, RunSession};
pub use tasks::{ObjectTask, TaskOutcome, VersionTask};
