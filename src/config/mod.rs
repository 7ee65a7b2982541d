//! Run options: schema, file loading and environment overrides.
//!
//! - Schema definitions in [`schema`]
//! - YAML and environment loading in [`loader`]
//!
//! # Example
//!
//! ```
//! use stepgraph::config::{apply_env_overrides, parse_options, DispatchPolicy};
//! use std::path::Path;
//!
//! let options = parse_options("suite_name: ci\ndry_run: true", Path::new("run.yml")).unwrap();
//! let options = apply_env_overrides(options, [("STEPGRAPH_DRY_RUN", "false")]).unwrap();
//!
//! assert_eq!(options.suite_name, "ci");
//! assert!(!options.dry_run);
//! assert_eq!(options.dispatch, DispatchPolicy::Once);
//! ```
//!
//! # Precedence
//!
//! 1. Defaults
//! 2. Options file (`load_options_file`)
//! 3. `STEPGRAPH_*` environment variables (`apply_env_overrides`)

pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, load_options_file, options_from_env, parse_options, ENV_DISPATCH,
    ENV_DRY_RUN, ENV_JUNIT_DIR, ENV_SUITE_NAME,
};
pub use schema::{DispatchPolicy, RunOptions};
