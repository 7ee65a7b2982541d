//! Options loading from files and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::RunOptions;
use crate::error::{Result, StepGraphError};

/// Overrides [`RunOptions::suite_name`].
pub const ENV_SUITE_NAME: &str = "STEPGRAPH_SUITE_NAME";
/// Overrides [`RunOptions::dry_run`].
pub const ENV_DRY_RUN: &str = "STEPGRAPH_DRY_RUN";
/// Overrides [`RunOptions::dispatch`].
pub const ENV_DISPATCH: &str = "STEPGRAPH_DISPATCH";
/// Overrides [`RunOptions::junit_dir`].
pub const ENV_JUNIT_DIR: &str = "STEPGRAPH_JUNIT_DIR";

/// Load a YAML options file.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_options_file(path: &Path) -> Result<RunOptions> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StepGraphError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            StepGraphError::Io(e)
        }
    })?;

    parse_options(&content, path)
}

/// Parse YAML content into RunOptions.
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_options(content: &str, source_path: &Path) -> Result<RunOptions> {
    if content.trim().is_empty() {
        return Ok(RunOptions::default());
    }

    serde_yaml::from_str(content).map_err(|e| StepGraphError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Apply `STEPGRAPH_*` variables from `vars` on top of `options`.
///
/// Unrelated variables are ignored. Empty values leave the option as is.
pub fn apply_env_overrides<I, K, V>(mut options: RunOptions, vars: I) -> Result<RunOptions>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    for (key, value) in vars {
        let value = value.as_ref().trim();
        if value.is_empty() {
            continue;
        }

        match key.as_ref() {
            ENV_SUITE_NAME => options.suite_name = value.to_string(),
            ENV_DRY_RUN => options.dry_run = parse_bool(ENV_DRY_RUN, value)?,
            ENV_DISPATCH => options.dispatch = value.parse()?,
            ENV_JUNIT_DIR => options.junit_dir = Some(PathBuf::from(value)),
            _ => {}
        }
    }

    Ok(options)
}

/// Default options with the process environment applied.
pub fn options_from_env() -> Result<RunOptions> {
    apply_env_overrides(RunOptions::default(), std::env::vars())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StepGraphError::ConfigValidationError {
            message: format!("{} must be a boolean, got '{}'", key, value),
        }),
    }
}
