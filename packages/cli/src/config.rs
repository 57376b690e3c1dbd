//! Formatter option layering.
//!
//! Options are resolved from lowest to highest precedence: built-in
//! defaults, the TOML file passed with `--config`, `ADDRESS_FORMATTER_*`
//! environment variables, and finally command-line flags.

use std::path::Path;

use address_formatter_models::FormatterOptions;
use thiserror::Error;

/// Environment variable overriding `abbreviate`.
pub const ENV_ABBREVIATE: &str = "ADDRESS_FORMATTER_ABBREVIATE";
/// Environment variable overriding `append_country`.
pub const ENV_APPEND_COUNTRY: &str = "ADDRESS_FORMATTER_APPEND_COUNTRY";
/// Environment variable overriding `append_unknown`.
pub const ENV_APPEND_UNKNOWN: &str = "ADDRESS_FORMATTER_APPEND_UNKNOWN";
/// Environment variable overriding `data_dir`.
pub const ENV_DATA_DIR: &str = "ADDRESS_FORMATTER_DATA_DIR";

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Io {
        /// Config file path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`FormatterOptions`].
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Config file path.
        path: String,
        /// Parser error.
        source: toml::de::Error,
    },
}

/// Values given on the command line. `false` flags mean "not given".
#[derive(Debug, Clone, Default)]
pub struct FlagOverrides {
    pub abbreviate: bool,
    pub append_country: bool,
    pub append_unknown: bool,
    pub data_dir: Option<String>,
}

/// Reads options from a TOML file.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is unreadable or malformed.
pub fn load_file(path: &Path) -> Result<FormatterOptions, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    toml::de::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Applies environment overrides read through `lookup`.
///
/// Unrecognized boolean values are logged and ignored.
#[must_use]
pub fn apply_env<F>(mut options: FormatterOptions, lookup: F) -> FormatterOptions
where
    F: Fn(&str) -> Option<String>,
{
    let flag = |name: &str| {
        let value = lookup(name)?;
        let parsed = parse_bool(&value);
        if parsed.is_none() {
            log::warn!("Ignoring {name}={value:?}: expected true or false");
        }
        parsed
    };

    if let Some(value) = flag(ENV_ABBREVIATE) {
        options.abbreviate = value;
    }
    if let Some(value) = flag(ENV_APPEND_COUNTRY) {
        options.append_country = value;
    }
    if let Some(value) = flag(ENV_APPEND_UNKNOWN) {
        options.append_unknown = value;
    }
    if let Some(dir) = lookup(ENV_DATA_DIR).filter(|dir| !dir.is_empty()) {
        options.data_dir = Some(dir);
    }
    options
}

/// Applies command-line flags. Flags can only switch options on.
#[must_use]
pub fn apply_flags(mut options: FormatterOptions, flags: &FlagOverrides) -> FormatterOptions {
    options.abbreviate |= flags.abbreviate;
    options.append_country |= flags.append_country;
    options.append_unknown |= flags.append_unknown;
    if let Some(dir) = &flags.data_dir {
        options.data_dir = Some(dir.clone());
    }
    options
}

/// Resolves the effective options from every source.
///
/// # Errors
///
/// Returns a [`ConfigError`] if `config_file` is given but cannot be
/// loaded.
pub fn resolve(
    config_file: Option<&Path>,
    flags: &FlagOverrides,
) -> Result<FormatterOptions, ConfigError> {
    let options = match config_file {
        Some(path) => load_file(path)?,
        None => FormatterOptions::default(),
    };
    let options = apply_env(options, |name| std::env::var(name).ok());
    let options = apply_flags(options, flags);

    log::debug!("Formatter options: {options:?}");
    Ok(options)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
