//! Path provisioning: coercing raw path input into an absolute, expanded,
//! resolved form that the rest of the crate can rely on.

use crate::core::error::CoreError;
use std::fs;
use std::path::{Path, PathBuf};

/// A path as handed in by a caller, before provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPath {
    /// Free-form text, typically from the command line or a config file.
    Text(String),
    /// An already structured path value.
    Structured(PathBuf),
}

impl From<&str> for RawPath {
    fn from(value: &str) -> Self {
        RawPath::Text(value.to_string())
    }
}

impl From<String> for RawPath {
    fn from(value: String) -> Self {
        RawPath::Text(value)
    }
}

impl From<PathBuf> for RawPath {
    fn from(value: PathBuf) -> Self {
        RawPath::Structured(value)
    }
}

impl From<&PathBuf> for RawPath {
    fn from(value: &PathBuf) -> Self {
        RawPath::Structured(value.clone())
    }
}

impl From<&Path> for RawPath {
    fn from(value: &Path) -> Self {
        RawPath::Structured(value.to_path_buf())
    }
}

/// Switches for the individual provisioning steps. Everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Replace a leading `~` with the user's home directory.
    pub expand: bool,
    /// Make the path absolute and resolve symlinks where possible.
    pub resolve: bool,
    /// Accept [`RawPath::Text`] input and convert it into a path.
    pub convert: bool,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            expand: true,
            resolve: true,
            convert: true,
        }
    }
}

/// Provisions a path according to `options`.
///
/// Existence is not checked here; see [`check_path`], [`check_file`] and
/// [`check_directory`] for that.
pub fn provision(path: impl Into<RawPath>, options: ProvisionOptions) -> Result<PathBuf, CoreError> {
    let mut path = match path.into() {
        RawPath::Structured(path) => path,
        RawPath::Text(text) if !options.convert => {
            return Err(CoreError::InvalidPath(format!(
                "{text} (conversion from text is disabled)"
            )));
        }
        RawPath::Text(text) if text.trim().is_empty() => {
            return Err(CoreError::InvalidPath("empty path".to_string()));
        }
        RawPath::Text(text) => PathBuf::from(text),
    };

    if options.expand {
        path = expand_home(path);
    }

    if options.resolve {
        path = resolve(path)?;
    }

    Ok(path)
}

/// Provisions a path with every step enabled.
pub fn provision_default(path: impl Into<RawPath>) -> Result<PathBuf, CoreError> {
    provision(path, ProvisionOptions::default())
}

/// Provisions every path in `paths`, stopping at the first failure.
pub fn provision_all<I, P>(paths: I) -> Result<Vec<PathBuf>, CoreError>
where
    I: IntoIterator<Item = P>,
    P: Into<RawPath>,
{
    paths.into_iter().map(provision_default).collect()
}

/// Returns whether the provisioned path exists.
///
/// Unlike [`check_file`] and [`check_directory`], a provisioning failure is
/// returned to the caller instead of being reported as `false`.
pub fn check_path(path: impl Into<RawPath>, options: ProvisionOptions) -> Result<bool, CoreError> {
    Ok(provision(path, options)?.exists())
}

/// Returns `true` only if the path provisions and points at a directory.
pub fn check_directory(path: impl Into<RawPath>, options: ProvisionOptions) -> bool {
    provision(path, options).is_ok_and(|p| p.is_dir())
}

/// Returns `true` only if the path provisions and points at a regular file.
pub fn check_file(path: impl Into<RawPath>, options: ProvisionOptions) -> bool {
    provision(path, options).is_ok_and(|p| p.is_file())
}

fn expand_home(path: PathBuf) -> PathBuf {
    let expanded = match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) if rest.as_os_str().is_empty() => Some(home),
        (Ok(rest), Some(home)) => Some(home.join(rest)),
        _ => None,
    };
    expanded.unwrap_or(path)
}

fn resolve(path: PathBuf) -> Result<PathBuf, CoreError> {
    match fs::canonicalize(&path) {
        Ok(resolved) => Ok(resolved),
        // Non-existent paths still become absolute, just without symlink resolution.
        Err(_) => std::path::absolute(&path).map_err(|e| CoreError::Io(e, path)),
    }
}
