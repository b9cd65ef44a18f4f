use anyhow::Result;
use directories::ProjectDirs;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use super::AppConfig;

const QUALIFIER: &str = "com";
const ORGANIZATION: &str = "inspyre";
const APP_NAME: &str = "pic-scanner";
const CONFIG_FILE: &str = "config.json";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APP_NAME)
}

/// Returns the platform-specific configuration directory for the application.
pub fn get_config_directory() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory (history, default backups).
pub fn get_data_directory() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
}

/// Returns the full path to the configuration file.
///
/// `config_dir` overrides the platform directory.
pub fn get_config_file_path(config_dir: Option<&Path>) -> Option<PathBuf> {
    resolve_config_dir(config_dir).map(|dir| dir.join(CONFIG_FILE))
}

fn resolve_config_dir(config_dir: Option<&Path>) -> Option<PathBuf> {
    config_dir.map(Path::to_path_buf).or_else(get_config_directory)
}

/// Loads the application configuration from the config file.
/// If the file doesn't exist, it creates a default one.
/// A file that does not match the current format is migrated; if that fails
/// as well, the default configuration is used.
pub fn load_config(config_dir: Option<&Path>) -> Result<AppConfig> {
    let config_path = get_config_file_path(config_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if !config_path.exists() {
        tracing::info!(
            "Config file not found, creating default config at {:?}",
            config_path
        );
        let default_config = AppConfig::default();
        save_config(&default_config, config_dir)?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path)?;

    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Loaded config from {:?}", config_path);
            Ok(config)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse config file at {:?}: {}. Trying to migrate it.",
                config_path,
                e
            );
            Ok(migrate_legacy_config(&config_content).unwrap_or_else(|e| {
                tracing::warn!("Migration failed ({}), falling back to default config", e);
                AppConfig::default()
            }))
        }
    }
}

/// Fills every missing or null field of an older config file from the defaults.
fn migrate_legacy_config(config_content: &str) -> Result<AppConfig> {
    let mut value: Value = serde_json::from_str(config_content)?;
    let obj = value
        .as_object_mut()
        .ok_or_else(|| anyhow::anyhow!("Config is not a JSON object"))?;

    let defaults = serde_json::to_value(AppConfig::default())?;
    let Value::Object(defaults) = defaults else {
        anyhow::bail!("Default config did not serialize to an object");
    };

    for (key, default_val) in defaults {
        if obj.get(&key).map_or(true, Value::is_null) {
            obj.insert(key, default_val);
        }
    }

    let migrated_config: AppConfig = serde_json::from_value(value)?;
    tracing::info!("Successfully migrated legacy config");
    Ok(migrated_config)
}

/// Saves the provided configuration to the config file.
pub fn save_config(config: &AppConfig, config_dir: Option<&Path>) -> Result<()> {
    let config_dir = resolve_config_dir(config_dir)
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
        tracing::info!("Created config directory: {:?}", config_dir);
    }

    let config_path = config_dir.join(CONFIG_FILE);
    let config_json = serde_json::to_string_pretty(config)?;

    fs::write(&config_path, config_json)?;
    tracing::info!("Saved config to {:?}", config_path);

    Ok(())
}

/// Overwrites the config file with the defaults and returns them.
pub fn reset_config(config_dir: Option<&Path>) -> Result<AppConfig> {
    let defaults = AppConfig::default();
    save_config(&defaults, config_dir)?;
    Ok(defaults)
}

/// Exports the current configuration to a user-specified JSON file.
pub fn export_config(config: &AppConfig, export_path: &Path) -> Result<()> {
    let config_json = serde_json::to_string_pretty(config)?;
    fs::write(export_path, config_json)?;
    tracing::info!("Exported config to {:?}", export_path);
    Ok(())
}

/// Imports an application configuration from a user-specified JSON file.
pub fn import_config(import_path: &Path) -> Result<AppConfig> {
    let config_content = fs::read_to_string(import_path)?;
    match serde_json::from_str::<AppConfig>(&config_content) {
        Ok(config) => {
            tracing::info!("Imported config from {:?}", import_path);
            Ok(config)
        }
        Err(_) => {
            tracing::info!("Importing legacy config format from {:?}", import_path);
            migrate_legacy_config(&config_content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_is_created_with_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(Some(dir.path())).unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let config = AppConfig {
            base_url: "http://inference.local:9000/infer".to_string(),
            threaded: true,
            last_directory: Some(PathBuf::from("/pictures")),
            ..Default::default()
        };

        save_config(&config, Some(dir.path())).unwrap();
        assert_eq!(load_config(Some(dir.path())).unwrap(), config);
    }

    #[test]
    fn test_partial_config_is_migrated() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"base_url": "http://other:1/infer", "threaded": null, "worker_count": 2}"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path())).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(config.base_url, "http://other:1/infer");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.threaded, defaults.threaded);
        assert_eq!(config.concerning_labels, defaults.concerning_labels);
    }

    #[test]
    fn test_corrupt_config_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "{ this is not json").unwrap();
        assert_eq!(load_config(Some(dir.path())).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_export_import_and_reset() {
        let dir = tempdir().unwrap();
        let export_path = dir.path().join("exported.json");
        let config = AppConfig {
            recursive: true,
            ..Default::default()
        };

        export_config(&config, &export_path).unwrap();
        assert_eq!(import_config(&export_path).unwrap(), config);

        save_config(&config, Some(dir.path())).unwrap();
        assert_eq!(reset_config(Some(dir.path())).unwrap(), AppConfig::default());
        assert!(!load_config(Some(dir.path())).unwrap().recursive);
    }

    #[test]
    fn test_import_of_non_object_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(import_config(&path).is_err());
    }
}
