//! tessera stack settings
//!
//! Finds and parses the `tessera.kdl` file that names a stack and the tags
//! applied to every resource declared in it.

pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{Settings, parse_settings_file, parse_settings_str};

use std::path::PathBuf;

const CONFIG_PATH_ENV: &str = "TESSERA_CONFIG_PATH";
const CANDIDATES: [&str; 4] = [
    "tessera.local.kdl",
    ".tessera.local.kdl",
    "tessera.kdl",
    ".tessera.kdl",
];

/// Locate the settings file
///
/// Search order:
/// 1. `TESSERA_CONFIG_PATH` (direct path)
/// 2. current directory: tessera.local.kdl, .tessera.local.kdl, tessera.kdl, .tessera.kdl
/// 3. `./.tessera/`, same order
/// 4. `~/.config/tessera/tessera.kdl`
pub fn find_settings_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at a missing file: {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".tessera");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("tessera").join("tessera.kdl");
        if global.exists() {
            return Ok(global);
        }
    }

    Err(ConfigError::SettingsFileNotFound)
}

/// Find and parse the settings file
pub fn load_settings() -> Result<Settings> {
    let path = find_settings_file()?;
    parse_settings_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_find_settings_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("tessera.kdl"), r#"stack "cwd""#).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with("tessera.kdl"));
    }

    #[test]
    #[serial]
    fn test_local_file_has_priority() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("tessera.kdl"), r#"stack "shared""#).unwrap();
        fs::write(temp_dir.path().join("tessera.local.kdl"), r#"stack "mine""#).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, load_settings);

        std::env::set_current_dir(original_dir).unwrap();
        assert_eq!(result.unwrap().stack, "mine");
    }

    #[test]
    #[serial]
    fn test_find_settings_in_dot_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dot_dir = temp_dir.path().join(".tessera");
        fs::create_dir(&dot_dir).unwrap();
        fs::write(dot_dir.join("tessera.kdl"), r#"stack "dot""#).unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        assert!(result.unwrap().ends_with(".tessera/tessera.kdl"));
    }

    #[test]
    #[serial]
    fn test_env_var_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let custom = temp_dir.path().join("custom.kdl");
        fs::write(&custom, r#"stack "custom""#).unwrap();

        let result = temp_env::with_var(CONFIG_PATH_ENV, Some(custom.as_os_str()), load_settings);
        let settings = result.unwrap();
        assert_eq!(settings.stack, "custom");
        assert_eq!(settings.source.as_deref(), Some(custom.as_path()));
    }

    #[test]
    #[serial]
    fn test_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        // The global config dir may hold a real file on a developer machine.
        let global_exists = dirs::config_dir()
            .map(|d| d.join("tessera").join("tessera.kdl").exists())
            .unwrap_or(false);
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_settings_file);

        std::env::set_current_dir(original_dir).unwrap();
        if !global_exists {
            assert!(matches!(result, Err(ConfigError::SettingsFileNotFound)));
        }
    }
}
