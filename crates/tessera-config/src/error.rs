use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "settings file not found. Looked in:\n\
        - the current directory: tessera.local.kdl, .tessera.local.kdl, tessera.kdl, .tessera.kdl\n\
        - the ./.tessera/ directory\n\
        - ~/.config/tessera/tessera.kdl\n\
        Set TESSERA_CONFIG_PATH to point at a file directly"
    )]
    SettingsFileNotFound,

    #[error("KDL parse error: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("invalid settings in {path}: {message}")]
    InvalidSettings { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
