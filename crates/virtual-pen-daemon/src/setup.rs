//! Config loading and host environment checks.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::DaemonError;

/// Device node the virtual stylus is created through.
pub const UINPUT_PATH: &str = "/dev/uinput";

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config, DaemonError> {
    let config_path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DaemonError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else if path.is_some() {
        Err(DaemonError::Config(format!(
            "config file {} does not exist",
            config_path.display()
        )))
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("virtual-pen")
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Check that the uinput node at `path` can be opened for writing.
///
/// A failure here is what makes virtual device creation fail; the usual fix
/// is a udev rule granting the user access.
pub fn check_uinput(path: &Path) -> std::io::Result<()> {
    OpenOptions::new().write(true).open(path).map(|_| ())
}
