//! Configuration management
//!
//! Handles TOML configuration parsing and file discovery. A user-scoped file
//! takes precedence over the system-scoped one; absence of both is a fatal
//! startup error. A file that exists but fails to read or parse is logged
//! and replaced by defaults, so a broken config degrades to "nothing to
//! watch" rather than a crash at parse time.

use std::fs;
use std::path::{Path, PathBuf};

use log::error;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{
    APP_NAME, DEFAULT_CHECK_INTERVAL_SECS, SYSTEM_CONFIG_ENV, SYSTEM_CONFIG_PATH,
    USER_CONFIG_FILENAME,
};

/// Errors while locating or loading the configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "configuration file for {APP_NAME} was not found; valid configuration files are [ {user} ] or [ {system} ]"
    )]
    NotFound { user: String, system: String },

    #[error("failure reading in the configuration file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failure parsing the configuration file {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Complete daemon configuration, constructed once at startup and passed by
/// reference into the components
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub watch: WatchSettings,
    pub mail: MailSettings,
}

/// Core polling settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Path of the audit log to watch; no default, required before the first cycle
    pub zimbra_log: Option<PathBuf>,
    /// Seconds between poll cycles
    pub check_interval: u64,
    /// Enable debug logging
    pub debug: bool,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            zimbra_log: None,
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            debug: false,
        }
    }
}

/// Mail relay settings for outbound alerts
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    pub mail_url: Option<String>,
    pub mail_port: Option<u16>,
    pub mail_username: Option<String>,
    pub mail_password: Option<String>,
    /// PEM client key, paired with `mail_cert` for TLS client identity
    pub mail_key: Option<PathBuf>,
    /// PEM client certificate
    pub mail_cert: Option<PathBuf>,
    pub send_to: Option<String>,
}

impl WatchConfig {
    /// Copy suitable for debug logging, with the mail password masked.
    pub fn redacted(&self) -> WatchConfig {
        let mut copy = self.clone();
        if copy.mail.mail_password.is_some() {
            copy.mail.mail_password = Some("<redacted>".to_string());
        }
        copy
    }
}

/// Pick the configuration file to use.
///
/// An explicit path (from the CLI) wins; otherwise the user file under the
/// home directory is preferred over the system file. The system path can be
/// relocated through the [`SYSTEM_CONFIG_ENV`] environment variable.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let user = dirs::home_dir().map(|home| home.join(USER_CONFIG_FILENAME));
    let system = std::env::var_os(SYSTEM_CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(SYSTEM_CONFIG_PATH));

    if let Some(user) = user.as_ref().filter(|path| path.exists()) {
        return Ok(user.clone());
    }
    if system.exists() {
        return Ok(system);
    }

    Err(ConfigError::NotFound {
        user: user
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| format!("~/{}", USER_CONFIG_FILENAME)),
        system: system.display().to_string(),
    })
}

/// Load and parse the configuration file at `path`.
pub fn try_load(path: &Path) -> Result<WatchConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Load the configuration, degrading to defaults on failure.
///
/// Read or parse failures are logged and yield the default configuration;
/// the missing `zimbra_log` default then fails fatally on the first cycle.
pub fn load(path: &Path) -> WatchConfig {
    match try_load(path) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", anyhow::Error::from(err));
            WatchConfig::default()
        }
    }
}
