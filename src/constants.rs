//! Global constants for delegatewatch
//!
//! Centralized location for application-wide constants

/// Application name, used for config file discovery and log lines
pub const APP_NAME: &str = "zimbra_delegate";

/// Fixed marker identifying a delegated-authentication command in the audit log
pub const DELEGATE_AUTH_MARKER: &str = "cmd=DelegateAuth";

/// System-scoped configuration file, used when no user config exists
pub const SYSTEM_CONFIG_PATH: &str = "/etc/zimbra_delegate/zimbra_delegate.toml";

/// Environment variable overriding [`SYSTEM_CONFIG_PATH`], for non-standard
/// installs
pub const SYSTEM_CONFIG_ENV: &str = "DELEGATEWATCH_SYSTEM_CONFIG";

/// User-scoped configuration file name, resolved under the home directory
pub const USER_CONFIG_FILENAME: &str = ".zimbra_delegate.toml";

/// Seconds between poll cycles when `check_interval` is not configured
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// How many trailing lines to replay when the watched file shrinks.
/// A shrink means the file was truncated or rotated underneath us, so the
/// precise line diff is gone; this bounded window may re-deliver or miss
/// events across the rotation boundary.
pub const ROTATION_RECOVERY_LINES: usize = 50;
