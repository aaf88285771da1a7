//! delegatewatch - Zimbra DelegateAuth log watcher
//!
//! This library exposes the daemon's components so integration tests can
//! drive individual poll cycles without a live mail relay:
//! - [`tail::TailReader`]: line-count diff tailing with rotation recovery
//! - [`detect::EventDetector`]: marker scan and field extraction
//! - [`notify::SmtpNotifier`]: per-event SMTP alert delivery
//! - [`monitor`]: the poll loop tying them together

pub mod cli;
pub mod config;
pub mod constants;
pub mod detect;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod tail;
