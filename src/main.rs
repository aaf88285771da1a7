#![forbid(unsafe_code)]

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, error};

use delegatewatch::config::WatchConfig;
use delegatewatch::{cli, config, logging, monitor};

fn main() -> Result<()> {
    let options = cli::parse_args()?;

    let config_path = config::resolve_config_path(options.config.as_deref())?;
    // Load before logging init so the config can pick the level; a broken
    // config degrades to defaults and the failure is logged right after.
    let loaded = config::try_load(&config_path);
    let config = match &loaded {
        Ok(config) => config.clone(),
        Err(_) => WatchConfig::default(),
    };

    logging::init(options.debug || config.watch.debug);
    if let Err(err) = loaded {
        error!("{:#}", anyhow::Error::from(err));
    }
    debug!(
        "loaded configuration from {}: {:?}",
        config_path.display(),
        config.redacted()
    );

    let hostname = hostname::get()
        .context("failed to resolve the local hostname")?
        .to_string_lossy()
        .into_owned();

    // Cooperative shutdown: signals set the flag, the loop exits normally.
    let interrupted = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, interrupted.clone());
    let _ = signal_hook::flag::register(signal_hook::consts::SIGHUP, interrupted.clone());
    let _ = signal_hook::flag::register(signal_hook::consts::SIGTERM, interrupted.clone());

    monitor::run_with_interrupt(&config, &hostname, interrupted, options.once)
}
