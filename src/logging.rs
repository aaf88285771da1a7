//! Logging setup
//!
//! Initializes the `log` facade with an env_logger backend. The line format
//! is `timestamp - target:LEVEL => message`. `RUST_LOG` still overrides the
//! level chosen here.

use std::io::Write;

use log::LevelFilter;

/// Initialize logging. Debug level when requested by config or CLI, info
/// otherwise. Safe to call more than once; later calls are no-ops.
pub fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {}:{} => {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        .parse_default_env();

    // Tests and repeated init calls would otherwise panic on the global logger.
    let _ = builder.try_init();
}
