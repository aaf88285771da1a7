//! Poll loop driving the read → detect → notify cycle
//!
//! Single-threaded and blocking: one cycle runs to completion, then the loop
//! sleeps for the configured interval. Shutdown is cooperative; the signal
//! handlers set a shared flag which is checked between cycles and during the
//! interval sleep, so the loop exits normally instead of killing the process
//! mid-cycle.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info};

use crate::config::WatchConfig;
use crate::detect::EventDetector;
use crate::notify::{Notify, SmtpNotifier};
use crate::tail::{TailError, TailReader};

/// How often the interval sleep rechecks the interrupt flag
const SHUTDOWN_POLL_SLICE: Duration = Duration::from_millis(250);

/// Run one poll cycle: read the new lines, detect events, send one alert per
/// event. Returns the number of alerts delivered. Only the tail error
/// propagates; the loop treats a missing log file as fatal and any other
/// read failure as a skipped cycle. Delivery failures are logged and
/// dropped.
pub fn run_cycle(
    reader: &mut TailReader,
    detector: &EventDetector,
    notifier: &dyn Notify,
    log_path: &Path,
) -> Result<usize, TailError> {
    let lines = reader.read_new_lines(log_path)?;
    let events = detector.detect(&lines);

    let mut delivered = 0;
    for event in &events {
        match notifier.notify(event) {
            Ok(()) => delivered += 1,
            Err(err) => error!(
                "failed to send alert for account \"{}\": {:#}",
                event.account_name,
                anyhow::Error::from(err)
            ),
        }
    }
    Ok(delivered)
}

/// Run the watch loop until `interrupted` is set (or after one cycle when
/// `once` is requested).
pub fn run_with_interrupt(
    config: &WatchConfig,
    hostname: &str,
    interrupted: Arc<AtomicBool>,
    once: bool,
) -> Result<()> {
    let log_path = config
        .watch
        .zimbra_log
        .as_deref()
        .context("no `zimbra_log` path is configured; nothing to watch")?;
    let interval = Duration::from_secs(config.watch.check_interval);

    let mut reader = TailReader::new();
    let detector = EventDetector::new(hostname);
    let notifier = SmtpNotifier::new(config.mail.clone(), hostname);

    info!("starting log watch at {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    let mut cycles: u64 = 0;

    while !interrupted.load(Ordering::Relaxed) {
        cycles += 1;
        debug!("entering poll cycle {}", cycles);
        let cycle_start = Instant::now();

        match run_cycle(&mut reader, &detector, &notifier, log_path) {
            Ok(delivered) => {
                if delivered > 0 {
                    info!("delivered {} delegate auth alert(s)", delivered);
                }
            }
            // A vanished log file is a configuration error and ends the daemon.
            Err(err @ TailError::LogMissing(_)) => {
                return Err(anyhow::Error::from(err))
                    .with_context(|| format!("poll cycle {} failed", cycles));
            }
            // Anything else inside the steady-state loop is best-effort.
            Err(err) => {
                error!(
                    "poll cycle {} failed, retrying next interval: {:#}",
                    cycles,
                    anyhow::Error::from(err)
                );
            }
        }

        if once {
            break;
        }
        if let Some(remaining) = interval.checked_sub(cycle_start.elapsed()) {
            sleep_unless_interrupted(remaining, &interrupted);
        }
    }

    info!("stopping log watch at {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    Ok(())
}

/// Sleep for `total`, waking early if the interrupt flag is set.
fn sleep_unless_interrupted(total: Duration, interrupted: &AtomicBool) {
    let deadline = Instant::now() + total;
    loop {
        if interrupted.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(SHUTDOWN_POLL_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DelegationEvent;
    use crate::notify::NotifyError;
    use std::cell::RefCell;
    use std::fs;
    use tempfile::tempdir;

    struct RecordingNotifier {
        sent: RefCell<Vec<DelegationEvent>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Notify for RecordingNotifier {
        fn notify(&self, event: &DelegationEvent) -> Result<(), NotifyError> {
            self.sent.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notify for FailingNotifier {
        fn notify(&self, _event: &DelegationEvent) -> Result<(), NotifyError> {
            Err(NotifyError::MissingOption("mail_url"))
        }
    }

    #[test]
    fn test_cycle_with_no_matches_sends_nothing() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("audit.log");
        fs::write(&log, "one\ntwo\nthree\n").unwrap();

        let mut reader = TailReader::new();
        let detector = EventDetector::new("mail01");
        let notifier = RecordingNotifier::new();

        let delivered = run_cycle(&mut reader, &detector, &notifier, &log).unwrap();
        assert_eq!(delivered, 0);
        assert!(notifier.sent.borrow().is_empty());
    }

    #[test]
    fn test_cycle_propagates_missing_log_file() {
        let mut reader = TailReader::new();
        let detector = EventDetector::new("mail01");
        let notifier = RecordingNotifier::new();

        let result = run_cycle(
            &mut reader,
            &detector,
            &notifier,
            Path::new("/nonexistent/audit.log"),
        );
        assert!(matches!(result, Err(TailError::LogMissing(_))));
    }

    #[test]
    fn test_cycle_tolerates_invalid_bytes_in_the_log() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("audit.log");
        fs::write(
            &log,
            b"2024-01-01 09:59:59 cmd=Auth user=j\xFFdoe;\n\
              2024-01-01 10:00:00 cmd=DelegateAuth accountId=123; accountName=jdoe;\n"
                as &[u8],
        )
        .unwrap();

        let mut reader = TailReader::new();
        let detector = EventDetector::new("mail01");
        let notifier = RecordingNotifier::new();

        // The stray byte is replaced, not fatal, and the valid event that
        // follows it is still delivered.
        let delivered = run_cycle(&mut reader, &detector, &notifier, &log).unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(notifier.sent.borrow()[0].account_id, "123");
    }

    #[test]
    fn test_loop_survives_transient_read_failures() {
        let dir = tempdir().unwrap();
        // A directory passes the existence check but fails to read as a
        // file, standing in for a transient read error.
        let mut config = WatchConfig::default();
        config.watch.zimbra_log = Some(dir.path().to_path_buf());
        config.watch.check_interval = 1;

        let interrupted = Arc::new(AtomicBool::new(false));
        let result = run_with_interrupt(&config, "mail01", interrupted, true);
        assert!(result.is_ok());
    }

    #[test]
    fn test_loop_treats_missing_log_as_fatal() {
        let dir = tempdir().unwrap();
        let mut config = WatchConfig::default();
        config.watch.zimbra_log = Some(dir.path().join("gone.log"));
        config.watch.check_interval = 1;

        let interrupted = Arc::new(AtomicBool::new(false));
        let result = run_with_interrupt(&config, "mail01", interrupted, true);
        assert!(result.is_err());
    }

    #[test]
    fn test_delivery_failure_does_not_abort_the_cycle() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("audit.log");
        fs::write(
            &log,
            "2024-01-01 10:00:00 cmd=DelegateAuth accountId=123; accountName=jdoe;\n",
        )
        .unwrap();

        let mut reader = TailReader::new();
        let detector = EventDetector::new("mail01");

        let delivered = run_cycle(&mut reader, &detector, &FailingNotifier, &log).unwrap();
        assert_eq!(delivered, 0);
    }
}
