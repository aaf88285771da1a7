//! Delegated-authentication event detection
//!
//! Scans freshly read log lines for the `cmd=DelegateAuth` marker and
//! extracts the account fields from each matching line. Malformed lines are
//! reported as explicit parse errors so callers (and tests) can tell "no
//! match" from "matched but unparsable"; the batch never aborts on one bad
//! line.

use log::warn;
use thiserror::Error;

use crate::constants::DELEGATE_AUTH_MARKER;
use crate::models::DelegationEvent;

/// Why a marker-bearing line failed to produce an event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line is too short to carry a timestamp prefix")]
    MissingTimestamp,

    #[error("no accountId or accountName field could be extracted")]
    MissingAccountFields,
}

/// Detects delegation events in a batch of log lines
#[derive(Debug, Clone)]
pub struct EventDetector {
    hostname: String,
}

impl EventDetector {
    /// `hostname` is stamped into every event this detector produces.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Scan `lines` in order and return one event per parsable marker line.
    ///
    /// Lines that carry the marker but cannot be parsed are logged and
    /// skipped. Detection itself is logged at warn level, mirroring the
    /// audit intent of the alert.
    pub fn detect(&self, lines: &[String]) -> Vec<DelegationEvent> {
        let mut events = Vec::new();
        for line in lines {
            match self.parse_delegate_line(line) {
                Ok(Some(event)) => {
                    warn!(
                        "Authentication delegation detected from account id \"{}\" with account name \"{}\"",
                        event.account_id, event.account_name
                    );
                    events.push(event);
                }
                Ok(None) => {}
                Err(err) => {
                    warn!("delegate auth line detected but skipped ({}): {}", err, line);
                }
            }
        }
        events
    }

    /// Parse a single line.
    ///
    /// Returns `Ok(None)` when the marker is absent, `Ok(Some(event))` for a
    /// well-formed match, and `Err` when the marker is present but the line
    /// yields no usable fields.
    pub fn parse_delegate_line(&self, line: &str) -> Result<Option<DelegationEvent>, ParseError> {
        if !line.contains(DELEGATE_AUTH_MARKER) {
            return Ok(None);
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(ParseError::MissingTimestamp);
        }
        let timestamp = format!("{} {}", tokens[0], tokens[1]);

        let mut account_id = None;
        let mut account_name = None;
        for token in tokens.iter().copied() {
            if let Some(value) = field_value(token, "accountId") {
                account_id = Some(value);
            }
            if let Some(value) = field_value(token, "accountName") {
                account_name = Some(value);
            }
        }

        match (account_id, account_name) {
            (Some(account_id), Some(account_name)) => Ok(Some(DelegationEvent {
                timestamp,
                account_id,
                account_name,
                hostname: self.hostname.clone(),
            })),
            _ => Err(ParseError::MissingAccountFields),
        }
    }
}

/// Extract the value of a `prefix...=value[;]` token.
fn field_value(token: &str, prefix: &str) -> Option<String> {
    if !token.starts_with(prefix) {
        return None;
    }
    let (_, raw) = token.split_once('=')?;
    Some(raw.strip_suffix(';').unwrap_or(raw).to_string())
}
