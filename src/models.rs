//! Data models module
//!
//! Defines the core data structure:
//! - DelegationEvent: one delegated-authentication occurrence extracted from
//!   a matching audit log line, consumed once by the notifier

/// A single `cmd=DelegateAuth` occurrence parsed from the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationEvent {
    /// Leading two whitespace-delimited tokens of the line, joined by a space
    pub timestamp: String,
    /// Value of the `accountId=` token, trailing `;` stripped
    pub account_id: String,
    /// Value of the `accountName=` token, trailing `;` stripped
    pub account_name: String,
    /// Identity of the host the event was detected on
    pub hostname: String,
}

impl DelegationEvent {
    /// Subject line for the alert mail
    pub fn subject(&self) -> String {
        format!("DelegateAuthRequest on {}", self.hostname)
    }

    /// Fixed-format alert body populated with the event fields
    pub fn render_body(&self) -> String {
        format!(
            "\nHello,\n\n\
             This message is to let you know that a \"DelegateAuth\" request has been\n\
             performed.\n\n\
             Time: \"{}\"\n\
             Account ID: \"{}\"\n\
             Account name: \"{}\"\n\
             Server: \"{}\"\n\n\
             If this is an out-of-band request please login to the server and begin\n\
             reviewing the security of the server and or Zimbra.\n\n\
             Thank you.\n",
            self.timestamp, self.account_id, self.account_name, self.hostname
        )
    }
}
