//! Alert delivery over SMTP
//!
//! One transport connection per notification: the expected event rate is a
//! handful per day, so pooling buys nothing and a dropped connection after
//! each send keeps the relay state simple. Every failure is returned as a
//! `NotifyError` for the poll loop to log and swallow; a lost alert never
//! stops the daemon.

use std::fs;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Identity, Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use log::debug;
use thiserror::Error;

use crate::config::MailSettings;
use crate::models::DelegationEvent;

/// Errors while building or delivering an alert
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("mail option `{0}` is not configured")]
    MissingOption(&'static str),

    #[error("invalid mail address in `{field}`")]
    Address {
        field: &'static str,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("while reading the TLS client key or certificate")]
    ClientIdentity(#[from] std::io::Error),

    #[error("while building the alert message")]
    Message(#[from] lettre::error::Error),

    #[error("while talking to the mail relay")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Seam between the poll loop and the delivery mechanism, so tests can
/// substitute a recording implementation
pub trait Notify {
    fn notify(&self, event: &DelegationEvent) -> Result<(), NotifyError>;
}

/// Delivers alerts through an authenticated STARTTLS relay
pub struct SmtpNotifier {
    mail: MailSettings,
    hostname: String,
}

impl SmtpNotifier {
    pub fn new(mail: MailSettings, hostname: impl Into<String>) -> Self {
        Self {
            mail,
            hostname: hostname.into(),
        }
    }

    fn build_transport(&self) -> Result<SmtpTransport, NotifyError> {
        let host = self
            .mail
            .mail_url
            .as_deref()
            .ok_or(NotifyError::MissingOption("mail_url"))?;

        let mut tls = TlsParameters::builder(host.to_string());
        let client_identity = self.mail.mail_key.is_some() && self.mail.mail_cert.is_some();
        if let (Some(key), Some(cert)) = (&self.mail.mail_key, &self.mail.mail_cert) {
            let cert_pem = fs::read(cert)?;
            let key_pem = fs::read(key)?;
            tls = tls.identify_with(Identity::from_pem(&cert_pem, &key_pem)?);
        }

        let port = self.mail.mail_port.unwrap_or(25);
        let mut builder = SmtpTransport::builder_dangerous(host)
            .port(port)
            .tls(Tls::Required(tls.build()?));
        let authenticated = match (&self.mail.mail_username, &self.mail.mail_password) {
            (Some(username), Some(password)) => {
                builder =
                    builder.credentials(Credentials::new(username.clone(), password.clone()));
                true
            }
            _ => false,
        };

        debug!(
            "connecting to mail relay {}:{} (auth: {}, client identity: {})",
            host,
            port,
            if authenticated { "login" } else { "none" },
            if client_identity { "yes" } else { "anonymous" }
        );
        Ok(builder.build())
    }

    fn build_message(&self, event: &DelegationEvent) -> Result<Message, NotifyError> {
        let from = parse_mailbox(self.mail.mail_username.as_deref(), "mail_username")?;
        let to = parse_mailbox(self.mail.send_to.as_deref(), "send_to")?;
        let reply_to: Mailbox = format!("root@{}", self.hostname)
            .parse()
            .map_err(|source| NotifyError::Address {
                field: "reply-to hostname",
                source,
            })?;

        Ok(Message::builder()
            .from(from)
            .to(to)
            .reply_to(reply_to)
            .subject(event.subject())
            .body(event.render_body())?)
    }
}

impl Notify for SmtpNotifier {
    fn notify(&self, event: &DelegationEvent) -> Result<(), NotifyError> {
        let message = self.build_message(event)?;
        let mailer = self.build_transport()?;
        debug!(
            "sending delegate auth alert for account \"{}\" to {:?}",
            event.account_name, self.mail.send_to
        );
        mailer.send(&message)?;
        // Dropping the transport closes the relay connection.
        Ok(())
    }
}

fn parse_mailbox(value: Option<&str>, field: &'static str) -> Result<Mailbox, NotifyError> {
    let raw = value.ok_or(NotifyError::MissingOption(field))?;
    raw.parse()
        .map_err(|source| NotifyError::Address { field, source })
}
