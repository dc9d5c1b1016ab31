//! Door alert delivery.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::{Message, SmtpTransport};
use tracing::{debug, info};

use crate::config::SmtpConfig;
use crate::error::NotifyError;

/// Sends short alert messages.
pub trait Notifier {
    /// Deliver `message`. Callers log failures and carry on.
    fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Mails alerts through a plain SMTP relay.
///
/// The message text doubles as the subject so it reads well on
/// email-to-SMS gateways.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    sender: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    /// Build a notifier from config. Addresses are validated up front.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, NotifyError> {
        if config.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let sender = parse_mailbox(&config.sender)?;
        let recipients = config
            .recipients
            .iter()
            .map(|r| parse_mailbox(r))
            .collect::<Result<Vec<_>, _>>()?;

        // The relay accepts unauthenticated mail from the LAN without TLS.
        let transport = SmtpTransport::builder_dangerous(config.relay.as_str())
            .port(config.port)
            .build();

        Ok(SmtpNotifier {
            transport,
            sender,
            recipients,
        })
    }

    /// Assemble the message for `text`.
    pub fn build_message(&self, text: &str) -> Result<Message, NotifyError> {
        let mut builder = Message::builder().from(self.sender.clone()).subject(text);
        for recipient in &self.recipients {
            builder = builder.to(recipient.clone());
        }
        Ok(builder.header(ContentType::TEXT_PLAIN).body(text.to_string())?)
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let email = self.build_message(message)?;
        lettre::Transport::send(&self.transport, &email)?;
        info!("Sent alert {:?} to {} recipient(s)", message, self.recipients.len());
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

/// Logs alerts instead of sending them. Used when no relay is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        info!("Alert (no mail relay configured): {}", message);
        debug!("Configure an smtp section to deliver alerts by mail");
        Ok(())
    }
}
