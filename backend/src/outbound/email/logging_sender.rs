//! Email sender that only logs, for development without a provider.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::domain::EmailAddress;
use crate::domain::ports::{EmailSendError, EmailSender, EmailTemplate};

/// Logs each send instead of delivering it.
///
/// The template data includes verification links, so this adapter must not
/// be used where logs are shared.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEmailSender;

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(
        &self,
        to: &EmailAddress,
        template: EmailTemplate,
        data: &Value,
    ) -> Result<(), EmailSendError> {
        info!(to = to.as_str(), template = template.id(), %data, "email not delivered (logging sender)");
        Ok(())
    }
}
