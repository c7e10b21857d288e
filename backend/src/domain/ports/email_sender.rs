//! Port for the transactional email collaborator.
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::EmailAddress;

use super::define_port_error;

define_port_error! {
    /// Errors raised by email sender adapters.
    pub enum EmailSendError {
        /// The provider could not be reached.
        @transient Transport { message: String } => "email transport failed: {message}",
        /// The provider refused the message.
        Rejected { status: u16, message: String } => "email provider rejected message ({status}): {message}",
    }
}

/// Templates the waitlist sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmailTemplate {
    /// Link confirming a signup.
    Verification,
    /// Notice that the entry has been admitted.
    Invitation,
}

impl EmailTemplate {
    /// Provider-side template identifier.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Verification => "waitlist-verification",
            Self::Invitation => "waitlist-invitation",
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Render `template` with `data` and deliver it to `to`.
    async fn send(
        &self,
        to: &EmailAddress,
        template: EmailTemplate,
        data: &Value,
    ) -> Result<(), EmailSendError>;
}
