//! Delivery events reported by the email provider.

use serde::Deserialize;
use utoipa::ToSchema;

use super::EmailAddress;

/// Known provider event kinds, validated at the boundary.
///
/// # Examples
/// ```
/// use waitlist::domain::EmailProviderEvent;
///
/// let event: EmailProviderEvent =
///     serde_json::from_str(r#"{"type":"bounced","email":"A@X.COM","hard":true}"#)
///         .expect("valid event");
/// assert_eq!(event.email().as_str(), "a@x.com");
/// assert!(serde_json::from_str::<EmailProviderEvent>(r#"{"type":"opened","email":"a@x.com"}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmailProviderEvent {
    /// The message reached the mailbox.
    Delivered {
        /// Recipient.
        #[schema(value_type = String, example = "ada@example.com")]
        email: EmailAddress,
    },
    /// The message bounced.
    Bounced {
        /// Recipient.
        #[schema(value_type = String, example = "ada@example.com")]
        email: EmailAddress,
        /// Permanent failure; the address is unusable.
        #[serde(default)]
        hard: bool,
    },
    /// The recipient reported the message as spam.
    Complained {
        /// Recipient.
        #[schema(value_type = String, example = "ada@example.com")]
        email: EmailAddress,
    },
}

impl EmailProviderEvent {
    /// Recipient the event concerns.
    #[must_use]
    pub fn email(&self) -> &EmailAddress {
        match self {
            Self::Delivered { email } | Self::Bounced { email, .. } | Self::Complained { email } => {
                email
            }
        }
    }

    /// Event label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Delivered { .. } => "delivered",
            Self::Bounced { hard: true, .. } => "hard_bounce",
            Self::Bounced { hard: false, .. } => "soft_bounce",
            Self::Complained { .. } => "complained",
        }
    }
}
