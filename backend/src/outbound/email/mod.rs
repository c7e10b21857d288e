//! Email sender adapters.
//!
//! [`HttpEmailSender`] posts template sends to a transactional email API.
//! [`LoggingEmailSender`] only logs, for local runs without a provider.

mod http_sender;
mod logging_sender;

pub use http_sender::{HttpEmailSender, HttpEmailSenderConfig};
pub use logging_sender::LoggingEmailSender;
