//! Outbound notifications.
//!
//! Currently email only: welcome mails on registration, order confirmations
//! and winner announcements, all sent over SMTP.

pub mod email;

pub use email::SystemEmailService;
