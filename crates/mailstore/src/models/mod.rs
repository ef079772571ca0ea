//! Domain models for captured mail

mod message;

pub use message::{Message, MessageBuilder, MessageId, Path, SmtpEnvelope};
