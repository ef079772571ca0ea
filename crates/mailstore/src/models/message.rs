//! Message model for mail captured over SMTP

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StoreError};

/// Storage identifier for a message: a decimal sequence number
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_sequence(sequence: u64) -> Self {
        Self(sequence.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True until the store has assigned an ID
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the sequence number behind this ID
    ///
    /// Only plain ASCII digits are accepted; signs, whitespace and values
    /// above `u64::MAX` are rejected with [`StoreError::InvalidId`].
    pub fn sequence(&self) -> Result<u64> {
        let invalid = || StoreError::InvalidId { id: self.0.clone() };
        if self.0.is_empty() || !self.0.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        self.0.parse::<u64>().map_err(|_| invalid())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An SMTP forward or reverse path, e.g. `<@relay.example:user@example.com> SIZE=1024`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    /// Source-route relays, without the leading `@`
    pub relays: Vec<String>,
    /// Local part of the address
    pub mailbox: String,
    pub domain: String,
    /// ESMTP parameters following the path
    pub params: String,
}

impl Path {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        let (addr, params) = match s.find('>') {
            Some(end) => (&s[..end], s[end + 1..].trim()),
            None => match s.split_once(char::is_whitespace) {
                Some((addr, params)) => (addr, params.trim()),
                None => (s, ""),
            },
        };
        let addr = addr.trim().trim_start_matches('<');

        let (relays, addr) = match addr.split_once(':') {
            Some((route, rest)) if route.starts_with('@') => {
                let relays = route
                    .split(',')
                    .map(|relay| relay.trim().trim_start_matches('@').to_string())
                    .filter(|relay| !relay.is_empty())
                    .collect();
                (relays, rest)
            }
            _ => (Vec::new(), addr),
        };

        let (mailbox, domain) = addr.rsplit_once('@').unwrap_or((addr, ""));

        Self {
            relays,
            mailbox: mailbox.to_string(),
            domain: domain.to_string(),
            params: params.to_string(),
        }
    }

    /// The bare `mailbox@domain` address
    pub fn address(&self) -> String {
        if self.domain.is_empty() {
            self.mailbox.clone()
        } else {
            format!("{}@{}", self.mailbox, self.domain)
        }
    }
}

/// The SMTP envelope and raw DATA as received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpEnvelope {
    /// Argument of the HELO/EHLO command
    pub helo: String,
    /// MAIL FROM address
    pub from: String,
    /// RCPT TO addresses, in the order given
    pub to: Vec<String>,
    /// Message content exactly as transmitted after DATA
    pub data: String,
}

/// A captured message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Assigned by the store on insert; empty before that
    pub id: MessageId,
    pub from: Option<Path>,
    pub to: Vec<Path>,
    /// Size of the raw DATA in bytes
    pub size: usize,
    pub created: DateTime<Utc>,
    pub raw: SmtpEnvelope,
}

impl Message {
    /// Build an unsaved message from an SMTP envelope
    pub fn from_envelope(raw: SmtpEnvelope) -> Self {
        let from = if raw.from.trim().is_empty() {
            None
        } else {
            Some(Path::parse(&raw.from))
        };

        Self {
            id: MessageId::default(),
            from,
            to: raw.to.iter().map(|to| Path::parse(to)).collect(),
            size: raw.data.len(),
            created: Utc::now(),
            raw,
        }
    }

    pub fn builder() -> MessageBuilder {
        MessageBuilder::default()
    }

    /// Envelope sender
    pub fn sender(&self) -> &str {
        &self.raw.from
    }

    /// Envelope recipients
    pub fn recipients(&self) -> &[String] {
        &self.raw.to
    }

    /// Raw message text
    pub fn body(&self) -> &str {
        &self.raw.data
    }
}

/// Builder for creating Message instances
#[derive(Default)]
pub struct MessageBuilder {
    envelope: SmtpEnvelope,
    created: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    pub fn helo(mut self, helo: impl Into<String>) -> Self {
        self.envelope.helo = helo.into();
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.envelope.from = from.into();
        self
    }

    pub fn to<I, S>(mut self, to: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.envelope.to = to.into_iter().map(Into::into).collect();
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.envelope.data = data.into();
        self
    }

    pub fn created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn build(self) -> Message {
        let mut message = Message::from_envelope(self.envelope);
        if let Some(created) = self.created {
            message.created = created;
        }
        message
    }
}
