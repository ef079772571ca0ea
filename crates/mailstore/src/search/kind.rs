//! Search predicates over the SMTP envelope

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::Message;

/// Which part of a message a search query is matched against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    /// Any envelope recipient contains the query
    To,
    /// The envelope sender contains the query
    From,
    /// The raw message data contains the query
    #[default]
    Body,
}

impl SearchKind {
    /// Map a search tag to a kind
    ///
    /// `"to"` and `"from"` select the envelope fields; every other tag,
    /// including the empty string, searches the message body.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "to" => SearchKind::To,
            "from" => SearchKind::From,
            _ => SearchKind::Body,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::To => "to",
            SearchKind::From => "from",
            SearchKind::Body => "body",
        }
    }

    /// Case-sensitive substring match of `query` against this kind's field(s)
    pub fn matches(&self, query: &str, message: &Message) -> bool {
        match self {
            SearchKind::To => message.recipients().iter().any(|to| to.contains(query)),
            SearchKind::From => message.sender().contains(query),
            SearchKind::Body => message.body().contains(query),
        }
    }
}

impl FromStr for SearchKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(from: &str, to: &[&str], data: &str) -> Message {
        Message::builder()
            .from(from)
            .to(to.iter().copied())
            .data(data)
            .build()
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(SearchKind::parse("to"), SearchKind::To);
        assert_eq!(SearchKind::parse("from"), SearchKind::From);
        assert_eq!(SearchKind::parse("containing"), SearchKind::Body);
        assert_eq!(SearchKind::parse(""), SearchKind::Body);
        // tags are exact, not case-folded
        assert_eq!(SearchKind::parse("TO"), SearchKind::Body);
        assert_eq!("from".parse::<SearchKind>().unwrap(), SearchKind::From);
    }

    #[test]
    fn test_to_checks_every_recipient() {
        let message = make_message("a@x.com", &["first@x.com", "second@y.com"], "");
        assert!(SearchKind::To.matches("first@", &message));
        assert!(SearchKind::To.matches("second@", &message));
        assert!(!SearchKind::To.matches("third@", &message));
    }

    #[test]
    fn test_to_without_recipients() {
        let message = make_message("a@x.com", &[], "to@x.com in the body");
        assert!(!SearchKind::To.matches("to@", &message));
    }

    #[test]
    fn test_from_matches_sender_only() {
        let message = make_message("alice@x.com", &["bob@x.com"], "hello alice");
        assert!(SearchKind::From.matches("alice", &message));
        assert!(!SearchKind::From.matches("bob", &message));
    }

    #[test]
    fn test_body_matches_raw_data() {
        let message = make_message("a@x.com", &["b@x.com"], "Subject: Invoice\r\n\r\nPlease pay");
        assert!(SearchKind::Body.matches("Invoice", &message));
        assert!(!SearchKind::Body.matches("invoice", &message));
        assert!(!SearchKind::Body.matches("a@x.com", &message));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let message = make_message("a@x.com", &["b@x.com"], "");
        assert!(SearchKind::From.matches("", &message));
        assert!(SearchKind::To.matches("", &message));
        assert!(SearchKind::Body.matches("", &message));
    }
}
