//! Offset/limit windowing over search matches

use serde::{Deserialize, Serialize};

use super::SearchKind;
use crate::models::Message;

/// One page of search matches plus the total number of matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    /// Matches inside the requested window, most recent first
    pub messages: Vec<Message>,
    /// Every match in the namespace, regardless of the window
    pub total: usize,
}

impl SearchResults {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Collects matches during a scan
///
/// Matches are ranked from 1 in scan order. A match is kept when its rank
/// falls in `[start, start + limit)`; every match is counted.
#[derive(Debug)]
pub struct SearchWindow<'q> {
    kind: SearchKind,
    query: &'q str,
    start: usize,
    end: usize,
    results: SearchResults,
}

impl<'q> SearchWindow<'q> {
    pub fn new(kind: SearchKind, query: &'q str, start: usize, limit: usize) -> Self {
        Self {
            kind,
            query,
            start,
            end: start.saturating_add(limit),
            results: SearchResults::default(),
        }
    }

    /// Test one scanned message; returns true if it matched
    pub fn offer(&mut self, message: Message) -> bool {
        if !self.kind.matches(self.query, &message) {
            return false;
        }

        self.results.total += 1;
        let rank = self.results.total;
        if rank >= self.start && rank < self.end {
            self.results.messages.push(message);
        }
        true
    }

    pub fn finish(self) -> SearchResults {
        self.results
    }
}
