//! Per-request search inputs.

use crate::types::RelevanceScores;

/// Who is searching what.
///
/// A context lives for one request; the compiler only borrows it.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    /// Mailbox whose items are searched.
    pub mailbox_id: i32,
    /// Search the dumpster tables instead of the live ones.
    pub dumpster: bool,
    /// Mailbox of the authenticated viewer, when it differs from the
    /// searched one. View events are read from the viewer's mailbox.
    pub viewer_mailbox_id: Option<i32>,
    /// Full-text scores for relevance sorting.
    pub relevance: Option<RelevanceScores>,
    /// Estimated number of unread items in the mailbox. Without an estimate
    /// unread searches never use the tagged-item join.
    pub unread_estimate: Option<u64>,
    /// Estimated number of rows the search will touch.
    pub estimated_rows: Option<u64>,
}

impl SearchContext {
    pub fn new(mailbox_id: i32) -> Self {
        Self {
            mailbox_id,
            ..Self::default()
        }
    }

    pub fn in_dumpster(mut self) -> Self {
        self.dumpster = true;
        self
    }

    pub fn with_viewer(mut self, viewer_mailbox_id: i32) -> Self {
        self.viewer_mailbox_id = Some(viewer_mailbox_id);
        self
    }

    pub fn with_relevance(mut self, scores: RelevanceScores) -> Self {
        self.relevance = Some(scores);
        self
    }

    pub fn with_unread_estimate(mut self, unread: u64) -> Self {
        self.unread_estimate = Some(unread);
        self
    }

    pub fn with_estimated_rows(mut self, rows: u64) -> Self {
        self.estimated_rows = Some(rows);
        self
    }

    /// Mailbox whose event table holds view events.
    pub fn event_mailbox_id(&self) -> i32 {
        self.viewer_mailbox_id.unwrap_or(self.mailbox_id)
    }
}
