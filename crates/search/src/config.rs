//! Compiler configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the constraint compiler.
///
/// Every field has a serde default so a partial document (or `{}`) yields a
/// working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Scope every statement with `mi.mailbox_id = ?`.
    ///
    /// Disable only when each mailbox has dedicated tables.
    #[serde(default = "default_true")]
    pub mailbox_groups: bool,

    /// Never emit index hints, even when the backend supports them.
    #[serde(default)]
    pub disable_index_hints: bool,

    /// Item count below which a single-tag search joins the tagged-item
    /// table instead of using an `EXISTS` sub-query.
    #[serde(default = "default_tagged_item_join_cutoff")]
    pub tagged_item_join_cutoff: u64,

    /// Estimated row count above which the backend is asked to stream.
    #[serde(default = "default_streaming_row_threshold")]
    pub streaming_row_threshold: u64,

    /// Parameters kept in reserve when computing the folder soft limit.
    #[serde(default = "default_split_safety_margin")]
    pub split_safety_margin: usize,

    /// Upper bound on optimizer passes before giving up on a fixpoint.
    #[serde(default = "default_max_optimize_passes")]
    pub max_optimize_passes: usize,

    /// Operation code of "item viewed" rows in the event table.
    #[serde(default = "default_view_event_op")]
    pub view_event_op: i32,

    /// Table names.
    #[serde(default)]
    pub tables: TableNames,
}

/// Names of the tables the compiler reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableNames {
    #[serde(default = "default_mail_item")]
    pub mail_item: String,
    #[serde(default = "default_mail_item_dumpster")]
    pub mail_item_dumpster: String,
    #[serde(default = "default_appointment")]
    pub appointment: String,
    #[serde(default = "default_appointment_dumpster")]
    pub appointment_dumpster: String,
    #[serde(default = "default_tagged_item")]
    pub tagged_item: String,
    #[serde(default = "default_event")]
    pub event: String,
}

impl TableNames {
    /// Item table for live or dumpster searches.
    pub fn items(&self, dumpster: bool) -> &str {
        if dumpster {
            &self.mail_item_dumpster
        } else {
            &self.mail_item
        }
    }

    /// Calendar table for live or dumpster searches.
    pub fn appointments(&self, dumpster: bool) -> &str {
        if dumpster {
            &self.appointment_dumpster
        } else {
            &self.appointment
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tagged_item_join_cutoff() -> u64 {
    1000
}

fn default_streaming_row_threshold() -> u64 {
    10_000
}

fn default_split_safety_margin() -> usize {
    10
}

fn default_max_optimize_passes() -> usize {
    16
}

fn default_view_event_op() -> i32 {
    9
}

fn default_mail_item() -> String {
    "mail_item".to_string()
}

fn default_mail_item_dumpster() -> String {
    "mail_item_dumpster".to_string()
}

fn default_appointment() -> String {
    "appointment".to_string()
}

fn default_appointment_dumpster() -> String {
    "appointment_dumpster".to_string()
}

fn default_tagged_item() -> String {
    "tagged_item".to_string()
}

fn default_event() -> String {
    "event".to_string()
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            mail_item: default_mail_item(),
            mail_item_dumpster: default_mail_item_dumpster(),
            appointment: default_appointment(),
            appointment_dumpster: default_appointment_dumpster(),
            tagged_item: default_tagged_item(),
            event: default_event(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            mailbox_groups: true,
            disable_index_hints: false,
            tagged_item_join_cutoff: default_tagged_item_join_cutoff(),
            streaming_row_threshold: default_streaming_row_threshold(),
            split_safety_margin: default_split_safety_margin(),
            max_optimize_passes: default_max_optimize_passes(),
            view_event_op: default_view_event_op(),
            tables: TableNames::default(),
        }
    }
}
