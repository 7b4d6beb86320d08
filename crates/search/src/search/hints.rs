//! Index hint selection.

use crate::config::SearchConfig;
use crate::types::{Capabilities, ConstraintNode, SortKey, SortSpec, Window};

/// `(mailbox_id, folder_id, date)`.
pub const I_FOLDER_ID_DATE: &str = "i_folder_id_date";
/// `(mailbox_id, parent_id)`.
pub const I_PARENT_ID: &str = "i_parent_id";
/// `(mailbox_id, index_id)`.
pub const I_INDEX_ID: &str = "i_index_id";

/// Picks the index to force on the item table, if any.
///
/// Only single leaves get a hint; the optimizer is trusted with anything
/// more complex.
pub fn index_hint(
    node: &ConstraintNode,
    sort: &SortSpec,
    window: Window,
    caps: &Capabilities,
    config: &SearchConfig,
) -> Option<&'static str> {
    if !caps.supports_index_hints || config.disable_index_hints {
        return None;
    }
    if sort.key == SortKey::None && !caps.force_index_even_if_no_sort {
        return None;
    }
    let leaf = node.as_leaf()?;
    if !leaf.item_ids.is_empty() {
        None
    } else if leaf.conv_id.is_some() {
        Some(I_PARENT_ID)
    } else if !leaf.index_ids.is_empty() {
        Some(I_INDEX_ID)
    } else if sort.key == SortKey::Date && window.limit.is_some() && leaf.only_folder().is_some() {
        Some(I_FOLDER_ID_DATE)
    } else {
        None
    }
}
