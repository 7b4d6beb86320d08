//! Fetch modes and search hits.
//!
//! [`FetchMode::columns`] is the single definition of the SELECT list for each
//! mode. The statement builder projects exactly these columns (followed by the
//! sort column) and the row decoder locates values by looking the column up in
//! the same list, so the two sides cannot drift apart.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::item::ItemType;

/// Which subset of item columns a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchMode {
    /// Id, index id and type only.
    #[default]
    Id,
    /// The full item row.
    Item,
    /// Fields needed by IMAP listings.
    Imap,
    /// The item's modification sequence.
    ModSeq,
    /// The item's parent (conversation) id.
    Parent,
    /// The item's content modification sequence.
    ModContent,
}

/// A column of the item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Type,
    ParentId,
    FolderId,
    PrevFolders,
    IndexId,
    ImapId,
    Date,
    Size,
    Locator,
    BlobDigest,
    Unread,
    Flags,
    TagNames,
    Subject,
    Name,
    Metadata,
    ModMetadata,
    ChangeDate,
    ModContent,
    Uuid,
}

impl Column {
    /// Column name in the item table.
    pub const fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Type => "type",
            Column::ParentId => "parent_id",
            Column::FolderId => "folder_id",
            Column::PrevFolders => "prev_folders",
            Column::IndexId => "index_id",
            Column::ImapId => "imap_id",
            Column::Date => "date",
            Column::Size => "size",
            Column::Locator => "locator",
            Column::BlobDigest => "blob_digest",
            Column::Unread => "unread",
            Column::Flags => "flags",
            Column::TagNames => "tag_names",
            Column::Subject => "subject",
            Column::Name => "name",
            Column::Metadata => "metadata",
            Column::ModMetadata => "mod_metadata",
            Column::ChangeDate => "change_date",
            Column::ModContent => "mod_content",
            Column::Uuid => "uuid",
        }
    }
}

const ID_COLUMNS: &[Column] = &[Column::Id, Column::IndexId, Column::Type];

const ITEM_COLUMNS: &[Column] = &[
    Column::Id,
    Column::Type,
    Column::ParentId,
    Column::FolderId,
    Column::PrevFolders,
    Column::IndexId,
    Column::ImapId,
    Column::Date,
    Column::Size,
    Column::Locator,
    Column::BlobDigest,
    Column::Unread,
    Column::Flags,
    Column::TagNames,
    Column::Subject,
    Column::Name,
    Column::Metadata,
    Column::ModMetadata,
    Column::ChangeDate,
    Column::ModContent,
    Column::Uuid,
];

const IMAP_COLUMNS: &[Column] = &[
    Column::Id,
    Column::IndexId,
    Column::Type,
    Column::ImapId,
    Column::Unread,
    Column::Flags,
    Column::TagNames,
];

const MODSEQ_COLUMNS: &[Column] = &[Column::Id, Column::IndexId, Column::Type, Column::ModMetadata];

const PARENT_COLUMNS: &[Column] = &[Column::Id, Column::IndexId, Column::Type, Column::ParentId];

const MODCONTENT_COLUMNS: &[Column] =
    &[Column::Id, Column::IndexId, Column::Type, Column::ModContent];

impl FetchMode {
    /// The SELECT list of this mode, in order.
    pub fn columns(self) -> &'static [Column] {
        match self {
            FetchMode::Id => ID_COLUMNS,
            FetchMode::Item => ITEM_COLUMNS,
            FetchMode::Imap => IMAP_COLUMNS,
            FetchMode::ModSeq => MODSEQ_COLUMNS,
            FetchMode::Parent => PARENT_COLUMNS,
            FetchMode::ModContent => MODCONTENT_COLUMNS,
        }
    }

    /// Position of a column in this mode's SELECT list.
    pub fn position(self, column: Column) -> Option<usize> {
        self.columns().iter().position(|c| *c == column)
    }

    /// Position of the sort column, which follows the mode's columns.
    pub fn sort_column_position(self) -> usize {
        self.columns().len()
    }
}

/// Sort value carried by a hit; its variant depends on the sort key.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortValue {
    #[default]
    None,
    Text(String),
    Integer(i32),
    Long(i64),
    Float(f32),
}

impl SortValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SortValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SortValue::Integer(v) => Some(i64::from(*v)),
            SortValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SortValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

/// The full item row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    pub id: i32,
    pub item_type: ItemType,
    pub parent_id: Option<i32>,
    pub folder_id: i32,
    pub prev_folders: Option<String>,
    pub index_id: Option<i32>,
    pub imap_id: Option<i32>,
    /// Seconds since the epoch.
    pub date: i64,
    pub size: i64,
    pub locator: Option<String>,
    pub blob_digest: Option<String>,
    pub unread: i32,
    pub flags: i64,
    pub tag_names: Vec<String>,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub metadata: Option<String>,
    pub mod_metadata: i64,
    pub change_date: Option<i64>,
    pub mod_content: i64,
    pub uuid: Option<String>,
    /// The row came from the dumpster table.
    pub dumpster: bool,
}

/// IMAP listing fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImapData {
    pub imap_id: Option<i32>,
    pub unread: i32,
    pub flags: i64,
    pub tag_names: Vec<String>,
}

/// Mode-specific part of a hit.
#[derive(Debug, Clone, PartialEq)]
pub enum HitPayload {
    Id,
    Item(Box<ItemData>),
    Imap(ImapData),
    ModSeq(i64),
    Parent(Option<i32>),
    ModContent(i64),
}

/// One matching item.
///
/// Hits are raw rows; turning them into domain objects is the caller's job.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: i32,
    pub index_id: Option<i32>,
    pub item_type: ItemType,
    pub sort_value: SortValue,
    pub payload: HitPayload,
}

/// Relevance scores from the full-text index, keyed by index id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelevanceScores {
    scores: HashMap<i32, f32>,
}

impl RelevanceScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index_id: i32, score: f32) {
        self.scores.insert(index_id, score);
    }

    /// Score of an index id; unscored items rank last.
    pub fn score(&self, index_id: Option<i32>) -> f32 {
        index_id
            .and_then(|id| self.scores.get(&id).copied())
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

impl FromIterator<(i32, f32)> for RelevanceScores {
    fn from_iter<I: IntoIterator<Item = (i32, f32)>>(iter: I) -> Self {
        Self {
            scores: iter.into_iter().collect(),
        }
    }
}

/// Splits the `\0`-delimited tag name column.
pub fn deserialize_tag_names(encoded: Option<&str>) -> Vec<String> {
    match encoded {
        None => Vec::new(),
        Some(s) => s
            .split('\0')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Joins tag names into the `\0name\0name\0` column format.
pub fn serialize_tag_names<S: AsRef<str>>(names: &[S]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    let mut encoded = String::from("\0");
    for name in names {
        encoded.push_str(name.as_ref());
        encoded.push('\0');
    }
    Some(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_mode_leads_with_identity_columns() {
        for mode in [
            FetchMode::Id,
            FetchMode::Item,
            FetchMode::Imap,
            FetchMode::ModSeq,
            FetchMode::Parent,
            FetchMode::ModContent,
        ] {
            assert_eq!(mode.position(Column::Id), Some(0));
            assert!(mode.position(Column::IndexId).is_some());
            assert!(mode.position(Column::Type).is_some());
        }
        assert_eq!(FetchMode::Item.position(Column::IndexId), Some(5));
        assert_eq!(FetchMode::Imap.sort_column_position(), 7);
    }

    #[test]
    fn test_tag_name_encoding() {
        let encoded = serialize_tag_names(&["work", "urgent"]).unwrap();
        assert_eq!(encoded, "\0work\0urgent\0");
        assert_eq!(deserialize_tag_names(Some(&encoded)), vec!["work", "urgent"]);
        assert!(serialize_tag_names::<&str>(&[]).is_none());
        assert!(deserialize_tag_names(None).is_empty());
    }

    #[test]
    fn test_relevance_scores() {
        let scores: RelevanceScores = [(1, 0.9), (2, 0.5)].into_iter().collect();
        assert_eq!(scores.score(Some(1)), 0.9);
        assert_eq!(scores.score(Some(7)), 0.0);
        assert_eq!(scores.score(None), 0.0);
    }
}
