//! Item types, folders and tags referenced by search constraints.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Id of the user root folder.
pub const ID_FOLDER_USER_ROOT: i32 = 1;

/// Id of the drafts folder.
pub const ID_FOLDER_DRAFTS: i32 = 6;

/// Well-known system flags. Flag ids are negative.
pub mod flags {
    /// Item has an attachment.
    pub const ID_ATTACHED: i32 = -2;
    /// Item is flagged.
    pub const ID_FLAGGED: i32 = -6;
    /// Item is unread.
    pub const ID_UNREAD: i32 = -10;
    /// High priority.
    pub const ID_HIGH_PRIORITY: i32 = -11;
    /// Low priority.
    pub const ID_LOW_PRIORITY: i32 = -12;

    /// Bit of `mail_item.flags` holding the flag with the given id.
    pub const fn bitmask(id: i32) -> i64 {
        1i64 << (-id - 1)
    }

    /// `mail_item.flags` bit for [`ID_ATTACHED`].
    pub const BITMASK_ATTACHED: i64 = bitmask(ID_ATTACHED);
    /// `mail_item.flags` bit for [`ID_FLAGGED`].
    pub const BITMASK_FLAGGED: i64 = bitmask(ID_FLAGGED);
    /// `mail_item.flags` bit for [`ID_HIGH_PRIORITY`].
    pub const BITMASK_HIGH_PRIORITY: i64 = bitmask(ID_HIGH_PRIORITY);
    /// `mail_item.flags` bit for [`ID_LOW_PRIORITY`].
    pub const BITMASK_LOW_PRIORITY: i64 = bitmask(ID_LOW_PRIORITY);
}

/// Mail item types with their stored type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Folder,
    SearchFolder,
    Tag,
    Conversation,
    Message,
    Contact,
    Document,
    Note,
    Flag,
    Appointment,
    VirtualConversation,
    Mountpoint,
    Wiki,
    Task,
    Chat,
    Comment,
    Link,
    SmartFolder,
    Unknown,
}

impl ItemType {
    /// Every known type, excluding [`ItemType::Unknown`].
    pub const KNOWN: [ItemType; 18] = [
        ItemType::Folder,
        ItemType::SearchFolder,
        ItemType::Tag,
        ItemType::Conversation,
        ItemType::Message,
        ItemType::Contact,
        ItemType::Document,
        ItemType::Note,
        ItemType::Flag,
        ItemType::Appointment,
        ItemType::VirtualConversation,
        ItemType::Mountpoint,
        ItemType::Wiki,
        ItemType::Task,
        ItemType::Chat,
        ItemType::Comment,
        ItemType::Link,
        ItemType::SmartFolder,
    ];

    /// Types that never show up in search results unless asked for explicitly.
    pub const NON_SEARCHABLE: [ItemType; 5] = [
        ItemType::Folder,
        ItemType::SearchFolder,
        ItemType::Mountpoint,
        ItemType::Tag,
        ItemType::Conversation,
    ];

    /// Types whose rows have a companion row in the appointment table.
    pub const APPOINTMENT_TABLE: [ItemType; 2] = [ItemType::Appointment, ItemType::Task];

    /// Stored type code.
    pub const fn code(self) -> i8 {
        match self {
            ItemType::Folder => 1,
            ItemType::SearchFolder => 2,
            ItemType::Tag => 3,
            ItemType::Conversation => 4,
            ItemType::Message => 5,
            ItemType::Contact => 6,
            ItemType::Document => 8,
            ItemType::Note => 9,
            ItemType::Flag => 10,
            ItemType::Appointment => 11,
            ItemType::VirtualConversation => 12,
            ItemType::Mountpoint => 13,
            ItemType::Wiki => 14,
            ItemType::Task => 15,
            ItemType::Chat => 16,
            ItemType::Comment => 17,
            ItemType::Link => 18,
            ItemType::SmartFolder => 19,
            ItemType::Unknown => -1,
        }
    }

    /// Maps a stored type code back to a type.
    pub fn from_code(code: i64) -> ItemType {
        ItemType::KNOWN
            .into_iter()
            .find(|t| i64::from(t.code()) == code)
            .unwrap_or(ItemType::Unknown)
    }

    /// Returns true for appointments and tasks.
    pub fn is_appointment_table_type(self) -> bool {
        Self::APPOINTMENT_TABLE.contains(&self)
    }
}

/// A folder referenced by a constraint.
///
/// Folders compare and hash by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRef {
    pub id: i32,
    pub name: String,
}

impl FolderRef {
    /// Creates a folder reference.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The drafts folder.
    pub fn drafts() -> Self {
        Self::new(ID_FOLDER_DRAFTS, "Drafts")
    }

    /// Returns true if this is the drafts folder.
    pub fn is_drafts(&self) -> bool {
        self.id == ID_FOLDER_DRAFTS
    }
}

impl PartialEq for FolderRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FolderRef {}

impl Hash for FolderRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for FolderRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FolderRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// Whether a tag is a system flag or a user-defined tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
    /// System flag stored as a bit in `mail_item.flags`.
    Flag { bitmask: i64 },
    /// User tag stored in the tagged-item table and in `mail_item.tag_names`.
    User,
}

/// A tag or flag referenced by a constraint.
///
/// Tags compare and hash by id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRef {
    pub id: i32,
    pub name: String,
    pub kind: TagKind,
    /// Number of items carrying the tag, used for join planning.
    #[serde(default)]
    pub item_count: u64,
}

impl TagRef {
    /// Creates a system flag reference.
    pub fn flag(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TagKind::Flag {
                bitmask: flags::bitmask(id),
            },
            item_count: 0,
        }
    }

    /// Creates a user tag reference.
    pub fn user(id: i32, name: impl Into<String>, item_count: u64) -> Self {
        Self {
            id,
            name: name.into(),
            kind: TagKind::User,
            item_count,
        }
    }

    pub fn unread() -> Self {
        Self::flag(flags::ID_UNREAD, "\\Unread")
    }

    pub fn attached() -> Self {
        Self::flag(flags::ID_ATTACHED, "\\Attached")
    }

    pub fn flagged() -> Self {
        Self::flag(flags::ID_FLAGGED, "\\Flagged")
    }

    pub fn high_priority() -> Self {
        Self::flag(flags::ID_HIGH_PRIORITY, "\\Urgent")
    }

    pub fn low_priority() -> Self {
        Self::flag(flags::ID_LOW_PRIORITY, "\\Bulk")
    }

    /// Returns the flag bit, or `None` for user tags.
    pub fn bitmask(&self) -> Option<i64> {
        match self.kind {
            TagKind::Flag { bitmask } => Some(bitmask),
            TagKind::User => None,
        }
    }

    pub fn is_unread_flag(&self) -> bool {
        self.id == flags::ID_UNREAD
    }

    pub fn is_user_tag(&self) -> bool {
        self.kind == TagKind::User
    }
}

impl PartialEq for TagRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TagRef {}

impl Hash for TagRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TagRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TagRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        for t in ItemType::KNOWN {
            assert_eq!(ItemType::from_code(i64::from(t.code())), t);
        }
        assert_eq!(ItemType::from_code(7), ItemType::Unknown);
    }

    #[test]
    fn test_flag_bitmasks() {
        assert_eq!(flags::BITMASK_ATTACHED, 2);
        assert_eq!(flags::BITMASK_FLAGGED, 32);
        assert_eq!(flags::bitmask(flags::ID_UNREAD), 512);
        assert_eq!(flags::BITMASK_HIGH_PRIORITY, 1024);
        assert_eq!(flags::BITMASK_LOW_PRIORITY, 2048);
        assert_eq!(TagRef::flagged().bitmask(), Some(32));
        assert_eq!(TagRef::user(64, "work", 3).bitmask(), None);
    }

    #[test]
    fn test_refs_compare_by_id() {
        assert_eq!(FolderRef::new(2, "Inbox"), FolderRef::new(2, "renamed"));
        assert!(FolderRef::new(2, "Inbox") < FolderRef::drafts());
        assert_eq!(TagRef::user(70, "a", 0), TagRef::user(70, "b", 9));
    }
}
