//! Core types for search constraints, sorting and results.

pub mod capabilities;
pub mod constraints;
pub mod fetch;
pub mod item;
pub mod sort;

pub use capabilities::{Capabilities, Dialect};
pub use constraints::{
    ConstraintNode, CursorRange, DEFAULT_MAX_OPTIMIZE_PASSES, Leaf, NumericRange, Range,
    RangeKind, StringRange,
};
pub use fetch::{
    Column, FetchMode, HitPayload, ImapData, ItemData, RelevanceScores, SearchHit, SortValue,
};
pub use item::{FolderRef, ID_FOLDER_DRAFTS, ID_FOLDER_USER_ROOT, ItemType, TagKind, TagRef, flags};
pub use sort::{SortDirection, SortKey, SortSpec, Window};
