//! Sort order and result windows.

use serde::{Deserialize, Serialize};

/// The column a search is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    None,
    Date,
    Size,
    Subject,
    Sender,
    Rcpt,
    Name,
    NameNaturalOrder,
    Id,
    Unread,
    Attachment,
    Flag,
    Priority,
    Relevance,
    RecentlyViewed,
}

impl SortKey {
    /// Returns true if the key projects a `sortcol` column and an ORDER BY.
    pub fn has_sort_column(self) -> bool {
        !matches!(self, SortKey::None | SortKey::Relevance)
    }

    /// Keys sorted by a case-folded string column.
    pub fn is_string_column(self) -> bool {
        matches!(
            self,
            SortKey::Subject
                | SortKey::Sender
                | SortKey::Rcpt
                | SortKey::Name
                | SortKey::NameNaturalOrder
        )
    }

    /// Keys whose sort column is numeric.
    pub fn is_numeric_column(self) -> bool {
        matches!(
            self,
            SortKey::Date
                | SortKey::Size
                | SortKey::Id
                | SortKey::Unread
                | SortKey::RecentlyViewed
        )
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// A sort key and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Unordered results.
    pub const NONE: SortSpec = SortSpec::new(SortKey::None, SortDirection::Asc);
    /// Newest first; the default mail listing.
    pub const DATE_DESC: SortSpec = SortSpec::new(SortKey::Date, SortDirection::Desc);
    /// Most relevant first.
    pub const RELEVANCE_DESC: SortSpec = SortSpec::new(SortKey::Relevance, SortDirection::Desc);

    pub const fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    pub const fn asc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Asc)
    }

    pub const fn desc(key: SortKey) -> Self {
        Self::new(key, SortDirection::Desc)
    }

    pub fn is_descending(&self) -> bool {
        self.direction == SortDirection::Desc
    }

    /// Returns true for recipient sorts in either direction.
    pub fn is_recipient_sort(&self) -> bool {
        self.key == SortKey::Rcpt
    }
}

impl Default for SortSpec {
    fn default() -> Self {
        Self::DATE_DESC
    }
}

/// The `[offset, offset + limit)` slice of the ordered results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Window {
    pub offset: usize,
    /// `None` returns every row from `offset` on.
    pub limit: Option<usize>,
}

impl Window {
    /// Every row.
    pub const fn all() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }

    pub const fn new(offset: usize, limit: Option<usize>) -> Self {
        Self { offset, limit }
    }

    /// The first `limit` rows starting at `offset`.
    pub const fn page(offset: usize, limit: usize) -> Self {
        Self::new(offset, Some(limit))
    }

    /// Exclusive end of the window, if bounded.
    pub fn end(&self) -> Option<usize> {
        self.limit.map(|limit| self.offset.saturating_add(limit))
    }

    /// The window covering everything up to this window's end.
    pub fn prefix(&self) -> Window {
        Window::new(0, self.end())
    }

    /// Returns true when no rows are skipped and none are cut.
    pub fn is_unbounded(&self) -> bool {
        self.offset == 0 && self.limit.is_none()
    }

    /// Applies the window to an already ordered list.
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
