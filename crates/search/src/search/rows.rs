//! Result row decoding.

use crate::backend::Row;
use crate::error::{SearchError, SearchResult};
use crate::sql::SqlValue;
use crate::types::fetch::deserialize_tag_names;
use crate::types::{
    Column, FetchMode, HitPayload, ImapData, ItemData, ItemType, RelevanceScores, SearchHit,
    SortSpec,
};

use super::sort::sort_value;

/// Turns rows of a search statement into hits.
///
/// Columns are located through [`FetchMode::position`], the same list the
/// statement builder projects.
#[derive(Debug, Clone, Copy)]
pub struct RowDecoder<'a> {
    fetch: FetchMode,
    sort: &'a SortSpec,
    relevance: Option<&'a RelevanceScores>,
    dumpster: bool,
}

impl<'a> RowDecoder<'a> {
    pub fn new(
        fetch: FetchMode,
        sort: &'a SortSpec,
        relevance: Option<&'a RelevanceScores>,
        dumpster: bool,
    ) -> Self {
        Self {
            fetch,
            sort,
            relevance,
            dumpster,
        }
    }

    pub fn decode_all(&self, rows: &[Row]) -> SearchResult<Vec<SearchHit>> {
        rows.iter().map(|row| self.decode(row)).collect()
    }

    pub fn decode(&self, row: &Row) -> SearchResult<SearchHit> {
        let id = self.required_i32(row, Column::Id)?;
        let index_id = self.optional_i32(row, Column::IndexId)?;
        let item_type = ItemType::from_code(self.required(row, Column::Type)?);

        let raw_sort = if self.sort.key.has_sort_column() {
            Some(
                row.get(self.fetch.sort_column_position())
                    .ok_or_else(|| missing("sortcol"))?,
            )
        } else {
            None
        };
        let sort_value = sort_value(self.sort, raw_sort, index_id, self.relevance);

        let payload = match self.fetch {
            FetchMode::Id => HitPayload::Id,
            FetchMode::Item => HitPayload::Item(Box::new(self.item(row, id, item_type, index_id)?)),
            FetchMode::Imap => HitPayload::Imap(ImapData {
                imap_id: self.optional_i32(row, Column::ImapId)?,
                unread: self.required_i32(row, Column::Unread)?,
                flags: self.required(row, Column::Flags)?,
                tag_names: deserialize_tag_names(self.text(row, Column::TagNames)?.as_deref()),
            }),
            FetchMode::ModSeq => HitPayload::ModSeq(self.required(row, Column::ModMetadata)?),
            FetchMode::Parent => HitPayload::Parent(self.optional_i32(row, Column::ParentId)?),
            FetchMode::ModContent => HitPayload::ModContent(self.required(row, Column::ModContent)?),
        };

        Ok(SearchHit {
            id,
            index_id,
            item_type,
            sort_value,
            payload,
        })
    }

    fn item(
        &self,
        row: &Row,
        id: i32,
        item_type: ItemType,
        index_id: Option<i32>,
    ) -> SearchResult<ItemData> {
        Ok(ItemData {
            id,
            item_type,
            parent_id: self.optional_i32(row, Column::ParentId)?,
            folder_id: self.required_i32(row, Column::FolderId)?,
            prev_folders: self.text(row, Column::PrevFolders)?,
            index_id,
            imap_id: self.optional_i32(row, Column::ImapId)?,
            date: self.required(row, Column::Date)?,
            size: self.required(row, Column::Size)?,
            locator: self.text(row, Column::Locator)?,
            blob_digest: self.text(row, Column::BlobDigest)?,
            unread: self.required_i32(row, Column::Unread)?,
            flags: self.required(row, Column::Flags)?,
            tag_names: deserialize_tag_names(self.text(row, Column::TagNames)?.as_deref()),
            subject: self.text(row, Column::Subject)?,
            name: self.text(row, Column::Name)?,
            metadata: self.text(row, Column::Metadata)?,
            mod_metadata: self.required(row, Column::ModMetadata)?,
            change_date: self.optional(row, Column::ChangeDate)?,
            mod_content: self.required(row, Column::ModContent)?,
            uuid: self.text(row, Column::Uuid)?,
            dumpster: self.dumpster,
        })
    }

    fn value<'r>(&self, row: &'r Row, column: Column) -> SearchResult<&'r SqlValue> {
        self.fetch
            .position(column)
            .and_then(|index| row.get(index))
            .ok_or_else(|| missing(column.name()))
    }

    fn optional(&self, row: &Row, column: Column) -> SearchResult<Option<i64>> {
        match self.value(row, column)? {
            SqlValue::Null => Ok(None),
            value => value.as_i64().map(Some).ok_or_else(|| SearchError::RowDecode {
                column: column.name(),
                message: format!("expected an integer, got {value:?}"),
            }),
        }
    }

    fn required(&self, row: &Row, column: Column) -> SearchResult<i64> {
        self.optional(row, column)?.ok_or_else(|| SearchError::RowDecode {
            column: column.name(),
            message: "unexpected NULL".to_string(),
        })
    }

    fn optional_i32(&self, row: &Row, column: Column) -> SearchResult<Option<i32>> {
        self.optional(row, column)?
            .map(|v| narrow(column, v))
            .transpose()
    }

    fn required_i32(&self, row: &Row, column: Column) -> SearchResult<i32> {
        narrow(column, self.required(row, column)?)
    }

    fn text(&self, row: &Row, column: Column) -> SearchResult<Option<String>> {
        Ok(self.value(row, column)?.to_text())
    }
}

fn narrow(column: Column, value: i64) -> SearchResult<i32> {
    i32::try_from(value).map_err(|_| SearchError::RowDecode {
        column: column.name(),
        message: format!("{value} does not fit in 32 bits"),
    })
}

fn missing(column: &'static str) -> SearchError {
    SearchError::RowDecode {
        column,
        message: "column missing from result row".to_string(),
    }
}
