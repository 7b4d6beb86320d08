//! Sort-column projection, ORDER BY rendering and the in-memory comparator.
//!
//! The comparator has to agree with the SQL ordering exactly: split
//! searches merge per-arm results in memory and must come out in the order a
//! single statement would have produced.

use std::cmp::Ordering;

use crate::sql::{Operand, SqlValue, SqlWriter};
use crate::types::flags::{
    BITMASK_ATTACHED, BITMASK_FLAGGED, BITMASK_HIGH_PRIORITY, BITMASK_LOW_PRIORITY,
};
use crate::types::{Capabilities, RelevanceScores, SearchHit, SortKey, SortSpec, SortValue};

/// Alias of the projected sort column.
pub const SORT_COLUMN_ALIAS: &str = "sortcol";

/// The expression a sort key orders by, or `None` for unordered keys.
pub fn sort_column(key: SortKey, caps: &Capabilities) -> Option<Operand> {
    let column = match key {
        SortKey::None | SortKey::Relevance => return None,
        SortKey::Date => Operand::column("mi.date"),
        SortKey::Size => Operand::column("mi.size"),
        SortKey::Id => Operand::column("mi.id"),
        SortKey::Unread => Operand::column("mi.unread"),
        SortKey::Subject => string_column("mi.subject", caps),
        SortKey::Sender => string_column("mi.sender", caps),
        SortKey::Rcpt => string_column("mi.recipients", caps),
        SortKey::Name | SortKey::NameNaturalOrder => string_column("mi.name", caps),
        SortKey::Attachment => flag_column(BITMASK_ATTACHED),
        SortKey::Flag => flag_column(BITMASK_FLAGGED),
        SortKey::Priority => Operand::Literal(1)
            .add(flag_sign(BITMASK_HIGH_PRIORITY))
            .sub(flag_sign(BITMASK_LOW_PRIORITY))
            .concat(padded_id()),
        SortKey::RecentlyViewed => Operand::column("e.ts").coalesce(0),
    };
    Some(column)
}

fn padded_id() -> Operand {
    Operand::column("mi.id").pad_id()
}

fn string_column(column: &str, caps: &Capabilities) -> Operand {
    let column = Operand::column(column);
    let folded = if caps.case_sensitive_comparison {
        column.upper()
    } else {
        column
    };
    folded.concat(padded_id())
}

fn flag_sign(mask: i64) -> Operand {
    Operand::column("mi.flags")
        .bit_and(Operand::Literal(mask))
        .sign()
}

fn flag_column(mask: i64) -> Operand {
    flag_sign(mask).concat(padded_id())
}

/// Writes ` ORDER BY ...` for the sort, if it has one.
///
/// `id_column` is the tie-break column: `mi.id` inside a single statement,
/// plain `id` over a union subquery.
pub fn write_order_by(writer: &mut SqlWriter<'_>, sort: &SortSpec, id_column: &str) {
    if !sort.key.has_sort_column() {
        return;
    }
    let desc = sort.is_descending();
    let clause = match sort.key {
        SortKey::RecentlyViewed => format!("{SORT_COLUMN_ALIAS} DESC, {id_column} DESC"),
        SortKey::Unread => {
            let direction = if desc { "" } else { " DESC" };
            format!("{SORT_COLUMN_ALIAS}{direction}, {id_column} DESC")
        }
        SortKey::Id => {
            let direction = if desc { " DESC" } else { "" };
            format!("{SORT_COLUMN_ALIAS}{direction}")
        }
        _ => {
            let direction = if desc { " DESC" } else { "" };
            format!("{SORT_COLUMN_ALIAS}{direction}, {id_column}{direction}")
        }
    };
    writer.push(" ORDER BY ").push(&clause);
}

/// Builds a hit's sort value from the raw sort column.
pub fn sort_value(
    sort: &SortSpec,
    raw: Option<&SqlValue>,
    index_id: Option<i32>,
    relevance: Option<&RelevanceScores>,
) -> SortValue {
    let int = || raw.and_then(SqlValue::as_i64).unwrap_or(0);
    match sort.key {
        SortKey::None => SortValue::None,
        SortKey::Relevance => {
            SortValue::Float(relevance.map_or(0.0, |scores| scores.score(index_id)))
        }
        SortKey::Date => SortValue::Long(int().saturating_mul(1000)),
        SortKey::Size | SortKey::RecentlyViewed => SortValue::Long(int()),
        SortKey::Id | SortKey::Unread => {
            SortValue::Integer(i32::try_from(int()).unwrap_or(i32::MAX))
        }
        SortKey::Subject
        | SortKey::Sender
        | SortKey::Rcpt
        | SortKey::Name
        | SortKey::NameNaturalOrder
        | SortKey::Attachment
        | SortKey::Flag
        | SortKey::Priority => SortValue::Text(raw.and_then(SqlValue::to_text).unwrap_or_default()),
    }
}

fn by_direction(ordering: Ordering, descending: bool) -> Ordering {
    if descending {
        ordering.reverse()
    } else {
        ordering
    }
}

fn compare_values(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Text(x), SortValue::Text(y)) => x.cmp(y),
        (SortValue::Float(x), SortValue::Float(y)) => x.total_cmp(y),
        _ => a.as_i64().unwrap_or(0).cmp(&b.as_i64().unwrap_or(0)),
    }
}

/// Orders two hits the way the SQL ORDER BY for `sort` would.
pub fn compare_hits(sort: &SortSpec, a: &SearchHit, b: &SearchHit) -> Ordering {
    let desc = sort.is_descending();
    match sort.key {
        SortKey::None | SortKey::Id => by_direction(a.id.cmp(&b.id), desc),
        SortKey::Relevance => by_direction(compare_values(&a.sort_value, &b.sort_value), desc)
            .then_with(|| a.id.cmp(&b.id)),
        SortKey::RecentlyViewed => compare_values(&a.sort_value, &b.sort_value)
            .reverse()
            .then_with(|| b.id.cmp(&a.id)),
        SortKey::Unread => by_direction(compare_values(&a.sort_value, &b.sort_value), !desc)
            .then_with(|| b.id.cmp(&a.id)),
        _ => by_direction(compare_values(&a.sort_value, &b.sort_value), desc)
            .then_with(|| by_direction(a.id.cmp(&b.id), desc)),
    }
}

/// Sorts hits in place by [`compare_hits`].
pub fn sort_hits(hits: &mut [SearchHit], sort: &SortSpec) {
    hits.sort_by(|a, b| compare_hits(sort, a, b));
}
