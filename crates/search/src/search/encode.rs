//! Constraint tree to predicate encoding.

use std::collections::BTreeSet;

use crate::config::SearchConfig;
use crate::sql::{CompareOp, Expr, Operand, SqlValue};
use crate::types::{
    Capabilities, ConstraintNode, CursorRange, ItemType, Leaf, NumericRange, Range, RangeKind,
    StringRange, TagKind, TagRef,
};

use super::sort::sort_column;

/// Which half of an appointment union a tree is encoded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarPart {
    /// No appointment table is involved.
    None,
    /// The item-table half: appointment-table types are excluded and
    /// calendar ranges are skipped.
    Items,
    /// The half joined with the appointment table.
    Appointments,
}

/// Encodes constraint trees into [`Expr`] predicates.
#[derive(Debug, Clone, Copy)]
pub struct Encoder<'a> {
    caps: &'a Capabilities,
    config: &'a SearchConfig,
    dumpster: bool,
    calendar: CalendarPart,
    tagged_item_join: bool,
}

impl<'a> Encoder<'a> {
    pub fn new(caps: &'a Capabilities, config: &'a SearchConfig, dumpster: bool) -> Self {
        Self {
            caps,
            config,
            dumpster,
            calendar: CalendarPart::None,
            tagged_item_join: false,
        }
    }

    pub fn with_calendar(mut self, calendar: CalendarPart) -> Self {
        self.calendar = calendar;
        self
    }

    /// Encode included tags as a join predicate against `tagged_item AS ti`.
    pub fn with_tagged_item_join(mut self, join: bool) -> Self {
        self.tagged_item_join = join;
        self
    }

    /// Encodes a tree. `None` means the tree does not constrain anything.
    pub fn encode(&self, node: &ConstraintNode) -> Option<Expr> {
        match node {
            ConstraintNode::Leaf(leaf) => self.leaf(leaf),
            ConstraintNode::Intersection(children) => Expr::all(self.children(children)),
            ConstraintNode::Union(children) => Expr::any(self.children(children)),
        }
    }

    fn children(&self, children: &[ConstraintNode]) -> Vec<Expr> {
        children
            .iter()
            .filter(|child| !child.is_empty())
            .filter_map(|child| self.encode(child))
            .collect()
    }

    fn leaf(&self, leaf: &Leaf) -> Option<Expr> {
        if leaf.no_results {
            return Some(Expr::False);
        }
        if leaf.is_empty() {
            return None;
        }

        let mut parts = Vec::new();
        if !leaf.types.is_empty() {
            parts.push(Expr::in_set(
                "mi.type",
                leaf.types.iter().map(|t| t.code()),
                false,
            ));
        } else if !leaf.types_factored_out {
            parts.push(Expr::InLiterals {
                operand: Operand::column("mi.type"),
                values: ItemType::NON_SEARCHABLE
                    .iter()
                    .map(|t| i64::from(t.code()))
                    .collect(),
                negated: true,
            });
        }
        if leaf.exclude_has_recipients {
            parts.push(Expr::is_null("mi.recipients", false));
        }
        if !leaf.exclude_types.is_empty() {
            parts.push(Expr::in_set(
                "mi.type",
                leaf.exclude_types.iter().map(|t| t.code()),
                true,
            ));
        }
        match self.calendar {
            CalendarPart::None => {}
            CalendarPart::Items | CalendarPart::Appointments => parts.push(Expr::in_set(
                "mi.type",
                ItemType::APPOINTMENT_TABLE.iter().map(|t| t.code()),
                self.calendar == CalendarPart::Items,
            )),
        }

        self.tags(&leaf.tags, true, &mut parts);
        self.tags(&leaf.exclude_tags, false, &mut parts);

        if !leaf.folders.is_empty() {
            parts.push(Expr::in_set(
                "mi.folder_id",
                leaf.folders.iter().map(|f| f.id),
                false,
            ));
        }
        if !leaf.exclude_folders.is_empty() {
            parts.push(Expr::in_set(
                "mi.folder_id",
                leaf.exclude_folders.iter().map(|f| f.id),
                true,
            ));
        }

        if let Some(conv_id) = leaf.conv_id {
            parts.push(Expr::eq_param("mi.parent_id", conv_id));
        } else if !leaf.prohibited_conv_ids.is_empty() {
            parts.push(Expr::in_set(
                "mi.parent_id",
                leaf.prohibited_conv_ids.iter().copied(),
                true,
            ));
        }
        if !leaf.item_ids.is_empty() {
            parts.push(Expr::in_set("mi.id", leaf.item_ids.iter().copied(), false));
        }
        if !leaf.prohibited_item_ids.is_empty() {
            parts.push(Expr::in_set(
                "mi.id",
                leaf.prohibited_item_ids.iter().copied(),
                true,
            ));
        }
        if !leaf.index_ids.is_empty() {
            parts.push(Expr::in_set(
                "mi.index_id",
                leaf.index_ids.iter().copied(),
                false,
            ));
        }

        if let Some(cursor) = &leaf.cursor_range
            && let Some(expr) = self.cursor(cursor)
        {
            parts.push(expr);
        }

        for (kind, ranges) in &leaf.ranges {
            for range in ranges {
                let encoded = match range {
                    Range::Numeric(r) if !kind.is_string() => self.numeric_range(*kind, r),
                    Range::String(r) if kind.is_string() => self.string_range(*kind, r),
                    _ => None,
                };
                parts.extend(encoded);
            }
        }

        if let Some(solo) = leaf.is_solo_part {
            parts.push(Expr::is_null("mi.parent_id", !solo));
        }
        if let Some(has_index_id) = leaf.has_index_id {
            parts.push(Expr::is_null("mi.index_id", has_index_id));
        }

        if parts.is_empty() {
            None
        } else {
            Some(Expr::And(parts))
        }
    }

    fn tags(&self, tags: &BTreeSet<TagRef>, include: bool, parts: &mut Vec<Expr>) {
        if tags.is_empty() {
            return;
        }
        if self.dumpster {
            self.dumpster_tags(tags, include, parts);
            return;
        }

        let table = self.config.tables.tagged_item.clone();
        let item_match = |mut filter: Vec<Expr>| {
            let mut scoped = Vec::with_capacity(filter.len() + 2);
            if self.config.mailbox_groups {
                scoped.push(Expr::columns_eq("mi.mailbox_id", "ti.mailbox_id"));
            }
            scoped.push(Expr::columns_eq("mi.id", "ti.item_id"));
            scoped.append(&mut filter);
            Expr::And(scoped)
        };

        if !include {
            parts.push(Expr::Exists {
                table,
                alias: "ti",
                filter: Box::new(item_match(vec![Expr::in_set(
                    "ti.tag_id",
                    tags.iter().map(|t| t.id),
                    false,
                )])),
                negated: true,
            });
        } else if self.tagged_item_join {
            for tag in tags {
                let mut join = vec![Expr::columns_eq("mi.id", "ti.item_id")];
                if self.config.mailbox_groups {
                    join.push(Expr::columns_eq("mi.mailbox_id", "ti.mailbox_id"));
                }
                join.push(Expr::eq_param("ti.tag_id", tag.id));
                parts.push(Expr::And(join));
            }
        } else {
            for tag in tags {
                parts.push(Expr::Exists {
                    table: table.clone(),
                    alias: "ti",
                    filter: Box::new(item_match(vec![Expr::eq_param("ti.tag_id", tag.id)])),
                    negated: false,
                });
            }
        }
    }

    // The dumpster has no tagged-item table, so tags are matched against
    // the denormalized item columns.
    fn dumpster_tags(
        &self,
        tags: &BTreeSet<TagRef>,
        include: bool,
        parts: &mut Vec<Expr>,
    ) {
        let mut mask = 0i64;
        for tag in tags {
            match tag.kind {
                _ if tag.is_unread_flag() => {
                    parts.push(Expr::eq_param("mi.unread", i32::from(include)));
                }
                TagKind::Flag { bitmask } => mask |= bitmask,
                TagKind::User => {
                    let contains = Expr::Contains {
                        operand: Operand::column("mi.tag_names"),
                        needle: format!("\0{}\0", tag.name),
                        negated: !include,
                    };
                    if include {
                        parts.push(contains);
                    } else {
                        // NULL never matches a substring test.
                        parts.push(Expr::Or(vec![Expr::is_null("mi.tag_names", false), contains]));
                    }
                }
            }
        }
        if mask != 0 {
            parts.push(Expr::compare(
                Operand::column("mi.flags").bit_and(Operand::param(mask)),
                CompareOp::Eq,
                Operand::param(if include { mask } else { 0 }),
            ));
        }
    }

    fn cursor(&self, cursor: &CursorRange) -> Option<Expr> {
        let column = sort_column(cursor.sort_key, self.caps)?;
        let numeric = cursor.sort_key.is_numeric_column();
        let value = |raw: &str| {
            let text = unescape_quotes(raw);
            let parsed = text.trim().parse::<i64>();
            match parsed {
                Ok(v) if numeric => SqlValue::Integer(v),
                _ => SqlValue::Text(text),
            }
        };
        let mut bounds = Vec::new();
        if let Some(min) = &cursor.min {
            bounds.push(Expr::compare(
                column.clone(),
                CompareOp::lower_bound(cursor.min_inclusive),
                Operand::Param(value(min)),
            ));
        }
        if let Some(max) = &cursor.max {
            bounds.push(Expr::compare(
                column,
                CompareOp::upper_bound(cursor.max_inclusive),
                Operand::Param(value(max)),
            ));
        }
        if bounds.is_empty() {
            None
        } else {
            Some(Expr::And(bounds))
        }
    }

    fn numeric_range(&self, kind: RangeKind, range: &NumericRange) -> Option<Expr> {
        let column = match kind {
            RangeKind::ItemId => "mi.id",
            RangeKind::Date => "mi.date",
            RangeKind::MDate => "mi.change_date",
            RangeKind::ModSeq => "mi.mod_metadata",
            RangeKind::Size => "mi.size",
            RangeKind::CalStart | RangeKind::CalEnd
                if self.calendar != CalendarPart::Appointments =>
            {
                return None;
            }
            RangeKind::CalStart => "ap.start_time",
            RangeKind::CalEnd => "ap.end_time",
            RangeKind::Sender | RangeKind::Subject => return None,
        };
        let cutoff = kind.cutoff();
        let low = range.min.filter(|v| *v >= cutoff);
        let high = range.max.filter(|v| *v >= cutoff);
        if low.is_none() && high.is_none() {
            return None;
        }
        let value = |v: i64| match kind {
            RangeKind::Date | RangeKind::MDate => {
                SqlValue::Integer((v / 1000).min(i64::from(i32::MAX)))
            }
            RangeKind::CalStart | RangeKind::CalEnd => SqlValue::timestamp_millis(v),
            _ => SqlValue::Integer(v),
        };

        let mut bounds = Vec::with_capacity(2);
        if let Some(v) = low {
            bounds.push(Expr::compare(
                Operand::column(column),
                CompareOp::lower_bound(range.min_inclusive),
                Operand::Param(value(v)),
            ));
        }
        if let Some(v) = high {
            bounds.push(Expr::compare(
                Operand::column(column),
                CompareOp::upper_bound(range.max_inclusive),
                Operand::Param(value(v)),
            ));
        }
        Some(polarity(Expr::And(bounds), range.positive))
    }

    fn string_range(&self, kind: RangeKind, range: &StringRange) -> Option<Expr> {
        let column = match kind {
            RangeKind::Sender => "mi.sender",
            RangeKind::Subject => "mi.subject",
            _ => return None,
        };
        if range.min.is_none() && range.max.is_none() {
            return None;
        }
        let fold = self.caps.case_sensitive_comparison;
        let operand = || {
            if fold {
                Operand::column(column).upper()
            } else {
                Operand::column(column)
            }
        };
        let value = |raw: &str| {
            let text = unescape_quotes(raw);
            SqlValue::Text(if fold { text.to_uppercase() } else { text })
        };

        let mut bounds = Vec::with_capacity(2);
        if let Some(min) = &range.min {
            bounds.push(Expr::compare(
                operand(),
                CompareOp::lower_bound(range.min_inclusive),
                Operand::Param(value(min)),
            ));
        }
        if let Some(max) = &range.max {
            bounds.push(Expr::compare(
                operand(),
                CompareOp::upper_bound(range.max_inclusive),
                Operand::Param(value(max)),
            ));
        }
        Some(polarity(Expr::And(bounds), range.positive))
    }
}

fn polarity(expr: Expr, positive: bool) -> Expr {
    if positive { expr } else { Expr::negate(expr) }
}

fn unescape_quotes(raw: &str) -> String {
    raw.replace("\\\"", "\"")
}
