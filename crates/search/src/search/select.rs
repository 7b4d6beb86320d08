//! SELECT and COUNT statement assembly.
//!
//! A search compiles to one of three shapes. Trees without calendar ranges
//! read the item table alone. Trees that only match appointments and tasks
//! with a calendar range join the appointment table. Trees mixing both get
//! a `UNION ALL` of the two halves wrapped in a subquery, so one outer
//! ORDER BY and LIMIT order the combined rows.

use tracing::debug;

use crate::config::SearchConfig;
use crate::sql::{CompiledQuery, Expr, SqlValue, SqlWriter};
use crate::types::{Capabilities, ConstraintNode, FetchMode, SortKey, SortSpec, Window};

use super::context::SearchContext;
use super::encode::{CalendarPart, Encoder};
use super::hints::index_hint;
use super::sort::{SORT_COLUMN_ALIAS, sort_column, write_order_by};

/// Tables a search statement reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// The item table only.
    Items,
    /// The item table joined with the appointment table.
    Appointments,
    /// Both of the above combined with `UNION ALL`.
    Union,
}

/// A search statement plus what the executor needs to know about it.
#[derive(Debug, Clone)]
pub struct SearchStatement {
    pub query: CompiledQuery,
    pub shape: QueryShape,
    /// The window was rendered as a LIMIT clause.
    pub limit_applied: bool,
}

#[derive(Debug, Clone, Copy)]
struct SelectPart {
    calendar: CalendarPart,
    tagged_item_join: bool,
    exclude_no_recipients: bool,
    hint: Option<&'static str>,
}

/// Assembles statements for one backend and request.
#[derive(Debug, Clone, Copy)]
pub struct StatementBuilder<'a> {
    caps: &'a Capabilities,
    config: &'a SearchConfig,
    context: &'a SearchContext,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(caps: &'a Capabilities, config: &'a SearchConfig, context: &'a SearchContext) -> Self {
        Self {
            caps,
            config,
            context,
        }
    }

    /// Decides which tables a tree needs.
    pub fn shape(node: &ConstraintNode) -> QueryShape {
        let appointments = node.has_appointment_table_constraints();
        let items = !appointments || node.has_non_appointment_types();
        match (items, appointments) {
            (true, true) => QueryShape::Union,
            (false, true) => QueryShape::Appointments,
            _ => QueryShape::Items,
        }
    }

    /// Returns true if the single included tag is cheaper to join than to
    /// test with a subquery.
    pub fn uses_tagged_item_join(&self, node: &ConstraintNode) -> bool {
        if self.context.dumpster {
            return false;
        }
        let Some(leaf) = node.as_leaf() else {
            return false;
        };
        if !leaf.exclude_tags.is_empty() || leaf.tags.len() != 1 {
            return false;
        }
        let Some(tag) = leaf.tags.first() else {
            return false;
        };
        let estimate = if tag.is_unread_flag() {
            self.context.unread_estimate
        } else if tag.is_user_tag() {
            Some(tag.item_count)
        } else {
            None
        };
        estimate.is_some_and(|count| count < self.config.tagged_item_join_cutoff)
    }

    /// Builds the search statement for an optimized tree.
    pub fn search(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchStatement {
        let shape = Self::shape(node);
        let hint = index_hint(node, sort, window, self.caps, self.config);
        let tagged_item_join = self.uses_tagged_item_join(node);
        let exclude_no_recipients = node.as_leaf().is_none_or(|leaf| !leaf.exclude_has_recipients);

        let items = SelectPart {
            calendar: CalendarPart::None,
            tagged_item_join,
            exclude_no_recipients,
            hint,
        };
        let appointments = SelectPart {
            calendar: CalendarPart::Appointments,
            tagged_item_join: false,
            ..items
        };

        let mut writer = SqlWriter::new(self.caps);
        match shape {
            QueryShape::Items => {
                self.select(&mut writer, node, sort, fetch, items);
                write_order_by(&mut writer, sort, "mi.id");
            }
            QueryShape::Appointments => {
                self.select(&mut writer, node, sort, fetch, appointments);
                write_order_by(&mut writer, sort, "mi.id");
            }
            QueryShape::Union => {
                writer.push("SELECT * FROM (");
                self.select(
                    &mut writer,
                    node,
                    sort,
                    fetch,
                    SelectPart {
                        calendar: CalendarPart::Items,
                        ..items
                    },
                );
                writer.push(" UNION ALL ");
                self.select(&mut writer, node, sort, fetch, appointments);
                writer.push(") AS u");
                write_order_by(&mut writer, sort, "id");
            }
        }
        // Relevance order is only known in memory, so the window is too.
        let limit_applied = sort.key != SortKey::Relevance && writer.limit(window);

        debug!(
            ?shape,
            index_hint = hint,
            tagged_item_join,
            limit_applied,
            "assembled search statement"
        );
        SearchStatement {
            query: writer.finish(),
            shape,
            limit_applied,
        }
    }

    /// Builds `SELECT COUNT(*)` for a tree.
    ///
    /// With `require_recipients` only rows with recipients are counted.
    pub fn count(&self, node: &ConstraintNode, require_recipients: bool) -> CompiledQuery {
        let mut writer = SqlWriter::new(self.caps);
        writer
            .push("SELECT COUNT(*) FROM ")
            .push(self.config.tables.items(self.context.dumpster))
            .push(" AS mi");

        let mut conjuncts = Vec::new();
        if self.config.mailbox_groups {
            conjuncts.push(Expr::eq_param("mi.mailbox_id", self.context.mailbox_id));
        }
        conjuncts.extend(Encoder::new(self.caps, self.config, self.context.dumpster).encode(node));
        if require_recipients {
            conjuncts.push(Expr::is_null("mi.recipients", true));
        }
        if !conjuncts.is_empty() {
            writer.push(" WHERE ").conjunction(&conjuncts);
        }
        writer.finish()
    }

    fn select(
        &self,
        writer: &mut SqlWriter<'_>,
        node: &ConstraintNode,
        sort: &SortSpec,
        fetch: FetchMode,
        part: SelectPart,
    ) {
        let tables = &self.config.tables;
        let dumpster = self.context.dumpster;

        let columns: Vec<String> = fetch
            .columns()
            .iter()
            .map(|column| format!("mi.{}", column.name()))
            .collect();
        writer.push("SELECT ").push(&columns.join(", "));
        if let Some(column) = sort_column(sort.key, self.caps) {
            writer.push(", ");
            writer.operand(&column);
            writer.push(" AS ").push(SORT_COLUMN_ALIAS);
        }

        writer.push(" FROM ").push(tables.items(dumpster)).push(" AS mi");
        if let Some(index) = part.hint {
            writer.index_hint(index);
        }
        if sort.key == SortKey::RecentlyViewed {
            self.view_event_join(writer);
        }
        if part.calendar == CalendarPart::Appointments {
            writer
                .push(", ")
                .push(tables.appointments(dumpster))
                .push(" AS ap");
        }
        if part.tagged_item_join {
            writer.push(", ").push(&tables.tagged_item).push(" AS ti");
        }

        let mut conjuncts = Vec::new();
        if self.config.mailbox_groups {
            conjuncts.push(Expr::eq_param("mi.mailbox_id", self.context.mailbox_id));
        }
        if sort.is_recipient_sort()
            && part.exclude_no_recipients
            && part.calendar != CalendarPart::Appointments
        {
            conjuncts.push(Expr::is_null("mi.recipients", true));
        }
        if part.calendar == CalendarPart::Appointments {
            if self.config.mailbox_groups {
                conjuncts.push(Expr::columns_eq("mi.mailbox_id", "ap.mailbox_id"));
            }
            conjuncts.push(Expr::columns_eq("mi.id", "ap.item_id"));
        }
        let encoder = Encoder::new(self.caps, self.config, dumpster)
            .with_calendar(part.calendar)
            .with_tagged_item_join(part.tagged_item_join);
        conjuncts.extend(encoder.encode(node));

        if !conjuncts.is_empty() {
            writer.push(" WHERE ").conjunction(&conjuncts);
        }
    }

    // One row per item: the latest view event, so a re-viewed item is not
    // returned twice.
    fn view_event_join(&self, writer: &mut SqlWriter<'_>) {
        writer
            .push(" LEFT JOIN (SELECT item_id, MAX(ts) AS ts FROM ")
            .push(&self.config.tables.event)
            .push(" WHERE op = ")
            .bind(SqlValue::from(self.config.view_event_op));
        if self.config.mailbox_groups {
            writer
                .push(" AND mailbox_id = ")
                .bind(SqlValue::from(self.context.event_mailbox_id()));
        }
        writer.push(" GROUP BY item_id) AS e ON mi.id = e.item_id");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FolderRef, ItemType, Leaf, NumericRange, TagRef};

    fn inbox_leaf() -> Leaf {
        let mut leaf = Leaf::with_types([ItemType::Message]);
        leaf.add_in_folder(FolderRef::new(2, "Inbox"), true);
        leaf
    }

    fn build(
        caps: &Capabilities,
        context: &SearchContext,
        node: &ConstraintNode,
        sort: SortSpec,
        window: Window,
    ) -> SearchStatement {
        let config = SearchConfig::default();
        StatementBuilder::new(caps, &config, context).search(node, &sort, window, FetchMode::Id)
    }

    #[test]
    fn test_single_table_statement() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1);
        let statement = build(
            &caps,
            &ctx,
            &inbox_leaf().into(),
            SortSpec::DATE_DESC,
            Window::page(0, 25),
        );
        assert_eq!(statement.shape, QueryShape::Items);
        assert!(statement.limit_applied);
        assert_eq!(
            statement.query.text,
            "SELECT mi.id, mi.index_id, mi.type, mi.date AS sortcol FROM mail_item AS mi \
             WHERE mi.mailbox_id = ?1 AND (mi.type IN (?2) AND mi.folder_id IN (?3)) \
             ORDER BY sortcol DESC, mi.id DESC LIMIT 25 OFFSET 0"
        );
        assert_eq!(
            statement.query.params,
            vec![SqlValue::Integer(1), SqlValue::Integer(5), SqlValue::Integer(2)]
        );
    }

    #[test]
    fn test_mysql_statement_with_hint() {
        let caps = Capabilities::mysql();
        let ctx = SearchContext::new(1);
        let statement = build(
            &caps,
            &ctx,
            &inbox_leaf().into(),
            SortSpec::DATE_DESC,
            Window::page(50, 25),
        );
        assert_eq!(
            statement.query.text,
            "SELECT mi.id, mi.index_id, mi.type, mi.date AS sortcol FROM mail_item AS mi \
             FORCE INDEX (i_folder_id_date) WHERE mi.mailbox_id = ? AND \
             (mi.type IN (?) AND mi.folder_id IN (?)) ORDER BY sortcol DESC, mi.id DESC LIMIT 50, 25"
        );
    }

    #[test]
    fn test_union_with_appointment_table() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1);
        let mut leaf = Leaf::with_types([ItemType::Message, ItemType::Appointment]);
        leaf.add_cal_start_range(NumericRange::new(Some(1_000), true, None, false, true));
        let node: ConstraintNode = leaf.into();
        let statement = build(&caps, &ctx, &node, SortSpec::DATE_DESC, Window::page(0, 10));
        assert_eq!(statement.shape, QueryShape::Union);
        let text = &statement.query.text;
        assert!(text.starts_with("SELECT * FROM (SELECT mi.id"));
        assert!(text.contains("mi.type NOT IN (?4, ?5)) UNION ALL SELECT"));
        assert!(text.contains("FROM mail_item AS mi, appointment AS ap WHERE"));
        assert!(text.contains("mi.mailbox_id = ap.mailbox_id AND mi.id = ap.item_id"));
        assert!(text.ends_with(") AS u ORDER BY sortcol DESC, id DESC LIMIT 10 OFFSET 0"));
        assert!(text.contains("(ap.start_time >= ?11)"));
        assert_eq!(statement.query.param_count(), 11);
    }

    #[test]
    fn test_appointment_only_statement() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1);
        let mut leaf = Leaf::with_types([ItemType::Appointment]);
        leaf.add_cal_end_range(NumericRange::new(None, false, Some(5_000), true, true));
        let statement = build(&caps, &ctx, &leaf.into(), SortSpec::NONE, Window::all());
        assert_eq!(statement.shape, QueryShape::Appointments);
        assert_eq!(
            statement.query.text,
            "SELECT mi.id, mi.index_id, mi.type FROM mail_item AS mi, appointment AS ap \
             WHERE mi.mailbox_id = ?1 AND mi.mailbox_id = ap.mailbox_id AND mi.id = ap.item_id \
             AND (mi.type IN (?2) AND mi.type IN (?3, ?4) AND (ap.end_time <= ?5))"
        );
        assert!(!statement.limit_applied);
    }

    #[test]
    fn test_recipient_sort_requires_recipients() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1);
        let statement = build(
            &caps,
            &ctx,
            &inbox_leaf().into(),
            SortSpec::asc(SortKey::Rcpt),
            Window::all(),
        );
        assert!(statement.query.text.contains(
            "WHERE mi.mailbox_id = ?1 AND mi.recipients IS NOT NULL AND (mi.type IN (?2)"
        ));

        let mut drafts = inbox_leaf();
        drafts.exclude_has_recipients = true;
        let statement = build(&caps, &ctx, &drafts.into(), SortSpec::asc(SortKey::Rcpt), Window::all());
        assert!(!statement.query.text.contains("IS NOT NULL"));
        assert!(statement.query.text.contains("mi.recipients IS NULL"));
    }

    #[test]
    fn test_recently_viewed_join() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1).with_viewer(4);
        let statement = build(
            &caps,
            &ctx,
            &inbox_leaf().into(),
            SortSpec::desc(SortKey::RecentlyViewed),
            Window::all(),
        );
        assert_eq!(
            statement.query.text,
            "SELECT mi.id, mi.index_id, mi.type, COALESCE(e.ts, 0) AS sortcol FROM mail_item AS mi \
             LEFT JOIN (SELECT item_id, MAX(ts) AS ts FROM event WHERE op = ?1 AND mailbox_id = ?2 \
             GROUP BY item_id) AS e ON mi.id = e.item_id WHERE mi.mailbox_id = ?3 AND \
             (mi.type IN (?4) AND mi.folder_id IN (?5)) ORDER BY sortcol DESC, mi.id DESC"
        );
        assert_eq!(statement.query.params[0], SqlValue::Integer(9));
        assert_eq!(statement.query.params[1], SqlValue::Integer(4));
    }

    #[test]
    fn test_tagged_item_join_heuristic() {
        let caps = Capabilities::sqlite();
        let config = SearchConfig::default();
        let mut leaf = inbox_leaf();
        leaf.add_tag(TagRef::unread(), true);
        let node: ConstraintNode = leaf.into();

        let no_estimate = SearchContext::new(1);
        assert!(!StatementBuilder::new(&caps, &config, &no_estimate).uses_tagged_item_join(&node));

        let few_unread = SearchContext::new(1).with_unread_estimate(20);
        let builder = StatementBuilder::new(&caps, &config, &few_unread);
        assert!(builder.uses_tagged_item_join(&node));
        let statement = builder.search(&node, &SortSpec::DATE_DESC, Window::all(), FetchMode::Id);
        assert!(statement.query.text.contains("FROM mail_item AS mi, tagged_item AS ti WHERE"));

        let many_unread = SearchContext::new(1).with_unread_estimate(5_000);
        assert!(!StatementBuilder::new(&caps, &config, &many_unread).uses_tagged_item_join(&node));

        let dumpster = SearchContext::new(1).with_unread_estimate(20).in_dumpster();
        assert!(!StatementBuilder::new(&caps, &config, &dumpster).uses_tagged_item_join(&node));

        let mut flagged = inbox_leaf();
        flagged.add_tag(TagRef::flagged(), true);
        assert!(!builder.uses_tagged_item_join(&flagged.into()));

        let mut small_tag = inbox_leaf();
        small_tag.add_tag(TagRef::user(64, "work", 3), true);
        assert!(builder.uses_tagged_item_join(&small_tag.into()));
    }

    #[test]
    fn test_count_statement() {
        let caps = Capabilities::sqlite();
        let config = SearchConfig::default();
        let ctx = SearchContext::new(1).in_dumpster();
        let builder = StatementBuilder::new(&caps, &config, &ctx);
        let query = builder.count(&inbox_leaf().into(), true);
        assert_eq!(
            query.text,
            "SELECT COUNT(*) FROM mail_item_dumpster AS mi WHERE mi.mailbox_id = ?1 AND \
             (mi.type IN (?2) AND mi.folder_id IN (?3)) AND mi.recipients IS NOT NULL"
        );
    }

    #[test]
    fn test_relevance_sort_leaves_window_to_memory() {
        let caps = Capabilities::sqlite();
        let ctx = SearchContext::new(1);
        let statement = build(
            &caps,
            &ctx,
            &inbox_leaf().into(),
            SortSpec::RELEVANCE_DESC,
            Window::page(0, 5),
        );
        assert!(!statement.limit_applied);
        assert!(!statement.query.text.contains("ORDER BY"));
        assert!(!statement.query.text.contains("LIMIT"));
    }

    #[test]
    fn test_without_mailbox_groups() {
        let caps = Capabilities::sqlite();
        let config = SearchConfig {
            mailbox_groups: false,
            ..SearchConfig::default()
        };
        let ctx = SearchContext::new(1);
        let mut leaf = Leaf::new();
        leaf.types_factored_out = true;
        let statement = StatementBuilder::new(&caps, &config, &ctx).search(
            &leaf.into(),
            &SortSpec::NONE,
            Window::all(),
            FetchMode::Id,
        );
        assert_eq!(statement.query.text, "SELECT mi.id, mi.index_id, mi.type FROM mail_item AS mi");
    }
}
