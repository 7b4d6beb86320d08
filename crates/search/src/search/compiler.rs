//! The constraint compiler: search, count and split execution.
//!
//! A search is compiled to a single statement whenever the backend can run
//! it. When it cannot, because the statement binds more parameters than the
//! backend accepts or because the backend cannot evaluate OR in a WHERE
//! clause, the tree is partitioned and each part runs as its own statement.
//! Every part builds its statement with a fresh [`SqlWriter`](crate::sql::SqlWriter),
//! so recursion never shares a buffer or a parameter list.

use tracing::{debug, trace, warn};

use crate::backend::{ExecutionHint, Row, SearchBackend};
use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};
use crate::sql::{CompiledQuery, SqlValue};
use crate::types::{
    Capabilities, ConstraintNode, FetchMode, ID_FOLDER_DRAFTS, Leaf, SearchHit, SortKey,
    SortSpec, Window,
};

use super::context::SearchContext;
use super::merge::{intersect, merge_union};
use super::rows::RowDecoder;
use super::select::StatementBuilder;
use super::sort::sort_hits;

/// Compiles constraint trees and runs them against a backend.
///
/// The compiler only borrows its collaborators and holds no state between
/// calls, so one instance may serve any number of sequential or concurrent
/// searches.
#[derive(Debug)]
pub struct ConstraintCompiler<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
    config: &'a SearchConfig,
    context: &'a SearchContext,
}

impl<'a, B: SearchBackend + ?Sized> ConstraintCompiler<'a, B> {
    pub fn new(backend: &'a B, config: &'a SearchConfig, context: &'a SearchContext) -> Self {
        Self {
            backend,
            config,
            context,
        }
    }

    fn caps(&self) -> &Capabilities {
        self.backend.capabilities()
    }

    fn builder(&self) -> StatementBuilder<'_> {
        StatementBuilder::new(self.caps(), self.config, self.context)
    }

    /// Returns the `window` slice of the items matching `node`, ordered by
    /// `sort`.
    pub fn search(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        let node = self.prepare(node, sort)?;
        debug!(
            backend = self.backend.name(),
            mailbox_id = self.context.mailbox_id,
            dumpster = self.context.dumpster,
            ?sort,
            offset = window.offset,
            limit = window.limit,
            ?fetch,
            "searching"
        );
        let hits = if sort.is_recipient_sort()
            && let Some(drafts) = node.find_leaf_with_folder(ID_FOLDER_DRAFTS)
        {
            self.search_drafts_spliced(&node, drafts, sort, window, fetch)?
        } else {
            self.search_node(&node, sort, window, fetch)?
        };
        debug!(hits = hits.len(), "search finished");
        Ok(hits)
    }

    /// [`search`](Self::search), mapping every hit through `map`.
    ///
    /// The first mapping error aborts the call.
    pub fn search_with<T, F>(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
        map: F,
    ) -> SearchResult<Vec<T>>
    where
        F: FnMut(SearchHit) -> SearchResult<T>,
    {
        self.search(node, sort, window, fetch)?
            .into_iter()
            .map(map)
            .collect()
    }

    /// Counts the items matching `node`.
    ///
    /// Counting never splits; a tree too large for one statement fails with
    /// [`SearchError::ParamLimitExceeded`].
    pub fn count(&self, node: &ConstraintNode) -> SearchResult<u64> {
        node.validate()?;
        let node = node.optimize_bounded(self.config.max_optimize_passes);
        self.count_node(&node, false)
    }

    /// The single statement [`search`](Self::search) would try first.
    pub fn compile_search(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<CompiledQuery> {
        let node = self.prepare(node, sort)?;
        Ok(self.builder().search(&node, sort, window, fetch).query)
    }

    /// The statement [`count`](Self::count) runs.
    pub fn compile_count(&self, node: &ConstraintNode) -> SearchResult<CompiledQuery> {
        node.validate()?;
        let node = node.optimize_bounded(self.config.max_optimize_passes);
        Ok(self.builder().count(&node, false))
    }

    fn prepare(&self, node: &ConstraintNode, sort: &SortSpec) -> SearchResult<ConstraintNode> {
        node.validate()?;
        if sort.key == SortKey::Relevance && self.context.relevance.is_none() {
            return Err(SearchError::invalid(
                "relevance sort requires relevance scores",
            ));
        }
        Ok(node.optimize_bounded(self.config.max_optimize_passes))
    }

    fn search_node(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        if let ConstraintNode::Union(children) = node
            && !self.caps().supports_or_in_where
        {
            debug!(arms = children.len(), "backend cannot evaluate OR, splitting union");
            return self.split_union(children, sort, window, fetch);
        }

        match self.search_unsplit(node, sort, window, fetch) {
            Err(SearchError::ParamLimitExceeded { count, limit }) => {
                warn!(params = count, limit, "too many SQL parameters, splitting query");
                match node {
                    ConstraintNode::Union(children) => {
                        self.split_union(children, sort, window, fetch)
                    }
                    ConstraintNode::Intersection(children) => {
                        self.split_intersection(children, sort, window, fetch)
                    }
                    ConstraintNode::Leaf(leaf) => {
                        self.split_folders(leaf, sort, window, fetch, count, limit)
                    }
                }
            }
            other => other,
        }
    }

    fn search_unsplit(
        &self,
        node: &ConstraintNode,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        let statement = self.builder().search(node, sort, window, fetch);
        self.check_params(&statement.query)?;

        let hint = self.execution_hint(sort, window, statement.limit_applied);
        let rows = self.execute(&statement.query, &hint)?;
        let decoder = RowDecoder::new(
            fetch,
            sort,
            self.context.relevance.as_ref(),
            self.context.dumpster,
        );
        let mut hits = decoder.decode_all(&rows)?;
        if sort.key == SortKey::Relevance {
            sort_hits(&mut hits, sort);
        }
        if statement.limit_applied {
            Ok(hits)
        } else {
            Ok(window.apply(hits))
        }
    }

    fn execution_hint(&self, sort: &SortSpec, window: Window, limit_applied: bool) -> ExecutionHint {
        let expect_many_rows = self
            .context
            .estimated_rows
            .is_some_and(|rows| rows > self.config.streaming_row_threshold);
        let max_rows = if limit_applied || sort.key == SortKey::Relevance {
            None
        } else {
            window.end().map(|end| end.saturating_add(1))
        };
        ExecutionHint {
            expect_many_rows,
            max_rows,
        }
    }

    fn check_params(&self, query: &CompiledQuery) -> SearchResult<()> {
        let caps = self.caps();
        if caps.fits_params(query.param_count()) {
            return Ok(());
        }
        Err(SearchError::ParamLimitExceeded {
            count: query.param_count(),
            limit: caps.max_params.unwrap_or_default(),
        })
    }

    fn execute(&self, query: &CompiledQuery, hint: &ExecutionHint) -> SearchResult<Vec<Row>> {
        debug!(
            backend = self.backend.name(),
            sql = %query.text,
            params = query.param_count(),
            expect_many_rows = hint.expect_many_rows,
            max_rows = hint.max_rows,
            "executing"
        );
        Ok(self.backend.execute(query, hint)?)
    }

    fn split_union(
        &self,
        children: &[ConstraintNode],
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        let arm_window = window.prefix();
        let mut lists = Vec::with_capacity(children.len());
        for (arm, child) in children.iter().enumerate() {
            let hits = self.search_node(child, sort, arm_window, fetch)?;
            trace!(arm, hits = hits.len(), "union arm finished");
            lists.push(hits);
        }
        Ok(window.apply(merge_union(lists, sort)))
    }

    fn split_intersection(
        &self,
        children: &[ConstraintNode],
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        let mut lists = Vec::with_capacity(children.len());
        for (arm, child) in children.iter().enumerate() {
            let hits = self.search_node(child, sort, Window::all(), fetch)?;
            trace!(arm, hits = hits.len(), "intersection arm finished");
            lists.push(hits);
        }
        Ok(window.apply(intersect(lists, sort)))
    }

    fn split_folders(
        &self,
        leaf: &Leaf,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
        params: usize,
        limit: usize,
    ) -> SearchResult<Vec<SearchHit>> {
        let folders = leaf.folders.len();
        let other_params = params.saturating_sub(folders);
        let soft_limit = limit
            .saturating_sub(other_params)
            .saturating_sub(self.config.split_safety_margin);
        if soft_limit == 0 || folders <= soft_limit {
            return Err(SearchError::SplitExhausted {
                message: format!(
                    "{params} parameters exceed the limit of {limit} and the \
                     {folders} folders of the leaf are not the cause"
                ),
            });
        }

        let batches = folders.div_ceil(soft_limit);
        debug!(folders, soft_limit, batches, "splitting folder set");
        let all: Vec<_> = leaf.folders.iter().cloned().collect();
        let arm_window = window.prefix();
        let mut lists = Vec::with_capacity(batches);
        for (batch, chunk) in all.chunks(soft_limit).enumerate() {
            let mut subset = leaf.clone();
            subset.folders = chunk.iter().cloned().collect();
            let hits = self.search_node(&ConstraintNode::Leaf(subset), sort, arm_window, fetch)?;
            trace!(batch, hits = hits.len(), "folder batch finished");
            lists.push(hits);
        }
        Ok(window.apply(merge_union(lists, sort)))
    }

    /// Recipient sorts exclude rows without recipients, but drafts may have
    /// none. Those drafts are fetched by a second query and spliced before
    /// (descending) or after (ascending) the regular results.
    ///
    /// The splice is decided once for the whole tree. Each half may still be
    /// split on its own, but the two halves are only ever concatenated: the
    /// drafts carry no recipient to sort by, so merging them by sort value
    /// would move them.
    fn search_drafts_spliced(
        &self,
        node: &ConstraintNode,
        drafts_source: &Leaf,
        sort: &SortSpec,
        window: Window,
        fetch: FetchMode,
    ) -> SearchResult<Vec<SearchHit>> {
        let mut drafts = drafts_source.clone();
        drafts.folders.retain(|folder| folder.id == ID_FOLDER_DRAFTS);
        drafts.exclude_has_recipients = true;
        let drafts = ConstraintNode::Leaf(drafts);

        let (first, second) = if sort.is_descending() {
            (&drafts, node)
        } else {
            (node, &drafts)
        };

        let head = self.search_node(first, sort, window, fetch)?;
        if head.is_empty() {
            // The window starts somewhere in the second list; skip past
            // everything the first query matches in total.
            let total = self.count_splice_half(first, sort)?;
            let offset = window
                .offset
                .saturating_sub(usize::try_from(total).unwrap_or(usize::MAX));
            debug!(total, offset, limit = window.limit, "drafts splice: first query empty");
            return self.search_node(second, sort, Window::new(offset, window.limit), fetch);
        }

        if let Some(limit) = window.limit
            && head.len() >= limit
        {
            return Ok(head);
        }
        let remaining = window.limit.map(|limit| limit - head.len());
        debug!(first = head.len(), limit = remaining, "drafts splice: first query short");
        let tail = self.search_node(second, sort, Window::new(0, remaining), fetch)?;

        let mut hits = head;
        hits.extend(tail);
        Ok(hits)
    }

    /// Total matches of one splice half.
    ///
    /// A half the backend cannot count in one statement is counted by
    /// searching it, splitting as a search would.
    fn count_splice_half(&self, half: &ConstraintNode, sort: &SortSpec) -> SearchResult<u64> {
        let require_recipients = half
            .as_leaf()
            .is_none_or(|leaf| !leaf.exclude_has_recipients);
        let countable =
            !matches!(half, ConstraintNode::Union(_)) || self.caps().supports_or_in_where;
        if countable {
            match self.count_node(half, require_recipients) {
                Err(SearchError::ParamLimitExceeded { count, limit }) => {
                    debug!(count, limit, "drafts splice: count over parameter limit");
                }
                other => return other,
            }
        }
        let hits = self.search_node(half, sort, Window::all(), FetchMode::Id)?;
        Ok(u64::try_from(hits.len()).unwrap_or(u64::MAX))
    }

    fn count_node(&self, node: &ConstraintNode, require_recipients: bool) -> SearchResult<u64> {
        let query = self.builder().count(node, require_recipients);
        self.check_params(&query)?;
        let rows = self.execute(&query, &ExecutionHint::default())?;
        let count = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(SqlValue::as_i64)
            .ok_or_else(|| SearchError::RowDecode {
                column: "count",
                message: "count query returned no value".to_string(),
            })?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
