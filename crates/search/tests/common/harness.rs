//! Backend wrappers and search helpers.

use parking_lot::Mutex;

use mailstore_search::backend::{ExecutionHint, Row, SearchBackend};
use mailstore_search::error::BackendResult;
use mailstore_search::types::{Capabilities, ConstraintNode, FetchMode, SearchHit, SortSpec, Window};
use mailstore_search::{CompiledQuery, ConstraintCompiler, SearchConfig, SearchContext};

/// Delegates to another backend, remembering every statement it runs and
/// the hint it ran with.
///
/// Capabilities can be overridden to force split execution against a
/// backend that would accept the unsplit statement.
#[derive(Debug)]
pub struct RecordingBackend<B> {
    inner: B,
    capabilities: Capabilities,
    queries: Mutex<Vec<CompiledQuery>>,
    hints: Mutex<Vec<ExecutionHint>>,
}

impl<B: SearchBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        let capabilities = inner.capabilities().clone();
        Self {
            inner,
            capabilities,
            queries: Mutex::new(Vec::new()),
            hints: Mutex::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Every statement executed so far, in order.
    pub fn queries(&self) -> Vec<CompiledQuery> {
        self.queries.lock().clone()
    }

    /// The hint passed with each executed statement, in the same order.
    pub fn hints(&self) -> Vec<ExecutionHint> {
        self.hints.lock().clone()
    }

    /// Executed statements other than counts.
    pub fn search_queries(&self) -> Vec<CompiledQuery> {
        self.queries()
            .into_iter()
            .filter(|q| !q.text.starts_with("SELECT COUNT(*)"))
            .collect()
    }

    pub fn clear(&self) {
        self.queries.lock().clear();
        self.hints.lock().clear();
    }
}

impl<B: SearchBackend> SearchBackend for RecordingBackend<B> {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn execute(&self, query: &CompiledQuery, hint: &ExecutionHint) -> BackendResult<Vec<Row>> {
        self.queries.lock().push(query.clone());
        self.hints.lock().push(*hint);
        self.inner.execute(query, hint)
    }
}

/// Runs a search in the fixture mailbox with the default configuration.
pub fn search_hits<B: SearchBackend>(
    backend: &B,
    context: &SearchContext,
    node: &ConstraintNode,
    sort: SortSpec,
    window: Window,
) -> Vec<SearchHit> {
    let config = SearchConfig::default();
    ConstraintCompiler::new(backend, &config, context)
        .search(node, &sort, window, FetchMode::Id)
        .expect("search failed")
}

/// Like [`search_hits`], returning only the ids.
pub fn search_ids<B: SearchBackend>(
    backend: &B,
    node: &ConstraintNode,
    sort: SortSpec,
    window: Window,
) -> Vec<i32> {
    let context = SearchContext::new(super::fixtures::MAILBOX);
    ids(&search_hits(backend, &context, node, sort, window))
}

pub fn ids(hits: &[SearchHit]) -> Vec<i32> {
    hits.iter().map(|hit| hit.id).collect()
}
