//! SQLite execution backend.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{Value, ValueRef};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::backend::{ExecutionHint, Row, SearchBackend};
use crate::config::TableNames;
use crate::error::{BackendError, BackendResult};
use crate::sql::{CompiledQuery, SqlValue, TIMESTAMP_FORMAT};
use crate::types::fetch::serialize_tag_names;
use crate::types::{Capabilities, ItemType};

use super::schema;

/// SQLite backend for mailbox searches.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    capabilities: Capabilities,
    tables: TableNames,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
        }
    }
}

impl SqliteBackend {
    /// Creates a new in-memory database.
    ///
    /// Every in-memory connection is its own database, so the pool holds
    /// exactly one connection and never recycles it.
    pub fn in_memory() -> BackendResult<Self> {
        let config = SqliteBackendConfig {
            max_connections: 1,
            ..SqliteBackendConfig::default()
        };
        Self::build(SqliteConnectionManager::memory(), config, true)
    }

    /// Opens or creates a file-based database.
    pub fn open<P: AsRef<Path>>(path: P) -> BackendResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Opens a file-based database with custom configuration.
    pub fn with_config<P: AsRef<Path>>(path: P, config: SqliteBackendConfig) -> BackendResult<Self> {
        Self::build(SqliteConnectionManager::file(path.as_ref()), config, false)
    }

    fn build(
        manager: SqliteConnectionManager,
        config: SqliteBackendConfig,
        is_memory: bool,
    ) -> BackendResult<Self> {
        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let manager = manager.with_init(move |conn| conn.busy_timeout(busy_timeout));

        let mut builder = Pool::builder()
            .max_size(config.max_connections.max(1))
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms));
        if is_memory {
            builder = builder.min_idle(Some(1)).idle_timeout(None).max_lifetime(None);
        }
        let pool = builder.build(manager)?;

        let backend = Self {
            pool,
            config,
            capabilities: Capabilities::sqlite(),
            tables: TableNames::default(),
            is_memory,
        };
        backend.configure_connection()?;
        Ok(backend)
    }

    /// Overrides the advertised dialect capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Uses non-default table names. Call before [`init_schema`](Self::init_schema).
    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    /// Creates the schema if it does not exist yet.
    pub fn init_schema(&self) -> BackendResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn, &self.tables)
    }

    pub(crate) fn get_connection(
        &self,
    ) -> BackendResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn configure_connection(&self) -> BackendResult<()> {
        if self.config.enable_wal && !self.is_memory {
            let conn = self.get_connection()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| BackendError::Internal {
                    backend_name: "sqlite".to_string(),
                    message: format!("Failed to enable WAL mode: {e}"),
                    source: Some(Box::new(e)),
                })?;
        }
        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Inserts an item row into the live or dumpster item table.
    pub fn insert_item(&self, mailbox_id: i32, item: &NewItem, dumpster: bool) -> BackendResult<()> {
        let conn = self.get_connection()?;
        let sql = format!(
            "INSERT INTO {} (mailbox_id, id, type, parent_id, folder_id, index_id, imap_id, date, \
             size, unread, flags, tag_names, sender, recipients, subject, name, mod_metadata, \
             change_date, mod_content, uuid) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            self.tables.items(dumpster)
        );
        conn.execute(
            &sql,
            rusqlite::params![
                mailbox_id,
                item.id,
                item.item_type.code(),
                item.parent_id,
                item.folder_id,
                item.index_id,
                item.imap_id,
                item.date,
                item.size,
                i32::from(item.unread),
                item.flags,
                serialize_tag_names(&item.tag_names),
                item.sender,
                item.recipients,
                item.subject,
                item.name,
                item.mod_metadata,
                item.change_date,
                item.mod_content,
                item.uuid,
            ],
        )?;
        Ok(())
    }

    /// Records that an item carries a tag or flag.
    pub fn tag_item(&self, mailbox_id: i32, item_id: i32, tag_id: i32) -> BackendResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO {} (mailbox_id, tag_id, item_id) VALUES (?1, ?2, ?3)",
                self.tables.tagged_item
            ),
            rusqlite::params![mailbox_id, tag_id, item_id],
        )?;
        Ok(())
    }

    /// Adds the calendar row of an appointment or task. Times are
    /// milliseconds since the epoch.
    pub fn insert_appointment(
        &self,
        mailbox_id: i32,
        item_id: i32,
        start_millis: i64,
        end_millis: Option<i64>,
        dumpster: bool,
    ) -> BackendResult<()> {
        let conn = self.get_connection()?;
        let text = |millis: i64| SqlValue::timestamp_millis(millis).to_text();
        conn.execute(
            &format!(
                "INSERT INTO {} (mailbox_id, item_id, start_time, end_time) VALUES (?1, ?2, ?3, ?4)",
                self.tables.appointments(dumpster)
            ),
            rusqlite::params![mailbox_id, item_id, text(start_millis), end_millis.and_then(text)],
        )?;
        Ok(())
    }

    /// Appends an event row, such as a view, for an item.
    pub fn record_view(&self, mailbox_id: i32, item_id: i32, op: i32, ts: i64) -> BackendResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (mailbox_id, item_id, op, ts) VALUES (?1, ?2, ?3, ?4)",
                self.tables.event
            ),
            rusqlite::params![mailbox_id, item_id, op, ts],
        )?;
        Ok(())
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(v) => Value::Integer(*v),
        SqlValue::Float(v) => Value::Real(*v),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Timestamp(ts) => Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
    }
}

fn from_sqlite(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(v) => SqlValue::Integer(v),
        ValueRef::Real(v) => SqlValue::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            SqlValue::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl SearchBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn execute(&self, query: &CompiledQuery, hint: &ExecutionHint) -> BackendResult<Vec<Row>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(&query.text).map_err(|e| BackendError::QueryError {
            message: format!("{e} in: {}", query.text),
        })?;
        let columns = stmt.column_count();
        if hint.expect_many_rows {
            debug!("large result expected, reading rows incrementally");
        }

        let mut rows = stmt.query(rusqlite::params_from_iter(query.params.iter().map(to_sqlite)))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns);
            for index in 0..columns {
                values.push(from_sqlite(row.get_ref(index)?));
            }
            result.push(Row::new(values));
            if hint.max_rows.is_some_and(|max| result.len() >= max) {
                break;
            }
        }
        trace!(rows = result.len(), "sqlite query finished");
        Ok(result)
    }
}

/// An item row for populating a database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub id: i32,
    pub item_type: ItemType,
    pub folder_id: i32,
    pub parent_id: Option<i32>,
    pub index_id: Option<i32>,
    pub imap_id: Option<i32>,
    /// Seconds since the epoch.
    pub date: i64,
    pub size: i64,
    pub unread: bool,
    pub flags: i64,
    pub tag_names: Vec<String>,
    pub sender: Option<String>,
    pub recipients: Option<String>,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub mod_metadata: i64,
    pub change_date: Option<i64>,
    pub mod_content: i64,
    pub uuid: Option<String>,
}

impl NewItem {
    pub fn new(id: i32, item_type: ItemType, folder_id: i32) -> Self {
        Self {
            id,
            item_type,
            folder_id,
            parent_id: None,
            index_id: Some(id),
            imap_id: Some(id),
            date: 0,
            size: 0,
            unread: false,
            flags: 0,
            tag_names: Vec::new(),
            sender: None,
            recipients: None,
            subject: None,
            name: None,
            mod_metadata: 1,
            change_date: None,
            mod_content: 1,
            uuid: None,
        }
    }

    pub fn message(id: i32, folder_id: i32) -> Self {
        Self::new(id, ItemType::Message, folder_id)
    }

    pub fn with_date(mut self, seconds: i64) -> Self {
        self.date = seconds;
        self
    }

    pub fn with_size(mut self, size: i64) -> Self {
        self.size = size;
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    pub fn with_recipients(mut self, recipients: impl Into<String>) -> Self {
        self.recipients = Some(recipients.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_flags(mut self, flags: i64) -> Self {
        self.flags = flags;
        self
    }

    pub fn unread(mut self) -> Self {
        self.unread = true;
        self
    }

    pub fn with_tags<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.tag_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parent(mut self, parent_id: i32) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_index_id(mut self, index_id: Option<i32>) -> Self {
        self.index_id = index_id;
        self
    }

    pub fn with_change_date(mut self, seconds: i64) -> Self {
        self.change_date = Some(seconds);
        self
    }

    pub fn with_mod_metadata(mut self, modseq: i64) -> Self {
        self.mod_metadata = modseq;
        self
    }
}
