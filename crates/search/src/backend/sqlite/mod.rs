//! SQLite backend implementation.
//!
//! Runs compiled searches against a SQLite database through an r2d2 pool of
//! rusqlite connections. It supports both in-memory databases (for tests)
//! and file-based databases.
//!
//! # Example
//!
//! ```no_run
//! use mailstore_search::backend::sqlite::{NewItem, SqliteBackend};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.init_schema()?;
//! backend.insert_item(1, &NewItem::message(257, 2).with_subject("hello"), false)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE mail_item (          -- and mail_item_dumpster
//!     mailbox_id INTEGER NOT NULL,
//!     id INTEGER NOT NULL,
//!     type INTEGER NOT NULL,
//!     parent_id INTEGER,
//!     folder_id INTEGER NOT NULL,
//!     index_id INTEGER,
//!     date INTEGER NOT NULL,        -- seconds
//!     flags INTEGER NOT NULL,
//!     tag_names TEXT,               -- "\0name\0name\0"
//!     recipients TEXT,
//!     ...
//!     PRIMARY KEY (mailbox_id, id)
//! );
//! CREATE TABLE appointment (mailbox_id, item_id, start_time TEXT, end_time TEXT);
//! CREATE TABLE tagged_item (mailbox_id, tag_id, item_id);
//! CREATE TABLE event (mailbox_id, item_id, op, ts);
//! ```

mod backend;
mod schema;

pub use backend::{NewItem, SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
