//! SQLite schema for the searchable mail store tables.

use rusqlite::Connection;

use crate::config::TableNames;
use crate::error::{BackendError, BackendResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Creates the tables and indexes if they do not exist yet.
pub fn initialize_schema(conn: &Connection, tables: &TableNames) -> BackendResult<()> {
    let current_version = get_schema_version(conn)?;
    if current_version == 0 {
        create_schema_v1(conn, tables)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    }
    Ok(())
}

fn internal(context: &str, err: rusqlite::Error) -> BackendError {
    BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("{context}: {err}"),
        source: Some(Box::new(err)),
    }
}

fn get_schema_version(conn: &Connection) -> BackendResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| internal("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> BackendResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| internal("Failed to clear schema_version", e))?;
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| internal("Failed to set schema_version", e))?;
    Ok(())
}

fn item_table(name: &str, index_prefix: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (
            mailbox_id INTEGER NOT NULL,
            id INTEGER NOT NULL,
            type INTEGER NOT NULL,
            parent_id INTEGER,
            folder_id INTEGER NOT NULL,
            prev_folders TEXT,
            index_id INTEGER,
            imap_id INTEGER,
            date INTEGER NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            locator TEXT,
            blob_digest TEXT,
            unread INTEGER NOT NULL DEFAULT 0,
            flags INTEGER NOT NULL DEFAULT 0,
            tag_names TEXT,
            sender TEXT,
            recipients TEXT,
            subject TEXT,
            name TEXT,
            metadata TEXT,
            mod_metadata INTEGER NOT NULL DEFAULT 0,
            change_date INTEGER,
            mod_content INTEGER NOT NULL DEFAULT 0,
            uuid TEXT,
            PRIMARY KEY (mailbox_id, id)
        );
        CREATE INDEX IF NOT EXISTS {index_prefix}folder_id_date ON {name}(mailbox_id, folder_id, date);
        CREATE INDEX IF NOT EXISTS {index_prefix}parent_id ON {name}(mailbox_id, parent_id);
        CREATE INDEX IF NOT EXISTS {index_prefix}index_id ON {name}(mailbox_id, index_id);"
    )
}

fn appointment_table(name: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {name} (
            mailbox_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            PRIMARY KEY (mailbox_id, item_id)
        );"
    )
}

fn create_schema_v1(conn: &Connection, tables: &TableNames) -> BackendResult<()> {
    // Index names are global in SQLite, so only the live table gets the
    // names index hints refer to.
    let mut sql = item_table(&tables.mail_item, "i_");
    sql.push_str(&item_table(&tables.mail_item_dumpster, "i_dumpster_"));
    sql.push_str(&appointment_table(&tables.appointment));
    sql.push_str(&appointment_table(&tables.appointment_dumpster));
    sql.push_str(&format!(
        "CREATE TABLE IF NOT EXISTS {tagged} (
            mailbox_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            PRIMARY KEY (mailbox_id, tag_id, item_id)
        );
        CREATE INDEX IF NOT EXISTS i_tagged_item_item ON {tagged}(mailbox_id, item_id);
        CREATE TABLE IF NOT EXISTS {event} (
            mailbox_id INTEGER NOT NULL,
            item_id INTEGER NOT NULL,
            op INTEGER NOT NULL,
            ts INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS i_event_item ON {event}(mailbox_id, op, item_id);",
        tagged = tables.tagged_item,
        event = tables.event,
    ));

    conn.execute_batch(&sql)
        .map_err(|e| internal("Failed to create schema", e))
}
