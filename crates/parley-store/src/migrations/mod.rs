//! Schema upgrades, tracked with SQLite's `user_version` pragma.
//!
//! Every constructor of [`Database`](crate::Database) calls [`run_migrations`],
//! which applies the steps above the stored version in order.

pub mod v001_initial;
pub mod v002_directory;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

type Step = fn(&Connection) -> rusqlite::Result<()>;

/// Ordered by version; append new steps at the end.
const STEPS: &[(u32, &str, Step)] = &[
    (1, "v001_initial", v001_initial::up),
    (2, "v002_directory", v002_directory::up),
];

fn schema_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    let from = schema_version(conn)?;
    let latest = STEPS.last().map_or(0, |(version, _, _)| *version);
    if from >= latest {
        tracing::debug!(version = from, "schema up to date");
        return Ok(());
    }

    for (version, name, up) in STEPS.iter().filter(|(v, _, _)| *v > from) {
        tracing::info!(%name, version, "migrating schema");
        up(conn).map_err(|e| StoreError::Migration(format!("{name}: {e}")))?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}
