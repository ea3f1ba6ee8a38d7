pub mod repository;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::functions::FunctionFlags;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;\
                       PRAGMA foreign_keys=ON;\
                       PRAGMA busy_timeout=5000;";

/// Per-connection setup: pragmas plus `fold_case(text)`, a Unicode-aware
/// lowercase for case-insensitive search. SQLite's `LOWER()` folds ASCII only.
fn prepare_connection(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.create_scalar_function(
        "fold_case",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// Schema history, oldest first.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))])
}

/// `~/.helpdesk/helpdesk.db`
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Config("cannot determine home directory".into()))?;
    Ok(home.join(".helpdesk").join("helpdesk.db"))
}

/// The helpdesk store: one writer and one reader connection over the same
/// SQLite file in WAL mode. Writes queue on the writer's channel; reads do
/// not wait behind them.
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (creating if needed) the database at [`default_path`].
    pub async fn open() -> Result<Self> {
        let path = default_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| Error::Config(e.to_string()))?;
        }
        Self::open_at(path).await
    }

    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Opening database at {}", path.display());

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::migrate(&writer).await?;
        let reader = tokio_rusqlite::Connection::open(&path).await?;
        reader.call(|conn| prepare_connection(conn)).await?;

        Self::seeded(writer, reader).await
    }

    /// A private in-memory store. Reader and writer share one connection
    /// because every in-memory connection is its own database.
    pub async fn open_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::migrate(&conn).await?;
        Self::seeded(conn.clone(), conn).await
    }

    async fn migrate(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            prepare_connection(conn).map_err(|e| e.to_string())?;
            migrations().to_latest(conn).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| Error::Migration(e.to_string()))
    }

    async fn seeded(
        writer: tokio_rusqlite::Connection,
        reader: tokio_rusqlite::Connection,
    ) -> Result<Self> {
        let now = crate::date_util::now();
        let seeded = writer
            .call(move |conn| schema::ensure_default_users(conn, now))
            .await?;
        if seeded > 0 {
            log::info!("Seeded {seeded} default users");
        }
        Ok(Self { writer, reader })
    }

    /// Connection for inserts and updates.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Connection for queries.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }
}
