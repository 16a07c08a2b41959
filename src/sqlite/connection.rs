//! SQLite connection implementation.

use std::future::Future;

use parking_lot::Mutex;
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use super::error::{SqliteError, SqliteResult};
use super::types::{from_value_ref, type_code};
use crate::base::BaseConnection;
use crate::cursor::StatementKind;
use crate::error::Result;
use crate::response::{ColumnMeta, Response};
use crate::types::Row;

/// A SQLite connection.
///
/// The handle is cheap to clone internally; closing takes it out so every
/// later call fails with [`SqliteError::ConnectionClosed`].
pub struct SqliteConnection {
    conn: Mutex<Option<Connection>>,
    path: String,
}

impl SqliteConnection {
    /// Open a SQLite database.
    ///
    /// Supports:
    /// - `:memory:` for in-memory database
    /// - File path for disk-based database
    ///
    /// File-based databases run in WAL mode.
    pub async fn open(path: &str) -> SqliteResult<Self> {
        let is_memory = path == ":memory:";
        let conn = if is_memory {
            Connection::open_in_memory().await?
        } else {
            Connection::open(path).await?
        };

        if !is_memory {
            conn.call(|c| {
                c.execute_batch(
                    "PRAGMA journal_mode=WAL;
                     PRAGMA synchronous=NORMAL;
                     PRAGMA busy_timeout=5000;",
                )?;
                Ok(())
            })
            .await?;
        }

        debug!(path, "opened sqlite connection");
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn handle(&self) -> SqliteResult<Connection> {
        self.conn.lock().clone().ok_or(SqliteError::ConnectionClosed)
    }

    /// Run one statement and shape the outcome as a [`Response`].
    ///
    /// Statements with result columns produce metadata and rows. DML reports
    /// its change count, and an INSERT/REPLACE that changed rows also reports
    /// the new rowid as the autoincrement id. Anything else gets an empty
    /// response.
    pub async fn run(&self, sql: &str) -> SqliteResult<Response> {
        let conn = self.handle()?;
        let sql = sql.to_string();
        let kind = StatementKind::of(&sql);

        conn.call(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;

            if stmt.column_count() == 0 {
                // sqlite3_changes() is stale after DDL
                let changes = stmt.execute([])? as u64;
                drop(stmt);
                if !kind.is_dml() {
                    return Ok(Response::default());
                }
                let ids = if kind.assigns_rowid() && changes > 0 {
                    vec![conn.last_insert_rowid()]
                } else {
                    Vec::new()
                };
                return Ok(Response::with_sql_info(changes, ids));
            }

            let metadata: Vec<ColumnMeta> = stmt
                .columns()
                .iter()
                .map(|c| ColumnMeta::new(c.name(), type_code(c.decl_type())))
                .collect();
            let width = metadata.len();

            let mut rows_data = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut values = Row::with_capacity(width);
                for i in 0..width {
                    values.push(from_value_ref(row.get_ref(i)?));
                }
                rows_data.push(values);
            }

            Ok(Response::with_rows(metadata, rows_data))
        })
        .await
        .map_err(SqliteError::from)
    }

    /// Execute multiple statements (for DDL, etc.).
    pub async fn execute_batch(&self, sql: &str) -> SqliteResult<()> {
        let conn = self.handle()?;
        let sql = sql.to_string();

        conn.call(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
        .map_err(SqliteError::from)
    }

    /// Close the connection. Closing twice fails.
    pub async fn shutdown(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().take().ok_or(SqliteError::ConnectionClosed)?;
        conn.close().await?;
        debug!(path = %self.path, "closed sqlite connection");
        Ok(())
    }

    /// Check if the connection is closed.
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }
}

impl BaseConnection for SqliteConnection {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<Response>> + Send {
        trace!(sql, "sqlite execute");
        async move { self.run(sql).await.map_err(Into::into) }
    }

    fn close(&self) -> impl Future<Output = Result<()>> + Send {
        async move { self.shutdown().await.map_err(Into::into) }
    }
}
