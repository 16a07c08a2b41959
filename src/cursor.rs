//! DB-API cursor.
//!
//! A cursor buffers the whole result set of its last execution and hands
//! rows out from a moving position. `rows` is `None` until a statement
//! produces a result set; fetching without one is a `ProgrammingError`.

use tracing::{debug, trace, warn};

use crate::base::BaseConnection;
use crate::connection::Connection;
use crate::error::{DbApiError, Result};
use crate::format::Params;
use crate::response::{ColumnDescription, Response};
use crate::types::{Row, Value};

/// Leading keyword of a statement, as far as row bookkeeping cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatementKind {
    Insert,
    Replace,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    /// Classify by the first keyword after whitespace and comments.
    ///
    /// A `WITH ...` prefix is not looked through, so a CTE-fronted DML
    /// statement classifies as `Other`.
    pub(crate) fn of(query: &str) -> Self {
        let keyword: String = skip_leading_comments(query)
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        match keyword.to_ascii_uppercase().as_str() {
            "INSERT" => StatementKind::Insert,
            "REPLACE" => StatementKind::Replace,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            _ => StatementKind::Other,
        }
    }

    pub(crate) fn is_dml(self) -> bool {
        !matches!(self, StatementKind::Other)
    }

    pub(crate) fn assigns_rowid(self) -> bool {
        matches!(self, StatementKind::Insert | StatementKind::Replace)
    }
}

fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            return sql;
        }
    }
}

pub struct Cursor<B: BaseConnection> {
    conn: Option<Connection<B>>,
    response: Option<Response>,
    position: usize,
    rowcount: i64,
    lastrowid: Option<i64>,
    description: Option<Vec<ColumnDescription>>,
    arraysize: usize,
}

impl<B: BaseConnection> Cursor<B> {
    pub(crate) fn new(conn: Connection<B>) -> Self {
        let arraysize = conn.arraysize();
        Self {
            conn: Some(conn),
            response: None,
            position: 0,
            rowcount: -1,
            lastrowid: None,
            description: None,
            arraysize,
        }
    }

    fn connection(&self) -> Result<&Connection<B>> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbApiError::programming("Cursor is closed"))
    }

    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// Number of rows affected by the last DML statement, or -1.
    pub fn rowcount(&self) -> i64 {
        self.rowcount
    }

    /// Id generated by the last INSERT/REPLACE, if the server reported one.
    pub fn lastrowid(&self) -> Option<i64> {
        self.lastrowid
    }

    pub fn description(&self) -> Option<&[ColumnDescription]> {
        self.description.as_deref()
    }

    pub fn arraysize(&self) -> usize {
        self.arraysize
    }

    pub fn set_arraysize(&mut self, size: usize) {
        self.arraysize = size.max(1);
    }

    /// Rows produced by the last execution that have not been fetched yet.
    pub fn remaining(&self) -> Option<usize> {
        self.rows().map(|rows| rows.len() - self.position)
    }

    fn rows(&self) -> Option<&Vec<Row>> {
        self.response.as_ref().and_then(|r| r.rows.as_ref())
    }

    /// Execute a statement, replacing any pending result set.
    ///
    /// The returned response still holds every row; fetching later moves
    /// rows out of the cursor's copy.
    pub async fn execute(&mut self, query: &str, params: impl Into<Params>) -> Result<&Response> {
        let response = self.connection()?.execute(query, params).await?;
        let kind = StatementKind::of(query);

        self.rowcount = if kind.is_dml() {
            match response.rowcount() {
                Ok(n) => n as i64,
                Err(_) => {
                    warn!(query, "DML response carried no row count");
                    1
                }
            }
        } else {
            -1
        };
        if kind.assigns_rowid() {
            self.lastrowid = response.last_row_id();
        }

        debug!(
            rowcount = self.rowcount,
            rows = ?response.rows.as_ref().map(Vec::len),
            "cursor execute finished"
        );
        Ok(self.install(response))
    }

    /// Execute the same statement once per parameter set.
    ///
    /// `rowcount` ends up as the sum of the individual counts, or -1 if any
    /// execution could not report one.
    pub async fn executemany<I, P>(&mut self, query: &str, param_sets: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<Params>,
    {
        let mut counts = Vec::new();
        for params in param_sets {
            self.execute(query, params).await?;
            counts.push(self.rowcount);
        }

        self.rowcount = if counts.contains(&-1) {
            -1
        } else {
            counts.iter().sum()
        };
        Ok(self)
    }

    /// Call a stored procedure. Any rows it returns become the result set;
    /// the input parameters are returned unchanged.
    pub async fn callproc(&mut self, procname: &str, params: &[Value]) -> Result<Vec<Value>> {
        let response = self.connection()?.call(procname, params).await?;
        self.rowcount = -1;
        self.install(response);
        Ok(params.to_vec())
    }

    fn install(&mut self, response: Response) -> &Response {
        self.description = response.description();
        self.position = 0;
        self.response.insert(response)
    }

    fn take_rows(&mut self, size: usize) -> Result<Vec<Row>> {
        if self.is_closed() {
            return Err(DbApiError::programming("Cursor is closed"));
        }
        let start = self.position;
        let rows = self
            .response
            .as_mut()
            .and_then(|r| r.rows.as_mut())
            .ok_or_else(|| DbApiError::programming("Nothing to fetch"))?;

        let end = start.saturating_add(size).min(rows.len());
        let taken: Vec<Row> = rows[start..end].iter_mut().map(std::mem::take).collect();
        self.position = end;
        trace!(fetched = taken.len(), position = end, "fetch");
        Ok(taken)
    }

    /// Next row, or `None` when the result set is exhausted.
    pub fn fetchone(&mut self) -> Result<Option<Row>> {
        Ok(self.take_rows(1)?.into_iter().next())
    }

    /// Up to `size` rows; `None` or 0 uses `arraysize`.
    pub fn fetchmany(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        let size = match size {
            Some(n) if n > 0 => n,
            _ => self.arraysize,
        };
        self.take_rows(size)
    }

    /// All remaining rows.
    pub fn fetchall(&mut self) -> Result<Vec<Row>> {
        self.take_rows(usize::MAX)
    }

    /// Accepted for compatibility; sizes are not used.
    pub fn setinputsizes<T>(&mut self, _sizes: &[T]) {}

    /// Accepted for compatibility; sizes are not used.
    pub fn setoutputsize(&mut self, _size: usize, _column: Option<usize>) {}

    /// Detach from the connection and drop buffered rows. Closing twice is allowed.
    pub fn close(&mut self) {
        self.conn = None;
        self.response = None;
        self.description = None;
        self.position = 0;
    }
}
