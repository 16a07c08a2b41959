//! DB-API connection.
//!
//! Wraps a [`BaseConnection`] and owns the per-connection bookkeeping:
//! the closed flag and the cache of parsed query templates. Clones share
//! the same underlying connection, so cursors observe `close()` made
//! through any handle.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::base::BaseConnection;
use crate::config::{ConnectOptions, Target};
use crate::cursor::Cursor;
use crate::error::{DbApiError, Result};
use crate::format::{Params, TemplateCache};
use crate::logging;
use crate::response::Response;
use crate::sqlite::SqliteConnection;
use crate::types::Value;

struct ConnectionInner<B> {
    base: RwLock<Option<Arc<B>>>,
    templates: TemplateCache,
    arraysize: usize,
}

pub struct Connection<B: BaseConnection> {
    inner: Arc<ConnectionInner<B>>,
}

impl<B: BaseConnection> Clone for Connection<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: BaseConnection> Connection<B> {
    /// Wrap an already connected base with default options.
    pub fn new(base: B) -> Self {
        Self::with_options(base, &ConnectOptions::new(""))
    }

    pub fn with_options(base: B, opts: &ConnectOptions) -> Self {
        Self {
            inner: Arc::new(ConnectionInner {
                base: RwLock::new(Some(Arc::new(base))),
                templates: TemplateCache::new(opts.statement_cache_size),
                arraysize: opts.arraysize.max(1),
            }),
        }
    }

    fn base(&self) -> Result<Arc<B>> {
        self.inner
            .base
            .read()
            .clone()
            .ok_or_else(|| DbApiError::programming("Can not execute on closed connection"))
    }

    pub fn is_closed(&self) -> bool {
        self.inner.base.read().is_none()
    }

    /// Default `arraysize` handed to new cursors.
    pub fn arraysize(&self) -> usize {
        self.inner.arraysize
    }

    /// Interpolate `params` into `query` and run it on the base connection.
    pub async fn execute(&self, query: &str, params: impl Into<Params>) -> Result<Response> {
        let base = self.base()?;
        let sql = self.inner.templates.interpolate(query, &params.into())?;
        debug!(sql = %sql, "execute");
        base.execute(&sql).await
    }

    pub(crate) async fn call(&self, procname: &str, args: &[Value]) -> Result<Response> {
        let base = self.base()?;
        debug!(procname, args = args.len(), "callproc");
        base.call(procname, args).await
    }

    /// Transactions are left to the server; on an open connection this is a no-op.
    pub fn commit(&self) -> Result<()> {
        self.ensure_open()
    }

    pub fn rollback(&self) -> Result<()> {
        self.ensure_open()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DbApiError::programming("Connection is closed"));
        }
        Ok(())
    }

    /// Close the base connection. Every cursor created from this
    /// connection becomes unusable.
    pub async fn close(&self) -> Result<()> {
        let base = self
            .inner
            .base
            .write()
            .take()
            .ok_or_else(|| DbApiError::programming("Connection already closed"))?;
        if let Err(e) = base.close().await {
            warn!(error = %e, "error while closing base connection");
            return Err(e);
        }
        debug!("connection closed");
        Ok(())
    }

    pub fn cursor(&self) -> Cursor<B> {
        Cursor::new(self.clone())
    }
}

impl Connection<SqliteConnection> {
    /// Open a connection from options.
    pub async fn connect(opts: ConnectOptions) -> Result<Self> {
        logging::init_logging(opts.log_level.as_deref());

        let base = match opts.target()? {
            Target::Sqlite { path } => SqliteConnection::open(&path).await?,
        };
        debug!(url = %opts.url, "connected");
        Ok(Self::with_options(base, &opts))
    }
}

/// Open a connection from a URL such as `sqlite::memory:`.
pub async fn connect(url: &str) -> Result<Connection<SqliteConnection>> {
    Connection::connect(ConnectOptions::from_url(url)?).await
}
