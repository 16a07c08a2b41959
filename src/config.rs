//! Connection options.

use serde::{Deserialize, Serialize};

use crate::error::{DbApiError, Result};

fn default_arraysize() -> usize {
    1
}

fn default_statement_cache_size() -> usize {
    128
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Database URL, e.g. `sqlite::memory:` or `sqlite:///var/db/app.db`.
    pub url: String,
    /// Default `fetchmany` size for new cursors.
    #[serde(default = "default_arraysize")]
    pub arraysize: usize,
    /// Parsed query templates kept per connection; 0 disables the cache.
    #[serde(default = "default_statement_cache_size")]
    pub statement_cache_size: usize,
    /// Log level for the crate's tracing target; `None` defers to `RUST_LOG`.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Where the base connection lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Sqlite { path: String },
}

impl ConnectOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            arraysize: default_arraysize(),
            statement_cache_size: default_statement_cache_size(),
            log_level: None,
        }
    }

    pub fn arraysize(mut self, size: usize) -> Self {
        self.arraysize = size;
        self
    }

    pub fn statement_cache_size(mut self, size: usize) -> Self {
        self.statement_cache_size = size;
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = Some(level.into());
        self
    }

    /// Parse a URL, applying `arraysize`, `statement_cache_size` and
    /// `log_level` query parameters on top of the defaults.
    pub fn from_url(url: &str) -> Result<Self> {
        let (base, query) = match url.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (url, None),
        };

        let mut opts = Self::new(base);
        // Validate the scheme up front
        opts.target()?;

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "arraysize" => opts.arraysize = parse_number(key, value)?,
                "statement_cache_size" => opts.statement_cache_size = parse_number(key, value)?,
                "log_level" => opts.log_level = Some(value.to_string()),
                other => {
                    return Err(DbApiError::interface(format!(
                        "Unknown connection option: {}",
                        other
                    )))
                }
            }
        }

        if opts.arraysize == 0 {
            return Err(DbApiError::interface("arraysize must be at least 1"));
        }
        Ok(opts)
    }

    /// Resolve the URL scheme to a backend.
    pub fn target(&self) -> Result<Target> {
        let url = self.url.split_once('?').map(|(b, _)| b).unwrap_or(&self.url);

        // sqlite::memory:, sqlite://path, sqlite:path
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .ok_or_else(|| {
                DbApiError::interface(format!("Unsupported database URL scheme: {}", url))
            })?;

        let path = match path {
            "" | ":memory:" => ":memory:".to_string(),
            p => p.to_string(),
        };
        Ok(Target::Sqlite { path })
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| DbApiError::interface(format!("Invalid value for {}: {}", key, value)))
}
