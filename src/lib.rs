//! A DB-API 2.0 layer over a Tarantool-style SQL client.
//!
//! The wire client stays behind [`BaseConnection`]; this crate does
//! parameter interpolation, response reshaping and cursor bookkeeping.

pub mod base;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod format;
pub mod logging;
pub mod response;
pub mod sqlite;
pub mod types;

#[cfg(feature = "python")]
mod python;


pub use base::BaseConnection;
pub use config::ConnectOptions;
pub use connection::{connect, Connection};
pub use cursor::Cursor;
pub use error::{DbApiError, Result};
pub use format::Params;
pub use response::{ColumnDescription, ColumnMeta, Response, SqlInfo};
pub use types::{Row, TypeObject, Value};

/// Supported DB API level.
pub const APILEVEL: &str = "2.0";

/// Parameter marker style: `%s` (and `%(name)s` with a mapping).
pub const PARAMSTYLE: &str = "format";

/// Threads may share the module, but not connections.
pub const THREADSAFETY: u8 = 1;

/// tarantool-dbapi - DB-API 2.0 connections and cursors powered by Rust
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _tarantool_dbapi(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    python::register(m)
}
