//! The seam to the underlying database client.
//!
//! A base connection owns the socket, the wire protocol and everything below
//! it. The DB-API layer hands it fully interpolated SQL and reads back a
//! [`Response`].

use std::future::Future;

use crate::error::{DbApiError, Result};
use crate::response::Response;
use crate::types::Value;

pub trait BaseConnection: Send + Sync + 'static {
    /// Run a single SQL statement.
    fn execute(&self, sql: &str) -> impl Future<Output = Result<Response>> + Send;

    /// Invoke a stored procedure. Rows it returns become the result set.
    fn call(&self, procname: &str, args: &[Value]) -> impl Future<Output = Result<Response>> + Send {
        let _ = args;
        let msg = format!("stored procedure '{procname}' is not supported by this connection");
        async move { Err(DbApiError::NotSupportedError(msg)) }
    }

    /// Release the underlying socket or handle.
    fn close(&self) -> impl Future<Output = Result<()>> + Send;
}
