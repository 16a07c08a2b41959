//! SQLite base connection.
//!
//! A [`BaseConnection`](crate::base::BaseConnection) backed by rusqlite,
//! with tokio-rusqlite moving blocking calls onto a worker thread.

pub mod connection;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
