//! Tests for the SQLite base connection.

use super::*;
use crate::base::BaseConnection;
use crate::error::DbApiError;
use crate::types::Value;

#[tokio::test]
async fn test_connection_open_memory() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    assert!(!conn.is_closed());
    assert_eq!(conn.path(), ":memory:");
}

#[tokio::test]
async fn test_select_produces_result_set() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch(
        "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, value REAL);
         INSERT INTO test (name, value) VALUES ('hello', 1.5);",
    )
    .await
    .unwrap();

    let resp = conn.run("SELECT * FROM test").await.unwrap();
    assert!(resp.has_result_set());
    assert!(resp.sql_info.is_none());
    assert_eq!(resp.column_names(), vec!["id", "name", "value"]);

    let meta = resp.metadata.as_ref().unwrap();
    assert_eq!(meta[0].field_type, "integer");
    assert_eq!(meta[1].field_type, "text");

    let rows = resp.rows.as_ref().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], Value::Text("hello".to_string()));
    assert_eq!(rows[0][2], Value::Float(1.5));
}

#[tokio::test]
async fn test_insert_reports_rowcount_and_rowid() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.run("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
        .await
        .unwrap();

    let resp = conn
        .run("INSERT INTO test (name) VALUES ('a'), ('b')")
        .await
        .unwrap();
    assert!(!resp.has_result_set());
    assert_eq!(resp.rowcount().unwrap(), 2);
    assert_eq!(resp.last_row_id(), Some(2));

    let resp = conn.run("UPDATE test SET name = 'c'").await.unwrap();
    assert_eq!(resp.rowcount().unwrap(), 2);
    assert_eq!(resp.last_row_id(), None);
}

#[tokio::test]
async fn test_empty_select_keeps_metadata() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.run("CREATE TABLE test (data BLOB)").await.unwrap();

    let resp = conn.run("SELECT data FROM test").await.unwrap();
    assert_eq!(resp.rows.as_ref().map(Vec::len), Some(0));
    assert_eq!(resp.metadata.as_ref().unwrap()[0].field_type, "blob");
}

#[tokio::test]
async fn test_blob_and_null_values() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch(
        "CREATE TABLE test (id INTEGER, data BLOB);
         INSERT INTO test VALUES (1, X'DEADBEEF'), (2, NULL);",
    )
    .await
    .unwrap();

    let resp = conn.run("SELECT data FROM test ORDER BY id").await.unwrap();
    let rows = resp.rows.unwrap();
    assert_eq!(rows[0][0], Value::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    assert_eq!(rows[1][0], Value::Null);
}

#[tokio::test]
async fn test_rowid_reported_for_each_table() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.execute_batch(
        "CREATE TABLE a (id INTEGER PRIMARY KEY, v TEXT);
         CREATE TABLE b (id INTEGER PRIMARY KEY, v TEXT);",
    )
    .await
    .unwrap();

    let resp = conn.run("INSERT INTO a (v) VALUES ('x')").await.unwrap();
    assert_eq!(resp.last_row_id(), Some(1));

    // Same rowid as the previous insert, different table
    let resp = conn.run("INSERT INTO b (v) VALUES ('y')").await.unwrap();
    assert_eq!(resp.rowcount().unwrap(), 1);
    assert_eq!(resp.last_row_id(), Some(1));

    conn.run("DELETE FROM b").await.unwrap();
    let resp = conn.run("INSERT INTO b (v) VALUES ('z')").await.unwrap();
    assert_eq!(resp.last_row_id(), Some(1));
}

#[tokio::test]
async fn test_replace_reports_rowid() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.run("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)")
        .await
        .unwrap();
    conn.run("INSERT INTO t VALUES (5, 'a')").await.unwrap();

    let resp = conn.run("REPLACE INTO t VALUES (5, 'b')").await.unwrap();
    assert_eq!(resp.last_row_id(), Some(5));

    let resp = conn
        .run("INSERT OR IGNORE INTO t VALUES (5, 'c')")
        .await
        .unwrap();
    assert_eq!(resp.rowcount().unwrap(), 0);
    assert_eq!(resp.last_row_id(), None);
}

#[tokio::test]
async fn test_ddl_after_insert_has_no_sql_info() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.run("CREATE TABLE a (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    conn.run("INSERT INTO a VALUES (1)").await.unwrap();

    let resp = conn.run("CREATE TABLE c (id INTEGER)").await.unwrap();
    assert!(resp.sql_info.is_none());
    assert!(!resp.has_result_set());
    assert!(matches!(resp.rowcount(), Err(DbApiError::InterfaceError(_))));
}

#[tokio::test]
async fn test_errors_map_to_dbapi_hierarchy() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.run("CREATE TABLE test (id INTEGER PRIMARY KEY)")
        .await
        .unwrap();
    conn.run("INSERT INTO test VALUES (1)").await.unwrap();

    let err = BaseConnection::execute(&conn, "INSERT INTO test VALUES (1)")
        .await
        .unwrap_err();
    assert!(matches!(err, DbApiError::IntegrityError(_)), "{err}");

    let err = BaseConnection::execute(&conn, "SELEC nothing")
        .await
        .unwrap_err();
    assert!(matches!(err, DbApiError::ProgrammingError(_)), "{err}");
}

#[tokio::test]
async fn test_close_twice_fails() {
    let conn = SqliteConnection::open(":memory:").await.unwrap();
    conn.shutdown().await.unwrap();
    assert!(conn.is_closed());
    assert!(matches!(
        conn.run("SELECT 1").await,
        Err(SqliteError::ConnectionClosed)
    ));
    assert!(matches!(
        conn.shutdown().await,
        Err(SqliteError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path_str = dir.path().join("persist.db").to_str().unwrap().to_string();

    let conn = SqliteConnection::open(&path_str).await.unwrap();
    conn.run("CREATE TABLE t (id INTEGER)").await.unwrap();
    conn.run("INSERT INTO t VALUES (7)").await.unwrap();
    conn.shutdown().await.unwrap();

    let conn = SqliteConnection::open(&path_str).await.unwrap();
    let resp = conn.run("SELECT id FROM t").await.unwrap();
    assert_eq!(resp.rows.unwrap()[0][0], Value::Int(7));
    conn.shutdown().await.unwrap();
}
