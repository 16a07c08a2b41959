//! Response model returned by a base connection.
//!
//! Mirrors the body of a SQL response: column metadata and data for
//! statements that produce a result set, `sql_info` for DML.

use serde::{Deserialize, Serialize};

use crate::error::{DbApiError, Result};
use crate::types::Row;

/// Column metadata as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    /// Server type name, e.g. `integer` or `string`.
    pub field_type: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

/// Execution summary for DML statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlInfo {
    pub row_count: u64,
    #[serde(default)]
    pub autoincrement_ids: Vec<i64>,
}

/// One entry of `cursor.description`.
///
/// Only `name` and `type_code` are known; the remaining five DB-API fields
/// (display_size, internal_size, precision, scale, null_ok) are always `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescription {
    pub name: String,
    pub type_code: String,
    pub display_size: Option<u32>,
    pub internal_size: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub null_ok: Option<bool>,
}

impl From<&ColumnMeta> for ColumnDescription {
    fn from(meta: &ColumnMeta) -> Self {
        Self {
            name: meta.name.clone(),
            type_code: meta.field_type.clone(),
            display_size: None,
            internal_size: None,
            precision: None,
            scale: None,
            null_ok: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub metadata: Option<Vec<ColumnMeta>>,
    pub rows: Option<Vec<Row>>,
    pub sql_info: Option<SqlInfo>,
}

impl Response {
    /// A result-set response.
    pub fn with_rows(metadata: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self {
            metadata: Some(metadata),
            rows: Some(rows),
            sql_info: None,
        }
    }

    /// A DML response.
    pub fn with_sql_info(row_count: u64, autoincrement_ids: Vec<i64>) -> Self {
        Self {
            metadata: None,
            rows: None,
            sql_info: Some(SqlInfo {
                row_count,
                autoincrement_ids,
            }),
        }
    }

    pub fn has_result_set(&self) -> bool {
        self.rows.is_some()
    }

    /// Rows affected by a DML statement.
    pub fn rowcount(&self) -> Result<u64> {
        self.sql_info
            .as_ref()
            .map(|info| info.row_count)
            .ok_or_else(|| DbApiError::interface("Task was not an SQL request"))
    }

    /// First id generated by an autoincrement field, if any.
    pub fn last_row_id(&self) -> Option<i64> {
        self.sql_info
            .as_ref()
            .and_then(|info| info.autoincrement_ids.first().copied())
    }

    pub fn description(&self) -> Option<Vec<ColumnDescription>> {
        self.metadata
            .as_ref()
            .map(|cols| cols.iter().map(ColumnDescription::from).collect())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.metadata
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use smallvec::smallvec;

    #[test]
    fn test_dml_response() {
        let resp = Response::with_sql_info(3, vec![10, 11, 12]);
        assert!(!resp.has_result_set());
        assert_eq!(resp.rowcount().unwrap(), 3);
        assert_eq!(resp.last_row_id(), Some(10));
        assert!(resp.description().is_none());
    }

    #[test]
    fn test_select_response() {
        let resp = Response::with_rows(
            vec![ColumnMeta::new("ID", "integer"), ColumnMeta::new("NAME", "string")],
            vec![smallvec![Value::Int(1), Value::from("a")]],
        );
        assert!(resp.has_result_set());
        assert!(matches!(resp.rowcount(), Err(DbApiError::InterfaceError(_))));
        assert_eq!(resp.last_row_id(), None);
        assert_eq!(resp.column_names(), vec!["ID", "NAME"]);

        let desc = resp.description().unwrap();
        assert_eq!(desc[1].name, "NAME");
        assert_eq!(desc[1].type_code, "string");
        assert_eq!(desc[1].null_ok, None);
    }
}
