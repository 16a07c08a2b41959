//! Client-side parameter interpolation.
//!
//! Queries use the `format` paramstyle: `%s` marks a positional parameter,
//! `%(name)s` a named one, and `%%` a literal percent sign. Parameters are
//! rendered as SQL literals and spliced into the query text before it is
//! handed to the base connection.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::error::{DbApiError, Result};
use crate::types::Value;

/// Parameters bound to a single execution.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Params {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(HashMap<String, Value>),
}

impl Params {
    pub fn is_empty(&self) -> bool {
        match self {
            Params::None => true,
            Params::Positional(v) => v.is_empty(),
            Params::Named(m) => m.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Params::Positional(values)
    }
}

impl From<HashMap<String, Value>> for Params {
    fn from(values: HashMap<String, Value>) -> Self {
        Params::Named(values)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Positional,
    Named(String),
}

/// A query split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTemplate {
    segments: Vec<Segment>,
    positional: usize,
    named: usize,
}

impl QueryTemplate {
    pub fn parse(query: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut positional = 0;
        let mut named = 0;
        let mut chars = query.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            match chars.next() {
                Some((_, '%')) => literal.push('%'),
                Some((_, 's')) => {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    segments.push(Segment::Positional);
                    positional += 1;
                }
                Some((_, '(')) => {
                    let mut name = String::new();
                    let mut closed = false;
                    for (_, nc) in chars.by_ref() {
                        if nc == ')' {
                            closed = true;
                            break;
                        }
                        name.push(nc);
                    }
                    if !closed {
                        return Err(DbApiError::programming(format!(
                            "incomplete format key at index {pos}"
                        )));
                    }
                    match chars.next() {
                        Some((_, 's')) => {}
                        Some((i, other)) => {
                            return Err(DbApiError::programming(format!(
                                "unsupported format character '{other}' at index {i}"
                            )))
                        }
                        None => return Err(DbApiError::programming("incomplete format")),
                    }
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    segments.push(Segment::Named(name));
                    named += 1;
                }
                Some((i, other)) => {
                    return Err(DbApiError::programming(format!(
                        "unsupported format character '{other}' at index {i}"
                    )))
                }
                None => return Err(DbApiError::programming("incomplete format")),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        segments.retain(|s| !matches!(s, Segment::Literal(l) if l.is_empty()));

        Ok(Self {
            segments,
            positional,
            named,
        })
    }

    /// Number of `%s` placeholders.
    pub fn positional_count(&self) -> usize {
        self.positional
    }

    pub fn render(&self, params: &Params) -> Result<String> {
        let values: &[Value] = match params {
            _ if self.positional > 0 && self.named > 0 => {
                return Err(DbApiError::programming(
                    "cannot mix positional and named placeholders",
                ))
            }
            Params::None if self.positional + self.named > 0 => {
                return Err(DbApiError::programming(
                    "not enough arguments for format string",
                ))
            }
            Params::Positional(_) if self.named > 0 => {
                return Err(DbApiError::programming("format requires a mapping"))
            }
            Params::Positional(values) if values.len() < self.positional => {
                return Err(DbApiError::programming(format!(
                    "not enough arguments for format string: expected {}, got {}",
                    self.positional,
                    values.len()
                )))
            }
            Params::Positional(values) if values.len() > self.positional => {
                return Err(DbApiError::programming(format!(
                    "not all arguments converted during string formatting: expected {}, got {}",
                    self.positional,
                    values.len()
                )))
            }
            Params::Named(_) if self.positional > 0 => {
                return Err(DbApiError::programming(
                    "positional placeholders require a sequence of parameters",
                ))
            }
            Params::Positional(values) => values,
            Params::None | Params::Named(_) => &[],
        };

        let mut out = String::new();
        let mut values = values.iter();
        for segment in &self.segments {
            match (segment, params) {
                (Segment::Literal(l), _) => out.push_str(l),
                (Segment::Positional, _) => {
                    let value = values.next().ok_or_else(|| {
                        DbApiError::programming("not enough arguments for format string")
                    })?;
                    write_literal(&mut out, value)?;
                }
                (Segment::Named(name), Params::Named(map)) => {
                    let value = map.get(name).ok_or_else(|| {
                        DbApiError::programming(format!("missing parameter '{name}'"))
                    })?;
                    write_literal(&mut out, value)?;
                }
                (Segment::Named(_), _) => {
                    return Err(DbApiError::programming("format requires a mapping"))
                }
            }
        }
        Ok(out)
    }
}

/// Render a value as a SQL literal.
pub fn to_sql_literal(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_literal(&mut out, value)?;
    Ok(out)
}

fn write_literal(out: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(true) => out.push_str("TRUE"),
        Value::Bool(false) => out.push_str("FALSE"),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(DbApiError::DataError(format!(
                    "cannot bind non-finite float {f}"
                )));
            }
            // Debug keeps the decimal point on whole numbers (1.0, not 1)
            let _ = write!(out, "{f:?}");
        }
        Value::Text(s) => quote_into(out, s),
        Value::Blob(b) => {
            out.push_str("X'");
            for byte in b {
                let _ = write!(out, "{byte:02X}");
            }
            out.push('\'');
        }
        Value::Date(d) => quote_into(out, &d.format("%Y-%m-%d").to_string()),
        Value::Time(t) => quote_into(out, &t.format("%H:%M:%S%.f").to_string()),
        Value::Timestamp(ts) => quote_into(out, &ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
    Ok(())
}

fn quote_into(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
}

/// Interpolate parameters into a query without caching the parsed template.
///
/// With no parameters the query is returned verbatim, `%%` included.
pub fn interpolate(query: &str, params: &Params) -> Result<String> {
    if params.is_empty() {
        return Ok(query.to_string());
    }
    QueryTemplate::parse(query)?.render(params)
}

/// Per-connection cache of parsed templates keyed by query text.
pub struct TemplateCache {
    inner: Option<Mutex<LruCache<String, Arc<QueryTemplate>>>>,
}

impl TemplateCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    pub fn template(&self, query: &str) -> Result<Arc<QueryTemplate>> {
        let Some(cache) = &self.inner else {
            return Ok(Arc::new(QueryTemplate::parse(query)?));
        };

        if let Some(hit) = cache.lock().get(query) {
            return Ok(Arc::clone(hit));
        }

        let parsed = Arc::new(QueryTemplate::parse(query)?);
        cache.lock().put(query.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    /// Same contract as [`interpolate`], reusing parsed templates.
    pub fn interpolate(&self, query: &str, params: &Params) -> Result<String> {
        if params.is_empty() {
            return Ok(query.to_string());
        }
        self.template(query)?.render(params)
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map(|c| c.lock().len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;

    fn positional(values: Vec<Value>) -> Params {
        Params::Positional(values)
    }

    #[test]
    fn test_no_params_passes_query_verbatim() {
        let q = "SELECT '100%%' FROM t WHERE a = %s";
        assert_eq!(interpolate(q, &Params::None).unwrap(), q);
        assert_eq!(interpolate(q, &positional(vec![])).unwrap(), q);
    }

    #[test]
    fn test_positional_interpolation() {
        let sql = interpolate(
            "INSERT INTO t VALUES (%s, %s, %s, %s)",
            &positional(vec![
                Value::Int(1),
                Value::from("O'Brien"),
                Value::Null,
                Value::Bool(false),
            ]),
        )
        .unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES (1, 'O''Brien', NULL, FALSE)");
    }

    #[test]
    fn test_percent_escape_with_params() {
        let sql = interpolate(
            "SELECT * FROM t WHERE name LIKE '10%%' AND id = %s",
            &positional(vec![Value::Int(7)]),
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name LIKE '10%' AND id = 7");
    }

    #[test]
    fn test_named_interpolation() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::from("Victoria Bitter"));
        map.insert("unused".to_string(), Value::Int(0));
        let sql = interpolate(
            "SELECT * FROM booze WHERE name = %(name)s OR alias = %(name)s",
            &Params::Named(map),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM booze WHERE name = 'Victoria Bitter' OR alias = 'Victoria Bitter'"
        );
    }

    #[test]
    fn test_argument_count_mismatch() {
        let err = interpolate("SELECT %s, %s", &positional(vec![Value::Int(1)])).unwrap_err();
        assert!(matches!(err, DbApiError::ProgrammingError(_)));

        let err = interpolate("SELECT 1", &positional(vec![Value::Int(1)])).unwrap_err();
        assert!(err.to_string().contains("not all arguments converted"));
    }

    #[test]
    fn test_bad_format_characters() {
        let params = positional(vec![Value::Int(1)]);
        assert!(interpolate("SELECT %d", &params).is_err());
        assert!(interpolate("SELECT %s %", &params).is_err());
        assert!(interpolate("SELECT %(name", &params).is_err());
    }

    #[test]
    fn test_named_and_positional_do_not_mix() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Int(1));
        assert!(interpolate("SELECT %s", &Params::Named(map)).is_err());
        assert!(interpolate("SELECT %(a)s", &positional(vec![Value::Int(1)])).is_err());
    }

    #[test]
    fn test_mixed_template_is_an_error_for_every_param_shape() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), Value::Int(1));
        let shapes = [
            Params::None,
            positional(vec![Value::Int(1)]),
            Params::Named(map),
        ];
        let template = QueryTemplate::parse("SELECT %s, %(a)s").unwrap();
        for params in &shapes {
            let err = template.render(params).unwrap_err();
            assert!(matches!(err, DbApiError::ProgrammingError(_)), "{err}");
        }
    }

    #[test]
    fn test_literal_rendering() {
        assert_eq!(to_sql_literal(&Value::Float(1.0)).unwrap(), "1.0");
        assert_eq!(to_sql_literal(&Value::Float(-2.5)).unwrap(), "-2.5");
        assert!(to_sql_literal(&Value::Float(f64::NAN)).is_err());
        assert_eq!(
            to_sql_literal(&Value::Blob(vec![0xDE, 0xAD, 0x01])).unwrap(),
            "X'DEAD01'"
        );
        assert_eq!(
            to_sql_literal(&types::date(2024, 3, 1).unwrap()).unwrap(),
            "'2024-03-01'"
        );
        assert_eq!(
            to_sql_literal(&types::timestamp(2024, 3, 1, 12, 30, 0).unwrap()).unwrap(),
            "'2024-03-01 12:30:00'"
        );
    }

    #[test]
    fn test_template_cache_reuses_parse() {
        let cache = TemplateCache::new(2);
        let params = positional(vec![Value::Int(1)]);
        assert_eq!(cache.interpolate("SELECT %s", &params).unwrap(), "SELECT 1");
        assert_eq!(
            cache.interpolate("SELECT %s", &positional(vec![Value::Int(2)])).unwrap(),
            "SELECT 2"
        );
        assert_eq!(cache.len(), 1);

        let first = cache.template("SELECT %s").unwrap();
        let second = cache.template("SELECT %s").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.positional_count(), 1);

        cache.template("SELECT 2").unwrap();
        cache.template("SELECT 3").unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_disabled_cache() {
        let cache = TemplateCache::new(0);
        assert_eq!(
            cache.interpolate("SELECT %s", &positional(vec![Value::from("x")])).unwrap(),
            "SELECT 'x'"
        );
        assert_eq!(cache.len(), 0);
    }
}
