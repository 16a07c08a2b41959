//! Python bindings: the DB-API 2.0 module surface.
//!
//! Every call blocks on a process-wide tokio runtime with the GIL released.

use once_cell::sync::OnceCell;
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::BoundObject;
use pyo3::types::{
    PyBool, PyByteArray, PyBytes, PyDate, PyDateTime, PyDict, PyFloat, PyInt, PyList, PyString,
    PyTime, PyTuple,
};
use std::collections::HashMap;
use std::future::Future;

use crate::config::ConnectOptions;
use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::DbApiError;
use crate::format::Params;
use crate::sqlite::SqliteConnection;
use crate::types::{self, Row, TypeObject, Value};

create_exception!(_tarantool_dbapi, Warning, PyException);
create_exception!(_tarantool_dbapi, Error, PyException);
create_exception!(_tarantool_dbapi, InterfaceError, Error);
create_exception!(_tarantool_dbapi, DatabaseError, Error);
create_exception!(_tarantool_dbapi, DataError, DatabaseError);
create_exception!(_tarantool_dbapi, OperationalError, DatabaseError);
create_exception!(_tarantool_dbapi, IntegrityError, DatabaseError);
create_exception!(_tarantool_dbapi, InternalError, DatabaseError);
create_exception!(_tarantool_dbapi, ProgrammingError, DatabaseError);
create_exception!(_tarantool_dbapi, NotSupportedError, DatabaseError);

impl From<DbApiError> for PyErr {
    fn from(err: DbApiError) -> PyErr {
        let msg = err.to_string();
        match err {
            DbApiError::Warning(_) => Warning::new_err(msg),
            DbApiError::InterfaceError(_) => InterfaceError::new_err(msg),
            DbApiError::DatabaseError(_) => DatabaseError::new_err(msg),
            DbApiError::DataError(_) => DataError::new_err(msg),
            DbApiError::OperationalError(_) | DbApiError::IoError(_) => {
                OperationalError::new_err(msg)
            }
            DbApiError::IntegrityError(_) => IntegrityError::new_err(msg),
            DbApiError::InternalError(_) => InternalError::new_err(msg),
            DbApiError::ProgrammingError(_) => ProgrammingError::new_err(msg),
            DbApiError::NotSupportedError(_) => NotSupportedError::new_err(msg),
        }
    }
}

static RUNTIME: OnceCell<tokio::runtime::Runtime> = OnceCell::new();

fn runtime() -> PyResult<&'static tokio::runtime::Runtime> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| InternalError::new_err(format!("failed to start runtime: {}", e)))
    })
}

/// Run a future to completion without holding the GIL.
fn block_on<F, T>(py: Python<'_>, fut: F) -> PyResult<T>
where
    F: Future<Output = crate::error::Result<T>> + Send,
    T: Send,
{
    let rt = runtime()?;
    py.allow_threads(|| rt.block_on(fut)).map_err(PyErr::from)
}

// ============================================================================
// Value conversion
// ============================================================================

fn to_py<'py, T>(py: Python<'py>, value: T) -> PyResult<PyObject>
where
    T: IntoPyObject<'py>,
{
    value
        .into_pyobject(py)
        .map(|bound| bound.into_any().unbind())
        .map_err(Into::into)
}

fn value_to_py(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    match value {
        Value::Null => Ok(py.None()),
        Value::Bool(b) => to_py(py, *b),
        Value::Int(i) => to_py(py, *i),
        Value::Float(f) => to_py(py, *f),
        Value::Text(s) => to_py(py, s.as_str()),
        Value::Blob(b) => Ok(PyBytes::new(py, b).into_any().unbind()),
        Value::Date(d) => to_py(py, *d),
        Value::Time(t) => to_py(py, *t),
        Value::Timestamp(ts) => to_py(py, *ts),
    }
}

fn row_to_py(py: Python<'_>, row: &Row) -> PyResult<PyObject> {
    let values = row
        .iter()
        .map(|v| value_to_py(py, v))
        .collect::<PyResult<Vec<_>>>()?;
    Ok(PyTuple::new(py, values)?.into_any().unbind())
}

fn rows_to_py<'py>(py: Python<'py>, rows: &[Row]) -> PyResult<Bound<'py, PyList>> {
    let rows = rows
        .iter()
        .map(|row| row_to_py(py, row))
        .collect::<PyResult<Vec<_>>>()?;
    PyList::new(py, rows)
}

/// Convert a Python object to a bound parameter value.
///
/// `bool` is checked before `int` and `datetime` before `date`, since
/// each is a subclass of the latter.
fn value_from_py(obj: &Bound<'_, PyAny>) -> PyResult<Value> {
    if obj.is_none() {
        Ok(Value::Null)
    } else if obj.is_instance_of::<PyBool>() {
        Ok(Value::Bool(obj.extract()?))
    } else if obj.is_instance_of::<PyInt>() {
        Ok(Value::Int(obj.extract()?))
    } else if obj.is_instance_of::<PyFloat>() {
        Ok(Value::Float(obj.extract()?))
    } else if obj.is_instance_of::<PyString>() {
        Ok(Value::Text(obj.extract()?))
    } else if obj.is_instance_of::<PyBytes>() || obj.is_instance_of::<PyByteArray>() {
        Ok(Value::Blob(obj.extract()?))
    } else if obj.is_instance_of::<PyDateTime>() {
        Ok(Value::Timestamp(obj.extract()?))
    } else if obj.is_instance_of::<PyDate>() {
        Ok(Value::Date(obj.extract()?))
    } else if obj.is_instance_of::<PyTime>() {
        Ok(Value::Time(obj.extract()?))
    } else {
        Err(ProgrammingError::new_err(format!(
            "Unsupported parameter type: {}",
            obj.get_type().name()?
        )))
    }
}

fn params_from_py(params: Option<&Bound<'_, PyAny>>) -> PyResult<Params> {
    let Some(params) = params else {
        return Ok(Params::None);
    };
    if params.is_none() {
        return Ok(Params::None);
    }
    if let Ok(dict) = params.downcast::<PyDict>() {
        let mut named = HashMap::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            named.insert(key.extract::<String>()?, value_from_py(&value)?);
        }
        return Ok(Params::Named(named));
    }
    if params.is_instance_of::<PyString>() || params.is_instance_of::<PyBytes>() {
        return Err(ProgrammingError::new_err(
            "parameters must be a sequence or a mapping, not a string",
        ));
    }
    let values = params
        .try_iter()
        .map_err(|_| ProgrammingError::new_err("parameters must be a sequence or a mapping"))?
        .map(|item| value_from_py(&item?))
        .collect::<PyResult<Vec<_>>>()?;
    Ok(Params::Positional(values))
}

// ============================================================================
// Connection
// ============================================================================

/// A DB-API connection.
#[pyclass(name = "Connection", module = "_tarantool_dbapi")]
pub struct PyConnection {
    inner: Connection<SqliteConnection>,
}

#[pymethods]
impl PyConnection {
    fn cursor(&self) -> PyCursor {
        PyCursor {
            inner: self.inner.cursor(),
        }
    }

    fn commit(&self) -> PyResult<()> {
        Ok(self.inner.commit()?)
    }

    fn rollback(&self) -> PyResult<()> {
        Ok(self.inner.rollback()?)
    }

    fn close(&self, py: Python<'_>) -> PyResult<()> {
        let conn = self.inner.clone();
        block_on(py, async move { conn.close().await })
    }

    /// Shortcut: create a cursor, execute on it and return it.
    #[pyo3(signature = (query, params = None))]
    fn execute(
        &self,
        py: Python<'_>,
        query: &str,
        params: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyCursor> {
        let params = params_from_py(params)?;
        let mut cursor = self.inner.cursor();
        block_on(py, async {
            cursor.execute(query, params).await?;
            Ok::<(), DbApiError>(())
        })?;
        Ok(PyCursor { inner: cursor })
    }

    #[getter]
    fn closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type = None, _exc_value = None, _traceback = None))]
    fn __exit__(
        &self,
        py: Python<'_>,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc_value: Option<&Bound<'_, PyAny>>,
        _traceback: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<bool> {
        if !self.inner.is_closed() {
            self.close(py)?;
        }
        Ok(false)
    }

    fn __repr__(&self) -> String {
        format!("<Connection closed={}>", self.inner.is_closed())
    }
}

// ============================================================================
// Cursor
// ============================================================================

/// A DB-API cursor.
#[pyclass(name = "Cursor", module = "_tarantool_dbapi")]
pub struct PyCursor {
    inner: Cursor<SqliteConnection>,
}

#[pymethods]
impl PyCursor {
    #[pyo3(signature = (query, params = None))]
    fn execute<'py>(
        mut slf: PyRefMut<'py, Self>,
        query: &str,
        params: Option<&Bound<'py, PyAny>>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let py = slf.py();
        let params = params_from_py(params)?;
        let cursor = &mut slf.inner;
        block_on(py, async move {
            cursor.execute(query, params).await?;
            Ok::<(), DbApiError>(())
        })?;
        Ok(slf)
    }

    fn executemany<'py>(
        mut slf: PyRefMut<'py, Self>,
        query: &str,
        seq_of_params: &Bound<'py, PyAny>,
    ) -> PyResult<PyRefMut<'py, Self>> {
        let py = slf.py();
        let param_sets = seq_of_params
            .try_iter()?
            .map(|item| params_from_py(Some(&item?)))
            .collect::<PyResult<Vec<_>>>()?;
        let cursor = &mut slf.inner;
        block_on(py, async move {
            cursor.executemany(query, param_sets).await?;
            Ok::<(), DbApiError>(())
        })?;
        Ok(slf)
    }

    #[pyo3(signature = (procname, params = None))]
    fn callproc<'py>(
        &mut self,
        py: Python<'py>,
        procname: &str,
        params: Option<&Bound<'py, PyAny>>,
    ) -> PyResult<Bound<'py, PyList>> {
        let args = match params_from_py(params)? {
            Params::None => Vec::new(),
            Params::Positional(values) => values,
            Params::Named(_) => {
                return Err(ProgrammingError::new_err(
                    "callproc parameters must be a sequence",
                ))
            }
        };
        let cursor = &mut self.inner;
        let out = block_on(py, async move { cursor.callproc(procname, &args).await })?;
        let out = out
            .iter()
            .map(|v| value_to_py(py, v))
            .collect::<PyResult<Vec<_>>>()?;
        PyList::new(py, out)
    }

    fn fetchone(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        match self.inner.fetchone()? {
            Some(row) => Ok(Some(row_to_py(py, &row)?)),
            None => Ok(None),
        }
    }

    #[pyo3(signature = (size = None))]
    fn fetchmany<'py>(
        &mut self,
        py: Python<'py>,
        size: Option<usize>,
    ) -> PyResult<Bound<'py, PyList>> {
        let rows = self.inner.fetchmany(size)?;
        rows_to_py(py, &rows)
    }

    fn fetchall<'py>(&mut self, py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let rows = self.inner.fetchall()?;
        rows_to_py(py, &rows)
    }

    fn close(&mut self) {
        self.inner.close();
    }

    fn setinputsizes(&mut self, _sizes: &Bound<'_, PyAny>) {}

    #[pyo3(signature = (size, column = None))]
    fn setoutputsize(&mut self, size: usize, column: Option<usize>) {
        self.inner.setoutputsize(size, column);
    }

    #[getter]
    fn rowcount(&self) -> i64 {
        self.inner.rowcount()
    }

    #[getter]
    fn lastrowid(&self) -> Option<i64> {
        self.inner.lastrowid()
    }

    #[getter]
    fn description(
        &self,
    ) -> Option<
        Vec<(
            String,
            String,
            Option<u32>,
            Option<u32>,
            Option<u32>,
            Option<u32>,
            Option<bool>,
        )>,
    > {
        self.inner.description().map(|cols| {
            cols.iter()
                .map(|c| {
                    (
                        c.name.clone(),
                        c.type_code.clone(),
                        c.display_size,
                        c.internal_size,
                        c.precision,
                        c.scale,
                        c.null_ok,
                    )
                })
                .collect()
        })
    }

    #[getter]
    fn get_arraysize(&self) -> usize {
        self.inner.arraysize()
    }

    #[setter]
    fn set_arraysize(&mut self, size: usize) {
        self.inner.set_arraysize(size);
    }

    #[getter]
    fn closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn __iter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    fn __next__(&mut self, py: Python<'_>) -> PyResult<Option<PyObject>> {
        self.fetchone(py)
    }

    fn __enter__(slf: PyRef<'_, Self>) -> PyRef<'_, Self> {
        slf
    }

    #[pyo3(signature = (_exc_type = None, _exc_value = None, _traceback = None))]
    fn __exit__(
        &mut self,
        _exc_type: Option<&Bound<'_, PyAny>>,
        _exc_value: Option<&Bound<'_, PyAny>>,
        _traceback: Option<&Bound<'_, PyAny>>,
    ) -> bool {
        self.inner.close();
        false
    }
}

// ============================================================================
// Module-level functions and type objects
// ============================================================================

/// Open a connection, e.g. `connect("sqlite::memory:")`.
#[pyfunction]
#[pyo3(signature = (url, arraysize = None, statement_cache_size = None, log_level = None))]
pub fn connect(
    py: Python<'_>,
    url: &str,
    arraysize: Option<usize>,
    statement_cache_size: Option<usize>,
    log_level: Option<String>,
) -> PyResult<PyConnection> {
    let mut opts = ConnectOptions::from_url(url)?;
    if let Some(size) = arraysize {
        opts = opts.arraysize(size);
    }
    if let Some(size) = statement_cache_size {
        opts = opts.statement_cache_size(size);
    }
    if let Some(level) = log_level {
        opts = opts.log_level(level);
    }
    let inner = block_on(py, Connection::connect(opts))?;
    Ok(PyConnection { inner })
}

#[pyfunction(name = "Date")]
pub fn date_ctor(py: Python<'_>, year: i32, month: u32, day: u32) -> PyResult<PyObject> {
    value_to_py(py, &types::date(year, month, day)?)
}

#[pyfunction(name = "Time")]
pub fn time_ctor(py: Python<'_>, hour: u32, minute: u32, second: u32) -> PyResult<PyObject> {
    value_to_py(py, &types::time(hour, minute, second)?)
}

#[pyfunction(name = "Timestamp")]
pub fn timestamp_ctor(
    py: Python<'_>,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> PyResult<PyObject> {
    value_to_py(py, &types::timestamp(year, month, day, hour, minute, second)?)
}

#[pyfunction(name = "DateFromTicks")]
pub fn date_from_ticks(py: Python<'_>, ticks: f64) -> PyResult<PyObject> {
    value_to_py(py, &types::date_from_ticks(ticks)?)
}

#[pyfunction(name = "TimeFromTicks")]
pub fn time_from_ticks(py: Python<'_>, ticks: f64) -> PyResult<PyObject> {
    value_to_py(py, &types::time_from_ticks(ticks)?)
}

#[pyfunction(name = "TimestampFromTicks")]
pub fn timestamp_from_ticks(py: Python<'_>, ticks: f64) -> PyResult<PyObject> {
    value_to_py(py, &types::timestamp_from_ticks(ticks)?)
}

#[pyfunction(name = "Binary")]
pub fn binary_ctor<'py>(py: Python<'py>, data: Vec<u8>) -> Bound<'py, PyBytes> {
    PyBytes::new(py, &data)
}

/// DB-API type object; compares equal to the type codes in its group.
#[pyclass(name = "DBAPITypeObject", module = "_tarantool_dbapi", frozen)]
pub struct PyTypeObject {
    kind: TypeObject,
}

#[pymethods]
impl PyTypeObject {
    fn __eq__(&self, other: &Bound<'_, PyAny>) -> bool {
        if let Ok(code) = other.extract::<String>() {
            return self.kind.matches(&code);
        }
        if let Ok(other) = other.downcast::<PyTypeObject>() {
            return other.get().kind == self.kind;
        }
        false
    }

    fn __hash__(&self) -> u64 {
        self.kind as u64
    }

    fn __repr__(&self) -> String {
        format!("<DBAPITypeObject {:?}>", self.kind)
    }
}

pub(crate) fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();

    m.add("apilevel", crate::APILEVEL)?;
    m.add("paramstyle", crate::PARAMSTYLE)?;
    m.add("threadsafety", crate::THREADSAFETY)?;

    m.add_function(wrap_pyfunction!(connect, m)?)?;
    m.add_class::<PyConnection>()?;
    m.add_class::<PyCursor>()?;

    // Register exception classes (required for create_exception! to be accessible from Python)
    m.add("Warning", py.get_type::<Warning>())?;
    m.add("Error", py.get_type::<Error>())?;
    m.add("InterfaceError", py.get_type::<InterfaceError>())?;
    m.add("DatabaseError", py.get_type::<DatabaseError>())?;
    m.add("DataError", py.get_type::<DataError>())?;
    m.add("OperationalError", py.get_type::<OperationalError>())?;
    m.add("IntegrityError", py.get_type::<IntegrityError>())?;
    m.add("InternalError", py.get_type::<InternalError>())?;
    m.add("ProgrammingError", py.get_type::<ProgrammingError>())?;
    m.add("NotSupportedError", py.get_type::<NotSupportedError>())?;

    m.add_function(wrap_pyfunction!(date_ctor, m)?)?;
    m.add_function(wrap_pyfunction!(time_ctor, m)?)?;
    m.add_function(wrap_pyfunction!(timestamp_ctor, m)?)?;
    m.add_function(wrap_pyfunction!(date_from_ticks, m)?)?;
    m.add_function(wrap_pyfunction!(time_from_ticks, m)?)?;
    m.add_function(wrap_pyfunction!(timestamp_from_ticks, m)?)?;
    m.add_function(wrap_pyfunction!(binary_ctor, m)?)?;

    m.add_class::<PyTypeObject>()?;
    for (name, kind) in [
        ("STRING", types::STRING),
        ("BINARY", types::BINARY),
        ("NUMBER", types::NUMBER),
        ("DATETIME", types::DATETIME),
        ("ROWID", types::ROWID),
    ] {
        m.add(name, Py::new(py, PyTypeObject { kind })?)?;
    }
    Ok(())
}
