// Query Result Implementation
//
// This module defines the values, rows, errors and result sets shared by
// every part of the statement executor.

use std::collections::HashMap;
use std::fmt;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{DataType, ObjectKind};
use crate::common::SourcePos;

/// Possible data types for values in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Date(String),
    Timestamp(String),
    Blob(Vec<u8>),
}

impl Eq for DataValue {}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Null => 0.hash(state),
            DataValue::Integer(i) => { 1.hash(state); i.hash(state); }
            DataValue::Float(f) => { 2.hash(state); f.to_bits().hash(state); }
            DataValue::Text(s) => { 3.hash(state); s.hash(state); }
            DataValue::Boolean(b) => { 4.hash(state); b.hash(state); }
            DataValue::Date(s) => { 5.hash(state); s.hash(state); }
            DataValue::Timestamp(s) => { 6.hash(state); s.hash(state); }
            DataValue::Blob(b) => { 7.hash(state); b.hash(state); }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Null => write!(f, "NULL"),
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "{}", s),
            DataValue::Boolean(b) => write!(f, "{}", b),
            DataValue::Date(s) => write!(f, "{}", s),
            DataValue::Timestamp(s) => write!(f, "{}", s),
            DataValue::Blob(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (DataValue::Null, DataValue::Null) => Some(Ordering::Equal),
            (DataValue::Null, _) => Some(Ordering::Less),
            (_, DataValue::Null) => Some(Ordering::Greater),

            (DataValue::Integer(a), DataValue::Integer(b)) => a.partial_cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.partial_cmp(b),
            (DataValue::Integer(a), DataValue::Float(b)) => (*a as f64).partial_cmp(b),
            (DataValue::Float(a), DataValue::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (DataValue::Text(a), DataValue::Text(b)) => Some(a.cmp(b)),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.partial_cmp(b),
            (DataValue::Date(a), DataValue::Date(b)) => Some(a.cmp(b)),
            (DataValue::Timestamp(a), DataValue::Timestamp(b)) => Some(a.cmp(b)),
            (DataValue::Blob(a), DataValue::Blob(b)) if a == b => Some(Ordering::Equal),

            (DataValue::Text(a), DataValue::Date(b) | DataValue::Timestamp(b)) => Some(a.cmp(b)),
            (DataValue::Date(a) | DataValue::Timestamp(a), DataValue::Text(b)) => Some(a.cmp(b)),

            _ => None,
        }
    }
}

impl DataValue {
    /// Catalog type of this value; `None` for NULL
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            DataValue::Null => None,
            DataValue::Integer(_) => Some(DataType::Integer),
            DataValue::Float(_) => Some(DataType::Float),
            DataValue::Text(_) => Some(DataType::Text),
            DataValue::Boolean(_) => Some(DataType::Boolean),
            DataValue::Date(_) => Some(DataType::Date),
            DataValue::Timestamp(_) => Some(DataType::Timestamp),
            DataValue::Blob(_) => Some(DataType::Blob),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Only TRUE passes a condition; FALSE and NULL do not
    pub fn is_true(&self) -> bool {
        matches!(self, DataValue::Boolean(true))
    }

    /// SQL equality: NULL compared with anything is unknown (`None`)
    pub fn sql_eq(&self, other: &Self) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(self.partial_cmp(other) == Some(Ordering::Equal))
    }

    /// Compare two DataValues for sorting purposes.
    /// NULLs are considered less than any non-NULL value.
    pub fn compare(&self, other: &Self) -> QueryResult<Ordering> {
        self.partial_cmp(other).ok_or_else(|| {
            QueryError::TypeError(format!(
                "Cannot compare incompatible values {} and {}",
                self.to_sql_literal(),
                other.to_sql_literal()
            ))
        })
    }

    pub fn to_sql_literal(&self) -> String {
        match self {
            DataValue::Null => "NULL".to_string(),
            DataValue::Integer(i) => i.to_string(),
            DataValue::Float(f) => f.to_string(),
            DataValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            DataValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            DataValue::Date(s) => format!("DATE '{}'", s),
            DataValue::Timestamp(s) => format!("TIMESTAMP '{}'", s),
            DataValue::Blob(b) => format!("X'{}'", hex::encode(b)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

/// Represents a row in query results
#[derive(Debug, Clone)]
pub struct Row {
    /// Values indexed by column name
    values: HashMap<String, DataValue>,
    /// Column order for consistent display
    column_order: Vec<String>,
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.column_order == other.column_order
            && self
                .column_order
                .iter()
                .all(|col| self.values.get(col) == other.values.get(col))
    }
}

impl Eq for Row {}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

impl Row {
    /// Create a new empty row
    pub fn new() -> Self {
        Row {
            values: HashMap::new(),
            column_order: Vec::new(),
        }
    }

    /// Create a row from column values
    pub fn from_values(columns: Vec<String>, values: Vec<DataValue>) -> Self {
        let mut row = Row::new();
        for (col, val) in columns.into_iter().zip(values) {
            row.set(col, val);
        }
        row
    }

    /// A row of NULLs over the given columns; the padded side of an outer join
    pub fn nulls(columns: &[String]) -> Self {
        Row::from_values(columns.to_vec(), vec![DataValue::Null; columns.len()])
    }

    /// Get a value by exact column name
    pub fn get(&self, column: &str) -> Option<&DataValue> {
        self.values.get(column)
    }

    /// Set a value for a column
    pub fn set(&mut self, column: String, value: DataValue) {
        if !self.values.contains_key(&column) {
            self.column_order.push(column.clone());
        }
        self.values.insert(column, value);
    }

    /// Append every column of `other` after the columns of this row
    pub fn merge(&mut self, other: &Row) {
        for col in &other.column_order {
            if let Some(value) = other.values.get(col) {
                self.set(col.clone(), value.clone());
            }
        }
    }

    /// Resolve a possibly-qualified column reference.
    ///
    /// Row columns are stored as `qualifier.name`. An unqualified reference
    /// matches by name alone and must be unambiguous.
    pub fn resolve(&self, table: Option<&str>, name: &str) -> QueryResult<&DataValue> {
        if let Some(table) = table {
            return self
                .column_order
                .iter()
                .find(|col| match col.split_once('.') {
                    Some((q, n)) => q.eq_ignore_ascii_case(table) && n.eq_ignore_ascii_case(name),
                    None => false,
                })
                .and_then(|col| self.values.get(col))
                .ok_or_else(|| QueryError::ColumnNotFound(format!("{}.{}", table, name)));
        }

        let mut found = self.column_order.iter().filter(|col| {
            let bare = col.rsplit_once('.').map_or(col.as_str(), |(_, n)| n);
            bare.eq_ignore_ascii_case(name)
        });
        match (found.next(), found.next()) {
            (Some(col), None) => self
                .values
                .get(col)
                .ok_or_else(|| QueryError::ColumnNotFound(name.to_string())),
            (Some(_), Some(_)) => Err(QueryError::ExecutionError(format!(
                "Ambiguous column reference '{}'",
                name
            ))),
            (None, _) => Err(QueryError::ColumnNotFound(name.to_string())),
        }
    }

    /// Get all columns in the row
    pub fn columns(&self) -> &[String] {
        &self.column_order
    }

    /// Get all values in column order
    pub fn values(&self) -> Vec<&DataValue> {
        self.column_order
            .iter()
            .filter_map(|col| self.values.get(col))
            .collect()
    }
}

/// Conceptual failure family of a `QueryError`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ObjectNotFound,
    ObjectAlreadyExists,
    ControlFlowMisuse,
    UnsupportedFeature,
    InvalidReturnShape,
    NotImplemented,
    ColumnNotFound,
    VariableNotFound,
    Storage,
    Execution,
    Type,
    Transaction,
    InvalidOperation,
    Arithmetic,
}

/// Represents query execution error
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from storage layer
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Error during statement execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Error in data type conversion
    #[error("Type error: {0}")]
    TypeError(String),
    /// Named object missing from the catalog
    #[error("{kind} not found: {name}")]
    ObjectNotFound { kind: ObjectKind, name: String },
    /// Named object already present in the catalog
    #[error("{kind} already exists: {name}")]
    ObjectAlreadyExists { kind: ObjectKind, name: String },
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Variable or parameter not declared in scope
    #[error("Variable not found: {0}")]
    VariableNotFound(String),
    /// BREAK or CONTINUE with no enclosing loop
    #[error("Control flow misuse: {0}")]
    ControlFlowMisuse(String),
    /// Recognised construct that is intentionally unsupported
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    /// Tabular result produced inside a function body
    #[error("Invalid return shape: {0}")]
    InvalidReturnShape(String),
    /// Combinator path with no concrete algorithm
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    /// Transaction-related error
    #[error("Transaction error: {0}")]
    TransactionError(String),
    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
    /// Numeric overflow
    #[error("Numeric overflow")]
    NumericOverflow,
    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,
    /// Error raised by the statement at the given source position
    #[error("{source} (at line {line}, column {column})")]
    AtStatement {
        line: u32,
        column: u32,
        source: Box<QueryError>,
    },
}

impl QueryError {
    /// Attach a statement position unless one is already attached
    pub fn at(self, pos: SourcePos) -> Self {
        match self {
            err @ QueryError::AtStatement { .. } => err,
            err => QueryError::AtStatement {
                line: pos.line,
                column: pos.column,
                source: Box::new(err),
            },
        }
    }

    /// Source position of the failing statement, if attached
    pub fn position(&self) -> Option<SourcePos> {
        match self {
            QueryError::AtStatement { line, column, .. } => Some(SourcePos::new(*line, *column)),
            _ => None,
        }
    }

    /// The underlying error with any position wrapper removed
    pub fn root(&self) -> &QueryError {
        match self {
            QueryError::AtStatement { source, .. } => source.root(),
            err => err,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            QueryError::AtStatement { source, .. } => source.kind(),
            QueryError::StorageError(_) => ErrorKind::Storage,
            QueryError::ExecutionError(_) => ErrorKind::Execution,
            QueryError::TypeError(_) => ErrorKind::Type,
            QueryError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            QueryError::ObjectAlreadyExists { .. } => ErrorKind::ObjectAlreadyExists,
            QueryError::ColumnNotFound(_) => ErrorKind::ColumnNotFound,
            QueryError::VariableNotFound(_) => ErrorKind::VariableNotFound,
            QueryError::ControlFlowMisuse(_) => ErrorKind::ControlFlowMisuse,
            QueryError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            QueryError::InvalidReturnShape(_) => ErrorKind::InvalidReturnShape,
            QueryError::NotImplemented(_) => ErrorKind::NotImplemented,
            QueryError::TransactionError(_) => ErrorKind::Transaction,
            QueryError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            QueryError::NumericOverflow | QueryError::DivisionByZero => ErrorKind::Arithmetic,
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;

/// Query resultset representation
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResultSet {
    /// Column names in the resultset
    columns: Vec<String>,
    /// Rows of data
    rows: Vec<Row>,
}

impl QueryResultSet {
    /// Create a new empty resultset with column names
    pub fn new(columns: Vec<String>) -> Self {
        QueryResultSet {
            columns,
            rows: Vec::new(),
        }
    }

    /// Add a row to the resultset
    pub fn add_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Get the columns in the resultset
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Get the rows in the resultset
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Get the number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values as plain vectors in column order, convenient for assertions
    pub fn to_values(&self) -> Vec<Vec<DataValue>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|col| row.get(col).cloned().unwrap_or(DataValue::Null))
                    .collect()
            })
            .collect()
    }
}

fn cannot_convert(value: &DataValue, target: DataType) -> QueryError {
    QueryError::TypeError(format!("Cannot convert {} to {}", value.to_sql_literal(), target))
}

/// Attempts to convert a DataValue to a target catalog DataType.
pub fn convert_data_value(value: &DataValue, target: DataType) -> QueryResult<DataValue> {
    if value.is_null() {
        return Ok(DataValue::Null);
    }
    let converted = match (target, value) {
        (DataType::Integer, DataValue::Integer(i)) => DataValue::Integer(*i),
        (DataType::Integer, DataValue::Float(f)) => DataValue::Integer(*f as i64),
        (DataType::Integer, DataValue::Boolean(b)) => DataValue::Integer(i64::from(*b)),
        (DataType::Integer, DataValue::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(DataValue::Integer)
            .map_err(|_| cannot_convert(value, target))?,

        (DataType::Float, DataValue::Integer(i)) => DataValue::Float(*i as f64),
        (DataType::Float, DataValue::Float(f)) => DataValue::Float(*f),
        (DataType::Float, DataValue::Boolean(b)) => DataValue::Float(if *b { 1.0 } else { 0.0 }),
        (DataType::Float, DataValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(DataValue::Float)
            .map_err(|_| cannot_convert(value, target))?,

        (DataType::Text, DataValue::Blob(b)) => DataValue::Text(hex::encode(b)),
        (DataType::Text, other) => DataValue::Text(other.to_string()),

        (DataType::Boolean, DataValue::Boolean(b)) => DataValue::Boolean(*b),
        (DataType::Boolean, DataValue::Integer(i)) => DataValue::Boolean(*i != 0),
        (DataType::Boolean, DataValue::Float(f)) => DataValue::Boolean(*f != 0.0),
        (DataType::Boolean, DataValue::Text(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => DataValue::Boolean(true),
            "false" | "f" | "0" => DataValue::Boolean(false),
            _ => return Err(cannot_convert(value, target)),
        },

        (DataType::Date, DataValue::Text(s) | DataValue::Date(s)) => DataValue::Date(s.clone()),
        (DataType::Date, DataValue::Timestamp(ts)) => {
            DataValue::Date(ts.split(' ').next().unwrap_or_default().to_string())
        }

        (DataType::Timestamp, DataValue::Text(s) | DataValue::Timestamp(s)) => {
            DataValue::Timestamp(s.clone())
        }
        (DataType::Timestamp, DataValue::Date(s)) => DataValue::Timestamp(format!("{} 00:00:00", s)),

        (DataType::Blob, DataValue::Blob(b)) => DataValue::Blob(b.clone()),
        (DataType::Blob, DataValue::Text(s)) => hex::decode(s)
            .map(DataValue::Blob)
            .map_err(|_| cannot_convert(value, target))?,

        _ => return Err(cannot_convert(value, target)),
    };
    Ok(converted)
}
