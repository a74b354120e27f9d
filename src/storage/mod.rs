// Storage Collaborator Contract
//
// The statement core never touches pages or files. It drives storage through
// the `Database` trait (transactions plus named-object CRUD) and reads rows
// through `TableSource` handles opened per statement.

pub mod memory;

use thiserror::Error;

use crate::catalog::{ObjectDef, ObjectKind};
use crate::common::RowPos;
use crate::query::executor::result::{DataValue, QueryError};

pub use self::memory::MemoryDatabase;

/// Errors raised by a storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{kind} not found: {name}")]
    ObjectNotFound { kind: ObjectKind, name: String },

    #[error("{kind} already exists: {name}")]
    ObjectAlreadyExists { kind: ObjectKind, name: String },

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("No active transaction")]
    NoActiveTransaction,

    #[error("Table source '{0}' is not open")]
    NotOpen(String),

    #[error("Row {pos} out of range for '{table}'")]
    RowOutOfRange { table: String, pos: RowPos },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Undo log error: {0}")]
    UndoLog(String),
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for QueryError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound { kind, name } => QueryError::ObjectNotFound { kind, name },
            StorageError::ObjectAlreadyExists { kind, name } => {
                QueryError::ObjectAlreadyExists { kind, name }
            }
            StorageError::NoActiveTransaction => {
                QueryError::TransactionError("no active transaction".to_string())
            }
            other => QueryError::StorageError(other.to_string()),
        }
    }
}

/// A storage engine as seen by the statement core
pub trait Database: Send + Sync {
    fn begin_transaction(&self) -> StorageResult<()>;

    fn commit_transaction(&self) -> StorageResult<()>;

    fn rollback_transaction(&self) -> StorageResult<()>;

    /// 0 when no transaction is open
    fn nested_transaction_level(&self) -> usize;

    fn get_object(&self, kind: ObjectKind, name: &str) -> Option<ObjectDef>;

    fn object_exists(&self, kind: ObjectKind, name: &str) -> bool {
        self.get_object(kind, name).is_some()
    }

    fn create_object(&self, def: ObjectDef) -> StorageResult<()>;

    /// Remove a named object, returning its last definition
    fn delete_object(&self, kind: ObjectKind, name: &str) -> StorageResult<ObjectDef>;

    /// Open a fresh, unopened handle over a stored table
    fn open_table(&self, name: &str) -> StorageResult<Box<dyn TableSource>>;

    /// Append a row whose values are already in column order and type
    fn insert_row(&self, table: &str, values: Vec<DataValue>) -> StorageResult<RowPos>;
}

/// A leaf row source bound into a statement's table collection
pub trait TableSource: Send {
    fn name(&self) -> &str;

    /// Column names in storage order
    fn columns(&self) -> &[String];

    /// Whether the source is backed by the engine's own tables
    fn is_native(&self) -> bool;

    fn open(&mut self) -> StorageResult<()>;

    fn close(&mut self) -> StorageResult<()>;

    fn is_open(&self) -> bool;

    fn prepare(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn unprepare(&mut self) -> StorageResult<()> {
        Ok(())
    }

    fn row_count(&self) -> StorageResult<usize>;

    fn fetch(&self, pos: RowPos) -> StorageResult<Vec<DataValue>>;

    /// Index fast path. `None` when no index covers the column.
    fn lookup(&self, _column: usize, _value: &DataValue) -> StorageResult<Option<Vec<RowPos>>> {
        Ok(None)
    }
}

/// Non-native source over rows computed up front, used to bind views
#[derive(Debug)]
pub struct MaterializedSource {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<DataValue>>,
    open: bool,
}

impl MaterializedSource {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<DataValue>>) -> Self {
        Self { name: name.into(), columns, rows, open: false }
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::NotOpen(self.name.clone()))
        }
    }
}

impl TableSource for MaterializedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn is_native(&self) -> bool {
        false
    }

    fn open(&mut self) -> StorageResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn row_count(&self) -> StorageResult<usize> {
        self.check_open()?;
        Ok(self.rows.len())
    }

    fn fetch(&self, pos: RowPos) -> StorageResult<Vec<DataValue>> {
        self.check_open()?;
        self.rows.get(pos).cloned().ok_or_else(|| StorageError::RowOutOfRange {
            table: self.name.clone(),
            pos,
        })
    }
}
