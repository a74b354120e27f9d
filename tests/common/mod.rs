#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use bayunql::catalog::{Column, DataType, ObjectDef, ObjectKind, TableDef};
use bayunql::common::RowPos;
use bayunql::query::ast::{Expr, InsertStatement, Statement, StatementKind};
use bayunql::storage::{Database, MemoryDatabase, StorageError, StorageResult, TableSource};
use bayunql::{DataValue, EngineConfig, ExecutionEngine};

/// Memory database that counts transaction calls and can fail creates
#[derive(Default)]
pub struct RecordingDatabase {
    inner: MemoryDatabase,
    pub begins: AtomicUsize,
    pub commits: AtomicUsize,
    pub rollbacks: AtomicUsize,
    failing_creates: AtomicUsize,
}

impl RecordingDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` create_object calls fail
    pub fn fail_next_creates(&self, n: usize) {
        self.failing_creates.store(n, Ordering::SeqCst);
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.begins.load(Ordering::SeqCst),
            self.commits.load(Ordering::SeqCst),
            self.rollbacks.load(Ordering::SeqCst),
        )
    }
}

impl Database for RecordingDatabase {
    fn begin_transaction(&self) -> StorageResult<()> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.inner.begin_transaction()
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit_transaction()
    }

    fn rollback_transaction(&self) -> StorageResult<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.inner.rollback_transaction()
    }

    fn nested_transaction_level(&self) -> usize {
        self.inner.nested_transaction_level()
    }

    fn get_object(&self, kind: ObjectKind, name: &str) -> Option<ObjectDef> {
        self.inner.get_object(kind, name)
    }

    fn create_object(&self, def: ObjectDef) -> StorageResult<()> {
        let pending = self.failing_creates.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_creates.store(pending - 1, Ordering::SeqCst);
            return Err(StorageError::InvalidDefinition(format!("injected failure creating '{}'", def.name())));
        }
        self.inner.create_object(def)
    }

    fn delete_object(&self, kind: ObjectKind, name: &str) -> StorageResult<ObjectDef> {
        self.inner.delete_object(kind, name)
    }

    fn open_table(&self, name: &str) -> StorageResult<Box<dyn TableSource>> {
        self.inner.open_table(name)
    }

    fn insert_row(&self, table: &str, values: Vec<DataValue>) -> StorageResult<RowPos> {
        self.inner.insert_row(table, values)
    }
}

pub fn engine() -> ExecutionEngine {
    ExecutionEngine::new(Arc::new(MemoryDatabase::new()), EngineConfig::default())
}

pub fn stmt(kind: StatementKind) -> Statement {
    Statement::bare(kind)
}

/// Create a single-column integer table `name(x)` holding `values`
pub fn create_int_table(engine: &ExecutionEngine, name: &str, values: &[i64]) -> Result<()> {
    let def = TableDef::new(name, vec![Column::new("x", DataType::Integer, true)]);
    let mut statements = vec![stmt(StatementKind::Create(ObjectDef::Table(def)))];
    if !values.is_empty() {
        statements.push(stmt(StatementKind::Insert(InsertStatement {
            table: name.to_string(),
            columns: vec![],
            values: values.iter().map(|v| vec![Expr::int(*v)]).collect(),
        })));
    }
    engine.run(statements)?;
    Ok(())
}

pub fn ints(values: &[Option<i64>]) -> Vec<DataValue> {
    values
        .iter()
        .map(|v| v.map(DataValue::Integer).unwrap_or(DataValue::Null))
        .collect()
}
