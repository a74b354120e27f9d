// In-Memory Storage Engine
//
// Reference `Database` implementation. Objects live in a `Catalog`, table rows
// in shared `TableData` blocks, and transactional work is undone from a log of
// bincode-encoded before-images.
//
// Transactions are flat: BEGIN bumps the nesting level, COMMIT lowers it and
// only the outermost COMMIT discards the undo log, ROLLBACK undoes everything
// pending and returns to level 0.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, DataType, IndexDef, ObjectDef, ObjectKind, TableDef};
use crate::common::RowPos;
use crate::query::executor::result::DataValue;
use super::{Database, StorageError, StorageResult, TableSource};

// Floats at or beyond 2^53 no longer map to a single integer
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Before-image needed to undo one mutation
#[derive(Debug, Serialize, Deserialize)]
enum UndoRecord {
    Created { kind: ObjectKind, name: String },
    Deleted(ObjectDef),
    DeletedTable { def: TableDef, rows: Vec<Vec<DataValue>> },
    RowInserted { table: String },
}

/// Rows and hash indexes of one stored table
#[derive(Debug)]
struct TableData {
    def: TableDef,
    rows: Vec<Vec<DataValue>>,
    /// column position -> value -> row positions
    indexes: HashMap<usize, HashMap<DataValue, Vec<RowPos>>>,
}

impl TableData {
    fn new(def: TableDef, rows: Vec<Vec<DataValue>>) -> Self {
        Self { def, rows, indexes: HashMap::new() }
    }

    fn build_index(&mut self, column: usize) {
        let mut index: HashMap<DataValue, Vec<RowPos>> = HashMap::new();
        for (pos, row) in self.rows.iter().enumerate() {
            if let Some(value) = row.get(column).filter(|v| !v.is_null()) {
                index.entry(value.clone()).or_default().push(pos);
            }
        }
        self.indexes.insert(column, index);
    }

    fn push_row(&mut self, values: Vec<DataValue>) -> RowPos {
        let pos = self.rows.len();
        for (column, index) in self.indexes.iter_mut() {
            if let Some(value) = values.get(*column).filter(|v| !v.is_null()) {
                index.entry(value.clone()).or_default().push(pos);
            }
        }
        self.rows.push(values);
        pos
    }

    fn pop_row(&mut self) {
        if let Some(values) = self.rows.pop() {
            let pos = self.rows.len();
            for (column, index) in self.indexes.iter_mut() {
                if let Some(positions) = values.get(*column).and_then(|v| index.get_mut(v)) {
                    positions.retain(|p| *p != pos);
                }
            }
        }
    }
}

type SharedTable = Arc<RwLock<TableData>>;

#[derive(Debug, Default)]
struct DbState {
    catalog: Catalog,
    tables: HashMap<String, SharedTable>,
    level: usize,
    undo_log: Vec<Vec<u8>>,
}

impl DbState {
    fn log_undo(&mut self, record: &UndoRecord) -> StorageResult<()> {
        if self.level == 0 {
            return Ok(());
        }
        let bytes = bincode::serialize(record).map_err(|e| StorageError::UndoLog(e.to_string()))?;
        self.undo_log.push(bytes);
        Ok(())
    }

    fn table(&self, name: &str) -> StorageResult<SharedTable> {
        self.tables
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound { kind: ObjectKind::Table, name: name.to_string() })
    }

    fn index_column(&self, idx: &IndexDef) -> StorageResult<(SharedTable, usize)> {
        let table = self.table(&idx.table)?;
        let column = table.read().def.column_index(&idx.column).ok_or_else(|| {
            StorageError::InvalidDefinition(format!(
                "Index '{}' references unknown column '{}.{}'",
                idx.name, idx.table, idx.column
            ))
        })?;
        Ok((table, column))
    }

    fn create(&mut self, def: ObjectDef) -> StorageResult<()> {
        def.validate().map_err(StorageError::InvalidDefinition)?;
        let (kind, name) = (def.kind(), def.name().to_string());
        if self.catalog.exists(kind, &name) {
            return Err(StorageError::ObjectAlreadyExists { kind, name });
        }

        match &def {
            ObjectDef::Table(table) => {
                self.tables.insert(
                    name.to_lowercase(),
                    Arc::new(RwLock::new(TableData::new(table.clone(), Vec::new()))),
                );
            }
            ObjectDef::Index(idx) => {
                let (table, column) = self.index_column(idx)?;
                table.write().build_index(column);
            }
            _ => {}
        }

        self.catalog
            .insert(def)
            .map_err(|def| StorageError::ObjectAlreadyExists { kind, name: def.name().to_string() })?;
        self.log_undo(&UndoRecord::Created { kind, name })
    }

    fn delete(&mut self, kind: ObjectKind, name: &str) -> StorageResult<ObjectDef> {
        if !self.catalog.exists(kind, name) {
            return Err(StorageError::ObjectNotFound { kind, name: name.to_string() });
        }

        match kind {
            ObjectKind::Table => {
                let dependent: Vec<String> = self
                    .catalog
                    .indexes_on(name)
                    .into_iter()
                    .map(|def| def.name().to_string())
                    .collect();
                for index in dependent {
                    self.delete(ObjectKind::Index, &index)?;
                }
                let data = self.table(name)?;
                self.tables.remove(&name.to_lowercase());
                let def = self
                    .catalog
                    .remove(kind, name)
                    .ok_or_else(|| StorageError::ObjectNotFound { kind, name: name.to_string() })?;
                let rows = std::mem::take(&mut data.write().rows);
                if let ObjectDef::Table(table) = &def {
                    self.log_undo(&UndoRecord::DeletedTable { def: table.clone(), rows })?;
                }
                Ok(def)
            }
            _ => {
                let def = self
                    .catalog
                    .remove(kind, name)
                    .ok_or_else(|| StorageError::ObjectNotFound { kind, name: name.to_string() })?;
                if let ObjectDef::Index(idx) = &def {
                    if let Ok((table, column)) = self.index_column(idx) {
                        table.write().indexes.remove(&column);
                    }
                }
                self.log_undo(&UndoRecord::Deleted(def.clone()))?;
                Ok(def)
            }
        }
    }

    fn undo(&mut self, record: UndoRecord) -> StorageResult<()> {
        match record {
            UndoRecord::Created { kind, name } => {
                self.delete(kind, &name)?;
            }
            UndoRecord::Deleted(def) => self.create(def)?,
            UndoRecord::DeletedTable { def, rows } => {
                let name = def.name().to_lowercase();
                self.catalog
                    .insert(ObjectDef::Table(def.clone()))
                    .map_err(|d| StorageError::ObjectAlreadyExists { kind: ObjectKind::Table, name: d.name().to_string() })?;
                self.tables.insert(name, Arc::new(RwLock::new(TableData::new(def, rows))));
            }
            UndoRecord::RowInserted { table } => {
                self.table(&table)?.write().pop_row();
            }
        }
        Ok(())
    }
}

/// In-memory reference storage engine
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: RwLock<DbState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in a table
    pub fn table_len(&self, name: &str) -> StorageResult<usize> {
        Ok(self.state.read().table(name)?.read().rows.len())
    }
}

impl Database for MemoryDatabase {
    fn begin_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        state.level += 1;
        info!("BEGIN TRANSACTION (level {})", state.level);
        Ok(())
    }

    fn commit_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.level == 0 {
            return Err(StorageError::NoActiveTransaction);
        }
        state.level -= 1;
        if state.level == 0 {
            state.undo_log.clear();
        }
        info!("COMMIT TRANSACTION (level {})", state.level);
        Ok(())
    }

    fn rollback_transaction(&self) -> StorageResult<()> {
        let mut state = self.state.write();
        if state.level == 0 {
            return Err(StorageError::NoActiveTransaction);
        }
        let records = std::mem::take(&mut state.undo_log);
        // Undo must not log its own mutations.
        state.level = 0;
        info!("ROLLBACK TRANSACTION ({} undo records)", records.len());
        for bytes in records.into_iter().rev() {
            let record: UndoRecord =
                bincode::deserialize(&bytes).map_err(|e| StorageError::UndoLog(e.to_string()))?;
            debug!("undo {:?}", record);
            if let Err(e) = state.undo(record) {
                warn!("Undo step failed during rollback: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    fn nested_transaction_level(&self) -> usize {
        self.state.read().level
    }

    fn get_object(&self, kind: ObjectKind, name: &str) -> Option<ObjectDef> {
        self.state.read().catalog.get(kind, name).cloned()
    }

    fn create_object(&self, def: ObjectDef) -> StorageResult<()> {
        debug!("create {} {}", def.kind(), def.name());
        self.state.write().create(def)
    }

    fn delete_object(&self, kind: ObjectKind, name: &str) -> StorageResult<ObjectDef> {
        debug!("delete {} {}", kind, name);
        self.state.write().delete(kind, name)
    }

    fn open_table(&self, name: &str) -> StorageResult<Box<dyn TableSource>> {
        let data = self.state.read().table(name)?;
        let (name, columns) = {
            let guard = data.read();
            (guard.def.name().to_string(), guard.def.column_names())
        };
        Ok(Box::new(MemoryTable { name, columns, data, open: false, prepared: false }))
    }

    fn insert_row(&self, table: &str, values: Vec<DataValue>) -> StorageResult<RowPos> {
        let mut state = self.state.write();
        let data = state.table(table)?;
        let pos = {
            let mut guard = data.write();
            if values.len() != guard.def.columns().len() {
                return Err(StorageError::ConstraintViolation(format!(
                    "'{}' expects {} values, got {}",
                    guard.def.name(),
                    guard.def.columns().len(),
                    values.len()
                )));
            }
            for (column, value) in guard.def.columns().iter().zip(&values) {
                if value.is_null() && !column.is_nullable() {
                    return Err(StorageError::ConstraintViolation(format!(
                        "Column '{}' of '{}' cannot be NULL",
                        column.name(),
                        guard.def.name()
                    )));
                }
            }
            guard.push_row(values)
        };
        state.log_undo(&UndoRecord::RowInserted { table: table.to_string() })?;
        Ok(pos)
    }
}

/// Native table handle over a `MemoryDatabase` table
pub struct MemoryTable {
    name: String,
    columns: Vec<String>,
    data: SharedTable,
    open: bool,
    prepared: bool,
}

impl MemoryTable {
    fn check_open(&self) -> StorageResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(StorageError::NotOpen(self.name.clone()))
        }
    }
}

impl TableSource for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn is_native(&self) -> bool {
        true
    }

    fn open(&mut self) -> StorageResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        self.open = false;
        self.prepared = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn prepare(&mut self) -> StorageResult<()> {
        self.check_open()?;
        self.prepared = true;
        Ok(())
    }

    fn unprepare(&mut self) -> StorageResult<()> {
        self.prepared = false;
        Ok(())
    }

    fn row_count(&self) -> StorageResult<usize> {
        self.check_open()?;
        Ok(self.data.read().rows.len())
    }

    fn fetch(&self, pos: RowPos) -> StorageResult<Vec<DataValue>> {
        self.check_open()?;
        self.data.read().rows.get(pos).cloned().ok_or_else(|| StorageError::RowOutOfRange {
            table: self.name.clone(),
            pos,
        })
    }

    fn lookup(&self, column: usize, value: &DataValue) -> StorageResult<Option<Vec<RowPos>>> {
        self.check_open()?;
        let data = self.data.read();
        let Some(index) = data.indexes.get(&column) else {
            return Ok(None);
        };
        // Index keys are stored in the column's type. The search key is recast
        // only where the recast variant hashes equal to every value `sql_eq`
        // accepts; anything else falls back to a scan.
        let column_type = data.def.columns().get(column).map(|c| c.data_type());
        let search = match (value, column_type) {
            (_, None) => return Ok(None),
            (DataValue::Float(f), Some(DataType::Float)) if *f == 0.0 || f.is_nan() => return Ok(None),
            (v, Some(t)) if v.data_type() == Some(t) => v.clone(),
            (DataValue::Integer(i), Some(DataType::Float)) if *i != 0 => DataValue::Float(*i as f64),
            (DataValue::Float(f), Some(DataType::Integer)) if f.fract() == 0.0 && f.abs() < MAX_EXACT_FLOAT => {
                DataValue::Integer(*f as i64)
            }
            (DataValue::Float(f), Some(DataType::Integer)) if f.is_finite() && f.fract() != 0.0 => {
                return Ok(Some(Vec::new()))
            }
            (DataValue::Text(s), Some(DataType::Date)) => DataValue::Date(s.clone()),
            (DataValue::Text(s), Some(DataType::Timestamp)) => DataValue::Timestamp(s.clone()),
            (DataValue::Date(s) | DataValue::Timestamp(s), Some(DataType::Text)) => DataValue::Text(s.clone()),
            _ => return Ok(None),
        };
        Ok(Some(index.get(&search).cloned().unwrap_or_default()))
    }
}
