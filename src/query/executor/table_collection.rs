// Table Collection
//
// The ordered set of table sources bound by one statement's RowSet tree.
// Sources are registered during `prepare_tables` and addressed by their
// `TableIndex` afterwards.

use log::{debug, trace};

use crate::common::TableIndex;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::storage::TableSource;

struct BoundTable {
    qualifier: String,
    source: Box<dyn TableSource>,
}

pub struct TableCollection {
    tables: Vec<BoundTable>,
    has_native: bool,
    all_open: bool,
    use_index_lookups: bool,
}

impl TableCollection {
    pub fn new(use_index_lookups: bool) -> Self {
        TableCollection {
            tables: Vec::new(),
            has_native: false,
            all_open: false,
            use_index_lookups,
        }
    }

    /// Register a source under its qualifier and return its index
    pub fn add_table(&mut self, qualifier: &str, source: Box<dyn TableSource>) -> QueryResult<TableIndex> {
        if self.all_open {
            return Err(QueryError::InvalidOperation(format!(
                "cannot add '{}' to an opened table collection",
                qualifier
            )));
        }
        if self.tables.iter().any(|t| t.qualifier.eq_ignore_ascii_case(qualifier)) {
            return Err(QueryError::ExecutionError(format!(
                "The correlation name '{}' is specified multiple times",
                qualifier
            )));
        }
        let native = source.is_native();
        self.has_native = if self.tables.is_empty() { native } else { self.has_native && native };
        self.tables.push(BoundTable { qualifier: qualifier.to_string(), source });
        Ok(self.tables.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// True only when every bound source is natively backed
    pub fn has_native(&self) -> bool {
        self.has_native
    }

    pub fn all_open(&self) -> bool {
        self.all_open
    }

    /// Index lookups need native sources and must be enabled
    pub fn index_lookups_enabled(&self) -> bool {
        self.has_native && self.use_index_lookups
    }

    pub fn source(&self, index: TableIndex) -> QueryResult<&dyn TableSource> {
        self.tables
            .get(index)
            .map(|t| t.source.as_ref())
            .ok_or_else(|| QueryError::ExecutionError(format!("no table bound at position {}", index)))
    }

    pub fn qualifier(&self, index: TableIndex) -> Option<&str> {
        self.tables.get(index).map(|t| t.qualifier.as_str())
    }

    /// Open every source; stops at the first failure
    pub fn open(&mut self) -> QueryResult<()> {
        for table in &mut self.tables {
            if !table.source.is_open() {
                trace!("opening '{}'", table.qualifier);
                table.source.open()?;
            }
        }
        self.all_open = true;
        debug!("opened {} table(s), native: {}", self.tables.len(), self.has_native);
        Ok(())
    }

    pub fn close(&mut self) -> QueryResult<()> {
        self.all_open = false;
        for table in &mut self.tables {
            if table.source.is_open() {
                table.source.close()?;
            }
        }
        Ok(())
    }

    pub fn prepare(&mut self) -> QueryResult<()> {
        for table in &mut self.tables {
            table.source.prepare()?;
        }
        Ok(())
    }

    pub fn unprepare(&mut self) -> QueryResult<()> {
        for table in &mut self.tables {
            table.source.unprepare()?;
        }
        Ok(())
    }

    /// Close and release every source
    pub fn free(&mut self) -> QueryResult<()> {
        self.close()?;
        self.tables.clear();
        self.has_native = false;
        Ok(())
    }
}
