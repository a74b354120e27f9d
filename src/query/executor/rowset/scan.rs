// Table Scan Implementation
//
// Leaf RowSet over one bound table source. Equality keys from the parent
// restrict the rows it reports; when the collection is natively backed and
// a key column is indexed, candidates come from an index lookup instead of a
// sequential pass.

use log::debug;

use crate::common::{RowKey, RowPos, TableIndex};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::table_collection::TableCollection;
use super::{BoundColumn, Constraints, Padding, RowSet, TableBinder};

/// Remaining candidate positions for the current constraint set
#[derive(Debug)]
enum Cursor {
    Idle,
    Sequential { next: RowPos, end: RowPos },
    Positions { positions: Vec<RowPos>, next: usize },
}

/// Leaf scan over a named table or view
#[derive(Debug)]
pub struct TableScan {
    name: String,
    qualifier: String,
    table: Option<TableIndex>,
    bound: Vec<BoundColumn>,
    allow_null: bool,
    cursor: Cursor,
    /// (column position, value) keys applying to this leaf
    keys: Vec<(usize, DataValue)>,
    current: Option<(RowPos, Vec<DataValue>)>,
    available: bool,
    updated: bool,
}

impl TableScan {
    pub fn new(name: &str, alias: Option<&str>) -> Self {
        TableScan {
            name: name.to_string(),
            qualifier: alias.unwrap_or(name).to_string(),
            table: None,
            bound: Vec::new(),
            allow_null: false,
            cursor: Cursor::Idle,
            keys: Vec::new(),
            current: None,
            available: false,
            updated: false,
        }
    }

    fn table_index(&self) -> QueryResult<TableIndex> {
        self.table.ok_or_else(|| {
            QueryError::InvalidOperation(format!("'{}' used before its tables were prepared", self.qualifier))
        })
    }

    fn start_cursor(&self, tables: &TableCollection, table: TableIndex) -> QueryResult<Cursor> {
        let source = tables.source(table)?;
        if tables.index_lookups_enabled() {
            for (column, value) in &self.keys {
                if let Some(positions) = source.lookup(*column, value)? {
                    debug!(
                        "{}: index lookup on column {} found {} candidate(s)",
                        self.qualifier,
                        column,
                        positions.len()
                    );
                    return Ok(Cursor::Positions { positions, next: 0 });
                }
            }
        }
        Ok(Cursor::Sequential { next: 0, end: source.row_count()? })
    }

    fn advance(&mut self, tables: &TableCollection) -> QueryResult<bool> {
        let table = self.table_index()?;
        let source = tables.source(table)?;
        loop {
            let step = match &mut self.cursor {
                Cursor::Sequential { next, end } if *next < *end => {
                    *next += 1;
                    Some(*next - 1)
                }
                Cursor::Positions { positions, next } if *next < positions.len() => {
                    *next += 1;
                    Some(positions[*next - 1])
                }
                _ => None,
            };
            let Some(pos) = step else {
                self.cursor = Cursor::Idle;
                self.current = None;
                self.available = false;
                return Ok(false);
            };

            let values = source.fetch(pos)?;
            let satisfies = self
                .keys
                .iter()
                .all(|(column, key)| values.get(*column).and_then(|v| v.sql_eq(key)) == Some(true));
            if satisfies {
                self.current = Some((pos, values));
                self.available = true;
                self.updated = true;
                return Ok(true);
            }
        }
    }
}

impl RowSet for TableScan {
    fn prepare(&mut self) -> QueryResult<()> {
        self.table_index().map(|_| ())
    }

    fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        always_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()> {
        let source = binder.bind(&self.name)?;
        let columns = source.columns().to_vec();
        let index = tables.add_table(&self.qualifier, source)?;
        if index != *table_index {
            return Err(QueryError::InvalidOperation(format!(
                "'{}' bound at position {} but expected {}",
                self.qualifier, index, table_index
            )));
        }
        *table_index += 1;

        self.table = Some(index);
        self.allow_null = always_allow_null;
        self.bound = columns
            .into_iter()
            .enumerate()
            .map(|(position, name)| BoundColumn {
                table: index,
                position,
                qualifier: self.qualifier.clone(),
                name,
            })
            .collect();
        debug!("bound '{}' as table {} (allow null: {})", self.qualifier, index, always_allow_null);
        Ok(())
    }

    fn execute_rowset(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        let table = self.table_index()?;
        self.keys = constraints
            .keys
            .iter()
            .filter(|k| k.table == table)
            .map(|k| (k.column, k.value.clone()))
            .collect();
        self.current = None;
        self.available = false;

        // NULL never equals anything
        if self.keys.iter().any(|(_, v)| v.is_null()) {
            self.cursor = Cursor::Idle;
            return Ok(false);
        }

        self.cursor = self.start_cursor(tables, table)?;
        self.advance(tables)
    }

    fn next(&mut self, tables: &TableCollection, _constraints: &Constraints<'_>) -> QueryResult<bool> {
        self.advance(tables)
    }

    fn row_available(&self) -> bool {
        self.available
    }

    fn row_updated(&self) -> bool {
        self.updated
    }

    fn set_updated(&mut self) {
        self.updated = true;
    }

    fn clear_updated(&mut self) {
        self.updated = false;
    }

    fn mark_row_not_available(&mut self) -> QueryResult<()> {
        if !self.allow_null {
            return Err(QueryError::ExecutionError(format!(
                "'{}' is not on the optional side of an outer join and cannot be NULL-padded",
                self.qualifier
            )));
        }
        self.available = false;
        Ok(())
    }

    fn outer_row(&self) -> bool {
        false
    }

    fn padding(&self) -> Padding {
        Padding::None
    }

    fn shape(&self) -> String {
        format!("scan({} as {})", self.name.to_lowercase(), self.qualifier.to_lowercase())
    }

    fn bound_columns(&self) -> Vec<BoundColumn> {
        self.bound.clone()
    }

    fn current_row(&self, _tables: &TableCollection) -> QueryResult<Row> {
        let columns = self.columns();
        match (&self.current, self.available) {
            (Some((_, values)), true) => Ok(Row::from_values(columns, values.clone())),
            _ => Ok(Row::nulls(&columns)),
        }
    }

    fn row_key(&self) -> RowKey {
        match (&self.current, self.table) {
            (Some((pos, _)), Some(table)) if self.available => vec![(table, *pos)],
            _ => Vec::new(),
        }
    }
}
