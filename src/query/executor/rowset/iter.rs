// Joined Row Iterator
//
// Adapts the execute_rowset/next protocol of a bound RowSet into a Rust
// iterator of result combinations.

use crate::query::executor::result::{QueryResult, Row};
use crate::query::executor::table_collection::TableCollection;
use super::{Constraints, Padding, RowSet};

/// One combination reported by a RowSet
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub row: Row,
    /// Which side, if any, was NULL-padded
    pub padding: Padding,
}

impl JoinedRow {
    pub fn is_outer(&self) -> bool {
        self.padding != Padding::None
    }
}

/// Drives a bound, opened RowSet to exhaustion
pub struct JoinedRows<'r, 'c> {
    rowset: &'r mut dyn RowSet,
    tables: &'r TableCollection,
    constraints: Constraints<'c>,
    started: bool,
    done: bool,
}

impl<'r, 'c> JoinedRows<'r, 'c> {
    pub fn new(rowset: &'r mut dyn RowSet, tables: &'r TableCollection, constraints: Constraints<'c>) -> Self {
        JoinedRows {
            rowset,
            tables,
            constraints,
            started: false,
            done: false,
        }
    }

    fn step(&mut self) -> QueryResult<bool> {
        if self.started {
            self.rowset.next(self.tables, &self.constraints)
        } else {
            self.started = true;
            self.rowset.execute_rowset(self.tables, &self.constraints)
        }
    }
}

impl Iterator for JoinedRows<'_, '_> {
    type Item = QueryResult<JoinedRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let found = match self.step() {
            Ok(found) => found,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        if !found {
            self.done = true;
            return None;
        }
        let row = match self.rowset.current_row(self.tables) {
            Ok(row) => row,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        Some(Ok(JoinedRow { row, padding: self.rowset.padding() }))
    }
}
