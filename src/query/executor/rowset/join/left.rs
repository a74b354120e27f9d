// Left Join Implementation
//
// Every left row is reported at least once. When no right row matches a left
// row that was freshly produced, the right side is marked not available and
// the combination is reported as an outer row.

use crate::common::{RowKey, TableIndex};
use crate::query::ast::Expr;
use crate::query::executor::result::{QueryResult, Row};
use crate::query::executor::rowset::{BoundColumn, Constraints, Padding, RowSet, TableBinder};
use crate::query::executor::table_collection::TableCollection;
use super::{join_core_methods, JoinCore};

pub struct LeftJoin {
    core: JoinCore,
}

impl LeftJoin {
    pub fn new(left: Box<dyn RowSet>, right: Box<dyn RowSet>, condition: Option<Expr>) -> Self {
        LeftJoin { core: JoinCore::new(left, right, condition) }
    }

    fn seek(&mut self, tables: &TableCollection, c: &Constraints<'_>, mut restart: bool) -> QueryResult<bool> {
        loop {
            if self.core.seek_right(tables, c, restart)? {
                self.core.left.clear_updated();
                self.core.updated = true;
                return Ok(true);
            }
            // The left row was never reported: pad the right side
            if self.core.left.row_updated() {
                self.core.right.mark_row_not_available()?;
                self.core.left.clear_updated();
                self.core.updated = true;
                return Ok(true);
            }
            if !self.core.left.next(tables, c)? {
                return Ok(false);
            }
            restart = true;
        }
    }
}

impl RowSet for LeftJoin {
    join_core_methods!();

    /// The right side may always be absent
    fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        always_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()> {
        self.core.prepare_tables(binder, tables, always_allow_null, true, table_index)
    }

    fn execute_rowset(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        if !self.core.left.execute_rowset(tables, constraints)? {
            return Ok(false);
        }
        self.seek(tables, constraints, true)
    }

    fn next(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        self.seek(tables, constraints, false)
    }

    fn shape(&self) -> String {
        self.core.shape("left")
    }
}
