// Inner Join Implementation
//
// Nested loop that only reports combinations satisfying the join condition.
// A left row with no matching right row is dropped, never padded.

use crate::common::{RowKey, TableIndex};
use crate::query::ast::Expr;
use crate::query::executor::result::{QueryResult, Row};
use crate::query::executor::rowset::{BoundColumn, Constraints, Padding, RowSet, TableBinder};
use crate::query::executor::table_collection::TableCollection;
use super::{join_core_methods, JoinCore};

pub struct InnerJoin {
    core: JoinCore,
}

impl InnerJoin {
    pub fn new(left: Box<dyn RowSet>, right: Box<dyn RowSet>, condition: Option<Expr>) -> Self {
        InnerJoin { core: JoinCore::new(left, right, condition) }
    }
}

impl RowSet for InnerJoin {
    join_core_methods!();

    fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        always_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()> {
        self.core
            .prepare_tables(binder, tables, always_allow_null, always_allow_null, table_index)
    }

    fn execute_rowset(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        if !self.core.left.execute_rowset(tables, constraints)? {
            return Ok(false);
        }
        self.core.nested_loop(tables, constraints, true)
    }

    fn next(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        self.core.nested_loop(tables, constraints, false)
    }

    fn shape(&self) -> String {
        self.core.shape("inner")
    }
}
