// Join Operators Module
//
// Nested-loop join combinators over two child RowSets. The left child always
// drives; the right child is re-executed once per left row under constraints
// carrying the left row and any equality keys taken from the join condition.

pub mod cross;
pub mod inner;
pub mod left;
pub mod outer;

pub use self::cross::CrossJoin;
pub use self::inner::InnerJoin;
pub use self::left::LeftJoin;
pub use self::outer::OuterJoin;

use crate::common::{RowKey, TableIndex};
use crate::query::ast::{BinaryOp, Expr};
use crate::query::executor::expression_eval::{evaluate_expression, EvalEnv};
use crate::query::executor::result::{QueryResult, Row};
use crate::query::executor::table_collection::TableCollection;
use super::{resolve_bound, BoundColumn, Constraints, KeyConstraint, Padding, RowSet, TableBinder};

/// `right_column = expr over left columns`, usable as a scan key
#[derive(Debug, Clone)]
struct KeyExpr {
    table: TableIndex,
    column: usize,
    expr: Expr,
}

/// State and sequencing shared by every join kind
pub struct JoinCore {
    pub(crate) left: Box<dyn RowSet>,
    pub(crate) right: Box<dyn RowSet>,
    pub(crate) condition: Option<Expr>,
    key_exprs: Vec<KeyExpr>,
    /// Current left row; keys and the condition see only this join's own rows
    left_row: Row,
    /// Outer row seen by the right child: parent outer row plus current left row
    right_outer: Row,
    right_keys: Vec<KeyConstraint>,
    prepared: bool,
    pub(crate) updated: bool,
}

impl JoinCore {
    pub fn new(left: Box<dyn RowSet>, right: Box<dyn RowSet>, condition: Option<Expr>) -> Self {
        JoinCore {
            left,
            right,
            condition,
            key_exprs: Vec::new(),
            left_row: Row::new(),
            right_outer: Row::new(),
            right_keys: Vec::new(),
            prepared: false,
            updated: false,
        }
    }

    pub fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        left_allow_null: bool,
        right_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()> {
        self.left.prepare_tables(binder, tables, left_allow_null, table_index)?;
        self.right.prepare_tables(binder, tables, right_allow_null, table_index)?;
        self.key_exprs = self.derive_keys();
        Ok(())
    }

    /// Pick out conjuncts of the form `right_col = <expr over left columns>`
    fn derive_keys(&self) -> Vec<KeyExpr> {
        let Some(condition) = &self.condition else {
            return Vec::new();
        };
        let left_cols = self.left.bound_columns();
        let right_cols = self.right.bound_columns();
        let all_cols: Vec<BoundColumn> = left_cols.iter().chain(&right_cols).cloned().collect();

        let only_left = |expr: &Expr| {
            expr.column_refs()
                .into_iter()
                .all(|(q, n)| resolve_bound(&all_cols, q, n).is_ok_and(|c| left_cols.contains(c)))
        };
        let right_key = |expr: &Expr| match expr {
            Expr::Column { table, name } => resolve_bound(&all_cols, table.as_deref(), name)
                .ok()
                .filter(|c| right_cols.contains(c))
                .cloned(),
            _ => None,
        };

        let mut keys = Vec::new();
        for conjunct in condition.conjuncts() {
            let Expr::Binary { left, op: BinaryOp::Equals, right } = conjunct else {
                continue;
            };
            let (left, right) = (left.as_ref(), right.as_ref());
            for (col_side, value_side) in [(left, right), (right, left)] {
                if let Some(col) = right_key(col_side).filter(|_| only_left(value_side)) {
                    keys.push(KeyExpr { table: col.table, column: col.position, expr: value_side.clone() });
                    break;
                }
            }
        }
        keys
    }

    /// Prepare both children and check every condition column resolves
    pub fn prepare(&mut self) -> QueryResult<()> {
        if self.prepared {
            return Ok(());
        }
        self.left.prepare()?;
        self.right.prepare()?;
        if let Some(condition) = &self.condition {
            let columns = self.bound_columns();
            for (qualifier, name) in condition.column_refs() {
                resolve_bound(&columns, qualifier, name)?;
            }
        }
        self.prepared = true;
        Ok(())
    }

    /// Recompute the right child's context from the current left row
    fn load_right_context(&mut self, tables: &TableCollection, c: &Constraints<'_>) -> QueryResult<()> {
        let left_row = self.left.current_row(tables)?;
        let mut keys = c.keys.to_vec();
        for key in &self.key_exprs {
            let value = evaluate_expression(&key.expr, Some(&left_row), c.env)?;
            keys.push(KeyConstraint { table: key.table, column: key.column, value });
        }
        let mut outer = c.outer.clone();
        outer.merge(&left_row);
        self.left_row = left_row;
        self.right_outer = outer;
        self.right_keys = keys;
        Ok(())
    }

    fn condition_holds(&self, tables: &TableCollection, env: &EvalEnv<'_>) -> QueryResult<bool> {
        let Some(condition) = &self.condition else {
            return Ok(true);
        };
        let mut row = self.left_row.clone();
        row.merge(&self.right.current_row(tables)?);
        Ok(evaluate_expression(condition, Some(&row), env)?.is_true())
    }

    /// Move the right child to its next row satisfying the join condition.
    /// `restart` re-executes it for a newly established left row.
    pub fn seek_right(&mut self, tables: &TableCollection, c: &Constraints<'_>, restart: bool) -> QueryResult<bool> {
        if restart {
            self.load_right_context(tables, c)?;
        }
        let right_constraints = Constraints::new(&self.right_outer, &self.right_keys, c.env);
        let mut found = if restart {
            self.right.execute_rowset(tables, &right_constraints)?
        } else {
            self.right.next(tables, &right_constraints)?
        };
        while found {
            if self.condition_holds(tables, c.env)? {
                return Ok(true);
            }
            found = self.right.next(tables, &right_constraints)?;
        }
        Ok(false)
    }

    /// Plain nested loop: advance left whenever the right side runs dry
    pub fn nested_loop(&mut self, tables: &TableCollection, c: &Constraints<'_>, mut restart: bool) -> QueryResult<bool> {
        loop {
            if self.seek_right(tables, c, restart)? {
                self.updated = true;
                return Ok(true);
            }
            if !self.left.next(tables, c)? {
                return Ok(false);
            }
            restart = true;
        }
    }

    pub fn row_available(&self) -> bool {
        self.left.row_available() || self.right.row_available()
    }

    pub fn outer_row(&self) -> bool {
        self.left.row_available() != self.right.row_available()
    }

    pub fn padding(&self) -> Padding {
        match (self.left.row_available(), self.right.row_available()) {
            (true, false) => Padding::Right,
            (false, true) => Padding::Left,
            _ => Padding::None,
        }
    }

    pub fn mark_row_not_available(&mut self) -> QueryResult<()> {
        self.left.mark_row_not_available()?;
        self.right.mark_row_not_available()
    }

    pub fn bound_columns(&self) -> Vec<BoundColumn> {
        let mut columns = self.left.bound_columns();
        columns.extend(self.right.bound_columns());
        columns
    }

    pub fn current_row(&self, tables: &TableCollection) -> QueryResult<Row> {
        let mut row = self.left.current_row(tables)?;
        row.merge(&self.right.current_row(tables)?);
        Ok(row)
    }

    pub fn row_key(&self) -> RowKey {
        let mut key = self.left.row_key();
        key.extend(self.right.row_key());
        key
    }

    pub fn shape(&self, kind: &str) -> String {
        format!(
            "{}({}, {}, {:?})",
            kind,
            self.left.shape(),
            self.right.shape(),
            self.condition
        )
    }
}

/// RowSet methods that every join answers from its `JoinCore`
macro_rules! join_core_methods {
    () => {
        fn prepare(&mut self) -> QueryResult<()> {
            self.core.prepare()
        }

        fn row_available(&self) -> bool {
            self.core.row_available()
        }

        fn row_updated(&self) -> bool {
            self.core.updated
        }

        fn set_updated(&mut self) {
            self.core.updated = true;
        }

        fn clear_updated(&mut self) {
            self.core.updated = false;
        }

        fn mark_row_not_available(&mut self) -> QueryResult<()> {
            self.core.mark_row_not_available()
        }

        fn outer_row(&self) -> bool {
            self.core.outer_row()
        }

        fn padding(&self) -> Padding {
            self.core.padding()
        }

        fn bound_columns(&self) -> Vec<BoundColumn> {
            self.core.bound_columns()
        }

        fn current_row(&self, tables: &TableCollection) -> QueryResult<Row> {
            self.core.current_row(tables)
        }

        fn row_key(&self) -> RowKey {
            self.core.row_key()
        }
    };
}

pub(crate) use join_core_methods;
