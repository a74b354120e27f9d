// RowSet Module
//
// Pull-based cursors over the tables of one statement. A RowSet tree is built
// from a FROM clause, bound into a `TableCollection`, then driven with
// `execute_rowset` / `next` under a set of `Constraints` supplied by the
// parent (the outer row and equality keys derived from join conditions).

pub mod iter;
pub mod join;
pub mod scan;

use crate::common::{RowKey, TableIndex};
use crate::query::ast::{JoinKind, TableExpr};
use crate::query::executor::expression_eval::EvalEnv;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Row};
use crate::query::executor::table_collection::TableCollection;
use crate::storage::TableSource;

pub use self::iter::{JoinedRow, JoinedRows};
pub use self::join::{CrossJoin, InnerJoin, LeftJoin, OuterJoin};
pub use self::scan::TableScan;

/// Equality restriction on one column of one bound table
#[derive(Debug, Clone, PartialEq)]
pub struct KeyConstraint {
    pub table: TableIndex,
    pub column: usize,
    pub value: DataValue,
}

/// Outer context handed down to `execute_rowset` and `next`
#[derive(Clone, Copy)]
pub struct Constraints<'a> {
    /// Columns already fixed by enclosing joins
    pub outer: &'a Row,
    pub keys: &'a [KeyConstraint],
    pub env: &'a EvalEnv<'a>,
}

impl<'a> Constraints<'a> {
    pub fn new(outer: &'a Row, keys: &'a [KeyConstraint], env: &'a EvalEnv<'a>) -> Self {
        Self { outer, keys, env }
    }

    /// No outer row and no keys
    pub fn unconstrained(empty: &'a Row, env: &'a EvalEnv<'a>) -> Self {
        Self { outer: empty, keys: &[], env }
    }
}

/// A column of a bound table source, as seen by expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundColumn {
    pub table: TableIndex,
    /// Position of the column in the source's rows
    pub position: usize,
    pub qualifier: String,
    pub name: String,
}

impl BoundColumn {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.qualifier, self.name)
    }

    pub fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            && qualifier.is_none_or(|q| self.qualifier.eq_ignore_ascii_case(q))
    }
}

/// Find the single bound column a reference names
pub fn resolve_bound<'c>(
    columns: &'c [BoundColumn],
    qualifier: Option<&str>,
    name: &str,
) -> QueryResult<&'c BoundColumn> {
    let mut found = columns.iter().filter(|c| c.matches(qualifier, name));
    let display = match qualifier {
        Some(q) => format!("{}.{}", q, name),
        None => name.to_string(),
    };
    match (found.next(), found.next()) {
        (Some(col), None) => Ok(col),
        (Some(_), Some(_)) => Err(QueryError::ExecutionError(format!(
            "Ambiguous column reference '{}'",
            display
        ))),
        (None, _) => Err(QueryError::ColumnNotFound(display)),
    }
}

/// Which side of the current combination was synthesized as NULLs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    None,
    Left,
    Right,
}

/// Resolves a table or view name to a fresh source for one statement
pub trait TableBinder {
    fn bind(&mut self, name: &str) -> QueryResult<Box<dyn TableSource>>;
}

/// Pull-based cursor protocol shared by table scans and joins
pub trait RowSet {
    /// One-time binding of column references; does not move the cursor
    fn prepare(&mut self) -> QueryResult<()>;

    /// Bind table names to sources and register them in evaluation order.
    /// `always_allow_null` marks leaves that may be padded with NULLs.
    fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        always_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()>;

    /// Position on the first row satisfying `constraints`
    fn execute_rowset(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool>;

    /// Advance past the current row under the same outer context
    fn next(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool>;

    fn row_available(&self) -> bool;

    fn row_updated(&self) -> bool;

    fn set_updated(&mut self);

    fn clear_updated(&mut self);

    /// Force the current position to read as absent without advancing
    fn mark_row_not_available(&mut self) -> QueryResult<()>;

    /// True when exactly one side of a join is available
    fn outer_row(&self) -> bool;

    fn padding(&self) -> Padding;

    /// Structural description used by `is_equals`
    fn shape(&self) -> String;

    fn is_equals(&self, other: &dyn RowSet) -> bool {
        self.shape() == other.shape()
    }

    /// Bound columns in output order; empty before `prepare_tables`
    fn bound_columns(&self) -> Vec<BoundColumn>;

    fn columns(&self) -> Vec<String> {
        self.bound_columns().iter().map(BoundColumn::qualified_name).collect()
    }

    /// The current combination; unavailable sides read as NULL
    fn current_row(&self, tables: &TableCollection) -> QueryResult<Row>;

    /// Identity of the current combination over the available leaves
    fn row_key(&self) -> RowKey;
}

/// Build an unbound RowSet tree for a FROM clause
pub fn build_rowset(from: &TableExpr) -> QueryResult<Box<dyn RowSet>> {
    match from {
        TableExpr::Table { name, alias } => Ok(Box::new(TableScan::new(name, alias.as_deref()))),
        TableExpr::Join { left, right, kind, condition } => {
            let left = build_rowset(left)?;
            let right = build_rowset(right)?;
            let rowset: Box<dyn RowSet> = match (kind, condition) {
                (JoinKind::Cross, None) => Box::new(CrossJoin::new(left, right)),
                (JoinKind::Cross | JoinKind::Inner, condition) => {
                    Box::new(InnerJoin::new(left, right, condition.clone()))
                }
                (JoinKind::Left, condition) => Box::new(LeftJoin::new(left, right, condition.clone())),
                (JoinKind::Full, condition) => Box::new(OuterJoin::new(left, right, condition.clone())),
                (JoinKind::Right, _) => {
                    return Err(QueryError::NotImplemented(
                        "RIGHT JOIN (write it as a LEFT JOIN with the operands swapped)".to_string(),
                    ))
                }
            };
            Ok(rowset)
        }
    }
}
