// Data Manipulation Language Executor
//
// This module handles execution of SELECT and INSERT statements. SELECT
// builds a RowSet tree over its FROM clause, binds it through the catalog,
// and projects every combination that passes the WHERE clause.

use std::sync::Arc;

use log::debug;

use crate::catalog::{ObjectDef, ObjectKind};
use crate::query::ast::{Expr, InsertStatement, SelectItem, SelectStatement, TableExpr};
use crate::query::executor::engine::EngineConfig;
use crate::query::executor::expression_eval::{evaluate_expression, EvalEnv};
use crate::query::executor::result::{convert_data_value, DataValue, QueryError, QueryResult, QueryResultSet, Row};
use crate::query::executor::rowset::{
    build_rowset, resolve_bound, BoundColumn, Constraints, JoinedRows, RowSet, TableBinder,
};
use crate::query::executor::table_collection::TableCollection;
use crate::storage::{Database, MaterializedSource, TableSource};

/// Where a projected value comes from
#[derive(Debug, Clone)]
enum ProjectedValue {
    /// Qualified name of a bound column
    Column(String),
    Expr(Expr),
}

/// Output columns of a SELECT and how to compute them
#[derive(Debug, Clone)]
pub struct Projection {
    names: Vec<String>,
    values: Vec<ProjectedValue>,
}

impl Projection {
    /// Resolve the select list against the bound columns. Output names are
    /// bare column names, qualified only where a bare name repeats.
    pub fn new(items: &[SelectItem], bound: &[BoundColumn]) -> QueryResult<Self> {
        // (bare name, qualified name if it came from a bound column, value)
        let mut entries: Vec<(String, Option<String>, ProjectedValue)> = Vec::new();
        for (i, item) in items.iter().enumerate() {
            match item {
                SelectItem::Wildcard => {
                    if bound.is_empty() {
                        return Err(QueryError::ExecutionError(
                            "SELECT * requires a FROM clause".to_string(),
                        ));
                    }
                    entries.extend(bound.iter().map(column_entry));
                }
                SelectItem::QualifiedWildcard(qualifier) => {
                    let before = entries.len();
                    entries.extend(
                        bound
                            .iter()
                            .filter(|c| c.qualifier.eq_ignore_ascii_case(qualifier))
                            .map(column_entry),
                    );
                    if entries.len() == before {
                        return Err(QueryError::ColumnNotFound(format!("{}.*", qualifier)));
                    }
                }
                SelectItem::Expr { expr: Expr::Column { table, name }, alias } => {
                    let column = resolve_bound(bound, table.as_deref(), name)?;
                    let (bare, qualified) = match alias {
                        Some(alias) => (alias.clone(), None),
                        None => (column.name.clone(), Some(column.qualified_name())),
                    };
                    entries.push((bare, qualified, ProjectedValue::Column(column.qualified_name())));
                }
                SelectItem::Expr { expr, alias } => {
                    let name = match (alias, expr) {
                        (Some(alias), _) => alias.clone(),
                        (None, Expr::Variable(var)) => var.trim_start_matches('@').to_string(),
                        (None, Expr::Call { name, .. }) => name.to_lowercase(),
                        (None, _) => format!("column{}", i + 1),
                    };
                    entries.push((name, None, ProjectedValue::Expr(expr.clone())));
                }
            }
        }

        let repeats = |bare: &str| {
            entries
                .iter()
                .filter(|(other, _, _)| other.eq_ignore_ascii_case(bare))
                .count()
                > 1
        };
        let names = entries
            .iter()
            .map(|(bare, qualified, _)| match qualified {
                Some(q) if repeats(bare) => q.clone(),
                _ => bare.clone(),
            })
            .collect();
        let values = entries.into_iter().map(|(_, _, value)| value).collect();
        Ok(Projection { names, values })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn project(&self, row: Option<&Row>, env: &EvalEnv<'_>) -> QueryResult<Row> {
        let mut values = Vec::with_capacity(self.values.len());
        for value in &self.values {
            values.push(match (value, row) {
                (ProjectedValue::Column(name), Some(row)) => {
                    row.get(name).cloned().ok_or_else(|| QueryError::ColumnNotFound(name.clone()))?
                }
                (ProjectedValue::Column(name), None) => return Err(QueryError::ColumnNotFound(name.clone())),
                (ProjectedValue::Expr(expr), row) => evaluate_expression(expr, row, env)?,
            });
        }
        Ok(Row::from_values(self.names.clone(), values))
    }
}

fn column_entry(column: &BoundColumn) -> (String, Option<String>, ProjectedValue) {
    (
        column.name.clone(),
        Some(column.qualified_name()),
        ProjectedValue::Column(column.qualified_name()),
    )
}

/// Leaf sources of a FROM clause as `(name, qualifier)`, in binding order
pub fn leaf_sources(from: &TableExpr) -> Vec<(&str, &str)> {
    match from {
        TableExpr::Table { name, alias } => vec![(name.as_str(), alias.as_deref().unwrap_or(name))],
        TableExpr::Join { left, right, .. } => {
            let mut leaves = leaf_sources(left);
            leaves.extend(leaf_sources(right));
            leaves
        }
    }
}

/// Binds names to native tables, or to views materialized on the spot
struct CatalogBinder<'a> {
    dml: &'a DmlExecutor,
    env: &'a EvalEnv<'a>,
    depth: usize,
}

impl TableBinder for CatalogBinder<'_> {
    fn bind(&mut self, name: &str) -> QueryResult<Box<dyn TableSource>> {
        let db = &self.dml.db;
        if db.object_exists(ObjectKind::Table, name) {
            return Ok(db.open_table(name)?);
        }
        let Some(view) = db.get_object(ObjectKind::View, name) else {
            return Err(QueryError::ObjectNotFound { kind: ObjectKind::Table, name: name.to_string() });
        };
        let ObjectDef::View(view) = view else {
            return Err(QueryError::ObjectNotFound { kind: ObjectKind::View, name: name.to_string() });
        };
        if self.depth >= self.dml.config.max_recursion_depth {
            return Err(QueryError::ExecutionError(format!(
                "View '{}' nests more than {} levels deep",
                name, self.dml.config.max_recursion_depth
            )));
        }
        debug!("materializing view '{}'", view.name);
        let result = self.dml.select_at_depth(&view.query, self.env, self.depth + 1)?;
        let columns = result.columns().to_vec();
        Ok(Box::new(MaterializedSource::new(view.name, columns, result.to_values())))
    }
}

/// Handles execution of DML operations
pub struct DmlExecutor {
    db: Arc<dyn Database>,
    config: EngineConfig,
}

impl DmlExecutor {
    pub fn new(db: Arc<dyn Database>, config: EngineConfig) -> Self {
        DmlExecutor { db, config }
    }

    pub fn execute_select(&self, select: &SelectStatement, env: &EvalEnv<'_>) -> QueryResult<QueryResultSet> {
        self.select_at_depth(select, env, 0)
    }

    fn select_at_depth(&self, select: &SelectStatement, env: &EvalEnv<'_>, depth: usize) -> QueryResult<QueryResultSet> {
        let Some(from) = &select.from else {
            let projection = Projection::new(&select.columns, &[])?;
            let mut result = QueryResultSet::new(projection.names().to_vec());
            let keep = match &select.where_clause {
                Some(condition) => evaluate_expression(condition, None, env)?.is_true(),
                None => true,
            };
            if keep {
                result.add_row(projection.project(None, env)?);
            }
            return Ok(result);
        };

        let mut rowset = build_rowset(from)?;
        let mut tables = TableCollection::new(self.config.use_index_lookups);
        let mut binder = CatalogBinder { dml: self, env, depth };
        let mut table_index = 0;
        rowset.prepare_tables(&mut binder, &mut tables, false, &mut table_index)?;
        rowset.prepare()?;
        let projection = Projection::new(&select.columns, &rowset.bound_columns())?;

        // Sources must be open before they can be prepared
        let result = tables
            .open()
            .and_then(|_| tables.prepare())
            .and_then(|_| Self::collect(rowset.as_mut(), &tables, select, &projection, env));
        let released = tables.unprepare().and_then(|_| tables.free());
        let result = result?;
        released?;
        debug!("{} returned {} row(s)", rowset.shape(), result.row_count());
        Ok(result)
    }

    fn collect(
        rowset: &mut dyn RowSet,
        tables: &TableCollection,
        select: &SelectStatement,
        projection: &Projection,
        env: &EvalEnv<'_>,
    ) -> QueryResult<QueryResultSet> {
        let mut result = QueryResultSet::new(projection.names().to_vec());
        let empty = Row::new();
        let constraints = Constraints::unconstrained(&empty, env);
        for joined in JoinedRows::new(rowset, tables, constraints) {
            let joined = joined?;
            if let Some(condition) = &select.where_clause {
                if !evaluate_expression(condition, Some(&joined.row), env)?.is_true() {
                    continue;
                }
            }
            result.add_row(projection.project(Some(&joined.row), env)?);
        }
        Ok(result)
    }

    /// Insert VALUES rows; returns the number of rows inserted
    pub fn execute_insert(&self, insert: &InsertStatement, env: &EvalEnv<'_>) -> QueryResult<usize> {
        let table = match self.db.get_object(ObjectKind::Table, &insert.table) {
            Some(ObjectDef::Table(table)) => table,
            _ => {
                return Err(QueryError::ObjectNotFound {
                    kind: ObjectKind::Table,
                    name: insert.table.clone(),
                })
            }
        };

        let targets: Vec<usize> = if insert.columns.is_empty() {
            (0..table.columns().len()).collect()
        } else {
            insert
                .columns
                .iter()
                .map(|name| {
                    table
                        .column_index(name)
                        .ok_or_else(|| QueryError::ColumnNotFound(format!("{}.{}", table.name(), name)))
                })
                .collect::<QueryResult<_>>()?
        };

        let mut inserted = 0;
        for exprs in &insert.values {
            if exprs.len() != targets.len() {
                return Err(QueryError::ExecutionError(format!(
                    "INSERT into '{}' supplies {} value(s) for {} column(s)",
                    table.name(),
                    exprs.len(),
                    targets.len()
                )));
            }
            let mut values = vec![DataValue::Null; table.columns().len()];
            for (expr, &position) in exprs.iter().zip(&targets) {
                let value = evaluate_expression(expr, None, env)?;
                values[position] = convert_data_value(&value, table.columns()[position].data_type())?;
            }
            self.db.insert_row(table.name(), values)?;
            inserted += 1;
        }
        debug!("inserted {} row(s) into '{}'", inserted, table.name());
        Ok(inserted)
    }
}
