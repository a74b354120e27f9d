// Statement Lifecycle
//
// A `Batch` owns a parsed statement list and moves through
// Parsed -> Prepared -> Executed exactly once. Preparing resolves the result
// shape of every top-level statement, folds constant PRINT arguments and
// checks that SELECT sources exist.

use std::collections::HashSet;

use log::debug;

use crate::catalog::{ObjectDef, ObjectKind};
use crate::query::ast::{Expr, SelectStatement, Statement, StatementKind};
use crate::query::executor::dml_executor::{leaf_sources, Projection};
use crate::query::executor::expression_eval::fold_constant;
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::executor::rowset::BoundColumn;
use crate::storage::Database;

/// Views nested deeper than this are shaped at execution time
const MAX_VIEW_DEPTH: usize = 32;

/// Lifecycle phase of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Parsed,
    Prepared,
    Executed,
}

/// What a statement hands back to the caller when executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultShape {
    /// No tabular result
    NoResult,
    /// A result set with these column names
    Tabular(Vec<String>),
    /// Known only at execution time (procedure calls, compound statements,
    /// sources created earlier in the same batch)
    Dynamic,
}

impl ResultShape {
    fn merge(self, other: ResultShape) -> ResultShape {
        match (self, other) {
            (ResultShape::NoResult, ResultShape::NoResult) => ResultShape::NoResult,
            _ => ResultShape::Dynamic,
        }
    }
}

/// A sequence of top-level statements executed in order
#[derive(Debug, Clone)]
pub struct Batch {
    statements: Vec<Statement>,
    shapes: Vec<ResultShape>,
    phase: Phase,
}

impl Batch {
    pub fn new(statements: Vec<Statement>) -> Self {
        Batch { statements, shapes: Vec::new(), phase: Phase::Parsed }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Shapes resolved by `prepare`, one per top-level statement
    pub fn shapes(&self) -> &[ResultShape] {
        &self.shapes
    }

    pub fn prepare(&mut self, db: &dyn Database) -> QueryResult<&[ResultShape]> {
        if self.phase != Phase::Parsed {
            return Err(QueryError::InvalidOperation(format!(
                "batch cannot be prepared in phase {:?}",
                self.phase
            )));
        }
        let mut preparer = Preparer { db, created: HashSet::new() };
        let mut shapes = Vec::with_capacity(self.statements.len());
        for statement in &mut self.statements {
            shapes.push(preparer.prepare_statement(statement, true)?);
        }
        debug!("prepared batch of {} statement(s)", shapes.len());
        self.shapes = shapes;
        self.phase = Phase::Prepared;
        Ok(&self.shapes)
    }

    /// Move to the executed phase and hand out the statements to run
    pub(crate) fn start_execution(&mut self) -> QueryResult<&[Statement]> {
        match self.phase {
            Phase::Prepared => {
                self.phase = Phase::Executed;
                Ok(&self.statements)
            }
            Phase::Parsed => Err(QueryError::InvalidOperation("batch has not been prepared".to_string())),
            Phase::Executed => Err(QueryError::InvalidOperation("batch has already been executed".to_string())),
        }
    }
}

struct Preparer<'a> {
    db: &'a dyn Database,
    /// Objects created or altered earlier in this batch; resolved at execution
    created: HashSet<(ObjectKind, String)>,
}

impl Preparer<'_> {
    fn prepare_statement(&mut self, statement: &mut Statement, validate: bool) -> QueryResult<ResultShape> {
        let pos = statement.pos;
        self.prepare_kind(&mut statement.kind, validate).map_err(|e| e.at(pos))
    }

    fn prepare_all(&mut self, statements: &mut [Statement], validate: bool) -> QueryResult<ResultShape> {
        let mut shape = ResultShape::NoResult;
        for statement in statements {
            shape = shape.merge(self.prepare_statement(statement, validate)?);
        }
        Ok(shape)
    }

    fn prepare_kind(&mut self, kind: &mut StatementKind, validate: bool) -> QueryResult<ResultShape> {
        match kind {
            StatementKind::Block(statements) => self.prepare_all(statements, validate),
            StatementKind::If { then_branch, else_branch, .. } => {
                let mut shape = self.prepare_statement(then_branch, validate)?;
                if let Some(else_branch) = else_branch {
                    shape = shape.merge(self.prepare_statement(else_branch, validate)?);
                }
                Ok(shape)
            }
            StatementKind::While { body, .. } => {
                // a loop may run its body any number of times
                match self.prepare_statement(body, validate)? {
                    ResultShape::NoResult => Ok(ResultShape::NoResult),
                    _ => Ok(ResultShape::Dynamic),
                }
            }
            StatementKind::Print(expr) => {
                if let Some(value) = fold_constant(expr) {
                    *expr = Expr::Literal(value);
                }
                Ok(ResultShape::NoResult)
            }
            StatementKind::Select(select) if validate => self.select_shape(select, 0),
            StatementKind::Select(_) | StatementKind::Exec(_) => Ok(ResultShape::Dynamic),
            StatementKind::Create(def) | StatementKind::Alter(def) => {
                self.created.insert((def.kind(), def.name().to_lowercase()));
                if let ObjectDef::Function(routine) | ObjectDef::Procedure(routine) = def {
                    // bodies resolve names when they run
                    self.prepare_all(&mut routine.body, false)?;
                }
                Ok(ResultShape::NoResult)
            }
            _ => Ok(ResultShape::NoResult),
        }
    }

    fn created_earlier(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.created.contains(&(ObjectKind::Table, name.clone())) || self.created.contains(&(ObjectKind::View, name))
    }

    fn select_shape(&self, select: &SelectStatement, depth: usize) -> QueryResult<ResultShape> {
        let Some(from) = &select.from else {
            return Ok(ResultShape::Tabular(Projection::new(&select.columns, &[])?.names().to_vec()));
        };
        let mut bound = Vec::new();
        for (table, (name, qualifier)) in leaf_sources(from).into_iter().enumerate() {
            if self.created_earlier(name) {
                return Ok(ResultShape::Dynamic);
            }
            let Some(columns) = self.source_columns(name, depth)? else {
                return Ok(ResultShape::Dynamic);
            };
            bound.extend(columns.into_iter().enumerate().map(|(position, column)| BoundColumn {
                table,
                position,
                qualifier: qualifier.to_string(),
                name: column,
            }));
        }
        Ok(ResultShape::Tabular(Projection::new(&select.columns, &bound)?.names().to_vec()))
    }

    /// Column names of a table or view; `None` when a view's shape is dynamic
    fn source_columns(&self, name: &str, depth: usize) -> QueryResult<Option<Vec<String>>> {
        if let Some(ObjectDef::Table(table)) = self.db.get_object(ObjectKind::Table, name) {
            return Ok(Some(table.column_names()));
        }
        match self.db.get_object(ObjectKind::View, name) {
            Some(ObjectDef::View(view)) if depth < MAX_VIEW_DEPTH => match self.select_shape(&view.query, depth + 1)? {
                ResultShape::Tabular(columns) => Ok(Some(columns)),
                _ => Ok(None),
            },
            Some(ObjectDef::View(_)) => Ok(None),
            _ => Err(QueryError::ObjectNotFound { kind: ObjectKind::Table, name: name.to_string() }),
        }
    }
}
