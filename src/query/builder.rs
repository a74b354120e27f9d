// Statement Tree Builder
//
// Builds batches and routine bodies while tracking the lexical scope stack
// (batch, routine, loop, block, IF). BREAK and CONTINUE resolve against the
// nearest enclosing loop at build time; a batch or routine boundary ends
// the search.

use crate::catalog::ObjectDef;
use crate::common::SourcePos;
use crate::query::ast::{Expr, Statement, StatementKind};
use crate::query::executor::result::{QueryError, QueryResult};
use crate::query::executor::statement::Batch;

#[derive(Debug)]
enum ScopeKind {
    Batch,
    Routine,
    Loop { condition: Expr },
    Block,
    If { condition: Expr, then_branch: Option<Vec<Statement>> },
}

impl ScopeKind {
    fn name(&self) -> &'static str {
        match self {
            ScopeKind::Batch => "batch",
            ScopeKind::Routine => "routine body",
            ScopeKind::Loop { .. } => "WHILE",
            ScopeKind::Block => "BEGIN ... END block",
            ScopeKind::If { .. } => "IF",
        }
    }
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    pos: SourcePos,
    statements: Vec<Statement>,
}

/// Incremental, scope-checked construction of a statement tree
#[derive(Debug)]
pub struct BatchBuilder {
    scopes: Vec<Scope>,
    pos: SourcePos,
}

impl Default for BatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBuilder {
    /// Builder for a top-level batch
    pub fn new() -> Self {
        Self::with_root(ScopeKind::Batch)
    }

    /// Builder for the body of a stored function or procedure
    pub fn routine() -> Self {
        Self::with_root(ScopeKind::Routine)
    }

    fn with_root(kind: ScopeKind) -> Self {
        BatchBuilder {
            scopes: vec![Scope { kind, pos: SourcePos::default(), statements: Vec::new() }],
            pos: SourcePos::default(),
        }
    }

    /// Source position given to the statements and scopes that follow
    pub fn at(&mut self, line: u32, column: u32) -> &mut Self {
        self.pos = SourcePos::new(line, column);
        self
    }

    /// Add a statement to the innermost open scope
    pub fn push(&mut self, kind: StatementKind) -> QueryResult<&mut Self> {
        let statement = Statement::new(self.pos, kind);
        check_control_flow(&statement, self.in_loop())?;
        self.current().statements.push(statement);
        Ok(self)
    }

    pub fn brk(&mut self) -> QueryResult<&mut Self> {
        self.push(StatementKind::Break)
    }

    pub fn cont(&mut self) -> QueryResult<&mut Self> {
        self.push(StatementKind::Continue)
    }

    pub fn begin_while(&mut self, condition: Expr) -> &mut Self {
        self.open(ScopeKind::Loop { condition })
    }

    pub fn begin_if(&mut self, condition: Expr) -> &mut Self {
        self.open(ScopeKind::If { condition, then_branch: None })
    }

    pub fn begin_block(&mut self) -> &mut Self {
        self.open(ScopeKind::Block)
    }

    /// Switch the innermost IF from its THEN branch to its ELSE branch
    pub fn begin_else(&mut self) -> QueryResult<&mut Self> {
        let scope = self.current();
        let inside = scope.kind.name();
        let ScopeKind::If { then_branch, .. } = &mut scope.kind else {
            return Err(QueryError::InvalidOperation(format!("ELSE inside {}", inside)));
        };
        if then_branch.is_some() {
            return Err(QueryError::InvalidOperation("IF already has an ELSE branch".to_string()));
        }
        *then_branch = Some(std::mem::take(&mut scope.statements));
        Ok(self)
    }

    /// Close the innermost loop, block or IF
    pub fn end(&mut self) -> QueryResult<&mut Self> {
        if self.scopes.len() == 1 {
            return Err(QueryError::InvalidOperation(format!(
                "END with no open scope in {}",
                self.scopes[0].kind.name()
            )));
        }
        let Some(scope) = self.scopes.pop() else {
            return Err(QueryError::InvalidOperation("no open scope".to_string()));
        };
        let kind = match scope.kind {
            ScopeKind::Loop { condition } => StatementKind::While {
                condition,
                body: Box::new(Statement::new(scope.pos, StatementKind::Block(scope.statements))),
            },
            ScopeKind::Block => StatementKind::Block(scope.statements),
            ScopeKind::If { condition, then_branch } => {
                let (then_statements, else_statements) = match then_branch {
                    Some(then_statements) => (then_statements, Some(scope.statements)),
                    None => (scope.statements, None),
                };
                StatementKind::If {
                    condition,
                    then_branch: Box::new(Statement::new(scope.pos, StatementKind::Block(then_statements))),
                    else_branch: else_statements
                        .map(|s| Box::new(Statement::new(scope.pos, StatementKind::Block(s)))),
                }
            }
            ScopeKind::Batch | ScopeKind::Routine => {
                return Err(QueryError::InvalidOperation("cannot close the root scope".to_string()));
            }
        };
        // contents were checked as they were pushed
        self.current().statements.push(Statement::new(scope.pos, kind));
        Ok(self)
    }

    /// Finish a top-level batch
    pub fn finish(self) -> QueryResult<Batch> {
        Ok(Batch::new(self.into_statements()?))
    }

    /// Finish a routine body
    pub fn finish_body(self) -> QueryResult<Vec<Statement>> {
        self.into_statements()
    }

    fn into_statements(mut self) -> QueryResult<Vec<Statement>> {
        if self.scopes.len() > 1 {
            let open = &self.scopes[self.scopes.len() - 1];
            return Err(QueryError::InvalidOperation(format!(
                "{} opened at {} is not closed",
                open.kind.name(),
                open.pos
            )));
        }
        Ok(self.scopes.pop().map(|root| root.statements).unwrap_or_default())
    }

    fn open(&mut self, kind: ScopeKind) -> &mut Self {
        self.scopes.push(Scope { kind, pos: self.pos, statements: Vec::new() });
        self
    }

    fn current(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    /// Whether the nearest loop is closer than the batch or routine boundary
    fn in_loop(&self) -> bool {
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                ScopeKind::Loop { .. } => return true,
                ScopeKind::Batch | ScopeKind::Routine => return false,
                ScopeKind::Block | ScopeKind::If { .. } => {}
            }
        }
        false
    }
}

/// Reject BREAK/CONTINUE with no enclosing loop anywhere inside `statement`
fn check_control_flow(statement: &Statement, in_loop: bool) -> QueryResult<()> {
    match &statement.kind {
        StatementKind::Break | StatementKind::Continue if !in_loop => {
            let keyword = if statement.kind == StatementKind::Break { "BREAK" } else { "CONTINUE" };
            Err(QueryError::ControlFlowMisuse(format!("{} outside a loop", keyword)).at(statement.pos))
        }
        StatementKind::Block(statements) => statements.iter().try_for_each(|s| check_control_flow(s, in_loop)),
        StatementKind::If { then_branch, else_branch, .. } => {
            check_control_flow(then_branch, in_loop)?;
            match else_branch {
                Some(else_branch) => check_control_flow(else_branch, in_loop),
                None => Ok(()),
            }
        }
        StatementKind::While { body, .. } => check_control_flow(body, true),
        StatementKind::Create(def) | StatementKind::Alter(def) => match def {
            ObjectDef::Function(routine) | ObjectDef::Procedure(routine) => {
                routine.body.iter().try_for_each(|s| check_control_flow(s, false))
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}
