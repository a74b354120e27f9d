// Query Execution Engine Implementation
//
// This module implements the interpreter that executes prepared batches:
// statement dispatch, procedure calls and user function invocation.

use std::cell::Cell;
use std::sync::Arc;

use log::{debug, info};

use crate::catalog::{ObjectDef, ObjectKind, RoutineDef};
use crate::query::ast::{Expr, ExecStatement, Statement, StatementKind};
use crate::query::executor::context::{BodyKind, ExecutionContext};
use crate::query::executor::control_flow::Flow;
use crate::query::executor::ddl_executor::DdlExecutor;
use crate::query::executor::dml_executor::DmlExecutor;
use crate::query::executor::expression_eval::{evaluate_expression, EvalEnv, FunctionInvoker};
use crate::query::executor::result::{DataValue, QueryError, QueryResult, QueryResultSet};
use crate::query::executor::routine::{ParamSlot, ParameterMap};
use crate::query::executor::statement::Batch;
use crate::storage::Database;
use crate::transaction::TransactionManager;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum nesting of function and procedure calls
    pub max_recursion_depth: usize,
    /// Iteration cap for a single WHILE; unbounded when `None`
    pub max_loop_iterations: Option<u64>,
    /// Let scans over native tables use index lookups for join keys
    pub use_index_lookups: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 32,
            max_loop_iterations: None,
            use_index_lookups: true,
        }
    }
}

/// Everything a batch produced
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub results: Vec<QueryResultSet>,
    /// PRINT output and status messages, in order
    pub messages: Vec<String>,
}

/// Decrements the routine nesting depth when a call finishes
struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get().saturating_sub(1));
    }
}

pub struct ExecutionEngine {
    db: Arc<dyn Database>,
    config: EngineConfig,
    tm: TransactionManager,
    ddl: DdlExecutor,
    dml: DmlExecutor,
    depth: Cell<usize>,
}

impl ExecutionEngine {
    pub fn new(db: Arc<dyn Database>, config: EngineConfig) -> Self {
        let tm = TransactionManager::new(db.clone());
        ExecutionEngine {
            ddl: DdlExecutor::new(tm.clone()),
            dml: DmlExecutor::new(db.clone(), config.clone()),
            tm,
            db,
            config,
            depth: Cell::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Execute a prepared batch
    pub fn execute_batch(&self, batch: &mut Batch) -> QueryResult<BatchOutcome> {
        let statements = batch.start_execution()?;
        debug!("executing batch of {} statement(s)", statements.len());
        let mut ctx = ExecutionContext::batch();
        self.run_body(statements, &mut ctx)?;
        let (results, messages) = ctx.into_output();
        Ok(BatchOutcome { results, messages })
    }

    /// Prepare and execute a statement list in one go
    pub fn run(&self, statements: Vec<Statement>) -> QueryResult<BatchOutcome> {
        let mut batch = Batch::new(statements);
        batch.prepare(self.db.as_ref())?;
        self.execute_batch(&mut batch)
    }

    /// Execute one statement, attaching its position to any error
    pub(crate) fn execute_statement(&self, statement: &Statement, ctx: &mut ExecutionContext) -> QueryResult<Flow> {
        self.dispatch(&statement.kind, ctx).map_err(|e| e.at(statement.pos))
    }

    pub(crate) fn evaluate(&self, expr: &Expr, ctx: &ExecutionContext) -> QueryResult<DataValue> {
        evaluate_expression(expr, None, &EvalEnv::new(ctx, self))
    }

    fn dispatch(&self, kind: &StatementKind, ctx: &mut ExecutionContext) -> QueryResult<Flow> {
        match kind {
            StatementKind::Block(statements) => return self.execute_block(statements, ctx),
            StatementKind::If { condition, then_branch, else_branch } => {
                return self.execute_if(condition, then_branch, else_branch.as_deref(), ctx);
            }
            StatementKind::While { condition, body } => return self.execute_while(condition, body, ctx),
            StatementKind::Break => return Ok(Flow::Break),
            StatementKind::Continue => return Ok(Flow::Continue),
            StatementKind::Return(value) => return self.execute_return(value.as_ref(), ctx),

            StatementKind::Declare { name, data_type, initial } => {
                let value = match initial {
                    Some(expr) => self.evaluate(expr, ctx)?,
                    None => DataValue::Null,
                };
                ctx.declare(name, *data_type, value)?;
            }
            StatementKind::Set { name, value } => {
                let value = self.evaluate(value, ctx)?;
                ctx.set_variable(name, value)?;
            }
            StatementKind::Print(expr) => {
                let value = self.evaluate(expr, ctx)?;
                ctx.message(value.to_string());
            }

            StatementKind::Select(select) => {
                let result = self.dml.execute_select(select, &EvalEnv::new(&*ctx, self))?;
                ctx.emit_result(result)?;
            }
            StatementKind::Insert(insert) => {
                let count = self.dml.execute_insert(insert, &EvalEnv::new(&*ctx, self))?;
                ctx.message(format!("({} row(s) affected)", count));
            }

            StatementKind::BeginTransaction => {
                self.tm.begin_transaction()?;
            }
            StatementKind::CommitTransaction => self.tm.commit_transaction()?,
            StatementKind::RollbackTransaction => self.tm.abort_transaction()?,

            StatementKind::Create(def) => {
                let message = self.ddl.execute_create(def)?;
                ctx.message(message);
            }
            StatementKind::Alter(def) => {
                let message = self.ddl.execute_alter(def)?;
                ctx.message(message);
            }
            StatementKind::Drop { kind, name, if_exists } => {
                if let Some(message) = self.ddl.execute_drop(*kind, name, *if_exists)? {
                    ctx.message(message);
                }
            }
            StatementKind::AlterIndexRebuild { name } => {
                self.ddl.execute_rebuild_index(name)?;
            }

            StatementKind::Exec(exec) => self.execute_procedure(exec, ctx)?,
        }
        Ok(Flow::Normal)
    }

    fn enter_routine(&self, name: &str) -> QueryResult<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= self.config.max_recursion_depth {
            return Err(QueryError::ExecutionError(format!(
                "Maximum routine nesting level ({}) exceeded calling '{}'",
                self.config.max_recursion_depth, name
            )));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard(&self.depth))
    }

    fn routine(&self, kind: ObjectKind, name: &str) -> QueryResult<RoutineDef> {
        match self.db.get_object(kind, name) {
            Some(ObjectDef::Function(routine) | ObjectDef::Procedure(routine)) => Ok(routine),
            _ => Err(QueryError::ObjectNotFound { kind, name: name.to_string() }),
        }
    }

    fn execute_procedure(&self, exec: &ExecStatement, ctx: &mut ExecutionContext) -> QueryResult<()> {
        let routine = self.routine(ObjectKind::Procedure, &exec.procedure)?;
        let mut params = ParameterMap::for_routine(&routine);

        // (parameter, caller variable) pairs copied back after the call
        let mut outputs = Vec::new();
        for (position, arg) in exec.args.iter().enumerate() {
            let value = self.evaluate(&arg.value, ctx)?;
            let slot = match &arg.name {
                Some(name) => params.bind_named(name, value)?,
                None => params.bind_position(position, value)?,
            };
            if arg.output {
                let Expr::Variable(variable) = &arg.value else {
                    return Err(QueryError::ExecutionError(format!(
                        "OUTPUT argument for '{}' must be a variable",
                        slot.name
                    )));
                };
                if !slot.direction.is_output() {
                    return Err(QueryError::ExecutionError(format!(
                        "Parameter '{}' of '{}' is not declared OUTPUT",
                        slot.name, routine.name
                    )));
                }
                outputs.push((slot.name.clone(), variable.clone()));
            }
        }
        if let Some(status) = &exec.return_var {
            params.set_return_slot(ParamSlot::inferred_return(status, DataValue::Integer(0)));
        }

        info!("EXEC {} ({} argument(s))", routine.name, exec.args.len());
        let mut callee = ExecutionContext::routine(BodyKind::Procedure, &routine.name, params);
        {
            let _depth = self.enter_routine(&routine.name)?;
            self.run_body(&routine.body, &mut callee)?;
        }

        let params = ctx.absorb(callee)?;
        for (param, variable) in outputs {
            ctx.set_variable(&variable, params.lookup(&param).unwrap_or(DataValue::Null))?;
        }
        if let Some(status) = &exec.return_var {
            ctx.set_variable(status, params.return_value())?;
        }
        Ok(())
    }
}

impl FunctionInvoker for ExecutionEngine {
    fn invoke(&self, name: &str, args: Vec<DataValue>) -> QueryResult<DataValue> {
        let routine = self.routine(ObjectKind::Function, name)?;
        let mut params = ParameterMap::for_routine(&routine);
        params.bind_all(args)?;

        let _depth = self.enter_routine(&routine.name)?;
        debug!("calling function {} at depth {}", routine.name, self.depth.get());
        let mut ctx = ExecutionContext::routine(BodyKind::Function, &routine.name, params);
        self.run_body(&routine.body, &mut ctx)?;
        Ok(ctx.params().return_value())
    }
}
