// Control Flow Execution
//
// BREAK, CONTINUE and RETURN travel up the interpreter as `Flow` values.
// WHILE consumes BREAK and CONTINUE; a batch or routine body consumes
// RETURN and treats a loop signal that reaches it as misuse.

use log::{debug, trace};

use crate::query::ast::{Expr, Statement};
use crate::query::executor::context::ExecutionContext;
use crate::query::executor::engine::ExecutionEngine;
use crate::query::executor::result::{QueryError, QueryResult};

/// Outcome of executing one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    /// Leave the nearest enclosing loop
    Break,
    /// Re-test the nearest enclosing loop's condition
    Continue,
    /// Leave the current batch or routine body
    Return,
}

impl ExecutionEngine {
    /// Run a batch or routine body to completion or RETURN
    pub(crate) fn run_body(&self, body: &[Statement], ctx: &mut ExecutionContext) -> QueryResult<()> {
        for statement in body {
            match self.execute_statement(statement, ctx)? {
                Flow::Normal => {}
                Flow::Return => {
                    debug!("RETURN ends {:?} body", ctx.kind());
                    break;
                }
                flow @ (Flow::Break | Flow::Continue) => {
                    let keyword = if flow == Flow::Break { "BREAK" } else { "CONTINUE" };
                    return Err(QueryError::ControlFlowMisuse(format!("{} outside a loop", keyword))
                        .at(statement.pos));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn execute_block(&self, statements: &[Statement], ctx: &mut ExecutionContext) -> QueryResult<Flow> {
        for statement in statements {
            let flow = self.execute_statement(statement, ctx)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn execute_if(
        &self,
        condition: &Expr,
        then_branch: &Statement,
        else_branch: Option<&Statement>,
        ctx: &mut ExecutionContext,
    ) -> QueryResult<Flow> {
        if self.evaluate(condition, ctx)?.is_true() {
            self.execute_statement(then_branch, ctx)
        } else if let Some(else_branch) = else_branch {
            self.execute_statement(else_branch, ctx)
        } else {
            Ok(Flow::Normal)
        }
    }

    pub(crate) fn execute_while(&self, condition: &Expr, body: &Statement, ctx: &mut ExecutionContext) -> QueryResult<Flow> {
        let mut iterations: u64 = 0;
        while self.evaluate(condition, ctx)?.is_true() {
            iterations += 1;
            if let Some(max) = self.config().max_loop_iterations {
                if iterations > max {
                    return Err(QueryError::ExecutionError(format!(
                        "WHILE loop exceeded {} iterations",
                        max
                    )));
                }
            }
            match self.execute_statement(body, ctx)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => break,
                Flow::Return => return Ok(Flow::Return),
            }
        }
        trace!("WHILE finished after {} iteration(s)", iterations);
        Ok(Flow::Normal)
    }

    /// Store the return value when the body has a return slot, then unwind
    pub(crate) fn execute_return(&self, value: Option<&Expr>, ctx: &mut ExecutionContext) -> QueryResult<Flow> {
        if let Some(expr) = value {
            if ctx.params().has_return_slot() {
                let value = self.evaluate(expr, ctx)?;
                if let Some(slot) = ctx.params_mut().return_slot_mut() {
                    slot.store(value)?;
                }
            }
        }
        Ok(Flow::Return)
    }
}
