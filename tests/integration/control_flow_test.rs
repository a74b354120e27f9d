use std::sync::Arc;

use anyhow::Result;

use bayunql::catalog::{DataType, ObjectDef, RoutineDef};
use bayunql::common::SourcePos;
use bayunql::query::ast::{BinaryOp, ExecStatement, Expr, Statement, StatementKind};
use bayunql::storage::MemoryDatabase;
use bayunql::{Batch, BatchBuilder, DataValue, EngineConfig, ErrorKind, ExecutionEngine};

#[path = "../common/mod.rs"]
mod common;

use common::{engine, stmt};

fn declare(name: &str, value: i64) -> StatementKind {
    StatementKind::Declare { name: name.into(), data_type: Some(DataType::Integer), initial: Some(Expr::int(value)) }
}

fn increment(name: &str) -> StatementKind {
    StatementKind::Set {
        name: name.into(),
        value: Expr::binary(Expr::var(name), BinaryOp::Add, Expr::int(1)),
    }
}

fn less_than(name: &str, limit: i64) -> Expr {
    Expr::binary(Expr::var(name), BinaryOp::LessThan, Expr::int(limit))
}

#[test]
fn test_break_terminates_loop_immediately() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.push(declare("@i", 0))?;
    builder.begin_while(less_than("@i", 10));
    builder.push(increment("@i"))?;
    builder.begin_if(Expr::eq(Expr::var("@i"), Expr::int(3)));
    builder.brk()?;
    builder.end()?;
    builder.push(StatementKind::Print(Expr::var("@i")))?;
    builder.end()?;
    builder.push(StatementKind::Print(Expr::binary(Expr::text("done at "), BinaryOp::Concat, Expr::var("@i"))))?;
    let mut batch = builder.finish()?;

    let engine = engine();
    batch.prepare(engine.database().as_ref())?;
    let outcome = engine.execute_batch(&mut batch)?;
    assert_eq!(outcome.messages, vec!["1", "2", "done at 3"]);
    Ok(())
}

#[test]
fn test_continue_skips_rest_of_iteration() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.push(declare("@i", 0))?;
    builder.begin_while(less_than("@i", 6));
    builder.push(increment("@i"))?;
    builder.begin_if(Expr::eq(
        Expr::binary(Expr::var("@i"), BinaryOp::Modulo, Expr::int(2)),
        Expr::int(0),
    ));
    builder.cont()?;
    builder.end()?;
    builder.push(StatementKind::Print(Expr::var("@i")))?;
    builder.end()?;

    let engine = engine();
    let outcome = engine.run(builder.finish()?.statements().to_vec())?;
    assert_eq!(outcome.messages, vec!["1", "3", "5"]);
    Ok(())
}

#[test]
fn test_break_outside_loop_is_misuse() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.at(7, 3);
    let err = builder.brk().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ControlFlowMisuse);
    assert_eq!(err.position(), Some(SourcePos::new(7, 3)));

    // hand-built trees skip the builder; the interpreter still rejects them
    let engine = engine();
    let err = engine
        .run(vec![
            stmt(StatementKind::Print(Expr::int(1))),
            Statement::new(
                SourcePos::new(2, 1),
                StatementKind::If {
                    condition: Expr::lit(DataValue::Boolean(true)),
                    then_branch: Box::new(Statement::new(SourcePos::new(3, 5), StatementKind::Continue)),
                    else_branch: None,
                },
            ),
        ])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ControlFlowMisuse);
    assert_eq!(err.position(), Some(SourcePos::new(2, 1)));
    Ok(())
}

#[test]
fn test_return_skips_rest_of_batch_only() -> Result<()> {
    let engine = engine();
    let body = vec![
        stmt(StatementKind::Print(Expr::text("in proc"))),
        stmt(StatementKind::Return(None)),
        stmt(StatementKind::Print(Expr::text("unreachable"))),
    ];
    engine.run(vec![stmt(StatementKind::Create(ObjectDef::Procedure(RoutineDef::new("p", vec![], None, body))))])?;

    let exec = StatementKind::Exec(ExecStatement { return_var: None, procedure: "p".into(), args: vec![] });
    let outcome = engine.run(vec![
        stmt(exec),
        stmt(StatementKind::Print(Expr::text("after exec"))),
        stmt(StatementKind::Return(Some(Expr::int(1)))),
        stmt(StatementKind::Print(Expr::text("after return"))),
    ])?;
    assert_eq!(outcome.messages, vec!["in proc", "after exec"]);
    Ok(())
}

#[test]
fn test_return_inside_loop_leaves_body() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.push(declare("@i", 0))?;
    builder.begin_while(Expr::lit(DataValue::Boolean(true)));
    builder.push(increment("@i"))?;
    builder.begin_if(Expr::binary(Expr::var("@i"), BinaryOp::GreaterEquals, Expr::int(2)));
    builder.push(StatementKind::Return(None))?;
    builder.end()?;
    builder.end()?;
    builder.push(StatementKind::Print(Expr::text("unreachable")))?;

    let outcome = engine().run(builder.finish()?.statements().to_vec())?;
    assert!(outcome.messages.is_empty());
    Ok(())
}

#[test]
fn test_if_else_and_null_condition() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.begin_if(Expr::eq(Expr::null(), Expr::null()));
    builder.push(StatementKind::Print(Expr::text("then")))?;
    builder.begin_else()?;
    builder.push(StatementKind::Print(Expr::text("else")))?;
    builder.end()?;

    let outcome = engine().run(builder.finish()?.statements().to_vec())?;
    assert_eq!(outcome.messages, vec!["else"]);
    Ok(())
}

#[test]
fn test_loop_iteration_cap() -> Result<()> {
    let config = EngineConfig { max_loop_iterations: Some(100), ..EngineConfig::default() };
    let engine = ExecutionEngine::new(Arc::new(MemoryDatabase::new()), config);
    let looping = stmt(StatementKind::While {
        condition: Expr::lit(DataValue::Boolean(true)),
        body: Box::new(stmt(StatementKind::Block(vec![]))),
    });
    let err = engine.run(vec![looping]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let mut batch = Batch::new(vec![stmt(declare("@i", 0))]);
    assert!(engine.execute_batch(&mut batch).is_err());
    Ok(())
}
