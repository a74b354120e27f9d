use std::sync::Arc;

use anyhow::Result;

use bayunql::catalog::{DataType, ObjectDef, ObjectKind, ParamDef, RoutineDef, ViewDef};
use bayunql::query::ast::{BinaryOp, Expr, SelectStatement, StatementKind, TableExpr};
use bayunql::storage::Database;
use bayunql::{DataValue, EngineConfig, ErrorKind, ExecutionEngine};

#[path = "../common/mod.rs"]
mod common;

use common::{create_int_table, stmt, RecordingDatabase};

fn answer(value: i64) -> ObjectDef {
    let body = vec![stmt(StatementKind::Return(Some(Expr::int(value))))];
    ObjectDef::Function(RoutineDef::new("answer", vec![], Some(DataType::Integer), body))
}

fn setup() -> Result<(Arc<RecordingDatabase>, ExecutionEngine)> {
    let db = RecordingDatabase::new();
    let engine = ExecutionEngine::new(db.clone(), EngineConfig::default());
    engine.run(vec![stmt(StatementKind::Create(answer(1)))])?;
    Ok((db, engine))
}

fn call_answer(engine: &ExecutionEngine) -> Result<Vec<String>> {
    let outcome = engine.run(vec![stmt(StatementKind::Print(Expr::call("answer", vec![])))])?;
    Ok(outcome.messages)
}

#[test]
fn test_alter_outside_transaction_commits() -> Result<()> {
    let (db, engine) = setup()?;
    assert_eq!(db.counts(), (0, 0, 0));

    let outcome = engine.run(vec![stmt(StatementKind::Alter(answer(2)))])?;
    assert_eq!(outcome.messages, vec!["Function 'answer' altered."]);
    assert_eq!(db.counts(), (1, 1, 0));
    assert_eq!(db.nested_transaction_level(), 0);
    assert_eq!(call_answer(&engine)?, vec!["2"]);
    Ok(())
}

#[test]
fn test_failed_alter_outside_transaction_rolls_back() -> Result<()> {
    let (db, engine) = setup()?;
    db.fail_next_creates(1);

    let err = engine.run(vec![stmt(StatementKind::Alter(answer(2)))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(err.to_string().contains("injected failure"));
    assert_eq!(db.counts(), (1, 0, 1));
    assert_eq!(db.nested_transaction_level(), 0);
    assert_eq!(call_answer(&engine)?, vec!["1"]);
    Ok(())
}

#[test]
fn test_failed_alter_inside_transaction_restores_original() -> Result<()> {
    let (db, engine) = setup()?;
    engine.run(vec![stmt(StatementKind::BeginTransaction)])?;
    db.fail_next_creates(1);

    let err = engine.run(vec![stmt(StatementKind::Alter(answer(2)))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    // no transaction demarcation of its own inside the caller's transaction
    assert_eq!(db.counts(), (1, 0, 0));
    assert_eq!(db.nested_transaction_level(), 1);
    assert_eq!(call_answer(&engine)?, vec!["1"]);

    engine.run(vec![stmt(StatementKind::CommitTransaction)])?;
    assert_eq!(db.nested_transaction_level(), 0);
    Ok(())
}

#[test]
fn test_alter_inside_transaction_is_undone_by_rollback() -> Result<()> {
    let (db, engine) = setup()?;
    engine.run(vec![
        stmt(StatementKind::BeginTransaction),
        stmt(StatementKind::Alter(answer(3))),
    ])?;
    assert_eq!(call_answer(&engine)?, vec!["3"]);

    engine.run(vec![stmt(StatementKind::RollbackTransaction)])?;
    assert_eq!(db.counts(), (1, 0, 1));
    assert_eq!(call_answer(&engine)?, vec!["1"]);
    Ok(())
}

#[test]
fn test_alter_rejections() -> Result<()> {
    let (db, engine) = setup()?;

    let missing = ObjectDef::Procedure(RoutineDef::new("nope", vec![], None, vec![]));
    let err = engine.run(vec![stmt(StatementKind::Alter(missing))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);

    create_int_table(&engine, "t", &[])?;
    let table = db.get_object(ObjectKind::Table, "t").ok_or_else(|| anyhow::anyhow!("table t missing"))?;
    let err = engine.run(vec![stmt(StatementKind::Alter(table))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);

    let err = engine
        .run(vec![stmt(StatementKind::AlterIndexRebuild { name: "ix".into() })])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);

    // a definition that fails validation leaves the original in place
    let invalid = ObjectDef::Function(RoutineDef::new(
        "answer",
        vec![ParamDef::input("@a", DataType::Integer), ParamDef::input("@A", DataType::Integer)],
        Some(DataType::Integer),
        vec![],
    ));
    assert!(engine.run(vec![stmt(StatementKind::Alter(invalid))]).is_err());
    assert_eq!(call_answer(&engine)?, vec!["1"]);
    Ok(())
}

#[test]
fn test_alter_view_changes_its_query() -> Result<()> {
    let (_db, engine) = setup()?;
    create_int_table(&engine, "t", &[1, 2, 3])?;
    let view = |limit: i64| {
        ObjectDef::View(ViewDef {
            name: "v".into(),
            query: SelectStatement::star(TableExpr::table("t")).filter(Expr::binary(
                Expr::col("x"),
                BinaryOp::GreaterThan,
                Expr::int(limit),
            )),
        })
    };
    engine.run(vec![stmt(StatementKind::Create(view(2)))])?;
    let select = || stmt(StatementKind::Select(SelectStatement::star(TableExpr::table("v"))));

    let before = engine.run(vec![select()])?;
    assert_eq!(before.results[0].row_count(), 1);

    engine.run(vec![stmt(StatementKind::Alter(view(0)))])?;
    let after = engine.run(vec![select()])?;
    assert_eq!(after.results[0].row_count(), 3);
    Ok(())
}

#[test]
fn test_drop_and_drop_if_exists() -> Result<()> {
    let (db, engine) = setup()?;
    let drop_answer = |if_exists| stmt(StatementKind::Drop { kind: ObjectKind::Function, name: "answer".into(), if_exists });

    let outcome = engine.run(vec![drop_answer(false)])?;
    assert_eq!(outcome.messages, vec!["Function 'answer' dropped."]);
    assert!(!db.object_exists(ObjectKind::Function, "answer"));

    let err = engine.run(vec![drop_answer(false)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
    let outcome = engine.run(vec![drop_answer(true)])?;
    assert!(outcome.messages.is_empty());
    Ok(())
}

#[test]
fn test_rollback_undoes_create_and_insert() -> Result<()> {
    let (db, engine) = setup()?;
    engine.run(vec![stmt(StatementKind::BeginTransaction)])?;
    create_int_table(&engine, "scratch", &[7, 8])?;
    let rows = engine.run(vec![stmt(StatementKind::Select(SelectStatement::star(TableExpr::table("scratch"))))])?;
    assert_eq!(rows.results[0].to_values(), vec![vec![DataValue::Integer(7)], vec![DataValue::Integer(8)]]);

    engine.run(vec![stmt(StatementKind::RollbackTransaction)])?;
    assert!(!db.object_exists(ObjectKind::Table, "scratch"));
    assert!(db.object_exists(ObjectKind::Function, "answer"));
    Ok(())
}
