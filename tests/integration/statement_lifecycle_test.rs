use anyhow::Result;

use bayunql::catalog::{Column, DataType, ObjectDef, RoutineDef, TableDef};
use bayunql::common::SourcePos;
use bayunql::query::ast::{
    BinaryOp, ExecStatement, Expr, InsertStatement, JoinKind, SelectItem, SelectStatement, Statement, StatementKind,
    TableExpr,
};
use bayunql::query::executor::Phase;
use bayunql::{Batch, BatchBuilder, DataValue, ErrorKind, ResultShape};

#[path = "../common/mod.rs"]
mod common;

use common::{create_int_table, engine, ints, stmt};

fn at(line: u32, column: u32, kind: StatementKind) -> Statement {
    Statement::new(SourcePos::new(line, column), kind)
}

#[test]
fn test_prepare_reports_shapes() -> Result<()> {
    let engine = engine();
    create_int_table(&engine, "a", &[1])?;
    create_int_table(&engine, "b", &[1])?;
    let proc_def = RoutineDef::new("p", vec![], None, vec![]);
    engine.run(vec![stmt(StatementKind::Create(ObjectDef::Procedure(proc_def)))])?;

    let join = TableExpr::table("a").join(
        JoinKind::Left,
        TableExpr::table("b"),
        Some(Expr::eq(Expr::qcol("a", "x"), Expr::qcol("b", "x"))),
    );
    let select_join = SelectStatement {
        columns: vec![
            SelectItem::Wildcard,
            SelectItem::Expr { expr: Expr::int(1), alias: None },
            SelectItem::Expr { expr: Expr::var("@v"), alias: None },
        ],
        from: Some(join),
        where_clause: None,
    };
    let looping_select = StatementKind::While {
        condition: Expr::lit(DataValue::Boolean(false)),
        body: Box::new(stmt(StatementKind::Select(SelectStatement::star(TableExpr::table("a"))))),
    };
    let mut batch = Batch::new(vec![
        stmt(StatementKind::Declare { name: "@v".into(), data_type: None, initial: None }),
        stmt(StatementKind::Select(select_join)),
        stmt(StatementKind::Exec(ExecStatement { return_var: None, procedure: "p".into(), args: vec![] })),
        stmt(looping_select),
        stmt(StatementKind::Print(Expr::binary(Expr::text("v"), BinaryOp::Concat, Expr::int(2)))),
    ]);
    assert_eq!(batch.phase(), Phase::Parsed);

    let shapes = batch.prepare(engine.database().as_ref())?.to_vec();
    assert_eq!(
        shapes,
        vec![
            ResultShape::NoResult,
            ResultShape::Tabular(vec!["a.x".into(), "b.x".into(), "column2".into(), "v".into()]),
            ResultShape::Dynamic,
            ResultShape::Dynamic,
            ResultShape::NoResult,
        ]
    );
    assert_eq!(batch.shapes(), shapes.as_slice());
    assert_eq!(batch.statements()[4].kind, StatementKind::Print(Expr::text("v2")));

    let outcome = engine.execute_batch(&mut batch)?;
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].columns(), ["a.x", "b.x", "column2", "v"]);
    assert_eq!(outcome.messages, vec!["v2"]);
    assert_eq!(batch.phase(), Phase::Executed);
    Ok(())
}

#[test]
fn test_batch_lifecycle_is_single_use() -> Result<()> {
    let engine = engine();
    let mut batch = Batch::new(vec![stmt(StatementKind::Print(Expr::int(1)))]);

    let err = engine.execute_batch(&mut batch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    batch.prepare(engine.database().as_ref())?;
    let err = batch.prepare(engine.database().as_ref()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    assert_eq!(engine.execute_batch(&mut batch)?.messages, vec!["1"]);
    let err = engine.execute_batch(&mut batch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    Ok(())
}

#[test]
fn test_prepare_errors_carry_position() -> Result<()> {
    let engine = engine();
    create_int_table(&engine, "t", &[1])?;

    let missing_table = at(2, 1, StatementKind::Select(SelectStatement::star(TableExpr::table("nowhere"))));
    let err = engine.run(vec![stmt(StatementKind::Print(Expr::int(1))), missing_table]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
    assert_eq!(err.position(), Some(SourcePos::new(2, 1)));

    let missing_column = at(
        5,
        9,
        StatementKind::Select(SelectStatement::exprs(vec![Expr::col("nope")], Some(TableExpr::table("t")))),
    );
    let nested = at(4, 1, StatementKind::Block(vec![missing_column]));
    let err = engine.run(vec![nested]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ColumnNotFound);
    assert_eq!(err.position(), Some(SourcePos::new(5, 9)));
    Ok(())
}

#[test]
fn test_runtime_error_reports_innermost_statement() -> Result<()> {
    let engine = engine();
    let mut builder = BatchBuilder::new();
    builder.at(1, 1).push(StatementKind::Print(Expr::text("start")))?;
    builder.at(2, 1).begin_if(Expr::lit(DataValue::Boolean(true)));
    builder.at(3, 5).begin_block();
    builder.at(4, 9).push(StatementKind::Print(Expr::var("@undeclared")))?;
    builder.end()?.end()?;

    let mut batch = builder.finish()?;
    batch.prepare(engine.database().as_ref())?;
    let err = engine.execute_batch(&mut batch).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VariableNotFound);
    assert_eq!(err.position(), Some(SourcePos::new(4, 9)));
    assert!(err.to_string().contains("line 4, column 9"));
    Ok(())
}

#[test]
fn test_objects_created_earlier_in_batch_resolve_at_execution() -> Result<()> {
    let engine = engine();
    let table = TableDef::new(
        "people",
        vec![Column::new("id", DataType::Integer, false), Column::new("name", DataType::Text, true)],
    );
    let insert = InsertStatement {
        table: "people".into(),
        columns: vec!["name".into(), "id".into()],
        values: vec![vec![Expr::text("ada"), Expr::int(1)], vec![Expr::null(), Expr::text("2")]],
    };
    let select = SelectStatement::exprs(vec![Expr::col("id"), Expr::col("name")], Some(TableExpr::table("people")))
        .filter(Expr::binary(Expr::col("id"), BinaryOp::GreaterEquals, Expr::int(1)));

    let mut batch = Batch::new(vec![
        stmt(StatementKind::Create(ObjectDef::Table(table))),
        stmt(StatementKind::Insert(insert)),
        stmt(StatementKind::Select(select)),
    ]);
    let shapes = batch.prepare(engine.database().as_ref())?;
    assert_eq!(shapes[2], ResultShape::Dynamic);

    let outcome = engine.execute_batch(&mut batch)?;
    assert_eq!(outcome.messages, vec!["Table 'people' created.", "(2 row(s) affected)"]);
    assert_eq!(
        outcome.results[0].to_values(),
        vec![
            vec![DataValue::Integer(1), DataValue::Text("ada".into())],
            vec![DataValue::Integer(2), DataValue::Null],
        ]
    );
    Ok(())
}

#[test]
fn test_builder_batch_end_to_end() -> Result<()> {
    let engine = engine();
    create_int_table(&engine, "nums", &[])?;

    let mut builder = BatchBuilder::new();
    builder.push(StatementKind::Declare {
        name: "@i".into(),
        data_type: Some(DataType::Integer),
        initial: Some(Expr::int(0)),
    })?;
    builder.begin_while(Expr::binary(Expr::var("@i"), BinaryOp::LessThan, Expr::int(4)));
    builder.push(StatementKind::Set {
        name: "@i".into(),
        value: Expr::binary(Expr::var("@i"), BinaryOp::Add, Expr::int(1)),
    })?;
    builder.push(StatementKind::Insert(InsertStatement {
        table: "nums".into(),
        columns: vec![],
        values: vec![vec![Expr::var("@i")]],
    }))?;
    builder.end()?;
    builder.push(StatementKind::Select(
        SelectStatement::star(TableExpr::aliased("nums", "n")).filter(Expr::binary(
            Expr::qcol("n", "x"),
            BinaryOp::GreaterThan,
            Expr::int(2),
        )),
    ))?;

    let mut batch = builder.finish()?;
    let shapes = batch.prepare(engine.database().as_ref())?;
    assert_eq!(shapes.len(), 3);
    assert_eq!(shapes[2], ResultShape::Tabular(vec!["x".into()]));

    let outcome = engine.execute_batch(&mut batch)?;
    assert_eq!(outcome.messages.len(), 4);
    assert_eq!(outcome.results[0].to_values(), vec![ints(&[Some(3)]), ints(&[Some(4)])]);
    Ok(())
}

#[test]
fn test_builder_rejects_unbalanced_scopes() -> Result<()> {
    let mut builder = BatchBuilder::new();
    builder.begin_block();
    assert!(builder.finish().is_err());

    let mut builder = BatchBuilder::new();
    assert_eq!(builder.end().unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert_eq!(builder.begin_else().unwrap_err().kind(), ErrorKind::InvalidOperation);

    let mut routine = BatchBuilder::routine();
    routine.begin_while(Expr::lit(DataValue::Boolean(true)));
    routine.brk()?;
    routine.end()?;
    assert_eq!(routine.finish_body()?.len(), 1);
    Ok(())
}
