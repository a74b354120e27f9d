use anyhow::Result;

use bayunql::catalog::{DataType, ObjectDef, ParamDef, RoutineDef};
use bayunql::query::ast::{
    BinaryOp, ExecArg, ExecStatement, Expr, SelectItem, SelectStatement, Statement, StatementKind, TableExpr,
};
use bayunql::{DataValue, ErrorKind, ExecutionEngine};

#[path = "../common/mod.rs"]
mod common;

use common::{create_int_table, engine, stmt};

fn create_function(engine: &ExecutionEngine, name: &str, params: Vec<ParamDef>, body: Vec<Statement>) -> Result<()> {
    let def = RoutineDef::new(name, params, Some(DataType::Integer), body);
    engine.run(vec![stmt(StatementKind::Create(ObjectDef::Function(def)))])?;
    Ok(())
}

fn create_procedure(engine: &ExecutionEngine, name: &str, params: Vec<ParamDef>, body: Vec<Statement>) -> Result<()> {
    let def = RoutineDef::new(name, params, None, body);
    engine.run(vec![stmt(StatementKind::Create(ObjectDef::Procedure(def)))])?;
    Ok(())
}

fn exec(procedure: &str, args: Vec<ExecArg>) -> Statement {
    stmt(StatementKind::Exec(ExecStatement { return_var: None, procedure: procedure.into(), args }))
}

fn declare(name: &str, initial: Option<i64>) -> Statement {
    stmt(StatementKind::Declare {
        name: name.into(),
        data_type: Some(DataType::Integer),
        initial: initial.map(Expr::int),
    })
}

/// `dbl(@n) = @n * 2`
fn create_dbl(engine: &ExecutionEngine) -> Result<()> {
    let body = vec![stmt(StatementKind::Return(Some(Expr::binary(
        Expr::var("@n"),
        BinaryOp::Multiply,
        Expr::int(2),
    ))))];
    create_function(engine, "dbl", vec![ParamDef::input("@n", DataType::Integer)], body)
}

#[test]
fn test_function_in_select_list_and_where() -> Result<()> {
    let engine = engine();
    create_dbl(&engine)?;
    create_int_table(&engine, "t", &[1, 2, 3, 4])?;

    let select = SelectStatement::exprs(
        vec![Expr::col("x"), Expr::call("DBL", vec![Expr::col("x")])],
        Some(TableExpr::table("t")),
    )
    .filter(Expr::binary(
        Expr::call("dbl", vec![Expr::col("x")]),
        BinaryOp::GreaterThan,
        Expr::int(4),
    ));
    let outcome = engine.run(vec![stmt(StatementKind::Select(select))])?;
    let result = &outcome.results[0];
    assert_eq!(result.columns(), ["x", "dbl"]);
    assert_eq!(
        result.to_values(),
        vec![
            vec![DataValue::Integer(3), DataValue::Integer(6)],
            vec![DataValue::Integer(4), DataValue::Integer(8)],
        ]
    );
    Ok(())
}

#[test]
fn test_builtin_wins_over_user_function() -> Result<()> {
    let engine = engine();
    create_function(&engine, "abs", vec![], vec![stmt(StatementKind::Return(Some(Expr::int(99))))])?;
    let outcome = engine.run(vec![stmt(StatementKind::Print(Expr::call("abs", vec![Expr::int(-5)])))])?;
    assert_eq!(outcome.messages, vec!["5"]);
    Ok(())
}

#[test]
fn test_function_without_return_yields_null() -> Result<()> {
    let engine = engine();
    create_function(&engine, "nothing", vec![], vec![declare("@unused", Some(1))])?;
    let outcome = engine.run(vec![stmt(StatementKind::Print(Expr::call("nothing", vec![])))])?;
    assert_eq!(outcome.messages, vec!["NULL"]);
    Ok(())
}

#[test]
fn test_function_result_set_is_invalid_shape() -> Result<()> {
    let engine = engine();
    create_int_table(&engine, "t", &[1])?;
    let select = stmt(StatementKind::Select(SelectStatement::star(TableExpr::table("t"))));
    create_function(&engine, "selects", vec![], vec![select.clone(), stmt(StatementKind::Return(Some(Expr::int(1))))])?;

    let err = engine
        .run(vec![stmt(StatementKind::Print(Expr::call("selects", vec![])))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReturnShape);

    // a procedure's result set surfacing inside a function is rejected the same way
    create_procedure(&engine, "p_select", vec![], vec![select])?;
    create_function(
        &engine,
        "via_proc",
        vec![],
        vec![exec("p_select", vec![]), stmt(StatementKind::Return(Some(Expr::int(1))))],
    )?;
    let err = engine
        .run(vec![stmt(StatementKind::Print(Expr::call("via_proc", vec![])))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReturnShape);
    Ok(())
}

#[test]
fn test_function_cannot_see_caller_variables() -> Result<()> {
    let engine = engine();
    create_function(&engine, "peek", vec![], vec![stmt(StatementKind::Return(Some(Expr::var("@outer"))))])?;
    let err = engine
        .run(vec![declare("@outer", Some(1)), stmt(StatementKind::Print(Expr::call("peek", vec![])))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VariableNotFound);
    Ok(())
}

#[test]
fn test_procedure_results_surface_to_caller() -> Result<()> {
    let engine = engine();
    create_int_table(&engine, "t", &[10, 20])?;
    let body = vec![
        stmt(StatementKind::Print(Expr::text("listing"))),
        stmt(StatementKind::Select(SelectStatement::star(TableExpr::table("t")))),
    ];
    create_procedure(&engine, "list_t", vec![], body)?;

    let outcome = engine.run(vec![exec("list_t", vec![]), exec("LIST_T", vec![])])?;
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.results[1].row_count(), 2);
    assert_eq!(outcome.messages, vec!["listing", "listing"]);
    Ok(())
}

#[test]
fn test_output_parameters_copy_back() -> Result<()> {
    let engine = engine();
    let body = vec![
        stmt(StatementKind::Set {
            name: "@total".into(),
            value: Expr::binary(Expr::var("@a"), BinaryOp::Add, Expr::var("@b")),
        }),
        stmt(StatementKind::Set {
            name: "@counter".into(),
            value: Expr::binary(Expr::var("@counter"), BinaryOp::Add, Expr::int(1)),
        }),
    ];
    let params = vec![
        ParamDef::input("@a", DataType::Integer),
        ParamDef::input("@b", DataType::Integer),
        ParamDef::output("@total", DataType::Integer),
        ParamDef::in_out("@counter", DataType::Integer),
    ];
    create_procedure(&engine, "add", params, body)?;

    let outcome = engine.run(vec![
        declare("@sum", None),
        declare("@n", Some(41)),
        exec(
            "add",
            vec![ExecArg::value(Expr::int(2)), ExecArg::value(Expr::int(3)), ExecArg::output("@sum"), ExecArg::output("@n")],
        ),
        stmt(StatementKind::Print(Expr::var("@sum"))),
        stmt(StatementKind::Print(Expr::var("@n"))),
    ])?;
    assert_eq!(outcome.messages, vec!["5", "42"]);
    Ok(())
}

#[test]
fn test_output_argument_without_marker_is_not_copied() -> Result<()> {
    let engine = engine();
    let body = vec![stmt(StatementKind::Set { name: "@out".into(), value: Expr::int(9) })];
    create_procedure(&engine, "set_out", vec![ParamDef::output("@out", DataType::Integer)], body)?;

    let outcome = engine.run(vec![
        declare("@v", Some(1)),
        exec("set_out", vec![ExecArg::value(Expr::var("@v"))]),
        stmt(StatementKind::Print(Expr::var("@v"))),
    ])?;
    assert_eq!(outcome.messages, vec!["1"]);
    Ok(())
}

#[test]
fn test_return_status_capture() -> Result<()> {
    let engine = engine();
    create_procedure(&engine, "five", vec![], vec![stmt(StatementKind::Return(Some(Expr::int(5))))])?;
    create_procedure(&engine, "silent", vec![], vec![])?;

    let call = |procedure: &str| {
        stmt(StatementKind::Exec(ExecStatement {
            return_var: Some("@rc".into()),
            procedure: procedure.into(),
            args: vec![],
        }))
    };
    let outcome = engine.run(vec![
        declare("@rc", Some(-1)),
        call("five"),
        stmt(StatementKind::Print(Expr::var("@rc"))),
        call("silent"),
        stmt(StatementKind::Print(Expr::var("@rc"))),
    ])?;
    assert_eq!(outcome.messages, vec!["5", "0"]);
    Ok(())
}

#[test]
fn test_argument_binding() -> Result<()> {
    let engine = engine();
    let body = vec![stmt(StatementKind::Print(Expr::binary(
        Expr::var("@first"),
        BinaryOp::Concat,
        Expr::var("@second"),
    )))];
    let params = vec![ParamDef::input("@first", DataType::Text), ParamDef::input("@second", DataType::Text)];
    create_procedure(&engine, "pair", params, body)?;

    let outcome = engine.run(vec![exec(
        "pair",
        vec![ExecArg::named("@second", Expr::text("b")), ExecArg::named("@FIRST", Expr::text("a"))],
    )])?;
    assert_eq!(outcome.messages, vec!["ab"]);

    let err = engine
        .run(vec![exec(
            "pair",
            vec![ExecArg::value(Expr::text("a")), ExecArg::value(Expr::text("b")), ExecArg::value(Expr::text("c"))],
        )])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let err = engine
        .run(vec![exec("pair", vec![ExecArg::named("@third", Expr::text("c"))])])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Execution);

    let err = engine.run(vec![exec("missing", vec![])]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ObjectNotFound);
    Ok(())
}

#[test]
fn test_nested_procedure_calls() -> Result<()> {
    let engine = engine();
    create_dbl(&engine)?;
    create_procedure(
        &engine,
        "inner_proc",
        vec![ParamDef::in_out("@v", DataType::Integer)],
        vec![stmt(StatementKind::Set { name: "@v".into(), value: Expr::call("dbl", vec![Expr::var("@v")]) })],
    )?;
    create_procedure(
        &engine,
        "outer_proc",
        vec![ParamDef::in_out("@v", DataType::Integer)],
        vec![exec("inner_proc", vec![ExecArg::output("@v")]), exec("inner_proc", vec![ExecArg::output("@v")])],
    )?;

    let select = SelectStatement {
        columns: vec![SelectItem::Expr { expr: Expr::var("@v"), alias: Some("result".into()) }],
        from: None,
        where_clause: None,
    };
    let outcome = engine.run(vec![
        declare("@v", Some(3)),
        exec("outer_proc", vec![ExecArg::output("@v")]),
        stmt(StatementKind::Select(select)),
    ])?;
    assert_eq!(outcome.results[0].columns(), ["result"]);
    assert_eq!(outcome.results[0].to_values(), vec![vec![DataValue::Integer(12)]]);
    Ok(())
}
