// Statement Tree Definitions
//
// Typed command values produced by the (external) parser front end and by
// `BatchBuilder`. One variant per operation shape; the executor dispatches
// over them in a single interpreter.

use serde::{Deserialize, Serialize};

use crate::catalog::{DataType, ObjectDef, ObjectKind};
use crate::common::SourcePos;
use crate::query::executor::result::DataValue;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Concat,
    Equals,
    NotEquals,
    LessThan,
    LessEquals,
    GreaterThan,
    GreaterEquals,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Minus,
}

/// Scalar expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(DataValue),
    /// Column reference, optionally qualified by a table name or alias
    Column {
        table: Option<String>,
        name: String,
    },
    /// `@name` variable or routine parameter
    Variable(String),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    /// Scalar function call: built-in or stored user function
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn lit(value: DataValue) -> Self {
        Expr::Literal(value)
    }

    pub fn int(value: i64) -> Self {
        Expr::Literal(DataValue::Integer(value))
    }

    pub fn text(value: &str) -> Self {
        Expr::Literal(DataValue::Text(value.to_string()))
    }

    pub fn null() -> Self {
        Expr::Literal(DataValue::Null)
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn col(name: &str) -> Self {
        Expr::Column { table: None, name: name.to_string() }
    }

    pub fn qcol(table: &str, name: &str) -> Self {
        Expr::Column { table: Some(table.to_string()), name: name.to_string() }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary { left: Box::new(left), op, right: Box::new(right) }
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::binary(left, BinaryOp::Equals, right)
    }

    pub fn call(name: &str, args: Vec<Expr>) -> Self {
        Expr::Call { name: name.to_string(), args }
    }

    /// True when the expression depends on no row, variable or function
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Column { .. } | Expr::Variable(_) | Expr::Call { .. } => false,
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.is_constant(),
        }
    }

    /// Every column reference in the expression as `(qualifier, name)`
    pub fn column_refs(&self) -> Vec<(Option<&str>, &str)> {
        match self {
            Expr::Column { table, name } => vec![(table.as_deref(), name.as_str())],
            Expr::Literal(_) | Expr::Variable(_) => Vec::new(),
            Expr::Binary { left, right, .. } => {
                let mut refs = left.column_refs();
                refs.extend(right.column_refs());
                refs
            }
            Expr::Unary { expr, .. } | Expr::IsNull { expr, .. } => expr.column_refs(),
            Expr::Call { args, .. } => args.iter().flat_map(|a| a.column_refs()).collect(),
        }
    }

    /// Split a condition into its top-level AND conjuncts
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary { left, op: BinaryOp::And, right } => {
                let mut parts = left.conjuncts();
                parts.extend(right.conjuncts());
                parts
            }
            other => vec![other],
        }
    }
}

/// Kind of a join between two table expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

/// A FROM clause: a named source or a join tree over named sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableExpr {
    Table {
        name: String,
        alias: Option<String>,
    },
    Join {
        left: Box<TableExpr>,
        right: Box<TableExpr>,
        kind: JoinKind,
        condition: Option<Expr>,
    },
}

impl TableExpr {
    pub fn table(name: &str) -> Self {
        TableExpr::Table { name: name.to_string(), alias: None }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        TableExpr::Table { name: name.to_string(), alias: Some(alias.to_string()) }
    }

    pub fn join(self, kind: JoinKind, right: TableExpr, condition: Option<Expr>) -> Self {
        TableExpr::Join {
            left: Box::new(self),
            right: Box::new(right),
            kind,
            condition,
        }
    }

    /// Names of every referenced source, left to right
    pub fn source_names(&self) -> Vec<&str> {
        match self {
            TableExpr::Table { name, .. } => vec![name.as_str()],
            TableExpr::Join { left, right, .. } => {
                let mut names = left.source_names();
                names.extend(right.source_names());
                names
            }
        }
    }
}

/// Projected output of a SELECT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SelectItem {
    Wildcard,
    QualifiedWildcard(String),
    Expr { expr: Expr, alias: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    pub columns: Vec<SelectItem>,
    pub from: Option<TableExpr>,
    pub where_clause: Option<Expr>,
}

impl SelectStatement {
    pub fn star(from: TableExpr) -> Self {
        SelectStatement {
            columns: vec![SelectItem::Wildcard],
            from: Some(from),
            where_clause: None,
        }
    }

    pub fn exprs(columns: Vec<Expr>, from: Option<TableExpr>) -> Self {
        SelectStatement {
            columns: columns
                .into_iter()
                .map(|expr| SelectItem::Expr { expr, alias: None })
                .collect(),
            from,
            where_clause: None,
        }
    }

    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(condition);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertStatement {
    pub table: String,
    /// Target columns; empty means every column in declaration order
    pub columns: Vec<String>,
    pub values: Vec<Vec<Expr>>,
}

/// One argument of an EXEC call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecArg {
    /// `@param = value` binding by name; positional when `None`
    pub name: Option<String>,
    pub value: Expr,
    /// `OUTPUT` marker: the value expression must be a variable
    pub output: bool,
}

impl ExecArg {
    pub fn value(value: Expr) -> Self {
        ExecArg { name: None, value, output: false }
    }

    pub fn named(name: &str, value: Expr) -> Self {
        ExecArg { name: Some(name.to_string()), value, output: false }
    }

    pub fn output(variable: &str) -> Self {
        ExecArg { name: None, value: Expr::var(variable), output: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecStatement {
    /// `EXEC @rc = proc ...` captures the return status into `@rc`
    pub return_var: Option<String>,
    pub procedure: String,
    pub args: Vec<ExecArg>,
}

/// All statement shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementKind {
    // Control flow
    Block(Vec<Statement>),
    If {
        condition: Expr,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    While {
        condition: Expr,
        body: Box<Statement>,
    },
    Break,
    Continue,
    Return(Option<Expr>),

    // Variables
    Declare {
        name: String,
        data_type: Option<DataType>,
        initial: Option<Expr>,
    },
    Set {
        name: String,
        value: Expr,
    },
    Print(Expr),

    // DML
    Select(SelectStatement),
    Insert(InsertStatement),

    // Transactions
    BeginTransaction,
    CommitTransaction,
    RollbackTransaction,

    // DDL
    Create(ObjectDef),
    Alter(ObjectDef),
    Drop {
        kind: ObjectKind,
        name: String,
        if_exists: bool,
    },
    AlterIndexRebuild {
        name: String,
    },

    // Routines
    Exec(ExecStatement),
}

/// A statement with its source position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub pos: SourcePos,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(pos: SourcePos, kind: StatementKind) -> Self {
        Statement { pos, kind }
    }

    /// Statement at an unknown position, handy for hand-built trees
    pub fn bare(kind: StatementKind) -> Self {
        Statement { pos: SourcePos::default(), kind }
    }
}
