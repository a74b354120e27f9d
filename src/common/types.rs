use serde::{Deserialize, Serialize};

/// Position of a table source inside a `TableCollection`
pub type TableIndex = usize;

/// Position of a row inside an opened table source
pub type RowPos = usize;

/// Identity of the current combination produced by a RowSet: one
/// `(table, row)` pair per available leaf, in binding order.
pub type RowKey = Vec<(TableIndex, RowPos)>;

/// Source position of a statement, attached to errors for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourcePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
