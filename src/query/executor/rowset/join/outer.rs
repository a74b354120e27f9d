// Full Outer Join Implementation
//
// Runs as a left join while remembering which right combinations matched.
// Once the left side is exhausted it is marked not available and the right
// side is scanned again, reporting every combination that never matched.

use std::collections::HashSet;

use log::debug;

use crate::common::{RowKey, TableIndex};
use crate::query::ast::Expr;
use crate::query::executor::result::{QueryResult, Row};
use crate::query::executor::rowset::{BoundColumn, Constraints, Padding, RowSet, TableBinder};
use crate::query::executor::table_collection::TableCollection;
use super::{join_core_methods, JoinCore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Left-driven matching, padding unmatched left rows
    Matching,
    /// Reporting right rows that never matched
    Draining,
    Done,
}

pub struct OuterJoin {
    core: JoinCore,
    phase: Phase,
    matched: HashSet<RowKey>,
}

impl OuterJoin {
    pub fn new(left: Box<dyn RowSet>, right: Box<dyn RowSet>, condition: Option<Expr>) -> Self {
        OuterJoin {
            core: JoinCore::new(left, right, condition),
            phase: Phase::Done,
            matched: HashSet::new(),
        }
    }

    fn seek(&mut self, tables: &TableCollection, c: &Constraints<'_>, mut restart: bool) -> QueryResult<bool> {
        loop {
            if self.core.seek_right(tables, c, restart)? {
                self.matched.insert(self.core.right.row_key());
                self.core.left.clear_updated();
                self.core.updated = true;
                return Ok(true);
            }
            if self.core.left.row_updated() {
                self.core.right.mark_row_not_available()?;
                self.core.left.clear_updated();
                self.core.updated = true;
                return Ok(true);
            }
            if !self.core.left.next(tables, c)? {
                return self.start_drain(tables, c);
            }
            restart = true;
        }
    }

    fn start_drain(&mut self, tables: &TableCollection, c: &Constraints<'_>) -> QueryResult<bool> {
        debug!("full outer join: draining right side ({} matched)", self.matched.len());
        self.phase = Phase::Draining;
        self.core.left.mark_row_not_available()?;
        let found = self.core.right.execute_rowset(tables, c)?;
        self.drain(tables, c, found)
    }

    fn drain(&mut self, tables: &TableCollection, c: &Constraints<'_>, mut found: bool) -> QueryResult<bool> {
        while found {
            if !self.matched.contains(&self.core.right.row_key()) {
                self.core.updated = true;
                return Ok(true);
            }
            found = self.core.right.next(tables, c)?;
        }
        self.phase = Phase::Done;
        Ok(false)
    }
}

impl RowSet for OuterJoin {
    join_core_methods!();

    /// Either side may be absent
    fn prepare_tables(
        &mut self,
        binder: &mut dyn TableBinder,
        tables: &mut TableCollection,
        _always_allow_null: bool,
        table_index: &mut TableIndex,
    ) -> QueryResult<()> {
        self.core.prepare_tables(binder, tables, true, true, table_index)
    }

    fn execute_rowset(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        self.matched.clear();
        self.phase = Phase::Matching;
        if self.core.left.execute_rowset(tables, constraints)? {
            self.seek(tables, constraints, true)
        } else {
            self.start_drain(tables, constraints)
        }
    }

    fn next(&mut self, tables: &TableCollection, constraints: &Constraints<'_>) -> QueryResult<bool> {
        match self.phase {
            Phase::Matching => self.seek(tables, constraints, false),
            Phase::Draining => {
                let found = self.core.right.next(tables, constraints)?;
                self.drain(tables, constraints, found)
            }
            Phase::Done => Ok(false),
        }
    }

    fn shape(&self) -> String {
        self.core.shape("full")
    }
}
