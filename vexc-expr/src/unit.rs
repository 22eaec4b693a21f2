use rustc_hash::FxHashSet;

use crate::expr::ExprId;

/// One table scanned by an execution unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputTable {
    pub db_id: i32,
    pub table_id: i32,
}

/// What the planner hands to the compiler for one step of a query.
///
/// `simple_quals` are single-column predicates the storage layer may also use
/// for fragment skipping; `quals` are general predicates. Both are ANDed.
/// `hoisted` lists quals already evaluated elsewhere (for example while
/// building a join hash table) that must not be compiled again.
#[derive(Clone, Debug, Default)]
pub struct ExecutionUnit {
    pub input_tables: Vec<InputTable>,
    pub simple_quals: Vec<ExprId>,
    pub quals: Vec<ExprId>,
    pub groupby_exprs: Vec<ExprId>,
    pub target_exprs: Vec<ExprId>,
    pub hoisted: FxHashSet<ExprId>,
}

impl ExecutionUnit {
    pub fn is_group_by(&self) -> bool {
        !self.groupby_exprs.is_empty()
    }

    /// Every qual, simple ones first.
    pub fn all_quals(&self) -> impl Iterator<Item = ExprId> + '_ {
        self.simple_quals.iter().chain(self.quals.iter()).copied()
    }
}
