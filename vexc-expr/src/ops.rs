//! Operator, qualifier and aggregate kinds.

use std::fmt;

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    IsNull,
    IsNotNull,
    UMinus,
    Cast,
    Unnest,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "NOT",
            UnaryOp::IsNull => "IS NULL",
            UnaryOp::IsNotNull => "IS NOT NULL",
            UnaryOp::UMinus => "-",
            UnaryOp::Cast => "CAST",
            UnaryOp::Unnest => "UNNEST",
        }
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    pub fn is_logic(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Plus
                | BinaryOp::Minus
                | BinaryOp::Multiply
                | BinaryOp::Divide
                | BinaryOp::Modulo
        )
    }

    /// The comparison with its operands swapped (`a < b` is `b > a`).
    pub fn commute(&self) -> BinaryOp {
        match self {
            BinaryOp::Lt => BinaryOp::Gt,
            BinaryOp::Le => BinaryOp::Ge,
            BinaryOp::Gt => BinaryOp::Lt,
            BinaryOp::Ge => BinaryOp::Le,
            other => *other,
        }
    }
}

/// Array qualifier of a comparison: `x = ANY (arr)`, `x < ALL (arr)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Qualifier {
    #[default]
    One,
    Any,
    All,
}

impl Qualifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Qualifier::One => "",
            Qualifier::Any => "ANY",
            Qualifier::All => "ALL",
        }
    }
}

/// Aggregate function kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AggKind {
    Avg,
    #[default]
    Min,
    Max,
    Sum,
    Count,
    ApproxCountDistinct,
    ApproxQuantile,
    Sample,
    SingleValue,
}

impl AggKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggKind::Avg => "AVG",
            AggKind::Min => "MIN",
            AggKind::Max => "MAX",
            AggKind::Sum => "SUM",
            AggKind::Count => "COUNT",
            AggKind::ApproxCountDistinct => "APPROX_COUNT_DISTINCT",
            AggKind::ApproxQuantile => "APPROX_QUANTILE",
            AggKind::Sample => "SAMPLE",
            AggKind::SingleValue => "SINGLE_VALUE",
        }
    }
}

impl fmt::Display for AggKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Window function kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WindowFunctionKind {
    RowNumber,
    Rank,
    DenseRank,
    PercentRank,
    CumeDist,
    NTile,
    Lag,
    Lead,
    FirstValue,
    LastValue,
    Avg,
    Min,
    Max,
    Sum,
    Count,
}

impl WindowFunctionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowFunctionKind::RowNumber => "ROW_NUMBER",
            WindowFunctionKind::Rank => "RANK",
            WindowFunctionKind::DenseRank => "DENSE_RANK",
            WindowFunctionKind::PercentRank => "PERCENT_RANK",
            WindowFunctionKind::CumeDist => "CUME_DIST",
            WindowFunctionKind::NTile => "NTILE",
            WindowFunctionKind::Lag => "LAG",
            WindowFunctionKind::Lead => "LEAD",
            WindowFunctionKind::FirstValue => "FIRST_VALUE",
            WindowFunctionKind::LastValue => "LAST_VALUE",
            WindowFunctionKind::Avg => "AVG",
            WindowFunctionKind::Min => "MIN",
            WindowFunctionKind::Max => "MAX",
            WindowFunctionKind::Sum => "SUM",
            WindowFunctionKind::Count => "COUNT",
        }
    }
}

/// Sort direction and null placement of a window order key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OrderEntry {
    pub is_desc: bool,
    pub nulls_first: bool,
}

/// Which row a [`Var`](crate::Var) reads in a multi-step plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WhichRow {
    #[default]
    InputRow,
    OutputRow,
    GroupByKey,
}
