//! Rendering expression trees back to SQL text.
//!
//! Used for logging and for pushing a query down to an external system. It
//! covers the variants such a system can be expected to understand; anything
//! else fails with [`Error::Unsupported`] and the caller abandons pushdown.

use rustc_hash::FxHashMap;

use vexc_result::{Error, Result};

use crate::collect::collect_used_columns;
use crate::expr::*;
use crate::ops::{AggKind, Qualifier, UnaryOp, WhichRow};
use crate::unit::ExecutionUnit;
use crate::visitor::{ScalarExprVisitor, dispatch};

/// Resolves table and column identifiers to names.
pub trait SchemaProvider {
    fn table_name(&self, db_id: i32, table_id: i32) -> Option<String>;
    fn column_name(&self, db_id: i32, table_id: i32, column_id: i32) -> Option<String>;
}

/// [`SchemaProvider`] backed by hash maps.
#[derive(Debug, Default, Clone)]
pub struct InMemorySchemaProvider {
    tables: FxHashMap<(i32, i32), String>,
    columns: FxHashMap<(i32, i32, i32), String>,
}

impl InMemorySchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, db_id: i32, table_id: i32, name: impl Into<String>) -> &mut Self {
        self.tables.insert((db_id, table_id), name.into());
        self
    }

    pub fn add_column(
        &mut self,
        db_id: i32,
        table_id: i32,
        column_id: i32,
        name: impl Into<String>,
    ) -> &mut Self {
        self.columns.insert((db_id, table_id, column_id), name.into());
        self
    }
}

impl SchemaProvider for InMemorySchemaProvider {
    fn table_name(&self, db_id: i32, table_id: i32) -> Option<String> {
        self.tables.get(&(db_id, table_id)).cloned()
    }

    fn column_name(&self, db_id: i32, table_id: i32, column_id: i32) -> Option<String> {
        self.columns.get(&(db_id, table_id, column_id)).cloned()
    }
}

pub fn serialize_table_ref(db_id: i32, table_id: i32, schema: &dyn SchemaProvider) -> Result<String> {
    schema.table_name(db_id, table_id).ok_or_else(|| {
        Error::InvalidArgumentError(format!("unknown table {table_id} in database {db_id}"))
    })
}

/// `table.column` for a stored column.
pub fn serialize_column_ref(
    db_id: i32,
    table_id: i32,
    column_id: i32,
    schema: &dyn SchemaProvider,
) -> Result<String> {
    let table = serialize_table_ref(db_id, table_id, schema)?;
    let column = schema
        .column_name(db_id, table_id, column_id)
        .ok_or_else(|| {
            Error::InvalidArgumentError(format!(
                "unknown column {column_id} of table {table_id} in database {db_id}"
            ))
        })?;
    Ok(format!("{table}.{column}"))
}

/// SQL rendering of a whole execution unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionUnitSql {
    pub query: String,
    pub from_table: String,
}

/// Expression-to-SQL visitor.
pub struct ScalarExprToSql<'a> {
    arena: &'a ExprArena,
    unit: &'a ExecutionUnit,
    schema: &'a dyn SchemaProvider,
    current: ExprId,
}

impl<'a> ScalarExprToSql<'a> {
    pub fn new(arena: &'a ExprArena, unit: &'a ExecutionUnit, schema: &'a dyn SchemaProvider) -> Self {
        Self {
            arena,
            unit,
            schema,
            current: ExprId(0),
        }
    }

    fn visit_all(&mut self, ids: &[ExprId]) -> Result<Vec<String>> {
        ids.iter().map(|id| self.visit(*id)).collect()
    }
}

impl<'a> ScalarExprVisitor<'a> for ScalarExprToSql<'a> {
    type Output = Result<String>;

    fn arena(&self) -> &'a ExprArena {
        self.arena
    }

    fn default_result(&mut self) -> Result<String> {
        Err(Error::unsupported(format!(
            "{} has no SQL form",
            self.arena.kind(self.current).name()
        )))
    }

    /// Composite nodes without an override have no SQL form either.
    fn aggregate_result(&mut self, aggregate: Result<String>, _next: Result<String>) -> Result<String> {
        aggregate
    }

    fn visit(&mut self, id: ExprId) -> Result<String> {
        let parent = std::mem::replace(&mut self.current, id);
        let result = dispatch(self, id);
        self.current = parent;
        result
    }

    fn visit_var(&mut self, _id: ExprId, var: &'a Var) -> Result<String> {
        match var.which_row {
            WhichRow::InputRow => serialize_column_ref(
                var.column.db_id,
                var.column.table_id,
                var.column.column_id,
                self.schema,
            ),
            WhichRow::GroupByKey => {
                let idx = usize::try_from(var.var_no - 1)
                    .map_err(|_| Error::Internal(format!("invalid var_no {}", var.var_no)))?;
                let key = *self.unit.groupby_exprs.get(idx).ok_or_else(|| {
                    Error::Internal(format!("group key {} out of range", var.var_no))
                })?;
                self.visit(key)
            }
            WhichRow::OutputRow => Err(Error::unsupported("reference to an output row")),
        }
    }

    fn visit_column_var(&mut self, _id: ExprId, col: &'a ColumnVar) -> Result<String> {
        serialize_column_ref(col.db_id, col.table_id, col.column_id, self.schema)
    }

    fn visit_constant(&mut self, id: ExprId, constant: &'a Constant) -> Result<String> {
        Ok(constant.value.to_sql(self.arena.ty(id)))
    }

    fn visit_uoper(&mut self, id: ExprId, uoper: &'a UOper) -> Result<String> {
        let operand = self.visit(uoper.operand)?;
        match uoper.op {
            UnaryOp::Not => Ok(format!("NOT ({operand})")),
            UnaryOp::UMinus => Ok(format!("-{operand}")),
            UnaryOp::IsNull => Ok(format!("{operand} IS NULL")),
            UnaryOp::IsNotNull => Ok(format!("{operand} IS NOT NULL")),
            UnaryOp::Cast => Ok(format!(
                "CAST({operand} AS {})",
                self.arena.ty(id).sql_name()
            )),
            UnaryOp::Unnest => Err(Error::unsupported("UNNEST")),
        }
    }

    fn visit_bin_oper(&mut self, _id: ExprId, bin_oper: &'a BinOper) -> Result<String> {
        let left = self.visit(bin_oper.left)?;
        let right = self.visit(bin_oper.right)?;
        let op = bin_oper.op.as_str();
        match bin_oper.qualifier {
            Qualifier::One => Ok(format!("({left} {op} {right})")),
            q => Ok(format!("({left} {op} {} ({right}))", q.as_str())),
        }
    }

    fn visit_in_values(&mut self, _id: ExprId, in_values: &'a InValues) -> Result<String> {
        let arg = self.visit(in_values.arg)?;
        let values = self.visit_all(&in_values.values)?;
        Ok(format!("{arg} IN ({})", values.join(", ")))
    }

    fn visit_in_integer_set(&mut self, _id: ExprId, in_set: &'a InIntegerSet) -> Result<String> {
        let arg = self.visit(in_set.arg)?;
        let values: Vec<String> = in_set.values.iter().map(i64::to_string).collect();
        Ok(format!("{arg} IN ({})", values.join(", ")))
    }

    fn visit_in_subquery(&mut self, _id: ExprId, _in_subquery: &'a InSubquery) -> Result<String> {
        self.default_result()
    }

    fn visit_lower(&mut self, _id: ExprId, lower: &'a UnaryBuiltin) -> Result<String> {
        Ok(format!("LOWER({})", self.visit(lower.arg)?))
    }

    /// The hint does not change the value, so pushdown drops it.
    fn visit_likelihood(&mut self, _id: ExprId, likelihood: &'a Likelihood) -> Result<String> {
        self.visit(likelihood.arg)
    }

    fn visit_like(&mut self, _id: ExprId, like: &'a Like) -> Result<String> {
        let arg = self.visit(like.arg)?;
        let pattern = self.visit(like.pattern)?;
        let keyword = if like.is_ilike { "ILIKE" } else { "LIKE" };
        let mut out = format!("{arg} {keyword} {pattern}");
        if let Some(escape) = like.escape {
            out.push_str(&format!(" ESCAPE {}", self.visit(escape)?));
        }
        Ok(out)
    }

    fn visit_case(&mut self, _id: ExprId, case: &'a Case) -> Result<String> {
        let mut out = String::from("CASE");
        for (cond, result) in &case.branches {
            let cond = self.visit(*cond)?;
            let result = self.visit(*result)?;
            out.push_str(&format!(" WHEN {cond} THEN {result}"));
        }
        let else_sql = self.visit(case.else_expr)?;
        out.push_str(&format!(" ELSE {else_sql} END"));
        Ok(out)
    }

    fn visit_function_oper(&mut self, _id: ExprId, func: &'a FunctionOper) -> Result<String> {
        let args = self.visit_all(&func.args)?;
        Ok(format!("{}({})", func.name, args.join(", ")))
    }

    fn visit_window_function(&mut self, _id: ExprId, window: &'a WindowFunction) -> Result<String> {
        let args = self.visit_all(&window.args)?;
        let mut out = format!("{}({}) OVER (", window.kind.as_str(), args.join(", "));
        let partitions = self.visit_all(&window.partition_keys)?;
        if !partitions.is_empty() {
            out.push_str(&format!("PARTITION BY {}", partitions.join(", ")));
        }
        let orders = self.visit_all(&window.order_keys)?;
        if !orders.is_empty() {
            if !partitions.is_empty() {
                out.push(' ');
            }
            let keys: Vec<String> = orders
                .into_iter()
                .enumerate()
                .map(|(i, key)| {
                    let entry = window.collation.get(i).copied().unwrap_or_default();
                    format!(
                        "{key} {} NULLS {}",
                        if entry.is_desc { "DESC" } else { "ASC" },
                        if entry.nulls_first { "FIRST" } else { "LAST" }
                    )
                })
                .collect();
            out.push_str(&format!("ORDER BY {}", keys.join(", ")));
        }
        out.push(')');
        Ok(out)
    }

    fn visit_agg(&mut self, _id: ExprId, agg: &'a Agg) -> Result<String> {
        let name = agg.kind.as_str();
        let Some(arg) = agg.arg else {
            return match agg.kind {
                AggKind::Count => Ok("COUNT(*)".to_string()),
                kind => Err(Error::unsupported(format!("{kind} without argument"))),
            };
        };
        let arg = self.visit(arg)?;
        let distinct = if agg.is_distinct { "DISTINCT " } else { "" };
        match agg.arg1 {
            Some(arg1) => {
                let arg1 = self.visit(arg1)?;
                Ok(format!("{name}({distinct}{arg}, {arg1})"))
            }
            None => Ok(format!("{name}({distinct}{arg})")),
        }
    }
}

/// Render `unit` as a `SELECT` statement.
pub fn serialize_to_sql(
    arena: &ExprArena,
    unit: &ExecutionUnit,
    schema: &dyn SchemaProvider,
) -> Result<ExecutionUnitSql> {
    let mut to_sql = ScalarExprToSql::new(arena, unit, schema);

    let targets = to_sql.visit_all(&unit.target_exprs)?;

    let tables: Vec<(i32, i32)> = if unit.input_tables.is_empty() {
        let roots: Vec<ExprId> = unit
            .target_exprs
            .iter()
            .copied()
            .chain(unit.all_quals())
            .collect();
        collect_used_columns(arena, &roots).tables()
    } else {
        unit.input_tables
            .iter()
            .map(|t| (t.db_id, t.table_id))
            .collect()
    };
    let from_table = tables
        .iter()
        .map(|(db_id, table_id)| serialize_table_ref(*db_id, *table_id, schema))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let quals: Vec<ExprId> = unit.all_quals().collect();
    let where_sql = to_sql.visit_all(&quals)?.join(" AND ");
    let group_by_sql = to_sql.visit_all(&unit.groupby_exprs)?.join(", ");

    let mut query = format!("SELECT {} FROM {from_table}", targets.join(", "));
    if !where_sql.is_empty() {
        query.push_str(&format!(" WHERE {where_sql}"));
    }
    if !group_by_sql.is_empty() {
        query.push_str(&format!(" GROUP BY {group_by_sql}"));
    }
    tracing::debug!(from_table = %from_table, len = query.len(), "serialized execution unit");
    Ok(ExecutionUnitSql { query, from_table })
}
