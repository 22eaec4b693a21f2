//! Double-dispatch traversal over expression nodes.
//!
//! [`ScalarExprVisitor::visit`] matches on the node kind and calls the
//! corresponding `visit_*` method. Every method has a default that walks the
//! children in a fixed order and folds their results with
//! [`ScalarExprVisitor::aggregate_result`], starting from
//! [`ScalarExprVisitor::default_result`]. Leaves return the default result.
//!
//! Implementors override only the kinds they care about. Adding a node kind
//! means adding one `visit_*` method with a default body here.

use crate::expr::*;

/// Visit `id` through the kind-specific method of `visitor`.
///
/// This is the body of [`ScalarExprVisitor::visit`]; visitors that override
/// `visit` to inspect every node call it to continue the walk.
pub fn dispatch<'a, V>(visitor: &mut V, id: ExprId) -> V::Output
where
    V: ScalarExprVisitor<'a> + ?Sized,
{
    let arena = visitor.arena();
    match &arena.get(id).kind {
        ExprKind::Var(n) => visitor.visit_var(id, n),
        ExprKind::ColumnVar(n) => visitor.visit_column_var(id, n),
        ExprKind::ColumnRef(n) => visitor.visit_column_ref(id, n),
        ExprKind::GroupColumnRef(n) => visitor.visit_group_column_ref(id, n),
        ExprKind::ExpressionTuple(n) => visitor.visit_expression_tuple(id, n),
        ExprKind::Constant(n) => visitor.visit_constant(id, n),
        ExprKind::UOper(n) => visitor.visit_uoper(id, n),
        ExprKind::BinOper(n) => visitor.visit_bin_oper(id, n),
        ExprKind::ScalarSubquery(n) => visitor.visit_scalar_subquery(id, n),
        ExprKind::InValues(n) => visitor.visit_in_values(id, n),
        ExprKind::InIntegerSet(n) => visitor.visit_in_integer_set(id, n),
        ExprKind::InSubquery(n) => visitor.visit_in_subquery(id, n),
        ExprKind::CharLength(n) => visitor.visit_char_length(id, n),
        ExprKind::KeyForString(n) => visitor.visit_key_for_string(id, n),
        ExprKind::SampleRatio(n) => visitor.visit_sample_ratio(id, n),
        ExprKind::Lower(n) => visitor.visit_lower(id, n),
        ExprKind::Cardinality(n) => visitor.visit_cardinality(id, n),
        ExprKind::Like(n) => visitor.visit_like(id, n),
        ExprKind::Regexp(n) => visitor.visit_regexp(id, n),
        ExprKind::WidthBucket(n) => visitor.visit_width_bucket(id, n),
        ExprKind::Case(n) => visitor.visit_case(id, n),
        ExprKind::Datetrunc(n) => visitor.visit_datetrunc(id, n),
        ExprKind::Extract(n) => visitor.visit_extract(id, n),
        ExprKind::DateAdd(n) => visitor.visit_date_add(id, n),
        ExprKind::DateDiff(n) => visitor.visit_date_diff(id, n),
        ExprKind::FunctionOper(n) => visitor.visit_function_oper(id, n),
        ExprKind::FunctionOperWithCustomTypeHandling(n) => {
            visitor.visit_function_oper_with_custom_type_handling(id, n)
        }
        ExprKind::ArrayExpr(n) => visitor.visit_array_expr(id, n),
        ExprKind::WindowFunction(n) => visitor.visit_window_function(id, n),
        ExprKind::Likelihood(n) => visitor.visit_likelihood(id, n),
        ExprKind::OffsetInFragment => visitor.visit_offset_in_fragment(id),
        ExprKind::Agg(n) => visitor.visit_agg(id, n),
    }
}

/// Generic visitor producing an `Output` per node.
///
/// `'a` is the lifetime of the arena being visited. Node payloads are handed
/// out with that lifetime, so implementations can hold on to them while
/// mutating their own state.
pub trait ScalarExprVisitor<'a> {
    type Output;

    fn arena(&self) -> &'a ExprArena;

    /// Seed of every fold and result of leaves.
    fn default_result(&mut self) -> Self::Output;

    /// Combine the running result with the next child's result.
    fn aggregate_result(&mut self, _aggregate: Self::Output, next: Self::Output) -> Self::Output {
        next
    }

    fn visit(&mut self, id: ExprId) -> Self::Output {
        dispatch(self, id)
    }

    /// Fold `ids` left to right, starting from `seed`.
    fn visit_list(&mut self, seed: Self::Output, ids: &[ExprId]) -> Self::Output {
        let mut result = seed;
        for id in ids {
            let next = self.visit(*id);
            result = self.aggregate_result(result, next);
        }
        result
    }

    fn visit_var(&mut self, _id: ExprId, _var: &'a Var) -> Self::Output {
        self.default_result()
    }

    fn visit_column_var(&mut self, _id: ExprId, _col: &'a ColumnVar) -> Self::Output {
        self.default_result()
    }

    fn visit_column_ref(&mut self, _id: ExprId, _col: &'a ColumnRef) -> Self::Output {
        self.default_result()
    }

    fn visit_group_column_ref(&mut self, _id: ExprId, _col: &'a GroupColumnRef) -> Self::Output {
        self.default_result()
    }

    fn visit_expression_tuple(&mut self, _id: ExprId, _tuple: &'a ExpressionTuple) -> Self::Output {
        self.default_result()
    }

    fn visit_constant(&mut self, _id: ExprId, _constant: &'a Constant) -> Self::Output {
        self.default_result()
    }

    fn visit_uoper(&mut self, _id: ExprId, uoper: &'a UOper) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[uoper.operand])
    }

    fn visit_bin_oper(&mut self, _id: ExprId, bin_oper: &'a BinOper) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[bin_oper.left, bin_oper.right])
    }

    fn visit_scalar_subquery(&mut self, _id: ExprId, _subquery: &'a ScalarSubquery) -> Self::Output {
        self.default_result()
    }

    fn visit_in_values(&mut self, _id: ExprId, in_values: &'a InValues) -> Self::Output {
        let seed = self.visit(in_values.arg);
        self.visit_list(seed, &in_values.values)
    }

    fn visit_in_integer_set(&mut self, _id: ExprId, in_set: &'a InIntegerSet) -> Self::Output {
        self.visit(in_set.arg)
    }

    fn visit_in_subquery(&mut self, _id: ExprId, in_subquery: &'a InSubquery) -> Self::Output {
        self.visit(in_subquery.arg)
    }

    fn visit_char_length(&mut self, _id: ExprId, char_length: &'a CharLength) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[char_length.arg])
    }

    fn visit_key_for_string(&mut self, _id: ExprId, key: &'a UnaryBuiltin) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[key.arg])
    }

    fn visit_sample_ratio(&mut self, _id: ExprId, ratio: &'a UnaryBuiltin) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[ratio.arg])
    }

    fn visit_lower(&mut self, _id: ExprId, lower: &'a UnaryBuiltin) -> Self::Output {
        self.visit(lower.arg)
    }

    fn visit_cardinality(&mut self, _id: ExprId, cardinality: &'a UnaryBuiltin) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[cardinality.arg])
    }

    fn visit_like(&mut self, _id: ExprId, like: &'a Like) -> Self::Output {
        let seed = self.default_result();
        let mut result = self.visit_list(seed, &[like.arg, like.pattern]);
        if let Some(escape) = like.escape {
            result = self.visit_list(result, &[escape]);
        }
        result
    }

    fn visit_regexp(&mut self, _id: ExprId, regexp: &'a Regexp) -> Self::Output {
        let seed = self.default_result();
        let mut result = self.visit_list(seed, &[regexp.arg, regexp.pattern]);
        if let Some(escape) = regexp.escape {
            result = self.visit_list(result, &[escape]);
        }
        result
    }

    fn visit_width_bucket(&mut self, _id: ExprId, wb: &'a WidthBucket) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[wb.target, wb.lower, wb.upper, wb.partition_count])
    }

    fn visit_case(&mut self, _id: ExprId, case: &'a Case) -> Self::Output {
        let mut result = self.default_result();
        for (cond, value) in &case.branches {
            result = self.visit_list(result, &[*cond, *value]);
        }
        self.visit_list(result, &[case.else_expr])
    }

    fn visit_datetrunc(&mut self, _id: ExprId, datetrunc: &'a Datetrunc) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[datetrunc.from])
    }

    fn visit_extract(&mut self, _id: ExprId, extract: &'a Extract) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[extract.from])
    }

    fn visit_date_add(&mut self, _id: ExprId, dateadd: &'a DateAdd) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[dateadd.number, dateadd.datetime])
    }

    fn visit_date_diff(&mut self, _id: ExprId, datediff: &'a DateDiff) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &[datediff.start, datediff.end])
    }

    fn visit_function_oper(&mut self, _id: ExprId, func: &'a FunctionOper) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &func.args)
    }

    fn visit_function_oper_with_custom_type_handling(
        &mut self,
        id: ExprId,
        func: &'a FunctionOper,
    ) -> Self::Output {
        self.visit_function_oper(id, func)
    }

    fn visit_array_expr(&mut self, _id: ExprId, array: &'a ArrayExpr) -> Self::Output {
        let seed = self.default_result();
        self.visit_list(seed, &array.elements)
    }

    fn visit_window_function(&mut self, _id: ExprId, window: &'a WindowFunction) -> Self::Output {
        let seed = self.default_result();
        let result = self.visit_list(seed, &window.args);
        let result = self.visit_list(result, &window.partition_keys);
        self.visit_list(result, &window.order_keys)
    }

    fn visit_likelihood(&mut self, _id: ExprId, likelihood: &'a Likelihood) -> Self::Output {
        self.visit(likelihood.arg)
    }

    fn visit_offset_in_fragment(&mut self, _id: ExprId) -> Self::Output {
        self.default_result()
    }

    fn visit_agg(&mut self, _id: ExprId, agg: &'a Agg) -> Self::Output {
        match agg.arg {
            Some(arg) => self.visit(arg),
            None => self.default_result(),
        }
    }
}
