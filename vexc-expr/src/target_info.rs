//! Per-target summaries derived from output expressions.

use std::fmt;

use vexc_types::{Type, TypeContext, TypeRef, canonicalize};

use crate::expr::{ExprArena, ExprId};
use crate::ops::AggKind;

/// What the result-buffer layout and the aggregate initializers need to know
/// about one output target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetInfo {
    pub is_agg: bool,
    pub agg_kind: AggKind,
    pub ty: TypeRef,
    pub agg_arg_type: Option<TypeRef>,
    pub skip_null_val: bool,
    pub is_distinct: bool,
}

impl fmt::Display for TargetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TargetInfo(is_agg={}, agg_kind={}, type={}, agg_arg_type={}, skip_null_val={}, is_distinct={})",
            self.is_agg,
            self.agg_kind,
            self.ty,
            self.agg_arg_type
                .map(|t| t.to_string())
                .unwrap_or_else(|| "null".to_string()),
            self.skip_null_val,
            self.is_distinct
        )
    }
}

/// Whether the aggregate always returns a value from its argument's domain.
pub fn is_agg_domain_range_equivalent(kind: AggKind) -> bool {
    matches!(
        kind,
        AggKind::Min | AggKind::Max | AggKind::SingleValue | AggKind::Sample
    )
}

/// Summarize the target expression `target`.
///
/// `bigint_count` selects 8-byte `COUNT` results.
///
/// # Panics
///
/// On an argument-less aggregate other than plain `COUNT(*)`.
pub fn get_target_info(arena: &ExprArena, target: ExprId, bigint_count: bool) -> TargetInfo {
    let ctx = TypeContext::global();
    let expr = arena.get(target);
    let nullable = expr.ty.nullable();
    let Some(agg) = arena.as_agg(target) else {
        return TargetInfo {
            is_agg: false,
            agg_kind: AggKind::Min,
            ty: canonicalize(expr.ty),
            agg_arg_type: None,
            skip_null_val: false,
            is_distinct: false,
        };
    };

    let Some(arg) = agg.arg else {
        assert_eq!(agg.kind, AggKind::Count, "only COUNT may omit its argument");
        assert!(!agg.is_distinct, "COUNT(DISTINCT) requires an argument");
        return TargetInfo {
            is_agg: true,
            agg_kind: AggKind::Count,
            ty: ctx.integer(if bigint_count { 8 } else { 4 }, nullable),
            agg_arg_type: None,
            skip_null_val: false,
            is_distinct: false,
        };
    };

    let arg_ty = arena.ty(arg);
    let is_distinct = agg.kind == AggKind::Count && agg.is_distinct;

    if agg.kind == AggKind::Avg {
        // The running sum of an integer AVG is kept in 64 bits.
        let ty = if arg_ty.is_integer() {
            ctx.int64(arg_ty.nullable())
        } else {
            arg_ty
        };
        return TargetInfo {
            is_agg: true,
            agg_kind: agg.kind,
            ty,
            agg_arg_type: Some(arg_ty),
            skip_null_val: arg_ty.nullable(),
            is_distinct,
        };
    }

    let ty = if agg.kind == AggKind::Count {
        ctx.integer(if is_distinct || bigint_count { 8 } else { 4 }, nullable)
    } else {
        expr.ty
    };
    let skip_null_val = if agg.kind == AggKind::Count && (arg_ty.is_string() || arg_ty.is_array())
    {
        false
    } else {
        arg_ty.nullable()
    };
    TargetInfo {
        is_agg: true,
        agg_kind: agg.kind,
        ty,
        agg_arg_type: Some(arg_ty),
        skip_null_val,
        is_distinct,
    }
}

pub fn is_distinct_target(info: &TargetInfo) -> bool {
    info.is_distinct || info.agg_kind == AggKind::ApproxCountDistinct
}

/// Whether the aggregate accumulates a 4-byte float argument.
pub fn takes_float_argument(info: &TargetInfo) -> bool {
    info.is_agg
        && matches!(
            info.agg_kind,
            AggKind::Avg | AggKind::Sum | AggKind::Min | AggKind::Max | AggKind::SingleValue
        )
        && info.agg_arg_type.map(Type::is_fp32).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_aggregate_is_canonicalized() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let col = arena.column_var(ctx.ext_dict(ctx.text(true), 1, 2), 1, 1);
        let info = get_target_info(&arena, col, false);
        assert!(!info.is_agg);
        assert_eq!(info.ty.size(), 4);
    }

    #[test]
    fn count_star_width_follows_bigint_flag() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let count = arena.agg(ctx.int32(false), AggKind::Count, None, false);
        assert_eq!(get_target_info(&arena, count, false).ty.size(), 4);
        assert_eq!(get_target_info(&arena, count, true).ty.size(), 8);
    }

    #[test]
    fn count_distinct_is_wide_and_distinct() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let col = arena.column_var(ctx.text(true), 1, 1);
        let count = arena.agg(ctx.int32(false), AggKind::Count, Some(col), true);
        let info = get_target_info(&arena, count, false);
        assert!(info.is_distinct);
        assert!(is_distinct_target(&info));
        assert_eq!(info.ty.size(), 8);
        assert!(!info.skip_null_val, "string COUNT does not skip nulls");
    }

    #[test]
    fn avg_of_integers_widens() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let col = arena.column_var(ctx.int16(true), 1, 1);
        let avg = arena.agg(ctx.fp64(true), AggKind::Avg, Some(col), false);
        let info = get_target_info(&arena, avg, false);
        assert!(Type::same(info.ty, ctx.int64(true)));
        assert!(info.skip_null_val);
    }

    #[test]
    fn float_argument_detection() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let col = arena.column_var(ctx.fp32(false), 1, 1);
        let sum = arena.agg(ctx.fp32(false), AggKind::Sum, Some(col), false);
        assert!(takes_float_argument(&get_target_info(&arena, sum, false)));
        let count = arena.agg(ctx.int32(false), AggKind::Count, Some(col), false);
        assert!(!takes_float_argument(&get_target_info(&arena, count, false)));
    }
}
