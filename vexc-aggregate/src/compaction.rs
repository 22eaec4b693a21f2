//! Slot width compaction and target nullability adjustments.

use vexc_expr::{AggKind, ExprArena, ExprId, TargetInfo, is_agg_domain_range_equivalent};
use vexc_types::TypeRef;

/// Byte width of a slot holding `qw`-byte values, never below `low_bound`.
pub fn compact_byte_width(qw: usize, low_bound: usize) -> usize {
    qw.max(low_bound)
}

/// Type whose width and null sentinel the slot of `target` uses.
///
/// Aggregates whose result comes from their argument's domain use the
/// argument type; everything else uses the target type.
///
/// # Panics
///
/// On an argument-less aggregate other than plain `COUNT(*)`.
pub fn get_compact_type(target: &TargetInfo) -> TypeRef {
    if !target.is_agg {
        return target.ty;
    }
    let Some(arg_ty) = target.agg_arg_type else {
        assert_eq!(target.agg_kind, AggKind::Count, "only COUNT may omit its argument");
        assert!(!target.is_distinct, "COUNT(DISTINCT) requires an argument");
        return target.ty;
    };
    if is_agg_domain_range_equivalent(target.agg_kind) {
        arg_ty
    } else {
        target.ty
    }
}

/// Mark the target (and its argument) as never or possibly null.
pub fn set_notnull(target: &mut TargetInfo, not_null: bool) {
    target.skip_null_val = !not_null;
    target.ty = target.ty.with_nullable(!not_null);
    target.agg_arg_type = target.agg_arg_type.map(|t| t.with_nullable(!not_null));
}

/// Argument of an aggregate target, `None` for other targets and `COUNT(*)`.
pub fn agg_arg(arena: &ExprArena, target: ExprId) -> Option<ExprId> {
    arena.as_agg(target).and_then(|agg| agg.arg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_expr::get_target_info;
    use vexc_types::{Type, TypeContext};

    #[test]
    fn min_compacts_to_its_argument() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let x = arena.column_var(ctx.int8(true), 1, 1);
        let min = arena.agg(ctx.int8(true), AggKind::Min, Some(x), false);
        let sum = arena.agg(ctx.int64(true), AggKind::Sum, Some(x), false);
        let count = arena.agg(ctx.int32(false), AggKind::Count, None, false);

        assert!(Type::same(get_compact_type(&get_target_info(&arena, min, false)), ctx.int8(true)));
        assert!(Type::same(get_compact_type(&get_target_info(&arena, sum, false)), ctx.int64(true)));
        assert_eq!(get_compact_type(&get_target_info(&arena, count, true)).size(), 8);
        assert_eq!(agg_arg(&arena, min), Some(x));
        assert_eq!(agg_arg(&arena, count), None);
        assert_eq!(agg_arg(&arena, x), None);
    }

    #[test]
    fn notnull_updates_target_and_argument() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let x = arena.column_var(ctx.fp32(true), 1, 1);
        let max = arena.agg(ctx.fp32(true), AggKind::Max, Some(x), false);
        let mut info = get_target_info(&arena, max, false);
        set_notnull(&mut info, true);
        assert!(!info.skip_null_val);
        assert!(!info.ty.nullable());
        assert!(info.agg_arg_type.is_some_and(|t| !t.nullable()));
        set_notnull(&mut info, false);
        assert!(info.skip_null_val && info.ty.nullable());
    }

    #[test]
    fn compaction_respects_the_lower_bound() {
        assert_eq!(compact_byte_width(2, 4), 4);
        assert_eq!(compact_byte_width(8, 4), 8);
    }
}
