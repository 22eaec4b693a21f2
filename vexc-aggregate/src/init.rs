//! Initial values of aggregate result slots.
//!
//! Every slot starts as the identity of its aggregate: 0 for counts and
//! non-null sums, the type's maximum for `MIN`, its minimum for `MAX` and
//! the null sentinel wherever the result may still be null. Values are
//! `i64` bit patterns; floats are stored as the bits of their slot width.

use vexc_expr::{
    AggKind, ExprArena, ExprId, ExprKind, TargetInfo, UnaryOp, get_target_info,
    takes_float_argument,
};
use vexc_types::{Type, get_bit_width, inline_fp_null_value, inline_int_null_value, logical_size};

use crate::compaction::{agg_arg, compact_byte_width, get_compact_type, set_notnull};
use crate::layout::{QueryDescriptionType, QueryMemoryLayout};

fn f32_bits(v: f32) -> i64 {
    v.to_bits() as i32 as i64
}

fn f64_bits(v: f64) -> i64 {
    v.to_bits() as i64
}

/// Identity of `kind` over `ty` in a slot of the compacted width.
///
/// With `enable_compaction` the slot is `compact_byte_width(bits / 8,
/// min_byte_width)` wide, otherwise 8 bytes.
///
/// # Panics
///
/// On string types for anything but `SINGLE_VALUE` and `SAMPLE`, on slot
/// widths the aggregate cannot use and on a slot narrower than the type.
pub fn get_agg_initial_val(
    kind: AggKind,
    ty: &Type,
    enable_compaction: bool,
    min_byte_width: usize,
) -> i64 {
    assert!(
        !(ty.is_string() || ty.is_ext_dictionary())
            || matches!(kind, AggKind::SingleValue | AggKind::Sample),
        "{kind} cannot aggregate {ty}"
    );
    let byte_width = if enable_compaction {
        compact_byte_width((get_bit_width(ty) >> 3) as usize, min_byte_width)
    } else {
        8
    };
    let canonical_size = logical_size(ty);
    assert!(
        canonical_size < 0 || byte_width >= canonical_size as usize,
        "{byte_width}-byte slot is too narrow for {ty}"
    );

    let fp = ty.is_floating_point();
    let null_bits = |width: usize| match (fp, width) {
        (false, _) => inline_int_null_value(ty),
        (true, 4) => f32_bits(inline_fp_null_value(ty) as f32),
        (true, 8) => f64_bits(inline_fp_null_value(ty)),
        (true, _) => panic!("{kind} over {ty} in a {width}-byte slot"),
    };
    match kind {
        AggKind::Sum => {
            if ty.nullable() {
                return null_bits(byte_width);
            }
            match byte_width {
                4 if fp => f32_bits(0.0),
                8 if fp => f64_bits(0.0),
                4 | 8 => 0,
                _ => panic!("SUM over {ty} in a {byte_width}-byte slot"),
            }
        }
        AggKind::Avg | AggKind::Count | AggKind::ApproxCountDistinct | AggKind::ApproxQuantile => 0,
        AggKind::Min => {
            if ty.nullable() {
                return null_bits(byte_width);
            }
            match (byte_width, fp) {
                (1, false) => i8::MAX as i64,
                (2, false) => i16::MAX as i64,
                (4, false) => i32::MAX as i64,
                (8, false) => i64::MAX,
                (4, true) => f32_bits(f32::MAX),
                (8, true) => f64_bits(f64::MAX),
                _ => panic!("MIN over {ty} in a {byte_width}-byte slot"),
            }
        }
        AggKind::Max | AggKind::SingleValue | AggKind::Sample => {
            if ty.nullable() {
                return null_bits(byte_width);
            }
            match (byte_width, fp) {
                (1, false) => i8::MIN as i64,
                (2, false) => i16::MIN as i64,
                (4, false) => i32::MIN as i64,
                (8, false) => i64::MIN,
                (4, true) => f32_bits(-f32::MAX),
                (8, true) => f64_bits(-f64::MAX),
                _ => panic!("{kind} over {ty} in a {byte_width}-byte slot"),
            }
        }
    }
}

/// Initializer of every slot of the result buffer, in slot order.
///
/// Projected values start at 0 (two slots for strings and arrays); `AVG`
/// owns a second slot for its count.
///
/// # Panics
///
/// When the targets need more slots than `layout` has or an aggregate slot
/// has no width.
pub fn init_agg_val_vec(targets: &[TargetInfo], layout: &dyn QueryMemoryLayout) -> Vec<i64> {
    let mut init_vals = Vec::with_capacity(layout.slot_count());
    let is_group_by = layout.is_group_by();
    let mut slot = 0;
    for target in targets {
        assert!(
            slot < layout.slot_count(),
            "target needs slot {slot} of {}",
            layout.slot_count()
        );
        let ty = target.ty;
        if !target.is_agg || target.agg_kind == AggKind::Sample {
            if target.agg_kind == AggKind::Sample && ty.is_ext_dictionary() {
                init_vals.push(get_agg_initial_val(
                    target.agg_kind,
                    ty,
                    is_group_by,
                    layout.compact_byte_width(),
                ));
            } else {
                if layout.padded_slot_width_bytes(slot) > 0 {
                    init_vals.push(0);
                }
                if ty.is_array() || ty.is_string() {
                    init_vals.push(0);
                }
            }
            slot += 1;
            continue;
        }

        let padded = layout.padded_slot_width_bytes(slot);
        assert!(padded > 0, "aggregate slot {slot} has no width");
        let float_argument = takes_float_argument(target);
        let chosen_bytes = if layout.is_logical_sized_columns_allowed() {
            padded
        } else {
            layout.compact_byte_width()
        };
        let mut init_type = get_compact_type(target);
        if !is_group_by {
            init_type = init_type.with_nullable(true);
        }
        init_vals.push(get_agg_initial_val(
            target.agg_kind,
            init_type,
            is_group_by || float_argument,
            if float_argument { 4 } else { chosen_bytes },
        ));
        if target.agg_kind == AggKind::Avg {
            slot += 1;
            init_vals.push(0);
        }
        slot += 1;
    }
    init_vals
}

/// Whether some qual guarantees `expr` is not null: `e IS NOT NULL` or
/// `NOT (e IS NULL)` with `e` structurally equal to `expr`.
pub fn constrained_not_null(arena: &ExprArena, expr: ExprId, quals: &[ExprId]) -> bool {
    quals.iter().any(|&qual| {
        let ExprKind::UOper(uoper) = arena.kind(qual) else {
            return false;
        };
        let (test, negated) = match uoper.op {
            UnaryOp::Not => match arena.kind(uoper.operand) {
                ExprKind::UOper(inner) => (inner, true),
                _ => return false,
            },
            _ => (uoper, false),
        };
        let guards = if negated {
            test.op == UnaryOp::IsNull
        } else {
            test.op == UnaryOp::IsNotNull
        };
        guards && arena.structurally_equal(test.operand, expr)
    })
}

/// [`TargetInfo`]s of `targets` with nullability refined by the query shape
/// and `quals`.
///
/// Ungrouped `MIN`, `MAX`, `SUM`, `AVG` and `APPROX_QUANTILE` are nullable,
/// as an empty input makes them null. Other aggregates become non-nullable
/// when `quals` guarantee their argument is not null.
pub fn target_infos_for_exprs(
    arena: &ExprArena,
    targets: &[ExprId],
    quals: &[ExprId],
    layout: &dyn QueryMemoryLayout,
    bigint_count: bool,
) -> Vec<TargetInfo> {
    let non_grouped = layout.query_description_type() == QueryDescriptionType::NonGroupedAggregate;
    targets
        .iter()
        .take(layout.slot_count())
        .map(|&expr| {
            let mut target = get_target_info(arena, expr, bigint_count);
            if let Some(arg) = agg_arg(arena, expr) {
                let may_see_no_rows = matches!(
                    target.agg_kind,
                    AggKind::Min
                        | AggKind::Max
                        | AggKind::Sum
                        | AggKind::Avg
                        | AggKind::ApproxQuantile
                );
                if non_grouped && target.is_agg && may_see_no_rows {
                    set_notnull(&mut target, false);
                } else if constrained_not_null(arena, arg, quals) {
                    set_notnull(&mut target, true);
                }
            }
            target
        })
        .collect()
}

/// Slot initializers for target expressions, see [`init_agg_val_vec`] and
/// [`target_infos_for_exprs`].
pub fn init_agg_val_vec_for_exprs(
    arena: &ExprArena,
    targets: &[ExprId],
    quals: &[ExprId],
    layout: &dyn QueryMemoryLayout,
    bigint_count: bool,
) -> Vec<i64> {
    let infos = target_infos_for_exprs(arena, targets, quals, layout, bigint_count);
    let init_vals = init_agg_val_vec(&infos, layout);
    tracing::debug!(
        targets = infos.len(),
        slots = init_vals.len(),
        group_by = layout.is_group_by(),
        "computed aggregate initial values"
    );
    init_vals
}
