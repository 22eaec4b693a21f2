//! Result buffer layout as seen by the aggregate initializers.

use vexc_expr::{AggKind, TargetInfo};
use vexc_types::{get_bit_width, logical_size};

use crate::compaction::get_compact_type;

/// Shape of the query the result buffer is laid out for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum QueryDescriptionType {
    GroupByPerfectHash,
    GroupByBaselineHash,
    #[default]
    NonGroupedAggregate,
    Projection,
}

/// Read-only view of the result buffer layout.
pub trait QueryMemoryLayout {
    fn query_description_type(&self) -> QueryDescriptionType;

    /// Number of `i64` initializer slots.
    fn slot_count(&self) -> usize;

    /// Width of `slot` after padding, 0 for slots that hold nothing.
    fn padded_slot_width_bytes(&self, slot: usize) -> usize;

    /// Width aggregates are compacted to when logical sizes are not used.
    fn compact_byte_width(&self) -> usize;

    /// Whether slots may keep the logical width of their values.
    fn is_logical_sized_columns_allowed(&self) -> bool;

    fn is_group_by(&self) -> bool {
        matches!(
            self.query_description_type(),
            QueryDescriptionType::GroupByPerfectHash | QueryDescriptionType::GroupByBaselineHash
        )
    }
}

/// Plain in-memory [`QueryMemoryLayout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryMemoryDescriptor {
    description_type: QueryDescriptionType,
    slot_widths: Vec<usize>,
    compact_byte_width: usize,
    logical_sized_columns: bool,
}

impl QueryMemoryDescriptor {
    pub fn new(description_type: QueryDescriptionType, compact_byte_width: usize) -> Self {
        Self {
            description_type,
            slot_widths: Vec::new(),
            compact_byte_width,
            logical_sized_columns: false,
        }
    }

    /// Layout with one slot per target and a second one for each `AVG`.
    ///
    /// Aggregate slots are at least `compact_byte_width` wide; projected
    /// values keep their logical size.
    pub fn for_targets(
        description_type: QueryDescriptionType,
        targets: &[TargetInfo],
        compact_byte_width: usize,
    ) -> Self {
        let mut desc = Self::new(description_type, compact_byte_width);
        for target in targets {
            if !target.is_agg {
                desc.slot_widths.push(logical_size(target.ty).max(0) as usize);
                continue;
            }
            let bits = get_bit_width(get_compact_type(target));
            desc.slot_widths
                .push(((bits / 8) as usize).max(compact_byte_width));
            if target.agg_kind == AggKind::Avg {
                desc.slot_widths.push(8);
            }
        }
        desc
    }

    pub fn with_slot(mut self, width: usize) -> Self {
        self.slot_widths.push(width);
        self
    }

    pub fn with_logical_sized_columns(mut self, allowed: bool) -> Self {
        self.logical_sized_columns = allowed;
        self
    }
}

impl QueryMemoryLayout for QueryMemoryDescriptor {
    fn query_description_type(&self) -> QueryDescriptionType {
        self.description_type
    }

    fn slot_count(&self) -> usize {
        self.slot_widths.len()
    }

    fn padded_slot_width_bytes(&self, slot: usize) -> usize {
        self.slot_widths[slot]
    }

    fn compact_byte_width(&self) -> usize {
        self.compact_byte_width
    }

    fn is_logical_sized_columns_allowed(&self) -> bool {
        self.logical_sized_columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexc_expr::{ExprArena, get_target_info};
    use vexc_types::TypeContext;

    #[test]
    fn avg_takes_two_slots() {
        let ctx = TypeContext::global();
        let mut arena = ExprArena::new();
        let x = arena.column_var(ctx.int16(true), 1, 1);
        let avg = arena.agg(ctx.fp64(true), AggKind::Avg, Some(x), false);
        let min = arena.agg(ctx.int16(true), AggKind::Min, Some(x), false);
        let infos = [
            get_target_info(&arena, x, false),
            get_target_info(&arena, avg, false),
            get_target_info(&arena, min, false),
        ];
        let desc = QueryMemoryDescriptor::for_targets(
            QueryDescriptionType::GroupByPerfectHash,
            &infos,
            4,
        );
        assert!(desc.is_group_by());
        assert_eq!(desc.slot_count(), 4);
        assert_eq!(
            (0..4).map(|s| desc.padded_slot_width_bytes(s)).collect::<Vec<_>>(),
            vec![2, 8, 8, 4]
        );
    }
}
