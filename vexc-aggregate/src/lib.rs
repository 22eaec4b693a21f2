//! Aggregate result slots of compiled queries.
//!
//! The execution kernel accumulates aggregates into `i64` slots laid out by
//! a [`QueryMemoryLayout`]. This crate decides the width each slot is
//! compacted to and the value it starts from, refining target nullability
//! with the query's `IS NOT NULL` filters.

pub mod compaction;
pub mod init;
pub mod layout;

pub use compaction::{agg_arg, compact_byte_width, get_compact_type, set_notnull};
pub use init::{
    constrained_not_null, get_agg_initial_val, init_agg_val_vec, init_agg_val_vec_for_exprs,
    target_infos_for_exprs,
};
pub use layout::{QueryDescriptionType, QueryMemoryDescriptor, QueryMemoryLayout};
