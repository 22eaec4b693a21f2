//! Type system for the vexc expression compiler.
//!
//! Every expression node carries a [`TypeRef`]: a non-owning reference into
//! the process-wide [`TypeContext`]. Types are interned, so equal types are the
//! same instance and identity comparison replaces structural comparison.
//!
//! The crate also owns the value-level conventions compiled code relies on:
//! the [`logical_type`] narrowing rules, inline null sentinels, the literal
//! [`Datum`] and datetime precision scaling.

pub mod arrow_interop;
pub mod context;
pub mod datetime;
pub mod datum;
pub mod nulls;
pub mod types;
pub mod utils;

pub use context::TypeContext;
pub use datum::Datum;
pub use nulls::{
    NULL_ARRAY_LENGTH, NULL_BOOLEAN, NULL_DOUBLE, NULL_FLOAT, inline_fp_null_value,
    inline_int_max_min, inline_int_null_value, inline_null_bits, inline_uint_max_min,
};
pub use types::{TimeUnit, Type, TypeId, TypeRef};
pub use utils::{canonicalize, get_bit_width, logical_size, logical_size_of_tag, logical_type};
pub use arrow_interop::type_from_arrow;
