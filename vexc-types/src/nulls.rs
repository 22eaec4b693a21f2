//! Inline null sentinels and representable ranges.
//!
//! Query buffers have no validity bitmaps. A null is a reserved value of the
//! slot's own type: the minimum integer of the logical width, or the smallest
//! positive normal float.

use crate::types::{Type, TypeId};
use crate::utils::logical_size;

/// Null sentinel for 4-byte floating point slots.
pub const NULL_FLOAT: f32 = f32::MIN_POSITIVE;
/// Null sentinel for 8-byte floating point slots.
pub const NULL_DOUBLE: f64 = f64::MIN_POSITIVE;
/// Null sentinel for booleans widened to a byte.
pub const NULL_BOOLEAN: i8 = i8::MIN;
/// Length header marking a null variable-length array.
pub const NULL_ARRAY_LENGTH: i32 = -1;

/// Null sentinel of an integer-like type, sign-extended to 64 bits.
///
/// # Panics
///
/// For floating point, string and array types, which have no integer null.
pub fn inline_int_null_value(ty: &Type) -> i64 {
    match ty.id() {
        TypeId::Boolean | TypeId::Null => NULL_BOOLEAN as i64,
        TypeId::Integer
        | TypeId::Decimal
        | TypeId::ExtDictionary
        | TypeId::Date
        | TypeId::Time
        | TypeId::Timestamp
        | TypeId::Interval => inline_int_max_min(logical_size(ty) as usize).1,
        TypeId::Column | TypeId::ColumnList => match ty.elem_type() {
            Some(elem) => inline_int_null_value(elem),
            None => panic!("column type without element type"),
        },
        _ => panic!("no inline integer null for type {ty}"),
    }
}

/// Null sentinel of a floating point type, as `f64`.
///
/// # Panics
///
/// For non floating point types.
pub fn inline_fp_null_value(ty: &Type) -> f64 {
    match (ty.id(), ty.size()) {
        (TypeId::FloatingPoint, 4) => NULL_FLOAT as f64,
        (TypeId::FloatingPoint, 8) => NULL_DOUBLE,
        _ => panic!("no inline floating point null for type {ty}"),
    }
}

/// Null sentinel of any scalar type as an int64 bit pattern.
///
/// Floats are returned as the bits of the value at their own width, zero
/// extended (`f32::to_bits` for 4 bytes, `f64::to_bits` for 8).
pub fn inline_null_bits(ty: &Type) -> i64 {
    match (ty.id(), ty.size()) {
        (TypeId::FloatingPoint, 4) => NULL_FLOAT.to_bits() as i64,
        (TypeId::FloatingPoint, _) => NULL_DOUBLE.to_bits() as i64,
        _ => inline_int_null_value(ty),
    }
}

/// `(max, min)` of a signed integer of `byte_width` bytes.
///
/// # Panics
///
/// For widths other than 1, 2, 4 or 8.
pub fn inline_int_max_min(byte_width: usize) -> (i64, i64) {
    match byte_width {
        1 => (i8::MAX as i64, i8::MIN as i64),
        2 => (i16::MAX as i64, i16::MIN as i64),
        4 => (i32::MAX as i64, i32::MIN as i64),
        8 => (i64::MAX, i64::MIN),
        _ => panic!("unsupported integer byte width {byte_width}"),
    }
}

/// `(max, min)` of an unsigned integer of `byte_width` bytes.
///
/// # Panics
///
/// For widths other than 1, 2, 4 or 8.
pub fn inline_uint_max_min(byte_width: usize) -> (u64, u64) {
    match byte_width {
        1 => (u8::MAX as u64, u8::MIN as u64),
        2 => (u16::MAX as u64, u16::MIN as u64),
        4 => (u32::MAX as u64, u32::MIN as u64),
        8 => (u64::MAX, u64::MIN),
        _ => panic!("unsupported unsigned byte width {byte_width}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeContext;

    #[test]
    fn int_nulls_follow_logical_width() {
        let ctx = TypeContext::global();
        assert_eq!(inline_int_null_value(ctx.int16(true)), i16::MIN as i64);
        assert_eq!(inline_int_null_value(ctx.boolean(true)), -128);
        // Narrow dictionaries are read through their 4-byte logical form.
        let dict = ctx.ext_dict(ctx.text(true), 1, 2);
        assert_eq!(inline_int_null_value(dict), i32::MIN as i64);
        assert_eq!(inline_int_null_value(ctx.date32(true)), i64::MIN);
    }

    #[test]
    fn float_null_bits() {
        let ctx = TypeContext::global();
        assert_eq!(
            inline_null_bits(ctx.fp32(true)),
            f32::MIN_POSITIVE.to_bits() as i64
        );
        assert_eq!(inline_fp_null_value(ctx.fp64(true)), f64::MIN_POSITIVE);
    }

    #[test]
    #[should_panic(expected = "unsupported integer byte width")]
    fn odd_width_panics() {
        inline_int_max_min(3);
    }

    #[test]
    fn uint_ranges() {
        assert_eq!(inline_uint_max_min(2), (65_535, 0));
        assert_eq!(inline_uint_max_min(8).0, u64::MAX);
    }
}
