//! Logical (in-memory layout) views of storage types.

use crate::context::TypeContext;
use crate::types::{TimeUnit, Type, TypeId, TypeRef};

/// Canonical representation used for in-memory layout decisions.
///
/// Storage may keep dictionary keys, dates, times and intervals in narrower
/// encodings and arrays inline. Query buffers always use the widened form
/// produced here. Applying it twice yields the same interned instance.
pub fn logical_type(ty: TypeRef) -> TypeRef {
    let ctx = TypeContext::global();
    match ty.id() {
        TypeId::ExtDictionary if ty.size() != 4 => {
            let mut widened = ty.clone_fields();
            widened.size = 4;
            ctx.intern(widened)
        }
        TypeId::Date => {
            if ty.unit() != Some(TimeUnit::Second) || ty.size() != 8 {
                ctx.date64(TimeUnit::Second, ty.nullable())
            } else {
                ty
            }
        }
        TypeId::Time if ty.size() != 8 => {
            ctx.time64(ty.unit().unwrap_or(TimeUnit::Second), ty.nullable())
        }
        TypeId::Interval if ty.size() != 8 => {
            ctx.interval64(ty.unit().unwrap_or(TimeUnit::Second), ty.nullable())
        }
        TypeId::FixedLenArray => match ty.elem_type() {
            Some(elem) => ctx.array_var_len(elem, 4, ty.nullable()),
            None => ty,
        },
        _ => ty,
    }
}

/// Physical byte width of a type's logical representation.
pub fn logical_size(ty: &Type) -> i32 {
    match ty.id() {
        TypeId::Null
        | TypeId::Boolean
        | TypeId::Integer
        | TypeId::Decimal
        | TypeId::FloatingPoint
        | TypeId::FixedLenArray
        | TypeId::Column
        | TypeId::ColumnList
        | TypeId::VarLenArray
        | TypeId::VarChar
        | TypeId::Text => ty.size(),
        TypeId::ExtDictionary => 4,
        TypeId::Timestamp | TypeId::Time | TypeId::Date | TypeId::Interval => 8,
    }
}

/// [`logical_size`] for a type given by its raw tag and declared size.
///
/// # Panics
///
/// On a tag outside the defined kinds. Such a tag can only come from a
/// corrupted or foreign plan.
pub fn logical_size_of_tag(tag: u8, declared_size: i32) -> i32 {
    let Ok(id) = TypeId::try_from(tag) else {
        panic!("logical_size: unknown type tag {tag}");
    };
    match id {
        TypeId::ExtDictionary => 4,
        TypeId::Timestamp | TypeId::Time | TypeId::Date | TypeId::Interval => 8,
        _ => declared_size,
    }
}

/// Canonical result type of a projected expression.
///
/// Like [`logical_type`], and additionally unwraps column and column-list
/// types to their element.
pub fn canonicalize(ty: TypeRef) -> TypeRef {
    match ty.id() {
        TypeId::Column | TypeId::ColumnList => match ty.elem_type() {
            Some(elem) => canonicalize(elem),
            None => ty,
        },
        _ => logical_type(ty),
    }
}

/// Bit width used by buffer compaction.
pub fn get_bit_width(ty: &Type) -> i32 {
    match ty.id() {
        TypeId::Null | TypeId::Boolean => 8,
        TypeId::ExtDictionary => 32,
        TypeId::VarChar | TypeId::Text | TypeId::VarLenArray | TypeId::FixedLenArray => 64,
        TypeId::Column | TypeId::ColumnList => 64,
        _ => logical_size(ty) * 8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_widens_to_four_bytes() {
        let ctx = TypeContext::global();
        let narrow = ctx.ext_dict(ctx.text(true), 3, 1);
        let wide = logical_type(narrow);
        assert_eq!(wide.size(), 4);
        assert_eq!(wide.dict_id(), 3);
        assert!(Type::same(wide, ctx.ext_dict(ctx.text(true), 3, 4)));
    }

    #[test]
    fn date_in_days_becomes_seconds() {
        let ctx = TypeContext::global();
        let lt = logical_type(ctx.date32(false));
        assert_eq!(lt.unit(), Some(TimeUnit::Second));
        assert_eq!(lt.size(), 8);
        assert!(!lt.nullable());

        let already = ctx.date64(TimeUnit::Second, true);
        assert!(Type::same(logical_type(already), already));
    }

    #[test]
    fn narrow_time_keeps_unit() {
        let ctx = TypeContext::global();
        let lt = logical_type(ctx.time(4, TimeUnit::Milli, true));
        assert_eq!(lt.size(), 8);
        assert_eq!(lt.unit(), Some(TimeUnit::Milli));
    }

    #[test]
    fn fixed_array_becomes_var_len() {
        let ctx = TypeContext::global();
        let lt = logical_type(ctx.array_fixed(ctx.int32(true), 3, true));
        assert!(lt.is_var_len_array());
        assert_eq!(lt.size(), 4);
        assert!(Type::same(lt.elem_type().unwrap(), ctx.int32(true)));
    }

    #[test]
    fn canonicalize_unwraps_columns() {
        let ctx = TypeContext::global();
        let col = ctx.column(ctx.date32(true), true);
        assert!(Type::same(
            canonicalize(col),
            ctx.date64(TimeUnit::Second, true)
        ));
    }
}
