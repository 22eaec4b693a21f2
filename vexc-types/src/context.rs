//! Process-wide type interning.
//!
//! Lookups take a shared read lock; inserting a type that has not been seen
//! before takes the write lock and re-checks before leaking the new instance.

use std::sync::{OnceLock, PoisonError, RwLock};

use rustc_hash::FxHashSet;

use crate::types::{TimeUnit, Type, TypeId, TypeRef};

/// Owner of every [`Type`] instance. Types live for the rest of the process.
#[derive(Debug, Default)]
pub struct TypeContext {
    types: RwLock<FxHashSet<TypeRef>>,
}

static GLOBAL: OnceLock<TypeContext> = OnceLock::new();

impl TypeContext {
    /// The shared context every crate interns into.
    pub fn global() -> &'static TypeContext {
        GLOBAL.get_or_init(TypeContext::default)
    }

    pub(crate) fn intern(&self, ty: Type) -> TypeRef {
        {
            let types = self.types.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = types.get(&ty) {
                return *existing;
            }
        }
        let mut types = self.types.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = types.get(&ty) {
            return *existing;
        }
        let leaked: TypeRef = Box::leak(Box::new(ty));
        types.insert(leaked);
        tracing::trace!(ty = %leaked, "interned new type");
        leaked
    }

    /// Number of distinct types interned so far.
    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type of an untyped `NULL` literal. Occupies a byte-wide slot.
    pub fn null(&self) -> TypeRef {
        self.intern(Type::new(TypeId::Null, 1, true))
    }

    pub fn boolean(&self, nullable: bool) -> TypeRef {
        self.intern(Type::new(TypeId::Boolean, 1, nullable))
    }

    /// Integer of `size` bytes (1, 2, 4 or 8).
    pub fn integer(&self, size: i32, nullable: bool) -> TypeRef {
        self.intern(Type::new(TypeId::Integer, size, nullable))
    }

    pub fn int8(&self, nullable: bool) -> TypeRef {
        self.integer(1, nullable)
    }

    pub fn int16(&self, nullable: bool) -> TypeRef {
        self.integer(2, nullable)
    }

    pub fn int32(&self, nullable: bool) -> TypeRef {
        self.integer(4, nullable)
    }

    pub fn int64(&self, nullable: bool) -> TypeRef {
        self.integer(8, nullable)
    }

    pub fn decimal(&self, size: i32, precision: i32, scale: i32, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Decimal, size, nullable);
        ty.precision = precision;
        ty.scale = scale;
        self.intern(ty)
    }

    pub fn decimal64(&self, precision: i32, scale: i32, nullable: bool) -> TypeRef {
        self.decimal(8, precision, scale, nullable)
    }

    pub fn fp(&self, size: i32, nullable: bool) -> TypeRef {
        self.intern(Type::new(TypeId::FloatingPoint, size, nullable))
    }

    pub fn fp32(&self, nullable: bool) -> TypeRef {
        self.fp(4, nullable)
    }

    pub fn fp64(&self, nullable: bool) -> TypeRef {
        self.fp(8, nullable)
    }

    /// Variable-length string with a maximum length. The slot holds a 4-byte
    /// offset into the string payload.
    pub fn varchar(&self, max_length: i32, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::VarChar, 4, nullable);
        ty.precision = max_length;
        self.intern(ty)
    }

    pub fn text(&self, nullable: bool) -> TypeRef {
        self.intern(Type::new(TypeId::Text, 4, nullable))
    }

    /// Dictionary-encoded `elem` stored with `size`-byte surrogate keys.
    pub fn ext_dict(&self, elem: TypeRef, dict_id: i32, size: i32) -> TypeRef {
        let mut ty = Type::new(TypeId::ExtDictionary, size, elem.nullable());
        ty.dict_id = dict_id;
        ty.elem = Some(elem);
        self.intern(ty)
    }

    pub fn date(&self, size: i32, unit: TimeUnit, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Date, size, nullable);
        ty.unit = Some(unit);
        self.intern(ty)
    }

    /// Days since the epoch in four bytes.
    pub fn date32(&self, nullable: bool) -> TypeRef {
        self.date(4, TimeUnit::Day, nullable)
    }

    pub fn date64(&self, unit: TimeUnit, nullable: bool) -> TypeRef {
        self.date(8, unit, nullable)
    }

    pub fn time(&self, size: i32, unit: TimeUnit, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Time, size, nullable);
        ty.unit = Some(unit);
        self.intern(ty)
    }

    pub fn time64(&self, unit: TimeUnit, nullable: bool) -> TypeRef {
        self.time(8, unit, nullable)
    }

    pub fn timestamp(&self, unit: TimeUnit, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Timestamp, 8, nullable);
        ty.unit = Some(unit);
        self.intern(ty)
    }

    pub fn interval(&self, size: i32, unit: TimeUnit, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Interval, size, nullable);
        ty.unit = Some(unit);
        self.intern(ty)
    }

    pub fn interval64(&self, unit: TimeUnit, nullable: bool) -> TypeRef {
        self.interval(8, unit, nullable)
    }

    /// Array of exactly `num_elems` inline elements.
    pub fn array_fixed(&self, elem: TypeRef, num_elems: i32, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::FixedLenArray, elem.size() * num_elems, nullable);
        ty.precision = num_elems;
        ty.elem = Some(elem);
        self.intern(ty)
    }

    /// Variable-length array whose slot is a `size`-byte length header.
    pub fn array_var_len(&self, elem: TypeRef, size: i32, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::VarLenArray, size, nullable);
        ty.elem = Some(elem);
        self.intern(ty)
    }

    pub fn column(&self, elem: TypeRef, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::Column, elem.size(), nullable);
        ty.elem = Some(elem);
        self.intern(ty)
    }

    pub fn column_list(&self, elem: TypeRef, length: i32, nullable: bool) -> TypeRef {
        let mut ty = Type::new(TypeId::ColumnList, elem.size(), nullable);
        ty.precision = length;
        ty.elem = Some(elem);
        self.intern(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_types_share_an_instance() {
        let ctx = TypeContext::global();
        let a = ctx.int32(true);
        let b = ctx.int32(true);
        assert!(Type::same(a, b));
        assert!(!Type::same(a, ctx.int32(false)));
        assert!(Type::same(a.with_nullable(false), ctx.int32(false)));
    }

    #[test]
    fn nested_types_intern_by_content() {
        let ctx = TypeContext::global();
        let a = ctx.array_var_len(ctx.fp64(true), 4, true);
        let b = ctx.array_var_len(ctx.fp64(true), 4, true);
        assert!(Type::same(a, b));
        let dict = ctx.ext_dict(ctx.text(true), 7, 2);
        assert_eq!(dict.dict_id(), 7);
        assert!(dict.is_dict_text());
    }

    #[test]
    fn concurrent_interning_yields_one_instance() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    TypeContext::global().decimal64(18, 4, true) as *const Type as usize
                })
            })
            .collect();
        let addrs: FxHashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(addrs.len(), 1);
    }
}
