use vexc_types::{
    TimeUnit, Type, TypeContext, TypeId, TypeRef, logical_size, logical_size_of_tag, logical_type,
};

/// One representative instance of every defined kind, nullable and not.
fn sample_types() -> Vec<TypeRef> {
    let ctx = TypeContext::global();
    let mut out = Vec::new();
    for nullable in [true, false] {
        out.extend([
            ctx.boolean(nullable),
            ctx.int8(nullable),
            ctx.int16(nullable),
            ctx.int32(nullable),
            ctx.int64(nullable),
            ctx.decimal64(12, 3, nullable),
            ctx.fp32(nullable),
            ctx.fp64(nullable),
            ctx.varchar(20, nullable),
            ctx.text(nullable),
            ctx.ext_dict(ctx.text(nullable), 2, 1),
            ctx.ext_dict(ctx.text(nullable), 2, 2),
            ctx.ext_dict(ctx.text(nullable), 2, 4),
            ctx.date32(nullable),
            ctx.date64(TimeUnit::Milli, nullable),
            ctx.time(4, TimeUnit::Second, nullable),
            ctx.time64(TimeUnit::Micro, nullable),
            ctx.timestamp(TimeUnit::Nano, nullable),
            ctx.interval(4, TimeUnit::Day, nullable),
            ctx.interval64(TimeUnit::Month, nullable),
            ctx.array_fixed(ctx.int32(true), 2, nullable),
            ctx.array_var_len(ctx.fp64(true), 4, nullable),
            ctx.column(ctx.int64(true), nullable),
            ctx.column_list(ctx.int16(true), 3, nullable),
        ]);
    }
    out.push(ctx.null());
    out
}

#[test]
fn logical_type_is_idempotent() {
    for ty in sample_types() {
        let once = logical_type(ty);
        let twice = logical_type(once);
        assert!(
            Type::same(once, twice),
            "logical_type not idempotent for {ty}: {once} vs {twice}"
        );
    }
}

#[test]
fn logical_type_preserves_nullability() {
    for ty in sample_types() {
        assert_eq!(logical_type(ty).nullable(), ty.nullable(), "{ty}");
    }
}

#[test]
fn logical_size_is_a_power_of_two_up_to_eight() {
    for ty in sample_types() {
        let size = logical_size(ty);
        assert!(
            matches!(size, 1 | 2 | 4 | 8),
            "unexpected logical size {size} for {ty}"
        );
    }
}

#[test]
fn logical_size_matches_logical_type_width() {
    for ty in sample_types() {
        if ty.id() == TypeId::FixedLenArray {
            continue;
        }
        assert_eq!(logical_size(ty), logical_type(ty).size(), "{ty}");
    }
}

#[test]
fn tags_round_trip_through_type_id() {
    for id in TypeId::ALL {
        assert_eq!(TypeId::try_from(id as u8).unwrap(), id);
    }
    assert!(TypeId::try_from(200).is_err());
}

#[test]
fn logical_size_of_known_tags() {
    assert_eq!(logical_size_of_tag(TypeId::ExtDictionary as u8, 1), 4);
    assert_eq!(logical_size_of_tag(TypeId::Date as u8, 4), 8);
    assert_eq!(logical_size_of_tag(TypeId::Integer as u8, 2), 2);
}

#[test]
#[should_panic(expected = "unknown type tag")]
fn logical_size_of_undefined_tag_panics() {
    logical_size_of_tag(0xff, 8);
}
