//! Mapping from Arrow data types to vexc types.

use arrow::datatypes::{DataType, TimeUnit as ArrowTimeUnit};

use vexc_result::{Error, Result};

use crate::context::TypeContext;
use crate::types::{TimeUnit, TypeRef};

fn time_unit_from_arrow(unit: &ArrowTimeUnit) -> TimeUnit {
    match unit {
        ArrowTimeUnit::Second => TimeUnit::Second,
        ArrowTimeUnit::Millisecond => TimeUnit::Milli,
        ArrowTimeUnit::Microsecond => TimeUnit::Micro,
        ArrowTimeUnit::Nanosecond => TimeUnit::Nano,
    }
}

/// The vexc type of an Arrow column.
pub fn type_from_arrow(data_type: &DataType, nullable: bool) -> Result<TypeRef> {
    let ctx = TypeContext::global();
    let ty = match data_type {
        DataType::Null => ctx.null(),
        DataType::Boolean => ctx.boolean(nullable),
        DataType::Int8 => ctx.int8(nullable),
        DataType::Int16 => ctx.int16(nullable),
        DataType::Int32 => ctx.int32(nullable),
        DataType::Int64 => ctx.int64(nullable),
        // Unsigned values widen to the next signed width.
        DataType::UInt8 => ctx.int16(nullable),
        DataType::UInt16 => ctx.int32(nullable),
        DataType::UInt32 => ctx.int64(nullable),
        DataType::Float32 => ctx.fp32(nullable),
        DataType::Float64 => ctx.fp64(nullable),
        DataType::Decimal128(precision, scale) if *precision <= 18 => {
            ctx.decimal64(*precision as i32, *scale as i32, nullable)
        }
        DataType::Utf8 | DataType::LargeUtf8 => ctx.text(nullable),
        DataType::Date32 => ctx.date32(nullable),
        DataType::Date64 => ctx.date64(TimeUnit::Milli, nullable),
        DataType::Time32(unit) => ctx.time(4, time_unit_from_arrow(unit), nullable),
        DataType::Time64(unit) => ctx.time64(time_unit_from_arrow(unit), nullable),
        DataType::Timestamp(unit, _) => ctx.timestamp(time_unit_from_arrow(unit), nullable),
        DataType::Dictionary(key, value) if value.as_ref() == &DataType::Utf8 => {
            let size = key.primitive_width().unwrap_or(4) as i32;
            ctx.ext_dict(ctx.text(nullable), 0, size)
        }
        DataType::List(field) => {
            let elem = type_from_arrow(field.data_type(), field.is_nullable())?;
            ctx.array_var_len(elem, 4, nullable)
        }
        DataType::FixedSizeList(field, len) => {
            let elem = type_from_arrow(field.data_type(), field.is_nullable())?;
            ctx.array_fixed(elem, *len, nullable)
        }
        other => {
            return Err(Error::unsupported(format!(
                "Arrow type {other} has no vexc equivalent"
            )));
        }
    };
    Ok(ty)
}
