//! Sentinel-encoded column buffers read by row routines.
//!
//! A routine receives one pointer per input column. Each buffer holds the
//! column's values in their logical width with nulls replaced by the type's
//! inline null sentinel; array columns hold an `i32` length header per row,
//! `-1` for a null array. [`ColumnBuffers::from_arrays`] adapts Arrow arrays
//! into this layout.

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Date64Type, Decimal128Type, Float32Type,
    Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, Time32MillisecondType,
    Time32SecondType, Time64MicrosecondType, Time64NanosecondType, TimeUnit as ArrowTimeUnit,
    TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt8Type, UInt16Type, UInt32Type,
};
use vexc_result::{Error, Result};
use vexc_types::datetime::{MILLISECS_PER_SEC, SECS_PER_DAY};
use vexc_types::{
    NULL_ARRAY_LENGTH, NULL_BOOLEAN, Type, TypeId, TypeRef, inline_fp_null_value,
    inline_int_null_value, logical_size, logical_type, type_from_arrow,
};

use crate::ir::IrType;

/// IR type of one value of a column of `ty` as it sits in its buffer.
///
/// Arrays are addressed through their buffer pointer. Non-dictionary strings
/// have no fixed-width representation.
pub fn storage_ir_type(ty: &Type) -> Result<IrType> {
    match ty.id() {
        TypeId::Null | TypeId::Boolean => Ok(IrType::I8),
        TypeId::Integer
        | TypeId::Decimal
        | TypeId::ExtDictionary
        | TypeId::Date
        | TypeId::Time
        | TypeId::Timestamp
        | TypeId::Interval => Ok(IrType::int(logical_size(ty) as u32 * 8)),
        TypeId::FloatingPoint => Ok(if ty.size() == 4 {
            IrType::F32
        } else {
            IrType::F64
        }),
        TypeId::FixedLenArray | TypeId::VarLenArray => Ok(IrType::Ptr),
        TypeId::Column | TypeId::ColumnList => match ty.elem_type() {
            Some(elem) => storage_ir_type(elem),
            None => Err(Error::unsupported(format!("column type {ty} without element"))),
        },
        TypeId::VarChar | TypeId::Text => Err(Error::unsupported(format!(
            "none-encoded string column of type {ty}"
        ))),
    }
}

/// Values of one column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    /// Array lengths, `-1` for null.
    ArrayHeaders(Vec<i32>),
}

impl ColumnData {
    /// Integer-like values of `ty`, encoded at its logical width.
    pub fn from_ints(ty: &Type, values: &[Option<i64>]) -> Result<ColumnData> {
        let null = inline_int_null_value(ty);
        let encoded = values.iter().map(|v| v.unwrap_or(null));
        fn narrow<T: TryFrom<i64>>(ty: &Type, it: impl Iterator<Item = i64>) -> Result<Vec<T>> {
            it.map(|v| {
                T::try_from(v).map_err(|_| {
                    Error::InvalidArgumentError(format!("value {v} does not fit a {ty} column"))
                })
            })
            .collect()
        }
        Ok(match storage_ir_type(ty)? {
            IrType::I8 => ColumnData::I8(narrow(ty, encoded)?),
            IrType::I16 => ColumnData::I16(narrow(ty, encoded)?),
            IrType::I32 => ColumnData::I32(narrow(ty, encoded)?),
            IrType::I64 => ColumnData::I64(encoded.collect()),
            other => {
                return Err(Error::InvalidArgumentError(format!(
                    "{ty} is stored as {other}, not as integers"
                )));
            }
        })
    }

    /// Floating point values of `ty`.
    pub fn from_floats(ty: &Type, values: &[Option<f64>]) -> Result<ColumnData> {
        let null = inline_fp_null_value(ty);
        let encoded = values.iter().map(|v| v.unwrap_or(null));
        match storage_ir_type(ty)? {
            IrType::F32 => Ok(ColumnData::F32(encoded.map(|v| v as f32).collect())),
            IrType::F64 => Ok(ColumnData::F64(encoded.collect())),
            other => Err(Error::InvalidArgumentError(format!(
                "{ty} is stored as {other}, not as floats"
            ))),
        }
    }

    pub fn from_bools(values: &[Option<bool>]) -> ColumnData {
        ColumnData::I8(
            values
                .iter()
                .map(|v| v.map(|b| b as i8).unwrap_or(NULL_BOOLEAN))
                .collect(),
        )
    }

    /// Array headers from per-row lengths.
    pub fn from_array_lengths(lengths: &[Option<usize>]) -> ColumnData {
        ColumnData::ArrayHeaders(
            lengths
                .iter()
                .map(|l| l.map(|n| n as i32).unwrap_or(NULL_ARRAY_LENGTH))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::I8(v) => v.len(),
            ColumnData::I16(v) => v.len(),
            ColumnData::I32(v) | ColumnData::ArrayHeaders(v) => v.len(),
            ColumnData::I64(v) => v.len(),
            ColumnData::F32(v) => v.len(),
            ColumnData::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ir_type(&self) -> IrType {
        match self {
            ColumnData::I8(_) => IrType::I8,
            ColumnData::I16(_) => IrType::I16,
            ColumnData::I32(_) => IrType::I32,
            ColumnData::I64(_) => IrType::I64,
            ColumnData::F32(_) => IrType::F32,
            ColumnData::F64(_) => IrType::F64,
            ColumnData::ArrayHeaders(_) => IrType::Ptr,
        }
    }

    pub fn as_ptr(&self) -> *const u8 {
        match self {
            ColumnData::I8(v) => v.as_ptr().cast(),
            ColumnData::I16(v) => v.as_ptr().cast(),
            ColumnData::I32(v) | ColumnData::ArrayHeaders(v) => v.as_ptr().cast(),
            ColumnData::I64(v) => v.as_ptr().cast(),
            ColumnData::F32(v) => v.as_ptr().cast(),
            ColumnData::F64(v) => v.as_ptr().cast(),
        }
    }

    /// Integer value at `pos`, sign-extended.
    pub fn int_at(&self, pos: usize) -> Option<i64> {
        match self {
            ColumnData::I8(v) => Some(v[pos] as i64),
            ColumnData::I16(v) => Some(v[pos] as i64),
            ColumnData::I32(v) => Some(v[pos] as i64),
            ColumnData::I64(v) => Some(v[pos]),
            _ => None,
        }
    }

    pub fn float_at(&self, pos: usize) -> Option<f64> {
        match self {
            ColumnData::F32(v) => Some(v[pos] as f64),
            ColumnData::F64(v) => Some(v[pos]),
            _ => None,
        }
    }

    pub fn array_headers(&self) -> Option<&[i32]> {
        match self {
            ColumnData::ArrayHeaders(v) => Some(v),
            _ => None,
        }
    }
}

/// The column buffers of one batch of rows.
#[derive(Clone, Debug, Default)]
pub struct ColumnBuffers {
    columns: Vec<ColumnData>,
    num_rows: usize,
}

impl ColumnBuffers {
    /// Empty set for `num_rows` rows; routines without inputs still run once
    /// per row.
    pub fn new(num_rows: usize) -> Self {
        Self {
            columns: Vec::new(),
            num_rows,
        }
    }

    pub fn push(&mut self, data: ColumnData) -> Result<()> {
        if data.len() != self.num_rows {
            return Err(Error::InvalidArgumentError(format!(
                "column of {} rows in a batch of {} rows",
                data.len(),
                self.num_rows
            )));
        }
        self.columns.push(data);
        Ok(())
    }

    /// Convert Arrow arrays, one per routine input, into buffers for the
    /// given logical column types. Each array's own type, read through
    /// [`type_from_arrow`], must be of the same kind as its column.
    pub fn from_arrays(arrays: &[ArrayRef], types: &[TypeRef]) -> Result<Self> {
        if arrays.len() != types.len() {
            return Err(Error::InvalidArgumentError(format!(
                "{} arrays for {} input columns",
                arrays.len(),
                types.len()
            )));
        }
        let num_rows = arrays.first().map(|a| a.len()).unwrap_or(0);
        let mut buffers = Self::new(num_rows);
        for (array, ty) in arrays.iter().zip(types) {
            let source = logical_type(type_from_arrow(array.data_type(), ty.nullable())?);
            if source.id() != ty.id() {
                return Err(Error::InvalidArgumentError(format!(
                    "{source} array for a {ty} input column"
                )));
            }
            buffers.push(convert_array(array.as_ref(), ty)?)?;
        }
        tracing::trace!(
            columns = buffers.columns.len(),
            rows = num_rows,
            "adapted arrow arrays"
        );
        Ok(buffers)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    pub fn column(&self, slot: usize) -> &ColumnData {
        &self.columns[slot]
    }

    /// Base pointer per column, in slot order. Valid while `self` is neither
    /// moved out of nor mutated.
    pub fn raw_pointers(&self) -> Vec<*const u8> {
        self.columns.iter().map(ColumnData::as_ptr).collect()
    }

    /// Check that column `i` is laid out as `expected[i]`.
    pub fn validate(&self, expected: &[IrType]) -> Result<()> {
        if self.columns.len() != expected.len() {
            return Err(Error::InvalidArgumentError(format!(
                "routine reads {} columns, {} supplied",
                expected.len(),
                self.columns.len()
            )));
        }
        for (slot, (data, ty)) in self.columns.iter().zip(expected).enumerate() {
            if data.ir_type() != *ty {
                return Err(Error::InvalidArgumentError(format!(
                    "column {slot} holds {} values, routine expects {ty}",
                    data.ir_type()
                )));
            }
        }
        Ok(())
    }
}

fn ints<T: ArrowPrimitiveType>(
    array: &dyn Array,
    f: impl Fn(T::Native) -> i64,
) -> Vec<Option<i64>> {
    array.as_primitive::<T>().iter().map(|v| v.map(&f)).collect()
}

fn convert_array(array: &dyn Array, ty: &Type) -> Result<ColumnData> {
    let values: Vec<Option<i64>> = match array.data_type() {
        DataType::Boolean => {
            let bools: Vec<Option<bool>> = array.as_boolean().iter().collect();
            return Ok(ColumnData::from_bools(&bools));
        }
        DataType::Int8 => ints::<Int8Type>(array, i64::from),
        DataType::Int16 => ints::<Int16Type>(array, i64::from),
        DataType::Int32 => ints::<Int32Type>(array, i64::from),
        DataType::Int64 => ints::<Int64Type>(array, |v| v),
        DataType::UInt8 => ints::<UInt8Type>(array, i64::from),
        DataType::UInt16 => ints::<UInt16Type>(array, i64::from),
        DataType::UInt32 => ints::<UInt32Type>(array, i64::from),
        DataType::Date32 => ints::<Date32Type>(array, |d| d as i64 * SECS_PER_DAY),
        DataType::Date64 => ints::<Date64Type>(array, |ms| ms.div_euclid(MILLISECS_PER_SEC)),
        DataType::Time32(ArrowTimeUnit::Second) => {
            ints::<Time32SecondType>(array, i64::from)
        }
        DataType::Time32(_) => ints::<Time32MillisecondType>(array, i64::from),
        DataType::Time64(ArrowTimeUnit::Microsecond) => {
            ints::<Time64MicrosecondType>(array, |v| v)
        }
        DataType::Time64(_) => ints::<Time64NanosecondType>(array, |v| v),
        DataType::Timestamp(ArrowTimeUnit::Second, _) => {
            ints::<TimestampSecondType>(array, |v| v)
        }
        DataType::Timestamp(ArrowTimeUnit::Millisecond, _) => {
            ints::<TimestampMillisecondType>(array, |v| v)
        }
        DataType::Timestamp(ArrowTimeUnit::Microsecond, _) => {
            ints::<TimestampMicrosecondType>(array, |v| v)
        }
        DataType::Timestamp(ArrowTimeUnit::Nanosecond, _) => {
            ints::<TimestampNanosecondType>(array, |v| v)
        }
        DataType::Decimal128(..) => array
            .as_primitive::<Decimal128Type>()
            .iter()
            .map(|v| {
                v.map(|d| {
                    i64::try_from(d).map_err(|_| {
                        Error::NumericOverflow(format!("decimal {d} exceeds 64 bits"))
                    })
                })
                .transpose()
            })
            .collect::<Result<_>>()?,
        DataType::Dictionary(key, _) if key.as_ref() == &DataType::Int32 => array
            .as_dictionary::<Int32Type>()
            .keys()
            .iter()
            .map(|k| k.map(i64::from))
            .collect(),
        DataType::Float32 => {
            let floats: Vec<Option<f64>> = array
                .as_primitive::<Float32Type>()
                .iter()
                .map(|v| v.map(f64::from))
                .collect();
            return ColumnData::from_floats(ty, &floats);
        }
        DataType::Float64 => {
            let floats: Vec<Option<f64>> = array.as_primitive::<Float64Type>().iter().collect();
            return ColumnData::from_floats(ty, &floats);
        }
        DataType::List(_) => {
            let list = array.as_list::<i32>();
            let lengths: Vec<Option<usize>> = (0..list.len())
                .map(|i| (!list.is_null(i)).then(|| list.value_length(i) as usize))
                .collect();
            return Ok(ColumnData::from_array_lengths(&lengths));
        }
        DataType::FixedSizeList(_, len) => {
            let lengths: Vec<Option<usize>> = (0..array.len())
                .map(|i| (!array.is_null(i)).then_some(*len as usize))
                .collect();
            return Ok(ColumnData::from_array_lengths(&lengths));
        }
        other => {
            return Err(Error::unsupported(format!(
                "Arrow type {other} as routine input"
            )));
        }
    };
    ColumnData::from_ints(ty, &values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        BooleanArray, Date32Array, Float32Array, Int32Array, ListArray, UInt8Array,
    };
    use arrow::datatypes::Int32Type as ListElem;
    use std::sync::Arc;
    use vexc_types::{NULL_FLOAT, TypeContext};

    #[test]
    fn nulls_become_sentinels() {
        let ctx = TypeContext::global();
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![Some(4), None, Some(-2)]));
        let floats: ArrayRef = Arc::new(Float32Array::from(vec![None, Some(1.5), Some(0.0)]));
        let bools: ArrayRef = Arc::new(BooleanArray::from(vec![Some(true), None, Some(false)]));
        let buffers = ColumnBuffers::from_arrays(
            &[ints, floats, bools],
            &[ctx.int32(true), ctx.fp32(true), ctx.boolean(true)],
        )
        .unwrap();
        assert_eq!(buffers.num_rows(), 3);
        assert_eq!(buffers.column(0), &ColumnData::I32(vec![4, i32::MIN, -2]));
        assert_eq!(buffers.column(1), &ColumnData::F32(vec![NULL_FLOAT, 1.5, 0.0]));
        assert_eq!(buffers.column(2), &ColumnData::I8(vec![1, NULL_BOOLEAN, 0]));
    }

    #[test]
    fn dates_are_widened_to_seconds() {
        let ctx = TypeContext::global();
        let days: ArrayRef = Arc::new(Date32Array::from(vec![Some(1), None]));
        let ty = logical_type(ctx.date32(true));
        let buffers = ColumnBuffers::from_arrays(&[days], &[ty]).unwrap();
        assert_eq!(buffers.column(0), &ColumnData::I64(vec![86_400, i64::MIN]));
    }

    #[test]
    fn lists_become_length_headers() {
        let ctx = TypeContext::global();
        let list: ArrayRef = Arc::new(ListArray::from_iter_primitive::<ListElem, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
            Some(vec![]),
        ]));
        let ty = ctx.array_var_len(ctx.int32(true), 4, true);
        let buffers = ColumnBuffers::from_arrays(&[list], &[ty]).unwrap();
        assert_eq!(buffers.column(0), &ColumnData::ArrayHeaders(vec![2, -1, 0]));
    }

    #[test]
    fn arrays_must_match_their_column_kind() {
        let ctx = TypeContext::global();
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let err = ColumnBuffers::from_arrays(&[ints], &[ctx.fp64(false)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));

        let bytes: ArrayRef = Arc::new(UInt8Array::from(vec![Some(200), None]));
        let buffers = ColumnBuffers::from_arrays(&[bytes], &[ctx.int16(true)]).unwrap();
        assert_eq!(buffers.column(0), &ColumnData::I16(vec![200, i16::MIN]));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let ctx = TypeContext::global();
        let err = ColumnData::from_ints(ctx.int16(false), &[Some(1 << 20)]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
    }

    #[test]
    fn validation_checks_layout() {
        let ctx = TypeContext::global();
        let mut buffers = ColumnBuffers::new(2);
        buffers
            .push(ColumnData::from_ints(ctx.int64(true), &[Some(1), None]).unwrap())
            .unwrap();
        assert!(buffers.validate(&[IrType::I64]).is_ok());
        assert!(buffers.validate(&[IrType::I32]).is_err());
        assert!(buffers.push(ColumnData::I8(vec![0])).is_err());
    }

    #[test]
    fn strings_have_no_buffer_layout() {
        let ctx = TypeContext::global();
        assert!(matches!(
            storage_ir_type(ctx.text(true)),
            Err(Error::Unsupported(_))
        ));
        assert_eq!(
            storage_ir_type(ctx.ext_dict(ctx.text(true), 1, 2)).unwrap(),
            IrType::I32
        );
    }
}
