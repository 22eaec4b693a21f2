//! The [`Type`] value and its kind/unit enums.
//!
//! Types are immutable and interned by [`TypeContext`](crate::TypeContext).
//! Code holds [`TypeRef`]s (`&'static Type`), and two equal types are always
//! the same instance, so `std::ptr::eq` can stand in for deep comparison.

use std::fmt;

use vexc_result::Error;

use crate::context::TypeContext;

/// Non-owning reference into the process-wide interning context.
pub type TypeRef = &'static Type;

/// Logical kind of a [`Type`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TypeId {
    Null = 0,
    Boolean = 1,
    Integer = 2,
    Decimal = 3,
    FloatingPoint = 4,
    VarChar = 5,
    Text = 6,
    ExtDictionary = 7,
    Date = 8,
    Time = 9,
    Timestamp = 10,
    Interval = 11,
    FixedLenArray = 12,
    VarLenArray = 13,
    Column = 14,
    ColumnList = 15,
}

impl TypeId {
    pub const ALL: [TypeId; 16] = [
        TypeId::Null,
        TypeId::Boolean,
        TypeId::Integer,
        TypeId::Decimal,
        TypeId::FloatingPoint,
        TypeId::VarChar,
        TypeId::Text,
        TypeId::ExtDictionary,
        TypeId::Date,
        TypeId::Time,
        TypeId::Timestamp,
        TypeId::Interval,
        TypeId::FixedLenArray,
        TypeId::VarLenArray,
        TypeId::Column,
        TypeId::ColumnList,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TypeId::Null => "null",
            TypeId::Boolean => "bool",
            TypeId::Integer => "int",
            TypeId::Decimal => "dec",
            TypeId::FloatingPoint => "fp",
            TypeId::VarChar => "varchar",
            TypeId::Text => "text",
            TypeId::ExtDictionary => "dict",
            TypeId::Date => "date",
            TypeId::Time => "time",
            TypeId::Timestamp => "timestamp",
            TypeId::Interval => "interval",
            TypeId::FixedLenArray => "array_fixed",
            TypeId::VarLenArray => "array",
            TypeId::Column => "column",
            TypeId::ColumnList => "column_list",
        }
    }
}

impl TryFrom<u8> for TypeId {
    type Error = Error;

    /// Decode a raw type tag. This is the only way a numeric tag becomes a
    /// [`TypeId`], so unknown kinds are rejected at the boundary.
    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        TypeId::ALL
            .get(tag as usize)
            .copied()
            .ok_or_else(|| Error::InvalidArgumentError(format!("unknown type tag {tag}")))
    }
}

/// Unit of a temporal type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Month,
    Day,
    Second,
    Milli,
    Micro,
    Nano,
}

impl TimeUnit {
    /// Fractional-second digits carried by the unit (0 for second and coarser).
    pub fn dimension(&self) -> i32 {
        match self {
            TimeUnit::Month | TimeUnit::Day | TimeUnit::Second => 0,
            TimeUnit::Milli => 3,
            TimeUnit::Micro => 6,
            TimeUnit::Nano => 9,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Month => "m",
            TimeUnit::Day => "d",
            TimeUnit::Second => "s",
            TimeUnit::Milli => "ms",
            TimeUnit::Micro => "us",
            TimeUnit::Nano => "ns",
        }
    }
}

/// Immutable description of a scalar, array or column type.
///
/// Construct through [`TypeContext`]; the fields are private so every
/// instance in the process goes through interning.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub(crate) id: TypeId,
    pub(crate) size: i32,
    pub(crate) nullable: bool,
    pub(crate) unit: Option<TimeUnit>,
    pub(crate) precision: i32,
    pub(crate) scale: i32,
    pub(crate) dict_id: i32,
    pub(crate) elem: Option<TypeRef>,
}

impl Type {
    pub(crate) fn new(id: TypeId, size: i32, nullable: bool) -> Self {
        Self {
            id,
            size,
            nullable,
            unit: None,
            precision: 0,
            scale: 0,
            dict_id: 0,
            elem: None,
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Declared byte width.
    #[inline]
    pub fn size(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn nullable(&self) -> bool {
        self.nullable
    }

    #[inline]
    pub fn unit(&self) -> Option<TimeUnit> {
        self.unit
    }

    /// Decimal precision, or the maximum length of a `VARCHAR`.
    #[inline]
    pub fn precision(&self) -> i32 {
        self.precision
    }

    #[inline]
    pub fn scale(&self) -> i32 {
        self.scale
    }

    #[inline]
    pub fn dict_id(&self) -> i32 {
        self.dict_id
    }

    /// Element type of dictionaries, arrays, columns and column lists.
    #[inline]
    pub fn elem_type(&self) -> Option<TypeRef> {
        self.elem
    }

    pub fn is_null(&self) -> bool {
        self.id == TypeId::Null
    }

    pub fn is_boolean(&self) -> bool {
        self.id == TypeId::Boolean
    }

    pub fn is_integer(&self) -> bool {
        self.id == TypeId::Integer
    }

    pub fn is_int8(&self) -> bool {
        self.is_integer() && self.size == 1
    }

    pub fn is_int16(&self) -> bool {
        self.is_integer() && self.size == 2
    }

    pub fn is_int32(&self) -> bool {
        self.is_integer() && self.size == 4
    }

    pub fn is_int64(&self) -> bool {
        self.is_integer() && self.size == 8
    }

    pub fn is_decimal(&self) -> bool {
        self.id == TypeId::Decimal
    }

    pub fn is_floating_point(&self) -> bool {
        self.id == TypeId::FloatingPoint
    }

    pub fn is_fp32(&self) -> bool {
        self.is_floating_point() && self.size == 4
    }

    pub fn is_fp64(&self) -> bool {
        self.is_floating_point() && self.size == 8
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.id,
            TypeId::Integer | TypeId::Decimal | TypeId::FloatingPoint
        )
    }

    pub fn is_string(&self) -> bool {
        matches!(self.id, TypeId::VarChar | TypeId::Text)
    }

    pub fn is_ext_dictionary(&self) -> bool {
        self.id == TypeId::ExtDictionary
    }

    pub fn is_date(&self) -> bool {
        self.id == TypeId::Date
    }

    pub fn is_time(&self) -> bool {
        self.id == TypeId::Time
    }

    pub fn is_timestamp(&self) -> bool {
        self.id == TypeId::Timestamp
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self.id, TypeId::Date | TypeId::Time | TypeId::Timestamp)
    }

    pub fn is_interval(&self) -> bool {
        self.id == TypeId::Interval
    }

    pub fn is_array(&self) -> bool {
        matches!(self.id, TypeId::FixedLenArray | TypeId::VarLenArray)
    }

    pub fn is_fixed_len_array(&self) -> bool {
        self.id == TypeId::FixedLenArray
    }

    pub fn is_var_len_array(&self) -> bool {
        self.id == TypeId::VarLenArray
    }

    pub fn is_column(&self) -> bool {
        self.id == TypeId::Column
    }

    pub fn is_column_list(&self) -> bool {
        self.id == TypeId::ColumnList
    }

    /// Values stored out of line behind an offset/length slot.
    pub fn is_var_len(&self) -> bool {
        self.is_string() || self.is_var_len_array()
    }

    /// Whether a dictionary-encoded text column carries this type.
    pub fn is_dict_text(&self) -> bool {
        self.is_ext_dictionary()
            && self
                .elem
                .map(|e| e.is_string())
                .unwrap_or(false)
    }

    /// The same type with a different nullability flag.
    pub fn with_nullable(&'static self, nullable: bool) -> TypeRef {
        if self.nullable == nullable {
            return self;
        }
        TypeContext::global().intern(Type {
            nullable,
            ..self.clone_fields()
        })
    }

    pub(crate) fn clone_fields(&self) -> Type {
        Type {
            id: self.id,
            size: self.size,
            nullable: self.nullable,
            unit: self.unit,
            precision: self.precision,
            scale: self.scale,
            dict_id: self.dict_id,
            elem: self.elem,
        }
    }

    /// Whether the interned instances are identical.
    #[inline]
    pub fn same(a: TypeRef, b: TypeRef) -> bool {
        std::ptr::eq(a, b)
    }

    /// SQL spelling used when rendering casts.
    pub fn sql_name(&self) -> String {
        match self.id {
            TypeId::Null => "NULL".to_string(),
            TypeId::Boolean => "BOOLEAN".to_string(),
            TypeId::Integer => match self.size {
                1 => "TINYINT".to_string(),
                2 => "SMALLINT".to_string(),
                4 => "INTEGER".to_string(),
                _ => "BIGINT".to_string(),
            },
            TypeId::Decimal => format!("DECIMAL({},{})", self.precision, self.scale),
            TypeId::FloatingPoint => {
                if self.size == 4 {
                    "FLOAT".to_string()
                } else {
                    "DOUBLE".to_string()
                }
            }
            TypeId::VarChar => format!("VARCHAR({})", self.precision),
            TypeId::Text => "TEXT".to_string(),
            TypeId::ExtDictionary => self
                .elem
                .map(|e| e.sql_name())
                .unwrap_or_else(|| "TEXT".to_string()),
            TypeId::Date => "DATE".to_string(),
            TypeId::Time => "TIME".to_string(),
            TypeId::Timestamp => {
                let dimen = self.unit.map(|u| u.dimension()).unwrap_or(0);
                format!("TIMESTAMP({dimen})")
            }
            TypeId::Interval => "INTERVAL".to_string(),
            TypeId::FixedLenArray | TypeId::VarLenArray => format!(
                "{}[]",
                self.elem
                    .map(|e| e.sql_name())
                    .unwrap_or_else(|| "NULL".to_string())
            ),
            TypeId::Column | TypeId::ColumnList => format!(
                "COLUMN<{}>",
                self.elem
                    .map(|e| e.sql_name())
                    .unwrap_or_else(|| "NULL".to_string())
            ),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            TypeId::Integer | TypeId::FloatingPoint | TypeId::Boolean | TypeId::Null => {
                write!(f, "{}{}", self.id.as_str(), self.size * 8)?
            }
            TypeId::Decimal => write!(
                f,
                "dec{}({},{})",
                self.size * 8,
                self.precision,
                self.scale
            )?,
            TypeId::Date | TypeId::Time | TypeId::Timestamp | TypeId::Interval => {
                let unit = self.unit.map(|u| u.as_str()).unwrap_or("?");
                write!(f, "{}{}[{unit}]", self.id.as_str(), self.size * 8)?
            }
            TypeId::ExtDictionary => match self.elem {
                Some(elem) => write!(f, "dict{}({elem})[{}]", self.size * 8, self.dict_id)?,
                None => write!(f, "dict{}[{}]", self.size * 8, self.dict_id)?,
            },
            TypeId::FixedLenArray | TypeId::VarLenArray | TypeId::Column | TypeId::ColumnList => {
                match self.elem {
                    Some(elem) => write!(f, "{}({elem})", self.id.as_str())?,
                    None => write!(f, "{}", self.id.as_str())?,
                }
            }
            TypeId::VarChar | TypeId::Text => write!(f, "{}", self.id.as_str())?,
        }
        if !self.nullable {
            write!(f, " not null")?;
        }
        Ok(())
    }
}
