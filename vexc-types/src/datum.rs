use std::fmt;

use crate::types::{Type, TypeId};

/// Literal value of a constant expression.
///
/// The value is interpreted through the constant's [`Type`]: integers,
/// decimals (unscaled) and temporal values are carried as `Int`, both float
/// widths as `Float`.
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Whether the datum is a zero of its numeric or boolean kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Datum::Bool(b) => !*b,
            Datum::Int(v) => *v == 0,
            Datum::Float(v) => *v == 0.0,
            Datum::Null | Datum::Str(_) => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Datum::Bool(b) => Some(*b as i64),
            Datum::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Float(v) => Some(*v),
            Datum::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// SQL literal text for the datum under `ty`.
    pub fn to_sql(&self, ty: &Type) -> String {
        match self {
            Datum::Null => "NULL".to_string(),
            Datum::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
            Datum::Int(v) if ty.id() == TypeId::Decimal && ty.scale() > 0 => {
                format_decimal(*v, ty.scale())
            }
            Datum::Int(v) => v.to_string(),
            Datum::Float(v) => {
                let text = v.to_string();
                if text.contains(['.', 'e', 'E']) || !v.is_finite() {
                    text
                } else {
                    format!("{text}.0")
                }
            }
            Datum::Str(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

fn format_decimal(unscaled: i64, scale: i32) -> String {
    let divisor = 10i128.pow(scale as u32);
    let value = unscaled as i128;
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.abs();
    format!(
        "{sign}{}.{:0width$}",
        abs / divisor,
        abs % divisor,
        width = scale as usize
    )
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NULL"),
            Datum::Bool(b) => write!(f, "{b}"),
            Datum::Int(v) => write!(f, "{v}"),
            Datum::Float(v) => write!(f, "{v}"),
            Datum::Str(s) => write!(f, "{s:?}"),
        }
    }
}
