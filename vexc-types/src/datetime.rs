//! Datetime fields and precision scaling.
//!
//! High-precision timestamps are stored as integer counts of milli-, micro-
//! or nanoseconds. EXTRACT, DATE_TRUNC and DATE_ADD on those values first
//! rescale between the stored unit and the requested field; the lookups here
//! return the operation needed for that step.

use vexc_result::{Error, Result};

use crate::types::TimeUnit;

pub const MILLISECS_PER_SEC: i64 = 1_000;
pub const MICROSECS_PER_SEC: i64 = 1_000_000;
pub const NANOSECS_PER_SEC: i64 = 1_000_000_000;
pub const SECS_PER_DAY: i64 = 86_400;

/// Field argument of `EXTRACT`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtractField {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    DayOfWeek,
    IsoDayOfWeek,
    DayOfYear,
    Epoch,
    Week,
}

/// Field argument of `DATE_TRUNC`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatetruncField {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millennium,
    Century,
    Decade,
    Millisecond,
    Microsecond,
    Nanosecond,
    Week,
}

/// Field argument of `DATE_ADD` and `DATE_DIFF`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DateaddField {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millennium,
    Century,
    Decade,
    Millisecond,
    Microsecond,
    Nanosecond,
    Week,
}

macro_rules! field_names {
    ($ty:ident { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),*
                }
            }
        }
    };
}

field_names!(ExtractField {
    Year => "YEAR",
    Quarter => "QUARTER",
    Month => "MONTH",
    Day => "DAY",
    Hour => "HOUR",
    Minute => "MINUTE",
    Second => "SECOND",
    Millisecond => "MILLISECOND",
    Microsecond => "MICROSECOND",
    Nanosecond => "NANOSECOND",
    DayOfWeek => "DOW",
    IsoDayOfWeek => "ISODOW",
    DayOfYear => "DOY",
    Epoch => "EPOCH",
    Week => "WEEK",
});

field_names!(DatetruncField {
    Year => "YEAR",
    Quarter => "QUARTER",
    Month => "MONTH",
    Day => "DAY",
    Hour => "HOUR",
    Minute => "MINUTE",
    Second => "SECOND",
    Millennium => "MILLENNIUM",
    Century => "CENTURY",
    Decade => "DECADE",
    Millisecond => "MILLISECOND",
    Microsecond => "MICROSECOND",
    Nanosecond => "NANOSECOND",
    Week => "WEEK",
});

field_names!(DateaddField {
    Year => "YEAR",
    Quarter => "QUARTER",
    Month => "MONTH",
    Day => "DAY",
    Hour => "HOUR",
    Minute => "MINUTE",
    Second => "SECOND",
    Millennium => "MILLENNIUM",
    Century => "CENTURY",
    Decade => "DECADE",
    Millisecond => "MILLISECOND",
    Microsecond => "MICROSECOND",
    Nanosecond => "NANOSECOND",
    Week => "WEEK",
});

/// Direction of a precision change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalingType {
    ScaleUp,
    ScaleDown,
}

/// Arithmetic applied to rescale a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleOp {
    Multiply,
    Divide,
}

fn overflow() -> Error {
    Error::NumericOverflow(
        "Value Overflow/underflow detected while scaling DateTime precision.".to_string(),
    )
}

/// Ticks per second for a fractional-second dimension (0, 3, 6 or 9).
pub fn timestamp_precision_scale(dimen: i32) -> Result<i64> {
    match dimen {
        0 => Ok(1),
        3 => Ok(MILLISECS_PER_SEC),
        6 => Ok(MICROSECS_PER_SEC),
        9 => Ok(NANOSECS_PER_SEC),
        _ => Err(Error::InvalidArgumentError(format!("Unknown dimen = {dimen}"))),
    }
}

/// Ticks per second of a time unit.
pub fn unit_scale(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Milli => MILLISECS_PER_SEC,
        TimeUnit::Micro => MICROSECS_PER_SEC,
        TimeUnit::Nano => NANOSECS_PER_SEC,
        TimeUnit::Month | TimeUnit::Day | TimeUnit::Second => 1,
    }
}

/// Nanoseconds in one tick of `unit`. Months have no fixed length.
pub fn nanosecs_in_unit(unit: TimeUnit) -> Result<i64> {
    match unit {
        TimeUnit::Day => Ok(SECS_PER_DAY * NANOSECS_PER_SEC),
        TimeUnit::Second => Ok(NANOSECS_PER_SEC),
        TimeUnit::Milli => Ok(MICROSECS_PER_SEC),
        TimeUnit::Micro => Ok(MILLISECS_PER_SEC),
        TimeUnit::Nano => Ok(1),
        TimeUnit::Month => Err(Error::InvalidArgumentError(format!(
            "Unexpected time unit: {}",
            unit.as_str()
        ))),
    }
}

/// Rescale an epoch value by `10^dimen`, failing on overflow when scaling up.
pub fn datetime_scaled_epoch(direction: ScalingType, epoch: i64, dimen: i32) -> Result<i64> {
    let scale = timestamp_precision_scale(dimen)?;
    match direction {
        ScalingType::ScaleUp => epoch.checked_mul(scale).ok_or_else(overflow),
        ScalingType::ScaleDown => Ok(epoch / scale),
    }
}

/// Ticks per second addressed by a sub-second `DATE_ADD` field.
pub fn dateadd_timestamp_precision_scale(field: DateaddField) -> Result<i64> {
    match field {
        DateaddField::Millisecond => Ok(MILLISECS_PER_SEC),
        DateaddField::Microsecond => Ok(MICROSECS_PER_SEC),
        DateaddField::Nanosecond => Ok(NANOSECS_PER_SEC),
        other => Err(Error::InvalidArgumentError(format!(
            "Unknown field = {}",
            other.as_str()
        ))),
    }
}

/// Ticks per second addressed by a sub-second `EXTRACT` field.
pub fn extract_timestamp_precision_scale(field: ExtractField) -> Result<i64> {
    match field {
        ExtractField::Millisecond => Ok(MILLISECS_PER_SEC),
        ExtractField::Microsecond => Ok(MICROSECS_PER_SEC),
        ExtractField::Nanosecond => Ok(NANOSECS_PER_SEC),
        other => Err(Error::InvalidArgumentError(format!(
            "Unknown field = {}",
            other.as_str()
        ))),
    }
}

pub fn is_subsecond_extract_field(field: ExtractField) -> bool {
    matches!(
        field,
        ExtractField::Millisecond | ExtractField::Microsecond | ExtractField::Nanosecond
    )
}

pub fn is_subsecond_dateadd_field(field: DateaddField) -> bool {
    matches!(
        field,
        DateaddField::Millisecond | DateaddField::Microsecond | DateaddField::Nanosecond
    )
}

pub fn is_subsecond_datetrunc_field(field: DatetruncField) -> bool {
    matches!(
        field,
        DatetruncField::Millisecond | DatetruncField::Microsecond | DatetruncField::Nanosecond
    )
}

/// Rescaling of a sub-second `DATE_ADD` amount into a value of precision
/// `dimen`. `None` when the field already matches the precision.
pub fn dateadd_high_precision_adjusted_scale(
    field: DateaddField,
    dimen: i32,
) -> Result<Option<(ScaleOp, i64)>> {
    let unknown_dimen = || Error::InvalidArgumentError(format!("Unknown dimen = {dimen}"));
    match field {
        DateaddField::Nanosecond => match dimen {
            9 => Ok(None),
            6 => Ok(Some((ScaleOp::Divide, MILLISECS_PER_SEC))),
            3 => Ok(Some((ScaleOp::Divide, MICROSECS_PER_SEC))),
            _ => Err(unknown_dimen()),
        },
        DateaddField::Microsecond => match dimen {
            9 => Ok(Some((ScaleOp::Multiply, MILLISECS_PER_SEC))),
            6 => Ok(None),
            3 => Ok(Some((ScaleOp::Divide, MILLISECS_PER_SEC))),
            _ => Err(unknown_dimen()),
        },
        DateaddField::Millisecond => match dimen {
            9 => Ok(Some((ScaleOp::Multiply, MICROSECS_PER_SEC))),
            6 => Ok(Some((ScaleOp::Multiply, MILLISECS_PER_SEC))),
            3 => Ok(None),
            _ => Err(unknown_dimen()),
        },
        other => Err(Error::InvalidArgumentError(format!(
            "Unknown field = {}",
            other.as_str()
        ))),
    }
}

/// Rescaling needed to extract a sub-second field from a value stored in
/// `unit`. `None` when no adjustment applies.
pub fn extract_high_precision_adjusted_scale(
    field: ExtractField,
    unit: TimeUnit,
) -> Option<(ScaleOp, i64)> {
    match (unit, field) {
        (TimeUnit::Milli, ExtractField::Microsecond) => {
            Some((ScaleOp::Multiply, MILLISECS_PER_SEC))
        }
        (TimeUnit::Milli, ExtractField::Nanosecond) => {
            Some((ScaleOp::Multiply, MICROSECS_PER_SEC))
        }
        (TimeUnit::Micro, ExtractField::Millisecond) => Some((ScaleOp::Divide, MILLISECS_PER_SEC)),
        (TimeUnit::Micro, ExtractField::Nanosecond) => {
            Some((ScaleOp::Multiply, MILLISECS_PER_SEC))
        }
        (TimeUnit::Nano, ExtractField::Millisecond) => Some((ScaleOp::Divide, MICROSECS_PER_SEC)),
        (TimeUnit::Nano, ExtractField::Microsecond) => Some((ScaleOp::Divide, MILLISECS_PER_SEC)),
        _ => None,
    }
}

/// Truncation granule for a sub-second `DATE_TRUNC` on a value stored in
/// `unit`, or `None` when the field is not finer than the stored unit.
pub fn datetrunc_high_precision_scale(field: DatetruncField, unit: TimeUnit) -> Option<i64> {
    match (unit, field) {
        (TimeUnit::Micro, DatetruncField::Millisecond) => Some(MILLISECS_PER_SEC),
        (TimeUnit::Nano, DatetruncField::Microsecond) => Some(MILLISECS_PER_SEC),
        (TimeUnit::Nano, DatetruncField::Millisecond) => Some(MICROSECS_PER_SEC),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_up_detects_overflow() {
        assert_eq!(
            datetime_scaled_epoch(ScalingType::ScaleUp, 1_600_000_000, 3).unwrap(),
            1_600_000_000_000
        );
        let err = datetime_scaled_epoch(ScalingType::ScaleUp, i64::MAX / 10, 9).unwrap_err();
        assert!(matches!(err, Error::NumericOverflow(_)));
    }

    #[test]
    fn scale_down_truncates() {
        assert_eq!(
            datetime_scaled_epoch(ScalingType::ScaleDown, 1_999, 3).unwrap(),
            1
        );
    }

    #[test]
    fn unknown_dimension_is_rejected() {
        assert!(timestamp_precision_scale(4).is_err());
    }

    #[test]
    fn months_have_no_nanosecond_length() {
        assert_eq!(nanosecs_in_unit(TimeUnit::Micro).unwrap(), 1_000);
        assert!(matches!(
            nanosecs_in_unit(TimeUnit::Month),
            Err(Error::InvalidArgumentError(_))
        ));
    }

    #[test]
    fn high_precision_lookups() {
        assert_eq!(
            extract_high_precision_adjusted_scale(ExtractField::Millisecond, TimeUnit::Nano),
            Some((ScaleOp::Divide, MICROSECS_PER_SEC))
        );
        assert_eq!(
            extract_high_precision_adjusted_scale(ExtractField::Year, TimeUnit::Nano),
            None
        );
        assert_eq!(
            dateadd_high_precision_adjusted_scale(DateaddField::Millisecond, 6).unwrap(),
            Some((ScaleOp::Multiply, MILLISECS_PER_SEC))
        );
        assert_eq!(
            datetrunc_high_precision_scale(DatetruncField::Millisecond, TimeUnit::Micro),
            Some(MILLISECS_PER_SEC)
        );
        assert_eq!(nanosecs_in_unit(TimeUnit::Day).unwrap(), 86_400_000_000_000);
    }
}
