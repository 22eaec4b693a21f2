//! EXTRACT, DATE_TRUNC, DATE_ADD and DATE_DIFF.
//!
//! Dates and timestamps reach the routine as signed tick counts since the
//! epoch: seconds for dates, the declared unit for timestamps. Calendar
//! fields go through the proleptic Gregorian day-number conversion in both
//! directions, written with integer instructions only so every backend
//! lowers it with what it already supports.

use vexc_expr::{DateAdd, DateDiff, Datetrunc, ExprId, Extract};
use vexc_result::Result;
use vexc_types::datetime::{
    DateaddField, DatetruncField, ExtractField, SECS_PER_DAY, ScaleOp,
    dateadd_high_precision_adjusted_scale, dateadd_timestamp_precision_scale,
    datetrunc_high_precision_scale, extract_high_precision_adjusted_scale,
    extract_timestamp_precision_scale, is_subsecond_dateadd_field, is_subsecond_datetrunc_field,
    is_subsecond_extract_field, nanosecs_in_unit, unit_scale,
};
use vexc_types::{TimeUnit, Type, TypeId};

use super::{CodeGenerator, value_ir_type};
use crate::ir::{BinOp, IntPredicate, IrType, ValueId};

const SECS_PER_MINUTE: i64 = 60;
const SECS_PER_HOUR: i64 = 3_600;
const DAYS_PER_WEEK: i64 = 7;
/// Days from 0000-03-01 to 1970-01-01.
const EPOCH_SHIFT_DAYS: i64 = 719_468;
const DAYS_PER_ERA: i64 = 146_097;

/// `i64` values of a broken-down civil date.
struct Civil {
    year: ValueId,
    month: ValueId,
    day: ValueId,
}

fn months_in_field(field: DateaddField) -> Option<i64> {
    match field {
        DateaddField::Month => Some(1),
        DateaddField::Quarter => Some(3),
        DateaddField::Year => Some(12),
        DateaddField::Decade => Some(120),
        DateaddField::Century => Some(1_200),
        DateaddField::Millennium => Some(12_000),
        _ => None,
    }
}

impl CodeGenerator<'_> {
    pub(super) fn codegen_extract(&mut self, id: ExprId, extract: &Extract) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let from_ty = self.arena.ty(extract.from);
        let unit = self.tick_unit(from_ty, "EXTRACT")?;
        let value = self.codegen(extract.from)?;
        let is_null = self.null_check(value, from_ty)?;
        let ticks = self.state.cast_to_type_in(value, IrType::I64);
        let field = self.extract_field(extract.field, ticks, unit)?;
        let field = self.state.cast_to_type_in(field, value_ir_type(ty)?);
        self.propagate_null(is_null, field, ty)
    }

    pub(super) fn codegen_datetrunc(&mut self, id: ExprId, trunc: &Datetrunc) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let from_ty = self.arena.ty(trunc.from);
        let unit = self.tick_unit(from_ty, "DATE_TRUNC")?;
        let value = self.codegen(trunc.from)?;
        let is_null = self.null_check(value, from_ty)?;
        let ticks = self.state.cast_to_type_in(value, IrType::I64);
        let truncated = self.truncate_ticks(trunc.field, ticks, unit)?;
        let truncated = self.state.cast_to_type_in(truncated, value_ir_type(ty)?);
        self.propagate_null(is_null, truncated, ty)
    }

    pub(super) fn codegen_date_add(&mut self, id: ExprId, add: &DateAdd) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let number_ty = self.arena.ty(add.number);
        let datetime_ty = self.arena.ty(add.datetime);
        if !number_ty.is_integer() {
            return Err(self.unsupported(&format!("DATE_ADD by {number_ty}")));
        }
        let unit = self.tick_unit(datetime_ty, "DATE_ADD")?;
        let number = self.codegen(add.number)?;
        let number_null = self.null_check(number, number_ty)?;
        let datetime = self.codegen(add.datetime)?;
        let datetime_null = self.null_check(datetime, datetime_ty)?;

        let amount = self.state.cast_to_type_in(number, IrType::I64);
        let ticks = self.state.cast_to_type_in(datetime, IrType::I64);
        let sum = self.add_to_ticks(add.field, amount, ticks, unit)?;
        let sum = self.state.cast_to_type_in(sum, value_ir_type(ty)?);
        let any_null = self.any_null(&[number_null, datetime_null]);
        self.propagate_null(any_null, sum, ty)
    }

    pub(super) fn codegen_date_diff(&mut self, id: ExprId, diff: &DateDiff) -> Result<ValueId> {
        let ty = self.arena.ty(id);
        let (start_ty, end_ty) = (self.arena.ty(diff.start), self.arena.ty(diff.end));
        let start_unit = self.tick_unit(start_ty, "DATE_DIFF")?;
        let end_unit = self.tick_unit(end_ty, "DATE_DIFF")?;
        let start = self.codegen(diff.start)?;
        let start_null = self.null_check(start, start_ty)?;
        let end = self.codegen(diff.end)?;
        let end_null = self.null_check(end, end_ty)?;

        // Both sides move to the finer unit before subtracting.
        let (start_ns, end_ns) = (nanosecs_in_unit(start_unit)?, nanosecs_in_unit(end_unit)?);
        let unit = if start_ns <= end_ns { start_unit } else { end_unit };
        let unit_ns = start_ns.min(end_ns);
        let start = self.state.cast_to_type_in(start, IrType::I64);
        let end = self.state.cast_to_type_in(end, IrType::I64);
        let start = self.widen_ticks(start, start_ns / unit_ns, start_null);
        let end = self.widen_ticks(end, end_ns / unit_ns, end_null);

        let elapsed = self.diff_ticks(diff.field, start, end, unit)?;
        let elapsed = self.state.cast_to_type_in(elapsed, value_ir_type(ty)?);
        let any_null = self.any_null(&[start_null, end_null]);
        self.propagate_null(any_null, elapsed, ty)
    }

    /// Unit of the tick count held by a value of `ty`.
    fn tick_unit(&self, ty: &Type, op: &str) -> Result<TimeUnit> {
        match (ty.id(), ty.unit()) {
            (TypeId::Date, _) => Ok(TimeUnit::Second),
            (
                TypeId::Timestamp,
                Some(
                    unit @ (TimeUnit::Second | TimeUnit::Milli | TimeUnit::Micro | TimeUnit::Nano),
                ),
            ) => Ok(unit),
            _ => Err(self.unsupported(&format!("{op} on {ty}"))),
        }
    }

    fn extract_field(
        &mut self,
        field: ExtractField,
        ticks: ValueId,
        unit: TimeUnit,
    ) -> Result<ValueId> {
        let scale = unit_scale(unit);
        if is_subsecond_extract_field(field) {
            // Sub-second fields count from the start of the minute.
            let in_minute = self.floor_mod(ticks, SECS_PER_MINUTE * scale);
            return Ok(match extract_high_precision_adjusted_scale(field, unit) {
                Some((op, factor)) => self.apply_scale(in_minute, op, factor),
                None => {
                    let field_scale = extract_timestamp_precision_scale(field)?;
                    self.mul_const(in_minute, field_scale / scale)
                }
            });
        }

        let secs = self.floor_div(ticks, scale);
        Ok(match field {
            ExtractField::Epoch => secs,
            ExtractField::Second => self.floor_mod(secs, SECS_PER_MINUTE),
            ExtractField::Minute => {
                let in_hour = self.floor_mod(secs, SECS_PER_HOUR);
                self.div_const(in_hour, SECS_PER_MINUTE)
            }
            ExtractField::Hour => {
                let in_day = self.floor_mod(secs, SECS_PER_DAY);
                self.div_const(in_day, SECS_PER_HOUR)
            }
            ExtractField::DayOfWeek => {
                // 1970-01-01 was a Thursday; Sunday is 0.
                let days = self.floor_div(secs, SECS_PER_DAY);
                let shifted = self.add_const(days, 4);
                self.floor_mod(shifted, DAYS_PER_WEEK)
            }
            ExtractField::IsoDayOfWeek => {
                let days = self.floor_div(secs, SECS_PER_DAY);
                let shifted = self.add_const(days, 3);
                let from_monday = self.floor_mod(shifted, DAYS_PER_WEEK);
                self.add_const(from_monday, 1)
            }
            ExtractField::Year
            | ExtractField::Quarter
            | ExtractField::Month
            | ExtractField::Day
            | ExtractField::DayOfYear => {
                let days = self.floor_div(secs, SECS_PER_DAY);
                let civil = self.civil_from_days(days);
                match field {
                    ExtractField::Year => civil.year,
                    ExtractField::Month => civil.month,
                    ExtractField::Day => civil.day,
                    ExtractField::Quarter => {
                        let month0 = self.add_const(civil.month, -1);
                        let quarter0 = self.div_const(month0, 3);
                        self.add_const(quarter0, 1)
                    }
                    _ => {
                        let one = self.i64_const(1);
                        let jan1 = self.days_from_civil(civil.year, one, one);
                        let since_jan1 = self.state.binary(BinOp::Sub, days, jan1);
                        self.add_const(since_jan1, 1)
                    }
                }
            }
            other => return Err(self.unsupported(&format!("EXTRACT({})", other.as_str()))),
        })
    }

    fn truncate_ticks(
        &mut self,
        field: DatetruncField,
        ticks: ValueId,
        unit: TimeUnit,
    ) -> Result<ValueId> {
        let scale = unit_scale(unit);
        let day = SECS_PER_DAY * scale;
        if is_subsecond_datetrunc_field(field) {
            // A field no finer than the stored unit leaves the value as is.
            return Ok(match datetrunc_high_precision_scale(field, unit) {
                Some(granule) => self.round_down(ticks, granule),
                None => ticks,
            });
        }
        let granule = match field {
            DatetruncField::Second => Some(scale),
            DatetruncField::Minute => Some(SECS_PER_MINUTE * scale),
            DatetruncField::Hour => Some(SECS_PER_HOUR * scale),
            DatetruncField::Day => Some(day),
            _ => None,
        };
        if let Some(granule) = granule {
            return Ok(self.round_down(ticks, granule));
        }
        if field == DatetruncField::Week {
            // Weeks start on Monday, three days before the epoch.
            let shifted = self.add_const(ticks, 3 * day);
            let into_week = self.floor_mod(shifted, DAYS_PER_WEEK * day);
            return Ok(self.state.binary(BinOp::Sub, ticks, into_week));
        }

        let days = self.floor_div(ticks, day);
        let civil = self.civil_from_days(days);
        let one = self.i64_const(1);
        let (year, month) = match field {
            DatetruncField::Month => (civil.year, civil.month),
            DatetruncField::Quarter => {
                let month0 = self.add_const(civil.month, -1);
                let quarter0 = self.div_const(month0, 3);
                let first0 = self.mul_const(quarter0, 3);
                (civil.year, self.add_const(first0, 1))
            }
            DatetruncField::Year => (civil.year, one),
            DatetruncField::Decade => (self.round_down(civil.year, 10), one),
            // Centuries and millennia start at year 1 of their span.
            DatetruncField::Century => (self.round_down_from_one(civil.year, 100), one),
            DatetruncField::Millennium => (self.round_down_from_one(civil.year, 1_000), one),
            other => return Err(self.unsupported(&format!("DATE_TRUNC({})", other.as_str()))),
        };
        let start = self.days_from_civil(year, month, one);
        Ok(self.mul_const(start, day))
    }

    fn add_to_ticks(
        &mut self,
        field: DateaddField,
        amount: ValueId,
        ticks: ValueId,
        unit: TimeUnit,
    ) -> Result<ValueId> {
        let scale = unit_scale(unit);
        let day = SECS_PER_DAY * scale;
        if is_subsecond_dateadd_field(field) {
            let delta = if unit == TimeUnit::Second {
                self.div_const(amount, dateadd_timestamp_precision_scale(field)?)
            } else {
                match dateadd_high_precision_adjusted_scale(field, unit.dimension())? {
                    Some((op, factor)) => self.apply_scale(amount, op, factor),
                    None => amount,
                }
            };
            return Ok(self.state.binary(BinOp::Add, ticks, delta));
        }
        let step = match field {
            DateaddField::Second => Some(scale),
            DateaddField::Minute => Some(SECS_PER_MINUTE * scale),
            DateaddField::Hour => Some(SECS_PER_HOUR * scale),
            DateaddField::Day => Some(day),
            DateaddField::Week => Some(DAYS_PER_WEEK * day),
            _ => None,
        };
        if let Some(step) = step {
            let delta = self.mul_const(amount, step);
            return Ok(self.state.binary(BinOp::Add, ticks, delta));
        }
        let Some(months_per) = months_in_field(field) else {
            return Err(self.unsupported(&format!("DATE_ADD({})", field.as_str())));
        };

        // Month arithmetic keeps the time of day and clamps the day of month.
        let months = self.mul_const(amount, months_per);
        let (days, time_of_day) = self.floor_div_mod(ticks, day);
        let civil = self.civil_from_days(days);
        let index = self.month_index(&civil);
        let index = self.state.binary(BinOp::Add, index, months);
        let (year, month0) = self.floor_div_mod(index, 12);
        let month = self.add_const(month0, 1);
        let last = self.days_in_month(year, month);
        let past_end = self.state.icmp(IntPredicate::Sgt, civil.day, last);
        let day_of_month = self.state.select(past_end, last, civil.day);
        let new_days = self.days_from_civil(year, month, day_of_month);
        let start = self.mul_const(new_days, day);
        Ok(self.state.binary(BinOp::Add, start, time_of_day))
    }

    fn diff_ticks(
        &mut self,
        field: DateaddField,
        start: ValueId,
        end: ValueId,
        unit: TimeUnit,
    ) -> Result<ValueId> {
        let unit_ns = nanosecs_in_unit(unit)?;
        let second_ns = nanosecs_in_unit(TimeUnit::Second)?;
        let day_ns = nanosecs_in_unit(TimeUnit::Day)?;
        let field_ns = match field {
            DateaddField::Nanosecond => Some(nanosecs_in_unit(TimeUnit::Nano)?),
            DateaddField::Microsecond => Some(nanosecs_in_unit(TimeUnit::Micro)?),
            DateaddField::Millisecond => Some(nanosecs_in_unit(TimeUnit::Milli)?),
            DateaddField::Second => Some(second_ns),
            DateaddField::Minute => Some(SECS_PER_MINUTE * second_ns),
            DateaddField::Hour => Some(SECS_PER_HOUR * second_ns),
            DateaddField::Day => Some(day_ns),
            DateaddField::Week => Some(DAYS_PER_WEEK * day_ns),
            _ => None,
        };
        if let Some(field_ns) = field_ns {
            let elapsed = self.state.binary(BinOp::Sub, end, start);
            return Ok(if field_ns >= unit_ns {
                self.div_const(elapsed, field_ns / unit_ns)
            } else {
                self.mul_const(elapsed, unit_ns / field_ns)
            });
        }
        let Some(months_per) = months_in_field(field) else {
            return Err(self.unsupported(&format!("DATE_DIFF({})", field.as_str())));
        };

        // Whole months between the two instants: the last month only counts
        // once the end reaches the start's day and time within its month.
        let day = SECS_PER_DAY * unit_scale(unit);
        let (start_days, start_time) = self.floor_div_mod(start, day);
        let (end_days, end_time) = self.floor_div_mod(end, day);
        let start_civil = self.civil_from_days(start_days);
        let end_civil = self.civil_from_days(end_days);
        let start_index = self.month_index(&start_civil);
        let end_index = self.month_index(&end_civil);
        let months = self.state.binary(BinOp::Sub, end_index, start_index);

        let start_day = self.mul_const(start_civil.day, day);
        let start_pos = self.state.binary(BinOp::Add, start_day, start_time);
        let end_day = self.mul_const(end_civil.day, day);
        let end_pos = self.state.binary(BinOp::Add, end_day, end_time);
        let zero = self.i64_const(0);
        let forward = self.state.icmp(IntPredicate::Sgt, months, zero);
        let short = self.state.icmp(IntPredicate::Slt, end_pos, start_pos);
        let drop_last = self.state.binary(BinOp::And, forward, short);
        let backward = self.state.icmp(IntPredicate::Slt, months, zero);
        let past = self.state.icmp(IntPredicate::Sgt, end_pos, start_pos);
        let drop_first = self.state.binary(BinOp::And, backward, past);
        let fewer = self.add_const(months, -1);
        let months = self.state.select(drop_last, fewer, months);
        let more = self.add_const(months, 1);
        let months = self.state.select(drop_first, more, months);
        Ok(self.div_const(months, months_per))
    }

    /// Ticks scaled up by `factor` into a finer unit.
    fn widen_ticks(&mut self, ticks: ValueId, factor: i64, is_null: Option<ValueId>) -> ValueId {
        if factor == 1 {
            return ticks;
        }
        self.guard_scale_overflow(ticks, factor, is_null);
        self.mul_const(ticks, factor)
    }

    /// Months since year 0, counting January as 0.
    fn month_index(&mut self, civil: &Civil) -> ValueId {
        let years = self.mul_const(civil.year, 12);
        let month0 = self.add_const(civil.month, -1);
        self.state.binary(BinOp::Add, years, month0)
    }

    fn civil_from_days(&mut self, days: ValueId) -> Civil {
        let shifted = self.add_const(days, EPOCH_SHIFT_DAYS);
        let (era, day_of_era) = self.floor_div_mod(shifted, DAYS_PER_ERA);
        // year_of_era = (doe - doe/1460 + doe/36524 - doe/146096) / 365
        let leap4 = self.div_const(day_of_era, 1_460);
        let leap100 = self.div_const(day_of_era, 36_524);
        let leap400 = self.div_const(day_of_era, DAYS_PER_ERA - 1);
        let t = self.state.binary(BinOp::Sub, day_of_era, leap4);
        let t = self.state.binary(BinOp::Add, t, leap100);
        let t = self.state.binary(BinOp::Sub, t, leap400);
        let year_of_era = self.div_const(t, 365);

        // March-based day of year.
        let y365 = self.mul_const(year_of_era, 365);
        let y4 = self.div_const(year_of_era, 4);
        let y100 = self.div_const(year_of_era, 100);
        let year_start = self.state.binary(BinOp::Add, y365, y4);
        let year_start = self.state.binary(BinOp::Sub, year_start, y100);
        let day_of_year = self.state.binary(BinOp::Sub, day_of_era, year_start);

        let d5 = self.mul_const(day_of_year, 5);
        let d5 = self.add_const(d5, 2);
        let month_from_march = self.div_const(d5, 153);
        let m153 = self.mul_const(month_from_march, 153);
        let m153 = self.add_const(m153, 2);
        let month_start = self.div_const(m153, 5);
        let day0 = self.state.binary(BinOp::Sub, day_of_year, month_start);
        let day = self.add_const(day0, 1);

        let ten = self.i64_const(10);
        let before_january = self.state.icmp(IntPredicate::Slt, month_from_march, ten);
        let spring = self.add_const(month_from_march, 3);
        let winter = self.add_const(month_from_march, -9);
        let month = self.state.select(before_january, spring, winter);

        let era_years = self.mul_const(era, 400);
        let year = self.state.binary(BinOp::Add, year_of_era, era_years);
        let two = self.i64_const(2);
        let early = self.state.icmp(IntPredicate::Sle, month, two);
        let next_year = self.add_const(year, 1);
        let year = self.state.select(early, next_year, year);
        Civil { year, month, day }
    }

    /// Days since 1970-01-01 of a civil date.
    fn days_from_civil(&mut self, year: ValueId, month: ValueId, day: ValueId) -> ValueId {
        let two = self.i64_const(2);
        let early = self.state.icmp(IntPredicate::Sle, month, two);
        let prev_year = self.add_const(year, -1);
        let year = self.state.select(early, prev_year, year);
        let (era, year_of_era) = self.floor_div_mod(year, 400);

        let winter = self.add_const(month, 9);
        let spring = self.add_const(month, -3);
        let month_from_march = self.state.select(early, winter, spring);
        let m153 = self.mul_const(month_from_march, 153);
        let m153 = self.add_const(m153, 2);
        let month_start = self.div_const(m153, 5);
        let day_of_year = self.state.binary(BinOp::Add, month_start, day);
        let day_of_year = self.add_const(day_of_year, -1);

        let y365 = self.mul_const(year_of_era, 365);
        let y4 = self.div_const(year_of_era, 4);
        let y100 = self.div_const(year_of_era, 100);
        let day_of_era = self.state.binary(BinOp::Add, y365, y4);
        let day_of_era = self.state.binary(BinOp::Sub, day_of_era, y100);
        let day_of_era = self.state.binary(BinOp::Add, day_of_era, day_of_year);

        let era_days = self.mul_const(era, DAYS_PER_ERA);
        let days = self.state.binary(BinOp::Add, era_days, day_of_era);
        self.add_const(days, -EPOCH_SHIFT_DAYS)
    }

    fn days_in_month(&mut self, year: ValueId, month: ValueId) -> ValueId {
        // 30 or 31 alternating, with the parity flipping at August.
        let august_on = self.div_const(month, 8);
        let parity = self.state.binary(BinOp::Add, month, august_on);
        let one = self.i64_const(1);
        let long = self.state.binary(BinOp::And, parity, one);
        let regular = self.add_const(long, 30);

        let zero = self.i64_const(0);
        let by4 = self.rem_const(year, 4);
        let by100 = self.rem_const(year, 100);
        let by400 = self.rem_const(year, 400);
        let div4 = self.state.icmp(IntPredicate::Eq, by4, zero);
        let not_div100 = self.state.icmp(IntPredicate::Ne, by100, zero);
        let div400 = self.state.icmp(IntPredicate::Eq, by400, zero);
        let leap = self.state.binary(BinOp::And, div4, not_div100);
        let leap = self.state.binary(BinOp::Or, leap, div400);
        let feb_leap = self.i64_const(29);
        let feb = self.i64_const(28);
        let february = self.state.select(leap, feb_leap, feb);

        let two = self.i64_const(2);
        let is_february = self.state.icmp(IntPredicate::Eq, month, two);
        self.state.select(is_february, february, regular)
    }

    /// `(floor(value / divisor), value - divisor * floor(value / divisor))`
    /// for a positive `divisor`.
    pub(super) fn floor_div_mod(&mut self, value: ValueId, divisor: i64) -> (ValueId, ValueId) {
        if divisor == 1 {
            return (value, self.i64_const(0));
        }
        let d = self.i64_const(divisor);
        let zero = self.i64_const(0);
        let quotient = self.state.binary(BinOp::SDiv, value, d);
        let rem = self.state.binary(BinOp::SRem, value, d);
        let negative = self.state.icmp(IntPredicate::Slt, rem, zero);
        let lower = self.add_const(quotient, -1);
        let wrapped = self.state.binary(BinOp::Add, rem, d);
        (
            self.state.select(negative, lower, quotient),
            self.state.select(negative, wrapped, rem),
        )
    }

    fn floor_div(&mut self, value: ValueId, divisor: i64) -> ValueId {
        self.floor_div_mod(value, divisor).0
    }

    fn floor_mod(&mut self, value: ValueId, divisor: i64) -> ValueId {
        self.floor_div_mod(value, divisor).1
    }

    /// Largest multiple of `granule` not above `value`.
    pub(super) fn round_down(&mut self, value: ValueId, granule: i64) -> ValueId {
        let rem = self.floor_mod(value, granule);
        self.state.binary(BinOp::Sub, value, rem)
    }

    /// Largest `1 + k * span` not above `value`.
    fn round_down_from_one(&mut self, value: ValueId, span: i64) -> ValueId {
        let from_one = self.add_const(value, -1);
        let rem = self.floor_mod(from_one, span);
        self.state.binary(BinOp::Sub, value, rem)
    }

    fn apply_scale(&mut self, value: ValueId, op: ScaleOp, factor: i64) -> ValueId {
        match op {
            ScaleOp::Multiply => self.mul_const(value, factor),
            ScaleOp::Divide => self.div_const(value, factor),
        }
    }

    fn i64_const(&mut self, value: i64) -> ValueId {
        self.state.iconst(IrType::I64, value)
    }

    fn add_const(&mut self, value: ValueId, addend: i64) -> ValueId {
        if addend == 0 {
            return value;
        }
        let addend = self.i64_const(addend);
        self.state.binary(BinOp::Add, value, addend)
    }

    fn mul_const(&mut self, value: ValueId, factor: i64) -> ValueId {
        if factor == 1 {
            return value;
        }
        let factor = self.i64_const(factor);
        self.state.binary(BinOp::Mul, value, factor)
    }

    /// Division truncating toward zero by a positive constant.
    fn div_const(&mut self, value: ValueId, divisor: i64) -> ValueId {
        if divisor == 1 {
            return value;
        }
        let divisor = self.i64_const(divisor);
        self.state.binary(BinOp::SDiv, value, divisor)
    }

    fn rem_const(&mut self, value: ValueId, divisor: i64) -> ValueId {
        let divisor = self.i64_const(divisor);
        self.state.binary(BinOp::SRem, value, divisor)
    }
}
