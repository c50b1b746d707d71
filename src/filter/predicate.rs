use std::{collections::BTreeSet, fmt};

use arrow::{
    array::{Array, ArrowPrimitiveType, AsArray, PrimitiveArray},
    datatypes::{
        ArrowTimestampType, Date32Type, Date64Type, Int8Type, Int16Type, Int32Type, Int64Type,
        TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
        TimestampSecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
    },
};
use arrow_buffer::NullBuffer;
use arrow_schema::{DataType, TimeUnit};

use super::{
    mask::FilterMask,
    stats::{LogicalStatistics, nanos_per_tick},
};
use crate::error::{DatasetError, Result};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Comparison operators supported by ordered filters
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
    Eq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
        };
        f.write_str(symbol)
    }
}

/// How much of a value range satisfies a test
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Coverage {
    None,
    Partial,
    All,
}

/// A test over values widened to `i128`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ValueTest {
    Cmp(CmpOp, i128),
    /// Inclusive at both ends
    Between(i128, i128),
}

impl ValueTest {
    pub(crate) fn matches(&self, value: i128) -> bool {
        match *self {
            ValueTest::Cmp(CmpOp::Eq, v) => value == v,
            ValueTest::Cmp(CmpOp::Lt, v) => value < v,
            ValueTest::Cmp(CmpOp::LtEq, v) => value <= v,
            ValueTest::Cmp(CmpOp::Gt, v) => value > v,
            ValueTest::Cmp(CmpOp::GtEq, v) => value >= v,
            ValueTest::Between(start, end) => start <= value && value <= end,
        }
    }

    /// Classify every value in `[min, max]` against the test
    pub(crate) fn coverage(&self, min: i128, max: i128) -> Coverage {
        let (all, none) = match *self {
            ValueTest::Cmp(CmpOp::Eq, v) => (min == v && max == v, v < min || v > max),
            ValueTest::Cmp(CmpOp::Lt, v) => (max < v, min >= v),
            ValueTest::Cmp(CmpOp::LtEq, v) => (max <= v, min > v),
            ValueTest::Cmp(CmpOp::Gt, v) => (min > v, max <= v),
            ValueTest::Cmp(CmpOp::GtEq, v) => (min >= v, max < v),
            ValueTest::Between(start, end) => (
                start <= min && max <= end,
                start > end || end < min || start > max,
            ),
        };
        if none {
            Coverage::None
        } else if all {
            Coverage::All
        } else {
            Coverage::Partial
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Domain {
    Integer,
    /// Days since the UNIX epoch
    Date,
    /// Nanoseconds since the UNIX epoch
    Timestamp,
}

/// The value condition of a single column filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Predicate {
    IntCompare(CmpOp, i64),
    /// Inclusive at both ends
    IntRange(i64, i64),
    DateCompare(CmpOp, i32),
    /// Inclusive at both ends
    DateRange(i32, i32),
    TimestampCompare(CmpOp, i64),
    /// Includes the start, excludes the end
    TimestampRange(i64, i64),
    StringSet {
        values: BTreeSet<String>,
        include_null: bool,
    },
}

impl Predicate {
    fn operation(&self) -> &'static str {
        match self {
            Predicate::IntCompare(CmpOp::Eq, _) => "Integer equality filter",
            Predicate::IntCompare(..) => "Integer comparison filter",
            Predicate::IntRange(..) => "Integer range filter",
            Predicate::DateCompare(..) => "Date comparison filter",
            Predicate::DateRange(..) => "Date range filter",
            Predicate::TimestampCompare(..) => "Timestamp comparison filter",
            Predicate::TimestampRange(..) => "Timestamp range filter",
            Predicate::StringSet { .. } => "String set filter",
        }
    }

    fn value_test(&self) -> Option<(Domain, ValueTest)> {
        let test = match *self {
            Predicate::IntCompare(op, v) => (Domain::Integer, ValueTest::Cmp(op, v.into())),
            Predicate::IntRange(start, end) => {
                (Domain::Integer, ValueTest::Between(start.into(), end.into()))
            }
            Predicate::DateCompare(op, v) => (Domain::Date, ValueTest::Cmp(op, v.into())),
            Predicate::DateRange(start, end) => {
                (Domain::Date, ValueTest::Between(start.into(), end.into()))
            }
            Predicate::TimestampCompare(op, v) => (Domain::Timestamp, ValueTest::Cmp(op, v.into())),
            Predicate::TimestampRange(start, end) => (
                Domain::Timestamp,
                ValueTest::Between(start.into(), i128::from(end) - 1),
            ),
            Predicate::StringSet { .. } => return None,
        };
        Some(test)
    }

    fn includes_null(&self) -> bool {
        matches!(
            self,
            Predicate::StringSet {
                include_null: true,
                ..
            }
        )
    }

    /// Conservative row group test; `false` only when no row can match
    pub(crate) fn include_statistics(&self, stats: &LogicalStatistics) -> bool {
        let Some((domain, test)) = self.value_test() else {
            return true;
        };
        let bounds = match domain {
            Domain::Integer => stats.integer_bounds(),
            Domain::Date => stats.date_bounds(),
            Domain::Timestamp => stats.timestamp_bounds(),
        };
        match bounds {
            Some((min, max)) => test.coverage(min, max) != Coverage::None,
            None => true,
        }
    }

    /// Evaluate the predicate for every row of `array`.
    ///
    /// Null rows are excluded unless a string set explicitly admits null.
    pub(crate) fn compute_mask(&self, column: &str, array: &dyn Array) -> Result<FilterMask> {
        if matches!(array.data_type(), DataType::Dictionary(_, _)) {
            return self.dictionary_mask(column, array);
        }
        let Some((domain, test)) = self.value_test() else {
            return self.string_mask(column, array);
        };
        let data_type = array.data_type();
        let mask = match (domain, data_type) {
            (Domain::Integer, DataType::Int8) => {
                int_mask::<Int8Type>(array, &test, i8::MIN, i8::MAX)
            }
            (Domain::Integer, DataType::Int16) => {
                int_mask::<Int16Type>(array, &test, i16::MIN, i16::MAX)
            }
            (Domain::Integer, DataType::Int32) => {
                int_mask::<Int32Type>(array, &test, i32::MIN, i32::MAX)
            }
            (Domain::Integer, DataType::Int64) => {
                int_mask::<Int64Type>(array, &test, i64::MIN, i64::MAX)
            }
            (Domain::Integer, DataType::UInt8) => int_mask::<UInt8Type>(array, &test, 0, u8::MAX),
            (Domain::Integer, DataType::UInt16) => {
                int_mask::<UInt16Type>(array, &test, 0, u16::MAX)
            }
            (Domain::Integer, DataType::UInt32) => {
                int_mask::<UInt32Type>(array, &test, 0, u32::MAX)
            }
            (Domain::Integer, DataType::UInt64) => {
                int_mask::<UInt64Type>(array, &test, 0, u64::MAX)
            }
            (Domain::Date, DataType::Date32) => {
                values_mask(array.as_primitive::<Date32Type>(), |days| {
                    test.matches(days.into())
                })
            }
            (Domain::Date, DataType::Date64) => {
                values_mask(array.as_primitive::<Date64Type>(), |millis| {
                    test.matches(millis.div_euclid(MILLIS_PER_DAY).into())
                })
            }
            (Domain::Timestamp, DataType::Timestamp(unit, _)) => match unit {
                TimeUnit::Second => timestamp_mask::<TimestampSecondType>(array, &test),
                TimeUnit::Millisecond => timestamp_mask::<TimestampMillisecondType>(array, &test),
                TimeUnit::Microsecond => timestamp_mask::<TimestampMicrosecondType>(array, &test),
                TimeUnit::Nanosecond => timestamp_mask::<TimestampNanosecondType>(array, &test),
            },
            _ => {
                return Err(DatasetError::unsupported_type(self.operation(), column, data_type));
            }
        };
        Ok(mask)
    }

    fn string_mask(&self, column: &str, array: &dyn Array) -> Result<FilterMask> {
        let Predicate::StringSet {
            values,
            include_null,
        } = self
        else {
            return Err(DatasetError::unsupported_type(self.operation(), column, array.data_type()));
        };
        let nulls = array.logical_nulls();
        let mask = match array.data_type() {
            DataType::Utf8 => {
                let strings = array.as_string::<i32>();
                set_mask(nulls.as_ref(), array.len(), |i| strings.value(i), values, *include_null)
            }
            DataType::LargeUtf8 => {
                let strings = array.as_string::<i64>();
                set_mask(nulls.as_ref(), array.len(), |i| strings.value(i), values, *include_null)
            }
            DataType::Utf8View => {
                let strings = array.as_string_view();
                set_mask(nulls.as_ref(), array.len(), |i| strings.value(i), values, *include_null)
            }
            // partition values of an all-null directory
            DataType::Null => FilterMask::from_fn(array.len(), |_| *include_null),
            other => {
                return Err(DatasetError::unsupported_type(self.operation(), column, other));
            }
        };
        Ok(mask)
    }

    /// Evaluate once per dictionary value, then look rows up by key
    fn dictionary_mask(&self, column: &str, array: &dyn Array) -> Result<FilterMask> {
        let dictionary = array.as_any_dictionary();
        let value_mask = self.compute_mask(column, dictionary.values().as_ref())?;
        let keys = dictionary.normalized_keys();
        let include_null = self.includes_null();
        Ok(FilterMask::from_fn(array.len(), |i| {
            if array.is_null(i) {
                include_null
            } else {
                value_mask.is_included(keys[i])
            }
        }))
    }
}

fn values_mask<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    test: impl Fn(T::Native) -> bool,
) -> FilterMask {
    let values = array.values();
    match array.nulls().filter(|nulls| nulls.null_count() > 0) {
        None => FilterMask::from_fn(array.len(), |i| test(values[i])),
        Some(nulls) => FilterMask::from_fn(array.len(), |i| nulls.is_valid(i) && test(values[i])),
    }
}

fn int_mask<T>(array: &dyn Array, test: &ValueTest, min: T::Native, max: T::Native) -> FilterMask
where
    T: ArrowPrimitiveType,
    T::Native: Into<i128>,
{
    let array = array.as_primitive::<T>();
    match test.coverage(min.into(), max.into()) {
        Coverage::None => FilterMask::new_unset(array.len()),
        Coverage::All => FilterMask::from_validity(array.len(), array.nulls()),
        Coverage::Partial => values_mask(array, |value| test.matches(value.into())),
    }
}

fn timestamp_mask<T: ArrowTimestampType>(array: &dyn Array, test: &ValueTest) -> FilterMask {
    let factor = nanos_per_tick(T::UNIT);
    values_mask(array.as_primitive::<T>(), |ticks| {
        test.matches(i128::from(ticks) * factor)
    })
}

fn set_mask<'a>(
    nulls: Option<&NullBuffer>,
    len: usize,
    value: impl Fn(usize) -> &'a str,
    values: &BTreeSet<String>,
    include_null: bool,
) -> FilterMask {
    FilterMask::from_fn(len, |i| {
        if nulls.is_some_and(|nulls| nulls.is_null(i)) {
            include_null
        } else {
            values.contains(value(i))
        }
    })
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::IntCompare(op, v) => write!(f, "{op} {v}"),
            Predicate::IntRange(start, end) => write!(f, "BETWEEN {start} AND {end}"),
            Predicate::DateCompare(op, days) => write!(f, "{op} DATE {days}"),
            Predicate::DateRange(start, end) => write!(f, "BETWEEN DATE {start} AND DATE {end}"),
            Predicate::TimestampCompare(op, nanos) => write!(f, "{op} TIMESTAMP {nanos}ns"),
            Predicate::TimestampRange(start, end) => {
                write!(f, "IN TIMESTAMP [{start}ns, {end}ns)")
            }
            Predicate::StringSet {
                values,
                include_null,
            } => {
                f.write_str("IN (")?;
                let mut first = true;
                for value in values {
                    if !first {
                        f.write_str(", ")?;
                    }
                    write!(f, "'{value}'")?;
                    first = false;
                }
                if *include_null {
                    if !first {
                        f.write_str(", ")?;
                    }
                    f.write_str("NULL")?;
                }
                f.write_str(")")
            }
        }
    }
}
