use arrow_schema::TimeUnit;
use half::f16;
use parquet::{
    basic::{ConvertedType, LogicalType, TimeUnit as ParquetTimeUnit},
    file::statistics::Statistics,
    schema::types::ColumnDescriptor,
};

/// Minimum and maximum of one column within one row group
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax<T> {
    pub min: T,
    pub max: T,
}

impl<T> MinMax<T> {
    pub fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    /// Reinterpret both bounds, e.g. as the column's declared width
    fn map<U>(self, f: impl Fn(T) -> U) -> MinMax<U> {
        MinMax::new(f(self.min), f(self.max))
    }
}

/// Row group statistics converted to the column's logical type.
///
/// Timestamps keep the unit they were written with so nanosecond values
/// are never rescaled into a coarser representation.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalStatistics {
    Boolean(MinMax<bool>),
    Int8(MinMax<i8>),
    Int16(MinMax<i16>),
    Int32(MinMax<i32>),
    Int64(MinMax<i64>),
    UInt8(MinMax<u8>),
    UInt16(MinMax<u16>),
    UInt32(MinMax<u32>),
    UInt64(MinMax<u64>),
    Float16(MinMax<f16>),
    Float32(MinMax<f32>),
    Float64(MinMax<f64>),
    /// Days since the UNIX epoch
    Date(MinMax<i32>),
    /// Ticks of `unit` since the UNIX epoch
    Timestamp { unit: TimeUnit, range: MinMax<i64> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogicalKind {
    Plain,
    Integer { bit_width: u8, signed: bool },
    Date,
    Timestamp(TimeUnit),
    Float16,
    Other,
}

fn logical_kind(column: &ColumnDescriptor) -> LogicalKind {
    match column.logical_type() {
        Some(LogicalType::Integer {
            bit_width,
            is_signed,
        }) => LogicalKind::Integer {
            bit_width: bit_width as u8,
            signed: is_signed,
        },
        Some(LogicalType::Date) => LogicalKind::Date,
        Some(LogicalType::Timestamp { unit, .. }) => LogicalKind::Timestamp(match unit {
            ParquetTimeUnit::MILLIS(_) => TimeUnit::Millisecond,
            ParquetTimeUnit::MICROS(_) => TimeUnit::Microsecond,
            ParquetTimeUnit::NANOS(_) => TimeUnit::Nanosecond,
        }),
        Some(LogicalType::Float16) => LogicalKind::Float16,
        Some(_) => LogicalKind::Other,
        None => match column.converted_type() {
            ConvertedType::NONE => LogicalKind::Plain,
            ConvertedType::INT_8 => integer(8, true),
            ConvertedType::INT_16 => integer(16, true),
            ConvertedType::INT_32 => integer(32, true),
            ConvertedType::INT_64 => integer(64, true),
            ConvertedType::UINT_8 => integer(8, false),
            ConvertedType::UINT_16 => integer(16, false),
            ConvertedType::UINT_32 => integer(32, false),
            ConvertedType::UINT_64 => integer(64, false),
            ConvertedType::DATE => LogicalKind::Date,
            ConvertedType::TIMESTAMP_MILLIS => LogicalKind::Timestamp(TimeUnit::Millisecond),
            ConvertedType::TIMESTAMP_MICROS => LogicalKind::Timestamp(TimeUnit::Microsecond),
            _ => LogicalKind::Other,
        },
    }
}

fn integer(bit_width: u8, signed: bool) -> LogicalKind {
    LogicalKind::Integer { bit_width, signed }
}

fn min_max<T: Copy>(min: Option<&T>, max: Option<&T>) -> Option<MinMax<T>> {
    Some(MinMax::new(*min?, *max?))
}

impl LogicalStatistics {
    /// Convert parquet chunk statistics for `column`.
    ///
    /// Returns `None` when the statistics have no min/max (for example an
    /// all-null row group) or the physical/logical type pair is not one we
    /// can interpret.
    pub fn from_parquet(stats: &Statistics, column: &ColumnDescriptor) -> Option<Self> {
        let kind = logical_kind(column);
        match stats {
            Statistics::Boolean(s) if kind == LogicalKind::Plain => {
                min_max(s.min_opt(), s.max_opt()).map(LogicalStatistics::Boolean)
            }
            Statistics::Int32(s) => {
                let range = min_max(s.min_opt(), s.max_opt())?;
                match kind {
                    LogicalKind::Plain | LogicalKind::Integer { bit_width: 32, signed: true } => {
                        Some(LogicalStatistics::Int32(range))
                    }
                    LogicalKind::Integer { bit_width: 8, signed: true } => {
                        Some(LogicalStatistics::Int8(range.map(|v| v as i8)))
                    }
                    LogicalKind::Integer { bit_width: 16, signed: true } => {
                        Some(LogicalStatistics::Int16(range.map(|v| v as i16)))
                    }
                    LogicalKind::Integer { bit_width: 8, signed: false } => {
                        Some(LogicalStatistics::UInt8(range.map(|v| v as u8)))
                    }
                    LogicalKind::Integer { bit_width: 16, signed: false } => {
                        Some(LogicalStatistics::UInt16(range.map(|v| v as u16)))
                    }
                    LogicalKind::Integer { bit_width: 32, signed: false } => {
                        Some(LogicalStatistics::UInt32(range.map(|v| v as u32)))
                    }
                    LogicalKind::Date => Some(LogicalStatistics::Date(range)),
                    _ => None,
                }
            }
            Statistics::Int64(s) => {
                let range = min_max(s.min_opt(), s.max_opt())?;
                match kind {
                    LogicalKind::Plain | LogicalKind::Integer { bit_width: 64, signed: true } => {
                        Some(LogicalStatistics::Int64(range))
                    }
                    LogicalKind::Integer { bit_width: 64, signed: false } => {
                        Some(LogicalStatistics::UInt64(range.map(|v| v as u64)))
                    }
                    LogicalKind::Timestamp(unit) => {
                        Some(LogicalStatistics::Timestamp { unit, range })
                    }
                    _ => None,
                }
            }
            Statistics::Float(s) if kind == LogicalKind::Plain => {
                min_max(s.min_opt(), s.max_opt()).map(LogicalStatistics::Float32)
            }
            Statistics::Double(s) if kind == LogicalKind::Plain => {
                min_max(s.min_opt(), s.max_opt()).map(LogicalStatistics::Float64)
            }
            Statistics::FixedLenByteArray(s) if kind == LogicalKind::Float16 => {
                let min = half_from_bytes(s.min_opt()?.data())?;
                let max = half_from_bytes(s.max_opt()?.data())?;
                Some(LogicalStatistics::Float16(MinMax::new(min, max)))
            }
            _ => None,
        }
    }

    /// Bounds of an integer column, widened so every width compares exactly
    pub(crate) fn integer_bounds(&self) -> Option<(i128, i128)> {
        fn widen<T: Into<i128> + Copy>(range: &MinMax<T>) -> Option<(i128, i128)> {
            Some((range.min.into(), range.max.into()))
        }
        match self {
            LogicalStatistics::Int8(range) => widen(range),
            LogicalStatistics::Int16(range) => widen(range),
            LogicalStatistics::Int32(range) => widen(range),
            LogicalStatistics::Int64(range) => widen(range),
            LogicalStatistics::UInt8(range) => widen(range),
            LogicalStatistics::UInt16(range) => widen(range),
            LogicalStatistics::UInt32(range) => widen(range),
            LogicalStatistics::UInt64(range) => widen(range),
            _ => None,
        }
    }

    /// Bounds of a date column in days
    pub(crate) fn date_bounds(&self) -> Option<(i128, i128)> {
        match self {
            LogicalStatistics::Date(range) => Some((range.min.into(), range.max.into())),
            _ => None,
        }
    }

    /// Bounds of a timestamp column in nanoseconds
    pub(crate) fn timestamp_bounds(&self) -> Option<(i128, i128)> {
        match self {
            LogicalStatistics::Timestamp { unit, range } => {
                let factor = nanos_per_tick(*unit);
                Some((range.min as i128 * factor, range.max as i128 * factor))
            }
            _ => None,
        }
    }
}

pub(crate) fn nanos_per_tick(unit: TimeUnit) -> i128 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

fn half_from_bytes(bytes: &[u8]) -> Option<f16> {
    let bytes: [u8; 2] = bytes.try_into().ok()?;
    Some(f16::from_le_bytes(bytes))
}
