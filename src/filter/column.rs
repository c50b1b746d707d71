use std::collections::BTreeSet;

use super::{ColumnFilter, Filter, predicate::{CmpOp, Predicate}};

/// Start building a filter on the column `name`.
///
/// # Example
/// ```
/// use parquet_dataset::col;
///
/// let filter = col("part").eq_str("b").and(col("id").between(15, 25));
/// assert_eq!(filter.to_string(), "(part IN ('b') AND id BETWEEN 15 AND 25)");
/// ```
pub fn col(name: impl Into<String>) -> ColumnRef {
    ColumnRef { name: name.into() }
}

/// A named column awaiting a condition
#[derive(Clone, Debug)]
pub struct ColumnRef {
    name: String,
}

impl ColumnRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn with(self, predicate: Predicate) -> Filter {
        Filter::Column(ColumnFilter {
            column: self.name,
            predicate,
        })
    }

    /// Compare an integer column against `value`
    ///
    /// Works for signed and unsigned columns of any width. Values outside
    /// the column's range are handled exactly, e.g. `lt(-1)` on an unsigned
    /// column matches nothing.
    pub fn cmp(self, op: CmpOp, value: i64) -> Filter {
        self.with(Predicate::IntCompare(op, value))
    }

    pub fn eq(self, value: i64) -> Filter {
        self.cmp(CmpOp::Eq, value)
    }

    pub fn gt(self, value: i64) -> Filter {
        self.cmp(CmpOp::Gt, value)
    }

    pub fn gt_eq(self, value: i64) -> Filter {
        self.cmp(CmpOp::GtEq, value)
    }

    pub fn lt(self, value: i64) -> Filter {
        self.cmp(CmpOp::Lt, value)
    }

    pub fn lt_eq(self, value: i64) -> Filter {
        self.cmp(CmpOp::LtEq, value)
    }

    /// Integer column within `[start, end]`
    pub fn between(self, start: i64, end: i64) -> Filter {
        self.with(Predicate::IntRange(start, end))
    }

    /// String column equal to `value`
    pub fn eq_str(self, value: impl Into<String>) -> Filter {
        self.is_in([value])
    }

    /// String column equal to any of `values`
    pub fn is_in<I, S>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(Predicate::StringSet {
            values: values.into_iter().map(Into::into).collect(),
            include_null: false,
        })
    }

    /// String column equal to any of `values`, where `None` admits null rows
    pub fn is_in_optional<I, S>(self, values: I) -> Filter
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        let mut include_null = false;
        let mut set = BTreeSet::new();
        for value in values {
            match value {
                Some(value) => {
                    set.insert(value.into());
                }
                None => include_null = true,
            }
        }
        self.with(Predicate::StringSet {
            values: set,
            include_null,
        })
    }

    /// Compare a date column against `days` since 1970-01-01
    pub fn date_cmp(self, op: CmpOp, days: i32) -> Filter {
        self.with(Predicate::DateCompare(op, days))
    }

    /// Date column within `[start, end]`, both in days since 1970-01-01
    pub fn date_between(self, start: i32, end: i32) -> Filter {
        self.with(Predicate::DateRange(start, end))
    }

    /// Compare a timestamp column against `nanos` since the UNIX epoch
    ///
    /// Column values of any unit are compared exactly.
    pub fn timestamp_cmp(self, op: CmpOp, nanos: i64) -> Filter {
        self.with(Predicate::TimestampCompare(op, nanos))
    }

    /// Timestamp column within `[start, end)`, in nanoseconds since the UNIX epoch
    pub fn timestamp_between(self, start: i64, end: i64) -> Filter {
        self.with(Predicate::TimestampRange(start, end))
    }
}
