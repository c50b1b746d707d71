//! Filter expressions evaluated at three granularities.
//!
//! A [`Filter`] is a tree of single-column conditions joined with AND/OR.
//! The same tree decides which partition directories to visit, which row
//! groups to decode and finally which rows to keep.

use std::{collections::HashMap, fmt};

use arrow::array::RecordBatch;

use crate::{error::Result, partition::PartitionValues};

mod apply;
mod column;
mod mask;
mod predicate;
mod row_groups;
mod stats;

pub use apply::{apply_mask, filter_batch};
pub(crate) use apply::mask_batch;
pub use column::{ColumnRef, col};
pub use mask::FilterMask;
pub use predicate::CmpOp;
pub use row_groups::select_row_groups;
pub use stats::{LogicalStatistics, MinMax};

use predicate::Predicate;

/// A condition on one named column
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnFilter {
    column: String,
    predicate: Predicate,
}

impl ColumnFilter {
    pub fn column(&self) -> &str {
        &self.column
    }
}

/// An immutable predicate tree
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Column(ColumnFilter),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn and(self, other: Filter) -> Filter {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Filter {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Decide whether a directory with these partition values may hold
    /// matching rows.
    ///
    /// Conditions on columns the directory path does not set are treated as
    /// satisfied; they are resolved deeper in the tree or at row level.
    pub fn include_partition(&self, partition: &PartitionValues) -> Result<bool> {
        match self {
            Filter::Column(filter) => match partition.column(&filter.column) {
                Some(values) => Ok(filter
                    .predicate
                    .compute_mask(&filter.column, values.as_ref())?
                    .included_count()
                    > 0),
                None => Ok(true),
            },
            Filter::And(left, right) => {
                Ok(left.include_partition(partition)? && right.include_partition(partition)?)
            }
            Filter::Or(left, right) => {
                Ok(left.include_partition(partition)? || right.include_partition(partition)?)
            }
        }
    }

    /// Decide from min/max statistics whether a row group may hold matching
    /// rows. Columns without statistics never exclude a row group.
    pub fn include_row_group(&self, statistics: &HashMap<String, LogicalStatistics>) -> bool {
        match self {
            Filter::Column(filter) => statistics
                .get(&filter.column)
                .is_none_or(|stats| filter.predicate.include_statistics(stats)),
            Filter::And(left, right) => {
                left.include_row_group(statistics) && right.include_row_group(statistics)
            }
            Filter::Or(left, right) => {
                left.include_row_group(statistics) || right.include_row_group(statistics)
            }
        }
    }

    /// Compute the row mask for a batch.
    ///
    /// `Ok(None)` means the filter does not constrain this batch because
    /// none of the columns it needs are present, so every row passes.
    pub fn compute_mask(&self, batch: &RecordBatch) -> Result<Option<FilterMask>> {
        match self {
            Filter::Column(filter) => match batch.column_by_name(&filter.column) {
                Some(array) => filter
                    .predicate
                    .compute_mask(&filter.column, array.as_ref())
                    .map(Some),
                None => Ok(None),
            },
            Filter::And(left, right) => {
                let left = left.compute_mask(batch)?;
                let right = right.compute_mask(batch)?;
                Ok(match (left, right) {
                    (Some(left), Some(right)) => Some(left.and(&right)),
                    (Some(mask), None) | (None, Some(mask)) => Some(mask),
                    (None, None) => None,
                })
            }
            Filter::Or(left, right) => {
                let Some(left) = left.compute_mask(batch)? else {
                    return Ok(None);
                };
                let Some(right) = right.compute_mask(batch)? else {
                    return Ok(None);
                };
                Ok(Some(left.or(&right)))
            }
        }
    }

    /// Names of referenced columns, without duplicates, in first-use order
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, columns: &mut Vec<&'a str>) {
        match self {
            Filter::Column(filter) => {
                if !columns.contains(&filter.column.as_str()) {
                    columns.push(&filter.column);
                }
            }
            Filter::And(left, right) | Filter::Or(left, right) => {
                left.collect_columns(columns);
                right.collect_columns(columns);
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Column(filter) => write!(f, "{} {}", filter.column, filter.predicate),
            Filter::And(left, right) => write!(f, "({left} AND {right})"),
            Filter::Or(left, right) => write!(f, "({left} OR {right})"),
        }
    }
}
