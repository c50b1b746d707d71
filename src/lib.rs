//! Scan directories of parquet files laid out with Hive style partitioning.
//!
//! A [`DatasetReader`] discovers data files under a root directory, derives
//! partition values from directory names such as `year=2024/region=emea`, and
//! streams record batches that carry both the file columns and the partition
//! columns. A [`Filter`] is applied at three levels: whole directories are
//! skipped using partition values, row groups are skipped using their
//! min/max statistics, and the remaining rows are masked after decoding.

mod error;
mod expand;
mod filter;
mod fragment;
mod options;
mod partition;
mod reader;
mod schema;
mod stream;

pub use error::{DatasetError, Result};
pub use expand::FragmentExpander;
pub use filter::{
    CmpOp, ColumnFilter, ColumnRef, Filter, FilterMask, LogicalStatistics, MinMax, apply_mask, col,
    filter_batch, select_row_groups,
};
pub use fragment::{Fragment, FragmentEnumerator};
pub use options::{ScanOptions, ScanOptionsBuilder};
pub use partition::{
    HIVE_NULL_SENTINEL, HivePartitioning, HivePartitioningFactory, NoPartitioning,
    PartitionValues, Partitioning, PartitioningFactory,
};
pub use reader::{DatasetReader, PartitioningSource, ScanRequest};
pub use schema::{merge_schemas, types_match, validate_partition_schema};
pub use stream::{CancelHandle, DatasetStreamReader};
