//! Mapping directory paths to partition column values.
//!
//! A [`Partitioning`] turns the directory segments between the dataset root
//! and a data file into a single row of typed values, and decides the order
//! in which sibling directories are visited. A [`PartitioningFactory`]
//! infers a partitioning from observed directory names.

use std::{fmt::Debug, sync::Arc};

use arrow::{
    array::{
        ArrayRef, Int8Array, Int16Array, Int32Array, Int64Array, LargeStringArray, RecordBatch,
        RecordBatchOptions, StringArray, UInt8Array, UInt16Array, UInt32Array, UInt64Array,
        new_null_array,
    },
    datatypes::{FieldRef, Schema, SchemaRef},
};
use arrow_schema::DataType;

use crate::error::{DatasetError, Result};

mod hive;
mod none;

pub use hive::{HIVE_NULL_SENTINEL, HivePartitioning, HivePartitioningFactory};
pub use none::NoPartitioning;

/// Partition values decoded from a directory path prefix.
///
/// Wraps a record batch with exactly one row. Its fields are the subset of
/// the partitioning schema named by the path, in path order.
#[derive(Clone, Debug)]
pub struct PartitionValues {
    batch: RecordBatch,
}

impl PartitionValues {
    /// Values for a path that names no partition fields
    pub fn empty() -> Result<Self> {
        let options = RecordBatchOptions::new().with_row_count(Some(1));
        let batch =
            RecordBatch::try_new_with_options(Arc::new(Schema::empty()), vec![], &options)?;
        Ok(Self { batch })
    }

    pub(crate) fn try_new(fields: Vec<FieldRef>, columns: Vec<ArrayRef>) -> Result<Self> {
        if fields.is_empty() {
            return Self::empty();
        }
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema, columns)?;
        Ok(Self { batch })
    }

    /// The single-row batch holding the values
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// The one-element array for `name`, if the path set that field
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.batch.schema_ref().column_with_name(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_columns() == 0
    }
}

/// A strategy for interpreting directory names as partition values.
///
/// Implementations are immutable and shared between concurrent scans.
pub trait Partitioning: Debug + Send + Sync {
    /// Fields that directory names can carry
    fn schema(&self) -> &SchemaRef;

    /// Decode the segments between the dataset root and a directory.
    ///
    /// A prefix of the full path yields a partial row.
    fn parse(&self, segments: &[String]) -> Result<PartitionValues>;

    /// Order sibling directory names for traversal
    fn sort_directories(&self, directories: &mut [String]);
}

/// Infers a [`Partitioning`] from observed directory paths.
pub trait PartitioningFactory: Debug + Send {
    /// Record the directory segments leading to one data file
    fn inspect(&mut self, segments: &[String]) -> Result<()>;

    /// Build the partitioning.
    ///
    /// With a schema, field types are taken from it and every observed field
    /// must be present. Without one the inferred types are used.
    fn build(&self, schema: Option<&Schema>) -> Result<Arc<dyn Partitioning>>;
}

/// Parse a textual partition value into a one-element array of `data_type`.
///
/// `None` produces a null element.
pub(crate) fn parse_scalar(
    field: &str,
    data_type: &DataType,
    value: Option<&str>,
) -> Result<ArrayRef> {
    macro_rules! parse_int {
        ($native:ty, $array:ty) => {{
            let parsed = match value {
                Some(value) => Some(value.parse::<$native>().map_err(|_| {
                    DatasetError::usage(format!(
                        "Could not parse partition value '{value}' for field '{field}' as \
                         {data_type}"
                    ))
                })?),
                None => None,
            };
            Arc::new(<$array>::from(vec![parsed])) as ArrayRef
        }};
    }

    let array = match data_type {
        DataType::Int8 => parse_int!(i8, Int8Array),
        DataType::Int16 => parse_int!(i16, Int16Array),
        DataType::Int32 => parse_int!(i32, Int32Array),
        DataType::Int64 => parse_int!(i64, Int64Array),
        DataType::UInt8 => parse_int!(u8, UInt8Array),
        DataType::UInt16 => parse_int!(u16, UInt16Array),
        DataType::UInt32 => parse_int!(u32, UInt32Array),
        DataType::UInt64 => parse_int!(u64, UInt64Array),
        DataType::Utf8 => Arc::new(StringArray::from(vec![value])) as ArrayRef,
        DataType::LargeUtf8 => Arc::new(LargeStringArray::from(vec![value])) as ArrayRef,
        DataType::Null if value.is_none() => new_null_array(data_type, 1),
        other => {
            return Err(DatasetError::unsupported_type("Partition value parsing", field, other));
        }
    };
    Ok(array)
}
