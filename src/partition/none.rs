use std::sync::{Arc, LazyLock};

use arrow::datatypes::{Schema, SchemaRef};

use super::{PartitionValues, Partitioning, PartitioningFactory};
use crate::error::Result;

static EMPTY_SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| Arc::new(Schema::empty()));

/// Directory names carry no values; every file gets an empty partition row.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPartitioning;

impl Partitioning for NoPartitioning {
    fn schema(&self) -> &SchemaRef {
        &EMPTY_SCHEMA
    }

    fn parse(&self, _segments: &[String]) -> Result<PartitionValues> {
        PartitionValues::empty()
    }

    fn sort_directories(&self, directories: &mut [String]) {
        directories.sort();
    }
}

impl PartitioningFactory for NoPartitioning {
    fn inspect(&mut self, _segments: &[String]) -> Result<()> {
        Ok(())
    }

    fn build(&self, _schema: Option<&Schema>) -> Result<Arc<dyn Partitioning>> {
        Ok(Arc::new(NoPartitioning))
    }
}
