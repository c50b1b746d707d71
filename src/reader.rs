use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use arrow::{
    array::RecordBatch,
    datatypes::{Schema, SchemaRef},
};
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use tokio::fs::File;
use tracing::debug;

use crate::{
    error::{DatasetError, Result},
    filter::Filter,
    fragment::{Fragment, FragmentEnumerator},
    options::ScanOptions,
    partition::{
        HivePartitioning, HivePartitioningFactory, NoPartitioning, Partitioning,
        PartitioningFactory,
    },
    schema::{merge_schemas, validate_partition_schema},
    stream::DatasetStreamReader,
};

/// How a [`DatasetReader`] learns its partitioning.
#[derive(Debug)]
pub enum PartitioningSource {
    /// A partitioning with a known schema
    Fixed(Arc<dyn Partitioning>),
    /// A factory that infers the partitioning from the first fragment's directories
    Factory(Box<dyn PartitioningFactory>),
}

impl From<Arc<dyn Partitioning>> for PartitioningSource {
    fn from(partitioning: Arc<dyn Partitioning>) -> Self {
        Self::Fixed(partitioning)
    }
}

impl From<HivePartitioning> for PartitioningSource {
    fn from(partitioning: HivePartitioning) -> Self {
        Self::Fixed(Arc::new(partitioning))
    }
}

impl From<NoPartitioning> for PartitioningSource {
    fn from(partitioning: NoPartitioning) -> Self {
        Self::Fixed(Arc::new(partitioning))
    }
}

impl From<HivePartitioningFactory> for PartitioningSource {
    fn from(factory: HivePartitioningFactory) -> Self {
        Self::Factory(Box::new(factory))
    }
}

/// Entry point for scanning a directory of parquet files.
///
/// The dataset schema is the partitioning schema followed by the file schema.
/// When no schema is supplied it is inferred from the first data file found
/// under the root; a supplied schema is checked against the partitioning.
///
/// # Examples
///
/// ```no_run
/// use parquet_dataset::{DatasetReader, HivePartitioning, ScanOptions, col};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let reader = DatasetReader::try_new(
///     "/data/events",
///     HivePartitioning::factory(),
///     None,
///     ScanOptions::default(),
/// )
/// .await?;
///
/// let table = reader
///     .scan()
///     .with_filter(col("region").eq_str("emea").and(col("id").between(10, 20)))
///     .with_columns(["id", "region"])
///     .to_table()
///     .await?;
/// println!("{} rows", table.num_rows());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatasetReader {
    root: PathBuf,
    partitioning: Arc<dyn Partitioning>,
    schema: SchemaRef,
    options: ScanOptions,
}

impl DatasetReader {
    pub async fn try_new(
        root: impl Into<PathBuf>,
        partitioning: impl Into<PartitioningSource>,
        schema: Option<SchemaRef>,
        options: ScanOptions,
    ) -> Result<Self> {
        let root = root.into();
        let first = first_fragment(&root, options.file_extension()).await?;

        let partitioning = match partitioning.into() {
            PartitioningSource::Fixed(partitioning) => partitioning,
            PartitioningSource::Factory(mut factory) => {
                if let Some(fragment) = &first {
                    factory.inspect(fragment.path_segments())?;
                }
                factory.build(schema.as_deref())?
            }
        };

        let schema = match schema {
            Some(schema) => {
                validate_partition_schema(partitioning.schema(), &schema)?;
                schema
            }
            None => {
                let data_schema = match &first {
                    Some(fragment) => read_file_schema(fragment.file_path()).await?,
                    None => Arc::new(Schema::empty()),
                };
                let schema = Arc::new(merge_schemas(partitioning.schema(), &data_schema)?);
                debug!(root = %root.display(), schema = ?schema, "inferred dataset schema");
                schema
            }
        };

        Ok(Self {
            root,
            partitioning,
            schema,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Partitioning fields followed by file fields
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn partitioning(&self) -> &Arc<dyn Partitioning> {
        &self.partitioning
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Start configuring a scan over every column
    pub fn scan(&self) -> ScanRequest<'_> {
        ScanRequest::new(self)
    }

    /// Stream every column, optionally filtered
    pub fn to_batches(&self, filter: Option<Filter>) -> Result<DatasetStreamReader> {
        let mut request = self.scan();
        request.filter = filter;
        request.into_stream()
    }

    /// Read every column into a single batch, optionally filtered
    pub async fn to_table(&self, filter: Option<Filter>) -> Result<RecordBatch> {
        self.to_batches(filter)?.collect().await
    }
}

/// Builder for one scan of a [`DatasetReader`].
///
/// Column names and filter columns are checked when the scan starts, before
/// any file is opened.
#[derive(Debug)]
pub struct ScanRequest<'a> {
    reader: &'a DatasetReader,
    filter: Option<Filter>,
    columns: Option<Vec<String>>,
    excluded_columns: Option<Vec<String>>,
}

impl<'a> ScanRequest<'a> {
    pub fn new(reader: &'a DatasetReader) -> Self {
        Self {
            reader,
            filter: None,
            columns: None,
            excluded_columns: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Output only these columns, in the given order
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Output every column except these, in dataset order
    pub fn with_excluded_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Validate the request and open a lazy batch stream
    pub fn into_stream(self) -> Result<DatasetStreamReader> {
        let dataset_schema = self.reader.schema();
        if let Some(filter) = &self.filter {
            for column in filter.columns() {
                if dataset_schema.field_with_name(column).is_err() {
                    return Err(DatasetError::usage(format!(
                        "Invalid field name '{column}' in filter expression"
                    )));
                }
            }
        }
        let output_schema = self.output_schema()?;

        let filter = self.filter.map(Arc::new);
        let fragments = FragmentEnumerator::new(
            self.reader.root.clone(),
            self.reader.partitioning.clone(),
            filter.clone(),
            self.reader.options.file_extension(),
        );
        Ok(DatasetStreamReader::new(
            fragments,
            filter,
            output_schema,
            self.reader.options.clone(),
        ))
    }

    /// Read all matching rows into a single batch
    pub async fn to_table(self) -> Result<RecordBatch> {
        self.into_stream()?.collect().await
    }

    fn output_schema(&self) -> Result<SchemaRef> {
        let schema = self.reader.schema();
        let check = |column: &str| {
            schema.index_of(column).map_err(|_| {
                DatasetError::usage(format!("Invalid column name '{column}'"))
            })
        };
        match (&self.columns, &self.excluded_columns) {
            (Some(_), Some(_)) => Err(DatasetError::usage(
                "Cannot specify both columns and excluded columns",
            )),
            (Some(columns), None) => {
                let indices = columns
                    .iter()
                    .map(|column| check(column))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(schema.project(&indices)?))
            }
            (None, Some(excluded)) => {
                for column in excluded {
                    check(column)?;
                }
                let fields: Vec<_> = schema
                    .fields()
                    .iter()
                    .filter(|field| !excluded.contains(field.name()))
                    .cloned()
                    .collect();
                Ok(Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())))
            }
            (None, None) => Ok(schema.clone()),
        }
    }
}

/// The first data file under `root`, visiting directories without partitioning
async fn first_fragment(root: &Path, extension: &str) -> Result<Option<Fragment>> {
    FragmentEnumerator::new(root, Arc::new(NoPartitioning), None, extension)
        .next_fragment()
        .await
        .transpose()
}

async fn read_file_schema(path: &Path) -> Result<SchemaRef> {
    let file = File::open(path).await?;
    let builder = ParquetRecordBatchStreamBuilder::new(file).await?;
    Ok(builder.schema().clone())
}
