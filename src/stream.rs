use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use arrow::{array::RecordBatch, datatypes::SchemaRef};
use futures_util::{Stream, StreamExt, stream};
use parquet::arrow::{
    ProjectionMask,
    async_reader::{ParquetRecordBatchStream, ParquetRecordBatchStreamBuilder},
};
use tokio::fs::File;
use tracing::{debug, trace};

use crate::{
    error::{DatasetError, Result},
    expand::{FragmentExpander, with_partition_columns},
    filter::{Filter, mask_batch, select_row_groups},
    fragment::{Fragment, FragmentEnumerator},
    options::ScanOptions,
    partition::PartitionValues,
};

/// Shared flag that stops a [`DatasetStreamReader`] at its next read
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    canceled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Acquire)
    }
}

/// The file currently being decoded
struct OpenFragment {
    stream: ParquetRecordBatchStream<File>,
    partition: PartitionValues,
}

/// Pull-based reader producing filtered batches in the output schema.
///
/// Fragments are opened one at a time; the previous file is closed before
/// the next one is opened. A reader must be driven by a single caller.
pub struct DatasetStreamReader {
    fragments: FragmentEnumerator,
    filter: Option<Arc<Filter>>,
    expander: FragmentExpander,
    required_columns: HashSet<String>,
    options: ScanOptions,
    current: Option<OpenFragment>,
    cancel: CancelHandle,
}

impl DatasetStreamReader {
    pub(crate) fn new(
        fragments: FragmentEnumerator,
        filter: Option<Arc<Filter>>,
        schema: SchemaRef,
        options: ScanOptions,
    ) -> Self {
        let mut required_columns: HashSet<String> =
            schema.fields().iter().map(|field| field.name().clone()).collect();
        if let Some(filter) = &filter {
            required_columns.extend(filter.columns().into_iter().map(str::to_string));
        }
        Self {
            fragments,
            filter,
            expander: FragmentExpander::new(schema),
            required_columns,
            options,
            current: None,
            cancel: CancelHandle::default(),
        }
    }

    /// Schema of every batch this reader returns
    pub fn schema(&self) -> SchemaRef {
        self.expander.schema().clone()
    }

    /// A handle that cancels this reader from elsewhere.
    ///
    /// Cancellation is observed at the start of the next call to
    /// [`next_batch`](Self::next_batch).
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Read the next non-empty batch, or `None` once all fragments are done
    pub async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        if self.cancel.is_canceled() {
            self.current = None;
            return Err(DatasetError::Cancelled);
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.stream.next().await {
                    Some(batch) => {
                        let batch = batch?;
                        let filtered = match &self.filter {
                            Some(filter) => {
                                let view = with_partition_columns(
                                    &batch,
                                    &current.partition,
                                    &filter.columns(),
                                )?;
                                mask_batch(batch, filter.compute_mask(&view)?)?
                            }
                            None => Some(batch),
                        };
                        if let Some(batch) = filtered {
                            return self.expander.expand(&batch, &current.partition).map(Some);
                        }
                        continue;
                    }
                    None => self.current = None,
                }
            }

            match self.fragments.next_fragment().await {
                Some(fragment) => {
                    self.current = open_fragment(
                        fragment?,
                        self.filter.as_deref(),
                        &self.required_columns,
                        &self.options,
                    )
                    .await?
                }
                None => return Ok(None),
            }
        }
    }

    /// Read every remaining batch into a single batch
    pub async fn collect(mut self) -> Result<RecordBatch> {
        let schema = self.schema();
        let mut batches = Vec::new();
        while let Some(batch) = self.next_batch().await? {
            batches.push(batch);
        }
        Ok(arrow::compute::concat_batches(&schema, &batches)?)
    }

    /// Adapt the reader into a [`Stream`] of batches
    pub fn into_stream(self) -> impl Stream<Item = Result<RecordBatch>> + Send {
        stream::try_unfold(self, |mut reader| async move {
            Ok(reader.next_batch().await?.map(|batch| (batch, reader)))
        })
    }
}

/// Open a fragment, returning `None` when none of its row groups can match
async fn open_fragment(
    fragment: Fragment,
    filter: Option<&Filter>,
    required_columns: &HashSet<String>,
    options: &ScanOptions,
) -> Result<Option<OpenFragment>> {
    let file = File::open(fragment.file_path()).await?;
    let builder = ParquetRecordBatchStreamBuilder::new(file).await?;

    let row_groups = match filter {
        Some(filter) if options.row_group_statistics() => {
            select_row_groups(filter, builder.metadata())
        }
        _ => None,
    };
    if row_groups.as_ref().is_some_and(Vec::is_empty) {
        debug!(
            path = %fragment.file_path().display(),
            "skipping file, no row group matches the filter"
        );
        return Ok(None);
    }

    let projection = ProjectionMask::roots(
        builder.parquet_schema(),
        builder
            .schema()
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, field)| required_columns.contains(field.name()))
            .map(|(idx, _)| idx),
    );
    trace!(
        path = %fragment.file_path().display(),
        row_groups = ?row_groups,
        "opening fragment"
    );

    let mut builder = builder
        .with_projection(projection)
        .with_batch_size(options.batch_size());
    if let Some(row_groups) = row_groups {
        builder = builder.with_row_groups(row_groups);
    }
    Ok(Some(OpenFragment {
        stream: builder.build()?,
        partition: fragment.partition().clone(),
    }))
}

impl std::fmt::Debug for DatasetStreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetStreamReader")
            .field("schema", self.expander.schema())
            .field("filter", &self.filter)
            .field("open_fragment", &self.current.is_some())
            .finish()
    }
}
