/// Options controlling how a dataset scan reads its files
#[derive(Clone, Debug)]
pub struct ScanOptions {
    batch_size: usize,
    row_group_statistics: bool,
    file_extension: String,
}

impl ScanOptions {
    /// Create a new builder for ScanOptions
    ///
    /// # Example
    /// ```
    /// use parquet_dataset::ScanOptions;
    ///
    /// let options = ScanOptions::builder()
    ///     .batch_size(1024)
    ///     .row_group_statistics(false)
    ///     .build();
    /// assert_eq!(options.batch_size(), 1024);
    /// ```
    pub fn builder() -> ScanOptionsBuilder {
        ScanOptionsBuilder::default()
    }

    /// Maximum number of rows per decoded batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Check if row group statistics pruning is enabled
    pub fn row_group_statistics(&self) -> bool {
        self.row_group_statistics
    }

    /// Extension (without the dot) identifying data files
    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptionsBuilder::default().build()
    }
}

/// Builder for ScanOptions
#[derive(Clone, Debug, Default)]
pub struct ScanOptionsBuilder {
    batch_size: Option<usize>,
    row_group_statistics: Option<bool>,
    file_extension: Option<String>,
}

impl ScanOptionsBuilder {
    /// Rows per batch requested from the parquet decoder (default: 8192)
    ///
    /// Row filtering happens after decoding, so emitted batches may hold
    /// fewer rows than this.
    pub fn batch_size(mut self, value: usize) -> Self {
        self.batch_size = Some(value);
        self
    }

    /// Enable or disable row group pruning from column statistics (default: true)
    ///
    /// When disabled every row group of every surviving file is decoded and
    /// the filter is only applied row by row.
    pub fn row_group_statistics(mut self, value: bool) -> Self {
        self.row_group_statistics = Some(value);
        self
    }

    /// Data file extension, matched case-insensitively (default: "parquet")
    pub fn file_extension(mut self, value: impl Into<String>) -> Self {
        self.file_extension = Some(value.into());
        self
    }

    /// Build the ScanOptions
    pub fn build(self) -> ScanOptions {
        ScanOptions {
            batch_size: self.batch_size.unwrap_or(8192).max(1),
            row_group_statistics: self.row_group_statistics.unwrap_or(true),
            file_extension: self
                .file_extension
                .unwrap_or_else(|| "parquet".to_string()),
        }
    }
}
