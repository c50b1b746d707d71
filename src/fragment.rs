use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::fs;
use tracing::debug;

use crate::{
    error::{DatasetError, Result},
    filter::Filter,
    partition::{PartitionValues, Partitioning},
};

/// One data file together with the partition values of its directory
#[derive(Clone, Debug)]
pub struct Fragment {
    file_path: PathBuf,
    partition: PartitionValues,
    path_segments: Vec<String>,
}

impl Fragment {
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn partition(&self) -> &PartitionValues {
        &self.partition
    }

    /// Directory names between the dataset root and the file
    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }
}

/// Breadth-first discovery of the data files below a dataset root.
///
/// Each directory's partition values are checked against the filter before
/// anything below it is listed, so pruned subtrees are never read.
/// Subdirectories are visited in the partitioning's order and files in
/// lexical order. Directories are listed through `tokio::fs`, one at a time
/// as fragments are requested. Enumeration is single pass and stops after
/// the first error.
#[derive(Debug)]
pub struct FragmentEnumerator {
    root: PathBuf,
    partitioning: Arc<dyn Partitioning>,
    filter: Option<Arc<Filter>>,
    extension: String,
    directories: VecDeque<Vec<String>>,
    files: VecDeque<Fragment>,
    failed: bool,
}

impl FragmentEnumerator {
    pub fn new(
        root: impl Into<PathBuf>,
        partitioning: Arc<dyn Partitioning>,
        filter: Option<Arc<Filter>>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            partitioning,
            filter,
            extension: extension.into(),
            directories: VecDeque::from([Vec::new()]),
            files: VecDeque::new(),
            failed: false,
        }
    }

    fn is_data_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case(&self.extension))
    }

    /// List one directory, queueing its subdirectories and data files
    async fn visit(&mut self, segments: Vec<String>) -> Result<()> {
        let partition = self.partitioning.parse(&segments)?;
        if let Some(filter) = &self.filter {
            if !filter.include_partition(&partition)? {
                debug!(path = %segments.join("/"), "partition pruned by filter");
                return Ok(());
            }
        }

        let directory = segments.iter().fold(self.root.clone(), |path, segment| path.join(segment));
        let mut subdirectories = Vec::new();
        let mut files = Vec::new();
        let mut entries = fs::read_dir(&directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // follows symlinks, like `Path::is_dir`
            let is_dir = fs::metadata(&path).await.is_ok_and(|metadata| metadata.is_dir());
            if is_dir {
                let name = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or_else(|| {
                        DatasetError::usage(format!(
                            "Directory name is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                subdirectories.push(name.to_string());
            } else if self.is_data_file(&path) {
                files.push(path);
            }
        }

        self.partitioning.sort_directories(&mut subdirectories);
        files.sort();

        for name in subdirectories {
            let mut child = segments.clone();
            child.push(name);
            self.directories.push_back(child);
        }
        for file_path in files {
            self.files.push_back(Fragment {
                file_path,
                partition: partition.clone(),
                path_segments: segments.clone(),
            });
        }
        Ok(())
    }

    /// The next data file, or `None` once the tree is exhausted
    pub async fn next_fragment(&mut self) -> Option<Result<Fragment>> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(fragment) = self.files.pop_front() {
                return Some(Ok(fragment));
            }
            let segments = self.directories.pop_front()?;
            if let Err(err) = self.visit(segments).await {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}
