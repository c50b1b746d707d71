use std::collections::HashMap;

use parquet::{file::metadata::ParquetMetaData, schema::types::SchemaDescriptor};

use super::{Filter, LogicalStatistics};

/// Choose the row groups of a file that may contain rows matching `filter`.
///
/// Returns `None` when no filter column maps to a top-level leaf column of
/// the file, meaning every row group must be read. Otherwise returns the
/// surviving row group indices in file order, which may be empty.
pub fn select_row_groups(filter: &Filter, metadata: &ParquetMetaData) -> Option<Vec<usize>> {
    let lookup = build_column_lookup(metadata.file_metadata().schema_descr());
    let columns: Vec<(&str, usize)> = filter
        .columns()
        .into_iter()
        .filter_map(|name| lookup.get(name).map(|idx| (name, *idx)))
        .collect();
    if columns.is_empty() {
        return None;
    }

    let selected = metadata
        .row_groups()
        .iter()
        .enumerate()
        .filter(|(_, row_group)| {
            let statistics: HashMap<String, LogicalStatistics> = columns
                .iter()
                .filter_map(|(name, idx)| {
                    let chunk = row_group.column(*idx);
                    let stats =
                        LogicalStatistics::from_parquet(chunk.statistics()?, chunk.column_descr())?;
                    Some((name.to_string(), stats))
                })
                .collect();
            filter.include_row_group(&statistics)
        })
        .map(|(idx, _)| idx)
        .collect();
    Some(selected)
}

/// Map top-level leaf column names to their leaf index.
///
/// Leaves nested in groups are skipped; filters only address top-level
/// fields.
fn build_column_lookup(schema: &SchemaDescriptor) -> HashMap<String, usize> {
    schema
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, column)| column.path().parts().len() == 1)
        .map(|(idx, column)| (column.name().to_string(), idx))
        .collect()
}
