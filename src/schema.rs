//! Reconciling the partitioning schema with data file schemas.

use arrow::datatypes::{Field, Schema};
use arrow_schema::DataType;

use crate::error::{DatasetError, Result};

/// Whether data of type `actual` can stand in for a field declared as
/// `expected`.
///
/// Compares structure and nested types while ignoring the names of nested
/// list items and field metadata.
pub fn types_match(actual: &DataType, expected: &DataType) -> bool {
    actual.equals_datatype(expected)
}

/// Dataset schema: partition fields followed by data file fields
pub fn merge_schemas(partition: &Schema, data: &Schema) -> Result<Schema> {
    if partition.fields().is_empty() {
        return Ok(data.clone());
    }
    for field in partition.fields() {
        if data.column_with_name(field.name()).is_some() {
            return Err(DatasetError::schema_conflict(format!(
                "Duplicate field name '{}' found in partition schema and data file schema",
                field.name()
            )));
        }
    }
    let fields: Vec<Field> = partition
        .fields()
        .iter()
        .chain(data.fields().iter())
        .map(|field| field.as_ref().clone())
        .collect();
    Ok(Schema::new_with_metadata(fields, data.metadata().clone()))
}

/// Check that every partition field is declared by `dataset` with the same type
pub fn validate_partition_schema(partition: &Schema, dataset: &Schema) -> Result<()> {
    for field in partition.fields() {
        let Ok(dataset_field) = dataset.field_with_name(field.name()) else {
            return Err(DatasetError::schema_conflict(format!(
                "Partitioning field '{}' is not present in the dataset schema",
                field.name()
            )));
        };
        if !types_match(field.data_type(), dataset_field.data_type()) {
            return Err(DatasetError::schema_conflict(format!(
                "Partitioning field '{}' type {} does not match the dataset field type {}",
                field.name(),
                field.data_type(),
                dataset_field.data_type()
            )));
        }
    }
    Ok(())
}
