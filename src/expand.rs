use std::{iter, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, ArrowPrimitiveType, AsArray, LargeStringArray, PrimitiveArray,
        RecordBatch, RecordBatchOptions, StringArray, new_null_array,
    },
    datatypes::{
        FieldRef, Int8Type, Int16Type, Int32Type, Int64Type, Schema, SchemaRef, UInt8Type,
        UInt16Type, UInt32Type, UInt64Type,
    },
};
use arrow_schema::DataType;

use crate::{
    error::{DatasetError, Result},
    partition::PartitionValues,
    schema::types_match,
};

/// Reshapes fragment batches into the scan's output schema.
///
/// Columns read from the file pass through, partition columns are filled
/// with the fragment's constant value and nullable columns found in neither
/// place are filled with nulls.
#[derive(Clone, Debug)]
pub struct FragmentExpander {
    schema: SchemaRef,
}

impl FragmentExpander {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn expand(&self, batch: &RecordBatch, partition: &PartitionValues) -> Result<RecordBatch> {
        let num_rows = batch.num_rows();
        let batch_schema = batch.schema_ref();
        let mut columns = Vec::with_capacity(self.schema.fields().len());
        for field in self.schema.fields() {
            let name = field.name();
            let in_partition = partition.column(name);
            match batch_schema.column_with_name(name) {
                Some((idx, batch_field)) => {
                    if in_partition.is_some() {
                        return Err(DatasetError::schema_conflict(format!(
                            "Field '{name}' found in both the fragment data and partition \
                             information"
                        )));
                    }
                    if !types_match(batch_field.data_type(), field.data_type()) {
                        return Err(DatasetError::schema_conflict(format!(
                            "Data type {} for column '{name}' doesn't match the expected type {}",
                            batch_field.data_type(),
                            field.data_type()
                        )));
                    }
                    columns.push(batch.column(idx).clone());
                }
                None => match in_partition {
                    Some(value) => columns.push(constant_array(name, value.as_ref(), num_rows)?),
                    None if field.is_nullable() => {
                        columns.push(new_null_array(field.data_type(), num_rows))
                    }
                    None => {
                        return Err(DatasetError::schema_conflict(format!(
                            "Field '{name}' not found in fragment data or partition information"
                        )));
                    }
                },
            }
        }
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(self.schema.clone(), columns, &options)?)
    }
}

/// Append partition columns named in `columns` that `batch` lacks.
///
/// Lets a filter that mixes partition and file columns see every value it
/// references for each row.
pub(crate) fn with_partition_columns(
    batch: &RecordBatch,
    partition: &PartitionValues,
    columns: &[&str],
) -> Result<RecordBatch> {
    let missing: Vec<&str> = columns
        .iter()
        .copied()
        .filter(|name| {
            batch.schema_ref().column_with_name(name).is_none() && partition.contains(name)
        })
        .collect();
    if missing.is_empty() {
        return Ok(batch.clone());
    }

    let num_rows = batch.num_rows();
    let partition_schema = partition.schema();
    let mut fields: Vec<FieldRef> = batch.schema_ref().fields().iter().cloned().collect();
    let mut arrays = batch.columns().to_vec();
    for name in missing {
        let (idx, field) = partition_schema.column_with_name(name).ok_or_else(|| {
            DatasetError::schema_conflict(format!("Missing partition field '{name}'"))
        })?;
        fields.push(Arc::new(field.clone()));
        arrays.push(constant_array(name, partition.batch().column(idx).as_ref(), num_rows)?);
    }
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), arrays, &options)?)
}

/// Repeat the single value in `value` `len` times
pub(crate) fn constant_array(column: &str, value: &dyn Array, len: usize) -> Result<ArrayRef> {
    if value.is_null(0) {
        return Ok(new_null_array(value.data_type(), len));
    }
    let array = match value.data_type() {
        DataType::Int8 => repeat_primitive::<Int8Type>(value, len),
        DataType::Int16 => repeat_primitive::<Int16Type>(value, len),
        DataType::Int32 => repeat_primitive::<Int32Type>(value, len),
        DataType::Int64 => repeat_primitive::<Int64Type>(value, len),
        DataType::UInt8 => repeat_primitive::<UInt8Type>(value, len),
        DataType::UInt16 => repeat_primitive::<UInt16Type>(value, len),
        DataType::UInt32 => repeat_primitive::<UInt32Type>(value, len),
        DataType::UInt64 => repeat_primitive::<UInt64Type>(value, len),
        DataType::Utf8 => {
            let value = value.as_string::<i32>().value(0);
            Arc::new(StringArray::from_iter_values(iter::repeat_n(value, len))) as ArrayRef
        }
        DataType::LargeUtf8 => {
            let value = value.as_string::<i64>().value(0);
            Arc::new(LargeStringArray::from_iter_values(iter::repeat_n(value, len))) as ArrayRef
        }
        other => {
            return Err(DatasetError::unsupported_type("Constant partition column", column, other));
        }
    };
    Ok(array)
}

fn repeat_primitive<T: ArrowPrimitiveType>(value: &dyn Array, len: usize) -> ArrayRef {
    let value = value.as_primitive::<T>().value(0);
    Arc::new(PrimitiveArray::<T>::from_value(value, len))
}
