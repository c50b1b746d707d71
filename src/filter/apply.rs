use std::sync::Arc;

use arrow::{
    array::{
        Array, ArrayRef, ArrowPrimitiveType, AsArray, BooleanArray, DictionaryArray,
        FixedSizeBinaryArray, FixedSizeListArray, GenericByteArray, GenericByteViewBuilder,
        GenericListArray, MapArray, NullArray, OffsetSizeTrait, PrimitiveArray, RecordBatch,
        RecordBatchOptions, StructArray,
    },
    datatypes::{
        ArrowDictionaryKeyType, BinaryViewType, ByteArrayType, ByteViewType, Date32Type,
        Date64Type, Decimal128Type, Decimal256Type, DurationMicrosecondType,
        DurationMillisecondType, DurationNanosecondType, DurationSecondType, Float16Type,
        Float32Type, Float64Type, GenericBinaryType, GenericStringType, Int8Type, Int16Type,
        Int32Type, Int64Type, StringViewType, Time32MillisecondType, Time32SecondType,
        Time64MicrosecondType, Time64NanosecondType, TimestampMicrosecondType,
        TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType, UInt8Type,
        UInt16Type, UInt32Type, UInt64Type,
    },
};
use arrow_buffer::{
    ArrowNativeType, BooleanBufferBuilder, Buffer, MutableBuffer, NullBuffer, OffsetBuffer,
    ScalarBuffer,
};
use arrow_schema::{DataType, TimeUnit};

use super::{Filter, FilterMask};
use crate::error::{DatasetError, Result};

/// Apply `filter` to a batch.
///
/// Returns the batch unchanged when the filter does not constrain it or every
/// row passes, and `None` when no row passes.
pub fn filter_batch(filter: &Filter, batch: RecordBatch) -> Result<Option<RecordBatch>> {
    let mask = filter.compute_mask(&batch)?;
    mask_batch(batch, mask)
}

/// Keep the rows of `batch` set in `mask`; `None` keeps every row
pub(crate) fn mask_batch(
    batch: RecordBatch,
    mask: Option<FilterMask>,
) -> Result<Option<RecordBatch>> {
    let Some(mask) = mask else {
        return Ok(Some(batch));
    };
    if mask.included_count() == batch.num_rows() {
        return Ok(Some(batch));
    }
    if mask.included_count() == 0 {
        return Ok(None);
    }
    let columns = batch
        .columns()
        .iter()
        .map(|column| apply_mask(column.as_ref(), &mask))
        .collect::<Result<Vec<_>>>()?;
    let options = RecordBatchOptions::new().with_row_count(Some(mask.included_count()));
    Ok(Some(RecordBatch::try_new_with_options(batch.schema(), columns, &options)?))
}

/// Build a new array of the same type holding only the rows set in `mask`.
///
/// Relative row order is preserved and the output never shares offsets with
/// the input, so variable length layouts start again at zero.
pub fn apply_mask(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let masked = match array.data_type() {
        DataType::Null => Arc::new(NullArray::new(mask.included_count())) as ArrayRef,
        DataType::Boolean => mask_boolean(array, mask),
        DataType::Int8 => mask_primitive::<Int8Type>(array, mask),
        DataType::Int16 => mask_primitive::<Int16Type>(array, mask),
        DataType::Int32 => mask_primitive::<Int32Type>(array, mask),
        DataType::Int64 => mask_primitive::<Int64Type>(array, mask),
        DataType::UInt8 => mask_primitive::<UInt8Type>(array, mask),
        DataType::UInt16 => mask_primitive::<UInt16Type>(array, mask),
        DataType::UInt32 => mask_primitive::<UInt32Type>(array, mask),
        DataType::UInt64 => mask_primitive::<UInt64Type>(array, mask),
        DataType::Float16 => mask_primitive::<Float16Type>(array, mask),
        DataType::Float32 => mask_primitive::<Float32Type>(array, mask),
        DataType::Float64 => mask_primitive::<Float64Type>(array, mask),
        DataType::Date32 => mask_primitive::<Date32Type>(array, mask),
        DataType::Date64 => mask_primitive::<Date64Type>(array, mask),
        DataType::Time32(TimeUnit::Second) => mask_primitive::<Time32SecondType>(array, mask),
        DataType::Time32(TimeUnit::Millisecond) => {
            mask_primitive::<Time32MillisecondType>(array, mask)
        }
        DataType::Time64(TimeUnit::Microsecond) => {
            mask_primitive::<Time64MicrosecondType>(array, mask)
        }
        DataType::Time64(TimeUnit::Nanosecond) => {
            mask_primitive::<Time64NanosecondType>(array, mask)
        }
        DataType::Timestamp(unit, _) => match unit {
            TimeUnit::Second => mask_primitive::<TimestampSecondType>(array, mask),
            TimeUnit::Millisecond => mask_primitive::<TimestampMillisecondType>(array, mask),
            TimeUnit::Microsecond => mask_primitive::<TimestampMicrosecondType>(array, mask),
            TimeUnit::Nanosecond => mask_primitive::<TimestampNanosecondType>(array, mask),
        },
        DataType::Duration(unit) => match unit {
            TimeUnit::Second => mask_primitive::<DurationSecondType>(array, mask),
            TimeUnit::Millisecond => mask_primitive::<DurationMillisecondType>(array, mask),
            TimeUnit::Microsecond => mask_primitive::<DurationMicrosecondType>(array, mask),
            TimeUnit::Nanosecond => mask_primitive::<DurationNanosecondType>(array, mask),
        },
        DataType::Decimal128(_, _) => mask_primitive::<Decimal128Type>(array, mask),
        DataType::Decimal256(_, _) => mask_primitive::<Decimal256Type>(array, mask),
        DataType::Utf8 => mask_bytes::<GenericStringType<i32>>(array, mask)?,
        DataType::LargeUtf8 => mask_bytes::<GenericStringType<i64>>(array, mask)?,
        DataType::Binary => mask_bytes::<GenericBinaryType<i32>>(array, mask)?,
        DataType::LargeBinary => mask_bytes::<GenericBinaryType<i64>>(array, mask)?,
        DataType::Utf8View => mask_byte_view::<StringViewType>(array, mask),
        DataType::BinaryView => mask_byte_view::<BinaryViewType>(array, mask),
        DataType::FixedSizeBinary(_) => mask_fixed_size_binary(array, mask)?,
        DataType::Dictionary(key, _) => match key.as_ref() {
            DataType::Int8 => mask_dictionary::<Int8Type>(array, mask)?,
            DataType::Int16 => mask_dictionary::<Int16Type>(array, mask)?,
            DataType::Int32 => mask_dictionary::<Int32Type>(array, mask)?,
            DataType::Int64 => mask_dictionary::<Int64Type>(array, mask)?,
            DataType::UInt8 => mask_dictionary::<UInt8Type>(array, mask)?,
            DataType::UInt16 => mask_dictionary::<UInt16Type>(array, mask)?,
            DataType::UInt32 => mask_dictionary::<UInt32Type>(array, mask)?,
            DataType::UInt64 => mask_dictionary::<UInt64Type>(array, mask)?,
            _ => return Err(unsupported(array)),
        },
        DataType::List(_) => mask_list::<i32>(array, mask)?,
        DataType::LargeList(_) => mask_list::<i64>(array, mask)?,
        DataType::FixedSizeList(_, _) => mask_fixed_size_list(array, mask)?,
        DataType::Map(_, _) => mask_map(array, mask)?,
        DataType::Struct(_) => mask_struct(array, mask)?,
        _ => return Err(unsupported(array)),
    };
    Ok(masked)
}

fn unsupported(array: &dyn Array) -> DatasetError {
    DatasetError::UnsupportedArray {
        data_type: array.data_type().clone(),
    }
}

/// Validity of the included rows, or `None` when the input has no nulls
fn mask_nulls(nulls: Option<&NullBuffer>, mask: &FilterMask) -> Option<NullBuffer> {
    let nulls = nulls.filter(|nulls| nulls.null_count() > 0)?;
    let mut builder = BooleanBufferBuilder::new(mask.included_count());
    for idx in mask.included_indices() {
        builder.append(nulls.is_valid(idx));
    }
    Some(NullBuffer::new(builder.finish()))
}

fn masked_primitive<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    mask: &FilterMask,
) -> PrimitiveArray<T> {
    let values = array.values();
    let selected: Vec<T::Native> = mask.included_indices().map(|idx| values[idx]).collect();
    PrimitiveArray::<T>::new(ScalarBuffer::from(selected), mask_nulls(array.nulls(), mask))
        .with_data_type(array.data_type().clone())
}

fn mask_primitive<T: ArrowPrimitiveType>(array: &dyn Array, mask: &FilterMask) -> ArrayRef {
    Arc::new(masked_primitive(array.as_primitive::<T>(), mask))
}

fn mask_boolean(array: &dyn Array, mask: &FilterMask) -> ArrayRef {
    let array = array.as_boolean();
    let mut values = BooleanBufferBuilder::new(mask.included_count());
    for idx in mask.included_indices() {
        values.append(array.value(idx));
    }
    Arc::new(BooleanArray::new(values.finish(), mask_nulls(array.nulls(), mask)))
}

fn mask_bytes<T: ByteArrayType>(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_bytes::<T>();
    let offsets = array.value_offsets();
    let data = array.value_data();

    let mut values = MutableBuffer::new(0);
    let mut lengths = Vec::with_capacity(mask.included_count());
    for idx in mask.included_indices() {
        let start = offsets[idx].as_usize();
        let end = offsets[idx + 1].as_usize();
        values.extend_from_slice(&data[start..end]);
        lengths.push(end - start);
    }

    let masked = GenericByteArray::<T>::try_new(
        OffsetBuffer::from_lengths(lengths),
        Buffer::from(values),
        mask_nulls(array.nulls(), mask),
    )?;
    Ok(Arc::new(masked))
}

/// Values are copied into fresh data buffers, so the output holds no
/// reference to buffers of the input view array
fn mask_byte_view<T: ByteViewType>(array: &dyn Array, mask: &FilterMask) -> ArrayRef {
    let array = array.as_byte_view::<T>();
    let mut builder = GenericByteViewBuilder::<T>::with_capacity(mask.included_count());
    for idx in mask.included_indices() {
        if array.is_null(idx) {
            builder.append_null();
        } else {
            builder.append_value(array.value(idx));
        }
    }
    Arc::new(builder.finish())
}

fn mask_fixed_size_binary(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_fixed_size_binary();
    let width = array.value_length();
    let mut values = Vec::with_capacity(mask.included_count() * width.max(0) as usize);
    for idx in mask.included_indices() {
        values.extend_from_slice(array.value(idx));
    }
    let masked = FixedSizeBinaryArray::try_new(
        width,
        Buffer::from_vec(values),
        mask_nulls(array.nulls(), mask),
    )?;
    Ok(Arc::new(masked))
}

/// Only the keys are filtered; the dictionary values are shared
fn mask_dictionary<K: ArrowDictionaryKeyType>(
    array: &dyn Array,
    mask: &FilterMask,
) -> Result<ArrayRef> {
    let array = array.as_dictionary::<K>();
    let keys = masked_primitive(array.keys(), mask);
    Ok(Arc::new(DictionaryArray::<K>::try_new(keys, array.values().clone())?))
}

/// Expand a slot mask to the child values addressed by `offsets`.
///
/// Child values before the first offset or after the last one belong to no
/// slot and are excluded. Returns the child mask together with the offsets
/// of the surviving slots, rebased to start at zero.
fn child_mask<O: OffsetSizeTrait>(
    offsets: &[O],
    child_len: usize,
    mask: &FilterMask,
) -> (FilterMask, OffsetBuffer<O>) {
    let mut child = BooleanBufferBuilder::new(child_len);
    let mut lengths = Vec::with_capacity(mask.included_count());

    let first = offsets.first().map_or(0, |offset| offset.as_usize());
    child.append_n(first, false);
    for (slot, window) in offsets.windows(2).enumerate() {
        let length = window[1].as_usize() - window[0].as_usize();
        let included = mask.is_included(slot);
        child.append_n(length, included);
        if included {
            lengths.push(length);
        }
    }
    let last = offsets.last().map_or(0, |offset| offset.as_usize());
    child.append_n(child_len.saturating_sub(last), false);

    (
        FilterMask::from_boolean_buffer(&child.finish()),
        OffsetBuffer::from_lengths(lengths),
    )
}

fn mask_list<O: OffsetSizeTrait>(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_list::<O>();
    let field = match array.data_type() {
        DataType::List(field) | DataType::LargeList(field) => field.clone(),
        _ => return Err(unsupported(array)),
    };
    let (values_mask, offsets) = child_mask(array.value_offsets(), array.values().len(), mask);
    let values = apply_mask(array.values().as_ref(), &values_mask)?;
    Ok(Arc::new(GenericListArray::<O>::try_new(
        field,
        offsets,
        values,
        mask_nulls(array.nulls(), mask),
    )?))
}

fn mask_map(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_map();
    let (field, ordered) = match array.data_type() {
        DataType::Map(field, ordered) => (field.clone(), *ordered),
        _ => return Err(unsupported(array)),
    };
    let (entries_mask, offsets) = child_mask(array.value_offsets(), array.entries().len(), mask);
    let entries = apply_mask(array.entries(), &entries_mask)?;
    Ok(Arc::new(MapArray::try_new(
        field,
        offsets,
        entries.as_struct().clone(),
        mask_nulls(array.nulls(), mask),
        ordered,
    )?))
}

fn mask_fixed_size_list(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_fixed_size_list();
    let field = match array.data_type() {
        DataType::FixedSizeList(field, _) => field.clone(),
        _ => return Err(unsupported(array)),
    };
    let size = array.value_length();
    let width = size.max(0) as usize;
    let values = array.values();
    let values_mask = if width == 0 {
        FilterMask::new_unset(values.len())
    } else {
        FilterMask::from_fn(values.len(), |idx| mask.is_included(idx / width))
    };
    let masked_values = apply_mask(values.as_ref(), &values_mask)?;
    Ok(Arc::new(FixedSizeListArray::try_new(
        field,
        size,
        masked_values,
        mask_nulls(array.nulls(), mask),
    )?))
}

/// Each child is filtered with the row mask of the struct itself
fn mask_struct(array: &dyn Array, mask: &FilterMask) -> Result<ArrayRef> {
    let array = array.as_struct();
    let nulls = mask_nulls(array.nulls(), mask);
    if array.num_columns() == 0 {
        return Ok(Arc::new(StructArray::new_empty_fields(mask.included_count(), nulls)));
    }
    let columns = array
        .columns()
        .iter()
        .map(|column| apply_mask(column.as_ref(), mask))
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(StructArray::try_new(array.fields().clone(), columns, nulls)?))
}
