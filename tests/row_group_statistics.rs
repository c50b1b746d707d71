use std::sync::Arc;

use arrow::{
    array::{
        ArrayRef, BooleanArray, Date32Array, Float16Array, Float32Array, Int8Array, Int32Array,
        Int64Array, RecordBatch, StringArray, TimestampMillisecondArray, UInt32Array,
    },
    datatypes::TimeUnit,
};
use bytes::Bytes;
use half::f16;
use parquet::{
    arrow::ArrowWriter,
    file::{
        metadata::{ParquetMetaData, ParquetMetaDataReader},
        properties::{EnabledStatistics, WriterProperties},
    },
};
use parquet_dataset::{LogicalStatistics, MinMax, col, select_row_groups};

fn write_parquet(batch: &RecordBatch, props: WriterProperties) -> ParquetMetaData {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props)).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
    ParquetMetaDataReader::new()
        .parse_and_finish(&Bytes::from(buffer))
        .unwrap()
}

fn column_statistics(
    metadata: &ParquetMetaData,
    row_group: usize,
    column: usize,
) -> Option<LogicalStatistics> {
    let chunk = metadata.row_group(row_group).column(column);
    LogicalStatistics::from_parquet(chunk.statistics()?, chunk.column_descr())
}

fn id_file(statistics: EnabledStatistics) -> ParquetMetaData {
    let batch = RecordBatch::try_from_iter(vec![(
        "id",
        Arc::new(Int32Array::from((0..30).collect::<Vec<i32>>())) as ArrayRef,
    )])
    .unwrap();
    let props = WriterProperties::builder()
        .set_max_row_group_size(10)
        .set_statistics_enabled(statistics)
        .build();
    write_parquet(&batch, props)
}

#[test]
fn converts_logical_types() {
    let batch = RecordBatch::try_from_iter(vec![
        ("i8", Arc::new(Int8Array::from(vec![-5, 3, 7])) as ArrayRef),
        ("u32", Arc::new(UInt32Array::from(vec![42, 7, 9])) as ArrayRef),
        ("i64", Arc::new(Int64Array::from(vec![i64::MIN, 0, i64::MAX])) as ArrayRef),
        ("date", Arc::new(Date32Array::from(vec![19_000, 18_000, 18_500])) as ArrayRef),
        (
            "ts",
            Arc::new(TimestampMillisecondArray::from(vec![3_000, 1_000, 2_000])) as ArrayRef,
        ),
        ("f32", Arc::new(Float32Array::from(vec![1.5, -0.5, 0.25])) as ArrayRef),
        (
            "f16",
            Arc::new(Float16Array::from(vec![
                f16::from_f32(1.5),
                f16::from_f32(-2.0),
                f16::from_f32(0.0),
            ])) as ArrayRef,
        ),
        ("flag", Arc::new(BooleanArray::from(vec![true, false, true])) as ArrayRef),
        ("name", Arc::new(StringArray::from(vec!["a", "b", "c"])) as ArrayRef),
    ])
    .unwrap();
    let metadata = write_parquet(&batch, WriterProperties::builder().build());

    assert_eq!(
        column_statistics(&metadata, 0, 0),
        Some(LogicalStatistics::Int8(MinMax::new(-5, 7)))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 1),
        Some(LogicalStatistics::UInt32(MinMax::new(7, 42)))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 2),
        Some(LogicalStatistics::Int64(MinMax::new(i64::MIN, i64::MAX)))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 3),
        Some(LogicalStatistics::Date(MinMax::new(18_000, 19_000)))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 4),
        Some(LogicalStatistics::Timestamp {
            unit: TimeUnit::Millisecond,
            range: MinMax::new(1_000, 3_000),
        })
    );
    assert_eq!(
        column_statistics(&metadata, 0, 5),
        Some(LogicalStatistics::Float32(MinMax::new(-0.5, 1.5)))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 6),
        Some(LogicalStatistics::Float16(MinMax::new(f16::from_f32(-2.0), f16::from_f32(1.5))))
    );
    assert_eq!(
        column_statistics(&metadata, 0, 7),
        Some(LogicalStatistics::Boolean(MinMax::new(false, true)))
    );
    // byte arrays have no logical conversion
    assert_eq!(column_statistics(&metadata, 0, 8), None);
}

#[test]
fn all_null_row_group_has_no_statistics() {
    let batch = RecordBatch::try_from_iter(vec![(
        "x",
        Arc::new(Int32Array::from(vec![None, None, None])) as ArrayRef,
    )])
    .unwrap();
    let metadata = write_parquet(&batch, WriterProperties::builder().build());
    assert_eq!(column_statistics(&metadata, 0, 0), None);

    // unknown statistics keep the row group
    assert_eq!(select_row_groups(&col("x").eq(1), &metadata), Some(vec![0]));
}

#[test]
fn selects_row_groups_from_ranges() {
    let metadata = id_file(EnabledStatistics::Chunk);
    assert_eq!(metadata.num_row_groups(), 3);

    assert_eq!(select_row_groups(&col("id").between(15, 25), &metadata), Some(vec![1, 2]));
    assert_eq!(select_row_groups(&col("id").lt(10), &metadata), Some(vec![0]));
    assert_eq!(select_row_groups(&col("id").gt(29), &metadata), Some(vec![]));
    assert_eq!(
        select_row_groups(&col("id").eq(3).or(col("id").eq(25)), &metadata),
        Some(vec![0, 2])
    );
    assert_eq!(
        select_row_groups(&col("id").gt_eq(5).and(col("id").lt(12)), &metadata),
        Some(vec![0, 1])
    );
}

#[test]
fn missing_statistics_select_every_row_group() {
    let metadata = id_file(EnabledStatistics::None);
    assert_eq!(
        select_row_groups(&col("id").between(15, 25), &metadata),
        Some(vec![0, 1, 2])
    );
}

#[test]
fn filters_on_other_columns_do_not_select() {
    let metadata = id_file(EnabledStatistics::Chunk);
    assert_eq!(select_row_groups(&col("part").eq_str("a"), &metadata), None);
    // only the id half of the filter maps to the file
    assert_eq!(
        select_row_groups(&col("part").eq_str("a").and(col("id").gt(19)), &metadata),
        Some(vec![2])
    );
}
