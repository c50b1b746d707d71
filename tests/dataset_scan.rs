use std::{fs, path::Path, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, AsArray, Int32Array, Int64Array, RecordBatch, StringViewArray},
    datatypes::{DataType, Field, Int32Type, Int64Type, Schema, SchemaRef},
};
use futures_util::TryStreamExt;
use parquet::{
    arrow::ArrowWriter,
    file::properties::{EnabledStatistics, WriterProperties},
};
use parquet_dataset::{
    DatasetError, DatasetReader, HivePartitioning, NoPartitioning, ScanOptions, col,
};
use tempfile::TempDir;

/// `rows` rows with `id = row % 4` and `value = first_value + row`
fn data_batch(first_value: i64, rows: i64) -> RecordBatch {
    let ids = Int32Array::from_iter_values((0..rows).map(|row| (row % 4) as i32));
    let values = Int64Array::from_iter_values((0..rows).map(|row| first_value + row));
    RecordBatch::try_from_iter(vec![
        ("id", Arc::new(ids) as ArrayRef),
        ("value", Arc::new(values) as ArrayRef),
    ])
    .unwrap()
}

fn write_file(path: &Path, batch: &RecordBatch, props: Option<WriterProperties>) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), props).unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
}

/// `part=a` and `part=b`, two files of ten rows each
fn two_partition_dataset() -> TempDir {
    let dir = TempDir::new().unwrap();
    for (p, part) in ["a", "b"].iter().enumerate() {
        for file in 0..2 {
            let first = (p as i64 * 2 + file) * 100;
            write_file(
                &dir.path().join(format!("part={part}/data{file}.parquet")),
                &data_batch(first, 10),
                None,
            );
        }
    }
    dir
}

fn part_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![Field::new("part", DataType::Utf8, true)]))
}

fn values(batch: &RecordBatch) -> Vec<i64> {
    batch
        .column_by_name("value")
        .unwrap()
        .as_primitive::<Int64Type>()
        .values()
        .to_vec()
}

fn strings(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    batch
        .column_by_name(name)
        .unwrap()
        .as_string::<i32>()
        .iter()
        .map(|value| value.map(str::to_string))
        .collect()
}

fn field_names(schema: &Schema) -> Vec<&str> {
    schema.fields().iter().map(|field| field.name().as_str()).collect()
}

#[tokio::test]
async fn partition_filter_reads_only_matching_directory() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(field_names(reader.schema()), vec!["part", "id", "value"]);

    let table = reader.to_table(Some(col("part").eq_str("b"))).await.unwrap();
    assert_eq!(table.num_rows(), 20);
    assert!(strings(&table, "part").iter().all(|part| part.as_deref() == Some("b")));
    let expected: Vec<i64> = (200..210).chain(300..310).collect();
    assert_eq!(values(&table), expected);
}

#[tokio::test]
async fn unfiltered_scan_follows_partition_then_file_order() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();
    let table = reader.to_table(None).await.unwrap();
    assert_eq!(table.num_rows(), 40);
    let expected: Vec<i64> = (0..10).chain(100..110).chain(200..210).chain(300..310).collect();
    assert_eq!(values(&table), expected);
}

#[tokio::test]
async fn filter_mixing_partition_and_file_columns() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();

    let table = reader
        .to_table(Some(col("part").eq_str("a").or(col("id").eq(3))))
        .await
        .unwrap();
    // all of part=a plus the two id=3 rows of each part=b file
    assert_eq!(table.num_rows(), 24);
    let b_values: Vec<i64> = values(&table).into_iter().filter(|value| *value >= 200).collect();
    assert_eq!(b_values, vec![203, 207, 303, 307]);

    let table = reader
        .to_table(Some(col("part").eq_str("b").and(col("id").eq(0))))
        .await
        .unwrap();
    assert_eq!(values(&table), vec![200, 204, 208, 300, 304, 308]);
}

async fn range_scan(statistics: EnabledStatistics, options: ScanOptions) -> Vec<i64> {
    let dir = TempDir::new().unwrap();
    let props = WriterProperties::builder()
        .set_max_row_group_size(10)
        .set_statistics_enabled(statistics)
        .build();
    let batch = RecordBatch::try_from_iter(vec![
        ("id", Arc::new(Int32Array::from_iter_values(0..30)) as ArrayRef),
        ("value", Arc::new(Int64Array::from_iter_values(0..30)) as ArrayRef),
    ])
    .unwrap();
    write_file(&dir.path().join("data.parquet"), &batch, Some(props));

    let reader = DatasetReader::try_new(dir.path(), NoPartitioning, None, options)
        .await
        .unwrap();
    let table = reader.to_table(Some(col("id").between(15, 25))).await.unwrap();
    values(&table)
}

#[tokio::test]
async fn integer_range_across_row_groups() {
    let expected: Vec<i64> = (15..=25).collect();
    assert_eq!(range_scan(EnabledStatistics::Chunk, ScanOptions::default()).await, expected);
    assert_eq!(range_scan(EnabledStatistics::None, ScanOptions::default()).await, expected);
    let no_pruning = ScanOptions::builder().row_group_statistics(false).build();
    assert_eq!(range_scan(EnabledStatistics::Chunk, no_pruning).await, expected);
}

#[tokio::test]
async fn filtered_scan_of_string_view_column() {
    let dir = TempDir::new().unwrap();
    let names = StringViewArray::from(vec![
        Some("first"),
        None,
        Some("a name that does not fit inline"),
        Some("fourth"),
    ]);
    let batch = RecordBatch::try_from_iter(vec![
        ("id", Arc::new(Int32Array::from(vec![1, 2, 3, 4])) as ArrayRef),
        ("name", Arc::new(names) as ArrayRef),
    ])
    .unwrap();
    write_file(&dir.path().join("data.parquet"), &batch, None);

    let reader = DatasetReader::try_new(dir.path(), NoPartitioning, None, ScanOptions::default())
        .await
        .unwrap();
    assert_eq!(reader.schema().field_with_name("name").unwrap().data_type(), &DataType::Utf8View);

    let table = reader.to_table(Some(col("id").gt(2))).await.unwrap();
    let names: Vec<Option<&str>> = table
        .column_by_name("name")
        .unwrap()
        .as_string_view()
        .iter()
        .collect();
    assert_eq!(names, vec![Some("a name that does not fit inline"), Some("fourth")]);

    let table = reader.to_table(Some(col("name").eq_str("first"))).await.unwrap();
    assert_eq!(table.num_rows(), 1);
    assert_eq!(table.column(0).as_primitive::<Int32Type>().value(0), 1);
}

#[tokio::test]
async fn factory_infers_partition_fields() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("year=2024/region=emea/f.parquet"), &data_batch(0, 3), None);
    write_file(&dir.path().join("year=2023/region=apac/f.parquet"), &data_batch(10, 3), None);

    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::factory(),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();
    let schema = reader.schema();
    assert_eq!(field_names(schema), vec!["year", "region", "id", "value"]);
    assert_eq!(schema.field(0).data_type(), &DataType::Int32);
    assert_eq!(schema.field(1).data_type(), &DataType::Utf8);

    let table = reader.to_table(None).await.unwrap();
    // 2023 sorts before 2024
    assert_eq!(values(&table), vec![10, 11, 12, 0, 1, 2]);
    let years = table.column(0).as_primitive::<Int32Type>();
    assert_eq!(years.values().to_vec(), vec![2023, 2023, 2023, 2024, 2024, 2024]);

    let table = reader.to_table(Some(col("year").gt(2023))).await.unwrap();
    assert_eq!(strings(&table, "region"), vec![Some("emea".to_string()); 3]);
}

#[tokio::test]
async fn null_partition_directory() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("part=a/f.parquet"), &data_batch(0, 2), None);
    write_file(
        &dir.path().join("part=__HIVE_DEFAULT_PARTITION__/f.parquet"),
        &data_batch(10, 2),
        None,
    );
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();

    let table = reader.to_table(None).await.unwrap();
    // the null sentinel sorts last
    assert_eq!(
        strings(&table, "part"),
        vec![Some("a".to_string()), Some("a".to_string()), None, None]
    );

    let table = reader
        .to_table(Some(col("part").is_in_optional([None::<&str>])))
        .await
        .unwrap();
    assert_eq!(values(&table), vec![10, 11]);
}

#[tokio::test]
async fn duplicate_partition_and_file_field() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("id=1/f.parquet"), &data_batch(0, 4), None);

    let err = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::factory(),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DatasetError::SchemaConflict { .. }));
    assert_eq!(
        err.to_string(),
        "Duplicate field name 'id' found in partition schema and data file schema"
    );

    // a supplied schema passes validation but the fragment still conflicts
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int32, true),
        Field::new("value", DataType::Int64, true),
    ]));
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::factory(),
        Some(schema),
        ScanOptions::default(),
    )
    .await
    .unwrap();
    let err = reader.to_table(None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Field 'id' found in both the fragment data and partition information"
    );
}

#[tokio::test]
async fn supplied_schema_is_validated() {
    let dir = two_partition_dataset();

    let mismatched = Arc::new(Schema::new(vec![
        Field::new("part", DataType::Int32, true),
        Field::new("id", DataType::Int32, true),
    ]));
    let err = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        Some(mismatched),
        ScanOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DatasetError::SchemaConflict { .. }));

    let without_part = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]));
    let err = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::factory(),
        Some(without_part),
        ScanOptions::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Found partitioning field 'part' that is not in the specified schema"
    );
}

#[tokio::test]
async fn missing_fields_in_supplied_schema() {
    let dir = two_partition_dataset();
    let schema = Arc::new(Schema::new(vec![
        Field::new("part", DataType::Utf8, true),
        Field::new("value", DataType::Int64, true),
        Field::new("extra", DataType::Float64, true),
    ]));
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        Some(schema),
        ScanOptions::default(),
    )
    .await
    .unwrap();
    let table = reader.to_table(None).await.unwrap();
    assert_eq!(table.num_rows(), 40);
    assert_eq!(table.column(2).null_count(), 40);

    let schema = Arc::new(Schema::new(vec![
        Field::new("part", DataType::Utf8, true),
        Field::new("required", DataType::Int32, false),
    ]));
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        Some(schema),
        ScanOptions::default(),
    )
    .await
    .unwrap();
    let err = reader.to_table(None).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Field 'required' not found in fragment data or partition information"
    );
}

#[tokio::test]
async fn column_selection() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();

    let table = reader
        .scan()
        .with_columns(["value", "part"])
        .with_filter(col("id").eq(1))
        .to_table()
        .await
        .unwrap();
    assert_eq!(field_names(&table.schema()), vec!["value", "part"]);
    assert_eq!(values(&table), vec![1, 5, 9, 101, 105, 109, 201, 205, 209, 301, 305, 309]);

    let table = reader
        .scan()
        .with_excluded_columns(["id"])
        .to_table()
        .await
        .unwrap();
    assert_eq!(field_names(&table.schema()), vec!["part", "value"]);
}

#[tokio::test]
async fn invalid_requests_fail_before_reading() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();

    let err = reader.to_batches(Some(col("nope").eq(1))).unwrap_err();
    assert!(matches!(err, DatasetError::Usage { .. }));
    assert_eq!(err.to_string(), "Invalid field name 'nope' in filter expression");

    let err = reader.scan().with_columns(["nope"]).into_stream().unwrap_err();
    assert_eq!(err.to_string(), "Invalid column name 'nope'");

    let err = reader
        .scan()
        .with_columns(["id"])
        .with_excluded_columns(["value"])
        .into_stream()
        .unwrap_err();
    assert_eq!(err.to_string(), "Cannot specify both columns and excluded columns");
}

#[tokio::test]
async fn cancelled_stream_stops() {
    let dir = two_partition_dataset();
    let reader = DatasetReader::try_new(dir.path(), NoPartitioning, None, ScanOptions::default())
        .await
        .unwrap();
    let mut stream = reader.to_batches(None).unwrap();
    assert!(stream.next_batch().await.unwrap().is_some());

    stream.cancel_handle().cancel();
    let err = stream.next_batch().await.unwrap_err();
    assert!(matches!(err, DatasetError::Cancelled));
}

#[tokio::test]
async fn batches_respect_batch_size() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("data.parquet"), &data_batch(0, 10), None);
    let options = ScanOptions::builder().batch_size(4).build();
    let reader = DatasetReader::try_new(dir.path(), NoPartitioning, None, options)
        .await
        .unwrap();

    let batches: Vec<RecordBatch> = reader
        .to_batches(None)
        .unwrap()
        .into_stream()
        .try_collect()
        .await
        .unwrap();
    let sizes: Vec<usize> = batches.iter().map(RecordBatch::num_rows).collect();
    assert_eq!(sizes, vec![4, 4, 2]);
}

#[tokio::test]
async fn discovery_ignores_other_files() {
    let dir = TempDir::new().unwrap();
    write_file(&dir.path().join("b.PARQUET"), &data_batch(10, 2), None);
    write_file(&dir.path().join("a.parquet"), &data_batch(0, 2), None);
    fs::write(dir.path().join("notes.txt"), b"not parquet").unwrap();

    let reader = DatasetReader::try_new(dir.path(), NoPartitioning, None, ScanOptions::default())
        .await
        .unwrap();
    let table = reader.to_table(None).await.unwrap();
    assert_eq!(values(&table), vec![0, 1, 10, 11]);
}

#[tokio::test]
async fn empty_dataset() {
    let dir = TempDir::new().unwrap();
    let reader = DatasetReader::try_new(
        dir.path(),
        HivePartitioning::new(part_schema()),
        None,
        ScanOptions::default(),
    )
    .await
    .unwrap();
    assert_eq!(field_names(reader.schema()), vec!["part"]);
    let table = reader.to_table(None).await.unwrap();
    assert_eq!(table.num_rows(), 0);
}
