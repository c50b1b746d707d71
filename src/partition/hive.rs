use std::{cmp::Ordering, sync::Arc};

use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow_schema::DataType;
use percent_encoding::percent_decode_str;

use super::{PartitionValues, Partitioning, PartitioningFactory, parse_scalar};
use crate::error::{DatasetError, Result};

/// Directory value denoting a null partition value
pub const HIVE_NULL_SENTINEL: &str = "__HIVE_DEFAULT_PARTITION__";

/// Hive style partitioning, where each directory is named `field=value`.
///
/// Field names and values are percent-encoded. Directories may appear in any
/// field order and a path may name only some of the schema's fields.
#[derive(Clone, Debug)]
pub struct HivePartitioning {
    schema: SchemaRef,
}

impl HivePartitioning {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }

    /// A factory that infers field types from directory names
    pub fn factory() -> HivePartitioningFactory {
        HivePartitioningFactory::default()
    }
}

impl Partitioning for HivePartitioning {
    fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    fn parse(&self, segments: &[String]) -> Result<PartitionValues> {
        let mut fields = Vec::with_capacity(segments.len());
        let mut columns = Vec::with_capacity(segments.len());
        for segment in segments {
            let (name, value) = parse_directory_name(segment)?;
            let field = self.schema.field_with_name(&name).map_err(|_| {
                DatasetError::usage(format!("Invalid field name '{name}' for partitioning"))
            })?;
            let value = if value == HIVE_NULL_SENTINEL {
                if !field.is_nullable() {
                    return Err(DatasetError::usage(format!(
                        "Found null value for non-nullable partition field '{name}'"
                    )));
                }
                None
            } else {
                Some(value.as_str())
            };
            columns.push(parse_scalar(&name, field.data_type(), value)?);
            fields.push(Arc::new(field.clone()));
        }
        PartitionValues::try_new(fields, columns)
    }

    fn sort_directories(&self, directories: &mut [String]) {
        directories.sort_by(|a, b| self.compare_directories(a, b));
    }
}

impl HivePartitioning {
    fn compare_directories(&self, a: &str, b: &str) -> Ordering {
        let (Ok((name_a, value_a)), Ok((name_b, value_b))) =
            (parse_directory_name(a), parse_directory_name(b))
        else {
            return a.cmp(b);
        };
        name_a.cmp(&name_b).then_with(|| {
            let data_type = self
                .schema
                .field_with_name(&name_a)
                .ok()
                .map(|field| field.data_type());
            compare_values(data_type, &value_a, &value_b)
        })
    }
}

fn compare_values(data_type: Option<&DataType>, a: &str, b: &str) -> Ordering {
    match (a == HIVE_NULL_SENTINEL, b == HIVE_NULL_SENTINEL) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    if data_type.is_some_and(DataType::is_integer) {
        if let (Ok(a_num), Ok(b_num)) = (a.parse::<i128>(), b.parse::<i128>()) {
            return a_num.cmp(&b_num).then_with(|| a.cmp(b));
        }
    }
    a.as_bytes().cmp(b.as_bytes())
}

/// Split `field=value` on the first `=` and percent-decode both halves
pub(crate) fn parse_directory_name(name: &str) -> Result<(String, String)> {
    let Some((field, value)) = name.split_once('=') else {
        return Err(DatasetError::usage(format!(
            "Invalid directory name for Hive partitioning '{name}'"
        )));
    };
    Ok((decode(field)?, decode(value)?))
}

fn decode(part: &str) -> Result<String> {
    percent_decode_str(part)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| {
            DatasetError::usage(format!("Invalid UTF-8 in directory name '{part}': {err}"))
        })
}

/// Infers Hive partition fields from observed directory names.
///
/// A value that parses as a 32-bit integer makes the field `Int32`, any
/// other value makes it `Utf8`. The latest observation of a field wins and
/// fields keep the order in which they were first seen. Inferred fields are
/// nullable.
#[derive(Clone, Debug, Default)]
pub struct HivePartitioningFactory {
    observed: Vec<(String, DataType)>,
}

impl PartitioningFactory for HivePartitioningFactory {
    fn inspect(&mut self, segments: &[String]) -> Result<()> {
        for segment in segments {
            let (name, value) = parse_directory_name(segment)?;
            let existing = self.observed.iter_mut().find(|(observed, _)| *observed == name);
            if value == HIVE_NULL_SENTINEL {
                if existing.is_none() {
                    self.observed.push((name, DataType::Utf8));
                }
                continue;
            }
            let data_type = if value.parse::<i32>().is_ok() {
                DataType::Int32
            } else {
                DataType::Utf8
            };
            match existing {
                Some((_, observed_type)) => *observed_type = data_type,
                None => self.observed.push((name, data_type)),
            }
        }
        Ok(())
    }

    fn build(&self, schema: Option<&Schema>) -> Result<Arc<dyn Partitioning>> {
        let mut fields = Vec::with_capacity(self.observed.len());
        for (name, data_type) in &self.observed {
            let field = match schema {
                Some(schema) => schema.field_with_name(name).cloned().map_err(|_| {
                    DatasetError::schema_conflict(format!(
                        "Found partitioning field '{name}' that is not in the specified schema"
                    ))
                })?,
                None => Field::new(name, data_type.clone(), true),
            };
            fields.push(field);
        }
        Ok(Arc::new(HivePartitioning::new(Arc::new(Schema::new(fields)))))
    }
}
