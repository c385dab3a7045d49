//! Experience export — ExperienceRecord ↔ Parquet.
//!
//! Training runs usually happen in another process than the experiment, so
//! each half of a split can be written to its own Parquet file. Plans are
//! stored as JSON text.

use crate::configuration::DisabledRules;
use crate::error::{StoreError, StoreResult};
use crate::experience::ExperienceRecord;
use arrow::array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Arrow schema of an exported experience set
pub fn experience_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("path", DataType::Utf8, false),
        Field::new("query_id", DataType::Int64, false),
        Field::new("config_id", DataType::Int64, false),
        Field::new("disabled_rules", DataType::Utf8, false),
        Field::new("num_disabled_rules", DataType::Int64, false),
        Field::new("plan", DataType::Utf8, false),
        Field::new("runtime", DataType::Float64, false),
        Field::new("cpu_time", DataType::Float64, true),
    ]))
}

/// Convert records into a single RecordBatch.
pub fn to_record_batch(records: &[ExperienceRecord]) -> StoreResult<RecordBatch> {
    let plans = records
        .iter()
        .map(|r| serde_json::to_string(&r.plan))
        .collect::<Result<Vec<_>, _>>()?;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.path.as_str()))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.query_id))),
        Arc::new(Int64Array::from_iter_values(records.iter().map(|r| r.config_id))),
        Arc::new(StringArray::from_iter_values(
            records.iter().map(|r| r.disabled_rules.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(
            records.iter().map(|r| r.num_disabled_rules),
        )),
        Arc::new(StringArray::from_iter_values(plans)),
        Arc::new(Float64Array::from_iter_values(records.iter().map(|r| r.runtime))),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.cpu_time).collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(experience_schema(), columns)?)
}

/// Convert a RecordBatch with [`experience_schema`] columns back into records.
pub fn from_record_batch(batch: &RecordBatch) -> StoreResult<Vec<ExperienceRecord>> {
    let path = string_column(batch, "path")?;
    let query_id = int_column(batch, "query_id")?;
    let config_id = int_column(batch, "config_id")?;
    let disabled_rules = string_column(batch, "disabled_rules")?;
    let num_disabled_rules = int_column(batch, "num_disabled_rules")?;
    let plan = string_column(batch, "plan")?;
    let runtime = float_column(batch, "runtime")?;
    let cpu_time = float_column(batch, "cpu_time")?;

    let mut records = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        records.push(ExperienceRecord {
            path: path.value(row).to_string(),
            query_id: query_id.value(row),
            config_id: config_id.value(row),
            disabled_rules: DisabledRules::parse(disabled_rules.value(row)),
            num_disabled_rules: num_disabled_rules.value(row),
            plan: serde_json::from_str(plan.value(row))?,
            runtime: runtime.value(row),
            cpu_time: (!cpu_time.is_null(row)).then(|| cpu_time.value(row)),
        });
    }
    Ok(records)
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> StoreResult<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StoreError::Serialization(format!("experience batch has no '{name}' column")))
}

fn type_error(name: &str, expected: &str) -> StoreError {
    StoreError::Serialization(format!("experience column '{name}' is not {expected}"))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> StoreResult<&'a StringArray> {
    column(batch, name)?
        .as_string_opt::<i32>()
        .ok_or_else(|| type_error(name, "Utf8"))
}

fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> StoreResult<&'a Int64Array> {
    column(batch, name)?
        .as_primitive_opt::<Int64Type>()
        .ok_or_else(|| type_error(name, "Int64"))
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> StoreResult<&'a Float64Array> {
    column(batch, name)?
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| type_error(name, "Float64"))
}

/// Write records to a Parquet file (Snappy).
pub fn write_parquet(path: &Path, records: &[ExperienceRecord]) -> StoreResult<()> {
    let batch = to_record_batch(records)?;
    let file = File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

/// Read records written by [`write_parquet`].
pub fn read_parquet(path: &Path) -> StoreResult<Vec<ExperienceRecord>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut records = Vec::new();
    for batch in reader {
        records.extend(from_record_batch(&batch?)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_records() -> Vec<ExperienceRecord> {
        vec![
            ExperienceRecord {
                path: "tpch/q01.sql".to_string(),
                query_id: 1,
                config_id: 10,
                disabled_rules: DisabledRules::baseline(),
                num_disabled_rules: 0,
                plan: json!({"op": "Aggregate", "children": [{"op": "Scan"}]}),
                runtime: 100.0,
                cpu_time: Some(80.0),
            },
            ExperienceRecord {
                path: "tpch/q01.sql".to_string(),
                query_id: 1,
                config_id: 11,
                disabled_rules: DisabledRules::parse("JoinReorder,PushDownFilter"),
                num_disabled_rules: 2,
                plan: json!({"op": "Aggregate"}),
                runtime: 60.0,
                cpu_time: None,
            },
        ]
    }

    #[test]
    fn test_record_batch_shape() {
        let batch = to_record_batch(&sample_records()).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 8);
        assert!(batch.column_by_name("cpu_time").unwrap().is_null(1));
    }

    #[test]
    fn test_parquet_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.parquet");
        let records = sample_records();

        write_parquet(&path, &records).unwrap();
        assert!(path.exists());

        let loaded = read_parquet(&path).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let batch = to_record_batch(&sample_records()).unwrap();
        let projected = batch.project(&[0, 1]).unwrap();
        assert!(matches!(
            from_record_batch(&projected),
            Err(StoreError::Serialization(_))
        ));
    }
}
