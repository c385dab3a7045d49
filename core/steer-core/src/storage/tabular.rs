//! Read-only SQL access returning Arrow tables.
//!
//! Analysis code outside the crate runs ad-hoc queries against the store
//! (distribution of measurements, plan counts per query, ...). Results come
//! back as a single [`RecordBatch`] with column types inferred from the values.

use crate::error::{StoreError, StoreResult};
use crate::storage::Store;
use arrow::array::{ArrayRef, BinaryArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use rusqlite::Params;
use rusqlite::types::Value;
use std::sync::Arc;

impl Store {
    /// Execute a read-only statement and collect the rows into a RecordBatch.
    ///
    /// Statements that could modify the database are refused.
    pub fn read_table<P: Params>(&self, sql: &str, params: P) -> StoreResult<RecordBatch> {
        let session = self.session();
        let mut stmt = session.prepare(sql)?;
        if !stmt.readonly() {
            return Err(StoreError::InvalidOperation {
                message: "statement is not read-only".to_string(),
                context: sql.to_string(),
            });
        }

        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut num_rows = 0usize;

        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(idx)?);
            }
            num_rows += 1;
        }

        let mut fields = Vec::with_capacity(names.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(names.len());
        for (name, values) in names.iter().zip(columns) {
            let data_type = infer_type(&values);
            fields.push(Field::new(name, data_type.clone(), true));
            arrays.push(build_array(&data_type, values));
        }

        let schema = Arc::new(Schema::new(fields));
        let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }
}

/// First non-NULL type wins; INTEGER mixed with REAL widens to Float64,
/// any other mix falls back to Utf8.
fn infer_type(values: &[Value]) -> DataType {
    let mut inferred: Option<DataType> = None;
    for value in values {
        let current = match value {
            Value::Null => continue,
            Value::Integer(_) => DataType::Int64,
            Value::Real(_) => DataType::Float64,
            Value::Text(_) => DataType::Utf8,
            Value::Blob(_) => DataType::Binary,
        };
        inferred = match inferred {
            None => Some(current),
            Some(prev) if prev == current => Some(prev),
            Some(DataType::Int64) if current == DataType::Float64 => Some(DataType::Float64),
            Some(DataType::Float64) if current == DataType::Int64 => Some(DataType::Float64),
            Some(_) => return DataType::Utf8,
        };
    }
    inferred.unwrap_or(DataType::Utf8)
}

fn build_array(data_type: &DataType, values: Vec<Value>) -> ArrayRef {
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(i as f64),
                    Value::Real(f) => Some(f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Binary => {
            let blobs: Vec<Option<Vec<u8>>> = values
                .into_iter()
                .map(|v| match v {
                    Value::Blob(b) => Some(b),
                    _ => None,
                })
                .collect();
            Arc::new(BinaryArray::from(
                blobs.iter().map(|b| b.as_deref()).collect::<Vec<_>>(),
            ))
        }
        _ => Arc::new(StringArray::from(
            values
                .into_iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::Integer(i) => Some(i.to_string()),
                    Value::Real(f) => Some(f.to_string()),
                    Value::Text(s) => Some(s),
                    Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
                })
                .collect::<Vec<_>>(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float64Type, Int64Type};

    #[test]
    fn test_read_table_types() {
        let store = Store::open_in_memory().unwrap();
        store.register_query("tpch/q01.sql").unwrap();
        store.register_query("tpch/q02.sql").unwrap();

        let batch = store
            .read_table(
                "SELECT id, query_path, fingerprint, id * 1.5 AS scaled FROM queries ORDER BY id",
                [],
            )
            .unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &DataType::Int64);
        assert_eq!(batch.schema().field(1).data_type(), &DataType::Utf8);
        assert_eq!(batch.schema().field(3).data_type(), &DataType::Float64);

        let ids = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(ids.value(0), 1);
        let paths = batch.column(1).as_string::<i32>();
        assert_eq!(paths.value(1), "tpch/q02.sql");
        assert!(batch.column(2).is_null(0));
        let scaled = batch.column(3).as_primitive::<Float64Type>();
        assert_eq!(scaled.value(1), 3.0);
    }

    #[test]
    fn test_read_table_with_params() {
        let store = Store::open_in_memory().unwrap();
        store.register_query("job/1a.sql").unwrap();
        store.register_query("tpch/q01.sql").unwrap();

        let batch = store
            .read_table(
                "SELECT query_path FROM queries WHERE instr(query_path, ?1) > 0",
                ["job"],
            )
            .unwrap();
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn test_read_table_rejects_writes() {
        let store = Store::open_in_memory().unwrap();
        let result = store.read_table("DELETE FROM queries", []);
        assert!(matches!(result, Err(StoreError::InvalidOperation { .. })));
    }

    #[test]
    fn test_infer_type_mixed_numeric() {
        let values = vec![Value::Integer(1), Value::Null, Value::Real(2.5)];
        assert_eq!(infer_type(&values), DataType::Float64);
        let mixed = vec![Value::Integer(1), Value::Text("x".into())];
        assert_eq!(infer_type(&mixed), DataType::Utf8);
        assert_eq!(infer_type(&[Value::Null]), DataType::Utf8);
    }
}
