//! Parquet encoding of the efficiency dataset.
//!
//! Writing always produces the canonical header: number columns as
//! `Float64`, everything else as `Utf8`, LZ4-compressed. Reading accepts any
//! Parquet file and returns a [`RawTable`] for the schema migrator, so files
//! produced by older versions or by hand still load.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use effitrack_core::{
    Column, ColumnKind, EfficiencyDataset, RawTable, Result, TrackerError, Value, FLAG_NO,
    FLAG_YES,
};

/// Arrow schema of the canonical dataset.
pub fn canonical_schema() -> Schema {
    Schema::new(
        Column::ALL
            .iter()
            .map(|column| {
                let data_type = match column.kind() {
                    ColumnKind::Number => DataType::Float64,
                    ColumnKind::Date | ColumnKind::Text | ColumnKind::Flag => DataType::Utf8,
                };
                Field::new(column.name(), data_type, false)
            })
            .collect::<Vec<_>>(),
    )
}

/// Encode a normalized dataset as Parquet bytes.
pub fn encode_dataset(dataset: &EfficiencyDataset) -> Result<Bytes> {
    let schema = Arc::new(canonical_schema());
    let columns: Vec<ArrayRef> = Column::ALL
        .iter()
        .map(|column| -> ArrayRef {
            match column.kind() {
                ColumnKind::Number => Arc::new(Float64Array::from_iter_values(
                    dataset.iter().map(|r| r.number(*column)),
                )),
                _ => Arc::new(StringArray::from_iter_values(
                    dataset.iter().map(|r| r.text(*column)),
                )),
            }
        })
        .collect();

    let batch = RecordBatch::try_new(schema, columns).map_err(|e| {
        TrackerError::Internal {
            message: format!("Failed to build dataset batch: {e}"),
        }
    })?;

    write_parquet_bytes(&batch).map(Bytes::from)
}

/// Write a RecordBatch to Parquet bytes in memory with LZ4 compression.
fn write_parquet_bytes(batch: &RecordBatch) -> Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::LZ4_RAW)
        .build();

    let mut buf: Vec<u8> = Vec::new();
    {
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(props))
            .map_err(|e| TrackerError::Internal {
                message: format!("Failed to create Parquet writer: {e}"),
            })?;
        writer.write(batch).map_err(|e| TrackerError::Internal {
            message: format!("Failed to write Parquet data: {e}"),
        })?;
        writer.close().map_err(|e| TrackerError::Internal {
            message: format!("Failed to close Parquet writer: {e}"),
        })?;
    }
    Ok(buf)
}

/// Decode Parquet bytes into a raw table.
///
/// `key` names the source in errors. Anything that is not a readable
/// Parquet file fails with [`TrackerError::CorruptData`].
pub fn decode_table(key: &str, data: Bytes) -> Result<RawTable> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(data)
        .map_err(|e| TrackerError::corrupt(key, format!("not a Parquet file: {e}")))?;
    let schema = builder.schema().clone();
    let total_rows = usize::try_from(builder.metadata().file_metadata().num_rows())
        .map_err(|_| TrackerError::corrupt(key, "negative row count"))?;
    let reader = builder
        .build()
        .map_err(|e| TrackerError::corrupt(key, format!("failed to build reader: {e}")))?;

    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(total_rows); schema.fields().len()];
    for batch in reader {
        let batch = batch.map_err(|e| TrackerError::corrupt(key, format!("bad row group: {e}")))?;
        for (values, array) in columns.iter_mut().zip(batch.columns()) {
            append_values(key, array, values)?;
        }
    }

    let mut table = RawTable::empty();
    table.set_row_count(total_rows)?;
    for (field, values) in schema.fields().iter().zip(columns) {
        if values.len() != total_rows {
            return Err(TrackerError::corrupt(
                key,
                format!(
                    "column '{}' has {} values, file declares {} rows",
                    field.name(),
                    values.len(),
                    total_rows
                ),
            ));
        }
        table.push_column(field.name().clone(), values)?;
    }
    Ok(table)
}

/// Convert one Arrow column into cells.
///
/// Numbers of any width become [`Value::Number`], booleans become
/// `Yes`/`No`, everything else goes through a cast to text.
fn append_values(key: &str, array: &ArrayRef, out: &mut Vec<Value>) -> Result<()> {
    let data_type = array.data_type();

    if data_type.is_numeric() {
        let floats = cast(array, &DataType::Float64)
            .map_err(|e| TrackerError::corrupt(key, format!("bad numeric column: {e}")))?;
        let floats = floats.as_primitive::<Float64Type>();
        out.extend((0..floats.len()).map(|i| {
            if floats.is_null(i) {
                Value::Null
            } else {
                Value::Number(floats.value(i))
            }
        }));
        return Ok(());
    }

    if *data_type == DataType::Boolean {
        let flags = array.as_boolean();
        out.extend((0..flags.len()).map(|i| {
            if flags.is_null(i) {
                Value::Null
            } else {
                Value::Text(if flags.value(i) { FLAG_YES } else { FLAG_NO }.to_string())
            }
        }));
        return Ok(());
    }

    let text = cast(array, &DataType::Utf8).map_err(|e| {
        TrackerError::corrupt(key, format!("unsupported column type {data_type}: {e}"))
    })?;
    let text = text.as_string::<i32>();
    out.extend((0..text.len()).map(|i| {
        if text.is_null(i) {
            Value::Null
        } else {
            Value::Text(text.value(i).to_string())
        }
    }));
    Ok(())
}
