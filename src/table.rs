// src/table.rs
//! Arrow helpers for PUMS tables: CSV parsing with type inference, row selection,
//! the household join and parquet export.

use anyhow::{anyhow, bail, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, Float64Array, StringArray, UInt32Array},
    compute,
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use csv::{ReaderBuilder, StringRecord};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use rayon::prelude::*;
use std::{collections::HashMap, fs::File, path::Path, sync::Arc};
use tracing::{debug, instrument};

/// Columns kept as text even though they look numeric (identifiers and codes).
pub const STRING_COLUMNS: &[&str] = &["RT", "SOCP", "SERIALNO", "NAICSP"];
/// Columns always read as floats.
pub const FLOAT_COLUMNS: &[&str] = &["PINCP"];

/// Float64 when the value parses as a number, Utf8 otherwise.
pub fn infer_dtype_from_str(s: &str) -> DataType {
    if s.parse::<f64>().is_ok() {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn column_dtype<'a>(name: &str, mut values: impl Iterator<Item = &'a str>) -> DataType {
    if STRING_COLUMNS.contains(&name) {
        return DataType::Utf8;
    }
    if FLOAT_COLUMNS.contains(&name) {
        return DataType::Float64;
    }
    if values.all(|v| v.is_empty() || infer_dtype_from_str(v) == DataType::Float64) {
        DataType::Float64
    } else {
        DataType::Utf8
    }
}

fn build_column(name: &str, rows: &[StringRecord], idx: usize) -> (Field, ArrayRef) {
    let cell = |r: &StringRecord| r.get(idx).unwrap_or("").trim().to_string();
    match column_dtype(name, rows.iter().map(|r| r.get(idx).unwrap_or("").trim())) {
        DataType::Float64 => {
            let values: Vec<Option<f64>> = rows
                .iter()
                .map(|r| r.get(idx).unwrap_or("").trim().parse::<f64>().ok())
                .collect();
            (
                Field::new(name, DataType::Float64, true),
                Arc::new(Float64Array::from(values)),
            )
        }
        _ => {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|r| Some(cell(r)).filter(|s| !s.is_empty()))
                .collect();
            (
                Field::new(name, DataType::Utf8, true),
                Arc::new(StringArray::from(values)),
            )
        }
    }
}

/// Parse header + rows into a batch. Empty cells become nulls.
#[instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn from_csv_text(text: &str) -> Result<RecordBatch> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        bail!("CSV has no header row");
    }

    let rows: Vec<StringRecord> = rdr
        .records()
        .enumerate()
        .map(|(i, r)| r.with_context(|| format!("CSV parse error at record {}", i + 1)))
        .collect::<Result<_>>()?;

    let (fields, columns): (Vec<Field>, Vec<ArrayRef>) = headers
        .par_iter()
        .enumerate()
        .map(|(i, name)| build_column(name, &rows, i))
        .unzip();

    debug!(rows = rows.len(), columns = fields.len(), "parsed CSV");
    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building table")
}

/// Values of a numeric column, nulls as NaN.
pub fn numeric_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column {} not found in table", name))?;
    let floats = col
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| anyhow!("column {} is not numeric ({})", name, col.data_type()))?;
    Ok(floats
        .iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Values of a text column.
pub fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| anyhow!("column {} not found in table", name))?;
    col.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| anyhow!("column {} is not text ({})", name, col.data_type()))
}

/// Keep the rows where `mask` is true.
pub fn filter_rows(batch: &RecordBatch, mask: &[bool]) -> Result<RecordBatch> {
    let mask = BooleanArray::from(mask.to_vec());
    compute::filter_record_batch(batch, &mask).context("filtering rows")
}

/// Inner join of `left` with the columns of `right` that `left` lacks, on `key`.
/// Left row order is kept; a left row matching several right rows is repeated.
pub fn join_on(left: &RecordBatch, right: &RecordBatch, key: &str) -> Result<RecordBatch> {
    let left_keys = string_column(left, key)?;
    let right_keys = string_column(right, key)?;

    let mut by_key: HashMap<&str, Vec<u32>> = HashMap::new();
    for (i, k) in right_keys.iter().enumerate() {
        if let Some(k) = k {
            by_key.entry(k).or_default().push(i as u32);
        }
    }

    let mut left_idx = Vec::with_capacity(left.num_rows());
    let mut right_idx = Vec::with_capacity(left.num_rows());
    for (i, k) in left_keys.iter().enumerate() {
        if let Some(matches) = k.and_then(|k| by_key.get(k)) {
            for &j in matches {
                left_idx.push(i as u32);
                right_idx.push(j);
            }
        }
    }
    let left_idx = UInt32Array::from(left_idx);
    let right_idx = UInt32Array::from(right_idx);

    let left_schema = left.schema();
    let mut fields: Vec<Field> = Vec::new();
    let mut columns: Vec<ArrayRef> = Vec::new();
    for (field, col) in left_schema.fields().iter().zip(left.columns()) {
        fields.push(field.as_ref().clone());
        columns.push(compute::take(col.as_ref(), &left_idx, None)?);
    }
    let right_schema = right.schema();
    for (field, col) in right_schema.fields().iter().zip(right.columns()) {
        if left_schema.field_with_name(field.name()).is_ok() {
            continue;
        }
        fields.push(field.as_ref().clone());
        columns.push(compute::take(col.as_ref(), &right_idx, None)?);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns).context("building joined table")
}

/// Write `batch` to a single SNAPPY-compressed parquet file.
pub fn write_parquet(batch: &RecordBatch, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer")?;
    writer.write(batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    const PERSON: &str = "RT,SERIALNO,AGEP,PINCP,SOCP,NOTE\n\
                          P,2018GQ01,34,52000,151252,a\n\
                          P,2018HU02,,,,\n\
                          P,2018HU03,71,1200,,c\n";

    #[test]
    fn test_type_inference() -> Result<()> {
        let batch = from_csv_text(PERSON)?;
        let schema = batch.schema();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(schema.field_with_name("RT")?.data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("SERIALNO")?.data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("SOCP")?.data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("AGEP")?.data_type(), &DataType::Float64);
        assert_eq!(schema.field_with_name("PINCP")?.data_type(), &DataType::Float64);
        assert_eq!(schema.field_with_name("NOTE")?.data_type(), &DataType::Utf8);

        let age = numeric_column(&batch, "AGEP")?;
        assert_eq!(age[0], 34.0);
        assert!(age[1].is_nan());
        assert!(string_column(&batch, "SOCP")?.is_null(1));
        assert!(numeric_column(&batch, "NOTE").is_err());
        assert!(numeric_column(&batch, "MISSING").is_err());
        Ok(())
    }

    #[test]
    fn test_header_only() -> Result<()> {
        let batch = from_csv_text("RT,SERIALNO,AGEP\n")?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 3);
        Ok(())
    }

    #[test]
    fn test_filter_rows() -> Result<()> {
        let batch = from_csv_text(PERSON)?;
        let kept = filter_rows(&batch, &[true, false, true])?;
        assert_eq!(kept.num_rows(), 2);
        assert_eq!(numeric_column(&kept, "AGEP")?, vec![34.0, 71.0]);
        Ok(())
    }

    #[test]
    fn test_join_adds_missing_columns_only() -> Result<()> {
        let person = from_csv_text(PERSON)?;
        let household = from_csv_text(
            "RT,SERIALNO,NP,HINCP\nH,2018HU03,1,9000\nH,2018GQ01,3,80000\nH,2018HU02,2,\n",
        )?;

        let joined = join_on(&person, &household, "SERIALNO")?;

        assert_eq!(joined.num_rows(), 3);
        let names: Vec<String> = joined
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(
            names,
            vec!["RT", "SERIALNO", "AGEP", "PINCP", "SOCP", "NOTE", "NP", "HINCP"]
        );
        assert_eq!(numeric_column(&joined, "NP")?, vec![3.0, 2.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_join_drops_unmatched() -> Result<()> {
        let person = from_csv_text(PERSON)?;
        let household = from_csv_text("SERIALNO,NP\n2018HU02,4\n")?;
        let joined = join_on(&person, &household, "SERIALNO")?;
        assert_eq!(joined.num_rows(), 1);
        Ok(())
    }

    #[test]
    fn test_write_parquet() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("person.parquet");
        let batch = from_csv_text(PERSON)?;

        write_parquet(&batch, &path)?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path)?)?.build()?;
        let rows: usize = reader.map(|b| b.map(|b| b.num_rows()).unwrap_or(0)).sum();
        assert_eq!(rows, 3);
        Ok(())
    }
}
