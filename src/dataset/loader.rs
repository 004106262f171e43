//! CSV ingestion and persistence

use crate::error::{MlError, Result};
use polars::prelude::*;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;

const INFER_SCHEMA_ROWS: usize = 1000;

/// Load a CSV file from disk with header and dtype inference.
pub fn read_csv_path(path: &Path) -> Result<DataFrame> {
    let file = File::open(path).map_err(|e| {
        MlError::Data(format!("cannot open {}: {e}", path.display()))
    })?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| MlError::Data(format!("cannot parse {}: {e}", path.display())))
}

/// Parse an in-memory CSV body (an uploaded multipart field).
pub fn read_csv_bytes(bytes: &[u8]) -> Result<DataFrame> {
    if bytes.is_empty() {
        return Err(MlError::Data("empty file".to_string()));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
        .map_err(|e| MlError::Data(format!("cannot parse upload: {e}")))
}

/// Write a DataFrame as CSV.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        MlError::Data(format!("cannot create {}: {e}", path.display()))
    })?;

    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| MlError::Data(format!("cannot write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_csv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "age,city,income").unwrap();
        writeln!(file, "25,NYC,50000").unwrap();
        writeln!(file, "30,LA,60000").unwrap();
        writeln!(file, "35,SF,70000").unwrap();
        file
    }

    #[test]
    fn test_read_csv_path_infers_types() {
        let file = sample_csv();
        let df = read_csv_path(file.path()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(df.width(), 3);
        assert!(df.column("age").unwrap().dtype().is_primitive_numeric());
        assert_eq!(df.column("city").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_read_csv_bytes_roundtrip() {
        let body = b"a,b\n1,x\n2,y\n";
        let df = read_csv_bytes(body).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 2);
    }

    #[test]
    fn test_read_csv_bytes_empty_is_error() {
        assert!(read_csv_bytes(b"").is_err());
    }

    #[test]
    fn test_write_then_read() {
        let mut df = df!(
            "a" => &[1i64, 2, 3],
            "b" => &["x", "y", "z"],
        )
        .unwrap();

        let file = NamedTempFile::new().unwrap();
        write_csv(&mut df, file.path()).unwrap();

        let loaded = read_csv_path(file.path()).unwrap();
        assert_eq!(loaded.height(), 3);
        assert_eq!(loaded.width(), 2);
    }
}
