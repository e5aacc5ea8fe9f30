use arrow::datatypes::DataType;
use cadastral_etl::cleaning::StructuralSanitizer;
use cadastral_etl::{CsvOptions, EtlError, inspect, load_chunked, load_lazy, load_sample};
use tempfile::TempDir;

use crate::utils::{TRANSACTIONS_CSV, strings, write_fixture};

#[test]
fn test_inspect_reports_columns_and_rows() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", "\"PK\",\"VALOR\"\n1,10\n2,20\n3,30");

    let info = inspect(&path, b',').unwrap();

    assert_eq!(info.columns, vec!["PK".to_string(), "VALOR".to_string()]);
    assert_eq!(info.num_columns, 2);
    assert_eq!(info.estimated_rows, 3);
    assert_eq!(info.file_size_bytes, std::fs::metadata(&path).unwrap().len());
    assert!(info.file_size_gb.abs() < f64::EPSILON);
}

#[test]
fn test_inspect_counts_quoted_newlines_as_rows() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", "PK,NOTA\n1,\"two\nlines\"\n");

    let info = inspect(&path, b',').unwrap();
    assert_eq!(info.estimated_rows, 2);
}

#[test]
fn test_missing_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.csv");

    assert!(matches!(inspect(&missing, b','), Err(EtlError::Io { .. })));
    assert!(matches!(
        load_sample(&missing, 10, &CsvOptions::default()),
        Err(EtlError::Io { .. })
    ));
    assert!(load_lazy(&missing, &CsvOptions::default()).collect().is_err());
}

#[test]
fn test_sample_infers_types() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "tx.csv",
        "PK,VALOR,FECHA,MUNICIPIO\n1,10.5,2020-01-31,CALI\n2,,2021-12-01,\n",
    );

    let batch = load_sample(&path, 100, &CsvOptions::default()).unwrap();
    let schema = batch.schema();

    assert_eq!(batch.num_rows(), 2);
    assert_eq!(schema.field_with_name("PK").unwrap().data_type(), &DataType::Int64);
    assert_eq!(schema.field_with_name("VALOR").unwrap().data_type(), &DataType::Float64);
    assert_eq!(schema.field_with_name("FECHA").unwrap().data_type(), &DataType::Date32);
    assert_eq!(schema.field_with_name("MUNICIPIO").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(strings(&batch, "MUNICIPIO"), vec![Some("CALI".into()), None]);
}

#[test]
fn test_sample_keeps_numeric_codes_as_text() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "tx.csv",
        "PK,NUMERO_CATASTRAL,DIVIPOLA\n\
         1,257540100000000010001000000000,05001\n\
         2,257540100000000010001000000001,11001\n",
    );

    let batch = load_sample(&path, 100, &CsvOptions::default()).unwrap();
    let schema = batch.schema();

    assert_eq!(schema.field_with_name("PK").unwrap().data_type(), &DataType::Int64);
    assert_eq!(
        schema.field_with_name("NUMERO_CATASTRAL").unwrap().data_type(),
        &DataType::Utf8
    );
    assert_eq!(schema.field_with_name("DIVIPOLA").unwrap().data_type(), &DataType::Utf8);
    assert_eq!(
        strings(&batch, "NUMERO_CATASTRAL"),
        vec![
            Some("257540100000000010001000000000".into()),
            Some("257540100000000010001000000001".into())
        ]
    );
    assert_eq!(
        strings(&batch, "DIVIPOLA"),
        vec![Some("05001".into()), Some("11001".into())]
    );
}

#[test]
fn test_sample_with_unbounded_size_reads_whole_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", "PK,VALOR\n1,10\n2,20\n");

    let batch = load_sample(&path, usize::MAX, &CsvOptions::default()).unwrap();
    assert_eq!(batch.num_rows(), 2);

    let lazy = load_lazy(&path, &CsvOptions::default())
        .with_chunk_size(usize::MAX)
        .collect()
        .unwrap();
    assert_eq!(lazy.num_rows(), 2);
}

#[test]
fn test_sample_is_bounded_and_skips_malformed_rows() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(
        dir.path(),
        "tx.csv",
        "PK,VALOR\n1,10\n2,20,extra\n3\n4,40\n5,50\n",
    );

    let batch = load_sample(&path, 2, &CsvOptions::raw_text()).unwrap();

    assert_eq!(batch.num_rows(), 2);
    assert_eq!(strings(&batch, "PK"), vec![Some("1".into()), Some("4".into())]);
}

#[test]
fn test_sample_of_header_only_file() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", "PK,VALOR\n");

    let batch = load_sample(&path, 10, &CsvOptions::default()).unwrap();

    assert_eq!(batch.num_rows(), 0);
    assert_eq!(batch.num_columns(), 2);
}

#[test]
fn test_chunks_cover_file_in_order() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);

    let chunks = load_chunked(&path, 3, &CsvOptions::raw_text())
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(chunks.iter().map(|c| c.num_rows()).collect::<Vec<_>>(), vec![3, 1]);
    let ids: Vec<_> = chunks.iter().flat_map(|c| strings(c, "PK")).collect();
    assert_eq!(
        ids,
        vec![Some("1".into()), Some("2".into()), Some("2".into()), Some("3".into())]
    );
}

#[test]
fn test_zero_chunk_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);
    assert!(load_chunked(&path, 0, &CsvOptions::default()).is_err());
}

#[test]
fn test_lazy_scan_defers_and_applies_operations() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);

    let scan = load_lazy(&path, &CsvOptions::raw_text())
        .with_chunk_size(2)
        .map_batches(StructuralSanitizer)
        .select(["PK", "VALOR"])
        .limit(3);
    assert!(scan.describe().contains("LIMIT 3"));

    let batch = scan.collect().unwrap();

    assert_eq!(batch.num_rows(), 3);
    assert_eq!(batch.num_columns(), 2);
    assert_eq!(strings(&batch, "VALOR")[0].as_deref(), Some("1,250,000"));
}

#[test]
fn test_lazy_scan_streams_one_chunk_at_a_time() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);

    let mut sizes = Vec::new();
    let rows = load_lazy(&path, &CsvOptions::raw_text())
        .with_chunk_size(1)
        .for_each_batch(|batch| {
            sizes.push(batch.num_rows());
            Ok(())
        })
        .unwrap();

    assert_eq!(rows, 4);
    assert_eq!(sizes, vec![1, 1, 1, 1]);
}

#[test]
fn test_lazy_select_of_unknown_column_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);

    let result = load_lazy(&path, &CsvOptions::raw_text()).select(["NOPE"]).collect();
    assert!(matches!(result, Err(EtlError::ColumnNotFound { .. })));
}
