use arrow::array::AsArray;
use arrow::datatypes::Int32Type;
use arrow::record_batch::RecordBatch;
use cadastral_etl::schema::unify_batches;
use cadastral_etl::{
    BatchTransform, CsvOptions, EtlError, EtlPipeline, PipelineConfig, load_chunked, load_sample,
};
use tempfile::TempDir;

use crate::utils::{TRANSACTIONS_CSV, assert_close, floats, strings, write_fixture};

fn raw_sample(dir: &TempDir) -> RecordBatch {
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);
    load_sample(&path, 100, &CsvOptions::raw_text()).unwrap()
}

fn chunked_run(dir: &TempDir, chunk_size: usize, parallel: bool) -> (RecordBatch, usize) {
    let path = write_fixture(dir.path(), "tx.csv", TRANSACTIONS_CSV);
    let pipeline = EtlPipeline::new(PipelineConfig::default()).unwrap();
    let chunks = load_chunked(&path, chunk_size, &CsvOptions::raw_text()).unwrap();

    let mut outputs = Vec::new();
    let summary = pipeline
        .process_chunks(chunks, parallel, |batch| {
            outputs.push(batch);
            Ok(())
        })
        .unwrap();

    assert_eq!(summary.rows_written, outputs.iter().map(RecordBatch::num_rows).sum::<usize>());
    (unify_batches(&outputs).unwrap(), summary.cross_chunk_duplicates)
}

#[test]
fn test_end_to_end_cleaning_and_standardization() {
    let dir = TempDir::new().unwrap();
    let pipeline = EtlPipeline::new(PipelineConfig::default()).unwrap();

    let (out, report) = pipeline.run(raw_sample(&dir)).unwrap();

    assert_eq!(report.rows_in, 4);
    assert_eq!(out.num_rows(), 3);
    assert_eq!(report.finalize.duplicates_removed, 1);
    assert_eq!(
        strings(&out, "PK"),
        vec![Some("1".into()), Some("2".into()), Some("3".into())]
    );

    assert_eq!(floats(&out, "VALOR"), vec![Some(1_250_000.0), Some(2_000_000.0), Some(0.0)]);
    assert_eq!(
        strings(&out, "ORIP"),
        vec![Some("050".into()), Some("SIN_ORIP".into()), Some("SIN_ORIP".into())]
    );
    assert_eq!(
        strings(&out, "FECHA_RADICA_TEXTO"),
        vec![Some("05/02/2018".into()), Some("15/03/2020".into()), None]
    );
    assert_eq!(
        strings(&out, "MUNICIPIO"),
        vec![Some("MEDELLÍN".into()), Some("BOGOTÁ".into()), Some("CALI".into())]
    );
    assert_eq!(strings(&out, "DEPARTAMENTO")[0].as_deref(), Some("ANTIOQUIA"));
    assert_eq!(
        strings(&out, "ESTADO_FOLIO"),
        vec![Some("ACTIVO".into()), Some("INACTIVO".into()), Some("INACTIVO".into())]
    );
    assert!(out.column_by_name("FECHA_APERTURA_TEXTO").is_none());
}

#[test]
fn test_end_to_end_derived_columns() {
    let dir = TempDir::new().unwrap();
    let pipeline = EtlPipeline::new(PipelineConfig::default()).unwrap();

    let out = pipeline.transform(raw_sample(&dir)).unwrap();

    let adjusted = floats(&out, "VALOR_AJUSTADO");
    assert_close(adjusted[0].unwrap(), 1_250_000.0 * (160.0 / 115.3));
    assert_close(adjusted[1].unwrap(), 2_000_000.0 * (160.0 / 121.5));
    // 2030 has no index entry
    assert_eq!(adjusted[2], Some(0.0));

    let years: Vec<Option<i32>> = out
        .column_by_name("ANIO_RADICA")
        .unwrap()
        .as_primitive::<Int32Type>()
        .iter()
        .collect();
    assert_eq!(years, vec![Some(2018), Some(2020), None]);

    assert_eq!(
        strings(&out, "GEO_KEY"),
        vec![
            Some("ANTIOQUIA_MEDELLÍN".into()),
            Some("CUNDINAMARCA_BOGOTÁ".into()),
            Some("VALLE_CALI".into())
        ]
    );
}

#[test]
fn test_chunked_run_matches_across_modes() {
    let dir = TempDir::new().unwrap();

    let (sequential, seq_dups) = chunked_run(&dir, 2, false);
    let (parallel, par_dups) = chunked_run(&dir, 2, true);

    assert_eq!(sequential, parallel);
    assert_eq!(seq_dups, par_dups);
}

#[test]
fn test_chunked_run_removes_cross_chunk_duplicates() {
    let dir = TempDir::new().unwrap();

    // PK=2 closes the first chunk and opens the second
    let (out, duplicates) = chunked_run(&dir, 2, false);

    assert_eq!(duplicates, 1);
    assert_eq!(
        strings(&out, "PK"),
        vec![Some("1".into()), Some("2".into()), Some("3".into())]
    );
}

#[test]
fn test_parallel_batches_keep_input_order() {
    let dir = TempDir::new().unwrap();
    let pipeline = EtlPipeline::new(PipelineConfig::default()).unwrap();
    let sample = raw_sample(&dir);
    let batches = vec![sample.slice(3, 1), sample.slice(0, 1), sample.slice(1, 1)];

    let (outputs, report) = pipeline.run_batches_parallel(batches).unwrap();

    let ids: Vec<_> = outputs.iter().flat_map(|b| strings(b, "PK")).collect();
    assert_eq!(ids, vec![Some("3".into()), Some("1".into()), Some("2".into())]);
    assert_eq!(report.rows_in, 3);
    assert_eq!(report.rows_out, 3);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let config = PipelineConfig {
        base_year: 1999,
        ..PipelineConfig::default()
    };
    assert!(matches!(EtlPipeline::new(config), Err(EtlError::Config(_))));
}

#[test]
fn test_configuration_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");
    let config = PipelineConfig {
        base_year: 2020,
        emit_high_value_flag: true,
        ..PipelineConfig::default()
    };

    config.to_json_file(&path).unwrap();
    let loaded = PipelineConfig::from_json_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_partial_configuration_keeps_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "config.json", r#"{ "base_year": 2023 }"#);

    let loaded = PipelineConfig::load_or_default(Some(&path)).unwrap();

    assert_eq!(loaded.base_year, 2023);
    assert_eq!(loaded.price_index, PipelineConfig::default().price_index);
}
