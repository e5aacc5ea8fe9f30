use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, AsArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Int32Type, Int8Type, Schema};
use arrow::record_batch::RecordBatch;
use cadastral_etl::PipelineConfig;
use cadastral_etl::standardize::{
    DivipolaNormalizer, GeoKey, HighValueFlag, InflationAdjuster, PriceIndex,
    StandardizationPipeline, TemporalFeatures, pad_divipola,
};

use crate::utils::{assert_close, floats, strings, text_batch};

fn valued_batch(years: Vec<Option<i64>>, values: Vec<Option<f64>>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("YEAR_RADICA", DataType::Int64, true),
        Field::new("VALOR", DataType::Float64, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(years)),
            Arc::new(Float64Array::from(values)),
        ],
    )
    .unwrap()
}

#[test]
fn test_inflation_scenario() {
    let config = PipelineConfig::default();
    let batch = valued_batch(vec![Some(2020)], vec![Some(1_000_000.0)]);

    let out = InflationAdjuster::from_config(&config).unwrap().apply(&batch).unwrap();

    let adjusted = floats(&out, "VALOR_AJUSTADO")[0].unwrap();
    assert_close(adjusted, 1_000_000.0 * (160.0 / 121.5));
}

#[test]
fn test_base_and_unmapped_years_keep_value() {
    let config = PipelineConfig::default();
    let adjuster = InflationAdjuster::from_config(&config).unwrap();
    let batch = valued_batch(
        vec![Some(2024), Some(1990), None, Some(2020)],
        vec![Some(10.0), Some(20.0), Some(30.0), None],
    );

    let out = adjuster.apply(&batch).unwrap();

    assert!((adjuster.factor_for(Some(2024)) - 1.0).abs() < f64::EPSILON);
    assert!((adjuster.factor_for(Some(1990)) - 1.0).abs() < f64::EPSILON);
    assert!((adjuster.factor_for(None) - 1.0).abs() < f64::EPSILON);
    assert_eq!(
        floats(&out, "VALOR_AJUSTADO"),
        vec![Some(10.0), Some(20.0), Some(30.0), None]
    );
}

#[test]
fn test_price_index_requires_base_year() {
    let index = PriceIndex::new(BTreeMap::from([(2020, 121.5)])).unwrap();
    assert!(InflationAdjuster::new(&index, 2024).is_err());
    assert!(PriceIndex::new(BTreeMap::from([(2020, 0.0)])).is_err());
}

#[test]
fn test_inflation_skips_missing_value_column() {
    let config = PipelineConfig::default();
    let batch = text_batch(&[("PK", vec![Some("1")])]);

    let out = InflationAdjuster::from_config(&config).unwrap().apply(&batch).unwrap();
    assert!(out.column_by_name("VALOR_AJUSTADO").is_none());
}

#[test]
fn test_temporal_features_from_canonical_dates() {
    let features = TemporalFeatures::new(vec!["FECHA_RADICA_TEXTO".to_string()]);
    let batch = text_batch(&[(
        "FECHA_RADICA_TEXTO",
        vec![Some("05/02/2018"), Some("31/12/2020"), None],
    )]);

    let out = features.apply(&batch).unwrap();
    let int = |name: &str| -> Vec<Option<i32>> {
        out.column_by_name(name)
            .unwrap_or_else(|| panic!("missing {name}"))
            .as_primitive::<Int32Type>()
            .iter()
            .collect()
    };

    assert_eq!(int("ANIO_RADICA"), vec![Some(2018), Some(2020), None]);
    assert_eq!(int("MES_RADICA"), vec![Some(2), Some(12), None]);
    assert_eq!(int("TRIMESTRE_RADICA"), vec![Some(1), Some(4), None]);
    assert_eq!(int("SEMESTRE_RADICA"), vec![Some(1), Some(2), None]);
    // 2018-02-05 is a Monday, 2020-12-31 a Thursday
    assert_eq!(int("DIA_SEMANA_RADICA"), vec![Some(1), Some(4), None]);
}

#[test]
fn test_geo_key_joins_department_and_municipality() {
    let config = PipelineConfig::default();
    let batch = text_batch(&[
        ("DEPARTAMENTO", vec![Some("ANTIOQUIA"), None]),
        ("MUNICIPIO", vec![Some("MEDELLÍN"), Some("CALI")]),
    ]);

    let out = GeoKey::from_config(&config).apply(&batch).unwrap();

    assert_eq!(
        strings(&out, "GEO_KEY"),
        vec![Some("ANTIOQUIA_MEDELLÍN".into()), None]
    );
}

#[test]
fn test_high_value_flag() {
    let config = PipelineConfig {
        high_value_threshold: 100.0,
        ..PipelineConfig::default()
    };
    let schema = Arc::new(Schema::new(vec![Field::new(
        "VALOR_AJUSTADO",
        DataType::Float64,
        true,
    )]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Float64Array::from(vec![Some(50.0), Some(150.0), None]))],
    )
    .unwrap();

    let out = HighValueFlag::from_config(&config).apply(&batch).unwrap();
    let flags: Vec<Option<i8>> = out
        .column_by_name("ALTO_VALOR")
        .unwrap()
        .as_primitive::<Int8Type>()
        .iter()
        .collect();

    assert_eq!(flags, vec![Some(0), Some(1), None]);
}

#[test]
fn test_divipola_padding() {
    assert_eq!(pad_divipola("5001"), "05001");
    assert_eq!(pad_divipola("11001"), "11001");

    let config = PipelineConfig::default();
    let batch = RecordBatch::try_new(
        Arc::new(Schema::new(vec![Field::new("DIVIPOLA", DataType::Utf8, true)])),
        vec![Arc::new(StringArray::from(vec![Some("5001"), None]))],
    )
    .unwrap();

    let out = DivipolaNormalizer::from_config(&config).apply(&batch).unwrap();
    assert_eq!(strings(&out, "DIVIPOLA"), vec![Some("05001".into()), None]);
}

#[test]
fn test_pipeline_stage_selection() {
    let plain = StandardizationPipeline::new(&PipelineConfig::default()).unwrap();
    assert_eq!(
        plain.stage_names(),
        vec!["temporal_features", "inflation_adjuster", "geo_key"]
    );

    let config = PipelineConfig {
        emit_high_value_flag: true,
        normalize_divipola: true,
        ..PipelineConfig::default()
    };
    let full = StandardizationPipeline::new(&config).unwrap();
    assert_eq!(full.stage_names().len(), 5);

    let out = full
        .run(valued_batch(vec![Some(2020)], vec![Some(1.0)]))
        .unwrap();
    assert!(out.column_by_name("ALTO_VALOR").is_some());
    assert_eq!(out.column_by_name("VALOR_AJUSTADO").unwrap().null_count(), 0);
}
