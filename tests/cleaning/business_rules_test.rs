use cadastral_etl::PipelineConfig;
use cadastral_etl::cleaning::{BusinessRules, StructuralSanitizer, TextNormalizer, clean_quotes_global};
use cadastral_etl::common::BatchTransform;
use cadastral_etl::schema::{SANITIZED_MARKER, has_stage};

use crate::utils::{strings, text_batch};

#[test]
fn test_sanitizer_strips_names_and_cells() {
    let batch = text_batch(&[
        ("\"PK\"", vec![Some("\"1\""), Some("2")]),
        ("VALOR", vec![Some("\"1,250,000\""), None]),
    ]);

    let cleaned = clean_quotes_global(&batch).unwrap();

    assert!(has_stage(&cleaned, SANITIZED_MARKER));
    assert_eq!(strings(&cleaned, "PK"), vec![Some("1".into()), Some("2".into())]);
    assert_eq!(strings(&cleaned, "VALOR"), vec![Some("1,250,000".into()), None]);
}

#[test]
fn test_sanitizer_is_idempotent() {
    let batch = text_batch(&[("MUNICIPIO", vec![Some("\"CALI\""), Some("PASTO")])]);

    let once = StructuralSanitizer.transform(batch).unwrap();
    let twice = StructuralSanitizer.transform(once.clone()).unwrap();

    assert_eq!(strings(&once, "MUNICIPIO"), strings(&twice, "MUNICIPIO"));
    assert_eq!(once.schema(), twice.schema());
}

#[test]
fn test_sanitizer_rejects_colliding_names() {
    let batch = text_batch(&[("PK", vec![Some("1")]), ("\"PK\"", vec![Some("1")])]);
    assert!(clean_quotes_global(&batch).is_err());
}

#[test]
fn test_registry_office_rule() {
    let config = PipelineConfig::default();
    let batch = text_batch(&[
        ("PK", vec![Some("1"), Some("2"), Some("3"), Some("4"), Some("5")]),
        ("ORIP", vec![Some(""), Some("  "), Some("0.0"), None, Some(" 50c ")]),
    ]);

    let out = BusinessRules::from_config(&config).apply(&batch).unwrap();

    assert_eq!(
        strings(&out, "ORIP"),
        vec![
            Some("SIN_ORIP".into()),
            Some("SIN_ORIP".into()),
            Some("SIN_ORIP".into()),
            Some("SIN_ORIP".into()),
            Some("50C".into()),
        ]
    );
}

#[test]
fn test_obsolete_columns_and_sentinels() {
    let config = PipelineConfig::default();
    let batch = text_batch(&[
        ("PK", vec![Some("1"), Some("2")]),
        ("FECHA_APERTURA_TEXTO", vec![Some("2010-01-01"), None]),
        ("FOLIOS_DERIVADOS", vec![None, Some("050-2")]),
        ("NUMERO_CATASTRAL", vec![Some("0100"), None]),
    ]);

    let out = BusinessRules::from_config(&config).apply(&batch).unwrap();

    assert!(out.column_by_name("FECHA_APERTURA_TEXTO").is_none());
    assert_eq!(
        strings(&out, "FOLIOS_DERIVADOS"),
        vec![Some("Sin folio".into()), Some("050-2".into())]
    );
    assert_eq!(
        strings(&out, "NUMERO_CATASTRAL"),
        vec![Some("0100".into()), Some("sin folio".into())]
    );
}

#[test]
fn test_business_rules_skip_missing_columns() {
    let config = PipelineConfig::default();
    let batch = text_batch(&[("OTRA", vec![Some("x")])]);

    let out = BusinessRules::from_config(&config).apply(&batch).unwrap();
    assert_eq!(out.num_columns(), 1);
}

#[test]
fn test_text_normalizer_trims_and_uppercases() {
    let normalizer = TextNormalizer::new(vec!["ESTADO_FOLIO".to_string(), "ABSENT".to_string()]);
    let batch = text_batch(&[("ESTADO_FOLIO", vec![Some("  activo "), None])]);

    let once = normalizer.apply(&batch).unwrap();
    let twice = normalizer.apply(&once).unwrap();

    assert_eq!(strings(&once, "ESTADO_FOLIO"), vec![Some("ACTIVO".into()), None]);
    assert_eq!(strings(&once, "ESTADO_FOLIO"), strings(&twice, "ESTADO_FOLIO"));
}
