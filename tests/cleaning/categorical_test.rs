use cadastral_etl::PipelineConfig;
use cadastral_etl::cleaning::{DepartmentNormalizer, MunicipalityRemapper, SynonymTable, fold_accents};

use crate::utils::{strings, text_batch};

#[test]
fn test_bogota_synonym_scenario() {
    let remapper = MunicipalityRemapper::from_config(&PipelineConfig::default());
    let batch = text_batch(&[(
        "MUNICIPIO",
        vec![Some("bogota dc"), Some("Bogotá D.C."), Some("medellín"), None],
    )]);

    let out = remapper.apply(&batch).unwrap();

    assert_eq!(
        strings(&out, "MUNICIPIO"),
        vec![
            Some("BOGOTÁ".into()),
            Some("BOGOTÁ".into()),
            Some("MEDELLÍN".into()),
            None
        ]
    );
}

#[test]
fn test_remap_is_idempotent() {
    let remapper = MunicipalityRemapper::from_config(&PipelineConfig::default());
    let batch = text_batch(&[(
        "MUNICIPIO",
        vec![Some("cartagena"), Some("pasto"), Some("BOGOTA")],
    )]);

    let once = remapper.apply(&batch).unwrap();
    let twice = remapper.apply(&once).unwrap();

    assert_eq!(strings(&once, "MUNICIPIO"), strings(&twice, "MUNICIPIO"));
    assert_eq!(strings(&once, "MUNICIPIO")[0].as_deref(), Some("CARTAGENA DE INDIAS"));
}

#[test]
fn test_unmapped_values_are_folded_only() {
    let remapper = MunicipalityRemapper::from_config(&PipelineConfig::default());
    assert_eq!(remapper.normalize("Túquerres"), "TUQUERRES");
    assert_eq!(remapper.normalize("Ñátaga"), "ÑATAGA");
}

#[test]
fn test_folding_fixed_point() {
    for raw in ["Bogotá", "ÁÉÍÓÚ àèìòù äëïöü", "ñandú", "plain"] {
        let folded = fold_accents(raw);
        assert_eq!(fold_accents(&folded), folded, "{raw}");
    }
}

#[test]
fn test_conflicting_keys_are_reported() {
    let table = SynonymTable::new(&[
        ("MEDELLIN".to_string(), "MEDELLÍN".to_string()),
        ("medellín".to_string(), "OTRO".to_string()),
    ]);
    assert_eq!(table.conflicts(), vec!["MEDELLIN".to_string()]);
}

#[test]
fn test_department_trim_and_upper() {
    let normalizer = DepartmentNormalizer::from_config(&PipelineConfig::default());
    let batch = text_batch(&[("DEPARTAMENTO", vec![Some(" antioquia "), Some("Nariño")])]);

    let out = normalizer.apply(&batch).unwrap();

    assert_eq!(
        strings(&out, "DEPARTAMENTO"),
        vec![Some("ANTIOQUIA".into()), Some("NARIÑO".into())]
    );
}

#[test]
fn test_missing_municipality_column_is_skipped() {
    let remapper = MunicipalityRemapper::from_config(&PipelineConfig::default());
    let batch = text_batch(&[("OTRA", vec![Some("bogota")])]);
    assert_eq!(strings(&remapper.apply(&batch).unwrap(), "OTRA"), vec![Some("bogota".into())]);
}
