use std::collections::BTreeMap;

use arrow::array::AsArray;
use arrow::datatypes::Int8Type;
use arrow::record_batch::RecordBatch;
use cadastral_etl::OutlierMethod;
use cadastral_etl::quality::outliers::{mean_and_std, outlier_column_name};
use cadastral_etl::quality::{
    check_schema_drift, detect_outliers, generate_quality_report, validate_configured_ranges,
    validate_critical_columns, validate_data_quality, validate_ranges,
};

use crate::utils::{float_batch, text_batch};

fn flags(batch: &RecordBatch, column: &str) -> Vec<Option<i8>> {
    batch
        .column_by_name(&outlier_column_name(column))
        .expect("outlier column")
        .as_primitive::<Int8Type>()
        .iter()
        .collect()
}

#[test]
fn test_quality_metrics() {
    let batch = text_batch(&[
        ("PK", vec![Some("1"), Some("2"), Some("2"), None]),
        ("MUNICIPIO", vec![Some("CALI"), None, None, Some("PASTO")]),
    ]);

    let report = validate_data_quality(&batch, "PK").unwrap();

    assert_eq!(report.total_rows, 4);
    assert_eq!(report.total_columns, 2);
    assert_eq!(
        report.null_counts,
        vec![("PK".to_string(), 1), ("MUNICIPIO".to_string(), 2)]
    );
    assert_eq!(report.total_nulls(), 3);
    assert_eq!(report.duplicate_count, 1);
    assert!(report.data_types.iter().all(|(_, t)| t == "Utf8"));
}

#[test]
fn test_quality_without_identifier_reports_no_duplicates() {
    let batch = text_batch(&[("A", vec![Some("x"), Some("x")])]);
    let report = validate_data_quality(&batch, "PK").unwrap();
    assert_eq!(report.duplicate_count, 0);
}

#[test]
fn test_rendered_report_sections() {
    let batch = text_batch(&[("PK", vec![Some("1"), Some("1"), None])]);

    let text = generate_quality_report(&batch, "PK").unwrap();

    assert!(text.contains("DATA QUALITY REPORT"));
    assert!(text.contains("Rows: 3"));
    assert!(text.contains("PK: 1 (33.33%)"));
    assert!(text.contains("1 duplicates"));
    assert!(text.contains("Utf8: 1 columns"));
}

#[test]
fn test_iqr_outliers_leave_nulls_unflagged() {
    let mut values: Vec<Option<f64>> = (1..=12).map(|v| Some(f64::from(v))).collect();
    values.push(Some(500.0));
    values.push(None);
    let batch = float_batch("VALOR", values);

    let (out, summary) = detect_outliers(&batch, "VALOR", OutlierMethod::Iqr, 1.5).unwrap();
    let flagged = flags(&out, "VALOR");

    assert_eq!(out.num_columns(), 2);
    assert_eq!(summary.outlier_count, 1);
    assert_eq!(flagged[12], Some(1));
    assert_eq!(flagged[13], None);
    assert!(flagged[..12].iter().all(|f| *f == Some(0)));
    assert!(summary.lower_bound.is_some() && summary.upper_bound.is_some());
}

#[test]
fn test_zscore_on_constant_column_flags_nothing() {
    let batch = float_batch("VALOR", vec![Some(7.0); 5]);

    let (out, summary) = detect_outliers(&batch, "VALOR", OutlierMethod::ZScore, 3.0).unwrap();

    assert_eq!(summary.outlier_count, 0);
    assert!(summary.upper_bound.is_none());
    assert!(flags(&out, "VALOR").iter().all(|f| *f == Some(0)));
}

#[test]
fn test_zscore_uses_sample_deviation() {
    let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
    assert!((mean - 5.0).abs() < 1e-12);
    assert!((std - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12);
    assert!(mean_and_std(&[1.0]).is_none());
}

#[test]
fn test_outliers_on_missing_column_fail() {
    let batch = float_batch("VALOR", vec![Some(1.0)]);
    assert!(detect_outliers(&batch, "VALOR_AJUSTADO", OutlierMethod::Iqr, 1.5).is_err());
}

#[test]
fn test_range_validation_counts_both_sides() {
    let batch = float_batch("VALOR", vec![Some(-1.0), Some(5.0), Some(20.0), Some(30.0), None]);

    let result = validate_ranges(&batch, "VALOR", Some(0.0), Some(10.0)).unwrap();

    assert_eq!(result.below_min_count, 1);
    assert_eq!(result.above_max_count, 2);
    assert_eq!(result.out_of_range(), 3);
    assert_eq!(result.actual_min, Some(-1.0));
    assert_eq!(result.actual_max, Some(30.0));
    assert!(!result.valid);

    let open = validate_ranges(&batch, "VALOR", None, None).unwrap();
    assert!(open.valid);
}

#[test]
fn test_range_validation_coerces_text() {
    let batch = text_batch(&[("YEAR_RADICA", vec![Some("2018"), Some("abc"), Some("2031")])]);
    let ranges = BTreeMap::from([
        ("YEAR_RADICA".to_string(), (2015.0, 2025.0)),
        ("ABSENT".to_string(), (0.0, 1.0)),
    ]);

    let results = validate_configured_ranges(&batch, &ranges).unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].above_max_count, 1);
    assert_eq!(results[0].actual_min, Some(2018.0));
}

#[test]
fn test_critical_columns() {
    let batch = text_batch(&[
        ("PK", vec![Some("1"), Some("2")]),
        ("MUNICIPIO", vec![Some("CALI"), None]),
    ]);

    let ok = validate_critical_columns(&batch, &["PK".to_string()]);
    assert!(ok.valid);

    let report = validate_critical_columns(
        &batch,
        &["PK".to_string(), "MUNICIPIO".to_string(), "VALOR".to_string()],
    );
    assert!(!report.valid);
    assert_eq!(report.columns[1].null_count, 1);
    assert!(!report.columns[2].present);
}

#[test]
fn test_schema_drift() {
    let batch = text_batch(&[("PK", vec![Some("1")]), ("EXTRA", vec![None])]);
    let expected = vec!["PK".to_string(), "VALOR".to_string()];

    let drift = check_schema_drift(&batch, &expected);

    assert_eq!(drift.missing, vec!["VALOR".to_string()]);
    assert_eq!(drift.unexpected, vec!["EXTRA".to_string()]);
    assert!(!drift.is_empty());
    assert!(check_schema_drift(&batch, &["PK".into(), "EXTRA".into()]).is_empty());
}
