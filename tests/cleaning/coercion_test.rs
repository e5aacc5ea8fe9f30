use std::sync::Arc;

use arrow::array::{Array, Date32Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use cadastral_etl::EtlError;
use cadastral_etl::cleaning::{NumericCoercer, TemporalCoercer, clean_quotes_global};
use cadastral_etl::schema::adapt::date_utils::naive_to_date32;
use cadastral_etl::schema::adapt::is_canonical;
use chrono::NaiveDate;

use crate::utils::{floats, sanitized_batch, strings, text_batch};

fn date_coercer() -> TemporalCoercer {
    TemporalCoercer::new(vec!["FECHA_RADICA_TEXTO".to_string()])
}

#[test]
fn test_two_digit_year_scenario() {
    let batch = sanitized_batch(&[("FECHA_RADICA_TEXTO", vec![Some("05/02/18")])]);

    let (out, report) = date_coercer().coerce(&batch).unwrap();

    assert_eq!(strings(&out, "FECHA_RADICA_TEXTO"), vec![Some("05/02/2018".into())]);
    assert_eq!(report.total_unparsed(), 0);
}

#[test]
fn test_date_cascade_outputs_canonical_form() {
    let batch = sanitized_batch(&[(
        "FECHA_RADICA_TEXTO",
        vec![
            Some("2020-03-15"),
            Some("2020-03-15 10:30:00"),
            Some("15/03/2020"),
            Some("not a date"),
            Some("31/02/2020"),
            None,
        ],
    )]);

    let (out, report) = date_coercer().coerce(&batch).unwrap();
    let values = strings(&out, "FECHA_RADICA_TEXTO");

    assert_eq!(values[0].as_deref(), Some("15/03/2020"));
    assert_eq!(values[1].as_deref(), Some("15/03/2020"));
    assert_eq!(values[2].as_deref(), Some("15/03/2020"));
    assert_eq!(values[3], None);
    assert_eq!(values[4], None);
    assert_eq!(values[5], None);
    for value in values.iter().flatten() {
        assert!(is_canonical(value), "{value}");
    }

    let stats = &report.columns[0];
    assert_eq!(stats.nulls_before, 1);
    assert_eq!(stats.nulls_after, 3);
    assert_eq!(stats.unparsed, 2);
}

#[test]
fn test_typed_dates_are_reformatted() {
    let date = NaiveDate::from_ymd_opt(2019, 12, 1).unwrap();
    let schema = Arc::new(Schema::new(vec![Field::new(
        "FECHA_RADICA_TEXTO",
        DataType::Date32,
        true,
    )]));
    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(Date32Array::from(vec![Some(naive_to_date32(date)), None]))],
    )
    .unwrap();
    let batch = clean_quotes_global(&batch).unwrap();

    let (out, _) = date_coercer().coerce(&batch).unwrap();

    assert_eq!(strings(&out, "FECHA_RADICA_TEXTO"), vec![Some("01/12/2019".into()), None]);
}

#[test]
fn test_numeric_date_column_passes_through() {
    let schema = Arc::new(Schema::new(vec![Field::new(
        "FECHA_RADICA_TEXTO",
        DataType::Int64,
        true,
    )]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![2018, 2019]))]).unwrap();
    let batch = clean_quotes_global(&batch).unwrap();

    let (out, report) = date_coercer().coerce(&batch).unwrap();

    assert_eq!(out.column(0).data_type(), &DataType::Int64);
    assert!(report.columns.is_empty());
}

#[test]
fn test_coercers_require_sanitized_input() {
    let batch = text_batch(&[
        ("FECHA_RADICA_TEXTO", vec![Some("05/02/18")]),
        ("VALOR", vec![Some("10")]),
    ]);

    let temporal = date_coercer().coerce(&batch);
    let numeric = NumericCoercer::new("VALOR", vec![]).apply(&batch);

    assert!(matches!(temporal, Err(EtlError::Precondition { .. })));
    assert!(matches!(numeric, Err(EtlError::Precondition { .. })));
}

#[test]
fn test_monetary_scenario() {
    let batch = text_batch(&[("VALOR", vec![Some("\"1,250,000\"")])]);
    let batch = clean_quotes_global(&batch).unwrap();

    let out = NumericCoercer::new("VALOR", vec![]).apply(&batch).unwrap();

    assert_eq!(floats(&out, "VALOR"), vec![Some(1_250_000.0)]);
}

#[test]
fn test_monetary_values_are_null_or_non_negative() {
    let batch = sanitized_batch(&[(
        "VALOR",
        vec![Some("-5"), Some("abc"), Some("0"), Some("3.5"), Some(""), None],
    )]);

    let out = NumericCoercer::new("VALOR", vec![]).apply(&batch).unwrap();
    let values = floats(&out, "VALOR");

    assert_eq!(values, vec![None, None, Some(0.0), Some(3.5), None, None]);
    assert!(values.iter().flatten().all(|v| *v >= 0.0));
}

#[test]
fn test_declared_numeric_columns_become_float() {
    let batch = sanitized_batch(&[
        ("YEAR_RADICA", vec![Some("2020"), Some("x")]),
        ("COUNT_A", vec![Some(" 3 "), None]),
        ("VALOR", vec![Some("10"), Some("20")]),
    ]);

    let out = NumericCoercer::new("VALOR", vec!["YEAR_RADICA".into(), "COUNT_A".into(), "ABSENT".into()])
        .apply(&batch)
        .unwrap();

    assert_eq!(floats(&out, "YEAR_RADICA"), vec![Some(2020.0), None]);
    assert_eq!(floats(&out, "COUNT_A"), vec![Some(3.0), None]);
    assert_eq!(out.column_by_name("VALOR").unwrap().null_count(), 0);
}
