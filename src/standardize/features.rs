//! Derived columns: calendar features, geographic key, high-value flag and
//! zero-padded DIVIPOLA codes.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int8Array, Int32Array, StringArray};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::adapt::date_utils::{parse_date_array, temporal_to_dates};
use crate::schema::adapt::{ColumnRepr, to_float64, to_string_array};
use crate::utils::arrow::{column_index, map_strings, replace_column, upsert_column};

/// Separator between department and municipality in the geographic key
pub const GEO_KEY_SEPARATOR: &str = "_";

/// Width of a DIVIPOLA municipality code
pub const DIVIPOLA_WIDTH: usize = 5;

/// Suffix of the features derived from a date column
///
/// `FECHA_RADICA_TEXTO` gives `_RADICA`.
#[must_use]
pub fn feature_suffix(column: &str) -> String {
    let core = column.strip_prefix("FECHA").unwrap_or(column);
    let core = core.strip_suffix("_TEXTO").unwrap_or(core);
    if core.starts_with('_') {
        core.to_string()
    } else {
        format!("_{core}")
    }
}

/// Semester of a month, 1 or 2
#[must_use]
pub fn semester(month: u32) -> u32 {
    (month - 1) / 6 + 1
}

/// Calendar quarter of a month, 1 to 4
#[must_use]
pub fn quarter(month: u32) -> u32 {
    (month - 1) / 3 + 1
}

fn dates_of(array: &ArrayRef) -> Result<Vec<Option<NaiveDate>>> {
    Ok(match ColumnRepr::of(array) {
        ColumnRepr::Text(text) => parse_date_array(text),
        ColumnRepr::Temporal(typed) => temporal_to_dates(typed)?,
        ColumnRepr::OtherText(_) => parse_date_array(&to_string_array(array)),
        _ => vec![None; array.len()],
    })
}

fn feature(dates: &[Option<NaiveDate>], f: impl Fn(&NaiveDate) -> i32) -> ArrayRef {
    Arc::new(dates.iter().map(|d| d.as_ref().map(&f)).collect::<Int32Array>())
}

/// Calendar features for each present date column
#[derive(Debug, Clone)]
pub struct TemporalFeatures {
    columns: Vec<String>,
}

impl TemporalFeatures {
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.date_feature_columns.clone())
    }

    /// Append `ANIO`, `MES`, `TRIMESTRE`, `SEMESTRE` and `DIA_SEMANA`
    /// columns (`Int32`) for every configured date column present
    ///
    /// The weekday is ISO, Monday is 1. Unparseable dates give null features.
    #[allow(clippy::cast_possible_wrap)]
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mut out = batch.clone();

        for column in &self.columns {
            let Some(idx) = column_index(batch, column) else {
                continue;
            };
            let dates = dates_of(batch.column(idx))?;
            let suffix = feature_suffix(column);

            let features = [
                ("ANIO", feature(&dates, |d| d.year())),
                ("MES", feature(&dates, |d| d.month() as i32)),
                ("TRIMESTRE", feature(&dates, |d| quarter(d.month()) as i32)),
                ("SEMESTRE", feature(&dates, |d| semester(d.month()) as i32)),
                ("DIA_SEMANA", feature(&dates, |d| d.weekday().number_from_monday() as i32)),
            ];
            for (name, array) in features {
                out = upsert_column(&out, &format!("{name}{suffix}"), array)?;
            }

            let failed = dates.iter().filter(|d| d.is_none()).count();
            if failed > 0 {
                log::warn!(
                    "{failed} of {} dates in '{column}' could not be parsed for features",
                    dates.len()
                );
            } else {
                log::debug!("All dates in '{column}' parsed for features");
            }
        }

        Ok(out)
    }
}

impl BatchTransform for TemporalFeatures {
    fn name(&self) -> &'static str {
        "temporal_features"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}

/// Department and municipality joined into one key
#[derive(Debug, Clone)]
pub struct GeoKey {
    department: String,
    municipality: String,
    output: String,
}

impl GeoKey {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            department: config.names.department.clone(),
            municipality: config.names.municipality.clone(),
            output: config.names.geo_key.clone(),
        }
    }

    /// Build `DEPARTAMENTO_MUNICIPIO`; null when either part is null
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let (Some(dep_idx), Some(mun_idx)) = (
            column_index(batch, &self.department),
            column_index(batch, &self.municipality),
        ) else {
            log::info!(
                "'{}' or '{}' not present, skipping geographic key",
                self.department,
                self.municipality
            );
            return Ok(batch.clone());
        };

        let department = to_string_array(batch.column(dep_idx));
        let municipality = to_string_array(batch.column(mun_idx));
        let keys: StringArray = department
            .iter()
            .zip(municipality.iter())
            .map(|(d, m)| Some(format!("{}{GEO_KEY_SEPARATOR}{}", d?, m?)))
            .collect();

        upsert_column(batch, &self.output, Arc::new(keys))
    }
}

impl BatchTransform for GeoKey {
    fn name(&self) -> &'static str {
        "geo_key"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}

/// `Int8` indicator of an adjusted value above a threshold
#[derive(Debug, Clone)]
pub struct HighValueFlag {
    value_column: String,
    output: String,
    threshold: f64,
}

impl HighValueFlag {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            value_column: config.names.adjusted_value.clone(),
            output: config.names.high_value.clone(),
            threshold: config.high_value_threshold,
        }
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(idx) = column_index(batch, &self.value_column) else {
            log::info!(
                "Column '{}' not present, skipping high-value indicator",
                self.value_column
            );
            return Ok(batch.clone());
        };

        let values = to_float64(batch.column(idx));
        let flags: Int8Array = values
            .as_primitive::<Float64Type>()
            .iter()
            .map(|v| v.map(|v| i8::from(v > self.threshold)))
            .collect();
        upsert_column(batch, &self.output, Arc::new(flags))
    }
}

impl BatchTransform for HighValueFlag {
    fn name(&self) -> &'static str {
        "high_value_flag"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}

/// Trim a DIVIPOLA code and left-pad it with zeros
#[must_use]
pub fn pad_divipola(code: &str) -> String {
    let code = code.trim();
    format!("{code:0>DIVIPOLA_WIDTH$}")
}

/// Zero-padding of the DIVIPOLA column
#[derive(Debug, Clone)]
pub struct DivipolaNormalizer {
    column: String,
}

impl DivipolaNormalizer {
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            column: config.names.divipola.clone(),
        }
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(idx) = column_index(batch, &self.column) else {
            log::info!("Column '{}' not present, skipping DIVIPOLA codes", self.column);
            return Ok(batch.clone());
        };

        let codes = to_string_array(batch.column(idx));
        let padded = map_strings(&codes, |s| Some(pad_divipola(s)));
        replace_column(batch, &self.column, Arc::new(padded))
    }
}

impl BatchTransform for DivipolaNormalizer {
    fn name(&self) -> &'static str {
        "divipola_normalizer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}
