//! Inflation adjustment of monetary values with a year-indexed price table.
//!
//! The factor table is derived once (`index[base] / index[year]`) and each
//! row does a single hash lookup, so the pass is linear in the number of
//! rows whatever the size of the table.

use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Array, AsArray, Float64Array, Int64Array};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::{EtlError, Result};
use crate::schema::adapt::{to_float64, to_int64};
use crate::utils::arrow::{column_index, upsert_column};

/// Consumer price index by year
#[derive(Debug, Clone, PartialEq)]
pub struct PriceIndex {
    values: BTreeMap<i32, f64>,
}

impl PriceIndex {
    /// Build an index table, rejecting non-positive or non-finite entries
    pub fn new(values: BTreeMap<i32, f64>) -> Result<Self> {
        if let Some((year, value)) = values.iter().find(|(_, v)| !(v.is_finite() && **v > 0.0)) {
            return Err(EtlError::Config(format!(
                "price index for {year} must be positive, got {value}"
            )));
        }
        Ok(Self { values })
    }

    #[must_use]
    pub fn get(&self, year: i32) -> Option<f64> {
        self.values.get(&year).copied()
    }

    /// Factor that brings a value from `year` to `base_year`
    ///
    /// An unmapped year (or base year) gives 1.0.
    #[must_use]
    pub fn factor(&self, year: i32, base_year: i32) -> f64 {
        match (self.get(base_year), self.get(year)) {
            (Some(base), Some(index)) => base / index,
            _ => 1.0,
        }
    }

    /// Years covered by the table
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.values.keys().copied()
    }
}

/// Inflation adjuster stage
#[derive(Debug, Clone)]
pub struct InflationAdjuster {
    value_column: String,
    year_column: String,
    output_column: String,
    base_year: i32,
    factors: FxHashMap<i64, f64>,
}

impl InflationAdjuster {
    /// Build an adjuster for a price table and a base year
    ///
    /// # Errors
    /// Returns a configuration error if the base year has no index entry
    pub fn new(index: &PriceIndex, base_year: i32) -> Result<Self> {
        if index.get(base_year).is_none() {
            return Err(EtlError::Config(format!(
                "base year {base_year} has no price index entry"
            )));
        }

        let factors = index
            .years()
            .map(|year| (i64::from(year), index.factor(year, base_year)))
            .collect();

        Ok(Self {
            value_column: "VALOR".to_string(),
            year_column: "YEAR_RADICA".to_string(),
            output_column: "VALOR_AJUSTADO".to_string(),
            base_year,
            factors,
        })
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let index = PriceIndex::new(config.price_index.clone())?;
        let mut adjuster = Self::new(&index, config.base_year)?;
        adjuster.value_column.clone_from(&config.names.monetary);
        adjuster.year_column.clone_from(&config.names.year);
        adjuster.output_column.clone_from(&config.names.adjusted_value);
        Ok(adjuster)
    }

    #[must_use]
    pub fn base_year(&self) -> i32 {
        self.base_year
    }

    /// Factor for one row year; null and unmapped years give 1.0
    #[must_use]
    pub fn factor_for(&self, year: Option<i64>) -> f64 {
        year.and_then(|y| self.factors.get(&y).copied()).unwrap_or(1.0)
    }

    /// Append the adjusted value column
    ///
    /// The year column is read as an integer non-strictly (`2020.0` is 2020).
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(value_idx) = column_index(batch, &self.value_column) else {
            log::info!(
                "Column '{}' not present, skipping inflation adjustment",
                self.value_column
            );
            return Ok(batch.clone());
        };

        let values = to_float64(batch.column(value_idx));
        let values = values.as_primitive::<Float64Type>();

        let years = match column_index(batch, &self.year_column) {
            Some(idx) => to_int64(batch.column(idx)),
            None => {
                log::warn!(
                    "Column '{}' not present, all values keep a factor of 1.0",
                    self.year_column
                );
                Int64Array::new_null(batch.num_rows())
            }
        };

        let adjusted: Float64Array = values
            .iter()
            .zip(years.iter())
            .map(|(value, year)| value.map(|v| v * self.factor_for(year)))
            .collect();

        let unmapped = years
            .iter()
            .flatten()
            .filter(|y| !self.factors.contains_key(y))
            .count();
        if unmapped > 0 {
            log::debug!("{unmapped} rows have a year outside the price index");
        }
        log::debug!(
            "Adjusted {} values to {} prices ({} nulls)",
            adjusted.len(),
            self.base_year,
            adjusted.null_count()
        );

        upsert_column(batch, &self.output_column, Arc::new(adjusted))
    }
}

impl BatchTransform for InflationAdjuster {
    fn name(&self) -> &'static str {
        "inflation_adjuster"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}
