//! Domain rules applied before generic typing.
//!
//! Obsolete columns are dropped and domain sentinels are imputed while the
//! affected columns are still text, so that a sentinel is never mistaken for
//! an empty number later on.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::common::BatchTransform;
use crate::config::{PipelineConfig, Sentinels};
use crate::error::Result;
use crate::schema::adapt::to_string_array;
use crate::utils::arrow::{column_index, drop_columns, map_optional_strings, replace_column};

/// Values of the registry office code that mean "no office"
const EMPTY_OFFICE_CODES: [&str; 3] = ["", "0", "0.0"];

/// Normalize one registry office code
///
/// Null, blank and zero codes become the sentinel; anything else is trimmed
/// and uppercased.
#[must_use]
pub fn normalize_registry_office(value: Option<&str>, sentinel: &str) -> String {
    match value.map(str::trim) {
        None => sentinel.to_string(),
        Some(code) if EMPTY_OFFICE_CODES.contains(&code) => sentinel.to_string(),
        Some(code) => code.to_uppercase(),
    }
}

/// Business-rule stage
#[derive(Debug, Clone)]
pub struct BusinessRules {
    obsolete_columns: Vec<String>,
    derived_folios_column: String,
    cadastral_number_column: String,
    registry_office_column: String,
    sentinels: Sentinels,
}

impl BusinessRules {
    /// Build the stage from the pipeline configuration
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            obsolete_columns: config.obsolete_columns.clone(),
            derived_folios_column: config.names.derived_folios.clone(),
            cadastral_number_column: config.names.cadastral_number.clone(),
            registry_office_column: config.names.registry_office.clone(),
            sentinels: config.sentinels.clone(),
        }
    }

    /// Cast a column to text and fill its nulls with a fixed value
    fn fill_text(batch: &RecordBatch, column: &str, fill: &str) -> Result<RecordBatch> {
        let Some(idx) = column_index(batch, column) else {
            log::debug!("Column '{column}' not present, skipping fill");
            return Ok(batch.clone());
        };

        let text = to_string_array(batch.column(idx));
        let filled = map_optional_strings(&text, |v| Some(v.unwrap_or(fill).to_string()));
        replace_column(batch, column, Arc::new(filled))
    }

    /// Apply the rules to a batch
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let (mut batch, dropped) = drop_columns(batch, &self.obsolete_columns)?;
        if !dropped.is_empty() {
            log::info!("Dropped obsolete columns: {dropped:?}");
        }

        batch = Self::fill_text(&batch, &self.derived_folios_column, &self.sentinels.derived_folios)?;
        batch = Self::fill_text(&batch, &self.cadastral_number_column, &self.sentinels.cadastral_number)?;

        if let Some(idx) = column_index(&batch, &self.registry_office_column) {
            let text = to_string_array(batch.column(idx));
            let sentinel = &self.sentinels.registry_office;
            let normalized =
                map_optional_strings(&text, |v| Some(normalize_registry_office(v, sentinel)));
            batch = replace_column(&batch, &self.registry_office_column, Arc::new(normalized))?;
        } else {
            log::debug!(
                "Column '{}' not present, skipping registry office rule",
                self.registry_office_column
            );
        }

        Ok(batch)
    }
}

impl BatchTransform for BusinessRules {
    fn name(&self) -> &'static str {
        "business_rules"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let out = self.apply(&batch)?;
        log::info!("Business rules applied");
        Ok(out)
    }
}
