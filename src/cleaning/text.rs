//! Trim and uppercase a declared set of text columns.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::adapt::to_string_array;
use crate::utils::arrow::{column_index, map_strings, replace_column};

/// Text normalizer stage
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    columns: Vec<String>,
}

impl TextNormalizer {
    /// Normalize the given columns
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Normalize the configured text columns
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.text_columns.clone())
    }

    /// Coerce each declared column to text, then trim and uppercase it
    ///
    /// # Arguments
    /// * `batch` - The batch to normalize
    ///
    /// # Returns
    /// A batch with the normalized columns; columns outside the declared
    /// set and declared columns absent from the batch are left alone
    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let mut out = batch.clone();
        let mut normalized = 0;

        for column in &self.columns {
            let Some(idx) = column_index(&out, column) else {
                continue;
            };
            let text = to_string_array(out.column(idx));
            let upper = map_strings(&text, |s| Some(s.trim().to_uppercase()));
            out = replace_column(&out, column, Arc::new(upper))?;
            normalized += 1;
        }

        log::debug!("Normalized {normalized} of {} text columns", self.columns.len());
        Ok(out)
    }
}

impl BatchTransform for TextNormalizer {
    fn name(&self) -> &'static str {
        "text_normalizer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}
