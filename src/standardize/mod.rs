//! Standardization of a cleaned batch: calendar features, inflation
//! adjustment, geographic key and the optional derived columns.

pub mod features;
pub mod inflation;

use arrow::record_batch::RecordBatch;

use crate::common::{BatchTransform, apply_all};
use crate::config::PipelineConfig;
use crate::error::Result;

pub use features::{
    DivipolaNormalizer, GeoKey, HighValueFlag, TemporalFeatures, feature_suffix, pad_divipola,
};
pub use inflation::{InflationAdjuster, PriceIndex};

/// Ordered standardization stages
#[derive(Debug)]
pub struct StandardizationPipeline {
    stages: Vec<Box<dyn BatchTransform>>,
}

impl StandardizationPipeline {
    /// Build the stages from a configuration
    ///
    /// # Errors
    /// Returns a configuration error if the price index is invalid or lacks
    /// the base year
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let mut stages: Vec<Box<dyn BatchTransform>> = vec![
            Box::new(TemporalFeatures::from_config(config)),
            Box::new(InflationAdjuster::from_config(config)?),
            Box::new(GeoKey::from_config(config)),
        ];
        if config.emit_high_value_flag {
            stages.push(Box::new(HighValueFlag::from_config(config)));
        }
        if config.normalize_divipola {
            stages.push(Box::new(DivipolaNormalizer::from_config(config)));
        }

        Ok(Self { stages })
    }

    /// Names of the stages in execution order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn run(&self, batch: RecordBatch) -> Result<RecordBatch> {
        apply_all(&self.stages, batch)
    }
}

impl BatchTransform for StandardizationPipeline {
    fn name(&self) -> &'static str {
        "standardization"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let columns_in = batch.num_columns();
        let out = self.run(batch)?;
        log::info!(
            "Standardization finished: {} derived columns added",
            out.num_columns().saturating_sub(columns_in)
        );
        Ok(out)
    }
}

/// Standardize a cleaned batch with the given configuration
pub fn apply_all_standardization(batch: RecordBatch, config: &PipelineConfig) -> Result<RecordBatch> {
    StandardizationPipeline::new(config)?.run(batch)
}
