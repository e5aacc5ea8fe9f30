//! The seam every pipeline stage plugs into.

use std::fmt::Debug;

use arrow::record_batch::RecordBatch;

use crate::error::Result;

/// A stage that consumes one batch and produces the next
///
/// Stages hold only read-only configuration, so one instance can be shared
/// by every worker that processes a chunk.
pub trait BatchTransform: Debug + Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &'static str;

    /// Transform a batch
    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch>;
}

/// Run a batch through an ordered list of stages
pub fn apply_all(stages: &[Box<dyn BatchTransform>], batch: RecordBatch) -> Result<RecordBatch> {
    stages.iter().try_fold(batch, |batch, stage| {
        log::debug!("Running stage '{}' on {} rows", stage.name(), batch.num_rows());
        stage.transform(batch)
    })
}

impl<T: BatchTransform + ?Sized> BatchTransform for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        (**self).transform(batch)
    }
}
