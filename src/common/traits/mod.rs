//! Common traits used across the codebase

pub mod transform;

pub use transform::{BatchTransform, apply_all};
