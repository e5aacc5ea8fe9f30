//! Place-name normalization: accent folding and the municipality synonym table.
//!
//! Folding covers five vowel classes only. Other diacritics such as `Ñ` or
//! `Ç` are left as they are.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use rustc_hash::FxHashMap;

use crate::common::BatchTransform;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::schema::adapt::to_string_array;
use crate::utils::arrow::{column_index, map_strings, replace_column};

/// Map an uppercase accented vowel to its plain form
fn fold_char(c: char) -> char {
    match c {
        'Á' | 'À' | 'Ä' => 'A',
        'É' | 'È' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Ü' => 'U',
        other => other,
    }
}

/// Uppercase a value and strip the accents of the five vowel classes
///
/// Folding is a fixed point: `fold_accents(fold_accents(s)) == fold_accents(s)`.
#[must_use]
pub fn fold_accents(s: &str) -> String {
    s.to_uppercase().chars().map(fold_char).collect()
}

/// One synonym entry with its key already folded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synonym {
    /// Raw form as configured
    pub raw: String,
    /// Folded form compared against the data
    pub folded: String,
    /// Canonical replacement, uppercased
    pub canonical: String,
}

/// Ordered synonym table for a place-name column
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynonymTable {
    entries: Vec<Synonym>,
}

impl SynonymTable {
    /// Build a table from ordered `(raw, canonical)` pairs
    #[must_use]
    pub fn new(pairs: &[(String, String)]) -> Self {
        let entries = pairs
            .iter()
            .map(|(raw, canonical)| Synonym {
                raw: raw.clone(),
                folded: fold_accents(raw),
                canonical: canonical.to_uppercase(),
            })
            .collect();
        Self { entries }
    }

    /// Entries in application order
    #[must_use]
    pub fn entries(&self) -> &[Synonym] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folded keys that appear in more than one entry
    ///
    /// With such keys the outcome depends on the order of the table.
    #[must_use]
    pub fn conflicts(&self) -> Vec<String> {
        let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
        for entry in &self.entries {
            *counts.entry(entry.folded.as_str()).or_default() += 1;
        }

        let mut conflicts: Vec<String> = counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(key, _)| key.to_string())
            .collect();
        conflicts.sort();
        conflicts
    }

    /// Remap one folded value
    ///
    /// Every entry is applied in turn to the output of the previous one,
    /// so a canonical value that equals a later key is remapped again.
    #[must_use]
    pub fn remap(&self, folded: &str) -> String {
        self.entries
            .iter()
            .fold(folded.to_string(), |value, entry| {
                if value == entry.folded {
                    entry.canonical.clone()
                } else {
                    value
                }
            })
    }
}

/// Accent folding plus synonym remap on the municipality column
#[derive(Debug, Clone)]
pub struct MunicipalityRemapper {
    column: String,
    table: SynonymTable,
}

impl MunicipalityRemapper {
    /// Build a remapper for a column and a synonym table
    #[must_use]
    pub fn new(column: impl Into<String>, table: SynonymTable) -> Self {
        let table_conflicts = table.conflicts();
        if !table_conflicts.is_empty() {
            log::warn!(
                "Synonym table has keys that collide after folding, result depends on entry order: {table_conflicts:?}"
            );
        }
        Self {
            column: column.into(),
            table,
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.names.municipality.clone(),
            SynonymTable::new(&config.municipality_mapping),
        )
    }

    /// Fold and remap one raw value
    #[must_use]
    pub fn normalize(&self, value: &str) -> String {
        self.table.remap(&fold_accents(value))
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(idx) = column_index(batch, &self.column) else {
            log::info!("Column '{}' not present, skipping municipality remap", self.column);
            return Ok(batch.clone());
        };

        let text = to_string_array(batch.column(idx));
        // Values repeat heavily, so each distinct raw value is normalized once
        let mut cache: FxHashMap<String, String> = FxHashMap::default();
        let remapped = map_strings(&text, |s| {
            if let Some(hit) = cache.get(s) {
                return Some(hit.clone());
            }
            let out = self.normalize(s);
            cache.insert(s.to_string(), out.clone());
            Some(out)
        });

        log::debug!(
            "Remapped '{}' with {} synonym entries ({} distinct values)",
            self.column,
            self.table.len(),
            cache.len()
        );
        replace_column(batch, &self.column, Arc::new(remapped))
    }
}

impl BatchTransform for MunicipalityRemapper {
    fn name(&self) -> &'static str {
        "municipality_remapper"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}

/// Trim and uppercase the department column
#[derive(Debug, Clone)]
pub struct DepartmentNormalizer {
    column: String,
}

impl DepartmentNormalizer {
    #[must_use]
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.names.department.clone())
    }

    pub fn apply(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let Some(idx) = column_index(batch, &self.column) else {
            log::info!("Column '{}' not present, skipping department normalization", self.column);
            return Ok(batch.clone());
        };

        let text = to_string_array(batch.column(idx));
        let normalized = map_strings(&text, |s| Some(s.trim().to_uppercase()));
        replace_column(batch, &self.column, Arc::new(normalized))
    }
}

impl BatchTransform for DepartmentNormalizer {
    fn name(&self) -> &'static str {
        "department_normalizer"
    }

    fn transform(&self, batch: RecordBatch) -> Result<RecordBatch> {
        self.apply(&batch)
    }
}
