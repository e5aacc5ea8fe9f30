//! Configuration for the cadastral ETL pipeline.
//!
//! The column lists, mapping tables, price index and valid ranges are static
//! input data. They are loaded once, validated, and then shared read-only
//! (behind an `Arc`) by every stage and every worker.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::util::{safe_create_file, safe_open_file};
use crate::error::{EtlError, Result};

/// Number of rows per chunk in chunked ingestion
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Number of rows read for quick exploration
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000;

/// Strategy applied to nulls left over after the per-column default fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NullStrategy {
    /// Replace remaining nulls with zero
    #[default]
    Fill,
    /// Remove rows with nulls in the critical columns
    Drop,
    /// Leave the data untouched and only report
    Report,
}

impl FromStr for NullStrategy {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fill" => Ok(Self::Fill),
            "drop" => Ok(Self::Drop),
            "report" => Ok(Self::Report),
            other => Err(EtlError::Config(format!(
                "unknown null strategy '{other}' (expected fill, drop or report)"
            ))),
        }
    }
}

impl fmt::Display for NullStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fill => write!(f, "fill"),
            Self::Drop => write!(f, "drop"),
            Self::Report => write!(f, "report"),
        }
    }
}

/// Outlier detection method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    /// Interquartile range fences
    #[default]
    Iqr,
    /// Absolute z-score
    ZScore,
}

impl FromStr for OutlierMethod {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(Self::Iqr),
            "zscore" | "z-score" => Ok(Self::ZScore),
            other => Err(EtlError::Config(format!(
                "unknown outlier method '{other}' (expected iqr or zscore)"
            ))),
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iqr => write!(f, "iqr"),
            Self::ZScore => write!(f, "zscore"),
        }
    }
}

/// Outlier detection settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierConfig {
    /// Detection method
    pub method: OutlierMethod,
    /// IQR multiplier or z-score cut-off
    pub threshold: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            method: OutlierMethod::Iqr,
            threshold: 3.0,
        }
    }
}

/// Sentinel texts substituted for missing domain data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    /// Fill for a null derived-folios value
    pub derived_folios: String,
    /// Fill for a null cadastral number
    pub cadastral_number: String,
    /// Replacement for a null, empty or zero registry office code
    pub registry_office: String,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            derived_folios: "Sin folio".to_string(),
            cadastral_number: "sin folio".to_string(),
            registry_office: "SIN_ORIP".to_string(),
        }
    }
}

/// Names of the columns with a fixed role in the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Primary key used for deduplication
    pub identifier: String,
    /// Monetary column cleaned of separators and adjusted for inflation
    pub monetary: String,
    /// Year used to look up the price index
    pub year: String,
    /// Output of the inflation adjustment
    pub adjusted_value: String,
    /// Municipality (place name with synonym table)
    pub municipality: String,
    /// Department (trim and uppercase only)
    pub department: String,
    /// Registry office code
    pub registry_office: String,
    /// Derived folios marker
    pub derived_folios: String,
    /// Cadastral number
    pub cadastral_number: String,
    /// DIVIPOLA municipality code
    pub divipola: String,
    /// Composite geographic key output
    pub geo_key: String,
    /// High-value indicator output
    pub high_value: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            identifier: "PK".to_string(),
            monetary: "VALOR".to_string(),
            year: "YEAR_RADICA".to_string(),
            adjusted_value: "VALOR_AJUSTADO".to_string(),
            municipality: "MUNICIPIO".to_string(),
            department: "DEPARTAMENTO".to_string(),
            registry_office: "ORIP".to_string(),
            derived_folios: "FOLIOS_DERIVADOS".to_string(),
            cadastral_number: "NUMERO_CATASTRAL".to_string(),
            divipola: "DIVIPOLA".to_string(),
            geo_key: "GEO_KEY".to_string(),
            high_value: "ALTO_VALOR".to_string(),
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Columns the source file is expected to carry
    pub expected_columns: Vec<String>,
    /// Columns with a fixed role
    pub names: ColumnNames,
    /// Columns whose nulls indicate a data-quality failure
    pub critical_columns: Vec<String>,
    /// Columns cast to float by the numeric coercer
    pub numeric_columns: Vec<String>,
    /// Date-like text columns handled by the temporal coercer
    pub date_columns: Vec<String>,
    /// Date columns from which calendar features are derived
    pub date_feature_columns: Vec<String>,
    /// Columns trimmed and uppercased by the text normalizer
    pub text_columns: Vec<String>,
    /// Columns dropped by the business rules
    pub obsolete_columns: Vec<String>,
    /// Sentinel texts
    pub sentinels: Sentinels,
    /// Per-column default fill applied before the general null strategy
    pub default_fills: Vec<(String, String)>,
    /// General null strategy
    pub null_strategy: NullStrategy,
    /// Ordered municipality synonym pairs (raw form, canonical form)
    pub municipality_mapping: Vec<(String, String)>,
    /// Consumer price index by year
    pub price_index: BTreeMap<i32, f64>,
    /// Year to which monetary values are adjusted
    pub base_year: i32,
    /// Valid inclusive ranges per column
    pub valid_ranges: BTreeMap<String, (f64, f64)>,
    /// Adjusted value above which a transaction is flagged as high value
    pub high_value_threshold: f64,
    /// Whether the standardization pipeline emits the high-value indicator
    pub emit_high_value_flag: bool,
    /// Whether the standardization pipeline zero-pads DIVIPOLA codes
    pub normalize_divipola: bool,
    /// Outlier detection settings
    pub outliers: OutlierConfig,
    /// Rows per chunk in chunked ingestion
    pub chunk_size: usize,
    /// Rows read by sample loading
    pub sample_size: usize,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let municipality_mapping = [
            ("BOGOTA D.C.", "BOGOTÁ"),
            ("BOGOTA", "BOGOTÁ"),
            ("BOGOTA DC", "BOGOTÁ"),
            ("MEDELLIN", "MEDELLÍN"),
            ("CALI", "CALI"),
            ("BARRANQUILLA", "BARRANQUILLA"),
            ("CARTAGENA", "CARTAGENA DE INDIAS"),
        ]
        .iter()
        .map(|(raw, canonical)| ((*raw).to_string(), (*canonical).to_string()))
        .collect();

        let price_index = BTreeMap::from([
            (2015, 100.0),
            (2016, 107.5),
            (2017, 111.8),
            (2018, 115.3),
            (2019, 119.4),
            (2020, 121.5),
            (2021, 126.9),
            (2022, 139.4),
            (2023, 151.2),
            (2024, 160.0),
            (2025, 168.0),
        ]);

        let valid_ranges = BTreeMap::from([
            ("YEAR_RADICA".to_string(), (2015.0, 2025.0)),
            ("VALOR".to_string(), (0.0, 1e12)),
        ]);

        Self {
            expected_columns: strings(&[
                "PK",
                "MATRICULA",
                "FECHA_RADICA_TEXTO",
                "FECHA_APERTURA_TEXTO",
                "YEAR_RADICA",
                "ORIP",
                "DIVIPOLA",
                "DEPARTAMENTO",
                "MUNICIPIO",
                "TIPO_PREDIO_ZONA",
                "CATEGORIA_RURALIDAD",
                "NUM_ANOTACION",
                "ESTADO_FOLIO",
                "FOLIOS_DERIVADOS",
                "Dinámica_Inmobiliaria",
                "COD_NATUJUR",
                "NOMBRE_NATUJUR",
                "NUMERO_CATASTRAL",
                "NUMERO_CATASTRAL_ANTIGUO",
                "DOCUMENTO_JUSTIFICATIVO",
                "COUNT_A",
                "COUNT_DE",
                "PREDIOS_NUEVOS",
                "TIENE_VALOR",
                "TIENE_MAS_DE_UN_VALOR",
                "VALOR",
            ]),
            names: ColumnNames::default(),
            critical_columns: strings(&["PK", "MUNICIPIO", "DEPARTAMENTO", "YEAR_RADICA", "VALOR"]),
            numeric_columns: strings(&[
                "YEAR_RADICA",
                "COUNT_A",
                "COUNT_DE",
                "PREDIOS_NUEVOS",
                "TIENE_VALOR",
                "TIENE_MAS_DE_UN_VALOR",
                "VALOR",
            ]),
            date_columns: strings(&["FECHA_RADICA_TEXTO"]),
            date_feature_columns: strings(&["FECHA_RADICA_TEXTO", "FECHA_APERTURA_TEXTO"]),
            text_columns: strings(&[
                "MATRICULA",
                "DIVIPOLA",
                "TIPO_PREDIO_ZONA",
                "CATEGORIA_RURALIDAD",
                "ESTADO_FOLIO",
                "NOMBRE_NATUJUR",
                "DOCUMENTO_JUSTIFICATIVO",
            ]),
            obsolete_columns: strings(&["FECHA_APERTURA_TEXTO"]),
            sentinels: Sentinels::default(),
            default_fills: vec![
                ("ESTADO_FOLIO".to_string(), "INACTIVO".to_string()),
                (
                    "DOCUMENTO_JUSTIFICATIVO".to_string(),
                    "SIN_DOCUMENTO_JUSTIFICATIVO".to_string(),
                ),
            ],
            null_strategy: NullStrategy::Fill,
            municipality_mapping,
            price_index,
            base_year: 2024,
            valid_ranges,
            high_value_threshold: 500_000_000.0,
            emit_high_value_flag: false,
            normalize_divipola: false,
            outliers: OutlierConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    ///
    /// Fields missing from the file keep their default values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = safe_open_file(path, "reading pipeline configuration")?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        log::info!("Loaded pipeline configuration from {}", path.display());
        Ok(config)
    }

    /// Load a configuration file if one is given, else use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Write the configuration as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let file = safe_create_file(path, "writing pipeline configuration")?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)?;
        Ok(())
    }

    /// Check the static tables for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(EtlError::Config("chunk_size must be positive".to_string()));
        }

        if let Some((year, index)) = self.price_index.iter().find(|(_, v)| **v <= 0.0 || !v.is_finite()) {
            return Err(EtlError::Config(format!(
                "price index for {year} must be positive, got {index}"
            )));
        }

        if !self.price_index.contains_key(&self.base_year) {
            return Err(EtlError::Config(format!(
                "base year {} has no price index entry",
                self.base_year
            )));
        }

        if let Some((column, (min, max))) = self.valid_ranges.iter().find(|(_, (lo, hi))| lo > hi) {
            return Err(EtlError::Config(format!(
                "valid range for '{column}' is inverted ({min} > {max})"
            )));
        }

        if self.outliers.threshold <= 0.0 {
            return Err(EtlError::Config(format!(
                "outlier threshold must be positive, got {}",
                self.outliers.threshold
            )));
        }

        Ok(())
    }
}
