//! Configuration for the complaint pipeline.
//!
//! Every component receives its section of [`PipelineConfig`] at
//! construction time. The defaults carry the values used for the
//! Consumidor.gov.br / Agibank / São Paulo analysis; a JSON document can
//! override any subset of them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;

/// Configuration for the whole pipeline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-file quality thresholds
    pub quality: QualityThresholds,
    /// Target-entity matching
    pub entity: EntityConfig,
    /// Temporal column parsing
    pub temporal: TemporalConfig,
    /// Categorical re-encoding
    pub cardinality: CardinalityConfig,
    /// Region subset and city cleaning
    pub region: RegionConfig,
    /// Sectoral analysis
    pub sectors: SectorConfig,
    /// Silver-stage column handling
    pub standardization: StandardizationConfig,
    /// General processing knobs
    pub processing: ProcessingConfig,
    /// Stage input and output locations
    pub paths: StagePaths,
}

impl PipelineConfig {
    /// Load a configuration document, falling back to defaults for every
    /// omitted field
    pub fn from_json_file(path: &Path) -> Result<Self> {
        crate::error::util::ensure_exists(path)?;
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parse a configuration document from a string
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Thresholds evaluated by the quality gate
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Maximum fraction of nulls allowed per column
    pub max_null_fraction: f64,
    /// Minimum number of rows expected per file
    pub min_row_count: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            max_null_fraction: 0.3,
            min_row_count: 100,
        }
    }
}

/// Target-entity matching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EntityConfig {
    /// Name aliases of the target organization
    pub aliases: Vec<String>,
    /// Candidate company-name columns, in priority order
    pub company_columns: Vec<String>,
    /// Name of the boolean match column
    pub flag_column: String,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            aliases: [
                "Banco Agibank",
                "Banco Agibank (Agiplan)",
                "AGIBANK",
                "AGI BANK",
                "BANCO AGIBANK",
                "AGIBANK S.A.",
            ]
            .map(String::from)
            .to_vec(),
            company_columns: vec!["Nome Fantasia".to_string(), "nome_fantasia".to_string()],
            flag_column: "is_agibank".to_string(),
        }
    }
}

/// Temporal column configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    /// Columns to parse, in order
    pub datetime_columns: Vec<String>,
    /// Day-first formats tried for ordinary date columns
    pub default_formats: Vec<String>,
    /// Column carrying the machine-generated ingestion timestamp
    pub processed_at_column: String,
    /// Fixed format of the ingestion timestamp
    pub processed_at_format: String,
    /// Fall back to pattern-based format detection
    pub enable_format_detection: bool,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            datetime_columns: [
                "data_abertura",
                "data_resposta",
                "data_finalizacao",
                "prazo_resposta",
                "processed_at",
            ]
            .map(String::from)
            .to_vec(),
            default_formats: [
                "%d/%m/%Y %H:%M:%S",
                "%d/%m/%Y %H:%M",
                "%d/%m/%Y",
                "%d-%m-%Y",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%d",
            ]
            .map(String::from)
            .to_vec(),
            processed_at_column: "processed_at".to_string(),
            processed_at_format: "%Y-%m-%d %H:%M:%S%.f".to_string(),
            enable_format_detection: true,
        }
    }
}

/// Categorical re-encoding configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CardinalityConfig {
    /// Columns considered for dictionary encoding
    pub candidate_columns: Vec<String>,
    /// Re-encode when distinct/rows is below this ratio
    pub max_unique_ratio: f64,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self {
            candidate_columns: [
                "regiao",
                "uf",
                "sexo",
                "faixa_etaria",
                "area",
                "segmento_de_mercado",
                "como_comprou_contratou",
                "procurou_empresa",
                "respondida",
                "situacao",
                "avaliacao_reclamacao",
                "data_source",
                "file_month",
            ]
            .map(String::from)
            .to_vec(),
            max_unique_ratio: 0.01,
        }
    }
}

/// Region subset and city-cleaning configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Column holding the region code
    pub region_column: String,
    /// Region code selecting the subset
    pub region_code: String,
    /// Column holding the city label
    pub city_column: String,
    /// Known number of municipalities in the region
    pub expected_city_ceiling: usize,
    /// Excess over the ceiling still considered acceptable
    pub ceiling_margin: usize,
    /// Cities seen at most this many times are suspicious
    pub low_frequency_threshold: usize,
    /// Label rewrites applied before counting
    pub corrections: BTreeMap<String, String>,
    /// Name of the per-row suspicion flag
    pub suspicious_flag_column: String,
    /// Name of the flag added to the full frame for clean region rows
    pub clean_flag_column: String,
    /// Name of the city ranking column on the curated dataset
    pub ranking_column: String,
}

impl Default for RegionConfig {
    fn default() -> Self {
        let corrections = [
            ("Cafel?ndia", "Cafelândia"),
            ("Guai?ara", "Guaiçara"),
            ("Paragua?u Paulista", "Paraguaçu Paulista"),
            ("Lageado de Araçaíba", "Lageado"),
            ("Monte Verde Paulista", "Monte Verde"),
            ("Aparecida de Monte Alto", "Monte Alto"),
        ]
        .into_iter()
        .map(|(wrong, right)| (wrong.to_string(), right.to_string()))
        .collect();

        Self {
            region_column: "uf".to_string(),
            region_code: "SP".to_string(),
            city_column: "cidade".to_string(),
            expected_city_ceiling: 645,
            ceiling_margin: 15,
            low_frequency_threshold: 3,
            corrections,
            suspicious_flag_column: "cidade_suspeita_gold".to_string(),
            clean_flag_column: "is_sp_clean".to_string(),
            ranking_column: "cidade_ranking".to_string(),
        }
    }
}

/// Sectoral analysis configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    /// Column with the age bracket
    pub age_column: String,
    /// Column with the market segment
    pub segment_column: String,
    /// Column with the problem type
    pub problem_column: String,
    /// Column with the business area
    pub area_column: String,
    /// Keywords marking an area as banking
    pub banking_keywords: Vec<String>,
    /// Column with the company trade name
    pub company_column: String,
    /// Column with the responded flag
    pub response_column: String,
    /// Value of the responded flag meaning "yes"
    pub response_yes: String,
    /// Column with the response time in days
    pub response_time_column: String,
    /// Column with the consumer's evaluation
    pub evaluation_column: String,
    /// Evaluation value meaning the complaint was resolved
    pub resolved_value: String,
}

impl Default for SectorConfig {
    fn default() -> Self {
        Self {
            age_column: "faixa_etaria".to_string(),
            segment_column: "segmento_de_mercado".to_string(),
            problem_column: "problema".to_string(),
            area_column: "area".to_string(),
            banking_keywords: ["banco", "financeira", "administradora", "cartão"]
                .map(String::from)
                .to_vec(),
            company_column: "nome_fantasia".to_string(),
            response_column: "respondida".to_string(),
            response_yes: "S".to_string(),
            response_time_column: "tempo_resposta".to_string(),
            evaluation_column: "avaliacao_reclamacao".to_string(),
            resolved_value: "Resolvida".to_string(),
        }
    }
}

/// Silver-stage column handling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StandardizationConfig {
    /// Columns dropped before canonicalization (raw or canonical names)
    pub drop_columns: Vec<String>,
    /// Separator replacing whitespace in column names
    pub separator: char,
}

impl Default for StandardizationConfig {
    fn default() -> Self {
        Self {
            drop_columns: [
                "Data Análise",
                "Data Recusa",
                "Prazo Analise Gestor",
                "Análise da Recusa",
                "Interação com Judiciario",
                "Último Complemento Consumidor",
                "Canal de Origem",
                "Gestor",
            ]
            .map(String::from)
            .to_vec(),
            separator: '_',
        }
    }
}

/// General processing knobs
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Year the raw exports are expected to cover
    pub target_year: i32,
    /// Declared for chunked loading; no stage reads it
    pub chunk_size: usize,
    /// Delimiter used when writing stage outputs
    pub output_delimiter: char,
    /// Delimiter forced on the raw exports; detected per file when unset
    pub input_delimiter: Option<char>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_year: 2025,
            chunk_size: 10_000,
            output_delimiter: ';',
            input_delimiter: None,
        }
    }
}

/// Stage input and output locations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StagePaths {
    /// Glob pattern matching the raw export files
    pub raw_glob: String,
    /// Directory holding bronze and silver outputs
    pub silver_dir: PathBuf,
    /// Directory holding gold outputs
    pub gold_dir: PathBuf,
    /// Version written into bronze output names
    pub bronze_version: u32,
    /// Version written into silver output names
    pub silver_version: u32,
    /// Version written into gold output names
    pub gold_version: u32,
}

impl Default for StagePaths {
    fn default() -> Self {
        Self {
            raw_glob: "data/bronze/consumidor_gov/*.csv".to_string(),
            silver_dir: PathBuf::from("data/silver"),
            gold_dir: PathBuf::from("data/gold"),
            bronze_version: 1,
            silver_version: 1,
            gold_version: 1,
        }
    }
}

impl StagePaths {
    /// Path of the bronze output
    #[must_use]
    pub fn bronze_output(&self) -> PathBuf {
        crate::utils::io::versioned_path(&self.silver_dir, "consumidor_gov_bronze", self.bronze_version)
    }

    /// Path of the silver output
    #[must_use]
    pub fn silver_output(&self) -> PathBuf {
        crate::utils::io::versioned_path(&self.silver_dir, "consumidor_gov_silver", self.silver_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_analysis_settings() {
        let config = PipelineConfig::default();
        assert!((config.quality.max_null_fraction - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.quality.min_row_count, 100);
        assert_eq!(config.region.expected_city_ceiling, 645);
        assert_eq!(config.region.low_frequency_threshold, 3);
        assert_eq!(config.processing.chunk_size, 10_000);
        assert!(config.entity.aliases.iter().any(|a| a == "AGIBANK S.A."));
    }

    #[test]
    fn test_partial_document_keeps_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{ "quality": { "min_row_count": 5 }, "region": { "low_frequency_threshold": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.quality.min_row_count, 5);
        assert!((config.quality.max_null_fraction - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.region.low_frequency_threshold, 5);
        assert_eq!(config.region.region_code, "SP");
    }

    #[test]
    fn test_versioned_outputs() {
        let paths = StagePaths::default();
        assert_eq!(
            paths.bronze_output(),
            PathBuf::from("data/silver/consumidor_gov_bronze_v1.csv")
        );
    }
}
