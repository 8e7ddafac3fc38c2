//! Gold stage: region subset, city cleaning and business summaries.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::array::{ArrayRef, BooleanArray, Int64Array};
use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::algorithm::{
    Aggregator, CeilingCheck, GeoOutlierDetector, GeoOutlierReport, SummaryTable,
    city_frequencies,
};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::Loader;
use crate::utils::arrow::{bool_column, filter_record_batch, string_column, with_column};
use crate::utils::io::{versioned_path, write_delimited};
use crate::utils::logging::log_stage_banner;

/// Number of cities listed by the region verification
const TOP_CITIES: usize = 10;

/// Everything the gold stage derives from the silver table
#[derive(Debug, Clone)]
pub struct GoldArtifacts {
    /// The silver table with the region-clean flag
    pub full: RecordBatch,
    /// Clean region rows with the city ranking column
    pub curated: RecordBatch,
    /// Outlier detection over the region subset
    pub geo: GeoOutlierReport,
    /// Complaints per city
    pub city_ranking: Option<SummaryTable>,
    /// Complaints per age bracket
    pub age: Option<SummaryTable>,
    /// Target-entity complaints per age bracket
    pub entity_age: Option<RecordBatch>,
    /// Sectoral tables by output name
    pub sectors: Vec<(String, SummaryTable)>,
    /// Curated rows of the target entity
    pub entity_only: RecordBatch,
}

/// Summary of a gold run
#[derive(Debug, Clone)]
pub struct GoldReport {
    /// Rows in the region subset
    pub region_rows: usize,
    /// Distinct cities before cleaning
    pub cities_before: usize,
    /// Rows in the curated dataset
    pub curated_rows: usize,
    /// Distinct cities after cleaning
    pub cities_after: usize,
    /// Target-entity rows in the curated dataset
    pub entity_rows: usize,
    /// Ceiling comparison of the clean city count
    pub ceiling: CeilingCheck,
    /// Files written
    pub outputs: Vec<PathBuf>,
    /// Wall time of the run
    pub duration: Duration,
}

impl GoldReport {
    /// Log the final report
    pub fn log(&self) {
        log_stage_banner("GOLD REPORT");
        info!("Duration: {:?}", self.duration);
        info!("Region rows: {} -> {}", self.region_rows, self.curated_rows);
        info!("Cities: {} -> {}", self.cities_before, self.cities_after);
        info!("Target entity rows: {}", self.entity_rows);
        info!("Files written: {}", self.outputs.len());
    }
}

/// Region curation and reporting
#[derive(Debug, Clone)]
pub struct GoldStage {
    config: PipelineConfig,
    detector: GeoOutlierDetector,
    aggregator: Aggregator,
}

impl GoldStage {
    /// Build the stage and its components from the configuration
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            detector: GeoOutlierDetector::new(config.region.clone()),
            aggregator: Aggregator::new(config.sectors.clone(), config.entity.flag_column.clone()),
            config: config.clone(),
        }
    }

    fn region_mask(&self, batch: &RecordBatch) -> Result<Vec<bool>> {
        let region = &self.config.region;
        let Some(codes) = string_column(batch, &region.region_column)? else {
            warn!("Region column '{}' not found", region.region_column);
            return Ok(vec![false; batch.num_rows()]);
        };
        Ok(codes
            .iter()
            .map(|code| code.is_some_and(|c| c.trim() == region.region_code))
            .collect())
    }

    /// Log the region size, the raw city count and the most frequent cities
    fn verify_region(&self, region: &RecordBatch) -> Result<usize> {
        let config = &self.config.region;
        if region.num_rows() == 0 {
            warn!("No {} rows found", config.region_code);
            return Ok(0);
        }
        info!("{} rows: {}", config.region_code, region.num_rows());

        let Some(cities) = string_column(region, &config.city_column)? else {
            return Ok(0);
        };
        let frequencies = city_frequencies(&cities);
        let distinct = frequencies.len();
        if distinct > config.expected_city_ceiling {
            warn!(
                "{distinct} distinct cities (expected at most {}), excess {}",
                config.expected_city_ceiling,
                distinct - config.expected_city_ceiling
            );
        } else {
            info!(
                "{distinct} distinct cities (within {})",
                config.expected_city_ceiling
            );
        }
        info!("Top {TOP_CITIES} cities:");
        for (city, count) in frequencies.iter().take(TOP_CITIES) {
            info!("  {city}: {count}");
        }
        Ok(distinct)
    }

    fn with_ranking(&self, curated: &RecordBatch, ranking: Option<&SummaryTable>) -> Result<RecordBatch> {
        let Some(ranking) = ranking else {
            return Ok(curated.clone());
        };
        let Some(cities) = string_column(curated, &self.config.region.city_column)? else {
            return Ok(curated.clone());
        };
        let ranks = ranking.ranks();
        let column: Int64Array = cities
            .iter()
            .map(|city| city.and_then(|c| ranks.get(c).copied()))
            .collect();
        with_column(curated, &self.config.region.ranking_column, Arc::new(column) as ArrayRef)
    }

    /// Derive every gold artifact from the silver table
    pub fn curate(&self, silver: &RecordBatch) -> Result<(GoldArtifacts, usize)> {
        let mask = self.region_mask(silver)?;
        let region_filter: BooleanArray = mask.iter().map(|m| Some(*m)).collect();
        let region = filter_record_batch(silver, &region_filter)?;
        let cities_before = self.verify_region(&region)?;

        let geo = self.detector.detect(&region)?;

        // Region rows that survived cleaning, in full-table positions
        let mut suspicious = geo.suspicious.iter();
        let clean_flags: Vec<bool> = mask
            .iter()
            .map(|in_region| *in_region && !suspicious.next().copied().unwrap_or(false))
            .collect();
        let full = with_column(
            silver,
            &self.config.region.clean_flag_column,
            Arc::new(BooleanArray::from(clean_flags)) as ArrayRef,
        )?;

        let city_ranking = self
            .aggregator
            .summarize(&geo.clean, &self.config.region.city_column)?;
        let curated = self.with_ranking(&geo.clean, city_ranking.as_ref())?;
        if let Some(ranking) = &city_ranking {
            info!("Cities ranked: {}", ranking.len());
        }

        let sectors_config = &self.config.sectors;
        let age = self.aggregator.summarize(&curated, &sectors_config.age_column)?;
        if let Some(age) = &age {
            info!("Age brackets: {}", age.len());
            age.log_top(3);
        }
        let entity_age = self
            .aggregator
            .entity_counts(&curated, &sectors_config.age_column)?;

        let mut sectors = Vec::new();
        if let Some(table) = self.aggregator.summarize(&curated, &sectors_config.segment_column)? {
            sectors.push(("segments".to_string(), table));
        }
        if let Some(table) = self.aggregator.banking_comparison(&curated)? {
            sectors.push(("banking_comparison".to_string(), table));
        }
        if let Some(table) = self.aggregator.summarize(&curated, &sectors_config.problem_column)? {
            info!("Problem types: {}", table.len());
            sectors.push(("problems_general".to_string(), table));
        }

        let entity_mask: BooleanArray =
            bool_column(&curated, &self.config.entity.flag_column)?
                .unwrap_or_else(|| vec![false; curated.num_rows()])
                .into_iter()
                .map(Some)
                .collect();
        let entity_only = filter_record_batch(&curated, &entity_mask)?;

        Ok((
            GoldArtifacts {
                full,
                curated,
                geo,
                city_ranking,
                age,
                entity_age,
                sectors,
                entity_only,
            },
            cities_before,
        ))
    }

    /// Write every artifact with a versioned name; returns the written paths
    pub fn write_outputs(&self, artifacts: &GoldArtifacts) -> Result<Vec<PathBuf>> {
        let dir = &self.config.paths.gold_dir;
        let version = self.config.paths.gold_version;
        let delimiter = self.config.processing.output_delimiter;
        let prefix = self.config.region.region_code.to_lowercase();
        let path = |stem: &str| versioned_path(dir, &format!("{prefix}_{stem}"), version);

        let mut outputs = Vec::new();
        let mut write = |target: PathBuf, batch: &RecordBatch| -> Result<()> {
            write_delimited(&target, batch, delimiter)?;
            outputs.push(target);
            Ok(())
        };

        write(path("consumidor_completo"), &artifacts.curated)?;
        if let Some(ranking) = &artifacts.city_ranking {
            write(path("ranking_cidades"), &ranking.to_batch()?)?;
        }
        if let Some(age) = &artifacts.age {
            write(path("analise_etaria"), &age.to_batch()?)?;
        }
        if let Some(entity_age) = &artifacts.entity_age {
            write(path("analise_etaria_agibank"), entity_age)?;
        }
        for (name, table) in &artifacts.sectors {
            if !table.is_empty() {
                write(path(&format!("setorial_{name}")), &table.to_batch()?)?;
            }
        }
        if artifacts.entity_only.num_rows() > 0 {
            write(path("agibank_only"), &artifacts.entity_only)?;
        }

        Ok(outputs)
    }

    /// Load the silver output, curate it and write the gold outputs
    ///
    /// # Errors
    /// `NotFound` when the silver output is missing
    pub fn run(&self) -> Result<GoldReport> {
        let start = Instant::now();
        log_stage_banner("GOLD: curation");

        let silver = Loader::new().load(&self.config.paths.silver_output())?;
        let (artifacts, cities_before) = self.curate(&silver)?;
        let outputs = self.write_outputs(&artifacts)?;

        let entity_rows = artifacts.entity_only.num_rows();
        let report = GoldReport {
            region_rows: artifacts.geo.annotated.num_rows(),
            cities_before,
            curated_rows: artifacts.curated.num_rows(),
            cities_after: artifacts.geo.clean_city_count,
            entity_rows,
            ceiling: artifacts.geo.ceiling,
            outputs,
            duration: start.elapsed(),
        };
        report.log();
        Ok(report)
    }
}
