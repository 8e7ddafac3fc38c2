//! The three medallion stages
//!
//! Each stage reads the previous stage's persisted output, so stages can be
//! run individually or in sequence with [`run_all`].

pub mod bronze;
pub mod gold;
pub mod silver;

pub use bronze::{BronzeReport, BronzeStage, FileOutcome};
pub use gold::{GoldArtifacts, GoldReport, GoldStage};
pub use silver::{SilverReport, SilverStage};

use crate::config::PipelineConfig;
use crate::error::Result;

/// Reports of a full pipeline run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Bronze stage report
    pub bronze: BronzeReport,
    /// Silver stage report
    pub silver: SilverReport,
    /// Gold stage report
    pub gold: GoldReport,
}

/// Run bronze, silver and gold in order
///
/// # Errors
/// The first structural error of any stage
pub fn run_all(config: &PipelineConfig) -> Result<PipelineReport> {
    let bronze = BronzeStage::new(config).run()?;
    let silver = SilverStage::new(config).run()?;
    let gold = GoldStage::new(config).run()?;
    Ok(PipelineReport {
        bronze,
        silver,
        gold,
    })
}
