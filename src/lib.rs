//! jatos-stim - per-participant stimulus accuracy from JATOS result exports
//!
//! Walks a JATOS results tree, keeps the trials that reference a stimulus,
//! and reduces them to one summary per participant: correct count, response
//! count, accuracy and mean reaction time. Summaries are left-joined with a
//! survey export on the study result id and written as tabular artifacts.
//!
//! ## Modules
//!
//! - **Ingest**: [`schema`] parses trial logs and the survey export
//! - **Aggregation**: [`filter`], [`summary`] and [`walker`] turn the tree into summaries
//! - **Output**: [`merge`], [`export`] and [`report`] join, write and describe the results

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod stats;
pub mod summary;
pub mod types;
pub mod walker;

pub use config::{CorrectnessSource, DuplicateKeyPolicy, FilterStrategy, PipelineConfig};
pub use error::AnalysisError;
pub use pipeline::{run_pipeline, Analysis, Artifacts, StimPipeline};
pub use report::{AnalysisReport, ReportStatistics};
pub use types::{MergedRecord, ParticipantSummary, SkipReason, SkippedFile, StimulusTrial};
pub use walker::{ResultTreeWalker, WalkOutcome};

/// Crate version recorded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
