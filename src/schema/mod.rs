//! Input schemas
//!
//! This module defines the two tabular inputs of the pipeline: per-participant
//! trial logs (open-ended, file-dependent columns) and the survey export that
//! participant summaries are joined against.

mod survey;
mod trial;

pub use survey::*;
pub use trial::*;
