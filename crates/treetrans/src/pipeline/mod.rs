//! The per-job translation loop: walk the input tree once, translate the
//! eligible files, copy everything else, and never let one file sink the run.

pub mod config;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use progress::{FileError, NoopProgress, PipelineProgress, ProgressReporter};
pub use runner::{Pipeline, PipelineResult};
