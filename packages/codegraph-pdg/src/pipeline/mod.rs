//! Pipeline orchestration

pub mod batch;
pub mod orchestrator;

pub use batch::{BatchAnalyzer, BatchEntry, BatchResult};
pub use orchestrator::{PdgPipeline, ProcedureAnalysis};
