//! YAML schema types

use super::pdg_config::{AnalysisConfig, BatchConfig, ExportConfig};
use serde::{Deserialize, Serialize};

/// YAML Schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileV1 {
    /// Schema version (always 1 for v1). Optional only so a missing field
    /// can be reported as such.
    #[serde(default)]
    pub version: Option<u32>,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub export: ExportConfig,
}
