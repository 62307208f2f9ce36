//! PDG pipeline configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::io::ConfigFileV1;

const SUPPORTED_VERSIONS: [u32; 1] = [1];

/// Dataflow and dependence derivation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Name-matching fallback for uses the front end could not bind
    pub approximate_unresolved: bool,
    /// Run post-dominance and reaching definitions side by side
    pub parallel_dataflow: bool,
    /// Cap on fixpoint node evaluations, below the theoretical bound
    pub max_fixpoint_evaluations: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            approximate_unresolved: true,
            parallel_dataflow: true,
            max_fixpoint_evaluations: None,
        }
    }
}

impl AnalysisConfig {
    pub fn approximate_unresolved(mut self, enabled: bool) -> Self {
        self.approximate_unresolved = enabled;
        self
    }

    pub fn parallel_dataflow(mut self, enabled: bool) -> Self {
        self.parallel_dataflow = enabled;
        self
    }

    pub fn max_fixpoint_evaluations(mut self, cap: Option<usize>) -> Self {
        self.max_fixpoint_evaluations = cap;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Worker threads; `None` uses the global rayon pool
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Dot,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Dot => "dot",
            ExportFormat::Json => "json",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "dot" => Ok(Self::Dot),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// Keep nodes with no path from ENTRY in the output
    pub include_unreachable: bool,
    /// Prefix node labels with `"<line>: "`
    pub show_line_numbers: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Dot,
            include_unreachable: true,
            show_line_numbers: true,
        }
    }
}

impl ExportConfig {
    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn include_unreachable(mut self, include: bool) -> Self {
        self.include_unreachable = include;
        self
    }

    pub fn show_line_numbers(mut self, show: bool) -> Self {
        self.show_line_numbers = show;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdgConfig {
    pub analysis: AnalysisConfig,
    pub batch: BatchConfig,
    pub export: ExportConfig,
}

impl PdgConfig {
    /// Single-threaded everything, for reproducing a run step by step
    pub fn sequential() -> Self {
        Self {
            analysis: AnalysisConfig::default().parallel_dataflow(false),
            batch: BatchConfig { threads: Some(1) },
            export: ExportConfig::default(),
        }
    }

    pub fn analysis(mut self, f: impl FnOnce(AnalysisConfig) -> AnalysisConfig) -> Self {
        self.analysis = f(self.analysis);
        self
    }

    pub fn export(mut self, f: impl FnOnce(ExportConfig) -> ExportConfig) -> Self {
        self.export = f(self.export);
        self
    }

    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.batch.threads = threads;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch.threads == Some(0) {
            return Err(ConfigError::invalid(
                "batch.threads",
                0,
                "Use null for the rayon default.",
            ));
        }
        if self.analysis.max_fixpoint_evaluations == Some(0) {
            return Err(ConfigError::invalid(
                "analysis.max_fixpoint_evaluations",
                0,
                "A cap must allow at least one evaluation; use null for no cap.",
            ));
        }
        Ok(())
    }

    /// Parse a v1 YAML document
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        // Version check
        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            analysis: file.analysis,
            batch: file.batch,
            export: file.export,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from YAML file (v1 schema)
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serialize as a v1 YAML document
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let file = ConfigFileV1 {
            version: Some(1),
            analysis: self.analysis.clone(),
            batch: self.batch.clone(),
            export: self.export.clone(),
        };
        serde_yaml::to_string(&file).map_err(ConfigError::Yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PdgConfig::default();
        assert!(config.analysis.approximate_unresolved);
        assert!(config.analysis.parallel_dataflow);
        assert_eq!(config.batch.threads, None);
        assert_eq!(config.export.format, ExportFormat::Dot);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sequential_preset() {
        let config = PdgConfig::sequential();
        assert!(!config.analysis.parallel_dataflow);
        assert_eq!(config.batch.threads, Some(1));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = PdgConfig::from_yaml_str(
            r#"
version: 1
analysis:
  approximate_unresolved: false
export:
  format: json
"#,
        )
        .unwrap();
        assert!(!config.analysis.approximate_unresolved);
        assert!(config.analysis.parallel_dataflow);
        assert_eq!(config.export.format, ExportFormat::Json);
        assert!(config.export.show_line_numbers);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = PdgConfig::default()
            .analysis(|a| a.max_fixpoint_evaluations(Some(5000)))
            .export(|e| e.format(ExportFormat::Json).show_line_numbers(false));

        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("version: 1"));
        assert!(yaml.contains("max_fixpoint_evaluations: 5000"));
        assert_eq!(PdgConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_yaml_missing_version() {
        let result = PdgConfig::from_yaml_str("analysis:\n  parallel_dataflow: false\n");
        assert!(matches!(result, Err(ConfigError::MissingVersion)));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let result = PdgConfig::from_yaml_str("version: 2\n");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::UnsupportedVersion { found: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = PdgConfig::from_yaml_str("version: 1\nanalysis:\n  widen: true\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = PdgConfig::from_yaml_str("version: 1\nbatch:\n  threads: 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_yaml_loading_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"version: 1\nbatch:\n  threads: 4\n")
            .unwrap();

        let config = PdgConfig::from_yaml_file(temp_file.path()).unwrap();
        assert_eq!(config.batch.threads, Some(4));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = PdgConfig::from_yaml_file("/nonexistent/pdg.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
