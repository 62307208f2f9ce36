//! Run configuration
//!
//! Defaults cover the common case; a versioned YAML file overrides any
//! section:
//!
//! ```rust,ignore
//! use codegraph_pdg::config::PdgConfig;
//!
//! let config = PdgConfig::default();
//! let config = PdgConfig::sequential();
//! let config = PdgConfig::from_yaml_file("pdg.yaml")?;
//! ```

pub mod error;
pub mod io;
pub mod pdg_config;

pub use error::{ConfigError, ConfigResult};
pub use io::ConfigFileV1;
pub use pdg_config::{AnalysisConfig, BatchConfig, ExportConfig, ExportFormat, PdgConfig};
