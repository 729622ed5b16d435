//! Ambient per-block pipeline configuration, bundling the parameter
//! structs each component defines. Serialisable
//! with `serde_yaml`, mirroring the scenario-file idiom used for other
//! YAML-configured pipeline stages in this codebase.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::cluster::ClusterConfig;
use crate::reader::filter::ReadFilterConfig;
use crate::recalibration::RecalibrationConfig;
use crate::variants::filter::VariantFilterConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[builder(default)]
pub struct PipelineConfig {
    pub read_filter: ReadFilterConfig,
    pub recalibration: RecalibrationConfig,
    pub cluster: ClusterConfig,
    pub variant_filter: VariantFilterConfig,
    pub min_variant_base_qual: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            read_filter: ReadFilterConfig::default(),
            recalibration: RecalibrationConfig::default(),
            cluster: ClusterConfig::default(),
            variant_filter: VariantFilterConfig::default(),
            min_variant_base_qual: 20,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(text: &str) -> crate::errors::Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| crate::errors::Error::InvalidFormat(format!("malformed pipeline config: {}", e)))
    }
}
