//! Analysis configuration.
//!
//! Settings come from an optional TOML file with `[analysis]`, `[graph]` and
//! `[annotation]` tables. Every key has a built-in default, and command-line
//! flags override whatever the file sets.
//!
//! ```toml
//! [analysis]
//! resolution = [0.5, 0.5, 2.0]   # X, Y, Z; or a single number
//! prune_length = 5.0
//! filter_length = 10.0
//!
//! [graph]
//! graph_type = "Branches"
//! delimiter = "Tab"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::prep::AnnotationType;
use crate::annotation::tree::TreeKeys;
use crate::features::GraphType;
use crate::graph_io::AttributeKey;
use crate::volume::Resolution;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Resolution must be positive, got {0:?}")]
    InvalidResolution(Vec<f64>),

    #[error("Resolution needs 1, 2 or 3 values, got {0}")]
    ResolutionArity(usize),

    #[error("Image dimensions must be 2 or 3, got {0}")]
    InvalidDimensions(u8),

    #[error("Invalid CSV delimiter '{0}'")]
    InvalidDelimiter(String),

    #[error("{0} annotations need {1}")]
    MissingAnnotationInput(&'static str, &'static str),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        crate::error::Error::Config(err.to_string())
    }
}

/// Voxel spacing as given by the user: one value, `[X, Y]` or `[X, Y, Z]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolutionSetting {
    Isotropic(f64),
    Axes(Vec<f64>),
}

impl Default for ResolutionSetting {
    fn default() -> Self {
        ResolutionSetting::Isotropic(1.0)
    }
}

impl ResolutionSetting {
    fn values(&self) -> Vec<f64> {
        match self {
            ResolutionSetting::Isotropic(r) => vec![*r],
            ResolutionSetting::Axes(v) => v.clone(),
        }
    }

    /// Internal `[z, y, x]` spacing. Planar data takes the smaller in-plane
    /// spacing for z so that it never becomes the minimum.
    pub fn resolve(&self) -> Result<Resolution, ConfigError> {
        let v = self.values();
        if v.iter().any(|&r| !(r > 0.0)) {
            return Err(ConfigError::InvalidResolution(v));
        }
        match v.as_slice() {
            [r] => Ok(Resolution::isotropic(*r)),
            [x, y] => Ok(Resolution::from_xyz([*x, *y, x.min(*y)])),
            [x, y, z] => Ok(Resolution::from_xyz([*x, *y, *z])),
            _ => Err(ConfigError::ResolutionArity(v.len())),
        }
    }
}

fn default_prune_length() -> f64 {
    5.0
}

fn default_filter_length() -> f64 {
    10.0
}

fn default_image_dimensions() -> u8 {
    3
}

fn default_results_folder() -> PathBuf {
    PathBuf::from("VesselVio Results")
}

fn default_true() -> bool {
    true
}

fn default_delimiter() -> String {
    ";".to_string()
}

/// `[analysis]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default = "default_results_folder")]
    pub results_folder: PathBuf,

    #[serde(default)]
    pub resolution: ResolutionSetting,

    /// End segments shorter than this are removed. 0 disables pruning.
    #[serde(default = "default_prune_length")]
    pub prune_length: f64,

    /// Isolated segments shorter than this are removed. 0 disables filtering.
    #[serde(default = "default_filter_length")]
    pub filter_length: f64,

    #[serde(default = "default_image_dimensions")]
    pub image_dimensions: u8,

    #[serde(default)]
    pub save_segment_results: bool,

    /// Export each analysed graph as GraphML.
    #[serde(default)]
    pub save_graph: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            results_folder: default_results_folder(),
            resolution: ResolutionSetting::default(),
            prune_length: default_prune_length(),
            filter_length: default_filter_length(),
            image_dimensions: default_image_dimensions(),
            save_segment_results: false,
            save_graph: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GraphFormat {
    #[default]
    #[serde(alias = "graphml")]
    GraphMl,
    #[serde(alias = "csv")]
    Csv,
}

/// `[graph]`, used when analysing pre-built graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphOptions {
    #[serde(default)]
    pub format: GraphFormat,

    #[serde(default)]
    pub graph_type: GraphType,

    #[serde(default = "default_true")]
    pub clique_filtering: bool,

    #[serde(default = "default_true")]
    pub smoothing: bool,

    /// A single character, or `Space` / `Tab`.
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    #[serde(default)]
    pub attribute_key: AttributeKey,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            format: GraphFormat::default(),
            graph_type: GraphType::default(),
            clique_filtering: true,
            smoothing: true,
            delimiter: default_delimiter(),
            attribute_key: AttributeKey::default(),
        }
    }
}

impl GraphOptions {
    pub fn delimiter_byte(&self) -> Result<u8, ConfigError> {
        match self.delimiter.as_str() {
            "Space" | "space" => Ok(b' '),
            "Tab" | "tab" | "\t" => Ok(b'\t'),
            d if d.len() == 1 => Ok(d.as_bytes()[0]),
            d => Err(ConfigError::InvalidDelimiter(d.to_string())),
        }
    }
}

/// `[annotation]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnnotationOptions {
    #[serde(default)]
    pub annotation_type: AnnotationType,

    /// ID annotation volumes or RGB slice folders. One entry is shared by
    /// every dataset; otherwise they pair up with the datasets in order.
    #[serde(default)]
    pub annotation_files: Vec<PathBuf>,

    /// An annotation tree (JSON ontology) or a saved annotation file.
    #[serde(default)]
    pub atlas: Option<PathBuf>,

    /// Region names to resolve against the tree. Ignored for saved
    /// annotation files.
    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default)]
    pub tree_keys: TreeKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub analysis: AnalysisOptions,
    #[serde(default)]
    pub graph: GraphOptions,
    #[serde(default)]
    pub annotation: AnnotationOptions,
}

impl AnalysisConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| ConfigError::Read(p.to_path_buf(), e))?;
                Self::from_toml(&text)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn resolution(&self) -> Result<Resolution, ConfigError> {
        self.analysis.resolution.resolve()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.resolution()?;
        let dims = self.analysis.image_dimensions;
        if dims != 2 && dims != 3 {
            return Err(ConfigError::InvalidDimensions(dims));
        }
        self.graph.delimiter_byte()?;

        let label = match self.annotation.annotation_type {
            AnnotationType::None => return Ok(()),
            AnnotationType::Id => "ID",
            AnnotationType::Rgb => "RGB",
        };
        if self.annotation.annotation_files.is_empty() {
            return Err(ConfigError::MissingAnnotationInput(label, "an annotation file"));
        }
        if self.annotation.atlas.is_none() {
            return Err(ConfigError::MissingAnnotationInput(label, "an annotation atlas"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::from_toml("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.analysis.prune_length, 5.0);
        assert_eq!(config.analysis.filter_length, 10.0);
        assert_eq!(config.graph.graph_type, GraphType::Centerlines);
        assert!(config.graph.clique_filtering);
        assert_eq!(config.graph.delimiter_byte().unwrap(), b';');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_and_resolution_order() {
        let config = AnalysisConfig::from_toml(
            r#"
            [analysis]
            resolution = [0.5, 1.0, 2.0]
            image_dimensions = 3

            [graph]
            graph_type = "Branches"
            delimiter = "Tab"

            [graph.attribute_key]
            x = "pos_x"
            "#,
        )
        .unwrap();
        assert_eq!(config.resolution().unwrap(), Resolution([2.0, 1.0, 0.5]));
        assert_eq!(config.graph.graph_type, GraphType::Branches);
        assert_eq!(config.graph.delimiter_byte().unwrap(), b'\t');
        assert_eq!(config.graph.attribute_key.x, "pos_x");
        assert_eq!(config.graph.attribute_key.y, "Y");
        assert_eq!(config.analysis.prune_length, 5.0);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AnalysisConfig::default();
        config.analysis.resolution = ResolutionSetting::Isotropic(0.0);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidResolution(_))));

        let mut config = AnalysisConfig::default();
        config.analysis.image_dimensions = 4;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidDimensions(4))));

        let mut config = AnalysisConfig::default();
        config.annotation.annotation_type = AnnotationType::Rgb;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingAnnotationInput("RGB", _))
        ));
    }

    #[test]
    fn test_planar_resolution() {
        let setting = ResolutionSetting::Axes(vec![2.0, 3.0]);
        assert_eq!(setting.resolve().unwrap(), Resolution([2.0, 3.0, 2.0]));
    }
}
