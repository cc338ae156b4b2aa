//! Runtime configuration settings

use super::cli::{ExportCli, JobCli, ModelArgs, DEFAULT_ARTIFACT_PATH};
use crate::separation::normalize::DEFAULT_SOURCE_COUNT;
use crate::separation::{ModelConfig, ShapePolicy};
use std::path::PathBuf;

/// Runtime settings for one separation job
#[derive(Debug, Clone)]
pub struct Settings {
    /// Input audio file
    pub input: PathBuf,
    /// Directory receiving source_<i>.wav files
    pub output_dir: PathBuf,
    /// Requested number of sources
    pub num_sources: usize,
    /// Where to find the model
    pub model: ModelConfig,
    /// How raw model output is classified
    pub shape_policy: ShapePolicy,
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_cli(cli: &JobCli) -> Self {
        Self {
            input: cli.input.clone(),
            output_dir: cli.output_dir.clone(),
            num_sources: cli.num_sources,
            model: model_config(&cli.model),
            shape_policy: shape_policy(&cli.model),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.wav"),
            output_dir: PathBuf::from("./separated"),
            num_sources: DEFAULT_SOURCE_COUNT,
            model: ModelConfig::default(),
            shape_policy: ShapePolicy::default(),
        }
    }
}

/// Runtime settings for the export tool
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Artifact destination
    pub artifact: PathBuf,
    /// Only run the verification stage
    pub verify_only: bool,
    pub model: ModelConfig,
    pub shape_policy: ShapePolicy,
}

impl ExportSettings {
    pub fn from_cli(cli: &ExportCli) -> Self {
        Self {
            artifact: cli.output.clone(),
            verify_only: cli.verify_only,
            model: model_config(&cli.model),
            shape_policy: shape_policy(&cli.model),
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            artifact: PathBuf::from(DEFAULT_ARTIFACT_PATH),
            verify_only: false,
            model: ModelConfig::default(),
            shape_policy: ShapePolicy::default(),
        }
    }
}

fn model_config(args: &ModelArgs) -> ModelConfig {
    ModelConfig {
        family: args.family,
        path: args.model_path.clone(),
        url: args.model_url.clone(),
        sha256: args.model_sha256.clone(),
        ..ModelConfig::default()
    }
}

fn shape_policy(args: &ModelArgs) -> ShapePolicy {
    ShapePolicy {
        ambiguous: args.ambiguous_axis,
        ..ShapePolicy::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separation::{ModelFamily, SourceAxis};
    use clap::Parser;

    #[test]
    fn test_settings_from_cli() {
        let cli = JobCli::try_parse_from([
            "voxsplit",
            "mix.flac",
            "out",
            "3",
            "--model",
            "/tmp/sep.onnx",
            "--ambiguous-axis",
            "2",
        ])
        .unwrap();
        let settings = Settings::from_cli(&cli);

        assert_eq!(settings.input, PathBuf::from("mix.flac"));
        assert_eq!(settings.num_sources, 3);
        assert_eq!(settings.model.path, Some(PathBuf::from("/tmp/sep.onnx")));
        assert_eq!(settings.model.family, ModelFamily::Sepformer);
        assert_eq!(settings.shape_policy.ambiguous, SourceAxis::Axis2);
        assert_eq!(settings.shape_policy.source_count, DEFAULT_SOURCE_COUNT);
    }

    #[test]
    fn test_export_settings_from_cli() {
        let cli = ExportCli::try_parse_from([
            "voxsplit-export",
            "--output",
            "build/sep.onnx",
            "--verify-only",
        ])
        .unwrap();
        let settings = ExportSettings::from_cli(&cli);

        assert_eq!(settings.artifact, PathBuf::from("build/sep.onnx"));
        assert!(settings.verify_only);
        assert_eq!(settings.model.filename, "sepformer.onnx");
    }
}
