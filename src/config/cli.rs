//! CLI argument parsing

use crate::separation::normalize::DEFAULT_SOURCE_COUNT;
use crate::separation::{ModelFamily, SourceAxis};
use clap::{Args, Parser};
use std::path::PathBuf;

/// Usage line reported in the JSON failure for malformed invocations
pub const JOB_USAGE: &str = "Usage: voxsplit <input_audio> <output_dir> [num_sources]";

/// Default location of the exported graph
pub const DEFAULT_ARTIFACT_PATH: &str = "models/sepformer/sepformer.onnx";

/// voxsplit - separate a multi-speaker recording into one file per speaker
///
/// Prints exactly one JSON line on stdout describing the result. Progress and
/// diagnostics go to stderr.
#[derive(Parser, Debug)]
#[command(name = "voxsplit")]
#[command(author, version, about, long_about = None)]
pub struct JobCli {
    /// Input audio file
    #[arg(value_name = "INPUT_AUDIO")]
    pub input: PathBuf,

    /// Directory to write source_<i>.wav files into (created if missing)
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Number of sources to keep
    #[arg(value_name = "NUM_SOURCES", default_value_t = DEFAULT_SOURCE_COUNT)]
    pub num_sources: usize,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// voxsplit-export - freeze the separation model into a portable ONNX graph
/// and smoke-test the result
#[derive(Parser, Debug)]
#[command(name = "voxsplit-export")]
#[command(author, version, about, long_about = None)]
pub struct ExportCli {
    /// Where to write the exported graph (overwritten on each run)
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_ARTIFACT_PATH)]
    pub output: PathBuf,

    /// Skip the export stage and only verify an existing artifact
    #[arg(long, default_value = "false")]
    pub verify_only: bool,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Model selection shared by both binaries
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path to the separation model
    #[arg(long = "model", value_name = "PATH", env = "VOXSPLIT_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// URL to download the model from when it is not found locally
    #[arg(long, value_name = "URL", env = "VOXSPLIT_MODEL_URL")]
    pub model_url: Option<String>,

    /// Expected SHA-256 of the downloaded model
    #[arg(long, value_name = "HEX", env = "VOXSPLIT_MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Model family (sepformer, onnx)
    #[arg(long, value_name = "FAMILY", default_value = "sepformer")]
    pub family: ModelFamily,

    /// Source axis to assume when both output axes have the source count (1 or 2)
    #[arg(long, value_name = "AXIS", default_value = "1")]
    pub ambiguous_axis: SourceAxis,
}

/// Diagnostic verbosity shared by both binaries
#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl LogArgs {
    /// Log filter directive based on verbosity flags
    pub fn filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
