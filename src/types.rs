//! Core data types for voxsplit
//!
//! These types represent the domain model and flow through the job and export
//! pipelines.

use ndarray::{Array1, Array2, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Sample rate every waveform must have before it reaches the model
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

// =============================================================================
// Audio
// =============================================================================

/// Audio samples laid out as `[channel, time]`
#[derive(Debug, Clone)]
pub struct Waveform {
    /// Samples normalized to [-1.0, 1.0], axes `[channel, time]`
    pub samples: Array2<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Array2<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Build a single-channel waveform from mono samples
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(Array1::from_vec(samples).insert_axis(Axis(0)), sample_rate)
    }

    /// A mono waveform of silence, used for synthetic forward passes
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let len = (duration_secs * sample_rate as f64).round() as usize;
        Self::new(Array2::zeros((1, len)), sample_rate)
    }

    pub fn channels(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.samples.len_of(Axis(1))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        // Guard against division by zero - use 0 duration for invalid sample rate
        if self.sample_rate > 0 {
            self.len() as f64 / self.sample_rate as f64
        } else {
            0.0
        }
    }
}

/// Raw model output. Axis order is not trusted until normalized.
pub type SeparationOutput = ArrayD<f32>;

// =============================================================================
// Job results
// =============================================================================

/// One separated-audio file written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Position on the canonical source axis (0-based, model order)
    pub index: usize,
    /// Sample rate of the written audio
    pub sample_rate: u32,
    pub path: PathBuf,
}

/// Terminal outcome of one Job Service invocation
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Success {
        /// Written files, ordered by source index
        outputs: Vec<SourceFile>,
    },
    Failure {
        error: String,
    },
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    /// Number of sources written (0 on failure)
    pub fn num_sources(&self) -> usize {
        match self {
            JobResult::Success { outputs } => outputs.len(),
            JobResult::Failure { .. } => 0,
        }
    }
}

// =============================================================================
// Export artifacts
// =============================================================================

/// One axis of a tensor signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dim {
    /// Axis length fixed when the graph was frozen
    Fixed(i64),
    /// Axis length chosen at run time
    Dynamic(String),
}

impl Dim {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Dim::Dynamic(_))
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Fixed(n) => write!(f, "{}", n),
            Dim::Dynamic(name) => write!(f, "{}", name),
        }
    }
}

/// Name and axes of a graph input or output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorSignature {
    pub name: String,
    pub dims: Vec<Dim>,
}

impl TensorSignature {
    pub fn new(name: impl Into<String>, dims: Vec<Dim>) -> Self {
        Self {
            name: name.into(),
            dims,
        }
    }

    /// Signature from runtime dimensions, where negative lengths mark dynamic axes
    pub fn from_runtime_dims(name: impl Into<String>, dims: &[i64]) -> Self {
        let dims = dims
            .iter()
            .enumerate()
            .map(|(axis, &len)| {
                if len < 0 {
                    Dim::Dynamic(format!("dim_{}", axis))
                } else {
                    Dim::Fixed(len)
                }
            })
            .collect();
        Self::new(name, dims)
    }

    /// Axes declared dynamic by this signature
    pub fn dynamic_axes(&self) -> Vec<usize> {
        self.dims
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_dynamic())
            .map(|(i, _)| i)
            .collect()
    }
}

impl fmt::Display for TensorSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        write!(f, "{} [{}]", self.name, dims.join(", "))
    }
}

/// Input and output signatures of a frozen graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSignatures {
    pub inputs: Vec<TensorSignature>,
    pub outputs: Vec<TensorSignature>,
}

/// The portable graph file produced by the export stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportArtifact {
    pub path: PathBuf,
    /// Signature the export asked for
    pub declared: GraphSignatures,
    /// Signature read back from the written graph
    pub graph: GraphSignatures,
    /// Shape of the probe forward pass that validated the model
    pub probe_shape: Vec<usize>,
    pub exported_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let wf = Waveform::silence(2.0, MODEL_SAMPLE_RATE);
        assert_eq!(wf.channels(), 1);
        assert_eq!(wf.len(), 32_000);
        assert!((wf.duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_sample_rate_duration() {
        let wf = Waveform::mono(vec![0.0; 10], 0);
        assert_eq!(wf.duration(), 0.0);
    }

    #[test]
    fn test_signature_from_runtime_dims() {
        let sig = TensorSignature::from_runtime_dims("separated_audio", &[-1, 2, -1]);
        assert_eq!(sig.dynamic_axes(), vec![0, 2]);
        assert_eq!(sig.dims[1], Dim::Fixed(2));
        assert_eq!(sig.to_string(), "separated_audio [dim_0, 2, dim_2]");
    }

    #[test]
    fn test_job_result_counts() {
        let ok = JobResult::Success {
            outputs: vec![SourceFile {
                index: 0,
                sample_rate: MODEL_SAMPLE_RATE,
                path: PathBuf::from("out/source_0.wav"),
            }],
        };
        assert!(ok.is_success());
        assert_eq!(ok.num_sources(), 1);

        let err = JobResult::Failure {
            error: "boom".into(),
        };
        assert!(!err.is_success());
        assert_eq!(err.num_sources(), 0);
    }
}
