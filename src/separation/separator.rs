//! ONNX Runtime based speaker separator
//!
//! Runs an exported separation graph (SepFormer or any single-input waveform
//! graph) through `ort`. Also implements graph export by re-serializing the
//! optimized source graph.

use super::model::ModelFamily;
use super::traits::SeparationModel;
use crate::error::{Result, VoxsplitError};
use crate::types::{GraphSignatures, SeparationOutput, TensorSignature, Waveform};
use ndarray::{ArrayD, IxDyn};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// ONNX Runtime separator for one model family
pub struct OrtSeparator {
    /// Path the graph was loaded from
    model_path: PathBuf,
    family: ModelFamily,
    /// ORT session (wrapped in Mutex for interior mutability)
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OrtSeparator {
    /// Load a graph and bind its input and output for the given family
    pub fn load(model_path: &Path, family: ModelFamily) -> Result<Self> {
        let session = Self::create_session(model_path)?;

        let input_name = resolve_name(
            family.input_name(),
            session.inputs.iter().map(|i| i.name.as_str()),
            "input",
        )?;
        let output_name = resolve_name(
            family.output_name(),
            session.outputs.iter().map(|o| o.name.as_str()),
            "output",
        )?;

        info!(
            "Separator ready ({} family): {} -> {}, model: {}",
            family,
            input_name,
            output_name,
            model_path.display()
        );

        Ok(Self {
            model_path: model_path.to_path_buf(),
            family,
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }

    /// Create an ORT session on the CPU execution provider
    fn create_session(model_path: &Path) -> Result<Session> {
        Session::builder()
            .map_err(|e| VoxsplitError::Load {
                reason: format!("Failed to create ORT session builder: {}", e),
            })?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| VoxsplitError::Load {
                reason: format!("Failed to configure CPU provider: {}", e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| VoxsplitError::Load {
                reason: format!("Failed to load model '{}': {}", model_path.display(), e),
            })
    }
}

/// Pick the configured tensor name, or the first declared one
fn resolve_name<'a>(
    wanted: Option<&str>,
    mut declared: impl Iterator<Item = &'a str>,
    what: &str,
) -> Result<String> {
    match wanted {
        Some(name) => {
            let names: Vec<&str> = declared.collect();
            if names.contains(&name) {
                Ok(name.to_string())
            } else {
                Err(VoxsplitError::Load {
                    reason: format!(
                        "Model has no {} named '{}' (declared: {:?})\n  Tip: Use --family onnx for graphs with other tensor names",
                        what, name, names
                    ),
                })
            }
        }
        None => declared.next().map(str::to_string).ok_or_else(|| VoxsplitError::Load {
            reason: format!("Model has no {} tensors defined", what),
        }),
    }
}

/// Read input/output names and dimensions from a session
fn session_signatures(session: &Session) -> GraphSignatures {
    let inputs = session
        .inputs
        .iter()
        .map(|i| {
            let dims: Vec<i64> = i
                .input_type
                .tensor_shape()
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            TensorSignature::from_runtime_dims(i.name.as_str(), &dims)
        })
        .collect();
    let outputs = session
        .outputs
        .iter()
        .map(|o| {
            let dims: Vec<i64> = o
                .output_type
                .tensor_shape()
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();
            TensorSignature::from_runtime_dims(o.name.as_str(), &dims)
        })
        .collect();

    GraphSignatures { inputs, outputs }
}

impl SeparationModel for OrtSeparator {
    fn separate(&self, waveform: &Waveform) -> Result<SeparationOutput> {
        let mut session = self.session.lock().map_err(|_| VoxsplitError::Inference {
            reason: "Failed to acquire session lock".to_string(),
        })?;

        // Input tensor: shape (batch=1, time). The waveform is mono, so its
        // channel axis doubles as the batch axis.
        let input_tensor =
            Tensor::from_array(waveform.samples.clone()).map_err(|e| VoxsplitError::Inference {
                reason: format!("Failed to create input tensor: {}", e),
            })?;

        debug!(
            "Running {} on {} samples",
            self.model_path.display(),
            waveform.len()
        );

        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];
        let outputs = session.run(inputs).map_err(|e| VoxsplitError::Inference {
            reason: format!("Inference failed: {}", e),
        })?;

        let output = outputs
            .iter()
            .find(|(name, _)| *name == self.output_name.as_str())
            .map(|(_, v)| v)
            .ok_or_else(|| VoxsplitError::Inference {
                reason: format!("No output tensor named '{}'", self.output_name),
            })?;

        let (output_shape, output_data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| VoxsplitError::Inference {
                    reason: format!("Failed to extract output tensor: {}", e),
                })?;

        let raw_shape: Vec<i64> = output_shape.iter().copied().collect();

        // Negative dimensions would wrap to huge values when cast to usize
        if raw_shape.iter().any(|&d| d < 0) {
            return Err(VoxsplitError::Shape {
                shape: Vec::new(),
                reason: format!("invalid negative dimension in output shape {:?}", raw_shape),
            });
        }
        let shape: Vec<usize> = raw_shape.iter().map(|&d| d as usize).collect();

        let expected_len = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| VoxsplitError::shape(&shape, "shape would overflow memory calculation"))?;

        if output_data.len() != expected_len {
            return Err(VoxsplitError::shape(
                &shape,
                format!(
                    "output buffer length {} doesn't match shape (expected {})",
                    output_data.len(),
                    expected_len
                ),
            ));
        }

        // ONNX tensors are row-major, matching ndarray's standard layout
        ArrayD::from_shape_vec(IxDyn(&shape), output_data.to_vec())
            .map_err(|e| VoxsplitError::shape(&shape, e.to_string()))
    }

    fn signatures(&self) -> Option<GraphSignatures> {
        self.session.lock().ok().map(|session| session_signatures(&session))
    }

    fn name(&self) -> &'static str {
        match self.family {
            ModelFamily::Sepformer => "sepformer-ort",
            ModelFamily::Onnx => "onnx-ort",
        }
    }

    fn export_graph(&self, dest: &Path, declared: &GraphSignatures) -> Result<GraphSignatures> {
        info!(
            "Freezing {} into {}",
            self.model_path.display(),
            dest.display()
        );

        let frozen = Session::builder()
            .map_err(|e| VoxsplitError::Export {
                reason: format!("Failed to create ORT session builder: {}", e),
            })?
            .with_optimization_level(export_optimization_level())
            .map_err(|e| VoxsplitError::Export {
                reason: format!("Failed to set optimization level: {}", e),
            })?
            .with_optimized_model_path(dest.to_string_lossy().into_owned())
            .map_err(|e| VoxsplitError::Export {
                reason: format!("Failed to set output path: {}", e),
            })?
            .commit_from_file(&self.model_path)
            .map_err(|e| VoxsplitError::Export {
                reason: format!("Runtime rejected the model: {}", e),
            })?;

        let graph = session_signatures(&frozen);
        warn_on_signature_drift(declared, &graph);
        Ok(graph)
    }
}

/// Optimization level used when freezing a graph
///
/// Basic rewrites only. Extended and layout levels emit fused or
/// provider-specific nodes that tie the file to the exporting machine.
fn export_optimization_level() -> GraphOptimizationLevel {
    GraphOptimizationLevel::Level1
}

/// Log declared names or dynamic axes the frozen graph does not honour
fn warn_on_signature_drift(declared: &GraphSignatures, graph: &GraphSignatures) {
    let pairs = declared
        .inputs
        .iter()
        .zip(graph.inputs.iter())
        .chain(declared.outputs.iter().zip(graph.outputs.iter()));

    for (want, got) in pairs {
        if want.name != got.name {
            warn!("Graph tensor '{}' was declared as '{}'", got.name, want.name);
        }
        for axis in want.dynamic_axes() {
            if got.dims.get(axis).is_some_and(|d| !d.is_dynamic()) {
                warn!(
                    "Axis {} of '{}' was declared dynamic but is fixed in the graph ({})",
                    axis, got.name, got
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dim;

    #[test]
    fn test_resolve_configured_name() {
        let names = ["audio", "lengths"];
        let name = resolve_name(Some("audio"), names.iter().copied(), "input").unwrap();
        assert_eq!(name, "audio");
    }

    #[test]
    fn test_resolve_missing_configured_name() {
        let names = ["mix"];
        let err = resolve_name(Some("audio"), names.iter().copied(), "input").unwrap_err();
        assert!(err.to_string().contains("--family onnx"));
    }

    #[test]
    fn test_resolve_first_declared() {
        let names = ["mix", "other"];
        let name = resolve_name(None, names.iter().copied(), "input").unwrap();
        assert_eq!(name, "mix");

        let empty: [&str; 0] = [];
        assert!(resolve_name(None, empty.iter().copied(), "output").is_err());
    }

    #[test]
    fn test_load_missing_model_is_load_error() {
        let err = OrtSeparator::load(Path::new("/nonexistent/sepformer.onnx"), ModelFamily::Sepformer)
            .err()
            .unwrap();
        assert!(matches!(err, VoxsplitError::Load { .. }));
    }

    #[test]
    fn test_export_uses_portable_optimization_level() {
        assert!(matches!(
            export_optimization_level(),
            GraphOptimizationLevel::Level1
        ));
    }

    #[test]
    fn test_signature_drift_does_not_panic() {
        let declared = GraphSignatures {
            inputs: vec![TensorSignature::new(
                "audio",
                vec![Dim::Dynamic("batch".into()), Dim::Dynamic("time".into())],
            )],
            outputs: vec![],
        };
        let graph = GraphSignatures {
            inputs: vec![TensorSignature::from_runtime_dims("mix", &[1, 80_000])],
            outputs: vec![],
        };
        warn_on_signature_drift(&declared, &graph);
    }
}
