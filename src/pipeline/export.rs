//! Graph export and verification
//!
//! Two independent stages:
//!
//! 1. **Export**: run the loaded model once on synthetic silence, check that
//!    its output can be normalized, then freeze it into a portable graph at a
//!    fixed artifact path.
//! 2. **Verify**: open the artifact in a fresh runtime, run the same synthetic
//!    pass and check the output has at least two sources.
//!
//! A failure in one stage does not undo the other, but verification is
//! skipped after a failed export. Neither stage retries.

use crate::error::{Result, VoxsplitError};
use crate::separation::{classify, Layout, ModelFamily, ModelLoader, ModelOpener, ShapePolicy};
use crate::types::{Dim, ExportArtifact, GraphSignatures, TensorSignature, Waveform, MODEL_SAMPLE_RATE};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Length of the synthetic probe waveform
pub const SYNTHETIC_SECONDS: f64 = 5.0;

/// Input tensor name declared for the exported graph
pub const EXPORT_INPUT_NAME: &str = "audio";

/// Output tensor name declared for the exported graph
pub const EXPORT_OUTPUT_NAME: &str = "separated_audio";

/// Silence used for the export and verification forward passes
pub fn synthetic_waveform() -> Waveform {
    Waveform::silence(SYNTHETIC_SECONDS, MODEL_SAMPLE_RATE)
}

/// Signatures the exported graph is asked to carry
///
/// Batch and time stay dynamic; the source axis is fixed at the model's
/// source count.
pub fn declared_signatures(policy: &ShapePolicy) -> GraphSignatures {
    let batch = || Dim::Dynamic("batch".to_string());
    let time = || Dim::Dynamic("time".to_string());

    GraphSignatures {
        inputs: vec![TensorSignature::new(EXPORT_INPUT_NAME, vec![batch(), time()])],
        outputs: vec![TensorSignature::new(
            EXPORT_OUTPUT_NAME,
            vec![batch(), Dim::Fixed(policy.source_count as i64), time()],
        )],
    }
}

/// `<artifact>.tmp` next to the artifact
fn temp_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("artifact"));
    name.push(".tmp");
    artifact.with_file_name(name)
}

/// Freeze the loaded model into a portable graph at `artifact`
///
/// Nothing is written when the probe pass fails or its output shape cannot be
/// classified. An existing artifact is replaced only once the new graph has
/// been written completely.
pub fn export_stage(
    loader: &ModelLoader,
    artifact: &Path,
    policy: &ShapePolicy,
) -> Result<ExportArtifact> {
    let model = loader.get()?;

    let probe = synthetic_waveform();
    info!(
        "Running probe pass ({:.1}s of silence, {} samples)",
        probe.duration(),
        probe.len()
    );
    let output = model.separate(&probe)?;
    let probe_shape = output.shape().to_vec();

    let layout = classify(&probe_shape, policy).map_err(|e| VoxsplitError::Export {
        reason: format!("probe output failed shape validation: {}", e),
    })?;
    debug!("Probe output {:?} classified as {:?}", probe_shape, layout);

    if let Some(parent) = artifact.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| VoxsplitError::output_error(parent, e))?;
        }
    }

    let declared = declared_signatures(policy);
    let tmp = temp_path(artifact);

    let graph = match model.export_graph(&tmp, &declared) {
        Ok(graph) => graph,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&tmp, artifact) {
        let _ = fs::remove_file(&tmp);
        return Err(VoxsplitError::output_error(artifact, e));
    }

    for sig in graph.inputs.iter().chain(graph.outputs.iter()) {
        debug!("Graph tensor: {}", sig);
    }
    info!("Exported graph to {}", artifact.display());

    Ok(ExportArtifact {
        path: artifact.to_path_buf(),
        declared,
        graph,
        probe_shape,
        exported_at: chrono::Utc::now(),
    })
}

/// Outcome of a successful verification pass
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    pub path: PathBuf,
    /// Input and output tensors declared by the artifact, when the runtime
    /// exposes them
    pub signatures: Option<GraphSignatures>,
    pub output_shape: Vec<usize>,
    /// Length of the classified source axis
    pub num_sources: usize,
    pub min: f32,
    pub max: f32,
}

/// Load the artifact in a fresh runtime and check its output
///
/// Passes when the probe output is rank 3 with at least two entries on
/// axis 1. The artifact is only read.
pub fn verify_stage(
    artifact: &Path,
    family: ModelFamily,
    policy: &ShapePolicy,
    open: &ModelOpener,
) -> Result<VerificationReport> {
    let failed = |reason: String| VoxsplitError::Verification {
        path: artifact.to_path_buf(),
        reason,
    };

    if !artifact.is_file() {
        return Err(failed("artifact does not exist".to_string()));
    }

    let model = open(artifact, family).map_err(|e| failed(e.to_string()))?;
    info!("Loaded {} for verification ({})", artifact.display(), model.name());

    let signatures = model.signatures();
    if let Some(sigs) = &signatures {
        for input in &sigs.inputs {
            info!("Model input: {}", input);
        }
        for output in &sigs.outputs {
            info!("Model output: {}", output);
        }
    }

    let output = model
        .separate(&synthetic_waveform())
        .map_err(|e| failed(e.to_string()))?;
    let shape = output.shape().to_vec();
    info!("Verification output shape: {:?}", shape);

    if shape.len() != 3 {
        return Err(failed(format!(
            "expected a rank-3 output, got shape {:?}",
            shape
        )));
    }
    if shape[1] < 2 {
        return Err(failed(format!(
            "expected at least 2 sources on axis 1, got shape {:?}",
            shape
        )));
    }
    if output.is_empty() {
        return Err(failed(format!("output {:?} holds no samples", shape)));
    }

    let num_sources = match classify(&shape, policy) {
        Ok(Layout::SourcesLast) => shape[2],
        Ok(_) => shape[1],
        Err(e) => {
            debug!("Verification output not classifiable ({}), reading axis 1", e);
            shape[1]
        }
    };

    let (min, max) = output
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        });

    if num_sources == 2 {
        info!("Model output is fixed at 2 sources");
    }
    if !min.is_finite() || !max.is_finite() {
        warn!("Verification output contains non-finite samples");
    }

    Ok(VerificationReport {
        path: artifact.to_path_buf(),
        signatures,
        output_shape: shape,
        num_sources,
        min,
        max,
    })
}

/// Results of one export tool invocation
///
/// `None` means the stage did not run.
#[derive(Debug)]
pub struct StageResults {
    pub export: Option<Result<ExportArtifact>>,
    pub verify: Option<Result<VerificationReport>>,
}

impl StageResults {
    pub fn passed(&self) -> usize {
        self.export.iter().filter(|r| r.is_ok()).count()
            + self.verify.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.export.iter().filter(|r| r.is_err()).count()
            + self.verify.iter().filter(|r| r.is_err()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Run export then verification, or verification alone
///
/// Verification is skipped when the export stage fails, so an older
/// artifact on disk is never reported as freshly verified.
pub fn run_stages(
    loader: &ModelLoader,
    artifact: &Path,
    policy: &ShapePolicy,
    verify_only: bool,
    open: &ModelOpener,
) -> StageResults {
    let export = if verify_only {
        None
    } else {
        info!("Stage 1/2: export");
        Some(export_stage(loader, artifact, policy))
    };

    if let Some(Err(e)) = &export {
        error!("Export failed: {}", e);
        warn!(
            "Skipping verification; {} was not replaced by this run",
            artifact.display()
        );
        return StageResults {
            export,
            verify: None,
        };
    }

    info!("Stage {}: verify", if verify_only { "1/1" } else { "2/2" });
    let verify = verify_stage(artifact, loader.config().family, policy, open);

    StageResults {
        export,
        verify: Some(verify),
    }
}
