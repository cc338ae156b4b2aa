//! One-shot separation job
//!
//! A job moves through `Idle -> Loading -> Running -> Terminated`. Each stage
//! returns a `Result`; the first error ends the job with a failure result.
//! Nothing here prints to stdout; the caller serializes the terminal result.

use crate::audio;
use crate::config::Settings;
use crate::error::{Result, VoxsplitError};
use crate::separation::{normalize, ModelLoader, SeparationModel, ShapePolicy};
use crate::types::{JobResult, SourceFile, MODEL_SAMPLE_RATE};
use ndarray::{Array3, Axis};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What to separate and where to put it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Upper bound on the number of files written
    pub num_sources: usize,
}

impl JobRequest {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            input: settings.input.clone(),
            output_dir: settings.output_dir.clone(),
            num_sources: settings.num_sources,
        }
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Loading,
    Running,
    Terminated(JobResult),
}

impl JobState {
    fn label(&self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Loading => "loading",
            JobState::Running => "running",
            JobState::Terminated(r) if r.is_success() => "terminated(success)",
            JobState::Terminated(_) => "terminated(failure)",
        }
    }
}

/// Drives one request through the job state machine
pub struct Job<'a> {
    loader: &'a ModelLoader,
    policy: ShapePolicy,
    state: JobState,
}

impl<'a> Job<'a> {
    pub fn new(loader: &'a ModelLoader, policy: ShapePolicy) -> Self {
        Self {
            loader,
            policy,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    /// Run the request to completion and return the terminal result
    ///
    /// A job runs once; calling this again returns the existing result.
    pub fn run(&mut self, request: &JobRequest) -> JobResult {
        if let JobState::Terminated(result) = &self.state {
            return result.clone();
        }

        let result = match self.execute(request) {
            Ok(outputs) => JobResult::Success { outputs },
            Err(e) => {
                debug!("Job failed ({:?}): {}", e.kind(), e);
                JobResult::Failure {
                    error: e.to_string(),
                }
            }
        };

        self.transition(JobState::Terminated(result.clone()));
        result
    }

    fn execute(&mut self, request: &JobRequest) -> Result<Vec<SourceFile>> {
        check_input(&request.input)?;

        let loader = self.loader;
        self.transition(JobState::Loading);
        let model = loader.get()?;

        self.transition(JobState::Running);
        separate_to_files(model, request, &self.policy)
    }

    fn transition(&mut self, next: JobState) {
        debug!("Job state: {} -> {}", self.state.label(), next.label());
        self.state = next;
    }
}

/// Fail before the model is loaded when the input cannot be read
fn check_input(input: &Path) -> Result<()> {
    if input.is_file() {
        return Ok(());
    }
    Err(VoxsplitError::Io(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("Input file not found: {}", input.display()),
    )))
}

/// Decode, separate, normalize and write one file per kept source
pub fn separate_to_files(
    model: &dyn SeparationModel,
    request: &JobRequest,
    policy: &ShapePolicy,
) -> Result<Vec<SourceFile>> {
    let waveform = audio::load_for_model(&request.input)?;
    debug!(
        "Prepared {:.2}s of audio ({} samples at {} Hz)",
        waveform.duration(),
        waveform.len(),
        waveform.sample_rate
    );

    let raw = model.separate(&waveform)?;
    info!("Separated output shape: {:?}", raw.shape());

    let sources = normalize(raw, request.num_sources, policy)?;
    write_sources(&sources, &request.output_dir)
}

/// Write `[batch, source, time]` audio as `source_<i>.wav` files
///
/// Only the first batch entry is written; a job carries a single recording.
pub fn write_sources(sources: &Array3<f32>, output_dir: &Path) -> Result<Vec<SourceFile>> {
    if sources.len_of(Axis(0)) == 0 {
        return Err(VoxsplitError::shape(sources.shape(), "empty batch axis"));
    }
    let first = sources.index_axis(Axis(0), 0);

    fs::create_dir_all(output_dir).map_err(|e| VoxsplitError::output_error(output_dir, e))?;

    let mut written = Vec::with_capacity(first.len_of(Axis(0)));
    for (index, channel) in first.axis_iter(Axis(0)).enumerate() {
        let path = output_dir.join(source_filename(index));
        audio::write_mono_wav(&path, channel, MODEL_SAMPLE_RATE)?;
        info!("Saved source {} to {}", index, path.display());
        written.push(SourceFile {
            index,
            sample_rate: MODEL_SAMPLE_RATE,
            path,
        });
    }

    Ok(written)
}

pub fn source_filename(index: usize) -> String {
    format!("source_{}.wav", index)
}
