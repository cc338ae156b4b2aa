//! voxsplit - Speaker separation as a one-shot job
//!
//! Takes a multi-speaker recording and writes one WAV file per speaker,
//! reporting the outcome as a single JSON line. A companion tool freezes the
//! separation model into a portable ONNX graph and smoke-tests the result.
//!
//! # Architecture
//!
//! - `config`: CLI argument parsing, runtime settings and logging setup
//! - `audio`: Decoding (symphonia), resampling to 16 kHz, WAV output (hound)
//! - `separation`: Model adapters, model loader and output shape normalizer
//! - `pipeline`: The job state machine and the export/verify stages
//! - `report`: JSON wire format of a job result
//!
//! # Example
//!
//! ```no_run
//! use voxsplit::config::Settings;
//! use voxsplit::pipeline::{Job, JobRequest};
//! use voxsplit::separation::ModelLoader;
//!
//! let settings = Settings::default();
//! let loader = ModelLoader::new(settings.model.clone());
//! let mut job = Job::new(&loader, settings.shape_policy);
//! let result = job.run(&JobRequest::from_settings(&settings));
//! println!("{}", voxsplit::report::to_line(&result).expect("serialize"));
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod separation;
pub mod types;

// Re-export key types at crate root
pub use error::{ErrorKind, Result, VoxsplitError};
pub use types::{JobResult, SourceFile, Waveform};
