//! Separation model abstraction
//!
//! Every supported model family implements `SeparationModel`. The family is
//! chosen by configuration, so calling code never inspects a model to find
//! out how to call it.

use crate::error::{Result, VoxsplitError};
use crate::types::{GraphSignatures, SeparationOutput, Waveform};
use std::path::Path;

/// Speaker separation backend
pub trait SeparationModel: Send + Sync {
    /// Run the model on a mono 16 kHz waveform
    ///
    /// # Returns
    /// The raw output tensor. Its axis order is not canonical; pass it
    /// through [`crate::separation::normalize`] before use.
    fn separate(&self, waveform: &Waveform) -> Result<SeparationOutput>;

    /// Get the name of this model (for logging)
    fn name(&self) -> &'static str;

    /// Input and output signatures of the underlying graph, if it has one
    fn signatures(&self) -> Option<GraphSignatures> {
        None
    }

    /// Freeze the model into a portable graph file at `dest`
    ///
    /// `declared` names the tensors and the axes that should stay dynamic.
    /// Returns the signatures actually present in the written graph.
    fn export_graph(&self, dest: &Path, declared: &GraphSignatures) -> Result<GraphSignatures> {
        let _ = (dest, declared);
        Err(VoxsplitError::Export {
            reason: format!("model '{}' does not support graph export", self.name()),
        })
    }
}
