//! Unified error types for voxsplit
//!
//! Error strategy:
//! - Job Service: every error is caught once at the top level and turned into
//!   a single failure result line plus a non-zero exit code
//! - Export pipeline: each stage reports its own failure and aborts only itself
//!
//! Nothing is retried. Model loads, shape mismatches and export failures are
//! deterministic for the same inputs.

use std::path::PathBuf;
use thiserror::Error;

/// Supported input formats for helpful error messages
pub const SUPPORTED_FORMATS: &str = "WAV, FLAC, MP3, OGG/Vorbis, AIFF";

/// Top-level error type for voxsplit operations
#[derive(Debug, Error)]
pub enum VoxsplitError {
    // =========================================================================
    // Model resolution and loading
    // =========================================================================
    #[error("Failed to load separation model: {reason}")]
    Load { reason: String },

    #[error("Model inference failed: {reason}\n  Tip: This may indicate insufficient memory or an incompatible model file")]
    Inference { reason: String },

    // =========================================================================
    // Output tensor shape
    // =========================================================================
    #[error("Unexpected separation output shape {shape:?}: {reason}")]
    Shape { shape: Vec<usize>, reason: String },

    // =========================================================================
    // Audio I/O
    // =========================================================================
    #[error("Failed to decode audio file '{path}': {reason}\n  Supported formats: {SUPPORTED_FORMATS}")]
    Decode { path: PathBuf, reason: String },

    #[error("Cannot write output to '{path}': {reason}\n  Tip: Check write permissions for the output directory")]
    Output { path: PathBuf, reason: String },

    // =========================================================================
    // Export pipeline
    // =========================================================================
    #[error("Graph export failed: {reason}")]
    Export { reason: String },

    #[error("Exported artifact '{path}' failed verification: {reason}")]
    Verification { path: PathBuf, reason: String },

    // =========================================================================
    // Invocation
    // =========================================================================
    #[error("{0}")]
    Usage(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for voxsplit operations
pub type Result<T> = std::result::Result<T, VoxsplitError>;

/// Coarse error taxonomy reported to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Load,
    Shape,
    Io,
    Export,
    Verification,
    Usage,
}

impl VoxsplitError {
    /// Classify this error into the operator-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            VoxsplitError::Load { .. } | VoxsplitError::Inference { .. } => ErrorKind::Load,
            VoxsplitError::Shape { .. } => ErrorKind::Shape,
            VoxsplitError::Decode { .. } | VoxsplitError::Output { .. } | VoxsplitError::Io(_) => {
                ErrorKind::Io
            }
            VoxsplitError::Export { .. } => ErrorKind::Export,
            VoxsplitError::Verification { .. } => ErrorKind::Verification,
            VoxsplitError::Usage(_) | VoxsplitError::Config(_) => ErrorKind::Usage,
        }
    }

    /// Create a shape error for the given tensor dimensions
    pub fn shape(shape: &[usize], reason: impl Into<String>) -> Self {
        VoxsplitError::Shape {
            shape: shape.to_vec(),
            reason: reason.into(),
        }
    }

    /// Create a decode error with context about the issue
    pub fn decode_error(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        VoxsplitError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an output error, checking for common issues
    pub fn output_error(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let reason = match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                format!("Permission denied. Check that you have write access to {}", path.display())
            }
            std::io::ErrorKind::NotFound => {
                format!("Directory does not exist: {}", path.parent().map(|p| p.display().to_string()).unwrap_or_default())
            }
            _ => err.to_string(),
        };
        VoxsplitError::Output { path, reason }
    }

    /// Create a load error for a model file that could not be found anywhere
    pub fn model_not_found(checked_locations: &[String]) -> Self {
        let locations_list = checked_locations
            .iter()
            .map(|loc| format!("  - {}", loc))
            .collect::<Vec<_>>()
            .join("\n");

        VoxsplitError::Load {
            reason: format!(
                "Separation model not found.\n\n\
                 Locations checked:\n{}\n\n\
                 To fix this, either:\n\
                 1. Pass --model /path/to/sepformer.onnx or set VOXSPLIT_MODEL_PATH\n\
                 2. Pass --model-url (or set VOXSPLIT_MODEL_URL) to download it into the cache\n\
                 3. Place the model in one of the above locations",
                locations_list
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_taxonomy() {
        assert_eq!(VoxsplitError::shape(&[1, 3, 7], "x").kind(), ErrorKind::Shape);
        assert_eq!(
            VoxsplitError::Load { reason: "x".into() }.kind(),
            ErrorKind::Load
        );
        assert_eq!(
            VoxsplitError::decode_error("a.wav", "bad").kind(),
            ErrorKind::Io
        );
        assert_eq!(
            VoxsplitError::Export { reason: "x".into() }.kind(),
            ErrorKind::Export
        );
        assert_eq!(VoxsplitError::Usage("x".into()).kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_shape_error_message_includes_dims() {
        let err = VoxsplitError::shape(&[1, 3, 7], "no axis of length 2");
        let msg = err.to_string();
        assert!(msg.contains("[1, 3, 7]"));
        assert!(msg.contains("no axis of length 2"));
    }

    #[test]
    fn test_model_not_found_lists_locations() {
        let err = VoxsplitError::model_not_found(&["/a/model.onnx".into(), "/b/model.onnx".into()]);
        let msg = err.to_string();
        assert!(msg.contains("  - /a/model.onnx"));
        assert!(msg.contains("  - /b/model.onnx"));
        assert_eq!(err.kind(), ErrorKind::Load);
    }

    #[test]
    fn test_output_error_permission_hint() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = VoxsplitError::output_error("/root/out/source_0.wav", io);
        assert!(err.to_string().contains("Permission denied"));
    }
}
