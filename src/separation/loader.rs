//! Process-lifetime model handle
//!
//! A `ModelLoader` is built once at process start and passed by reference to
//! whichever pipeline needs the model. The model itself is opened lazily on
//! the first `get()` and kept until the process exits. Single-threaded by
//! contract: one job per process, so there is no in-flight load to share.

use super::model::{find_model_path, ModelConfig, ModelFamily};
use super::separator::OrtSeparator;
use super::traits::SeparationModel;
use crate::error::Result;
use once_cell::unsync::OnceCell;
use std::path::Path;
use tracing::info;

/// Opens a resolved model file as a separation model
pub type ModelOpener = Box<dyn Fn(&Path, ModelFamily) -> Result<Box<dyn SeparationModel>>>;

/// Opener backed by ONNX Runtime
pub fn ort_opener() -> ModelOpener {
    Box::new(|path, family| {
        let separator = OrtSeparator::load(path, family)?;
        Ok(Box::new(separator) as Box<dyn SeparationModel>)
    })
}

/// Lazily loads and memoizes one separation model
pub struct ModelLoader {
    config: ModelConfig,
    open: ModelOpener,
    model: OnceCell<Box<dyn SeparationModel>>,
}

impl ModelLoader {
    /// Loader backed by ONNX Runtime
    pub fn new(config: ModelConfig) -> Self {
        Self::with_opener(config, ort_opener())
    }

    /// Loader with a custom way of opening the resolved model file
    pub fn with_opener(config: ModelConfig, open: ModelOpener) -> Self {
        Self {
            config,
            open,
            model: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Whether the model has been loaded yet
    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    /// Get the model, loading it on first use
    ///
    /// A failed load is not memoized; the next call tries again.
    pub fn get(&self) -> Result<&dyn SeparationModel> {
        let model = self.model.get_or_try_init(|| {
            let path = find_model_path(&self.config)?;
            info!("Loading separation model from {}...", path.display());
            let model = (self.open)(&path, self.config.family)?;
            info!("Model loaded successfully ({})", model.name());
            Ok::<_, crate::error::VoxsplitError>(model)
        })?;
        Ok(model.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoxsplitError;
    use crate::types::{SeparationOutput, Waveform};
    use ndarray::ArrayD;
    use std::cell::Cell;
    use std::rc::Rc;
    use tempfile::TempDir;

    struct Silent;

    impl SeparationModel for Silent {
        fn separate(&self, waveform: &Waveform) -> Result<SeparationOutput> {
            Ok(ArrayD::zeros(vec![1, 2, waveform.len()]))
        }

        fn name(&self) -> &'static str {
            "silent"
        }
    }

    fn config_for(path: &Path) -> ModelConfig {
        ModelConfig {
            path: Some(path.to_path_buf()),
            ..ModelConfig::default()
        }
    }

    #[test]
    fn test_get_memoizes() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"graph").unwrap();

        let opens = Rc::new(Cell::new(0));
        let counter = Rc::clone(&opens);
        let loader = ModelLoader::with_opener(
            config_for(&model_path),
            Box::new(move |_, _| {
                counter.set(counter.get() + 1);
                Ok(Box::new(Silent) as Box<dyn SeparationModel>)
            }),
        );

        assert!(!loader.is_loaded());
        assert_eq!(loader.get().unwrap().name(), "silent");
        assert_eq!(loader.get().unwrap().name(), "silent");
        assert!(loader.is_loaded());
        assert_eq!(opens.get(), 1);
    }

    #[test]
    fn test_failed_load_is_retried() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("model.onnx");
        std::fs::write(&model_path, b"graph").unwrap();

        let opens = Rc::new(Cell::new(0));
        let counter = Rc::clone(&opens);
        let loader = ModelLoader::with_opener(
            config_for(&model_path),
            Box::new(move |_, _| {
                counter.set(counter.get() + 1);
                Err(VoxsplitError::Load {
                    reason: "corrupt".into(),
                })
            }),
        );

        assert!(loader.get().is_err());
        assert!(loader.get().is_err());
        assert!(!loader.is_loaded());
        assert_eq!(opens.get(), 2);
    }

    #[test]
    fn test_unresolvable_model_is_load_error() {
        let loader = ModelLoader::with_opener(
            ModelConfig {
                path: Some("/nonexistent/voxsplit.onnx".into()),
                filename: "voxsplit-loader-test-missing.onnx".into(),
                ..ModelConfig::default()
            },
            Box::new(|_, _| Ok(Box::new(Silent) as Box<dyn SeparationModel>)),
        );

        let err = loader.get().err().unwrap();
        assert!(matches!(err, VoxsplitError::Load { .. }));
    }
}
