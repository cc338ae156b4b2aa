//! Speaker separation
//!
//! Model adapters, model file resolution, the process-lifetime loader, and
//! the output shape normalizer that turns whatever the model emits into
//! canonical `[batch, source, time]` audio.

pub mod loader;
pub mod model;
pub mod normalize;
pub mod separator;
pub mod traits;

pub use loader::{ort_opener, ModelLoader, ModelOpener};
pub use model::{ModelConfig, ModelFamily};
pub use normalize::{classify, normalize, Layout, ShapePolicy, SourceAxis};
pub use separator::OrtSeparator;
pub use traits::SeparationModel;
