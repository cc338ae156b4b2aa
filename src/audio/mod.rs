//! Audio input and output
//!
//! Input audio is decoded with symphonia and normalized to the model's
//! contract (mono, 16 kHz). Separated sources are written with hound.

pub mod decoder;
pub mod writer;

pub use decoder::{decode, load_for_model, mix_to_mono, prepare_for_model, resample};
pub use writer::write_mono_wav;
