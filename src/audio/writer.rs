//! WAV output for separated sources

use crate::error::{Result, VoxsplitError};
use hound::{SampleFormat, WavSpec, WavWriter};
use ndarray::ArrayView1;
use std::path::Path;
use tracing::debug;

/// Write one mono channel as a 32-bit float WAV file
pub fn write_mono_wav(path: &Path, samples: ArrayView1<'_, f32>, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let output_error = |e: hound::Error| VoxsplitError::Output {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| match e {
        hound::Error::IoError(io) => VoxsplitError::output_error(path, io),
        other => output_error(other),
    })?;

    for &sample in samples.iter() {
        writer.write_sample(sample).map_err(output_error)?;
    }

    writer.finalize().map_err(output_error)?;

    debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use tempfile::TempDir;

    #[test]
    fn test_write_mono_wav_spec_and_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source_0.wav");
        let samples = Array1::<f32>::zeros(32_000);

        write_mono_wav(&path, samples.view(), 16_000).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.sample_format, SampleFormat::Float);
        assert_eq!(reader.duration(), 32_000);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("source_0.wav");
        let samples = Array1::<f32>::zeros(10);

        let err = write_mono_wav(&path, samples.view(), 16_000).unwrap_err();
        assert!(matches!(err, VoxsplitError::Output { .. }));
    }
}
