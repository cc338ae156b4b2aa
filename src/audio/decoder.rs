//! Audio decoding using symphonia
//!
//! Decodes audio files to `[channel, time]` waveforms at their native rate,
//! then mixes down and resamples them to the rate the model expects.
//! Uses rubato for high-quality resampling with proper anti-aliasing.

use crate::error::{Result, VoxsplitError};
use crate::types::{Waveform, MODEL_SAMPLE_RATE};
use ndarray::{Array2, Axis};
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Maximum file size we'll attempt to decode (2GB)
/// Prevents OOM on extremely large files
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Decode an audio file and prepare it for the model: mono, 16 kHz
pub fn load_for_model(path: &Path) -> Result<Waveform> {
    let decoded = decode(path)?;
    Ok(prepare_for_model(decoded))
}

/// Resample to the model rate and mix down to a single channel
pub fn prepare_for_model(waveform: Waveform) -> Waveform {
    let waveform = if waveform.sample_rate != MODEL_SAMPLE_RATE {
        debug!(
            "Resampling {}Hz -> {}Hz",
            waveform.sample_rate, MODEL_SAMPLE_RATE
        );
        resample_waveform(&waveform, MODEL_SAMPLE_RATE)
    } else {
        waveform
    };

    if waveform.channels() > 1 {
        debug!("Mixing {} channels down to mono", waveform.channels());
        mix_to_mono(&waveform)
    } else {
        waveform
    }
}

/// Decode an audio file to a `[channel, time]` waveform at its native rate
pub fn decode(path: &Path) -> Result<Waveform> {
    // Check file size before attempting to decode
    let metadata = std::fs::metadata(path).map_err(|e| {
        VoxsplitError::decode_error(path, format!("Failed to read file metadata: {}", e))
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(VoxsplitError::decode_error(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| VoxsplitError::decode_error(path, format!("Failed to open file: {}", e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Provide a hint based on file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| VoxsplitError::decode_error(path, format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| VoxsplitError::decode_error(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| VoxsplitError::decode_error(path, "Unknown sample rate"))?;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        sample_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| {
            VoxsplitError::decode_error(path, format!("Failed to create decoder: {}", e))
        })?;

    // Collect all interleaved samples
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // End of stream
            }
            Err(e) => {
                return Err(VoxsplitError::decode_error(
                    path,
                    format!("Failed to read packet: {}", e),
                ));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                // Skip corrupted frames
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(VoxsplitError::decode_error(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(VoxsplitError::decode_error(path, "File contains no audio samples"));
    }

    let samples = deinterleave(&interleaved, channels);

    debug!(
        "Decoded {} frames x {} channels ({:.2}s)",
        samples.len_of(Axis(1)),
        channels,
        samples.len_of(Axis(1)) as f64 / sample_rate as f64
    );

    Ok(Waveform::new(samples, sample_rate))
}

/// Split interleaved samples into a `[channel, time]` array
fn deinterleave(samples: &[f32], channels: usize) -> Array2<f32> {
    let frames = samples.len() / channels;
    Array2::from_shape_fn((channels, frames), |(c, t)| samples[t * channels + c])
}

/// Average all channels into one
pub fn mix_to_mono(waveform: &Waveform) -> Waveform {
    if waveform.channels() <= 1 {
        return waveform.clone();
    }

    let mono = waveform
        .samples
        .mean_axis(Axis(0))
        .map(|m| m.insert_axis(Axis(0)))
        .unwrap_or_else(|| Array2::zeros((1, 0)));

    Waveform::new(mono, waveform.sample_rate)
}

/// Resample every channel of a waveform
pub fn resample_waveform(waveform: &Waveform, to_rate: u32) -> Waveform {
    let channels: Vec<Vec<f32>> = waveform
        .samples
        .outer_iter()
        .map(|channel| resample(&channel.to_vec(), waveform.sample_rate, to_rate))
        .collect();

    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    let samples = Array2::from_shape_fn((channels.len(), frames), |(c, t)| channels[c][t]);

    Waveform::new(samples, to_rate)
}

/// Resample one channel with rubato's FFT resampler
///
/// The output is aligned with the input (the resampler's filter delay is
/// removed) and holds `ceil(len * to_rate / from_rate)` frames. Falls back to
/// linear interpolation if rubato cannot be set up for the rate pair.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    match resample_fft(samples, from_rate, to_rate) {
        Ok(output) => output,
        Err(reason) => {
            debug!("FFT resampling unavailable ({}), interpolating linearly", reason);
            resample_linear(samples, from_rate, to_rate)
        }
    }
}

/// Frames needed to cover `input_len` frames at the new rate
fn resampled_len(input_len: usize, from_rate: u32, to_rate: u32) -> usize {
    (input_len as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize
}

fn resample_fft(
    samples: &[f32],
    from_rate: u32,
    to_rate: u32,
) -> std::result::Result<Vec<f32>, String> {
    const CHUNK_FRAMES: usize = 1024;

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, CHUNK_FRAMES, 1)
            .map_err(|e| e.to_string())?;

    let wanted = resampled_len(samples.len(), from_rate, to_rate);
    let delay = resampler.output_delay();
    let chunk_len = resampler.input_frames_next();

    // Keep feeding chunks, zero-padded past the end of the input, until the
    // delayed output covers every wanted frame
    let mut produced: Vec<f32> = Vec::with_capacity(wanted + delay + resampler.output_frames_next());
    let mut chunk = vec![0.0f32; chunk_len];
    let mut offset = 0;

    while produced.len() < wanted + delay {
        let available = samples.len().saturating_sub(offset).min(chunk_len);
        chunk[..available].copy_from_slice(&samples[offset..offset + available]);
        chunk[available..].fill(0.0);

        let frames = resampler
            .process(std::slice::from_ref(&chunk), None)
            .map_err(|e| e.to_string())?;
        match frames.into_iter().next() {
            Some(channel) if !channel.is_empty() => produced.extend_from_slice(&channel),
            _ => return Err("resampler produced no output".to_string()),
        }

        offset += chunk_len;
    }

    trace!(
        "Resampled {} -> {} frames (filter delay {})",
        samples.len(),
        wanted,
        delay
    );

    Ok(produced.into_iter().skip(delay).take(wanted).collect())
}

/// Linear interpolation between neighbouring samples. May alias.
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let step = from_rate as f64 / to_rate as f64;
    let last = samples.len().saturating_sub(1);

    (0..resampled_len(samples.len(), from_rate, to_rate))
        .map(|i| {
            let pos = i as f64 * step;
            let left = (pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let t = (pos - left as f64).clamp(0.0, 1.0) as f32;
            samples[left] + (samples[right] - samples[left]) * t
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_deinterleave_stereo() {
        let interleaved = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let wf = deinterleave(&interleaved, 2);
        assert_eq!(wf.shape(), &[2, 3]);
        assert_eq!(wf.row(0).to_vec(), vec![0.5, 0.8, 1.0]);
        assert_eq!(wf.row(1).to_vec(), vec![0.3, 0.2, 0.0]);
    }

    #[test]
    fn test_mix_to_mono_averages_channels() {
        let wf = Waveform::new(array![[0.5, 0.8, 1.0], [0.3, 0.2, 0.0]], 16_000);
        let mono = mix_to_mono(&wf);
        assert_eq!(mono.channels(), 1);
        let s = mono.samples.row(0);
        assert!((s[0] - 0.4).abs() < 0.001);
        assert!((s[1] - 0.5).abs() < 0.001);
        assert!((s[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_mix_to_mono_already_mono() {
        let wf = Waveform::mono(vec![0.5, 0.8, 1.0], 16_000);
        let mono = mix_to_mono(&wf);
        assert_eq!(mono.samples, wf.samples);
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3, 0.4, 0.5];
        let result = resample(&samples, 16_000, 16_000);
        assert_eq!(result, samples);
    }

    #[test]
    fn test_resample_44100_to_16000_length() {
        let samples: Vec<f32> = (0..44_100).map(|i| (i as f32 / 100.0).sin()).collect();
        let result = resample(&samples, 44_100, 16_000);
        assert_eq!(result.len(), 16_000);
    }

    #[test]
    fn test_resampled_len_rounds_up() {
        assert_eq!(resampled_len(44_100, 44_100, 16_000), 16_000);
        assert_eq!(resampled_len(44_101, 44_100, 16_000), 16_001);
        assert_eq!(resampled_len(3, 48_000, 16_000), 1);
        assert_eq!(resampled_len(0, 48_000, 16_000), 0);
    }

    /// Index of the first sample above half the step height
    fn step_position(samples: &[f32]) -> usize {
        samples.iter().position(|&s| s > 0.5).unwrap()
    }

    #[test]
    fn test_resample_keeps_step_aligned() {
        // Silence for 0.5s, then a constant level for 0.5s
        let step: Vec<f32> = (0..44_100).map(|i| if i < 22_050 { 0.0 } else { 1.0 }).collect();
        let result = resample(&step, 44_100, 16_000);

        let at = step_position(&result);
        assert!(
            (at as i64 - 8_000).abs() <= 2,
            "step moved to sample {}",
            at
        );
    }

    #[test]
    fn test_resample_keeps_tail() {
        let step: Vec<f32> = (0..48_000).map(|i| if i < 24_000 { 0.0 } else { 1.0 }).collect();
        let result = resample(&step, 48_000, 16_000);

        assert_eq!(result.len(), 16_000);
        // Well clear of both the step and the end of the signal
        for &s in &result[12_000..15_000] {
            assert!((s - 1.0).abs() < 0.02, "tail sample {}", s);
        }
    }

    #[test]
    fn test_resample_linear() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let result = resample_linear(&samples, 32_000, 16_000);
        assert_eq!(result.len(), 50);
        assert!((result[10] - 0.2).abs() < 1e-6);

        let step: Vec<f32> = (0..44_100).map(|i| if i < 22_050 { 0.0 } else { 1.0 }).collect();
        let at = step_position(&resample_linear(&step, 44_100, 16_000));
        assert!((at as i64 - 8_000).abs() <= 2, "step moved to sample {}", at);
    }

    #[test]
    fn test_prepare_for_model_resamples_and_mixes() {
        let stereo = Waveform::new(Array2::zeros((2, 48_000)), 48_000);
        let prepared = prepare_for_model(stereo);
        assert_eq!(prepared.channels(), 1);
        assert_eq!(prepared.sample_rate, MODEL_SAMPLE_RATE);
        assert!((prepared.len() as f64 - 16_000.0).abs() < 4.0);
    }

    #[test]
    fn test_decode_missing_file_is_decode_error() {
        let err = decode(Path::new("/nonexistent/input.wav")).unwrap_err();
        assert!(matches!(err, VoxsplitError::Decode { .. }));
    }
}
