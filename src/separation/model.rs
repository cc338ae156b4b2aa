//! Separation model files
//!
//! Resolves the model file on disk, downloading it into the user cache when
//! a URL is configured. Model resolution checks multiple common locations.
//! The cache is read-only once materialized, so concurrent job processes can
//! share it.

use crate::error::{Result, VoxsplitError};
use directories::ProjectDirs;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default model filename
pub const DEFAULT_MODEL_FILENAME: &str = "sepformer.onnx";

/// Environment variable that points at a model file
pub const MODEL_PATH_ENV: &str = "VOXSPLIT_MODEL_PATH";

/// Directory the export tooling writes into, relative to the working directory
pub const LOCAL_MODEL_DIR: &str = "models/sepformer";

/// Supported model families
///
/// Each family fixes how a waveform is fed to the graph and which output is
/// read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// SepFormer graph: input `audio` `[batch, time]`, output `separated_audio`
    Sepformer,
    /// Any single-input waveform graph; first input and first output are used
    Onnx,
}

impl ModelFamily {
    /// Input tensor name, or `None` to use the first declared input
    pub fn input_name(self) -> Option<&'static str> {
        match self {
            ModelFamily::Sepformer => Some("audio"),
            ModelFamily::Onnx => None,
        }
    }

    /// Output tensor name, or `None` to use the first declared output
    pub fn output_name(self) -> Option<&'static str> {
        match self {
            ModelFamily::Sepformer => Some("separated_audio"),
            ModelFamily::Onnx => None,
        }
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sepformer" => Ok(ModelFamily::Sepformer),
            "onnx" => Ok(ModelFamily::Onnx),
            other => Err(format!(
                "unknown model family '{}' (expected 'sepformer' or 'onnx')",
                other
            )),
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Sepformer => write!(f, "sepformer"),
            ModelFamily::Onnx => write!(f, "onnx"),
        }
    }
}

/// Where to find (or fetch) the model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub family: ModelFamily,
    /// Explicit model path; takes precedence over every other location
    pub path: Option<PathBuf>,
    /// URL to download the model from when no local copy exists
    pub url: Option<String>,
    /// Expected SHA-256 of the downloaded file
    pub sha256: Option<String>,
    /// Filename used for cache and local lookups
    pub filename: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            family: ModelFamily::Sepformer,
            path: None,
            url: None,
            sha256: None,
            filename: DEFAULT_MODEL_FILENAME.to_string(),
        }
    }
}

/// Find the model file by checking multiple common locations
///
/// Search order:
/// 1. Explicit path (`--model` / VOXSPLIT_MODEL_PATH)
/// 2. ProjectDirs cache: ~/.cache/voxsplit/models/ (Linux)
/// 3. ProjectDirs data: ~/.local/share/voxsplit/models/ (Linux)
/// 4. Current directory: ./models/sepformer/
/// 5. Download from the configured URL into the cache directory
///
/// Returns the first existing model path found, or an error listing all checked locations.
pub fn find_model_path(config: &ModelConfig) -> Result<PathBuf> {
    let filename = config.filename.as_str();
    let mut checked_locations: Vec<String> = Vec::new();

    if let Some(path) = &config.path {
        if path.exists() {
            return Ok(path.clone());
        }
        checked_locations.push(path.display().to_string());
    }

    if let Some(proj_dirs) = project_dirs() {
        let cache_path = proj_dirs.cache_dir().join("models").join(filename);
        if cache_path.exists() {
            return Ok(cache_path);
        }
        checked_locations.push(cache_path.display().to_string());

        let data_path = proj_dirs.data_dir().join("models").join(filename);
        if data_path.exists() {
            return Ok(data_path);
        }
        checked_locations.push(data_path.display().to_string());
    }

    let cwd_path = PathBuf::from(LOCAL_MODEL_DIR).join(filename);
    if cwd_path.exists() {
        return Ok(cwd_path.canonicalize().unwrap_or(cwd_path));
    }
    checked_locations.push(cwd_path.display().to_string());

    match &config.url {
        Some(url) => {
            info!("Separation model not found locally, downloading from {}", url);
            ensure_model(url, config.sha256.as_deref(), &get_model_cache_path(filename)?)
        }
        None => Err(VoxsplitError::model_not_found(&checked_locations)),
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "voxsplit", "voxsplit")
}

/// Get the model cache directory, creating it if needed
pub fn get_cache_dir() -> Result<PathBuf> {
    let proj_dirs = project_dirs().ok_or_else(|| {
        VoxsplitError::Config("Could not determine cache directory".to_string())
    })?;

    let cache_dir = proj_dirs.cache_dir().join("models");
    fs::create_dir_all(&cache_dir).map_err(|e| VoxsplitError::output_error(&cache_dir, e))?;

    Ok(cache_dir)
}

fn get_model_cache_path(filename: &str) -> Result<PathBuf> {
    Ok(get_cache_dir()?.join(filename))
}

/// Download the model to `dest` unless a verified copy is already there
pub fn ensure_model(url: &str, sha256: Option<&str>, dest: &Path) -> Result<PathBuf> {
    if dest.exists() {
        if verify_model_hash(dest, sha256)? {
            debug!("Model already cached at {}", dest.display());
            return Ok(dest.to_path_buf());
        }
        warn!("Cached model hash mismatch, re-downloading...");
        fs::remove_file(dest).ok();
    }

    download_model(url, dest)?;

    if !verify_model_hash(dest, sha256)? {
        fs::remove_file(dest).ok();
        return Err(VoxsplitError::Load {
            reason: "Downloaded model hash verification failed".to_string(),
        });
    }

    Ok(dest.to_path_buf())
}

/// Download the model from URL with progress indicator
///
/// Streams into a `.part` file and renames it into place, so other processes
/// reading the cache never observe a partial model.
fn download_model(url: &str, dest: &Path) -> Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::io::{Read, Write};

    let response = reqwest::blocking::get(url).map_err(|e| VoxsplitError::Load {
        reason: format!("Failed to download model: {}", e),
    })?;

    if !response.status().is_success() {
        return Err(VoxsplitError::Load {
            reason: format!("Model download failed with status: {}", response.status()),
        });
    }

    let pb = match response.content_length() {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    pb.set_message("Downloading separation model...");

    let part_path = dest.with_extension("part");
    let mut file = fs::File::create(&part_path)
        .map_err(|e| VoxsplitError::output_error(&part_path, e))?;

    let mut downloaded: u64 = 0;
    let mut reader = response;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| VoxsplitError::Load {
            reason: format!("Failed to read model data: {}", e),
        })?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| VoxsplitError::output_error(&part_path, e))?;

        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    file.flush()
        .map_err(|e| VoxsplitError::output_error(&part_path, e))?;
    drop(file);

    fs::rename(&part_path, dest).map_err(|e| {
        let _ = fs::remove_file(&part_path);
        VoxsplitError::output_error(dest, e)
    })?;

    pb.finish_with_message("Download complete!");
    info!("Model downloaded to {}", dest.display());

    Ok(())
}

/// Verify the SHA-256 hash of a model file
///
/// Returns `true` when no hash is configured.
fn verify_model_hash(path: &Path, expected_hash: Option<&str>) -> Result<bool> {
    use sha2::{Digest, Sha256};
    use std::io::Read;

    let Some(expected_hash) = expected_hash else {
        debug!("No model hash configured, skipping verification");
        return Ok(true);
    };

    let mut file = fs::File::open(path).map_err(|e| VoxsplitError::Load {
        reason: format!("Failed to open model for verification: {}", e),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| VoxsplitError::Load {
            reason: format!("Failed to read model for verification: {}", e),
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    let actual_hash = hex::encode(hasher.finalize());
    let matches = actual_hash.eq_ignore_ascii_case(expected_hash);

    if !matches {
        warn!(
            "Model hash mismatch: expected {}, got {}",
            expected_hash, actual_hash
        );
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_family_parse_and_names() {
        assert_eq!("sepformer".parse::<ModelFamily>().unwrap(), ModelFamily::Sepformer);
        assert_eq!("ONNX".parse::<ModelFamily>().unwrap(), ModelFamily::Onnx);
        assert!("demucs".parse::<ModelFamily>().is_err());

        assert_eq!(ModelFamily::Sepformer.input_name(), Some("audio"));
        assert_eq!(ModelFamily::Sepformer.output_name(), Some("separated_audio"));
        assert_eq!(ModelFamily::Onnx.input_name(), None);
    }

    #[test]
    fn test_explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("custom.onnx");
        fs::write(&model, b"graph").unwrap();

        let config = ModelConfig {
            path: Some(model.clone()),
            ..ModelConfig::default()
        };
        assert_eq!(find_model_path(&config).unwrap(), model);
    }

    #[test]
    fn test_missing_model_lists_checked_locations() {
        let config = ModelConfig {
            path: Some(PathBuf::from("/nonexistent/voxsplit/model.onnx")),
            filename: "voxsplit-test-missing-model.onnx".to_string(),
            ..ModelConfig::default()
        };
        let err = find_model_path(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/voxsplit/model.onnx"));
        assert!(msg.contains("voxsplit-test-missing-model.onnx"));
    }

    #[test]
    fn test_verify_model_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.onnx");
        fs::write(&path, b"abc").unwrap();

        // sha256("abc")
        let good = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        assert!(verify_model_hash(&path, Some(good)).unwrap());
        assert!(verify_model_hash(&path, Some(&good.to_uppercase())).unwrap());
        assert!(!verify_model_hash(&path, Some("00")).unwrap());
        assert!(verify_model_hash(&path, None).unwrap());
    }

    #[test]
    fn test_ensure_model_keeps_verified_cache() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("model.onnx");
        fs::write(&dest, b"abc").unwrap();

        // Unreachable URL: a verified cached copy must short-circuit the download
        let good = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
        let path = ensure_model("http://127.0.0.1:9/model.onnx", Some(good), &dest).unwrap();
        assert_eq!(path, dest);
    }
}
