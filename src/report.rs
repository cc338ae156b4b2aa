//! Machine-readable job result
//!
//! The job binary prints exactly one JSON object per invocation on stdout:
//!
//! ```text
//! {"success":true,"output_paths":["out/source_0.wav","out/source_1.wav"],"num_sources":2}
//! {"success":false,"error":"Input file not found: missing.wav"}
//! ```

use crate::error::Result;
use crate::types::JobResult;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// JSON shape of a `JobResult`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultJson {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_sources: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&JobResult> for JobResultJson {
    fn from(result: &JobResult) -> Self {
        match result {
            JobResult::Success { outputs } => Self {
                success: true,
                output_paths: Some(
                    outputs
                        .iter()
                        .map(|f| f.path.to_string_lossy().into_owned())
                        .collect(),
                ),
                num_sources: Some(outputs.len()),
                error: None,
            },
            JobResult::Failure { error } => Self {
                success: false,
                output_paths: None,
                num_sources: None,
                error: Some(error.clone()),
            },
        }
    }
}

/// Serialize a result as a single line (no trailing newline)
pub fn to_line(result: &JobResult) -> Result<String> {
    let line = serde_json::to_string(&JobResultJson::from(result)).map_err(std::io::Error::from)?;
    Ok(line)
}

/// Write the result line followed by a newline and flush
pub fn write_result_line<W: Write>(mut writer: W, result: &JobResult) -> Result<()> {
    let line = to_line(result)?;
    writeln!(writer, "{}", line)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceFile;
    use std::path::PathBuf;

    fn success() -> JobResult {
        JobResult::Success {
            outputs: (0..2)
                .map(|i| SourceFile {
                    index: i,
                    sample_rate: 16_000,
                    path: PathBuf::from(format!("out/source_{}.wav", i)),
                })
                .collect(),
        }
    }

    #[test]
    fn test_success_line() {
        let line = to_line(&success()).unwrap();
        assert_eq!(
            line,
            r#"{"success":true,"output_paths":["out/source_0.wav","out/source_1.wav"],"num_sources":2}"#
        );
    }

    #[test]
    fn test_failure_line_has_no_outputs() {
        let result = JobResult::Failure {
            error: "Input file not found: a.wav".to_string(),
        };
        let line = to_line(&result).unwrap();
        assert_eq!(line, r#"{"success":false,"error":"Input file not found: a.wav"}"#);
    }

    #[test]
    fn test_write_result_line_is_single_line() {
        let mut buf = Vec::new();
        write_result_line(&mut buf, &success()).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));

        let parsed: JobResultJson = serde_json::from_str(text.trim_end()).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.num_sources, Some(2));
    }

    #[test]
    fn test_error_message_is_escaped() {
        let result = JobResult::Failure {
            error: "bad \"quote\"\nnext".to_string(),
        };
        let line = to_line(&result).unwrap();
        assert!(!line.contains('\n'));
        let parsed: JobResultJson = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("bad \"quote\"\nnext"));
    }
}
