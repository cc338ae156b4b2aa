//! voxsplit-export entry point
//!
//! Runs the export stage followed by the verification stage (or verification
//! alone with `--verify-only`). Exits non-zero if any stage that ran failed.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use voxsplit::config::{init_logging, ExportCli, ExportSettings};
use voxsplit::pipeline::run_stages;
use voxsplit::separation::{ort_opener, ModelLoader};

fn main() -> ExitCode {
    let cli = ExportCli::parse();
    init_logging(&cli.log);

    let settings = ExportSettings::from_cli(&cli);
    let loader = ModelLoader::new(settings.model.clone());
    let opener = ort_opener();

    let results = run_stages(
        &loader,
        &settings.artifact,
        &settings.shape_policy,
        settings.verify_only,
        &opener,
    );

    if let Some(Ok(artifact)) = &results.export {
        info!(
            "Export passed: {} (probe output {:?}, exported at {})",
            artifact.path.display(),
            artifact.probe_shape,
            artifact.exported_at.to_rfc3339()
        );
    }

    match &results.verify {
        Some(Ok(report)) => {
            if report.signatures.is_none() {
                info!("Runtime did not expose tensor signatures for the artifact");
            }
            info!(
                "Verification passed: output {:?}, {} sources, range [{:.4}, {:.4}]",
                report.output_shape, report.num_sources, report.min, report.max
            );
        }
        Some(Err(e)) => error!("Verification failed: {}", e),
        None => {}
    }

    eprintln!();
    eprintln!(
        "Summary: {} passed, {} failed",
        results.passed(),
        results.failed()
    );

    if results.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
