//! voxsplit job entry point
//!
//! stdout carries exactly one JSON result line; everything else goes to stderr.

use clap::error::ErrorKind as ClapErrorKind;
use clap::Parser;
use std::io;
use std::process::ExitCode;
use voxsplit::config::cli::JOB_USAGE;
use voxsplit::config::{init_logging, JobCli, LogArgs, Settings};
use voxsplit::pipeline::{Job, JobRequest};
use voxsplit::report;
use voxsplit::separation::ModelLoader;
use voxsplit::{JobResult, VoxsplitError};

fn main() -> ExitCode {
    let cli = match JobCli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            _ => {
                init_logging(&LogArgs {
                    verbose: 0,
                    quiet: false,
                });
                tracing::debug!("Argument error: {}", e);
                return finish(&usage_failure(&e));
            }
        },
    };

    init_logging(&cli.log);

    let settings = Settings::from_cli(&cli);
    let loader = ModelLoader::new(settings.model.clone());
    let mut job = Job::new(&loader, settings.shape_policy);

    let result = job.run(&JobRequest::from_settings(&settings));
    if let JobResult::Failure { error } = &result {
        tracing::error!("{}", error);
    }

    finish(&result)
}

fn usage_failure(err: &clap::Error) -> JobResult {
    let detail = err
        .to_string()
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("error: ")
        .to_string();

    JobResult::Failure {
        error: VoxsplitError::Usage(format!("{} ({})", JOB_USAGE, detail)).to_string(),
    }
}

fn finish(result: &JobResult) -> ExitCode {
    if let Err(e) = report::write_result_line(io::stdout().lock(), result) {
        eprintln!("Failed to write result: {}", e);
        return ExitCode::FAILURE;
    }

    if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
