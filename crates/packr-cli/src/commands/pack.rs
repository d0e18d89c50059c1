//! `packr pack` command implementation.
//!
//! Joins the given scripts, packs them and writes the result with its map.

use super::{report_error, ErrorJson};
use miette::{IntoDiagnostic, Result};
use packr_bundle::{bundle, BundleConfig};
use packr_core::PackOptions;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Pack command action.
#[derive(Debug, Clone)]
pub struct PackAction {
    /// Working directory relative paths are resolved against.
    pub cwd: PathBuf,
    /// Input scripts, in order.
    pub inputs: Vec<PathBuf>,
    /// Output file.
    pub output: PathBuf,
    /// Header written above the packed code.
    pub header: Option<String>,
    pub options: PackOptions,
}

/// JSON output for the pack command.
#[derive(Serialize)]
struct PackResultJson {
    ok: bool,
    inputs: Vec<String>,
    output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    map: Option<String>,
    bytes_in: usize,
    bytes_out: usize,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub fn run(action: PackAction, json: bool) -> Result<()> {
    let start = Instant::now();

    let mut config = BundleConfig::new(
        action.inputs.iter().map(|p| action.cwd.join(p)).collect(),
        action.cwd.join(&action.output),
    )
    .with_options(action.options);
    config.header = action.header;

    let result = bundle(&config);
    let duration_ms = start.elapsed().as_millis() as u64;

    let mut json_result = PackResultJson {
        ok: result.is_ok(),
        inputs: config.inputs.iter().map(|p| p.display().to_string()).collect(),
        output: config.output.display().to_string(),
        map: None,
        bytes_in: 0,
        bytes_out: 0,
        duration_ms,
        error: None,
    };

    match result {
        Ok(report) => {
            if json {
                json_result.map = Some(report.map.display().to_string());
                json_result.bytes_in = report.bytes_in;
                json_result.bytes_out = report.bytes_out;
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                println!(
                    "  {} files -> {} ({:.1}KB -> {:.1}KB, {}ms)",
                    report.inputs,
                    report.output.display(),
                    report.bytes_in as f64 / 1024.0,
                    report.bytes_out as f64 / 1024.0,
                    duration_ms
                );
                println!("    + {}", report.map.display());
            }
            Ok(())
        }
        Err(e) => {
            if json {
                json_result.error = Some(ErrorJson::from(&e));
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                report_error(&e);
            }
            std::process::exit(1);
        }
    }
}
