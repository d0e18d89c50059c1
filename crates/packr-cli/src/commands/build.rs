//! `packr build` command implementation.
//!
//! Builds every bundle target listed in a manifest.

use super::{report_error, ErrorJson};
use miette::{IntoDiagnostic, Result};
use packr_bundle::{bundle_all, load_manifest, BundleReport};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// JSON output for the build command.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    manifest: String,
    bundles: Vec<BundleReport>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

pub fn run(manifest_path: PathBuf, json: bool) -> Result<()> {
    let start = Instant::now();
    tracing::debug!(manifest = %manifest_path.display(), "building manifest");

    let result = load_manifest(&manifest_path).and_then(|manifest| bundle_all(&manifest));
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(bundles) => {
            if json {
                let json_result = BuildResultJson {
                    ok: true,
                    manifest: manifest_path.display().to_string(),
                    bundles,
                    duration_ms,
                    error: None,
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                for report in &bundles {
                    println!(
                        "  {} files -> {} ({:.1}KB -> {:.1}KB)",
                        report.inputs,
                        report.output.display(),
                        report.bytes_in as f64 / 1024.0,
                        report.bytes_out as f64 / 1024.0
                    );
                }
                println!("Built {} bundles in {}ms", bundles.len(), duration_ms);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let json_result = BuildResultJson {
                    ok: false,
                    manifest: manifest_path.display().to_string(),
                    bundles: Vec::new(),
                    duration_ms,
                    error: Some(ErrorJson::from(&e)),
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                report_error(&e);
            }
            std::process::exit(1);
        }
    }
}
