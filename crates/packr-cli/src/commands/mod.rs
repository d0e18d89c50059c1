pub mod build;
pub mod pack;
pub mod version;

use serde::Serialize;

/// Error object in `--json` output.
#[derive(Serialize)]
pub struct ErrorJson {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&packr_bundle::BundleError> for ErrorJson {
    fn from(e: &packr_bundle::BundleError) -> Self {
        Self {
            code: e.code().to_string(),
            message: e.to_string(),
            path: Some(e.path().display().to_string()),
        }
    }
}

/// Print a bundle error for humans.
pub fn report_error(e: &packr_bundle::BundleError) {
    eprintln!("error: {e}");
    if let packr_bundle::BundleError::Pack { source, .. } = e {
        if let Some(offset) = source.offset() {
            eprintln!("  at byte {offset} of the joined input");
        }
    }
}
