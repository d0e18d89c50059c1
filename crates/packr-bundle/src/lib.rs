//! packr-bundle: filesystem front end for packr
//!
//! Reads a list of scripts, joins them into one unit, packs it with
//! [`packr_core::pack`] and writes the packed output next to its source map.
//! A JSON manifest can describe several bundle targets, which are built in
//! parallel.

pub mod fs;

use packr_core::{PackError, PackOptions};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Default manifest file name.
pub const MANIFEST_FILE: &str = "packr.json";

/// One bundle target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
    /// Scripts to join, in order.
    pub inputs: Vec<PathBuf>,

    /// Where the packed script is written. The map goes next to it.
    pub output: PathBuf,

    /// Text written verbatim above the packed code, e.g. a license banner.
    pub header: Option<String>,

    /// Pack options. File offsets, output file and line offset are filled
    /// in by the bundler.
    pub options: PackOptions,
}

impl BundleConfig {
    #[must_use]
    pub fn new(inputs: Vec<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs,
            output: output.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: PackOptions) -> Self {
        self.options = options;
        self
    }
}

/// A set of bundle targets, usually read from `packr.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub bundles: Vec<BundleConfig>,
}

/// What a finished bundle wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleReport {
    pub output: PathBuf,
    pub map: PathBuf,
    pub inputs: usize,
    pub bytes_in: usize,
    pub bytes_out: usize,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid manifest {}: {source}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("input too large: {} bytes joined at {}", bytes, path.display())]
    InputTooLarge { path: PathBuf, bytes: usize },

    #[error("failed to pack {}: {source}", path.display())]
    Pack {
        path: PathBuf,
        #[source]
        source: PackError,
    },
}

impl BundleError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "READ_ERROR",
            Self::Write { .. } => "WRITE_ERROR",
            Self::Manifest { .. } => "MANIFEST_ERROR",
            Self::InputTooLarge { .. } => "INPUT_TOO_LARGE",
            Self::Pack { source, .. } => source.code(),
        }
    }

    /// The file the error is about.
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::Manifest { path, .. }
            | Self::InputTooLarge { path, .. }
            | Self::Pack { path, .. } => path,
        }
    }
}

/// Join, pack and write one target.
///
/// Each input is followed by a newline. File names in the source map are the
/// input paths as given.
///
/// # Errors
/// Any read, pack or write failure aborts the bundle. Files already written
/// are left in place.
pub fn bundle(config: &BundleConfig) -> Result<BundleReport, BundleError> {
    let mut code = String::new();
    let mut options = config.options.clone();

    for input in &config.inputs {
        let offset = u32::try_from(code.len()).map_err(|_| BundleError::InputTooLarge {
            path: input.clone(),
            bytes: code.len(),
        })?;
        let content = fs::read_script(input).map_err(|source| BundleError::Read {
            path: input.clone(),
            source,
        })?;
        debug!(path = %input.display(), offset, bytes = content.len(), "read input");
        options = options.with_source_file(input.display().to_string(), offset);
        code.push_str(&content);
        code.push('\n');
    }
    if u32::try_from(code.len()).is_err() {
        return Err(BundleError::InputTooLarge {
            path: config.output.clone(),
            bytes: code.len(),
        });
    }

    let header = config
        .header
        .as_ref()
        .map(|header| format!("{header}\n"))
        .unwrap_or_default();
    options = options
        .with_output_file(config.output.display().to_string())
        .with_line_offset(fs::count_lines(&header));

    let packed = packr_core::pack(&code, &options).map_err(|source| BundleError::Pack {
        path: config.output.clone(),
        source,
    })?;

    let output = format!("{header}{}", packed.code);
    fs::atomic_write(&config.output, output.as_bytes()).map_err(|source| BundleError::Write {
        path: config.output.clone(),
        source,
    })?;

    let map = packed
        .source_map
        .filename()
        .map_or_else(|| map_path(&config.output), PathBuf::from);
    fs::atomic_write(&map, packed.source_map.to_string().as_bytes()).map_err(|source| {
        BundleError::Write {
            path: map.clone(),
            source,
        }
    })?;

    info!(
        output = %config.output.display(),
        inputs = config.inputs.len(),
        bytes_in = code.len(),
        bytes_out = output.len(),
        "bundled"
    );

    Ok(BundleReport {
        output: config.output.clone(),
        map,
        inputs: config.inputs.len(),
        bytes_in: code.len(),
        bytes_out: output.len(),
    })
}

/// Read a manifest, resolving its paths against the manifest's directory.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a valid manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest, BundleError> {
    let text = fs::read_script(path).map_err(|source| BundleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut manifest: Manifest =
        serde_json::from_str(&text).map_err(|source| BundleError::Manifest {
            path: path.to_path_buf(),
            source,
        })?;

    let base = path.parent().unwrap_or(Path::new(""));
    for target in &mut manifest.bundles {
        for input in &mut target.inputs {
            *input = base.join(&*input);
        }
        target.output = base.join(&target.output);
    }
    debug!(path = %path.display(), bundles = manifest.bundles.len(), "loaded manifest");
    Ok(manifest)
}

/// Build every target of a manifest in parallel.
///
/// # Errors
/// Returns the first error any target hits.
pub fn bundle_all(manifest: &Manifest) -> Result<Vec<BundleReport>, BundleError> {
    manifest.bundles.par_iter().map(bundle).collect()
}

fn map_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}
