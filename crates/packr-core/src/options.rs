//! Pack configuration.

use crate::base62::{DEFAULT_RADIX, DEFAULT_WORD_PATTERN};
use crate::token::RESERVED_WORDS;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Identifier used by class-style inheritance helpers to reach the
/// overridden method. Never renamed.
pub const SUPER_ACCESSOR: &str = "$super";

/// Options for a single pack operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// Rename local variables and parameters to short names.
    pub shrink_vars: bool,

    /// Rename private-convention identifiers across the whole unit.
    pub private: bool,

    /// Dictionary-encode the result into a self-decoding payload.
    pub base62: bool,

    /// Extra names that are never renamed nor generated. Non-string JSON
    /// values are taken in their string form.
    #[serde(deserialize_with = "names_as_strings")]
    pub protected_names: Vec<String>,

    /// File name to the byte offset its content starts at in the input.
    pub source_files: BTreeMap<String, u32>,

    /// Destination path; the source map is named after it.
    pub output_file: Option<String>,

    /// Lines written before the packed output (a header).
    pub line_offset: u32,

    /// Prefix marking a private identifier.
    pub private_prefix: String,

    /// Radix of the base62 word codes, 2..=62.
    pub radix: u32,

    /// Regex splitting the text into dictionary words.
    pub word_pattern: String,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            shrink_vars: false,
            private: false,
            base62: false,
            protected_names: Vec::new(),
            source_files: BTreeMap::new(),
            output_file: None,
            line_offset: 0,
            private_prefix: "_".to_string(),
            radix: DEFAULT_RADIX,
            word_pattern: DEFAULT_WORD_PATTERN.to_string(),
        }
    }
}

impl PackOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_shrink_vars(mut self, shrink_vars: bool) -> Self {
        self.shrink_vars = shrink_vars;
        self
    }

    #[must_use]
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    #[must_use]
    pub fn with_base62(mut self, base62: bool) -> Self {
        self.base62 = base62;
        self
    }

    /// Add protected names, normalised to their string form.
    #[must_use]
    pub fn with_protected_names<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.protected_names
            .extend(names.into_iter().map(|name| name.to_string()));
        self
    }

    /// Record where a file's content starts in the input.
    #[must_use]
    pub fn with_source_file(mut self, name: impl Into<String>, offset: u32) -> Self {
        self.source_files.insert(name.into(), offset);
        self
    }

    #[must_use]
    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = Some(output_file.into());
        self
    }

    #[must_use]
    pub fn with_line_offset(mut self, line_offset: u32) -> Self {
        self.line_offset = line_offset;
        self
    }

    #[must_use]
    pub fn with_private_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.private_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_radix(mut self, radix: u32) -> Self {
        self.radix = radix;
        self
    }

    #[must_use]
    pub fn with_word_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.word_pattern = pattern.into();
        self
    }
}

fn names_as_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

fn default_protected() -> &'static FxHashSet<&'static str> {
    static DEFAULT: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    DEFAULT.get_or_init(|| {
        RESERVED_WORDS
            .iter()
            .copied()
            .chain(std::iter::once(SUPER_ACCESSOR))
            .collect()
    })
}

/// Names that are never renamed and never handed out as new names.
///
/// The built-in set (reserved words and [`SUPER_ACCESSOR`]) is shared and
/// read-only; extra names live in an overlay owned by each value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedNames {
    extra: FxHashSet<String>,
}

impl ProtectedNames {
    /// The built-in set only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this set with more names added.
    #[must_use]
    pub fn with_extra<I, T>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let mut extra = self.extra.clone();
        extra.extend(names.into_iter().map(|name| name.to_string()));
        Self { extra }
    }

    pub fn contains(&self, name: &str) -> bool {
        default_protected().contains(name) || self.extra.contains(name)
    }

    /// Names added on top of the built-in set.
    pub fn extra(&self) -> impl Iterator<Item = &str> {
        self.extra.iter().map(String::as_str)
    }
}
