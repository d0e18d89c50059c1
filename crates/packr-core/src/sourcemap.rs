//! Source map support.
//!
//! The compactor reports one [`Mapping`] per emitted token. The builder ties
//! each mapping's input offset to the source file that contains it, using the
//! start offsets the caller recorded while concatenating files, and renders the
//! result as a V3 source map.

use crate::span::LineIndex;
use serde::Serialize;
use std::fmt;

/// Output offset to input offset, both in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub generated: u32,
    pub original: u32,
}

/// One resolved correspondence: an output offset and the file position it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapEntry {
    /// Byte offset in the packed output.
    pub generated: u32,
    /// Index into [`SourceMap::sources`].
    pub source: usize,
    /// Byte offset inside that source file.
    pub offset: u32,
}

/// A V3 mapping segment, all fields zero-based.
#[derive(Debug, Clone, Copy)]
struct Segment {
    generated_line: u32,
    generated_column: u32,
    source: u32,
    original_line: u32,
    original_column: u32,
}

/// Offsets from the packed output back into the files it was built from.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    file: Option<String>,
    sources: Vec<String>,
    entries: Vec<SourceMapEntry>,
    segments: Vec<Segment>,
    line_offset: u32,
}

impl SourceMap {
    /// Ordered by output offset.
    pub fn entries(&self) -> &[SourceMapEntry] {
        &self.entries
    }

    /// Source file names, ordered by their start offset in the input.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Name of the output file the map describes.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Conventional path of the map artifact: the output path plus `.map`.
    pub fn filename(&self) -> Option<String> {
        self.file.as_ref().map(|file| format!("{file}.map"))
    }

    /// Lines contributed by a header written before the packed output.
    pub fn line_offset(&self) -> u32 {
        self.line_offset
    }

    /// File and file offset of the token that covers `output_offset`.
    pub fn lookup(&self, output_offset: u32) -> Option<(&str, u32)> {
        let index = self
            .entries
            .partition_point(|entry| entry.generated <= output_offset)
            .checked_sub(1)?;
        let entry = &self.entries[index];
        Some((self.sources[entry.source].as_str(), entry.offset))
    }

    /// Encode the `mappings` field.
    fn encode_mappings(&self) -> String {
        let mut out = String::new();
        for _ in 0..self.line_offset {
            out.push(';');
        }

        let mut line = 0;
        let mut first_on_line = true;
        let mut prev_column: i64 = 0;
        let mut prev_source: i64 = 0;
        let mut prev_original_line: i64 = 0;
        let mut prev_original_column: i64 = 0;

        for segment in &self.segments {
            while line < segment.generated_line {
                out.push(';');
                line += 1;
                first_on_line = true;
                prev_column = 0;
            }
            if !first_on_line {
                out.push(',');
            }
            first_on_line = false;

            vlq_encode(i64::from(segment.generated_column) - prev_column, &mut out);
            vlq_encode(i64::from(segment.source) - prev_source, &mut out);
            vlq_encode(i64::from(segment.original_line) - prev_original_line, &mut out);
            vlq_encode(i64::from(segment.original_column) - prev_original_column, &mut out);

            prev_column = i64::from(segment.generated_column);
            prev_source = i64::from(segment.source);
            prev_original_line = i64::from(segment.original_line);
            prev_original_column = i64::from(segment.original_column);
        }
        out
    }
}

#[derive(Serialize)]
struct RawSourceMap<'a> {
    version: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    sources: &'a [String],
    names: [&'a str; 0],
    mappings: String,
}

/// Renders the V3 JSON document.
impl fmt::Display for SourceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = RawSourceMap {
            version: 3,
            file: self.file.as_deref(),
            sources: &self.sources,
            names: [],
            mappings: self.encode_mappings(),
        };
        let json = serde_json::to_string(&raw).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Collects file offsets and turns compactor mappings into a [`SourceMap`].
#[derive(Debug)]
pub struct SourceMapBuilder<'a> {
    input: &'a str,
    /// `(name, start offset)`, sorted by offset.
    files: Vec<(String, u32)>,
    output_file: Option<String>,
    line_offset: u32,
}

impl<'a> SourceMapBuilder<'a> {
    /// Start a map for the given (concatenated) input text.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            files: Vec::new(),
            output_file: None,
            line_offset: 0,
        }
    }

    /// Register the files making up the input and where each one starts.
    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        self.files
            .extend(files.into_iter().map(|(name, start)| (name.into(), start)));
        self.files.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        self
    }

    pub fn with_output_file(mut self, output_file: Option<String>) -> Self {
        self.output_file = output_file;
        self
    }

    pub fn with_line_offset(mut self, line_offset: u32) -> Self {
        self.line_offset = line_offset;
        self
    }

    /// Index of the file an input offset belongs to: the one with the
    /// greatest start not past the offset.
    fn file_at(&self, offset: u32) -> Option<usize> {
        self.files
            .partition_point(|(_, start)| *start <= offset)
            .checked_sub(1)
    }

    /// Resolve compactor mappings against the registered files. Offsets
    /// before the first file (or any offset, if no files were registered)
    /// produce no entry.
    pub fn build(self, output: &str, mappings: &[Mapping]) -> SourceMap {
        let input_lines = LineIndex::new(self.input);
        let output_lines = LineIndex::new(output);
        let file_starts: Vec<(u32, u32)> = self
            .files
            .iter()
            .map(|(_, start)| input_lines.line_col(*start))
            .collect();

        let mut entries = Vec::with_capacity(mappings.len());
        let mut segments = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            let Some(source) = self.file_at(mapping.original) else {
                continue;
            };
            let start = self.files[source].1;
            entries.push(SourceMapEntry {
                generated: mapping.generated,
                source,
                offset: mapping.original - start,
            });

            let (generated_line, generated_column) = output_lines.line_col(mapping.generated);
            let (line, column) = input_lines.line_col(mapping.original);
            let (start_line, start_column) = file_starts[source];
            let original_column = if line == start_line {
                column - start_column
            } else {
                column
            };
            segments.push(Segment {
                generated_line,
                generated_column,
                source: source as u32,
                original_line: line - start_line,
                original_column,
            });
        }
        entries.sort_by_key(|entry| entry.generated);
        segments.sort_by_key(|s| (s.generated_line, s.generated_column));

        SourceMap {
            file: self.output_file,
            sources: self.files.into_iter().map(|(name, _)| name).collect(),
            entries,
            segments,
            line_offset: self.line_offset,
        }
    }
}

/// VLQ-encode a signed integer and append to output string.
fn vlq_encode(value: i64, out: &mut String) {
    const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20; // continuation bit
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappings(pairs: &[(u32, u32)]) -> Vec<Mapping> {
        pairs
            .iter()
            .map(|&(generated, original)| Mapping { generated, original })
            .collect()
    }

    #[test]
    fn test_vlq_encode_positive() {
        let mut out = String::new();
        vlq_encode(1, &mut out);
        assert_eq!(out, "C");
    }

    #[test]
    fn test_vlq_encode_negative() {
        let mut out = String::new();
        vlq_encode(-1, &mut out);
        assert_eq!(out, "D");
    }

    #[test]
    fn test_vlq_encode_large() {
        let mut out = String::new();
        vlq_encode(0, &mut out);
        vlq_encode(16, &mut out);
        assert_eq!(out, "AgB");
    }

    #[test]
    fn test_offsets_resolve_to_files() {
        // "a.js" is "x=1;\n", "b.js" starts at 5
        let input = "x=1;\ny = 2;\n";
        let map = SourceMapBuilder::new(input)
            .with_files([("b.js", 5), ("a.js", 0)])
            .build("x=1;y=2;", &mappings(&[(0, 0), (4, 5), (5, 7), (6, 9)]));

        assert_eq!(map.sources(), ["a.js", "b.js"]);
        let resolved: Vec<(u32, usize, u32)> =
            map.entries().iter().map(|e| (e.generated, e.source, e.offset)).collect();
        assert_eq!(resolved, vec![(0, 0, 0), (4, 1, 0), (5, 1, 2), (6, 1, 4)]);
    }

    #[test]
    fn test_lookup() {
        let input = "var a;\nvar b;\n";
        let map = SourceMapBuilder::new(input)
            .with_files([("one.js", 0), ("two.js", 7)])
            .build("var a;var b;", &mappings(&[(0, 0), (4, 4), (6, 7), (10, 11)]));

        assert_eq!(map.lookup(0), Some(("one.js", 0)));
        assert_eq!(map.lookup(5), Some(("one.js", 4)));
        assert_eq!(map.lookup(7), Some(("two.js", 0)));
        assert_eq!(map.lookup(11), Some(("two.js", 4)));
    }

    #[test]
    fn test_no_files_no_entries() {
        let map = SourceMapBuilder::new("a").build("a", &mappings(&[(0, 0)]));
        assert!(map.entries().is_empty());
        assert_eq!(map.lookup(0), None);
    }

    #[test]
    fn test_filename_appends_map_suffix() {
        let map = SourceMapBuilder::new("")
            .with_output_file(Some("dist/app.js".to_string()))
            .build("", &[]);
        assert_eq!(map.filename().as_deref(), Some("dist/app.js.map"));
        assert_eq!(SourceMap::default().filename(), None);
    }

    #[test]
    fn test_v3_json() {
        let input = "a;\nb;\n";
        let map = SourceMapBuilder::new(input)
            .with_files([("in.js", 0)])
            .with_output_file(Some("out.js".to_string()))
            .with_line_offset(1)
            .build("a;\nb;", &mappings(&[(0, 0), (1, 1), (3, 3), (4, 4)]));

        let json: serde_json::Value = serde_json::from_str(&map.to_string()).unwrap();
        assert_eq!(json["version"], 3);
        assert_eq!(json["file"], "out.js");
        assert_eq!(json["sources"], serde_json::json!(["in.js"]));
        // header line, then "a;" and "b;" on their own lines
        assert_eq!(json["mappings"], ";AAAA,CAAC;AACD,CAAC");
    }
}
