//! packr-core: JavaScript compactor
//!
//! Packs script source in the style of Dean Edwards' packer, working on the
//! token stream rather than an AST.
//!
//! # Pipeline
//!
//! 1. **Lex** the whole input, trivia included
//! 2. **Private names** (optional): number every `_name` across the unit
//! 3. **Shrink** (optional): build the scope tree and give local bindings
//!    short names that cannot capture or be captured
//! 4. **Compact**: drop comments and whitespace, keeping the line breaks and
//!    semicolons that automatic semicolon insertion depends on
//! 5. **Base62** (optional): dictionary-encode into a self-decoding payload
//! 6. **Source map**: tie output offsets back to input files
//!
//! Every step is a pure function of its input; any error aborts the whole
//! pack and no partial output is returned.
//!
//! # Example
//!
//! ```
//! use packr_core::{pack, PackOptions};
//!
//! let options = PackOptions::new().with_shrink_vars(true);
//! let result = pack("var f = function(foo) { return foo; };", &options)?;
//! assert_eq!(result.code, "var f=function(a){return a};");
//! # Ok::<(), packr_core::PackError>(())
//! ```

mod base62;
mod compactor;
mod error;
mod lexer;
mod options;
mod scope;
mod shrink;
mod sourcemap;
mod span;
mod token;
pub mod version;

pub use base62::{encode_number, unpack, Base62Encoder, DEFAULT_RADIX, DEFAULT_WORD_PATTERN};
pub use compactor::{compact, Compacted, Replacements};
pub use error::{EncodingError, LexError, LexErrorReason, PackError, ScopeError, ScopeErrorReason};
pub use lexer::Lexer;
pub use options::{PackOptions, ProtectedNames, SUPER_ACCESSOR};
pub use scope::{Occurrence, Scope, ScopeId, ScopeKind, ScopeTree};
pub use shrink::{is_private, shrink, PrivateNames};
pub use sourcemap::{Mapping, SourceMap, SourceMapBuilder, SourceMapEntry};
pub use span::{LineIndex, Span};
pub use token::{CommentKind, Keyword, TemplatePart, Token, TokenKind, RESERVED_WORDS};

use tracing::{debug, debug_span};

/// Output of a pack operation.
#[derive(Debug, Clone)]
pub struct PackedResult {
    /// Packed script text.
    pub code: String,
    pub source_map: SourceMap,
}

/// Reusable packer configuration.
///
/// Holds only read-only state, so one `Packer` can serve any number of pack
/// calls, from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct Packer {
    protected: ProtectedNames,
}

impl Packer {
    #[must_use]
    pub fn new(protected: ProtectedNames) -> Self {
        Self { protected }
    }

    /// Protect more names in every pack done by this packer.
    #[must_use]
    pub fn with_protected_names<I, T>(self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self {
            protected: self.protected.with_extra(names),
        }
    }

    pub fn protected(&self) -> &ProtectedNames {
        &self.protected
    }

    /// Pack one unit of source text.
    pub fn pack(&self, source: &str, options: &PackOptions) -> Result<PackedResult, PackError> {
        let _span = debug_span!("pack", bytes_in = source.len()).entered();

        let encoder = options
            .base62
            .then(|| Base62Encoder::new(options.radix, &options.word_pattern))
            .transpose()?;

        let tokens = Lexer::tokenize(source)?;
        debug!(tokens = tokens.len(), "lexed");

        let protected = self.protected.with_extra(&options.protected_names);
        let private = options
            .private
            .then(|| PrivateNames::collect(&tokens, &options.private_prefix, &protected));
        let mut replacements = private
            .as_ref()
            .map(|names| names.replacements(&tokens))
            .unwrap_or_default();

        if options.shrink_vars {
            let tree = ScopeTree::build(&tokens)?;
            replacements.extend(shrink(&tree, &protected, private.as_ref()));
        }

        let compacted = compact(&tokens, &replacements);
        debug!(bytes_out = compacted.code.len(), "compacted");

        // Offsets inside a base62 payload do not correspond to tokens.
        let (code, mappings) = match encoder {
            Some(encoder) => (encoder.encode(&compacted.code)?, Vec::new()),
            None => (compacted.code, compacted.mappings),
        };

        let source_map = SourceMapBuilder::new(source)
            .with_files(
                options
                    .source_files
                    .iter()
                    .map(|(name, &offset)| (name.clone(), offset)),
            )
            .with_output_file(options.output_file.clone())
            .with_line_offset(options.line_offset)
            .build(&code, &mappings);

        Ok(PackedResult { code, source_map })
    }
}

/// Pack `source` with the built-in protected names.
pub fn pack(source: &str, options: &PackOptions) -> Result<PackedResult, PackError> {
    Packer::default().pack(source, options)
}
