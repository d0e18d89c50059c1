use thiserror::Error;

/// Error type for a pack operation. Every variant is fatal: no partial output
/// is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

impl PackError {
    /// Byte offset in the input the error points at, if any.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Lex(e) => Some(e.offset),
            Self::Scope(e) => Some(e.offset),
            Self::Encoding(_) => None,
        }
    }

    /// Stable SCREAMING_SNAKE_CASE code for machine-readable output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lex(_) => "LEX_ERROR",
            Self::Scope(_) => "SCOPE_ERROR",
            Self::Encoding(_) => "ENCODING_ERROR",
        }
    }
}

/// Malformed input found while tokenizing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub reason: LexErrorReason,
}

impl LexError {
    #[must_use]
    pub fn new(offset: usize, reason: LexErrorReason) -> Self {
        Self { offset, reason }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorReason {
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated template literal")]
    UnterminatedTemplate,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated regular expression")]
    UnterminatedRegex,
    #[error("malformed number literal")]
    MalformedNumber,
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Bracket structure that prevents scope resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at offset {offset}")]
pub struct ScopeError {
    pub offset: usize,
    pub reason: ScopeErrorReason,
}

impl ScopeError {
    #[must_use]
    pub fn new(offset: usize, reason: ScopeErrorReason) -> Self {
        Self { offset, reason }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScopeErrorReason {
    #[error("unexpected closing {0:?}")]
    UnexpectedClose(char),
    #[error("expected {expected:?} but found {found:?}")]
    Mismatched { expected: char, found: char },
    #[error("unclosed {0:?}")]
    Unclosed(char),
}

/// Failure while building the base62 payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("radix {0} is outside 2..=62")]
    InvalidRadix(u32),

    #[error("invalid word pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("dictionary word {0:?} contains the '|' delimiter")]
    DelimiterInWord(String),

    #[error("not a packed payload: {0}")]
    Malformed(String),

    #[error("payload does not decode back to its input (first difference at byte {0})")]
    RoundTrip(usize),
}
