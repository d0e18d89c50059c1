//! Token types for the compactor.
//!
//! Tokens cover every byte of the input, trivia included: the compactor needs
//! to see line breaks and comments to make its semicolon decisions.

use crate::span::Span;

/// A token with its kind, source text and location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub span: Span,
}

impl<'a> Token<'a> {
    /// Create a new token.
    #[inline]
    pub const fn new(kind: TokenKind, text: &'a str, span: Span) -> Self {
        Self { kind, text, span }
    }

    /// Whitespace, line breaks and comments.
    #[inline]
    pub fn is_trivia(&self) -> bool {
        self.kind.is_trivia()
    }

    /// Check for a specific punctuator.
    #[inline]
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.text == punct
    }

    /// Check for a specific keyword.
    #[inline]
    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        self.kind == TokenKind::Keyword(keyword)
    }

    /// Check for an identifier with the given text.
    #[inline]
    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == name
    }

    /// True if this token completes an operand, so that a following `/` is
    /// division and a following line break may end the statement.
    pub fn ends_operand(&self) -> bool {
        match self.kind {
            TokenKind::Identifier
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Regex
            | TokenKind::Template(TemplatePart::NoSubstitution | TemplatePart::Tail) => true,
            TokenKind::Keyword(kw) => kw.is_operand(),
            TokenKind::Punctuator => matches!(self.text, ")" | "]" | "}" | "++" | "--"),
            _ => false,
        }
    }

    /// True if this token can begin a statement that a preceding operand
    /// could not run into, i.e. automatic semicolon insertion would split
    /// the two at a line break.
    pub fn starts_statement(&self) -> bool {
        match self.kind {
            TokenKind::Identifier | TokenKind::Number | TokenKind::String | TokenKind::Regex => true,
            TokenKind::Keyword(kw) => !kw.continues_statement(),
            TokenKind::Punctuator => {
                matches!(self.text, "{" | "++" | "--" | "!" | "~" | "#" | "@")
            }
            _ => false,
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier: `foo`, `_bar`, `$baz`. Contextual words such as `of`,
    /// `get` or `async` are identifiers too.
    Identifier,
    /// Reserved word.
    Keyword(Keyword),
    /// String literal: `"hello"`, `'world'`
    String,
    /// A piece of a template literal.
    Template(TemplatePart),
    /// Regular expression: `/pattern/flags`
    Regex,
    /// Number literal: `42`, `3.14`, `0xff`, `10n`
    Number,
    /// Comment.
    Comment(CommentKind),
    /// Operator or delimiter, longest match.
    Punctuator,
    /// Run of whitespace with no line terminator.
    Whitespace,
    /// Run of whitespace containing at least one line terminator.
    Newline,
}

impl TokenKind {
    /// Whitespace, line breaks and comments.
    #[inline]
    pub fn is_trivia(&self) -> bool {
        matches!(self, Self::Whitespace | Self::Newline | Self::Comment(_))
    }
}

/// Which part of a template literal a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    /// `` `text` ``
    NoSubstitution,
    /// `` `text${ ``
    Head,
    /// `}text${`
    Middle,
    /// `` }text` ``
    Tail,
}

/// Comment flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// `// ...`
    Line,
    /// `/* ... */`; `multiline` is set when it spans a line terminator.
    Block { multiline: bool },
    /// `/*@ ... @*/` conditional compilation, kept in the output.
    Conditional,
}

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Enum,
    Export,
    Extends,
    False,
    Finally,
    For,
    Function,
    If,
    Import,
    In,
    Instanceof,
    Let,
    New,
    Null,
    Return,
    Super,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,
}

impl Keyword {
    /// Keywords that evaluate to a value on their own.
    pub fn is_operand(self) -> bool {
        matches!(
            self,
            Self::This | Self::Super | Self::Null | Self::True | Self::False
        )
    }

    /// Keywords whose operand may not follow a line break.
    pub fn is_restricted(self) -> bool {
        matches!(
            self,
            Self::Return | Self::Break | Self::Continue | Self::Throw | Self::Yield
        )
    }

    /// Keywords that can never begin a statement.
    pub fn continues_statement(self) -> bool {
        matches!(
            self,
            Self::In | Self::Instanceof | Self::Else | Self::Catch | Self::Finally
        )
    }

    /// Keywords whose parenthesised header is followed by a statement body.
    pub fn has_header(self) -> bool {
        matches!(
            self,
            Self::If | Self::For | Self::While | Self::With | Self::Switch | Self::Catch
        )
    }
}

/// Look up a keyword from an identifier string.
pub fn keyword_from_str(s: &str) -> Option<Keyword> {
    let kw = match s {
        "break" => Keyword::Break,
        "case" => Keyword::Case,
        "catch" => Keyword::Catch,
        "class" => Keyword::Class,
        "const" => Keyword::Const,
        "continue" => Keyword::Continue,
        "debugger" => Keyword::Debugger,
        "default" => Keyword::Default,
        "delete" => Keyword::Delete,
        "do" => Keyword::Do,
        "else" => Keyword::Else,
        "enum" => Keyword::Enum,
        "export" => Keyword::Export,
        "extends" => Keyword::Extends,
        "false" => Keyword::False,
        "finally" => Keyword::Finally,
        "for" => Keyword::For,
        "function" => Keyword::Function,
        "if" => Keyword::If,
        "import" => Keyword::Import,
        "in" => Keyword::In,
        "instanceof" => Keyword::Instanceof,
        "let" => Keyword::Let,
        "new" => Keyword::New,
        "null" => Keyword::Null,
        "return" => Keyword::Return,
        "super" => Keyword::Super,
        "switch" => Keyword::Switch,
        "this" => Keyword::This,
        "throw" => Keyword::Throw,
        "true" => Keyword::True,
        "try" => Keyword::Try,
        "typeof" => Keyword::Typeof,
        "var" => Keyword::Var,
        "void" => Keyword::Void,
        "while" => Keyword::While,
        "with" => Keyword::With,
        "yield" => Keyword::Yield,
        _ => return None,
    };
    Some(kw)
}

/// Words that may never be used as a generated name: every keyword plus the
/// strict-mode reserved words and the two strict-mode restricted bindings.
pub const RESERVED_WORDS: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue",
    "debugger", "default", "delete", "do", "else", "enum", "eval", "export",
    "extends", "false", "finally", "for", "function", "if", "implements",
    "import", "in", "instanceof", "interface", "let", "new", "null", "of",
    "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while",
    "with", "yield",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword_from_str("function"), Some(Keyword::Function));
        assert_eq!(keyword_from_str("of"), None);
        assert_eq!(keyword_from_str("async"), None);
    }

    #[test]
    fn test_keywords_are_reserved_words() {
        for word in ["break", "do", "if", "in", "var", "yield", "this", "instanceof"] {
            assert!(keyword_from_str(word).is_some(), "{word} should be a keyword");
            assert!(RESERVED_WORDS.contains(&word), "{word} should be reserved");
        }
    }

    #[test]
    fn test_ends_operand() {
        let close = Token::new(TokenKind::Punctuator, ")", Span::new(0, 1));
        let open = Token::new(TokenKind::Punctuator, "(", Span::new(0, 1));
        let this = Token::new(TokenKind::Keyword(Keyword::This), "this", Span::new(0, 4));
        let ret = Token::new(TokenKind::Keyword(Keyword::Return), "return", Span::new(0, 6));
        assert!(close.ends_operand());
        assert!(!open.ends_operand());
        assert!(this.ends_operand());
        assert!(!ret.ends_operand());
    }

    #[test]
    fn test_starts_statement() {
        let ident = Token::new(TokenKind::Identifier, "x", Span::new(0, 1));
        let incr = Token::new(TokenKind::Punctuator, "++", Span::new(0, 2));
        let paren = Token::new(TokenKind::Punctuator, "(", Span::new(0, 1));
        let in_kw = Token::new(TokenKind::Keyword(Keyword::In), "in", Span::new(0, 2));
        assert!(ident.starts_statement());
        assert!(incr.starts_statement());
        assert!(!paren.starts_statement());
        assert!(!in_kw.starts_statement());
    }
}
