//! Lexer (tokenizer) for the compactor.
//!
//! Unlike a parser's lexer this one never drops anything: whitespace, line
//! breaks and comments come out as tokens, so the concatenated token texts
//! reproduce the input exactly.
//!
//! Regex-vs-division is decided from the last significant token: after an
//! operand (`x`, `1`, `)`, `]`, `}`, `this`, ...) a `/` is division, anywhere
//! else it starts a regular expression literal.

use crate::error::{LexError, LexErrorReason};
use crate::span::Span;
use crate::token::{keyword_from_str, CommentKind, TemplatePart, Token, TokenKind};
use unicode_xid::UnicodeXID;

/// Operators and delimiters, longest first so the first match is the longest.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-",
    "*", "/", "%", "&", "|", "^", "!", "~", "?", ":", "=", ".", "@", "#",
];

/// The lexer state.
///
/// Cloning a lexer snapshots it; the clone replays the same tokens from the
/// same position.
#[derive(Clone)]
pub struct Lexer<'a> {
    /// Source text.
    source: &'a str,
    /// Source as bytes (for fast indexing).
    bytes: &'a [u8],
    /// Current byte position.
    pos: usize,
    /// Last non-trivia token, used to tell `/regex/` from `a / b`.
    last_significant: Option<Token<'a>>,
    /// Number of currently open `{` (including template substitutions).
    brace_depth: u32,
    /// Brace depth at which each open `${` substitution resumes its template.
    template_stack: Vec<u32>,
    /// Set after the first error or at end of input.
    done: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            last_significant: None,
            brace_depth: 0,
            template_stack: Vec::new(),
            done: false,
        }
    }

    /// Get the current byte position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Lex the whole input.
    pub fn tokenize(source: &'a str) -> Result<Vec<Token<'a>>, LexError> {
        Lexer::new(source).collect()
    }

    /// Get the next token, `Ok(None)` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, LexError> {
        if self.is_eof() {
            if !self.template_stack.is_empty() {
                return Err(self.error(self.pos, LexErrorReason::UnterminatedTemplate));
            }
            return Ok(None);
        }

        let start = self.pos;
        let ch = self.current_char();
        let kind = match ch {
            c if is_line_terminator(c) || is_whitespace(c) => self.scan_whitespace(),
            '#' if start == 0 && self.peek_byte(1) == b'!' => self.scan_line_comment(),
            '/' if self.peek_byte(1) == b'/' => self.scan_line_comment(),
            '/' if self.peek_byte(1) == b'*' => self.scan_block_comment()?,
            c if is_ident_start(c) || c == '\\' => self.scan_identifier()?,
            '0'..='9' => self.scan_number()?,
            '.' if self.peek_byte(1).is_ascii_digit() => self.scan_number()?,
            '"' | '\'' => self.scan_string(ch as u8)?,
            '`' => {
                self.pos += 1;
                self.scan_template(true)?
            }
            '}' if self.template_stack.last() == Some(&self.brace_depth) => {
                self.template_stack.pop();
                self.pos += 1;
                self.scan_template(false)?
            }
            '/' if self.regex_allowed() => self.scan_regex()?,
            _ => self.scan_punctuator(ch)?,
        };

        let span = Span::new(start as u32, self.pos as u32);
        let token = Token::new(kind, &self.source[span.range()], span);
        if !kind.is_trivia() {
            self.last_significant = Some(token);
        }
        Ok(Some(token))
    }

    // === Helper methods ===

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek_byte(&self, n: usize) -> u8 {
        self.bytes.get(self.pos + n).copied().unwrap_or(0)
    }

    fn current_char(&self) -> char {
        self.source[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance_char(&mut self) {
        self.pos += self.current_char().len_utf8();
    }

    fn error(&self, offset: usize, reason: LexErrorReason) -> LexError {
        LexError::new(offset, reason)
    }

    fn regex_allowed(&self) -> bool {
        self.last_significant.map_or(true, |t| !t.ends_operand())
    }

    // === Whitespace and comments ===

    fn scan_whitespace(&mut self) -> TokenKind {
        let mut newline = false;
        while !self.is_eof() {
            let c = self.current_char();
            if is_line_terminator(c) {
                newline = true;
            } else if !is_whitespace(c) {
                break;
            }
            self.advance_char();
        }
        if newline {
            TokenKind::Newline
        } else {
            TokenKind::Whitespace
        }
    }

    fn scan_line_comment(&mut self) -> TokenKind {
        self.pos += 2; // Skip // or #!
        while !self.is_eof() && !is_line_terminator(self.current_char()) {
            self.advance_char();
        }
        TokenKind::Comment(CommentKind::Line)
    }

    fn scan_block_comment(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 2; // Skip /*
        let mut multiline = false;
        while !self.is_eof() {
            if self.bytes[self.pos] == b'*' && self.peek_byte(1) == b'/' {
                self.pos += 2;
                let text = &self.source[start..self.pos];
                if text.len() >= 6 && text.starts_with("/*@") && text.ends_with("@*/") {
                    return Ok(TokenKind::Comment(CommentKind::Conditional));
                }
                return Ok(TokenKind::Comment(CommentKind::Block { multiline }));
            }
            if is_line_terminator(self.current_char()) {
                multiline = true;
            }
            self.advance_char();
        }
        Err(self.error(start, LexErrorReason::UnterminatedComment))
    }

    // === Token scanning ===

    fn scan_identifier(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        let mut first = true;
        while !self.is_eof() {
            let c = self.current_char();
            if c == '\\' {
                self.scan_identifier_escape()?;
            } else if (first && is_ident_start(c)) || (!first && is_ident_continue(c)) {
                self.advance_char();
            } else {
                break;
            }
            first = false;
        }

        let ident = &self.source[start..self.pos];
        Ok(keyword_from_str(ident).map_or(TokenKind::Identifier, TokenKind::Keyword))
    }

    /// `\uXXXX` or `\u{X...}` inside an identifier.
    fn scan_identifier_escape(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        if self.peek_byte(1) != b'u' {
            return Err(self.error(start, LexErrorReason::InvalidCharacter('\\')));
        }
        self.pos += 2;
        if self.peek_byte(0) == b'{' {
            self.pos += 1;
            let digits = self.pos;
            while self.peek_byte(0).is_ascii_hexdigit() {
                self.pos += 1;
            }
            if self.pos == digits || self.peek_byte(0) != b'}' {
                return Err(self.error(start, LexErrorReason::InvalidCharacter('\\')));
            }
            self.pos += 1;
        } else {
            for _ in 0..4 {
                if !self.peek_byte(0).is_ascii_hexdigit() {
                    return Err(self.error(start, LexErrorReason::InvalidCharacter('\\')));
                }
                self.pos += 1;
            }
        }
        Ok(())
    }

    fn scan_number(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;

        if self.peek_byte(0) == b'0' {
            let radix = match self.peek_byte(1) {
                b'x' | b'X' => Some(16),
                b'o' | b'O' => Some(8),
                b'b' | b'B' => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                if self.scan_digits(radix) == 0 {
                    return Err(self.error(start, LexErrorReason::MalformedNumber));
                }
                if self.peek_byte(0) == b'n' {
                    self.pos += 1;
                }
                return self.finish_number(start);
            }
        }

        // Integer part (may be empty for `.5`)
        self.scan_digits(10);

        let mut is_integer = true;
        if self.peek_byte(0) == b'.' {
            is_integer = false;
            self.pos += 1;
            self.scan_digits(10);
        }

        if matches!(self.peek_byte(0), b'e' | b'E') {
            is_integer = false;
            self.pos += 1;
            if matches!(self.peek_byte(0), b'+' | b'-') {
                self.pos += 1;
            }
            if self.scan_digits(10) == 0 {
                return Err(self.error(start, LexErrorReason::MalformedNumber));
            }
        }

        if is_integer && self.peek_byte(0) == b'n' {
            self.pos += 1;
        }

        self.finish_number(start)
    }

    /// Scan digits of the given radix with `_` separators; returns how many
    /// digits were consumed.
    fn scan_digits(&mut self, radix: u32) -> usize {
        let mut count = 0;
        loop {
            let b = self.peek_byte(0);
            if (b as char).is_digit(radix) {
                count += 1;
                self.pos += 1;
            } else if b == b'_' && count > 0 && (self.peek_byte(1) as char).is_digit(radix) {
                self.pos += 1;
            } else {
                return count;
            }
        }
    }

    fn finish_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        if !self.is_eof() {
            let c = self.current_char();
            if is_ident_start(c) || c.is_ascii_digit() || c == '\\' {
                return Err(self.error(start, LexErrorReason::MalformedNumber));
            }
        }
        Ok(TokenKind::Number)
    }

    fn scan_string(&mut self, quote: u8) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 1; // Skip opening quote

        while !self.is_eof() {
            match self.bytes[self.pos] {
                b if b == quote => {
                    self.pos += 1;
                    return Ok(TokenKind::String);
                }
                b'\\' => {
                    self.pos += 1;
                    self.skip_escaped_char();
                }
                b'\n' | b'\r' => break,
                _ => self.advance_char(),
            }
        }

        Err(self.error(start, LexErrorReason::UnterminatedString))
    }

    /// Skip the character after a backslash; `\r\n` counts as one.
    fn skip_escaped_char(&mut self) {
        if self.is_eof() {
            return;
        }
        if self.bytes[self.pos] == b'\r' && self.peek_byte(1) == b'\n' {
            self.pos += 2;
        } else {
            self.advance_char();
        }
    }

    /// Scan a template chunk; the opening `` ` `` or `}` is already consumed.
    fn scan_template(&mut self, head: bool) -> Result<TokenKind, LexError> {
        let start = self.pos - 1;

        while !self.is_eof() {
            match self.bytes[self.pos] {
                b'`' => {
                    self.pos += 1;
                    let part = if head { TemplatePart::NoSubstitution } else { TemplatePart::Tail };
                    return Ok(TokenKind::Template(part));
                }
                b'$' if self.peek_byte(1) == b'{' => {
                    self.pos += 2;
                    self.template_stack.push(self.brace_depth);
                    let part = if head { TemplatePart::Head } else { TemplatePart::Middle };
                    return Ok(TokenKind::Template(part));
                }
                b'\\' => {
                    self.pos += 1;
                    self.skip_escaped_char();
                }
                _ => self.advance_char(),
            }
        }

        Err(self.error(start, LexErrorReason::UnterminatedTemplate))
    }

    fn scan_regex(&mut self) -> Result<TokenKind, LexError> {
        let start = self.pos;
        self.pos += 1; // Skip opening /

        let mut in_class = false;
        loop {
            if self.is_eof() || is_line_terminator(self.current_char()) {
                return Err(self.error(start, LexErrorReason::UnterminatedRegex));
            }
            match self.bytes[self.pos] {
                b'/' if !in_class => break,
                b'[' => in_class = true,
                b']' => in_class = false,
                b'\\' => {
                    self.pos += 1;
                    if self.is_eof() || is_line_terminator(self.current_char()) {
                        return Err(self.error(start, LexErrorReason::UnterminatedRegex));
                    }
                }
                _ => {}
            }
            self.advance_char();
        }
        self.pos += 1; // Skip closing /

        // Flags
        while !self.is_eof() && is_ident_continue(self.current_char()) {
            self.advance_char();
        }

        Ok(TokenKind::Regex)
    }

    fn scan_punctuator(&mut self, ch: char) -> Result<TokenKind, LexError> {
        let rest = &self.source[self.pos..];
        let punct = PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(**p))
            // `a?.5:b` is a conditional, not optional chaining
            .filter(|p| !(**p == "?." && self.peek_byte(2).is_ascii_digit()))
            .copied()
            .or_else(|| rest.starts_with('?').then_some("?"));

        let Some(punct) = punct else {
            return Err(self.error(self.pos, LexErrorReason::InvalidCharacter(ch)));
        };
        match punct {
            "{" => self.brace_depth += 1,
            "}" => self.brace_depth = self.brace_depth.saturating_sub(1),
            _ => {}
        }
        self.pos += punct.len();
        Ok(TokenKind::Punctuator)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// === Character classes ===

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{0B}' | '\u{0C}' | '\u{A0}' | '\u{FEFF}')
        || (!c.is_ascii() && c.is_whitespace() && !is_line_terminator(c))
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '$' || c == '_' || (!c.is_ascii() && c.is_xid_start())
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '$'
        || c == '_'
        || c == '\u{200C}'
        || c == '\u{200D}'
        || (!c.is_ascii() && c.is_xid_continue())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Keyword;

    fn significant(source: &str) -> Vec<(TokenKind, &str)> {
        Lexer::tokenize(source)
            .unwrap()
            .into_iter()
            .filter(|t| !t.is_trivia())
            .map(|t| (t.kind, t.text))
            .collect()
    }

    fn lex_error(source: &str) -> LexError {
        Lexer::tokenize(source).unwrap_err()
    }

    #[test]
    fn test_tokens_cover_every_byte() {
        let source = "var a = 1; // note\n/* block */ b = 'x' + `t${a}`;\r\n";
        let tokens = Lexer::tokenize(source).unwrap();
        let joined: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(joined, source);
        for pair in tokens.windows(2) {
            assert_eq!(pair[0].span.end, pair[1].span.start);
        }
        for token in &tokens {
            assert_eq!(&source[token.span.range()], token.text);
        }
    }

    #[test]
    fn test_identifiers_and_keywords() {
        assert_eq!(
            significant("foo _bar $baz var of"),
            vec![
                (TokenKind::Identifier, "foo"),
                (TokenKind::Identifier, "_bar"),
                (TokenKind::Identifier, "$baz"),
                (TokenKind::Keyword(Keyword::Var), "var"),
                (TokenKind::Identifier, "of"),
            ]
        );
    }

    #[test]
    fn test_unicode_identifiers() {
        assert_eq!(
            significant("café \\u0061bc"),
            vec![(TokenKind::Identifier, "café"), (TokenKind::Identifier, "\\u0061bc")]
        );
    }

    #[test]
    fn test_numbers() {
        let tokens = significant("42 3.14 .5 1e10 2E-3 0xff 0b101 0o77 1_000 10n 017");
        assert_eq!(tokens.len(), 11);
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Number));
        assert_eq!(tokens[5].1, "0xff");
    }

    #[test]
    fn test_malformed_numbers() {
        assert_eq!(lex_error("0x").reason, LexErrorReason::MalformedNumber);
        assert_eq!(lex_error("1e+").reason, LexErrorReason::MalformedNumber);
        assert_eq!(lex_error("3in x").reason, LexErrorReason::MalformedNumber);
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            significant(r#""he said \"hi\"" 'it\'s'"#),
            vec![
                (TokenKind::String, r#""he said \"hi\"""#),
                (TokenKind::String, r"'it\'s'"),
            ]
        );
    }

    #[test]
    fn test_line_continuation_in_string() {
        assert_eq!(significant("'a\\\nb'"), vec![(TokenKind::String, "'a\\\nb'")]);
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex_error("x = 'abc");
        assert_eq!(err.reason, LexErrorReason::UnterminatedString);
        assert_eq!(err.offset, 4);
        assert_eq!(lex_error("'abc\ndef'").reason, LexErrorReason::UnterminatedString);
    }

    #[test]
    fn test_unterminated_comment() {
        let err = lex_error("a /* never closed");
        assert_eq!(err.reason, LexErrorReason::UnterminatedComment);
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_regex_vs_division() {
        assert_eq!(
            significant("a / b / c"),
            vec![
                (TokenKind::Identifier, "a"),
                (TokenKind::Punctuator, "/"),
                (TokenKind::Identifier, "b"),
                (TokenKind::Punctuator, "/"),
                (TokenKind::Identifier, "c"),
            ]
        );
        assert_eq!(
            significant("x = /b[/]c/gi.test(s)")[2],
            (TokenKind::Regex, "/b[/]c/gi")
        );
        assert_eq!(significant("return /x/")[1], (TokenKind::Regex, "/x/"));
        assert_eq!(significant("(a) / 2")[3], (TokenKind::Punctuator, "/"));
    }

    #[test]
    fn test_regex_after_comment_uses_last_significant_token() {
        assert_eq!(significant("x = /* c */ /re/")[2], (TokenKind::Regex, "/re/"));
    }

    #[test]
    fn test_unterminated_regex() {
        assert_eq!(lex_error("x = /abc\n/").reason, LexErrorReason::UnterminatedRegex);
    }

    #[test]
    fn test_longest_operator_match() {
        assert_eq!(
            significant("a >>>= b === c ?. d"),
            vec![
                (TokenKind::Identifier, "a"),
                (TokenKind::Punctuator, ">>>="),
                (TokenKind::Identifier, "b"),
                (TokenKind::Punctuator, "==="),
                (TokenKind::Identifier, "c"),
                (TokenKind::Punctuator, "?."),
                (TokenKind::Identifier, "d"),
            ]
        );
        assert_eq!(significant("a?.5:b")[1], (TokenKind::Punctuator, "?"));
    }

    #[test]
    fn test_comments_and_newlines() {
        let tokens = Lexer::tokenize("a // line\n/* x\ny */ b /*@cc_on@*/").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Comment(CommentKind::Line)));
        assert!(kinds.contains(&TokenKind::Newline));
        assert!(kinds.contains(&TokenKind::Comment(CommentKind::Block { multiline: true })));
        assert!(kinds.contains(&TokenKind::Comment(CommentKind::Conditional)));
    }

    #[test]
    fn test_template_literal_parts() {
        assert_eq!(
            significant("`a${ {b: 1}.b }c${d}e`"),
            vec![
                (TokenKind::Template(TemplatePart::Head), "`a${"),
                (TokenKind::Punctuator, "{"),
                (TokenKind::Identifier, "b"),
                (TokenKind::Punctuator, ":"),
                (TokenKind::Number, "1"),
                (TokenKind::Punctuator, "}"),
                (TokenKind::Punctuator, "."),
                (TokenKind::Identifier, "b"),
                (TokenKind::Template(TemplatePart::Middle), "}c${"),
                (TokenKind::Identifier, "d"),
                (TokenKind::Template(TemplatePart::Tail), "}e`"),
            ]
        );
        assert_eq!(lex_error("`abc${x").reason, LexErrorReason::UnterminatedTemplate);
    }

    #[test]
    fn test_invalid_character() {
        let err = lex_error("a \u{0} b");
        assert_eq!(err.reason, LexErrorReason::InvalidCharacter('\u{0}'));
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_replay_from_clone() {
        let mut lexer = Lexer::new("a + b");
        lexer.next();
        let snapshot = lexer.clone();
        let rest: Vec<_> = lexer.map(|t| t.unwrap().text).collect();
        let replay: Vec<_> = snapshot.map(|t| t.unwrap().text).collect();
        assert_eq!(rest, replay);
        assert_eq!(rest, vec![" ", "+", " ", "b"]);
    }
}
