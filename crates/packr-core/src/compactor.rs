//! Whitespace and comment compaction.
//!
//! Walks the full token stream and re-emits only the significant tokens,
//! separated by the least whitespace that keeps them apart:
//! - a space only where two tokens would otherwise merge (`var a`, `a+ +b`)
//! - a newline only where a line break ends a statement (`a\n++b`)
//! - a `;` after `return`/`break`/`continue`/`throw`/`yield` whose line ends
//!
//! A `;` right before `}` is dropped unless it is an empty statement body.

use crate::lexer::is_ident_continue;
use crate::sourcemap::Mapping;
use crate::token::{CommentKind, Keyword, Token, TokenKind};
use rustc_hash::FxHashMap;

/// Replacement text per token index, produced by the renaming passes.
pub type Replacements = FxHashMap<usize, String>;

/// Compactor output.
#[derive(Debug, Clone, Default)]
pub struct Compacted {
    pub code: String,
    /// One entry per emitted token, in output order.
    pub mappings: Vec<Mapping>,
}

/// Compact a token stream, substituting replacement texts where given.
pub fn compact(tokens: &[Token<'_>], replacements: &Replacements) -> Compacted {
    let mut compactor = Compactor::new(tokens.len());
    for (index, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Whitespace | TokenKind::Comment(CommentKind::Line) => {}
            TokenKind::Newline => compactor.line_break = true,
            TokenKind::Comment(CommentKind::Block { multiline }) => {
                compactor.line_break |= multiline;
            }
            TokenKind::Comment(CommentKind::Conditional) => {
                compactor.flush_semicolon();
                compactor.emit(token.text, token.span.start);
            }
            _ => {
                let text = replacements.get(&index).map_or(token.text, String::as_str);
                compactor.significant(token, text);
            }
        }
    }
    compactor.flush_semicolon();

    Compacted {
        code: compactor.output,
        mappings: compactor.mappings,
    }
}

/// A `;` that has been read but not yet written.
#[derive(Debug, Clone, Copy)]
struct PendingSemicolon {
    offset: u32,
    /// Empty statement body (`if(x);`), must survive a following `}`.
    keep: bool,
}

struct Compactor<'a> {
    output: String,
    mappings: Vec<Mapping>,
    /// Start of the last emitted chunk in `output`.
    last_start: usize,
    /// Last significant input token.
    prev: Option<Token<'a>>,
    /// `prev` is the `)` closing a control header or parameter list.
    prev_closes_header: bool,
    /// Saw `function`, its parameter list is the next `(`.
    function_head: bool,
    /// `prev` is `if`, `for`, `while`, `with`, `switch` or `catch`.
    prev_header_keyword: bool,
    /// One entry per open `(`: whether it opens a header.
    parens: Vec<bool>,
    /// A line terminator since `prev`.
    line_break: bool,
    pending: Option<PendingSemicolon>,
}

impl<'a> Compactor<'a> {
    fn new(token_count: usize) -> Self {
        Self {
            output: String::new(),
            mappings: Vec::with_capacity(token_count / 2),
            last_start: 0,
            prev: None,
            prev_closes_header: false,
            function_head: false,
            prev_header_keyword: false,
            parens: Vec::new(),
            line_break: false,
            pending: None,
        }
    }

    fn significant(&mut self, token: &Token<'a>, text: &str) {
        if token.is_punct(";") {
            self.flush_semicolon();
            let keep = self.prev_closes_header
                || self.prev.map_or(false, |p| {
                    p.is_keyword(Keyword::Else) || p.is_keyword(Keyword::Do) || p.is_punct(":")
                });
            self.pending = Some(PendingSemicolon {
                offset: token.span.start,
                keep,
            });
            self.advance(token);
            return;
        }

        if let Some(pending) = self.pending.take() {
            if pending.keep || !token.is_punct("}") {
                self.emit(";", pending.offset);
            }
        }

        if let Some(prev) = self.prev {
            if self.line_break {
                if matches!(prev.kind, TokenKind::Keyword(kw) if kw.is_restricted()) {
                    if !token.is_punct("}") {
                        self.emit_raw(";");
                    }
                } else if prev.ends_operand()
                    && !self.prev_closes_header
                    // `if(a)b()else c()` does not parse
                    && (token.starts_statement() || token.is_keyword(Keyword::Else))
                {
                    self.emit_raw("\n");
                }
            }
        }

        self.emit(text, token.span.start);
        self.advance(token);
    }

    /// Update header tracking after consuming a significant token.
    fn advance(&mut self, token: &Token<'a>) {
        self.prev_closes_header = false;
        let property = self.prev.map_or(false, |p| p.is_punct(".") || p.is_punct("?."));
        match token.kind {
            TokenKind::Keyword(Keyword::Function) if !property => self.function_head = true,
            TokenKind::Identifier => {}
            TokenKind::Punctuator if token.text == "*" => {}
            TokenKind::Punctuator if token.text == "(" => {
                let header = self.function_head || self.prev_header_keyword;
                self.function_head = false;
                self.parens.push(header);
            }
            TokenKind::Punctuator if token.text == ")" => {
                self.function_head = false;
                self.prev_closes_header = self.parens.pop().unwrap_or(false);
            }
            _ => self.function_head = false,
        }
        // `promise.catch(f)` is a call, not a header
        self.prev_header_keyword =
            !property && matches!(token.kind, TokenKind::Keyword(kw) if kw.has_header());
        self.prev = Some(*token);
        self.line_break = false;
    }

    fn flush_semicolon(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.emit(";", pending.offset);
        }
    }

    /// Emit a token's text, separated from the previous one if needed.
    fn emit(&mut self, text: &str, original: u32) {
        if needs_space(&self.output[self.last_start..], text) {
            self.output.push(' ');
        }
        self.last_start = self.output.len();
        self.mappings.push(Mapping {
            generated: self.output.len() as u32,
            original,
        });
        self.output.push_str(text);
    }

    /// Emit text that has no input counterpart.
    fn emit_raw(&mut self, text: &str) {
        self.last_start = self.output.len();
        self.output.push_str(text);
    }
}

fn is_word_char(c: char) -> bool {
    is_ident_continue(c) || c == '\\'
}

/// Would `prev` and `next` lex differently if written with nothing between?
fn needs_space(prev: &str, next: &str) -> bool {
    let (Some(a), Some(b)) = (prev.chars().next_back(), next.chars().next()) else {
        return false;
    };
    if is_word_char(a) && is_word_char(b) {
        return true;
    }
    match (a, b) {
        ('+', '+') | ('-', '-') | ('/', '/') | ('/', '*') | ('<', '!') => true,
        // `1 .toString()`
        (_, '.') => {
            prev.starts_with(|c: char| c.is_ascii_digit())
                && prev.bytes().all(|c| c.is_ascii_digit() || c == b'_')
        }
        _ => false,
    }
}
