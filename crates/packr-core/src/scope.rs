//! Scope analysis for identifier shrinking.
//!
//! Works directly on the token stream instead of an AST: bracket depth plus a
//! handful of keywords (`function`, `var`/`let`/`const`, `class`, `catch`,
//! `for`, `=>`) are enough to find where scopes open and close and which
//! identifiers declare names.
//!
//! Two phases:
//! 1. Collect: walk the tokens, build the scope tree, record every identifier
//!    occurrence that refers to a variable (declarations and references)
//! 2. Resolve: bind each occurrence to the nearest scope declaring its name
//!
//! Property names (`a.b`, `{b: 1}`), labels and `break`/`continue` targets
//! are not variables and produce no occurrence.

use crate::error::{ScopeError, ScopeErrorReason};
use crate::token::{CommentKind, Keyword, TemplatePart, Token, TokenKind};
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;

pub type ScopeId = usize;

const GLOBAL: ScopeId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
    Catch,
}

#[derive(Debug)]
pub struct Scope<'a> {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    /// Names declared in this scope, in declaration order.
    pub bindings: IndexSet<&'a str, FxBuildHasher>,
    /// `eval` or `with` is used here or in a nested scope.
    pub has_eval: bool,
    pub children: Vec<ScopeId>,
}

impl Scope<'_> {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            parent,
            kind,
            bindings: IndexSet::default(),
            has_eval: false,
            children: Vec::new(),
        }
    }
}

/// An identifier token that names a variable.
#[derive(Debug, Clone)]
pub struct Occurrence<'a> {
    /// Index into the token slice the tree was built from.
    pub token: usize,
    pub name: &'a str,
    /// Innermost scope the occurrence sits in.
    pub scope: ScopeId,
    /// Scope whose binding it refers to, `None` for globals.
    pub resolved: Option<ScopeId>,
    /// Shorthand property (`{a}`); a rename must keep the key: `{a:x}`.
    pub shorthand: bool,
}

#[derive(Debug)]
pub struct ScopeTree<'a> {
    pub scopes: Vec<Scope<'a>>,
    pub occurrences: Vec<Occurrence<'a>>,
}

impl<'a> ScopeTree<'a> {
    pub const GLOBAL: ScopeId = GLOBAL;

    /// Build the scope tree for a full token stream (trivia included).
    pub fn build(tokens: &[Token<'a>]) -> Result<Self, ScopeError> {
        let mut builder = Builder::new(tokens)?;
        for pos in 0..builder.sig.len() {
            builder.step(pos);
        }
        builder.resolve();
        Ok(ScopeTree {
            scopes: builder.scopes,
            occurrences: builder.occurrences,
        })
    }

    /// The scope itself followed by its ancestors up to the global scope.
    pub fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |&s| self.scopes[s].parent)
    }

    /// Whether bindings of this scope may be renamed.
    pub fn is_renamable(&self, scope: ScopeId) -> bool {
        scope != Self::GLOBAL && !self.scopes[scope].has_eval
    }
}

// =============================================================================
// Builder
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    /// Hoists to the nearest function scope.
    Var,
    /// Binds in the current scope.
    Lexical,
}

/// Binding slots of a destructuring pattern or parameter list.
#[derive(Debug, Clone, Copy)]
struct Pattern {
    kind: DeclKind,
    /// The next identifier at this level declares a name.
    expect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Root,
    Block,
    FunctionBody,
    Object,
    ClassBody,
    Paren,
    /// `(` after `if`, `while`, `with` or `switch`.
    Header,
    Params,
    ForHead,
    CatchParam,
    Bracket,
    ComputedKey,
    Template,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    kind: FrameKind,
    /// Scope to return to once the frame, or the body it introduces, ends.
    restore: ScopeId,
    pattern: Option<Pattern>,
    /// Object literal or class body waiting for a property name.
    at_key: bool,
    /// Open `?` still waiting for their `:`.
    ternary: u32,
}

impl Frame {
    fn new(kind: FrameKind, restore: ScopeId) -> Self {
        Self {
            kind,
            restore,
            pattern: None,
            at_key: matches!(kind, FrameKind::Object | FrameKind::ClassBody),
            ternary: 0,
        }
    }

    fn with_pattern(kind: FrameKind, restore: ScopeId, decl: DeclKind) -> Self {
        Self {
            pattern: Some(Pattern {
                kind: decl,
                // Object patterns start with a key, not a binding.
                expect: kind != FrameKind::Object,
            }),
            ..Self::new(kind, restore)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Function,
    Loop,
    Catch,
}

/// Header consumed, body not yet started.
#[derive(Debug, Clone, Copy)]
struct PendingBody {
    kind: BodyKind,
    restore: ScopeId,
}

/// A body without braces: arrow expression or single-statement loop.
#[derive(Debug, Clone, Copy)]
struct OpenBody {
    depth: usize,
    restore: ScopeId,
    ends_at_comma: bool,
}

/// `var`/`let`/`const` statement in progress.
#[derive(Debug, Clone, Copy)]
struct Declaration {
    kind: DeclKind,
    depth: usize,
    expect: bool,
}

struct Builder<'t, 'a> {
    tokens: &'t [Token<'a>],
    /// Indices of the significant tokens.
    sig: Vec<usize>,
    /// A line terminator precedes the significant token.
    newline_before: Vec<bool>,
    /// For every opening bracket, the position of its closer.
    matching: Vec<usize>,
    scopes: Vec<Scope<'a>>,
    occurrences: Vec<Occurrence<'a>>,
    current: ScopeId,
    frames: Vec<Frame>,
    declaration: Option<Declaration>,
    open_bodies: Vec<OpenBody>,
    pending_body: Option<PendingBody>,
    /// Function scope waiting for its `(`.
    next_params: Option<ScopeId>,
    /// Function scope waiting for its name, and whether it is a declaration.
    function_name: Option<(ScopeId, bool)>,
    catch_scope: Option<ScopeId>,
    /// Depth at which a class body `{` is expected.
    class_body: Option<usize>,
    class_declaration: bool,
    /// The last `:` separated a value (object key or ternary).
    colon_value: bool,
    /// The previous token closed a header or parameter list.
    closed_header: bool,
}

impl<'t, 'a> Builder<'t, 'a> {
    fn new(tokens: &'t [Token<'a>]) -> Result<Self, ScopeError> {
        let mut sig = Vec::new();
        let mut newline_before = Vec::new();
        let mut line_break = false;
        for (index, token) in tokens.iter().enumerate() {
            match token.kind {
                TokenKind::Newline => line_break = true,
                TokenKind::Comment(CommentKind::Block { multiline: true }) => {
                    line_break = true;
                }
                _ if token.is_trivia() => {}
                _ => {
                    sig.push(index);
                    newline_before.push(std::mem::take(&mut line_break));
                }
            }
        }
        let matching = match_brackets(tokens, &sig)?;

        Ok(Self {
            tokens,
            sig,
            newline_before,
            matching,
            scopes: vec![Scope::new(ScopeKind::Global, None)],
            occurrences: Vec::new(),
            current: GLOBAL,
            frames: vec![Frame::new(FrameKind::Root, GLOBAL)],
            declaration: None,
            open_bodies: Vec::new(),
            pending_body: None,
            next_params: None,
            function_name: None,
            catch_scope: None,
            class_body: None,
            class_declaration: false,
            colon_value: false,
            closed_header: false,
        })
    }

    // === Token access ===

    fn tok(&self, pos: usize) -> Token<'a> {
        self.tokens[self.sig[pos]]
    }

    fn prev(&self, pos: usize) -> Option<Token<'a>> {
        pos.checked_sub(1).map(|p| self.tok(p))
    }

    fn next(&self, pos: usize) -> Option<Token<'a>> {
        (pos + 1 < self.sig.len()).then(|| self.tok(pos + 1))
    }

    fn next_is(&self, pos: usize, punct: &str) -> bool {
        self.next(pos).map_or(false, |t| t.is_punct(punct))
    }

    /// The token follows `.` or `?.`, so it names a property.
    fn after_dot(&self, pos: usize) -> bool {
        self.prev(pos).map_or(false, |p| p.is_punct(".") || p.is_punct("?."))
    }

    /// Keyword right before `pos`, unless it is a property name itself.
    fn prev_keyword(&self, pos: usize) -> Option<Keyword> {
        match self.prev(pos)?.kind {
            TokenKind::Keyword(kw) if !self.after_dot(pos - 1) => Some(kw),
            _ => None,
        }
    }

    fn top(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    fn top_kind(&self) -> FrameKind {
        self.frames.last().map_or(FrameKind::Root, |f| f.kind)
    }

    fn at_key(&self) -> bool {
        self.frames
            .last()
            .map_or(false, |f| f.at_key && matches!(f.kind, FrameKind::Object | FrameKind::ClassBody))
    }

    /// A line break here ends the statement before it.
    fn asi_break(&self, pos: usize) -> bool {
        pos > 0
            && self.newline_before[pos]
            && self.tok(pos - 1).ends_operand()
            && self.tok(pos).starts_statement()
    }

    // === Scope bookkeeping ===

    fn add_scope(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope::new(kind, Some(self.current)));
        self.scopes[self.current].children.push(id);
        id
    }

    /// Nearest function (or the global) scope, where `var` lands.
    fn hoist_target(&self, scope: ScopeId) -> ScopeId {
        let mut current = scope;
        while matches!(self.scopes[current].kind, ScopeKind::Block | ScopeKind::Catch) {
            match self.scopes[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Mark a scope (and all ancestors) as having eval.
    fn mark_eval(&mut self, scope: ScopeId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            self.scopes[id].has_eval = true;
            current = self.scopes[id].parent;
        }
    }

    fn declare(&mut self, pos: usize, kind: DeclKind, shorthand: bool) {
        let target = match kind {
            DeclKind::Var => self.hoist_target(self.current),
            DeclKind::Lexical => self.current,
        };
        self.declare_in(pos, target, self.current, shorthand);
    }

    fn declare_in(&mut self, pos: usize, target: ScopeId, scope: ScopeId, shorthand: bool) {
        let name = self.tok(pos).text;
        self.scopes[target].bindings.insert(name);
        self.push_occurrence(pos, scope, shorthand);
    }

    fn push_occurrence(&mut self, pos: usize, scope: ScopeId, shorthand: bool) {
        self.occurrences.push(Occurrence {
            token: self.sig[pos],
            name: self.tok(pos).text,
            scope,
            resolved: None,
            shorthand,
        });
    }

    /// Take the binding slot at the current position, if there is one.
    fn take_binding_slot(&mut self) -> Option<DeclKind> {
        let depth = self.frames.len();
        if let Some(pattern) = &mut self.top().pattern {
            if pattern.expect {
                pattern.expect = false;
                return Some(pattern.kind);
            }
        }
        match &mut self.declaration {
            Some(decl) if decl.depth == depth && decl.expect => {
                decl.expect = false;
                Some(decl.kind)
            }
            _ => None,
        }
    }

    /// End braceless bodies open at `depth` or deeper.
    fn end_open_bodies(&mut self, depth: usize, comma: bool) {
        while let Some(body) = self.open_bodies.last().copied() {
            if body.depth < depth || (comma && !body.ends_at_comma) {
                break;
            }
            self.current = body.restore;
            self.open_bodies.pop();
        }
    }

    fn end_statement(&mut self) {
        let depth = self.frames.len();
        if self.declaration.map_or(false, |d| d.depth >= depth) {
            self.declaration = None;
        }
        self.end_open_bodies(depth, false);
        let top = self.top();
        top.ternary = 0;
        if top.kind == FrameKind::ClassBody {
            top.at_key = true;
        }
    }

    // === Collect ===

    fn step(&mut self, pos: usize) {
        let token = self.tok(pos);
        if !std::mem::take(&mut self.closed_header) && self.asi_break(pos) {
            self.end_statement();
        }

        if let Some(body) = self.pending_body {
            if !token.is_punct("{") && !token.is_punct("=>") {
                self.pending_body = None;
                match body.kind {
                    BodyKind::Loop => self.open_bodies.push(OpenBody {
                        depth: self.frames.len(),
                        restore: body.restore,
                        ends_at_comma: false,
                    }),
                    BodyKind::Function | BodyKind::Catch => self.current = body.restore,
                }
            }
        }

        match token.kind {
            TokenKind::Punctuator => self.punctuator(pos, token),
            TokenKind::Identifier | TokenKind::Keyword(_) => self.word(pos, token),
            TokenKind::String | TokenKind::Number if self.at_key() => self.key(pos, token),
            TokenKind::Template(TemplatePart::Head) => {
                let restore = self.current;
                self.frames.push(Frame::new(FrameKind::Template, restore));
            }
            TokenKind::Template(TemplatePart::Middle) => {
                self.end_open_bodies(self.frames.len(), false);
                self.top().ternary = 0;
            }
            TokenKind::Template(TemplatePart::Tail) => self.close(pos),
            _ => {}
        }
    }

    fn word(&mut self, pos: usize, token: Token<'a>) {
        if self.after_dot(pos) {
            return;
        }
        if self.prev(pos).map_or(false, |p| p.is_punct("#")) {
            if self.at_key() {
                self.key(pos, token);
            }
            return;
        }

        if token.kind == TokenKind::Identifier {
            if let Some(kind) = self.take_binding_slot() {
                self.declare(pos, kind, false);
                return;
            }
        } else if self
            .declaration
            .map_or(false, |d| d.expect && d.depth == self.frames.len())
        {
            self.declaration = None;
        }

        if self.at_key() {
            self.key(pos, token);
            return;
        }

        match token.kind {
            TokenKind::Keyword(kw) => self.keyword(pos, kw),
            _ => self.identifier(pos, token),
        }
    }

    fn keyword(&mut self, pos: usize, kw: Keyword) {
        let depth = self.frames.len();
        match kw {
            Keyword::Var | Keyword::Let | Keyword::Const => {
                let kind = if kw == Keyword::Var { DeclKind::Var } else { DeclKind::Lexical };
                self.declaration = Some(Declaration {
                    kind,
                    depth,
                    expect: true,
                });
            }
            Keyword::Function => {
                let declaration = self.is_declaration_position(pos);
                let scope = self.add_scope(ScopeKind::Function);
                self.next_params = Some(scope);
                self.function_name = Some((scope, declaration));
            }
            Keyword::Class => {
                self.class_declaration = self.is_declaration_position(pos);
                self.class_body = Some(depth);
            }
            Keyword::Catch => {
                let scope = self.add_scope(ScopeKind::Catch);
                if self.next_is(pos, "(") {
                    self.catch_scope = Some(scope);
                } else {
                    self.pending_body = Some(PendingBody {
                        kind: BodyKind::Catch,
                        restore: self.current,
                    });
                    self.current = scope;
                }
            }
            Keyword::With => self.mark_eval(self.current),
            Keyword::In => {
                if self.declaration.map_or(false, |d| d.depth == depth && !d.expect) {
                    self.declaration = None;
                }
            }
            _ => {}
        }
    }

    fn identifier(&mut self, pos: usize, token: Token<'a>) {
        let depth = self.frames.len();
        let prev = self.prev(pos);

        match self.prev_keyword(pos) {
            Some(Keyword::Break | Keyword::Continue) if !self.newline_before[pos] => return,
            Some(Keyword::Class) => {
                if self.class_declaration {
                    self.declare(pos, DeclKind::Lexical, false);
                }
                return;
            }
            _ => {}
        }

        if let Some((scope, declaration)) = self.function_name {
            if prev.map_or(false, |p| p.is_keyword(Keyword::Function) || p.is_punct("*")) {
                self.function_name = None;
                if declaration {
                    let target = self.hoist_target(self.current);
                    self.declare_in(pos, target, self.current, false);
                } else {
                    self.declare_in(pos, scope, scope, false);
                }
                return;
            }
        }

        // `for (x of xs)`
        if token.text == "of" && self.declaration.map_or(false, |d| d.depth == depth && !d.expect) {
            self.declaration = None;
            return;
        }

        // Label
        if self.next_is(pos, ":")
            && self.frames.last().map_or(0, |f| f.ternary) == 0
            && self.prev_keyword(pos) != Some(Keyword::Case)
        {
            return;
        }

        // `x => ...`
        if self.next_is(pos, "=>") {
            let restore = self.current;
            let scope = self.add_scope(ScopeKind::Function);
            self.current = scope;
            self.pending_body = Some(PendingBody {
                kind: BodyKind::Function,
                restore,
            });
            self.declare(pos, DeclKind::Lexical, false);
            return;
        }

        if token.text == "eval" {
            self.mark_eval(self.current);
        }
        self.push_occurrence(pos, self.current, false);
    }

    /// Property name position inside an object literal, object pattern or
    /// class body.
    fn key(&mut self, pos: usize, token: Token<'a>) {
        let Some(frame) = self.frames.last().copied() else {
            return;
        };
        let next = self.next(pos);
        let is_word = matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword(_));

        if frame.kind == FrameKind::ClassBody && token.text == "static" && self.next_is(pos, "{") {
            let restore = self.current;
            self.current = self.add_scope(ScopeKind::Function);
            self.pending_body = Some(PendingBody {
                kind: BodyKind::Function,
                restore,
            });
            self.top().at_key = false;
            return;
        }

        if frame.pattern.is_none()
            && is_word
            && matches!(token.text, "get" | "set" | "static" | "async")
            && next.map_or(false, |n| starts_key(&n))
        {
            return;
        }

        self.top().at_key = false;
        if self.next_is(pos, "(") && frame.pattern.is_none() {
            self.next_params = Some(self.add_scope(ScopeKind::Function));
        } else if !self.next_is(pos, ":")
            && token.kind == TokenKind::Identifier
            && frame.kind == FrameKind::Object
        {
            // shorthand `{a}`, `{a = 1}`
            match frame.pattern {
                Some(pattern) => self.declare(pos, pattern.kind, true),
                None => self.push_occurrence(pos, self.current, true),
            }
        }
    }

    fn punctuator(&mut self, pos: usize, token: Token<'a>) {
        match token.text {
            "{" => self.open_brace(pos),
            "[" => self.open_bracket(),
            "(" => self.open_paren(pos),
            ")" | "]" | "}" => self.close(pos),
            ";" => self.end_statement(),
            "," => self.comma(),
            "?" => self.top().ternary += 1,
            ":" => self.colon(),
            "=" => {
                if let Some(pattern) = &mut self.top().pattern {
                    pattern.expect = false;
                }
                if self.top_kind() == FrameKind::ClassBody {
                    self.top().at_key = false;
                }
            }
            "=>" => {
                if let Some(body) = self.pending_body {
                    if body.kind == BodyKind::Function && !self.next_is(pos, "{") {
                        self.pending_body = None;
                        self.open_bodies.push(OpenBody {
                            depth: self.frames.len(),
                            restore: body.restore,
                            ends_at_comma: true,
                        });
                    }
                }
            }
            "..." => {
                let top = self.top();
                if top.kind == FrameKind::Object {
                    top.at_key = false;
                }
                if let Some(pattern) = &mut top.pattern {
                    pattern.expect = true;
                }
            }
            "*" | "#" => {}
            _ => {
                let depth = self.frames.len();
                if self.declaration.map_or(false, |d| d.expect && d.depth == depth) {
                    self.declaration = None;
                }
            }
        }
    }

    fn comma(&mut self) {
        let depth = self.frames.len();
        self.end_open_bodies(depth, true);
        if let Some(decl) = &mut self.declaration {
            if decl.depth == depth {
                decl.expect = true;
            }
        }
        let top = self.top();
        let object = top.kind == FrameKind::Object;
        if object {
            top.at_key = true;
        }
        if let Some(pattern) = &mut top.pattern {
            pattern.expect = !object;
        }
    }

    fn colon(&mut self) {
        let top = self.top();
        if top.ternary > 0 {
            top.ternary -= 1;
            self.colon_value = true;
        } else if top.kind == FrameKind::Object {
            if let Some(pattern) = &mut top.pattern {
                pattern.expect = true;
            }
            self.colon_value = true;
        } else {
            // label or `case`
            self.colon_value = false;
        }
    }

    fn open_brace(&mut self, pos: usize) {
        let depth = self.frames.len();
        let restore = self.current;

        if let Some(body) = self.pending_body.take() {
            match body.kind {
                BodyKind::Function => {
                    self.frames.push(Frame::new(FrameKind::FunctionBody, body.restore));
                }
                BodyKind::Catch => self.frames.push(Frame::new(FrameKind::Block, body.restore)),
                BodyKind::Loop => {
                    self.current = self.add_scope(ScopeKind::Block);
                    self.frames.push(Frame::new(FrameKind::Block, body.restore));
                }
            }
            return;
        }

        if let Some(kind) = self.take_binding_slot() {
            self.frames.push(Frame::with_pattern(FrameKind::Object, restore, kind));
            return;
        }

        if self.class_body == Some(depth) {
            self.class_body = None;
            self.frames.push(Frame::new(FrameKind::ClassBody, restore));
            return;
        }

        if self.brace_is_object(pos) {
            self.frames.push(Frame::new(FrameKind::Object, restore));
        } else {
            self.current = self.add_scope(ScopeKind::Block);
            self.frames.push(Frame::new(FrameKind::Block, restore));
        }
    }

    fn open_bracket(&mut self) {
        let restore = self.current;
        if let Some(kind) = self.take_binding_slot() {
            self.frames.push(Frame::with_pattern(FrameKind::Bracket, restore, kind));
        } else if self.at_key() {
            self.top().at_key = false;
            self.frames.push(Frame::new(FrameKind::ComputedKey, restore));
        } else {
            self.frames.push(Frame::new(FrameKind::Bracket, restore));
        }
    }

    fn open_paren(&mut self, pos: usize) {
        let restore = self.current;

        if let Some(scope) = self.next_params.take() {
            self.function_name = None;
            self.current = scope;
            self.frames.push(Frame::with_pattern(FrameKind::Params, restore, DeclKind::Lexical));
            return;
        }

        let prev_keyword = self.prev_keyword(pos);
        let for_await = pos >= 2
            && self.tok(pos - 1).is_ident("await")
            && self.prev_keyword(pos - 1) == Some(Keyword::For);
        if prev_keyword == Some(Keyword::For) || for_await {
            self.current = self.add_scope(ScopeKind::Block);
            self.frames.push(Frame::new(FrameKind::ForHead, restore));
            return;
        }

        if prev_keyword == Some(Keyword::Catch) {
            if let Some(scope) = self.catch_scope.take() {
                self.current = scope;
                self.frames
                    .push(Frame::with_pattern(FrameKind::CatchParam, restore, DeclKind::Lexical));
                return;
            }
        }

        // `(a, b) => ...`
        let close = self.matching[pos];
        if close + 1 < self.sig.len() && self.tok(close + 1).is_punct("=>") {
            self.current = self.add_scope(ScopeKind::Function);
            self.frames.push(Frame::with_pattern(FrameKind::Params, restore, DeclKind::Lexical));
            return;
        }

        let kind = match prev_keyword {
            Some(kw) if kw.has_header() => FrameKind::Header,
            _ => FrameKind::Paren,
        };
        self.frames.push(Frame::new(kind, restore));
    }

    fn close(&mut self, pos: usize) {
        if self.frames.len() <= 1 {
            return;
        }
        let Some(frame) = self.frames.pop() else {
            return;
        };
        let depth = self.frames.len();

        let pending = |kind| PendingBody {
            kind,
            restore: frame.restore,
        };
        match frame.kind {
            FrameKind::Block | FrameKind::FunctionBody => self.current = frame.restore,
            FrameKind::Params => {
                self.pending_body = Some(pending(BodyKind::Function));
                self.closed_header = true;
            }
            FrameKind::ForHead => {
                self.pending_body = Some(pending(BodyKind::Loop));
                self.closed_header = true;
            }
            FrameKind::CatchParam => {
                self.pending_body = Some(pending(BodyKind::Catch));
                self.closed_header = true;
            }
            FrameKind::Header => self.closed_header = true,
            FrameKind::ComputedKey => {
                if self.next_is(pos, "(") && self.frames.last().map_or(true, |f| f.pattern.is_none()) {
                    self.next_params = Some(self.add_scope(ScopeKind::Function));
                }
            }
            _ => {}
        }

        self.end_open_bodies(depth + 1, false);
        if self.declaration.map_or(false, |d| d.depth > depth) {
            self.declaration = None;
        }

        if matches!(frame.kind, FrameKind::Block | FrameKind::FunctionBody) {
            if self.top_kind() == FrameKind::ClassBody {
                self.top().at_key = true;
            }
            // A block statement can be the whole body of a braceless loop.
            let continues = self.next(pos).map_or(false, |n| {
                matches!(
                    n.kind,
                    TokenKind::Keyword(Keyword::Else | Keyword::Catch | Keyword::Finally | Keyword::While)
                )
            });
            if let Some(body) = self.open_bodies.last().copied() {
                if body.depth == depth && !body.ends_at_comma && !continues {
                    self.current = body.restore;
                    self.open_bodies.pop();
                }
            }
        }
    }

    /// Tell an object literal `{` from a block `{` by what precedes it.
    fn brace_is_object(&self, pos: usize) -> bool {
        let Some(prev) = self.prev(pos) else {
            return false;
        };
        match prev.kind {
            TokenKind::Punctuator => match prev.text {
                "{" | ")" | "]" | "}" | ";" | "++" | "--" | "=>" => false,
                ":" => self.colon_value,
                _ => true,
            },
            TokenKind::Template(TemplatePart::Head | TemplatePart::Middle) => true,
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::Return
                    | Keyword::Typeof
                    | Keyword::Void
                    | Keyword::Delete
                    | Keyword::Throw
                    | Keyword::New
                    | Keyword::In
                    | Keyword::Instanceof
                    | Keyword::Case
                    | Keyword::Yield
            ),
            _ => false,
        }
    }

    /// `function`/`class` at `pos` starts a declaration rather than an
    /// expression.
    fn is_declaration_position(&self, pos: usize) -> bool {
        let mut pos = pos;
        if pos > 0 && self.tok(pos - 1).is_ident("async") && !self.newline_before[pos] {
            pos -= 1;
        }
        let Some(prev) = self.prev(pos) else {
            return true;
        };
        if self.newline_before[pos] && prev.ends_operand() {
            return true;
        }
        match prev.kind {
            TokenKind::Punctuator => match prev.text {
                ";" | "{" | "}" => true,
                ":" => !self.colon_value,
                _ => false,
            },
            TokenKind::Keyword(kw) => matches!(
                kw,
                Keyword::Else | Keyword::Do | Keyword::Export | Keyword::Default
            ),
            _ => false,
        }
    }

    // === Resolve ===

    fn resolve(&mut self) {
        let scopes = &self.scopes;
        for occurrence in &mut self.occurrences {
            let mut scope = Some(occurrence.scope);
            while let Some(id) = scope {
                if scopes[id].bindings.contains(occurrence.name) {
                    occurrence.resolved = Some(id);
                    break;
                }
                scope = scopes[id].parent;
            }
        }
    }
}

/// Tokens that can follow a `get`/`set`/`static`/`async` modifier.
fn starts_key(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Identifier | TokenKind::Keyword(_) | TokenKind::String | TokenKind::Number => true,
        TokenKind::Punctuator => matches!(token.text, "[" | "#" | "*"),
        _ => false,
    }
}

/// Check bracket balance and pair every opener with its closer.
fn match_brackets(tokens: &[Token<'_>], sig: &[usize]) -> Result<Vec<usize>, ScopeError> {
    let mut matching = vec![usize::MAX; sig.len()];
    let mut stack: Vec<(char, usize)> = Vec::new();

    for (pos, &index) in sig.iter().enumerate() {
        let token = &tokens[index];
        let (close, open) = match token.kind {
            TokenKind::Punctuator => match token.text {
                "(" | "[" | "{" => (None, token.text.chars().next()),
                ")" | "]" | "}" => (token.text.chars().next(), None),
                _ => continue,
            },
            // `${` opens, `}` closes
            TokenKind::Template(TemplatePart::Head) => (None, Some('$')),
            TokenKind::Template(TemplatePart::Middle) => (Some('}'), Some('$')),
            TokenKind::Template(TemplatePart::Tail) => (Some('}'), None),
            _ => continue,
        };

        if let Some(found) = close {
            let offset = token.span.start as usize;
            let Some((opener, open_pos)) = stack.pop() else {
                return Err(ScopeError::new(offset, ScopeErrorReason::UnexpectedClose(found)));
            };
            let expected = match opener {
                '(' => ')',
                '[' => ']',
                _ => '}',
            };
            if expected != found {
                return Err(ScopeError::new(
                    offset,
                    ScopeErrorReason::Mismatched { expected, found },
                ));
            }
            matching[open_pos] = pos;
        }
        if let Some(opener) = open {
            stack.push((opener, pos));
        }
    }

    match stack.pop() {
        Some((opener, pos)) => {
            let offset = tokens[sig[pos]].span.start as usize;
            let opener = if opener == '$' { '{' } else { opener };
            Err(ScopeError::new(offset, ScopeErrorReason::Unclosed(opener)))
        }
        None => Ok(matching),
    }
}
