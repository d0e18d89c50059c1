//! Variable shrinking and private-name renaming.
//!
//! Shrinking gives every renamable binding the first name in `a`..`z`,
//! `aa`, `ab`, ... that cannot change what any identifier refers to:
//! - not already given to a binding of the same scope
//! - not a name some identifier inside the scope reaches past it
//!   (a global, or a binding that keeps its name)
//! - not the new name of an outer binding referenced from inside the scope
//! - not a name fixed by a scope between the binding and one of its uses
//! - not reserved or protected
//!
//! Scopes are processed parents-first so outer new names are known when a
//! nested scope picks its own.
//!
//! Private renaming is independent of scopes: every identifier token with the
//! private prefix is renamed, property names included.

use crate::base62::encode_number;
use crate::compactor::Replacements;
use crate::options::ProtectedNames;
use crate::scope::{ScopeId, ScopeTree};
use crate::token::{Token, TokenKind, RESERVED_WORDS};
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};
use tracing::debug;

type BindingKey<'a> = (ScopeId, &'a str);

/// Rename the renamable bindings of `tree`. With `private` set, names it
/// covers keep their private replacement instead.
pub fn shrink<'a>(
    tree: &ScopeTree<'a>,
    protected: &ProtectedNames,
    private: Option<&PrivateNames<'a>>,
) -> Replacements {
    let mut ctx = ShrinkContext::new(tree, protected, private);
    ctx.collect();
    ctx.assign();
    let replacements = ctx.replacements();
    debug!(
        scopes = tree.scopes.len(),
        bindings = ctx.assigned.len(),
        renamed = replacements.len(),
        "shrink"
    );
    replacements
}

struct ShrinkContext<'t, 'a> {
    tree: &'t ScopeTree<'a>,
    protected: &'t ProtectedNames,
    private: Option<&'t PrivateNames<'a>>,
    /// Final names of the bindings of each scope that are not renamed.
    fixed: Vec<Vec<&'t str>>,
    /// Per scope: names no new binding of the scope may take.
    taken: Vec<FxHashSet<&'t str>>,
    /// Per scope: renamed outer bindings referenced from inside it.
    crossing: Vec<Vec<BindingKey<'a>>>,
    /// Per binding: fixed names of the scopes its references pass through.
    blocked: FxHashMap<BindingKey<'a>, FxHashSet<&'t str>>,
    assigned: FxHashMap<BindingKey<'a>, String>,
}

impl<'t, 'a> ShrinkContext<'t, 'a> {
    fn new(
        tree: &'t ScopeTree<'a>,
        protected: &'t ProtectedNames,
        private: Option<&'t PrivateNames<'a>>,
    ) -> Self {
        let count = tree.scopes.len();
        Self {
            tree,
            protected,
            private,
            fixed: vec![Vec::new(); count],
            taken: vec![FxHashSet::default(); count],
            crossing: vec![Vec::new(); count],
            blocked: FxHashMap::default(),
            assigned: FxHashMap::default(),
        }
    }

    fn is_renamable(&self, scope: ScopeId, name: &str) -> bool {
        self.tree.is_renamable(scope)
            && !self.protected.contains(name)
            // escaped identifiers may spell an existing name
            && !name.contains('\\')
            && !self.private.map_or(false, |p| p.get(name).is_some())
    }

    /// Name an identifier ends up with when shrinking leaves it alone.
    fn final_name(&self, name: &'t str) -> &'t str {
        self.private.and_then(|p| p.get(name)).unwrap_or(name)
    }

    // === Phase 1: Collect constraints ===

    fn collect(&mut self) {
        let tree = self.tree;
        for (id, scope) in tree.scopes.iter().enumerate() {
            for &name in &scope.bindings {
                if !self.is_renamable(id, name) {
                    let fixed = self.final_name(name);
                    self.fixed[id].push(fixed);
                    self.taken[id].insert(fixed);
                }
            }
        }

        for occurrence in &tree.occurrences {
            let renamed = occurrence
                .resolved
                .map(|scope| (scope, occurrence.name))
                .filter(|&(scope, name)| self.is_renamable(scope, name));
            let final_name = self.final_name(occurrence.name);

            // Scopes between the occurrence and its binding.
            let crossed = tree
                .ancestors(occurrence.scope)
                .take_while(|&s| Some(s) != occurrence.resolved);
            for scope in crossed {
                match renamed {
                    Some(key) => {
                        self.crossing[scope].push(key);
                        self.blocked
                            .entry(key)
                            .or_default()
                            .extend(self.fixed[scope].iter().copied());
                    }
                    None => {
                        self.taken[scope].insert(final_name);
                    }
                }
            }
        }
    }

    // === Phase 2: Assign short names ===

    fn assign(&mut self) {
        let tree = self.tree;
        for id in 0..tree.scopes.len() {
            if !tree.is_renamable(id) {
                continue;
            }

            let mut used: FxHashSet<String> =
                self.taken[id].iter().map(|name| (*name).to_string()).collect();
            for key in &self.crossing[id] {
                if let Some(short) = self.assigned.get(key) {
                    used.insert(short.clone());
                }
            }

            for &name in &tree.scopes[id].bindings {
                if !self.is_renamable(id, name) {
                    continue;
                }
                let blocked = self.blocked.get(&(id, name));
                let mut gen = NameGenerator::new();
                let short = loop {
                    let candidate = gen.next();
                    if !used.contains(&candidate)
                        && !is_reserved(&candidate)
                        && !self.protected.contains(&candidate)
                        && !blocked.map_or(false, |b| b.contains(candidate.as_str()))
                    {
                        break candidate;
                    }
                };
                used.insert(short.clone());
                self.assigned.insert((id, name), short);
            }
        }
    }

    // === Phase 3: Rewrite occurrences ===

    fn replacements(&self) -> Replacements {
        let mut replacements = Replacements::default();
        for occurrence in &self.tree.occurrences {
            let Some(scope) = occurrence.resolved else {
                continue;
            };
            let Some(short) = self.assigned.get(&(scope, occurrence.name)) else {
                continue;
            };
            if short == occurrence.name {
                continue;
            }
            let text = if occurrence.shorthand {
                format!("{}:{short}", occurrence.name)
            } else {
                short.clone()
            };
            replacements.insert(occurrence.token, text);
        }
        replacements
    }
}

// =============================================================================
// Name generation
// =============================================================================

/// Generates `a`, `b`, ..., `z`, `aa`, `ab`, ...
struct NameGenerator {
    counter: usize,
}

impl NameGenerator {
    fn new() -> Self {
        Self { counter: 0 }
    }

    fn next(&mut self) -> String {
        let name = encode_name(self.counter);
        self.counter += 1;
        name
    }
}

/// Bijective base-26 over `a`..`z`.
fn encode_name(n: usize) -> String {
    let mut n = n + 1;
    let mut name = Vec::with_capacity(2);
    while n > 0 {
        n -= 1;
        name.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    name.iter().rev().map(|&b| char::from(b)).collect()
}

fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

// =============================================================================
// Private names
// =============================================================================

/// Whether `name` follows the private naming convention for `prefix`: the
/// prefix followed by an ASCII letter, digit or `$`.
pub fn is_private(name: &str, prefix: &str) -> bool {
    !prefix.is_empty()
        && name
            .strip_prefix(prefix)
            .and_then(|rest| rest.chars().next())
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '$')
}

/// Unit-wide renaming of private-convention identifiers, numbered in order of
/// first occurrence.
#[derive(Debug, Clone, Default)]
pub struct PrivateNames<'a> {
    names: IndexMap<&'a str, String, FxBuildHasher>,
}

impl<'a> PrivateNames<'a> {
    /// Number every private identifier of the token stream. Protected names
    /// are neither renamed nor used as replacements.
    pub fn collect(tokens: &[Token<'a>], prefix: &str, protected: &ProtectedNames) -> Self {
        let mut names: IndexMap<&'a str, String, FxBuildHasher> = IndexMap::default();
        let mut counter = 0;
        for token in tokens {
            if token.kind != TokenKind::Identifier
                || !is_private(token.text, prefix)
                || protected.contains(token.text)
                || names.contains_key(token.text)
            {
                continue;
            }
            let replacement = loop {
                let candidate = format!("{prefix}{}", encode_number(counter, 62));
                counter += 1;
                if !protected.contains(&candidate) {
                    break candidate;
                }
            };
            names.insert(token.text, replacement);
        }
        debug!(private = names.len(), "collected private names");
        Self { names }
    }

    /// Replacement for a private name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    /// Replacement text for every renamed token.
    pub fn replacements(&self, tokens: &[Token<'a>]) -> Replacements {
        tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.kind == TokenKind::Identifier)
            .filter_map(|(index, token)| {
                self.get(token.text)
                    .filter(|&replacement| replacement != token.text)
                    .map(|replacement| (index, replacement.to_string()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compactor::compact;
    use crate::lexer::Lexer;

    fn run(source: &str, protected: &ProtectedNames, private: bool) -> String {
        let tokens = Lexer::tokenize(source).unwrap();
        let private = private.then(|| PrivateNames::collect(&tokens, "_", protected));
        let tree = ScopeTree::build(&tokens).unwrap();
        let mut replacements = private
            .as_ref()
            .map(|p| p.replacements(&tokens))
            .unwrap_or_default();
        replacements.extend(shrink(&tree, protected, private.as_ref()));
        compact(&tokens, &replacements).code
    }

    fn shrink_source(source: &str) -> String {
        run(source, &ProtectedNames::new(), false)
    }

    #[test]
    fn test_name_generator_sequence() {
        let mut gen = NameGenerator::new();
        let names: Vec<String> = (0..28).map(|_| gen.next()).collect();
        assert_eq!(names[0], "a");
        assert_eq!(names[25], "z");
        assert_eq!(names[26], "aa");
        assert_eq!(names[27], "ab");
        assert_eq!(encode_name(701), "zz");
        assert_eq!(encode_name(702), "aaa");
    }

    #[test]
    fn test_function_params() {
        assert_eq!(
            shrink_source("function add(first, second) { return first + second; }"),
            "function add(a,b){return a+b}"
        );
    }

    #[test]
    fn test_global_scope_untouched() {
        assert_eq!(shrink_source("var counter = 1; counter++;"), "var counter=1;counter++;");
    }

    #[test]
    fn test_super_accessor_untouched() {
        assert_eq!(
            shrink_source("var func = function(foo, bar, $super, baz) { return $super( foo + baz ); }"),
            "var func=function(a,b,$super,c){return $super(a+c)}"
        );
    }

    #[test]
    fn test_extra_protected_names() {
        let protected = ProtectedNames::new().with_extra(["other", "method", "names"]);
        assert_eq!(
            run(
                "var func = function(foo, other, $super, bar, names) { return $super()(other.apply(names, foo)); }",
                &protected,
                false,
            ),
            "var func=function(a,other,$super,b,names){return $super()(other.apply(names,a))}"
        );
    }

    #[test]
    fn test_globals_are_not_captured() {
        assert_eq!(
            shrink_source("function f(x) { return a + x; }"),
            "function f(b){return a+b}"
        );
    }

    #[test]
    fn test_nested_scopes_reuse_names() {
        assert_eq!(
            shrink_source("function f(x) { function g(y) { return y; } return g(x); }"),
            "function f(a){function b(a){return a}return b(a)}"
        );
    }

    #[test]
    fn test_outer_binding_not_shadowed() {
        assert_eq!(
            shrink_source("function f(x) { return function(y) { return x + y; }; }"),
            "function f(a){return function(b){return a+b}}"
        );
    }

    #[test]
    fn test_sibling_blocks_reuse_names() {
        assert_eq!(
            shrink_source("function f() { { let x = 1; g(x); } { let y = 2; g(y); } }"),
            "function f(){{let a=1;g(a)}{let a=2;g(a)}}"
        );
    }

    #[test]
    fn test_var_in_block_hoists() {
        assert_eq!(
            shrink_source("function f() { { var x = 1 } return x }"),
            "function f(){{var a=1}return a}"
        );
    }

    #[test]
    fn test_object_keys_preserved() {
        assert_eq!(
            shrink_source("function(method, args) { this.queue.push({func: method, args: args}); }"),
            "function(a,b){this.queue.push({func:a,args:b})}"
        );
    }

    #[test]
    fn test_shorthand_expansion() {
        assert_eq!(
            shrink_source("function f(foo) { return {foo}; }"),
            "function f(a){return{foo:a}}"
        );
        assert_eq!(
            shrink_source("function f(o) { var {foo} = o; return foo; }"),
            "function f(a){var{foo:b}=a;return b}"
        );
    }

    #[test]
    fn test_eval_bailout() {
        assert_eq!(
            shrink_source("function f(foo) { eval('foo'); }"),
            "function f(foo){eval('foo')}"
        );
    }

    #[test]
    fn test_labels_not_renamed() {
        assert_eq!(
            shrink_source("function f(foo) { foo: for (;;) { break foo; } }"),
            "function f(a){foo:for(;;){break foo}}"
        );
    }

    #[test]
    fn test_reserved_words_skipped() {
        assert!(is_reserved("do"));
        assert!(is_reserved("in"));
        assert!(!is_reserved("dp"));
        let protected = ProtectedNames::new();
        let mut gen = NameGenerator::new();
        let names: Vec<String> = std::iter::from_fn(|| Some(gen.next()))
            .filter(|name| !is_reserved(name) && !protected.contains(name))
            .take(120)
            .collect();
        assert!(!names.iter().any(|n| n == "do" || n == "if" || n == "in"));
    }

    #[test]
    fn test_private_names() {
        assert_eq!(
            run(
                "var _KEYS = true; (function() { var foo = _KEYS; })();",
                &ProtectedNames::new(),
                true
            ),
            "var _0=true;(function(){var a=_0})();"
        );
    }

    #[test]
    fn test_private_names_rename_properties() {
        assert_eq!(
            run(
                "var _a = 1; function f(_b) { return _a + _b + o._a; }",
                &ProtectedNames::new(),
                true
            ),
            "var _0=1;function f(_1){return _0+_1+o._0}"
        );
    }

    #[test]
    fn test_private_names_consistent_across_scopes() {
        assert_eq!(
            run(
                "function f() { var _t = 1; } function g() { var _t = 2; }",
                &ProtectedNames::new(),
                true
            ),
            "function f(){var _0=1}function g(){var _0=2}"
        );
    }

    #[test]
    fn test_private_replacement_skips_protected() {
        let protected = ProtectedNames::new().with_extra(["_0"]);
        assert_eq!(run("x(_x, _0)", &protected, true), "x(_1,_0)");
    }

    #[test]
    fn test_is_private() {
        assert!(is_private("_foo", "_"));
        assert!(is_private("_0", "_"));
        assert!(is_private("_$x", "_"));
        assert!(!is_private("_", "_"));
        assert!(!is_private("__proto__", "_"));
        assert!(!is_private("foo", "_"));
        assert!(is_private("$$x", "$$"));
        assert!(!is_private("x", ""));
    }
}
