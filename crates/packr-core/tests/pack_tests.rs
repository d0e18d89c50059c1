//! End-to-end packing behaviour.

use packr_core::{
    pack, unpack, Base62Encoder, EncodingError, LexErrorReason, PackError, PackOptions, Packer,
    ProtectedNames, ScopeErrorReason,
};

fn packed(source: &str, options: &PackOptions) -> String {
    pack(source, options).unwrap().code
}

fn shrink() -> PackOptions {
    PackOptions::new().with_shrink_vars(true)
}

/// The word list of a base62 payload, sorted.
fn sorted_words(packed: &str) -> Vec<String> {
    let tail = ".split('|'),0,{}))";
    let body = &packed[..packed.len() - tail.len() - 1];
    let list = &body[body.rfind(",'").unwrap() + 2..];
    let mut words: Vec<String> = list.split('|').map(str::to_string).collect();
    words.sort();
    words
}

#[test]
fn test_basic_packing() {
    let source = "// controls\nvar Control = {\n  /* state */\n  active: false,\n  toggle: function (flag) {\n    this.active = flag;\n  }\n};\n";
    assert_eq!(
        packed(source, &PackOptions::default()),
        "var Control={active:false,toggle:function(flag){this.active=flag}};"
    );
}

#[test]
fn test_private_variable_packing() {
    let script = "var _KEYS = true; (function() { var foo = _KEYS; })();";
    let options = shrink().with_private(true);
    assert_eq!(packed(script, &options), "var _0=true;(function(){var a=_0})();");
}

#[test]
fn test_protected_names() {
    assert_eq!(
        packed(
            "var func = function(foo, bar, $super, baz) { return $super( foo + baz ); }",
            &shrink()
        ),
        "var func=function(a,b,$super,c){return $super(a+c)}"
    );

    let packer = Packer::default()
        .with_protected_names(["other"])
        .with_protected_names(["method", "names", "some random stuff"])
        .with_protected_names([24]);
    let result = packer
        .pack(
            "var func = function(foo, other, $super, bar, names) { return $super()(other.apply(names, foo)); }",
            &shrink(),
        )
        .unwrap();
    assert_eq!(
        result.code,
        "var func=function(a,other,$super,b,names){return $super()(other.apply(names,a))}"
    );
}

#[test]
fn test_protected_names_from_options() {
    let options = shrink().with_protected_names(["other", "names"]);
    assert_eq!(
        packed("var f = function(foo, other, names) { return other(names, foo); }", &options),
        "var f=function(a,other,names){return other(names,a)}"
    );
}

#[test]
fn test_object_properties() {
    assert_eq!(
        packed(
            "function(method, args) { this.queue.push({func: method, args: args}); }",
            &shrink()
        ),
        "function(a,b){this.queue.push({func:a,args:b})}"
    );
}

#[test]
fn test_return_followed_by_newline() {
    let source = "function f() {\n  return\n  x + 1\n}";
    assert_eq!(packed(source, &PackOptions::default()), "function f(){return;x+1}");
}

#[test]
fn test_postfix_operators_keep_their_line() {
    assert_eq!(packed("a\n++b", &PackOptions::default()), "a\n++b");
    assert_eq!(packed("i++\nj--\n", &PackOptions::default()), "i++\nj--");
}

#[test]
fn test_shrink_is_deterministic() {
    let source = "function outer(alpha, beta) {\n  var gamma = alpha * beta;\n  function inner(delta) { return gamma + delta + beta; }\n  return inner(alpha);\n}\n";
    let first = packed(source, &shrink().with_private(true));
    let second = packed(source, &shrink().with_private(true));
    assert_eq!(first, second);
    assert_eq!(
        first,
        "function outer(a,b){var c=a*b;function d(a){return c+a+b}\nreturn d(a)}"
    );
}

#[test]
fn test_private_names_are_unit_wide() {
    let source = "function a() { var _cache = 1; return _cache; }\nfunction b() { var _cache = 2; return this._cache; }\nvar _other = _cache;";
    let result = packed(source, &PackOptions::new().with_private(true));
    assert_eq!(
        result,
        "function a(){var _0=1;return _0}\nfunction b(){var _0=2;return this._0}\nvar _1=_0;"
    );
}

#[test]
fn test_base62_round_trip() {
    let source = "var Effect = {\n  fade: function(element, options) {\n    element.style.opacity = options.from;\n    return element;\n  },\n  appear: function(element) { return Effect.fade(element, {from: 0}); }\n};\n";
    let plain = packed(source, &shrink());
    let encoded = packed(source, &shrink().with_base62(true));

    assert!(encoded.starts_with("eval(function(p,a,c,k,e,r)"));
    assert_eq!(unpack(&encoded).unwrap(), plain);

    let words = sorted_words(&encoded);
    let mut unique = words.clone();
    unique.dedup();
    assert_eq!(words, unique);
}

#[test]
fn test_base62_of_empty_output() {
    let options = shrink().with_base62(true);
    for source in ["", "   \n", "// only a comment\n"] {
        let encoded = packed(source, &options);
        assert!(encoded.starts_with("eval(function(p,a,c,k,e,r)"));
        assert_eq!(unpack(&encoded).unwrap(), "");
    }
}

#[test]
fn test_base62_words_match_dictionary() {
    let source = "var a = b; var c = a + b; var d = 'a b';";
    let encoded = packed(source, &PackOptions::new().with_base62(true));
    let compacted = packed(source, &PackOptions::default());
    let encoder = Base62Encoder::new(62, r"\w+").unwrap();
    let mut expected: Vec<String> = encoder
        .dictionary(&compacted)
        .into_iter()
        .map(str::to_string)
        .collect();
    expected.sort();
    assert_eq!(sorted_words(&encoded), expected);
}

#[test]
fn test_lex_error_aborts() {
    let err = pack("var s = 'unterminated;\n", &PackOptions::default()).unwrap_err();
    match err {
        PackError::Lex(e) => {
            assert_eq!(e.reason, LexErrorReason::UnterminatedString);
            assert_eq!(e.offset, 8);
        }
        other => panic!("expected a lex error, got {other:?}"),
    }
    assert_eq!(
        pack("a /* open", &PackOptions::default()).unwrap_err().code(),
        "LEX_ERROR"
    );
}

#[test]
fn test_scope_error_when_shrinking() {
    let err = pack("function f() { if (x) { }", &shrink()).unwrap_err();
    assert!(matches!(
        err,
        PackError::Scope(ref e) if e.reason == ScopeErrorReason::Unclosed('{')
    ));
    assert_eq!(err.offset(), Some(13));
}

#[test]
fn test_invalid_radix() {
    let options = PackOptions::new().with_base62(true).with_radix(70);
    assert_eq!(
        pack("a", &options).unwrap_err(),
        PackError::Encoding(EncodingError::InvalidRadix(70))
    );
}

#[test]
fn test_source_map_across_files() {
    // two files joined with "\n", as the bundler does
    let first = "var one = 1;\n";
    let second = "var two = 2;\n";
    let source = format!("{first}{second}");
    let options = PackOptions::new()
        .with_source_file("one.js", 0)
        .with_source_file("two.js", first.len() as u32)
        .with_output_file("dist/all.js")
        .with_line_offset(1);
    let result = pack(&source, &options).unwrap();

    assert_eq!(result.code, "var one=1;var two=2;");
    assert_eq!(result.source_map.filename().as_deref(), Some("dist/all.js.map"));
    assert_eq!(result.source_map.lookup(0), Some(("one.js", 0)));
    assert_eq!(result.source_map.lookup(14), Some(("two.js", 4)));

    let json: serde_json::Value = serde_json::from_str(&result.source_map.to_string()).unwrap();
    assert_eq!(json["sources"], serde_json::json!(["one.js", "two.js"]));
    assert!(json["mappings"].as_str().unwrap().starts_with(';'));
}

#[test]
fn test_base62_map_has_no_segments() {
    let options = PackOptions::new()
        .with_base62(true)
        .with_source_file("a.js", 0)
        .with_output_file("a.min.js");
    let result = pack("var a = 1;", &options).unwrap();
    assert!(result.source_map.entries().is_empty());
    assert_eq!(result.source_map.sources(), ["a.js"]);
}

#[test]
fn test_packer_shared_between_threads() {
    let packer = Packer::new(ProtectedNames::new().with_extra(["keep"]));
    let options = shrink();
    let outputs: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| packer.pack("(function(keep, drop) { return keep(drop); })()", &options)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap().code)
            .collect()
    });
    for output in outputs {
        assert_eq!(output, "(function(keep,a){return keep(a)})()");
    }
}
