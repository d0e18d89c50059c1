//! Dictionary packing in Dean Edwards' `eval(function(p,a,c,k,e,r){...})`
//! format.
//!
//! Every word of the compacted text is replaced by its index in a
//! first-seen-order dictionary, written in the chosen radix. The decoder stub
//! maps each word run of the payload back through the dictionary, so the
//! payload must not contain any word run that is not a code.

use crate::error::EncodingError;
use indexmap::IndexSet;
use regex::{Regex, RegexBuilder};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::debug;

pub const DEFAULT_RADIX: u32 = 62;
pub const DEFAULT_WORD_PATTERN: &str = r"\w+";

const DELIMITER: char = '|';

const DECODER_HEAD: &str = r"eval(function(p,a,c,k,e,r){e=function(c){return(c<a?'':e(parseInt(c/a)))+((c=c%a)>35?String.fromCharCode(c+29):c.toString(36))};if(!''.replace(/^/,String)){while(c--)r[e(c)]=k[c]||e(c);k=[function(e){return r[e]}];e=function(){return'\\w+'};c=1};while(c--)if(k[c])p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c]);return p}(";

const DECODER_TAIL: &str = ".split('|'),0,{}))";

/// Write `n` in `radix` using the decoder's digit set: `0-9a-z` for 0..=35,
/// then `A-Z` for 36..=61.
pub fn encode_number(n: usize, radix: u32) -> String {
    let radix = radix as usize;
    let mut digits = Vec::new();
    let mut n = n;
    loop {
        digits.push(digit(n % radix));
        n /= radix;
        if n == 0 {
            break;
        }
    }
    digits.iter().rev().collect()
}

fn digit(d: usize) -> char {
    if d > 35 {
        char::from(d as u8 + 29)
    } else {
        char::from_digit(d as u32, 36).unwrap_or('0')
    }
}

/// Dictionary encoder for one radix and word pattern.
#[derive(Debug, Clone)]
pub struct Base62Encoder {
    radix: u32,
    words: Regex,
}

impl Base62Encoder {
    pub fn new(radix: u32, pattern: &str) -> Result<Self, EncodingError> {
        if !(2..=62).contains(&radix) {
            return Err(EncodingError::InvalidRadix(radix));
        }
        // The decoder's `\w` and `\b` are ASCII-only.
        let words = RegexBuilder::new(pattern)
            .unicode(false)
            .build()
            .map_err(|e| EncodingError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self { radix, words })
    }

    pub fn radix(&self) -> u32 {
        self.radix
    }

    /// Distinct words of `text` in first-seen order.
    pub fn dictionary<'t>(&self, text: &'t str) -> IndexSet<&'t str, FxBuildHasher> {
        self.words
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|word| !word.is_empty())
            .collect()
    }

    /// Produce the self-decoding payload for `text` and check that it decodes
    /// back to `text`.
    pub fn encode(&self, text: &str) -> Result<String, EncodingError> {
        let dictionary = self.dictionary(text);
        if let Some(word) = dictionary.iter().find(|w| w.contains(DELIMITER)) {
            return Err(EncodingError::DelimiterInWord((*word).to_string()));
        }

        let codes: Vec<String> = (0..dictionary.len())
            .map(|index| encode_number(index, self.radix))
            .collect();

        let mut payload = String::with_capacity(text.len());
        let mut last = 0;
        for m in self.words.find_iter(text) {
            if m.as_str().is_empty() {
                continue;
            }
            payload.push_str(&text[last..m.start()]);
            if let Some(index) = dictionary.get_index_of(m.as_str()) {
                payload.push_str(&codes[index]);
            }
            last = m.end();
        }
        payload.push_str(&text[last..]);

        let keywords: Vec<&str> = dictionary
            .iter()
            .zip(&codes)
            .map(|(word, code)| if word == code { "" } else { *word })
            .collect();

        let mut packed = String::with_capacity(DECODER_HEAD.len() + payload.len() + text.len() / 4);
        packed.push_str(DECODER_HEAD);
        packed.push('\'');
        push_escaped(&mut packed, &payload);
        packed.push_str(&format!("',{},{},'", self.radix, dictionary.len()));
        push_escaped(&mut packed, &keywords.join("|"));
        packed.push('\'');
        packed.push_str(DECODER_TAIL);

        match unpack(&packed) {
            Ok(decoded) if decoded == text => {}
            Ok(decoded) => return Err(EncodingError::RoundTrip(first_difference(&decoded, text))),
            Err(_) => return Err(EncodingError::RoundTrip(0)),
        }

        debug!(
            words = dictionary.len(),
            bytes_in = text.len(),
            bytes_out = packed.len(),
            "base62 packed"
        );
        Ok(packed)
    }
}

/// Escape for a single-quoted script string literal.
fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
}

fn first_difference(a: &str, b: &str) -> usize {
    a.bytes()
        .zip(b.bytes())
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Decode a packed payload the way the decoder stub's fast path does.
pub fn unpack(packed: &str) -> Result<String, EncodingError> {
    let malformed = |what: &str| EncodingError::Malformed(what.to_string());

    let rest = packed
        .strip_prefix(DECODER_HEAD)
        .ok_or_else(|| malformed("missing decoder"))?;
    let (payload, rest) = read_string(rest).ok_or_else(|| malformed("unterminated payload"))?;
    let rest = rest.strip_prefix(',').ok_or_else(|| malformed("expected radix"))?;
    let (radix, rest) = read_number(rest).ok_or_else(|| malformed("expected radix"))?;
    let rest = rest.strip_prefix(',').ok_or_else(|| malformed("expected word count"))?;
    let (count, rest) = read_number(rest).ok_or_else(|| malformed("expected word count"))?;
    let rest = rest.strip_prefix(',').ok_or_else(|| malformed("expected word list"))?;
    let (words, rest) = read_string(rest).ok_or_else(|| malformed("unterminated word list"))?;
    if rest != DECODER_TAIL {
        return Err(malformed("unexpected trailer"));
    }
    if !(2..=62).contains(&radix) {
        return Err(EncodingError::InvalidRadix(radix as u32));
    }

    let words: Vec<&str> = words.split(DELIMITER).collect();
    if count > 0 && words.len() != count {
        return Err(malformed("word count does not match word list"));
    }

    // `None` marks an empty entry: the code stands for itself.
    let dictionary: FxHashMap<String, Option<&str>> = (0..count)
        .map(|index| {
            let word = words.get(index).copied().filter(|w| !w.is_empty());
            (encode_number(index, radix as u32), word)
        })
        .collect();

    let mut out = String::with_capacity(payload.len() * 2);
    let bytes = payload.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if is_word_byte(bytes[i]) {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            let code = &payload[start..i];
            match dictionary.get(code) {
                Some(Some(word)) => out.push_str(word),
                Some(None) => out.push_str(code),
                None => return Err(EncodingError::Malformed(format!("unknown code {code:?}"))),
            }
        } else {
            let start = i;
            while i < bytes.len() && !is_word_byte(bytes[i]) {
                i += 1;
            }
            out.push_str(&payload[start..i]);
        }
    }
    Ok(out)
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Read a single-quoted string literal, opening quote included,
/// returning the unescaped text and what follows the closing quote.
fn read_string(input: &str) -> Option<(String, &str)> {
    let input = input.strip_prefix('\'')?;
    let mut out = String::new();
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\'' => return Some((out, &input[i + 1..])),
            '\\' => {
                let (_, escaped) = chars.next()?;
                out.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    other => other,
                });
            }
            _ => out.push(c),
        }
    }
    None
}

fn read_number(input: &str) -> Option<(usize, &str)> {
    let end = input
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(input.len());
    let n = input[..end].parse().ok()?;
    Some((n, &input[end..]))
}
