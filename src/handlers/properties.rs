//! Default `key=value` parser.
//!
//! Follows the usual properties conventions: `#` and `!` start comments,
//! the separator is the first unescaped `=`, `:` or whitespace, and a line
//! ending in an odd number of backslashes continues on the next line.

use std::path::Path;

use serde_json::Value;

use super::ContentHandler;
use crate::error::HandlerError;
use crate::types::ConfigMap;

/// Flat properties-style parser. Every value is a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesHandler;

impl ContentHandler for PropertiesHandler {
    fn name(&self) -> &str {
        "properties"
    }

    fn parse(&self, _path: &Path, content: &[u8]) -> Result<ConfigMap, HandlerError> {
        let text = std::str::from_utf8(content)?;
        Ok(parse_properties(text))
    }
}

/// Parse properties text. Later duplicates of a key replace earlier ones.
pub fn parse_properties(text: &str) -> ConfigMap {
    let mut map = ConfigMap::new();

    for line in logical_lines(text) {
        let line = line.trim_start();
        if line.is_empty() || is_comment(line) {
            continue;
        }

        let (key, value) = split_key_value(line);
        map.insert(unescape(key), Value::String(unescape(value)));
    }

    map
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('!')
}

/// Join continuation lines. Comment lines never continue.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut continuing = false;

    for raw in text.lines() {
        let piece = if continuing { raw.trim_start() } else { raw };

        if !continuing && is_comment(piece.trim_start()) {
            lines.push(piece.to_string());
            continue;
        }

        if ends_with_continuation(piece) {
            current.push_str(&piece[..piece.len() - 1]);
            continuing = true;
        } else {
            current.push_str(piece);
            lines.push(std::mem::take(&mut current));
            continuing = false;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn ends_with_continuation(line: &str) -> bool {
    let trailing = line.bytes().rev().take_while(|b| *b == b'\\').count();
    trailing % 2 == 1
}

/// Split at the first unescaped separator. Returns raw (still escaped) parts.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();

    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = idx;
                break;
            }
            c if c.is_whitespace() => {
                key_end = idx;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start();
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start();
    }

    (key, rest.trim_end())
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }

        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => out.push(decoded),
                    _ => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_pairs_and_separators() {
        let map = parse_properties("a=1\nb: two\nc   three\nd =  spaced value  \n");

        assert_eq!(map["a"], json!("1"));
        assert_eq!(map["b"], json!("two"));
        assert_eq!(map["c"], json!("three"));
        assert_eq!(map["d"], json!("spaced value"));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let map = parse_properties("# header\n\n   ! bang comment\nkey=value\n");

        assert_eq!(map.len(), 1);
        assert_eq!(map["key"], json!("value"));
    }

    #[test]
    fn test_continuation_lines() {
        let map = parse_properties("list=a,\\\n     b,\\\n     c\nnext=1\n");

        assert_eq!(map["list"], json!("a,b,c"));
        assert_eq!(map["next"], json!("1"));
    }

    #[test]
    fn test_comment_does_not_continue() {
        let map = parse_properties("# trailing \\\nkey=value\n");
        assert_eq!(map["key"], json!("value"));
    }

    #[test]
    fn test_escapes() {
        let map = parse_properties("path\\=with\\:sep=x\\ty\nunicode=\\u0041BC\ndouble=a\\\\\n");

        assert_eq!(map["path=with:sep"], json!("x\ty"));
        assert_eq!(map["unicode"], json!("ABC"));
        assert_eq!(map["double"], json!("a\\"));
    }

    #[test]
    fn test_key_without_value() {
        let map = parse_properties("flag\n");
        assert_eq!(map["flag"], json!(""));
    }

    #[test]
    fn test_duplicate_key_keeps_last_value() {
        let map = parse_properties("x=1\ny=2\nx=3\n");
        assert_eq!(map["x"], json!("3"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["x", "y"]);
    }

    #[test]
    fn test_crlf_input() {
        let map = parse_properties("a=1\r\nb=2\r\n");
        assert_eq!(map["a"], json!("1"));
        assert_eq!(map["b"], json!("2"));
    }

    #[test]
    fn test_invalid_utf8_is_handler_error() {
        let result = PropertiesHandler.parse(Path::new("bad.conf"), &[0xff, 0xfe, b'=']);
        assert!(result.is_err());
    }
}
