//! Flat-text rendering of the preference tree.
//!
//! The legacy on-disk form: the same self-describing tree as the markup
//! codec, written as an indented line format instead of JSON.
//!
//! ```text
//! preferences {
//!   version 18
//!   button {
//!     button 2
//!     modifiers 0
//!   }
//!   excluded_devices [
//!     "Wacom Intuos"
//!   ]
//! }
//! ```
//!
//! Objects are `key value` entries between braces, arrays are values
//! between brackets, strings are double-quoted with `\" \\ \n \t \r`
//! escapes, and keys are bare identifiers or quoted strings. Parsing
//! produces the identical `serde_json::Value` shape the markup codec
//! produces, so the version-aware walk underneath is shared.
//!
//! Saves always write the markup format; this codec exists so files from
//! releases that shipped the flat form stay readable.

use serde_json::{Map, Number, Value};

use crate::error::PrefsError;

/// Render a tree in the flat-text form.
pub fn emit(root: &Value) -> String {
    let mut out = String::new();
    emit_value(root, 0, &mut out);
    out.push('\n');
    out
}

fn emit_value(value: &Value, indent: usize, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => emit_string(s, out),
        Value::Array(items) => {
            if items.is_empty() {
                out.push_str("[]");
                return;
            }
            out.push_str("[\n");
            for item in items {
                push_indent(indent + 1, out);
                emit_value(item, indent + 1, out);
                out.push('\n');
            }
            push_indent(indent, out);
            out.push(']');
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{\n");
            for (key, item) in fields {
                push_indent(indent + 1, out);
                emit_key(key, out);
                out.push(' ');
                emit_value(item, indent + 1, out);
                out.push('\n');
            }
            push_indent(indent, out);
            out.push('}');
        }
    }
}

fn push_indent(indent: usize, out: &mut String) {
    for _ in 0..indent {
        out.push_str("  ");
    }
}

fn is_bare_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit())
}

fn emit_key(key: &str, out: &mut String) {
    if is_bare_key(key) {
        out.push_str(key);
    } else {
        emit_string(key, out);
    }
}

fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// Parse a flat-text document into a tree.
pub fn parse(text: &str) -> Result<Value, PrefsError> {
    let mut parser = Parser {
        chars: text.char_indices().peekable(),
        text,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if let Some(&(pos, _)) = parser.chars.peek() {
        return Err(parse_error(format!("trailing input at offset {pos}")));
    }
    Ok(value)
}

fn parse_error(msg: impl Into<String>) -> PrefsError {
    PrefsError::Parse(msg.into())
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    text: &'a str,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn value(&mut self) -> Result<Value, PrefsError> {
        match self.chars.peek() {
            None => Err(parse_error("unexpected end of input")),
            Some(&(_, '{')) => self.object(),
            Some(&(_, '[')) => self.array(),
            Some(&(_, '"')) => Ok(Value::String(self.quoted()?)),
            Some(&(pos, c)) if c == '}' || c == ']' => {
                Err(parse_error(format!("unexpected '{c}' at offset {pos}")))
            }
            Some(_) => self.bare(),
        }
    }

    fn object(&mut self) -> Result<Value, PrefsError> {
        self.chars.next(); // '{'
        let mut fields = Map::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                None => return Err(parse_error("unterminated object")),
                Some(&(_, '}')) => {
                    self.chars.next();
                    return Ok(Value::Object(fields));
                }
                _ => {}
            }
            let key = self.key()?;
            self.skip_ws();
            let value = self.value()?;
            fields.insert(key, value);
        }
    }

    fn array(&mut self) -> Result<Value, PrefsError> {
        self.chars.next(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                None => return Err(parse_error("unterminated list")),
                Some(&(_, ']')) => {
                    self.chars.next();
                    return Ok(Value::Array(items));
                }
                _ => {}
            }
            items.push(self.value()?);
        }
    }

    fn key(&mut self) -> Result<String, PrefsError> {
        if matches!(self.chars.peek(), Some(&(_, '"'))) {
            return self.quoted();
        }
        let word = self.word()?;
        if !is_bare_key(&word) {
            return Err(parse_error(format!("invalid key '{word}'")));
        }
        Ok(word)
    }

    fn quoted(&mut self) -> Result<String, PrefsError> {
        self.chars.next(); // '"'
        let mut s = String::new();
        loop {
            match self.chars.next() {
                None => return Err(parse_error("unterminated string")),
                Some((_, '"')) => return Ok(s),
                Some((pos, '\\')) => match self.chars.next() {
                    Some((_, '"')) => s.push('"'),
                    Some((_, '\\')) => s.push('\\'),
                    Some((_, 'n')) => s.push('\n'),
                    Some((_, 't')) => s.push('\t'),
                    Some((_, 'r')) => s.push('\r'),
                    other => {
                        return Err(parse_error(format!(
                            "bad escape at offset {pos}: {other:?}"
                        )))
                    }
                },
                Some((_, c)) => s.push(c),
            }
        }
    }

    fn word(&mut self) -> Result<String, PrefsError> {
        let start = match self.chars.peek() {
            Some(&(pos, _)) => pos,
            None => return Err(parse_error("unexpected end of input")),
        };
        let mut end = start;
        while let Some(&(pos, c)) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '"') {
                break;
            }
            end = pos + c.len_utf8();
            self.chars.next();
        }
        if end == start {
            return Err(parse_error(format!("empty token at offset {start}")));
        }
        Ok(self.text[start..end].to_string())
    }

    fn bare(&mut self) -> Result<Value, PrefsError> {
        let word = self.word()?;
        match word.as_str() {
            "null" => return Ok(Value::Null),
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if let Ok(n) = word.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        if let Ok(n) = word.parse::<u64>() {
            return Ok(Value::Number(n.into()));
        }
        if let Ok(f) = word.parse::<f64>() {
            return Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| parse_error(format!("non-finite number '{word}'")));
        }
        Err(parse_error(format!("unrecognized token '{word}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_round_trip() {
        for v in [
            json!(true),
            json!(false),
            Value::Null,
            json!(-3),
            json!(2.5),
            json!("two words"),
            json!("quote \" slash \\ newline \n"),
        ] {
            assert_eq!(parse(&emit(&v)).unwrap(), v, "value {v}");
        }
    }

    #[test]
    fn nested_tree_round_trips() {
        let tree = json!({
            "preferences": {
                "version": 9,
                "button": {"button": 2, "modifiers": 0},
                "exceptions": [
                    {"k": "(window manager frame)", "v": null},
                    {"k": "firefox", "v": {"button": 8, "modifiers": 0}}
                ],
                "scroll_speed": 2.0,
                "empty_list": [],
                "empty_obj": {}
            }
        });
        assert_eq!(parse(&emit(&tree)).unwrap(), tree);
    }

    #[test]
    fn object_keys_preserve_order() {
        let text = "{\n  zebra 1\n  apple 2\n}\n";
        let parsed = parse(text).unwrap();
        let keys: Vec<&String> = parsed.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "apple"]);
    }

    #[test]
    fn malformed_input_is_rejected() {
        for text in [
            "{",
            "[",
            "\"open",
            "{ key }",
            "{ 3bad 1 }",
            "true extra",
            "wibble",
            "{ key \"v\" } }",
        ] {
            assert!(parse(text).is_err(), "accepted {text:?}");
        }
    }
}
