//! The response envelope every command prints: `{data, meta?, _hints?}`.
//!
//! Rendered as JSON (compact or pretty) or as EDN for Clojure-side tooling.

use std::fmt::Write as _;
use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::OutputFormat;
use crate::store::StoreError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(rename = "_hints", skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl Envelope {
    pub fn new(data: impl Serialize) -> Result<Self, StoreError> {
        Ok(Self {
            data: to_value(data)?,
            meta: None,
            hints: Vec::new(),
        })
    }

    pub fn with_meta(mut self, key: &str, value: impl Serialize) -> Result<Self, StoreError> {
        self.meta
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), to_value(value)?);
        Ok(self)
    }

    /// Blank hints are dropped.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        if !hint.trim().is_empty() {
            self.hints.push(hint);
        }
        self
    }

    pub fn render(&self, format: OutputFormat, pretty: bool) -> Result<String, StoreError> {
        match format {
            OutputFormat::Json => {
                let rendered = if pretty {
                    serde_json::to_string_pretty(self)
                } else {
                    serde_json::to_string(self)
                };
                rendered.map_err(|source| StoreError::Encode {
                    what: "response",
                    source,
                })
            }
            OutputFormat::Edn => {
                // Written by hand to keep `data` first.
                let mut out = String::from("{:data ");
                write_edn(&mut out, &self.data, pretty, 1);
                if let Some(meta) = &self.meta {
                    separator(&mut out, pretty, 1);
                    out.push_str(":meta ");
                    write_edn(&mut out, &Value::Object(meta.clone()), pretty, 1);
                }
                if !self.hints.is_empty() {
                    separator(&mut out, pretty, 1);
                    out.push_str(":_hints ");
                    let hints = self.hints.iter().cloned().map(Value::String).collect();
                    write_edn(&mut out, &Value::Array(hints), pretty, 1);
                }
                out.push('}');
                Ok(out)
            }
        }
    }

    /// Print to stdout. A closed pipe is not an error.
    pub fn print(&self, format: OutputFormat, pretty: bool) -> Result<(), StoreError> {
        let rendered = self.render(format, pretty)?;
        let mut stdout = std::io::stdout().lock();
        match writeln!(stdout, "{rendered}") {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(StoreError::Io {
                path: "<stdout>".into(),
                source: e,
            }),
            _ => Ok(()),
        }
    }
}

fn to_value(value: impl Serialize) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|source| StoreError::Encode {
        what: "response",
        source,
    })
}

fn write_edn(out: &mut String, value: &Value, pretty: bool, depth: usize) {
    match value {
        Value::Null => out.push_str("nil"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_edn_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    separator(out, pretty, depth + 1);
                }
                write_edn(out, item, pretty, depth + 1);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    separator(out, pretty, depth + 1);
                }
                write_keyword(out, key);
                out.push(' ');
                write_edn(out, item, pretty, depth + 1);
            }
            out.push('}');
        }
    }
}

fn separator(out: &mut String, pretty: bool, depth: usize) {
    if pretty {
        out.push('\n');
        out.extend(std::iter::repeat_n(' ', depth));
    } else {
        out.push(' ');
    }
}

/// Keys that cannot be keywords are written as strings.
fn write_keyword(out: &mut String, key: &str) {
    let valid = !key.is_empty()
        && !key.starts_with(|c: char| c.is_ascii_digit())
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '*' | '+' | '!' | '?'));
    if valid {
        out.push(':');
        out.push_str(key);
    } else {
        write_edn_string(out, key);
    }
}

fn write_edn_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_envelope_omits_empty_parts() {
        let env = Envelope::new(json!({"id": "item-1"})).unwrap();
        let rendered = env.render(OutputFormat::Json, false).unwrap();
        assert_eq!(rendered, r#"{"data":{"id":"item-1"}}"#);
    }

    #[test]
    fn meta_and_hints_are_carried() {
        let env = Envelope::new(vec![1, 2])
            .unwrap()
            .with_meta("count", 2)
            .unwrap()
            .hint("run `clarity sync push`")
            .hint("  ");
        let value: Value = serde_json::from_str(&env.render(OutputFormat::Json, true).unwrap()).unwrap();
        assert_eq!(value["meta"]["count"], 2);
        assert_eq!(value["_hints"], json!(["run `clarity sync push`"]));
    }

    #[test]
    fn edn_uses_keywords_and_vectors() {
        let env = Envelope::new(json!({"title": "say \"hi\"", "tags": ["a"], "due": null, "ok": true}))
            .unwrap()
            .hint("h");
        let rendered = env.render(OutputFormat::Edn, false).unwrap();
        assert_eq!(
            rendered,
            r#"{:data {:due nil :ok true :tags ["a"] :title "say \"hi\""} :_hints ["h"]}"#
        );
    }

    #[test]
    fn odd_keys_become_strings() {
        let mut out = String::new();
        write_edn(&mut out, &json!({"a b": 1, "1x": 2}), false, 0);
        assert_eq!(out, r#"{"1x" 2 "a b" 1}"#);
    }
}
