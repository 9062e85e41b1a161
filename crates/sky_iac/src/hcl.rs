//! HCL text rendering helpers.
//!
//! Small, deterministic building blocks used by the compiler: string quoting,
//! identifier derivation and rendering of JSON-shaped configuration values as
//! HCL expressions and nested blocks.

use serde_json::Value;

/// Indentation unit used throughout generated files.
pub const INDENT: &str = "  ";

/// Quote a string as an HCL string literal.
///
/// Template sequences are escaped so user text is never interpolated.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(ch);
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// Derive a Terraform local name from a user-facing label.
///
/// Lowercases the label and collapses every run of non-alphanumeric
/// characters into a single `_`.
pub fn local_name(label: &str) -> String {
    let mut name = String::with_capacity(label.len());
    let mut in_gap = false;
    for ch in label.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            name.push(ch);
            in_gap = false;
        } else if !in_gap {
            name.push('_');
            in_gap = true;
        }
    }
    name
}

/// Make a derived local name usable as an HCL identifier.
///
/// Empty names fall back to `fallback`; names starting with a digit get a
/// leading underscore.
pub fn identifier(name: &str, fallback: &str) -> String {
    let base = if name.is_empty() { local_name(fallback) } else { name.to_string() };
    match base.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{}", base),
        Some(_) => base,
        None => "resource".to_string(),
    }
}

/// Whether a key can be written unquoted.
pub fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn render_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Render a value as an HCL expression at the given nesting depth.
pub fn render_value(value: &Value, depth: usize) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            if items.iter().all(is_scalar) {
                let rendered = items.iter().map(|v| render_value(v, depth)).collect::<Vec<_>>();
                return format!("[{}]", rendered.join(", "));
            }
            let inner = INDENT.repeat(depth + 1);
            let mut out = String::from("[\n");
            for item in items {
                out.push_str(&format!("{}{},\n", inner, render_value(item, depth + 1)));
            }
            out.push_str(&format!("{}]", INDENT.repeat(depth)));
            out
        }
        Value::Object(map) => {
            if map.is_empty() {
                return "{}".to_string();
            }
            let attributes = map
                .iter()
                .map(|(k, v)| (render_key(k), render_value(v, depth + 1)))
                .collect::<Vec<_>>();
            format!("{{\n{}{}}}", render_attributes(&attributes, depth + 1), INDENT.repeat(depth))
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Whether a value should be written with nested block syntax.
pub fn is_block_value(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty() && items.iter().all(|v| matches!(v, Value::Object(_))),
        _ => false,
    }
}

/// Render `key = value` lines with aligned equals signs.
///
/// Values must already be rendered for `depth`. Each line ends with a newline.
pub fn render_attributes(attributes: &[(String, String)], depth: usize) -> String {
    let width = attributes.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let indent = INDENT.repeat(depth);
    attributes
        .iter()
        .map(|(k, v)| format!("{}{:<width$} = {}\n", indent, k, v, width = width))
        .collect()
}

/// Render a nested block (`name { ... }`) from an object value.
///
/// Arrays of objects render one block per element.
pub fn render_nested_block(name: &str, value: &Value, depth: usize) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| render_nested_block(name, item, depth))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => {
            let indent = INDENT.repeat(depth);
            let mut attributes = Vec::new();
            let mut blocks = Vec::new();
            for (key, inner) in map {
                if is_block_value(inner) {
                    blocks.push(render_nested_block(key, inner, depth + 1));
                } else {
                    attributes.push((render_key(key), render_value(inner, depth + 1)));
                }
            }

            let mut out = format!("{}{} {{\n", indent, name);
            out.push_str(&render_attributes(&attributes, depth + 1));
            for block in blocks {
                if !out.ends_with("{\n") {
                    out.push('\n');
                }
                out.push_str(&block);
            }
            out.push_str(&format!("{}}}\n", indent));
            out
        }
        other => format!("{}{} = {}\n", INDENT.repeat(depth), render_key(name), render_value(other, depth)),
    }
}
