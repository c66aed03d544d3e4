//! Comparison of actual values against matcher expressions.
//!
//! Every comparison walks the whole expected shape and collects every
//! mismatch with a qualified path (`body.id`, `body[0].name`), so one failed
//! request reports everything that is wrong with it.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::matchers::MatchExpr;

/// A single difference between an expected shape and an actual value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Qualified location of the difference
    pub path: String,
    /// What the expression required
    pub expected: String,
    /// What was received
    pub actual: String,
}

impl Mismatch {
    /// Create a mismatch.
    #[must_use]
    pub fn new(path: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: expected {} but was {}", self.path, self.expected, self.actual)
    }
}

/// Outcome of one comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    mismatches: Vec<Mismatch>,
}

impl MatchResult {
    /// A result with no mismatches.
    #[must_use]
    pub const fn matched_result() -> Self {
        Self {
            mismatches: Vec::new(),
        }
    }

    /// A result carrying the given mismatches.
    #[must_use]
    pub const fn from_mismatches(mismatches: Vec<Mismatch>) -> Self {
        Self { mismatches }
    }

    /// Whether the value satisfied the expression.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Mismatches in discovery order.
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Consume the result, returning its mismatches.
    #[must_use]
    pub fn into_mismatches(self) -> Vec<Mismatch> {
        self.mismatches
    }

    /// Append the mismatches of another comparison.
    #[must_use]
    pub fn and(mut self, other: Self) -> Self {
        self.mismatches.extend(other.mismatches);
        self
    }
}

/// Qualitative JSON type, ignoring numeric subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Any number, integer or float
    Number,
    /// String
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl TypeClass {
    /// Classify a value.
    #[must_use]
    pub const fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// Compare `actual` against `expr`, reporting paths relative to `root`.
#[must_use]
pub fn match_value(expr: &MatchExpr, actual: &Value, root: &str) -> MatchResult {
    let mut mismatches = Vec::new();
    compare(expr, actual, root, false, &mut mismatches);
    MatchResult { mismatches }
}

/// Path of an object member, using bracket notation for keys that are not
/// plain identifiers.
#[must_use]
pub fn child_key(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        format!("{parent}.{key}")
    } else {
        format!("{parent}['{}']", key.replace('\'', "\\'"))
    }
}

/// Path of an array element.
#[must_use]
pub fn child_index(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

/// Render a value for diagnostics.
#[must_use]
pub fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

fn render_with_type(value: &Value) -> String {
    format!("{} ({})", render(value), TypeClass::of(value))
}

/// Under `cascade`, literals compare by type: a minimum-length rule governs
/// its elements the way a contract verifier applies it.
fn compare(expr: &MatchExpr, actual: &Value, path: &str, cascade: bool, out: &mut Vec<Mismatch>) {
    match expr {
        MatchExpr::Literal(expected) if cascade => compare_type(expected, actual, path, out),
        MatchExpr::Literal(expected) => compare_literal(expected, actual, path, out),
        MatchExpr::Type(example) => compare_type(example, actual, path, out),
        MatchExpr::MinArray { element, min } => compare_min_array(element, *min, actual, path, out),
        MatchExpr::Regex { pattern, .. } => match actual {
            Value::String(s) if pattern.is_match(s) => {}
            Value::String(_) => out.push(Mismatch::new(
                path,
                format!("a string matching /{}/", pattern.as_str()),
                render(actual),
            )),
            _ => out.push(Mismatch::new(
                path,
                format!("a string matching /{}/", pattern.as_str()),
                render_with_type(actual),
            )),
        },
        MatchExpr::Object(fields) => {
            let Value::Object(actual_map) = actual else {
                out.push(Mismatch::new(path, "an object", render_with_type(actual)));
                return;
            };
            for (key, field) in fields {
                let field_path = child_key(path, key);
                match actual_map.get(key) {
                    Some(value) => compare(field, value, &field_path, cascade, out),
                    None => out.push(missing(field_path, &field.example())),
                }
            }
        }
        MatchExpr::Array(items) => {
            let Value::Array(actual_items) = actual else {
                out.push(Mismatch::new(path, "an array", render_with_type(actual)));
                return;
            };
            if items.len() != actual_items.len() {
                out.push(length_mismatch(path, items.len(), actual_items.len()));
            }
            for (index, (item, value)) in items.iter().zip(actual_items).enumerate() {
                compare(item, value, &child_index(path, index), cascade, out);
            }
        }
    }
}

fn compare_literal(expected: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    match (expected, actual) {
        (Value::Object(expected_map), Value::Object(actual_map)) => {
            compare_members(expected_map, actual_map, path, out, compare_literal);
        }
        (Value::Array(expected_items), Value::Array(actual_items)) => {
            if expected_items.len() != actual_items.len() {
                out.push(length_mismatch(path, expected_items.len(), actual_items.len()));
            }
            for (index, (e, a)) in expected_items.iter().zip(actual_items).enumerate() {
                compare_literal(e, a, &child_index(path, index), out);
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            if !numbers_equal(e, a) {
                out.push(Mismatch::new(path, render(expected), render(actual)));
            }
        }
        _ if TypeClass::of(expected) != TypeClass::of(actual) => {
            out.push(Mismatch::new(path, render_with_type(expected), render_with_type(actual)));
        }
        _ => {
            if expected != actual {
                out.push(Mismatch::new(path, render(expected), render(actual)));
            }
        }
    }
}

fn compare_type(example: &Value, actual: &Value, path: &str, out: &mut Vec<Mismatch>) {
    let expected_class = TypeClass::of(example);
    if expected_class != TypeClass::of(actual) {
        out.push(Mismatch::new(
            path,
            format!("a value of type {expected_class}"),
            render_with_type(actual),
        ));
        return;
    }
    match (example, actual) {
        (Value::Object(example_map), Value::Object(actual_map)) => {
            compare_members(example_map, actual_map, path, out, compare_type);
        }
        (Value::Array(example_items), Value::Array(actual_items)) => {
            if let Some(template) = example_items.first() {
                for (index, item) in actual_items.iter().enumerate() {
                    compare_type(template, item, &child_index(path, index), out);
                }
            }
        }
        _ => {}
    }
}

fn compare_min_array(
    element: &MatchExpr,
    min: usize,
    actual: &Value,
    path: &str,
    out: &mut Vec<Mismatch>,
) {
    let Value::Array(items) = actual else {
        out.push(Mismatch::new(
            path,
            format!("an array with at least {min} element(s)"),
            render_with_type(actual),
        ));
        return;
    };
    if items.len() < min {
        out.push(Mismatch::new(
            path,
            format!("an array with at least {min} element(s)"),
            format!("an array with {} element(s)", items.len()),
        ));
    }
    for (index, item) in items.iter().enumerate() {
        compare(element, item, &child_index(path, index), true, out);
    }
}

/// Declared keys must be present; extra actual keys are allowed.
fn compare_members(
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    path: &str,
    out: &mut Vec<Mismatch>,
    recurse: fn(&Value, &Value, &str, &mut Vec<Mismatch>),
) {
    for (key, expected_value) in expected {
        let member_path = child_key(path, key);
        match actual.get(key) {
            Some(actual_value) => recurse(expected_value, actual_value, &member_path, out),
            None => out.push(missing(member_path, expected_value)),
        }
    }
}

fn missing(path: String, expected: &Value) -> Mismatch {
    Mismatch::new(path, render(expected), "<missing>")
}

fn length_mismatch(path: &str, expected: usize, actual: usize) -> Mismatch {
    Mismatch::new(
        path,
        format!("an array with {expected} element(s)"),
        format!("an array with {actual} element(s)"),
    )
}

fn numbers_equal(expected: &serde_json::Number, actual: &serde_json::Number) -> bool {
    match (expected.as_i64(), actual.as_i64()) {
        (Some(e), Some(a)) => e == a,
        _ => match (expected.as_u64(), actual.as_u64()) {
            (Some(e), Some(a)) => e == a,
            _ => expected.as_f64() == actual.as_f64(),
        },
    }
}
