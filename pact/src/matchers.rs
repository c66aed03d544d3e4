//! Matcher expressions describing how an actual value relates to an example.
//!
//! Expressions nest: [`MatchExpr::Object`] and [`MatchExpr::Array`] place
//! matchers inside an otherwise literal shape, so `{ "id": like(27) }` checks
//! that `id` is a number while the rest of the document stays exact.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::PactError;

/// A compiled regular expression that must match the whole string.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    anchored: Regex,
}

impl Pattern {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidMatcher`] if the pattern does not compile.
    pub fn new(source: impl Into<String>) -> Result<Self, PactError> {
        let source = source.into();
        let anchored = Regex::new(&format!("^(?:{source})$"))
            .map_err(|e| PactError::invalid_matcher(format!("regex '{source}': {e}")))?;
        Ok(Self { source, anchored })
    }

    /// The pattern as written by the caller.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `value` matches in full.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.source)
    }
}

/// A rule describing how an actual value must relate to an expected shape.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchExpr {
    /// Exact value equality; objects still tolerate extra keys
    Literal(Value),
    /// Same type class as the example, cascading into objects and arrays
    Type(Value),
    /// Array of at least `min` elements, each matching `element`
    MinArray {
        /// Expression every element must satisfy
        element: Box<MatchExpr>,
        /// Minimum number of elements
        min: usize,
    },
    /// String fully matching a regular expression
    Regex {
        /// Compiled pattern
        pattern: Pattern,
        /// Example string, guaranteed to match `pattern`
        example: String,
    },
    /// Object whose declared keys each satisfy their own expression
    Object(BTreeMap<String, MatchExpr>),
    /// Fixed-length array matched element-wise
    Array(Vec<MatchExpr>),
}

impl MatchExpr {
    /// Concrete example value used for mock responses and contract bodies.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::Literal(value) | Self::Type(value) => value.clone(),
            Self::MinArray { element, min } => {
                let item = element.example();
                Value::Array(vec![item; (*min).max(1)])
            }
            Self::Regex { example, .. } => Value::String(example.clone()),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, expr)| (key.clone(), expr.example()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::example).collect()),
        }
    }

    /// Whether this expression, or anything nested in it, matches by rule
    /// rather than by value.
    #[must_use]
    pub fn has_rules(&self) -> bool {
        match self {
            Self::Literal(_) => false,
            Self::Type(_) | Self::MinArray { .. } | Self::Regex { .. } => true,
            Self::Object(fields) => fields.values().any(Self::has_rules),
            Self::Array(items) => items.iter().any(Self::has_rules),
        }
    }

    /// Canonical form: rule-free `Object`/`Array` subtrees collapse into a
    /// single `Literal`. Expressions with equal canonical forms match the
    /// same values and serialise to the same contract.
    #[must_use]
    pub fn normalized(&self) -> Self {
        match self {
            Self::Object(_) | Self::Array(_) if !self.has_rules() => Self::Literal(self.example()),
            Self::Object(fields) => Self::Object(
                fields
                    .iter()
                    .map(|(key, expr)| (key.clone(), expr.normalized()))
                    .collect(),
            ),
            Self::Array(items) => Self::Array(items.iter().map(Self::normalized).collect()),
            Self::MinArray { element, min } => Self::MinArray {
                element: Box::new(element.normalized()),
                min: *min,
            },
            Self::Literal(_) | Self::Type(_) | Self::Regex { .. } => self.clone(),
        }
    }

    /// The example as a string, for expressions used on headers, query
    /// parameters and paths.
    #[must_use]
    pub fn string_example(&self) -> Option<String> {
        match self.example() {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for MatchExpr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for MatchExpr {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for MatchExpr {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

/// Exact match on `value`.
#[must_use]
pub fn literal(value: impl Into<Value>) -> MatchExpr {
    MatchExpr::Literal(value.into())
}

/// Match anything of the same type class as `example`.
#[must_use]
pub fn like(example: impl Into<Value>) -> MatchExpr {
    MatchExpr::Type(example.into())
}

/// Array of at least one element, each shaped like `example`.
#[must_use]
pub fn each_like(example: impl Into<Value>) -> MatchExpr {
    min_type(example, 1)
}

/// Array of at least `min` elements, each shaped like `example`.
#[must_use]
pub fn min_type(example: impl Into<Value>, min: usize) -> MatchExpr {
    min_array(like(example), min)
}

/// Array of at least `min` elements, each satisfying `element`.
///
/// The minimum-length rule is a type rule, so literals inside `element`
/// compare by type, the same way a provider verifier reads the contract.
#[must_use]
pub fn min_array(element: MatchExpr, min: usize) -> MatchExpr {
    MatchExpr::MinArray {
        element: Box::new(element),
        min,
    }
}

/// String matching `pattern` in full, documented by `example`.
///
/// # Errors
///
/// Returns [`PactError::InvalidMatcher`] if the pattern does not compile or
/// the example does not match it.
pub fn term(pattern: &str, example: impl Into<String>) -> Result<MatchExpr, PactError> {
    let pattern = Pattern::new(pattern)?;
    let example = example.into();
    if !pattern.is_match(&example) {
        return Err(PactError::invalid_matcher(format!(
            "example '{example}' does not match /{}/",
            pattern.as_str()
        )));
    }
    Ok(MatchExpr::Regex { pattern, example })
}

/// Object with per-key expressions.
#[must_use]
pub fn object<K, I>(fields: I) -> MatchExpr
where
    K: Into<String>,
    I: IntoIterator<Item = (K, MatchExpr)>,
{
    MatchExpr::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
}

/// Fixed-length array with per-element expressions.
#[must_use]
pub fn array(items: impl IntoIterator<Item = MatchExpr>) -> MatchExpr {
    MatchExpr::Array(items.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_min_type_example_repeats_element() {
        let expr = min_type(json!({"id": 27, "name": "burger"}), 3);
        assert_eq!(
            expr.example(),
            json!([
                {"id": 27, "name": "burger"},
                {"id": 27, "name": "burger"},
                {"id": 27, "name": "burger"}
            ])
        );
    }

    #[test]
    fn test_min_zero_still_documents_one_element() {
        let expr = min_type(json!("x"), 0);
        assert_eq!(expr.example(), json!(["x"]));
    }

    #[test]
    fn test_nested_example() {
        let expr = object([
            ("id", like(27)),
            ("name", like("burger")),
            ("type", literal("food")),
        ]);
        assert_eq!(expr.example(), json!({"id": 27, "name": "burger", "type": "food"}));
        assert!(expr.has_rules());
    }

    #[test]
    fn test_term_rejects_non_matching_example() {
        assert!(term(r"\d+", "27").is_ok());
        let err = term(r"\d+", "abc").unwrap_err();
        assert!(matches!(err, PactError::InvalidMatcher { .. }));
        assert!(term("(unclosed", "x").is_err());
    }

    #[test]
    fn test_pattern_is_anchored() {
        let pattern = Pattern::new("/Products/[0-9]+").unwrap();
        assert!(pattern.is_match("/Products/27"));
        assert!(!pattern.is_match("/Products/27/reviews"));
        assert!(!pattern.is_match("/v2/Products/27"));
    }

    #[test]
    fn test_normalized_collapses_rule_free_objects() {
        let expr = object([("a", literal(1)), ("b", array([literal("x")]))]);
        assert_eq!(expr.normalized(), literal(json!({"a": 1, "b": ["x"]})));

        let expr = object([("a", literal(1)), ("b", like("x"))]);
        assert_eq!(expr.normalized(), expr);
    }
}
