//! Matching rules as stored in contract documents.
//!
//! A contract body carries example values; the matchers that produced them
//! are kept alongside as rules keyed by a `$`-rooted path (`$.id`,
//! `$[*].name`). [`collect_rules`] flattens a [`MatchExpr`] into that form
//! and [`rebuild`] reverses it from an example plus its rules.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PactError;
use crate::matchers::{MatchExpr, Pattern};
use crate::matching::{child_index, child_key};

/// Root of every body rule path.
pub const ROOT: &str = "$";

/// A single matcher in serialised form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "lowercase")]
pub enum Rule {
    /// Type match, optionally with a minimum array length
    Type {
        /// Minimum number of array elements
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<usize>,
    },
    /// Full-string regular expression
    Regex {
        /// Pattern source
        regex: String,
    },
}

/// The matchers applying at one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleList {
    /// Matchers, all of which must hold
    pub matchers: Vec<Rule>,
    /// Combination operator; only `AND` is produced
    #[serde(default = "default_combine")]
    pub combine: String,
}

fn default_combine() -> String {
    "AND".to_string()
}

impl RuleList {
    /// A list holding one rule.
    #[must_use]
    pub fn single(rule: Rule) -> Self {
        Self {
            matchers: vec![rule],
            combine: default_combine(),
        }
    }
}

/// Rules keyed by path.
pub type RuleSet = BTreeMap<String, RuleList>;

/// Rule describing `expr` itself, if it matches by rule.
#[must_use]
pub fn own_rule(expr: &MatchExpr) -> Option<Rule> {
    match expr {
        MatchExpr::Type(_) => Some(Rule::Type { min: None }),
        MatchExpr::MinArray { min, .. } => Some(Rule::Type { min: Some(*min) }),
        MatchExpr::Regex { pattern, .. } => Some(Rule::Regex {
            regex: pattern.as_str().to_string(),
        }),
        MatchExpr::Literal(_) | MatchExpr::Object(_) | MatchExpr::Array(_) => None,
    }
}

/// Flatten the rules of `expr`, located at `path`, into `rules`.
pub fn collect_rules(expr: &MatchExpr, path: &str, rules: &mut RuleSet) {
    if let Some(rule) = own_rule(expr) {
        rules.insert(path.to_string(), RuleList::single(rule));
    }
    match expr {
        MatchExpr::MinArray { element, .. } => {
            collect_rules(element, &format!("{path}[*]"), rules);
        }
        MatchExpr::Object(fields) => {
            for (key, field) in fields {
                collect_rules(field, &child_key(path, key), rules);
            }
        }
        MatchExpr::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_rules(item, &child_index(path, index), rules);
            }
        }
        MatchExpr::Literal(_) | MatchExpr::Type(_) | MatchExpr::Regex { .. } => {}
    }
}

/// Rules for a whole body, rooted at [`ROOT`].
#[must_use]
pub fn body_rules(expr: &MatchExpr) -> RuleSet {
    let mut rules = RuleSet::new();
    collect_rules(expr, ROOT, &mut rules);
    rules
}

/// Rebuild the expression located at `path` from its example and rules.
///
/// Subtrees without any rule come back as a single `Literal`, so the result
/// equals the [`MatchExpr::normalized`] form of what was collected.
///
/// # Errors
///
/// Returns [`PactError::InvalidContract`] when a rule does not fit its
/// example (e.g. a minimum-length rule on a non-array).
pub fn rebuild(example: &Value, path: &str, rules: &RuleSet) -> Result<MatchExpr, PactError> {
    if let Some(list) = rules.get(path) {
        let rule = list
            .matchers
            .first()
            .ok_or_else(|| PactError::invalid_contract(format!("empty rule list at {path}")))?;
        return rebuild_with_rule(example, path, rule, rules);
    }

    if !has_rules_below(path, rules) {
        return Ok(MatchExpr::Literal(example.clone()));
    }

    match example {
        Value::Object(members) => members
            .iter()
            .map(|(key, value)| Ok((key.clone(), rebuild(value, &child_key(path, key), rules)?)))
            .collect::<Result<_, PactError>>()
            .map(MatchExpr::Object),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| rebuild(item, &child_index(path, index), rules))
            .collect::<Result<_, PactError>>()
            .map(MatchExpr::Array),
        _ => Ok(MatchExpr::Literal(example.clone())),
    }
}

/// Rebuild a single-string expression (path, header, query value).
///
/// # Errors
///
/// Returns [`PactError::InvalidContract`] for rules that cannot apply to a
/// string.
pub fn rebuild_string(example: &str, list: Option<&RuleList>) -> Result<MatchExpr, PactError> {
    let value = Value::String(example.to_string());
    match list.and_then(|l| l.matchers.first()) {
        Some(rule) => rebuild_with_rule(&value, ROOT, rule, &RuleSet::new()),
        None => Ok(MatchExpr::Literal(value)),
    }
}

fn rebuild_with_rule(
    example: &Value,
    path: &str,
    rule: &Rule,
    rules: &RuleSet,
) -> Result<MatchExpr, PactError> {
    match rule {
        Rule::Type { min: None } => Ok(MatchExpr::Type(example.clone())),
        Rule::Type { min: Some(min) } => {
            let first = example
                .as_array()
                .and_then(|items| items.first())
                .ok_or_else(|| {
                    PactError::invalid_contract(format!(
                        "minimum-length rule at {path} needs a non-empty array example"
                    ))
                })?;
            let element = rebuild(first, &format!("{path}[*]"), rules)?;
            Ok(MatchExpr::MinArray {
                element: Box::new(element),
                min: *min,
            })
        }
        Rule::Regex { regex } => {
            let Value::String(text) = example else {
                return Err(PactError::invalid_contract(format!(
                    "regex rule at {path} needs a string example"
                )));
            };
            let pattern = Pattern::new(regex.as_str())
                .map_err(|e| PactError::invalid_contract(format!("{path}: {e}")))?;
            Ok(MatchExpr::Regex {
                pattern,
                example: text.clone(),
            })
        }
    }
}

fn has_rules_below(path: &str, rules: &RuleSet) -> bool {
    rules
        .range::<str, _>((std::ops::Bound::Excluded(path), std::ops::Bound::Unbounded))
        .take_while(|(key, _)| key.starts_with(path))
        .any(|(key, _)| matches!(key.as_bytes().get(path.len()), Some(b'.' | b'[')))
}
