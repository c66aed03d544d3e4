//! Declared request/response pairs and the live requests matched against them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::matchers::MatchExpr;
use crate::matching::{Mismatch, MatchResult, child_key, match_value};

/// HTTP methods an interaction can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
}

impl HttpMethod {
    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

/// How closely a request path expression pins down the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    /// Literal path
    Exact,
    /// Regular expression path
    Pattern,
}

/// Expected request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    /// HTTP method
    pub method: HttpMethod,
    /// Literal path or regex
    pub path: MatchExpr,
    /// Query parameters; every parameter sent must be declared
    pub query: BTreeMap<String, MatchExpr>,
    /// Required headers; others are ignored
    pub headers: BTreeMap<String, MatchExpr>,
    /// Expected body; `None` accepts any body
    pub body: Option<MatchExpr>,
}

impl RequestSpec {
    /// Create a request expectation.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<MatchExpr>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// GET request expectation.
    #[must_use]
    pub fn get(path: impl Into<MatchExpr>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// POST request expectation.
    #[must_use]
    pub fn post(path: impl Into<MatchExpr>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Require a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<MatchExpr>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Require a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<MatchExpr>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Require a JSON body.
    #[must_use]
    pub fn with_json_body(mut self, body: impl Into<MatchExpr>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Path used in listings and contracts.
    #[must_use]
    pub fn path_example(&self) -> String {
        self.path.string_example().unwrap_or_default()
    }

    /// Whether method and path admit the request, and how specifically.
    #[must_use]
    pub fn route_specificity(&self, actual: &ActualRequest) -> Option<Specificity> {
        if !self.method.as_str().eq_ignore_ascii_case(&actual.method) {
            return None;
        }
        let path = Value::String(actual.path.clone());
        if !match_value(&self.path, &path, "path").matched() {
            return None;
        }
        Some(match self.path {
            MatchExpr::Literal(_) => Specificity::Exact,
            _ => Specificity::Pattern,
        })
    }

    /// Method and path comparison.
    #[must_use]
    pub fn match_route(&self, actual: &ActualRequest) -> MatchResult {
        let mut result = MatchResult::matched_result();
        if !self.method.as_str().eq_ignore_ascii_case(&actual.method) {
            result = result.and(MatchResult::from_mismatches(vec![Mismatch::new(
                "method",
                self.method.as_str(),
                actual.method.clone(),
            )]));
        }
        result.and(match_value(&self.path, &Value::String(actual.path.clone()), "path"))
    }

    /// Query and header comparison.
    #[must_use]
    pub fn match_metadata(&self, actual: &ActualRequest) -> MatchResult {
        let mut mismatches = Vec::new();

        for (name, expr) in &self.query {
            let path = child_key("query", name);
            match actual.query.get(name) {
                Some(values) => {
                    for value in values {
                        mismatches.extend(
                            match_value(expr, &Value::String(value.clone()), &path).into_mismatches(),
                        );
                    }
                }
                None => mismatches.push(Mismatch::new(
                    path,
                    expr.string_example().unwrap_or_default(),
                    "<missing>",
                )),
            }
        }
        for (name, values) in &actual.query {
            if !self.query.contains_key(name) {
                mismatches.push(Mismatch::new(
                    child_key("query", name),
                    "<absent>",
                    values.join(","),
                ));
            }
        }

        for (name, expr) in &self.headers {
            let path = child_key("header", name);
            match actual.header(name) {
                Some(value) => mismatches.extend(
                    match_value(expr, &Value::String(value.to_string()), &path).into_mismatches(),
                ),
                None => mismatches.push(Mismatch::new(
                    path,
                    expr.string_example().unwrap_or_default(),
                    "<missing>",
                )),
            }
        }

        MatchResult::from_mismatches(mismatches)
    }

    /// Body comparison.
    #[must_use]
    pub fn match_body(&self, actual: &ActualRequest) -> MatchResult {
        match (&self.body, &actual.body) {
            (None, _) => MatchResult::matched_result(),
            (Some(expected), Some(body)) => match_value(expected, body, "body"),
            (Some(expected), None) => MatchResult::from_mismatches(vec![Mismatch::new(
                "body",
                crate::matching::render(&expected.example()),
                "<empty>",
            )]),
        }
    }

    /// Full comparison of every request field.
    #[must_use]
    pub fn match_request(&self, actual: &ActualRequest) -> MatchResult {
        self.match_route(actual)
            .and(self.match_metadata(actual))
            .and(self.match_body(actual))
    }
}

/// Declared response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSpec {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: BTreeMap<String, String>,
    /// Response body, served as its example
    pub body: Option<MatchExpr>,
}

impl ResponseSpec {
    /// Create a response with the given status.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_json_body(mut self, body: impl Into<MatchExpr>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Whether a header with this name is declared, ignoring case.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// One declared request/response pairing.
#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    /// Human-readable description, unique per provider state
    pub description: String,
    /// Precondition the provider must set up
    pub provider_state: Option<String>,
    /// Expected request
    pub request: RequestSpec,
    /// Response to serve
    pub response: ResponseSpec,
}

impl Interaction {
    /// Create an interaction without provider state.
    #[must_use]
    pub fn new(description: impl Into<String>, request: RequestSpec, response: ResponseSpec) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            request,
            response,
        }
    }

    /// Set the provider state.
    #[must_use]
    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_state = Some(state.into());
        self
    }

    /// Identity used for duplicate detection and contract merging.
    #[must_use]
    pub fn key(&self) -> (&str, Option<&str>) {
        (&self.description, self.provider_state.as_deref())
    }
}

/// A live request, normalised for matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualRequest {
    /// Upper-case method
    pub method: String,
    /// Request path without query string
    pub path: String,
    /// Decoded query parameters
    pub query: BTreeMap<String, Vec<String>>,
    /// Lower-cased header names with comma-joined values
    pub headers: BTreeMap<String, String>,
    /// JSON body; non-JSON payloads are kept as a JSON string
    pub body: Option<Value>,
}

impl ActualRequest {
    /// Create a request with method and path only.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Parse and add a raw query string.
    #[must_use]
    pub fn with_query_string(mut self, raw: &str) -> Self {
        for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            self.query
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        self
    }

    /// Add a header value; repeated names are joined with `", "`.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
        self
    }

    /// Set the body from raw bytes.
    #[must_use]
    pub fn with_raw_body(mut self, raw: &[u8]) -> Self {
        self.body = if raw.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(raw).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(raw).into_owned())
            }))
        };
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Header value by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// `METHOD /path` summary for logs and diagnostics.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}
