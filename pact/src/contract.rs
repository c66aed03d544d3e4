//! Pact contract document.
//!
//! The persisted form of a set of interactions: example values plus Pact v3
//! `matchingRules`, so a provider can replay the requests and check its
//! responses by shape rather than by exact value.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::PactError;
use crate::interaction::{HttpMethod, Interaction, RequestSpec, ResponseSpec};
use crate::matchers::MatchExpr;
use crate::rules::{self, RuleList, RuleSet};

/// Specification version written into every document.
pub const PACT_SPECIFICATION_VERSION: &str = "3.0.0";

/// A Pact contract between consumer and provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Contract interactions, in registration order
    pub interactions: Vec<ContractInteraction>,
    /// Contract metadata
    pub metadata: ContractMetadata,
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Precondition the provider sets up before replaying an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderState {
    /// State name
    pub name: String,
}

/// An interaction in a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractInteraction {
    /// Interaction description
    pub description: String,
    /// Provider states; at most one is produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_states: Vec<ProviderState>,
    /// Expected request
    pub request: ContractRequest,
    /// Expected response
    pub response: ContractResponse,
}

impl ContractInteraction {
    /// Identity used when merging documents.
    #[must_use]
    pub fn key(&self) -> (&str, Option<&str>) {
        (
            &self.description,
            self.provider_states.first().map(|s| s.name.as_str()),
        )
    }
}

/// HTTP request in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractRequest {
    /// HTTP method
    pub method: String,
    /// Example request path
    pub path: String,
    /// Example query parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, Vec<String>>,
    /// Example request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Example request body
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Matchers behind the examples
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
}

/// HTTP response in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContractResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Example response body
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Matchers behind the body example
    #[serde(default, skip_serializing_if = "MatchingRules::is_empty")]
    pub matching_rules: MatchingRules,
}

/// A body key that is present is a body, even when it holds `null`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Pact v3 matching rules, grouped by request/response part.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchingRules {
    /// Rule for the path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<RuleList>,
    /// Rules keyed by query parameter name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, RuleList>,
    /// Rules keyed by header name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub header: BTreeMap<String, RuleList>,
    /// Rules keyed by `$`-rooted body path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub body: RuleSet,
}

impl MatchingRules {
    /// Whether no rule is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.query.is_empty() && self.header.is_empty() && self.body.is_empty()
    }
}

/// Contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification")]
    pub pact_specification: PactSpecification,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self {
            pact_specification: PactSpecification {
                version: PACT_SPECIFICATION_VERSION.to_string(),
            },
        }
    }
}

impl Contract {
    /// Document the given interactions.
    #[must_use]
    pub fn from_interactions(consumer: &str, provider: &str, interactions: &[Interaction]) -> Self {
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            interactions: interactions.iter().map(ContractInteraction::from).collect(),
            metadata: ContractMetadata::default(),
        }
    }

    /// Read a contract file.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidContract`] if the file cannot be read or
    /// is not a contract document.
    pub fn read(path: &Path) -> Result<Self, PactError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PactError::invalid_contract(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Parse a contract document.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidContract`] on malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, PactError> {
        serde_json::from_str(text).map_err(|e| PactError::invalid_contract(e.to_string()))
    }

    /// Deterministic pretty-printed form with a trailing newline.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; not expected for documents built here.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    /// Rebuild the interactions this document describes.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidContract`] for unknown methods or rules
    /// that do not fit their examples.
    pub fn to_interactions(&self) -> Result<Vec<Interaction>, PactError> {
        self.interactions.iter().map(ContractInteraction::to_interaction).collect()
    }

    /// Fold `incoming` into this document: entries with the same
    /// description and provider state are replaced in place, new ones are
    /// appended.
    pub fn merge(&mut self, incoming: Vec<ContractInteraction>) {
        for interaction in incoming {
            match self.interactions.iter_mut().find(|i| i.key() == interaction.key()) {
                Some(existing) => *existing = interaction,
                None => self.interactions.push(interaction),
            }
        }
    }
}

impl From<&Interaction> for ContractInteraction {
    fn from(interaction: &Interaction) -> Self {
        Self {
            description: interaction.description.clone(),
            provider_states: interaction
                .provider_state
                .iter()
                .map(|name| ProviderState { name: name.clone() })
                .collect(),
            request: ContractRequest::from(&interaction.request),
            response: ContractResponse::from(&interaction.response),
        }
    }
}

impl From<&RequestSpec> for ContractRequest {
    fn from(spec: &RequestSpec) -> Self {
        let mut matching_rules = MatchingRules {
            path: rules::own_rule(&spec.path).map(RuleList::single),
            ..MatchingRules::default()
        };
        for (name, expr) in &spec.query {
            if let Some(rule) = rules::own_rule(expr) {
                matching_rules.query.insert(name.clone(), RuleList::single(rule));
            }
        }
        for (name, expr) in &spec.headers {
            if let Some(rule) = rules::own_rule(expr) {
                matching_rules.header.insert(name.clone(), RuleList::single(rule));
            }
        }
        if let Some(body) = &spec.body {
            matching_rules.body = rules::body_rules(body);
        }

        Self {
            method: spec.method.as_str().to_string(),
            path: spec.path_example(),
            query: spec
                .query
                .iter()
                .map(|(name, expr)| (name.clone(), vec![expr.string_example().unwrap_or_default()]))
                .collect(),
            headers: spec
                .headers
                .iter()
                .map(|(name, expr)| (name.clone(), expr.string_example().unwrap_or_default()))
                .collect(),
            body: spec.body.as_ref().map(MatchExpr::example),
            matching_rules,
        }
    }
}

impl From<&ResponseSpec> for ContractResponse {
    fn from(spec: &ResponseSpec) -> Self {
        Self {
            status: spec.status,
            headers: spec.headers.clone(),
            body: spec.body.as_ref().map(MatchExpr::example),
            matching_rules: MatchingRules {
                body: spec.body.as_ref().map(rules::body_rules).unwrap_or_default(),
                ..MatchingRules::default()
            },
        }
    }
}

impl ContractInteraction {
    /// Rebuild the interaction this entry describes.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::InvalidContract`] for unknown methods, empty
    /// query values, or rules that do not fit their examples.
    pub fn to_interaction(&self) -> Result<Interaction, PactError> {
        let request = &self.request;
        let method: HttpMethod = request.method.parse().map_err(PactError::invalid_contract)?;
        let rules = &request.matching_rules;

        let mut spec = RequestSpec::new(
            method,
            rules::rebuild_string(&request.path, rules.path.as_ref())?,
        );
        for (name, values) in &request.query {
            let value = values.first().ok_or_else(|| {
                PactError::invalid_contract(format!("query parameter '{name}' has no value"))
            })?;
            spec = spec.with_query(name.clone(), rules::rebuild_string(value, rules.query.get(name))?);
        }
        for (name, value) in &request.headers {
            spec = spec.with_header(name.clone(), rules::rebuild_string(value, rules.header.get(name))?);
        }
        if let Some(body) = &request.body {
            spec = spec.with_json_body(rules::rebuild(body, rules::ROOT, &rules.body)?);
        }

        let mut response = ResponseSpec::new(self.response.status);
        response.headers.clone_from(&self.response.headers);
        if let Some(body) = &self.response.body {
            response = response.with_json_body(rules::rebuild(
                body,
                rules::ROOT,
                &self.response.matching_rules.body,
            )?);
        }

        let interaction = Interaction::new(self.description.clone(), spec, response);
        Ok(match self.provider_states.first() {
            Some(state) => interaction.given(state.name.clone()),
            None => interaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchers::{like, min_type, object, term};
    use serde_json::json;

    fn products() -> Vec<Interaction> {
        vec![
            Interaction::new(
                "A GET request to retrieve products",
                RequestSpec::get("/Products"),
                ResponseSpec::new(200)
                    .with_header("Content-Type", "application/json; charset=utf-8")
                    .with_json_body(min_type(json!({"id": 27, "name": "burger", "type": "food"}), 1)),
            )
            .given("products exist"),
            Interaction::new(
                "A GET request for a product by pattern",
                RequestSpec::get(term(r"/Products/\d+", "/Products/27").unwrap())
                    .with_query("expand", like("details"))
                    .with_header("Accept", "application/json"),
                ResponseSpec::new(200).with_json_body(object([("id", like(27))])),
            ),
        ]
    }

    #[test]
    fn test_document_shape() {
        let contract = Contract::from_interactions("ApiClient", "ProductService", &products());
        let json = serde_json::to_value(&contract).unwrap();

        assert_eq!(json["metadata"], json!({"pactSpecification": {"version": "3.0.0"}}));
        let first = &json["interactions"][0];
        assert_eq!(first["providerStates"], json!([{"name": "products exist"}]));
        assert_eq!(first["request"], json!({"method": "GET", "path": "/Products"}));
        assert_eq!(
            first["response"]["body"],
            json!([{"id": 27, "name": "burger", "type": "food"}])
        );
        assert_eq!(
            first["response"]["matchingRules"]["body"]["$"],
            json!({"matchers": [{"match": "type", "min": 1}], "combine": "AND"})
        );

        let second = &json["interactions"][1];
        assert!(second.get("providerStates").is_none());
        assert_eq!(second["request"]["query"], json!({"expand": ["details"]}));
        assert_eq!(
            second["request"]["matchingRules"]["path"],
            json!({"matchers": [{"match": "regex", "regex": "/Products/\\d+"}], "combine": "AND"})
        );
        assert!(second["request"]["matchingRules"]["header"].is_null());
    }

    #[test]
    fn test_read_back_preserves_matchers() {
        let interactions = products();
        let contract = Contract::from_interactions("ApiClient", "ProductService", &interactions);
        let parsed = Contract::from_json(&contract.to_json_pretty().unwrap()).unwrap();
        assert_eq!(parsed, contract);

        let restored = parsed.to_interactions().unwrap();
        assert_eq!(restored.len(), interactions.len());
        for (restored, original) in restored.iter().zip(&interactions) {
            assert_eq!(restored.key(), original.key());
            assert_eq!(restored.request.path, original.request.path);
            assert_eq!(restored.request.query, original.request.query);
            assert_eq!(
                restored.response.body.as_ref().map(MatchExpr::normalized),
                original.response.body.as_ref().map(MatchExpr::normalized)
            );
        }
    }

    #[test]
    fn test_merge_replaces_by_key_and_appends() {
        let interactions = products();
        let mut contract = Contract::from_interactions("ApiClient", "ProductService", &interactions[..1]);

        let replacement = Interaction::new(
            "A GET request to retrieve products",
            RequestSpec::get("/Products"),
            ResponseSpec::new(204),
        )
        .given("products exist");
        contract.merge(vec![
            ContractInteraction::from(&interactions[1]),
            ContractInteraction::from(&replacement),
        ]);

        assert_eq!(contract.interactions.len(), 2);
        assert_eq!(contract.interactions[0].response.status, 204);
        assert_eq!(
            contract.interactions[1].description,
            "A GET request for a product by pattern"
        );
    }

    #[test]
    fn test_null_body_is_kept_apart_from_no_body() {
        let interactions = vec![
            Interaction::new("null body", RequestSpec::get("/a"), ResponseSpec::new(200).with_json_body(json!(null))),
            Interaction::new("no body", RequestSpec::get("/b"), ResponseSpec::new(204)),
        ];
        let contract = Contract::from_interactions("ApiClient", "ProductService", &interactions);
        let text = contract.to_json_pretty().unwrap();
        let parsed = Contract::from_json(&text).unwrap();
        assert_eq!(parsed, contract);
        assert_eq!(parsed.interactions[0].response.body, Some(Value::Null));
        assert_eq!(parsed.interactions[1].response.body, None);

        let restored = parsed.to_interactions().unwrap();
        assert_eq!(restored[0].response.body, Some(MatchExpr::Literal(Value::Null)));
        assert!(restored[1].response.body.is_none());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(Contract::from_json("{"), Err(PactError::InvalidContract(_))));

        let mut contract = Contract::from_interactions("a", "b", &products());
        contract.interactions[0].request.method = "TRACE".to_string();
        assert!(matches!(contract.to_interactions(), Err(PactError::InvalidContract(_))));

        let missing = Contract::read(Path::new("/nonexistent/contract.json"));
        assert!(matches!(missing, Err(PactError::InvalidContract(_))));
    }
}
