//! Registration of interactions and lookup of the ones a request may target.

use std::sync::atomic::{AtomicUsize, Ordering};

use axum::http::{HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::PactError;
use crate::interaction::{ActualRequest, Interaction, Specificity};
use crate::matchers::MatchExpr;

/// A registered interaction a request may be routed to.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Registration index
    pub index: usize,
    /// The interaction
    pub interaction: &'a Interaction,
    /// How specifically its path matched
    pub specificity: Specificity,
}

/// Ordered interactions declared for one test.
#[derive(Debug, Clone, Default)]
pub struct InteractionRegistry {
    interactions: Vec<Interaction>,
}

impl InteractionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an interaction.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::DuplicateDescription`] if the same description and
    /// provider state are already registered, or
    /// [`PactError::InvalidInteraction`] if the interaction cannot be served.
    pub fn register(&mut self, interaction: Interaction) -> Result<(), PactError> {
        if self.interactions.iter().any(|i| i.key() == interaction.key()) {
            return Err(PactError::DuplicateDescription {
                description: interaction.description,
                provider_state: interaction.provider_state,
            });
        }
        validate(&interaction)?;
        debug!(
            description = %interaction.description,
            method = %interaction.request.method,
            path = %interaction.request.path_example(),
            "Interaction registered"
        );
        self.interactions.push(interaction);
        Ok(())
    }

    /// Registered interactions in order.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of registered interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Interactions whose method and path admit the request, best first.
    #[must_use]
    pub fn route_candidates(&self, request: &ActualRequest) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<_> = self
            .interactions
            .iter()
            .enumerate()
            .filter_map(|(index, interaction)| {
                interaction
                    .request
                    .route_specificity(request)
                    .map(|specificity| Candidate {
                        index,
                        interaction,
                        specificity,
                    })
            })
            .collect();
        candidates.sort_by_key(|c| (c.specificity, c.index));
        candidates
    }

    /// Interactions whose request line, query and headers match, best first.
    /// Bodies are not considered.
    #[must_use]
    pub fn find_candidates(&self, request: &ActualRequest) -> Vec<Candidate<'_>> {
        self.route_candidates(request)
            .into_iter()
            .filter(|c| c.interaction.request.match_metadata(request).matched())
            .collect()
    }

    /// Snapshot the registry for serving, with zeroed invocation counters.
    #[must_use]
    pub fn freeze(&self) -> Expectations {
        Expectations {
            invocations: self.interactions.iter().map(|_| AtomicUsize::new(0)).collect(),
            registry: self.clone(),
            failures: Mutex::new(Vec::new()),
        }
    }
}

fn validate(interaction: &Interaction) -> Result<(), PactError> {
    let invalid = |reason: String| PactError::invalid_interaction(&interaction.description, reason);
    let request = &interaction.request;

    match &request.path {
        MatchExpr::Literal(serde_json::Value::String(path)) if path.starts_with('/') => {}
        MatchExpr::Regex { .. } => {}
        other => {
            return Err(invalid(format!(
                "path must be a literal starting with '/' or a regex, got {other:?}"
            )));
        }
    }
    for (name, expr) in request.headers.iter().chain(&request.query) {
        if expr.string_example().is_none() {
            return Err(invalid(format!("'{name}' must resolve to a string example")));
        }
    }

    let response = &interaction.response;
    StatusCode::from_u16(response.status)
        .map_err(|_| invalid(format!("invalid response status {}", response.status)))?;
    for (name, value) in &response.headers {
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| invalid(format!("invalid response header name '{name}'")))?;
        HeaderValue::from_str(value)
            .map_err(|_| invalid(format!("invalid value for response header '{name}'")))?;
    }
    Ok(())
}

/// Read-only interactions being served, with per-interaction invocation
/// counters and the list of requests that matched nothing.
#[derive(Debug)]
pub struct Expectations {
    registry: InteractionRegistry,
    invocations: Vec<AtomicUsize>,
    failures: Mutex<Vec<String>>,
}

impl Expectations {
    /// The frozen registry.
    #[must_use]
    pub const fn registry(&self) -> &InteractionRegistry {
        &self.registry
    }

    /// Count one served call of the interaction at `index`.
    pub fn record_invocation(&self, index: usize) {
        if let Some(counter) = self.invocations.get(index) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Number of calls served for the interaction at `index`.
    #[must_use]
    pub fn invocations(&self, index: usize) -> usize {
        self.invocations
            .get(index)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }

    /// Interactions never invoked, in registration order.
    #[must_use]
    pub fn unmet(&self) -> Vec<&Interaction> {
        self.registry
            .interactions()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.invocations(*index) == 0)
            .map(|(_, interaction)| interaction)
            .collect()
    }

    /// Record a request that could not be matched.
    pub fn record_failure(&self, summary: impl Into<String>) {
        self.failures.lock().push(summary.into());
    }

    /// Summaries of requests that could not be matched.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{RequestSpec, ResponseSpec};
    use crate::matchers::term;

    fn get(description: &str, path: impl Into<MatchExpr>) -> Interaction {
        Interaction::new(description, RequestSpec::get(path), ResponseSpec::new(200))
    }

    #[test]
    fn test_duplicate_description_and_state_rejected() {
        let mut registry = InteractionRegistry::new();
        registry.register(get("get product", "/Products/27")).unwrap();
        registry
            .register(get("get product", "/Products/27").given("product 27 exists"))
            .unwrap();

        let err = registry.register(get("get product", "/Products/10")).unwrap_err();
        assert!(matches!(err, PactError::DuplicateDescription { provider_state: None, .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_invalid_interactions_rejected() {
        let mut registry = InteractionRegistry::new();
        let err = registry.register(get("relative", "Products")).unwrap_err();
        assert!(matches!(err, PactError::InvalidInteraction { .. }));

        let bad_status = Interaction::new("bad", RequestSpec::get("/"), ResponseSpec::new(1000));
        assert!(registry.register(bad_status).is_err());

        let bad_header = Interaction::new(
            "bad header",
            RequestSpec::get("/"),
            ResponseSpec::new(200).with_header("Bad Header", "x"),
        );
        assert!(registry.register(bad_header).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_candidates_ranked_exact_first() {
        let mut registry = InteractionRegistry::new();
        registry
            .register(get("any product", term(r"/Products/\d+", "/Products/1").unwrap()))
            .unwrap();
        registry.register(get("product 27", "/Products/27")).unwrap();
        registry.register(get("all products", "/Products")).unwrap();

        let request = ActualRequest::new("GET", "/Products/27");
        let ranked: Vec<_> = registry
            .find_candidates(&request)
            .iter()
            .map(|c| c.interaction.description.as_str())
            .collect();
        assert_eq!(ranked, vec!["product 27", "any product"]);
    }

    #[test]
    fn test_find_candidates_ignores_body_but_not_headers() {
        let mut registry = InteractionRegistry::new();
        registry
            .register(Interaction::new(
                "create product",
                RequestSpec::post("/Products")
                    .with_header("Content-Type", "application/json")
                    .with_json_body(serde_json::json!({"name": "burger"})),
                ResponseSpec::new(201),
            ))
            .unwrap();

        let without_header = ActualRequest::new("POST", "/Products");
        assert!(registry.find_candidates(&without_header).is_empty());
        assert_eq!(registry.route_candidates(&without_header).len(), 1);

        let wrong_body = without_header
            .with_header("content-type", "application/json")
            .with_json_body(serde_json::json!({"name": "pizza"}));
        assert_eq!(registry.find_candidates(&wrong_body).len(), 1);
    }

    #[test]
    fn test_frozen_counters() {
        let mut registry = InteractionRegistry::new();
        registry.register(get("a", "/a")).unwrap();
        registry.register(get("b", "/b")).unwrap();

        let expectations = registry.freeze();
        expectations.record_invocation(0);
        expectations.record_invocation(0);
        expectations.record_invocation(7);

        assert_eq!(expectations.invocations(0), 2);
        assert_eq!(expectations.invocations(1), 0);
        let unmet: Vec<_> = expectations.unmet().iter().map(|i| i.description.clone()).collect();
        assert_eq!(unmet, vec!["b"]);

        let fresh = registry.freeze();
        assert_eq!(fresh.invocations(0), 0);
    }
}
