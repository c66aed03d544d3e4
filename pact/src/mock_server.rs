//! In-process mock provider.
//!
//! Lifecycle: `Stopped → Starting → Listening → Stopped`. While listening,
//! every request on any method and path goes through one fallback handler
//! that resolves it against the frozen expectations and either serves the
//! declared response or a `500` diagnostic listing what did not match.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PactConfig;
use crate::error::PactError;
use crate::interaction::{ActualRequest, Interaction, ResponseSpec};
use crate::matching::Mismatch;
use crate::registry::{Candidate, Expectations, InteractionRegistry};

/// Lifecycle state of a [`MockServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No socket bound
    Stopped,
    /// Binding the socket
    Starting,
    /// Accepting connections
    Listening,
}

/// Mock server settings.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Bind address; the port is always ephemeral
    pub host: IpAddr,
    /// Upper bound on binding
    pub bind_timeout: Duration,
    /// Upper bound on draining connections at teardown
    pub shutdown_timeout: Duration,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind_timeout: Duration::from_secs(5),
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl From<&PactConfig> for MockServerConfig {
    fn from(config: &PactConfig) -> Self {
        Self {
            host: config.host,
            bind_timeout: config.bind_timeout,
            shutdown_timeout: config.shutdown_timeout,
        }
    }
}

/// What the test body receives: where the mock provider is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerContext {
    /// Base URI, always ending in `/`
    pub mock_server_uri: Url,
    /// Bound socket address
    pub addr: SocketAddr,
}

impl MockServerContext {
    /// Absolute URL for a path relative to the base URI.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be joined onto the base URI.
    pub fn url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.mock_server_uri.join(path.trim_start_matches('/'))
    }
}

/// Body of the `500` served when a request matches no interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoMatchingInteraction {
    /// Summary of the failure
    pub error: String,
    /// Per-field differences, tagged with the interaction they refer to
    pub mismatches: Vec<InteractionMismatch>,
}

/// A mismatch against one specific interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionMismatch {
    /// Description of the interaction compared against
    pub interaction: String,
    /// The difference
    #[serde(flatten)]
    pub mismatch: Mismatch,
}

/// Outcome of resolving a live request.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// Serve this interaction's response
    Matched {
        /// Registration index
        index: usize,
        /// The interaction
        interaction: &'a Interaction,
    },
    /// Serve a diagnostic
    Unmatched(NoMatchingInteraction),
}

/// Resolve a request against the registry.
///
/// [`InteractionRegistry::find_candidates`] narrows by method, path, query
/// and headers; the body is then compared only for the best-ranked tier, so
/// a pattern route never shadows an exact one through a lucky body match.
#[must_use]
pub fn resolve<'a>(registry: &'a InteractionRegistry, request: &ActualRequest) -> Resolution<'a> {
    let candidates = registry.find_candidates(request);
    let tier: Vec<Candidate<'a>> = match candidates.first() {
        Some(best) => candidates
            .iter()
            .copied()
            .take_while(|c| c.specificity == best.specificity)
            .collect(),
        None => Vec::new(),
    };
    if let Some(hit) = tier
        .iter()
        .find(|c| c.interaction.request.match_body(request).matched())
    {
        return Resolution::Matched {
            index: hit.index,
            interaction: hit.interaction,
        };
    }

    let pool = if tier.is_empty() {
        registry.route_candidates(request)
    } else {
        tier
    };
    let closest = pool
        .iter()
        .map(|c| (c.interaction, c.interaction.request.match_request(request)))
        .min_by_key(|(_, result)| result.mismatches().len());
    let Some((interaction, result)) = closest else {
        return no_route(registry, request);
    };
    Resolution::Unmatched(NoMatchingInteraction {
        error: format!(
            "Request {} did not match interaction '{}'",
            request.summary(),
            interaction.description
        ),
        mismatches: tag(interaction, result.into_mismatches()),
    })
}

fn no_route<'a>(registry: &'a InteractionRegistry, request: &ActualRequest) -> Resolution<'a> {
    let registered: Vec<String> = registry
        .interactions()
        .iter()
        .map(|i| format!("{} {}", i.request.method, i.request.path_example()))
        .collect();
    let mismatches = registry
        .interactions()
        .iter()
        .flat_map(|i| tag(i, i.request.match_route(request).into_mismatches()))
        .collect();
    Resolution::Unmatched(NoMatchingInteraction {
        error: format!(
            "No interaction found for {}; registered: [{}]",
            request.summary(),
            registered.join(", ")
        ),
        mismatches,
    })
}

fn tag(interaction: &Interaction, mismatches: Vec<Mismatch>) -> Vec<InteractionMismatch> {
    mismatches
        .into_iter()
        .map(|mismatch| InteractionMismatch {
            interaction: interaction.description.clone(),
            mismatch,
        })
        .collect()
}

#[derive(Clone)]
struct MockState {
    expectations: Arc<Expectations>,
}

fn router(state: MockState) -> Router {
    Router::new()
        .fallback(handle_request)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http().on_failure(()))
        .with_state(state)
}

async fn handle_request(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    let mut request = ActualRequest::new(method.as_str(), path);
    if let Some(query) = uri.query() {
        request = request.with_query_string(query);
    }
    for (name, value) in &headers {
        request = request.with_header(name.as_str(), &String::from_utf8_lossy(value.as_bytes()));
    }
    let request = request.with_raw_body(&body);

    match resolve(state.expectations.registry(), &request) {
        Resolution::Matched { index, interaction } => {
            state.expectations.record_invocation(index);
            info!(
                request = %request.summary(),
                interaction = %interaction.description,
                "Request matched interaction"
            );
            declared_response(&interaction.response)
        }
        Resolution::Unmatched(diagnostic) => {
            warn!(
                request = %request.summary(),
                mismatches = diagnostic.mismatches.len(),
                "{}",
                diagnostic.error
            );
            for entry in &diagnostic.mismatches {
                debug!(interaction = %entry.interaction, "{}", entry.mismatch);
            }
            state.expectations.record_failure(diagnostic.error.clone());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(diagnostic)).into_response()
        }
    }
}

fn declared_response(spec: &ResponseSpec) -> Response {
    let mut headers = HeaderMap::new();
    for (name, value) in &spec.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(name, value);
        }
    }

    let body = match &spec.body {
        Some(expr) => {
            if !spec.has_header(CONTENT_TYPE.as_str()) {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            serde_json::to_vec(&expr.example()).unwrap_or_default()
        }
        None => Vec::new(),
    };

    let status = StatusCode::from_u16(spec.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, headers, body).into_response()
}

struct RunningServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.task.abort();
    }
}

/// A mock provider serving one set of expectations.
pub struct MockServer {
    expectations: Arc<Expectations>,
    config: MockServerConfig,
    state: ServerState,
    running: Option<RunningServer>,
}

impl MockServer {
    /// Create a stopped server.
    #[must_use]
    pub const fn new(expectations: Arc<Expectations>, config: MockServerConfig) -> Self {
        Self {
            expectations,
            config,
            state: ServerState::Stopped,
            running: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Bound address while listening.
    #[must_use]
    pub fn addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Expectations being served.
    #[must_use]
    pub const fn expectations(&self) -> &Arc<Expectations> {
        &self.expectations
    }

    /// Bind an ephemeral port and start serving in the background.
    ///
    /// Returns once the socket accepts connections.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::ServerStart`] if already listening, or if binding
    /// fails or exceeds the bind timeout.
    pub async fn start(&mut self) -> Result<MockServerContext, PactError> {
        if let Some(addr) = self.addr() {
            return Err(PactError::server_start(format!("already listening on {addr}")));
        }
        self.state = ServerState::Starting;
        let bind_addr = SocketAddr::new(self.config.host, 0);
        debug!(addr = %bind_addr, "Binding mock server");

        let listener = match tokio::time::timeout(self.config.bind_timeout, TcpListener::bind(bind_addr)).await {
            Ok(Ok(listener)) => listener,
            Ok(Err(e)) => return Err(self.fail_start(format!("failed to bind {bind_addr}: {e}"))),
            Err(_) => {
                return Err(self.fail_start(format!(
                    "binding {bind_addr} timed out after {:?}",
                    self.config.bind_timeout
                )));
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => return Err(self.fail_start(format!("no local address: {e}"))),
        };
        let mock_server_uri = match Url::parse(&format!("http://{addr}/")) {
            Ok(url) => url,
            Err(e) => return Err(self.fail_start(format!("invalid base URI for {addr}: {e}"))),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(MockState {
            expectations: Arc::clone(&self.expectations),
        });
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        self.running = Some(RunningServer {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task,
        });
        self.state = ServerState::Listening;
        info!(
            %addr,
            interactions = self.expectations.registry().len(),
            "Mock server listening"
        );

        Ok(MockServerContext {
            mock_server_uri,
            addr,
        })
    }

    fn fail_start(&mut self, reason: String) -> PactError {
        self.state = ServerState::Stopped;
        warn!(%reason, "Mock server failed to start");
        PactError::server_start(reason)
    }

    /// Stop accepting connections and wait, bounded by the shutdown
    /// timeout, for open connections to close. Idempotent.
    pub async fn shutdown(&mut self) {
        let Some(mut running) = self.running.take() else {
            self.state = ServerState::Stopped;
            return;
        };
        if let Some(tx) = running.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.config.shutdown_timeout, &mut running.task).await {
            Ok(Ok(Ok(()))) => info!(addr = %running.addr, "Mock server stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "Mock server stopped with error"),
            Ok(Err(e)) => warn!(error = %e, "Mock server task failed"),
            Err(_) => {
                warn!("Shutdown timeout reached, aborting mock server");
                running.task.abort();
            }
        }
        self.state = ServerState::Stopped;
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServer")
            .field("state", &self.state)
            .field("addr", &self.addr())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{RequestSpec, ResponseSpec};
    use crate::matchers::{like, object, term};
    use serde_json::json;

    fn registry() -> InteractionRegistry {
        let mut registry = InteractionRegistry::new();
        registry
            .register(Interaction::new(
                "product by pattern",
                RequestSpec::get(term(r"/Products/\d+", "/Products/1").unwrap()),
                ResponseSpec::new(200),
            ))
            .unwrap();
        registry
            .register(Interaction::new(
                "create product",
                RequestSpec::post("/Products").with_json_body(object([("name", like("burger"))])),
                ResponseSpec::new(201),
            ))
            .unwrap();
        registry
    }

    #[test]
    fn test_resolve_no_route_lists_every_interaction() {
        let registry = registry();
        let Resolution::Unmatched(diagnostic) = resolve(&registry, &ActualRequest::new("GET", "/Other")) else {
            panic!("expected no match");
        };
        assert!(diagnostic.error.contains("GET /Products/1"));
        assert!(diagnostic.error.contains("POST /Products"));
        let described: Vec<_> = diagnostic.mismatches.iter().map(|m| m.interaction.as_str()).collect();
        assert!(described.contains(&"product by pattern"));
        assert!(described.contains(&"create product"));
    }

    #[test]
    fn test_resolve_body_mismatch_reports_closest_candidate() {
        let registry = registry();
        let request = ActualRequest::new("POST", "/Products").with_json_body(json!({"name": 5}));
        let Resolution::Unmatched(diagnostic) = resolve(&registry, &request) else {
            panic!("expected mismatch");
        };
        assert_eq!(diagnostic.mismatches.len(), 1);
        assert_eq!(diagnostic.mismatches[0].interaction, "create product");
        assert_eq!(diagnostic.mismatches[0].mismatch.path, "body.name");
    }

    #[test]
    fn test_resolve_header_mismatch_reports_route_candidate() {
        let mut registry = registry();
        registry
            .register(Interaction::new(
                "list products as json",
                RequestSpec::get("/Products").with_header("Accept", "application/json"),
                ResponseSpec::new(200),
            ))
            .unwrap();

        let request = ActualRequest::new("GET", "/Products").with_header("accept", "text/plain");
        assert!(registry.find_candidates(&request).is_empty());
        let Resolution::Unmatched(diagnostic) = resolve(&registry, &request) else {
            panic!("expected mismatch");
        };
        assert!(diagnostic.error.contains("list products as json"));
        assert_eq!(diagnostic.mismatches.len(), 1);
        assert_eq!(diagnostic.mismatches[0].interaction, "list products as json");
    }

    #[test]
    fn test_resolve_match() {
        let registry = registry();
        let request = ActualRequest::new("GET", "/Products/42");
        assert!(matches!(
            resolve(&registry, &request),
            Resolution::Matched { index: 0, .. }
        ));
    }

    #[test]
    fn test_declared_response_adds_json_content_type_only_with_body() {
        let response = declared_response(&ResponseSpec::new(404));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().get(CONTENT_TYPE).is_none());

        let response = declared_response(
            &ResponseSpec::new(200)
                .with_header("Content-Type", "application/json; charset=utf-8")
                .with_json_body(json!({"id": 27})),
        );
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
    }

    #[test]
    fn test_diagnostic_wire_shape() {
        let diagnostic = NoMatchingInteraction {
            error: "boom".to_string(),
            mismatches: vec![InteractionMismatch {
                interaction: "get product".to_string(),
                mismatch: Mismatch::new("path", "/Products/27", "/Products/10"),
            }],
        };
        assert_eq!(
            serde_json::to_value(&diagnostic).unwrap(),
            json!({
                "error": "boom",
                "mismatches": [{
                    "interaction": "get product",
                    "path": "path",
                    "expected": "/Products/27",
                    "actual": "/Products/10"
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let expectations = Arc::new(registry().freeze());
        let mut server = MockServer::new(expectations, MockServerConfig::default());
        assert_eq!(server.state(), ServerState::Stopped);

        let ctx = server.start().await.unwrap();
        assert_eq!(server.state(), ServerState::Listening);
        assert_eq!(ctx.mock_server_uri.as_str(), format!("http://{}/", ctx.addr));
        assert_eq!(ctx.url("/Products").unwrap().path(), "/Products");

        let err = server.start().await.unwrap_err();
        assert!(matches!(err, PactError::ServerStart { .. }));

        server.shutdown().await;
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(server.addr().is_none());
        assert!(tokio::net::TcpStream::connect(ctx.addr).await.is_err());

        server.shutdown().await;
        assert_eq!(server.state(), ServerState::Stopped);
    }

    #[tokio::test]
    async fn test_bind_failure_is_server_start_error() {
        let expectations = Arc::new(registry().freeze());
        let config = MockServerConfig {
            host: "203.0.113.7".parse().unwrap(),
            ..MockServerConfig::default()
        };
        let mut server = MockServer::new(expectations, config);
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, PactError::ServerStart { .. }));
        assert_eq!(server.state(), ServerState::Stopped);
    }
}
