//! Verification orchestrator.
//!
//! A [`Pact`] collects the interactions a consumer test declares, then runs
//! the test body against a mock provider serving exactly those interactions.
//! A run succeeds only if every interaction was exercised and no request
//! went unmatched, in which case the contract file is written.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{PactConfig, resolve_provider_name_from};
use crate::error::PactError;
use crate::interaction::Interaction;
use crate::mock_server::{MockServer, MockServerConfig, MockServerContext};
use crate::registry::{Expectations, InteractionRegistry};
use crate::writer::ContractWriter;

/// A consumer/provider pairing and the interactions declared for it.
#[derive(Debug)]
pub struct Pact {
    consumer: String,
    provider: String,
    config: PactConfig,
    registry: InteractionRegistry,
}

impl Pact {
    /// Create a pact. Installs the configured tracing subscriber unless one
    /// is already set.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>, config: PactConfig) -> Self {
        match pact_common::init_tracing(&config.tracing_config()) {
            Ok(installed) => debug!(installed, "Tracing initialised"),
            Err(_) => debug!("Tracing subscriber already installed"),
        }
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            config,
            registry: InteractionRegistry::new(),
        }
    }

    /// Create a pact configured from the environment, with the provider
    /// name overridable through `PACT_PROVIDER`.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Config`] if the environment is invalid.
    pub fn from_env(consumer: impl Into<String>, default_provider: &str) -> Result<Self, PactError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(consumer, default_provider, |name| std::env::var(name).ok())
    }

    /// [`from_env`](Self::from_env) through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`PactError::Config`] if a variable is invalid.
    pub fn from_lookup<F>(consumer: impl Into<String>, default_provider: &str, lookup: F) -> Result<Self, PactError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PactConfig::from_lookup(&lookup)?;
        Ok(Self::new(consumer, resolve_provider_name_from(lookup, default_provider), config))
    }

    /// Consumer name.
    #[must_use]
    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    /// Provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PactConfig {
        &self.config
    }

    /// Declared interactions.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        self.registry.interactions()
    }

    /// Where the contract is written on success.
    #[must_use]
    pub fn contract_path(&self) -> PathBuf {
        self.config.contract_path(&self.consumer, &self.provider)
    }

    /// Declare an interaction.
    ///
    /// # Errors
    ///
    /// See [`InteractionRegistry::register`].
    pub fn register(&mut self, interaction: Interaction) -> Result<&mut Self, PactError> {
        self.registry.register(interaction)?;
        Ok(self)
    }

    /// Run `body` against a fresh mock provider, then check and record the
    /// contract.
    ///
    /// # Errors
    ///
    /// - [`PactError::ServerStart`] if the mock provider cannot bind
    /// - [`PactError::TestFailed`] if `body` fails; no further checks run
    /// - [`PactError::UnmetExpectations`] if an interaction was never invoked
    /// - [`PactError::MismatchedRequests`] if a request matched nothing
    /// - [`PactError::Serialization`] if the contract cannot be written
    pub async fn verify<F, Fut, T>(&self, body: F) -> Result<T, PactError>
    where
        F: FnOnce(MockServerContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(body, None).await
    }

    /// [`verify`](Self::verify) with a limit on the body's running time.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify), plus [`PactError::TestTimeout`] when the
    /// limit expires. The mock provider is torn down either way.
    pub async fn verify_with_timeout<F, Fut, T>(&self, limit: Duration, body: F) -> Result<T, PactError>
    where
        F: FnOnce(MockServerContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.run(body, Some(limit)).await
    }

    /// Synchronous [`verify`](Self::verify). The mock provider runs on a
    /// private runtime while `body` runs on the calling thread.
    ///
    /// Must not be called from within an async runtime.
    ///
    /// # Errors
    ///
    /// As [`verify`](Self::verify).
    pub fn verify_blocking<F, T>(&self, body: F) -> Result<T, PactError>
    where
        F: FnOnce(MockServerContext) -> anyhow::Result<T>,
    {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pact-mock-server")
            .enable_all()
            .build()
            .map_err(|e| PactError::server_start(format!("failed to build runtime: {e}")))?;

        let expectations = Arc::new(self.registry.freeze());
        let mut server = MockServer::new(Arc::clone(&expectations), MockServerConfig::from(&self.config));
        let ctx = runtime.block_on(server.start())?;
        self.log_start(&ctx);

        let outcome = body(ctx);
        runtime.block_on(server.shutdown());

        let value = outcome.map_err(PactError::TestFailed)?;
        self.finish(&expectations)?;
        Ok(value)
    }

    async fn run<F, Fut, T>(&self, body: F, limit: Option<Duration>) -> Result<T, PactError>
    where
        F: FnOnce(MockServerContext) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let expectations = Arc::new(self.registry.freeze());
        let mut server = MockServer::new(Arc::clone(&expectations), MockServerConfig::from(&self.config));
        let ctx = server.start().await?;
        self.log_start(&ctx);

        let outcome = match limit {
            Some(limit) => tokio::time::timeout(limit, body(ctx))
                .await
                .map_err(|_| PactError::TestTimeout { after: limit }),
            None => Ok(body(ctx).await),
        };
        server.shutdown().await;

        let value = outcome?.map_err(PactError::TestFailed)?;
        self.finish(&expectations)?;
        Ok(value)
    }

    fn log_start(&self, ctx: &MockServerContext) {
        info!(
            consumer = %self.consumer,
            provider = %self.provider,
            uri = %ctx.mock_server_uri,
            interactions = self.registry.len(),
            "Running pact verification"
        );
    }

    fn finish(&self, expectations: &Expectations) -> Result<(), PactError> {
        let unmet: Vec<String> = expectations
            .unmet()
            .iter()
            .map(|i| i.description.clone())
            .collect();
        if !unmet.is_empty() {
            warn!(count = unmet.len(), "Interactions never invoked");
            return Err(PactError::UnmetExpectations { interactions: unmet });
        }

        let failures = expectations.failures();
        if !failures.is_empty() {
            warn!(count = failures.len(), "Requests matched no interaction");
            return Err(PactError::MismatchedRequests { requests: failures });
        }

        let destination = self.contract_path();
        ContractWriter::new(self.config.write_mode).write(
            &self.consumer,
            &self.provider,
            self.registry.interactions(),
            &destination,
        )
    }
}
