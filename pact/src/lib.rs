//! Consumer-driven contract testing.
//!
//! A consumer test declares the interactions it expects from a provider,
//! exercises its own HTTP client against an in-process mock provider that
//! serves exactly those interactions, and on success records them as a Pact
//! contract file the provider can later verify.
//!
//! ```no_run
//! use consumer_pact::{Interaction, Pact, PactConfig, RequestSpec, ResponseSpec, like, object};
//!
//! # async fn run() -> Result<(), consumer_pact::PactError> {
//! let mut pact = Pact::new("ApiClient", "ProductService", PactConfig::default());
//! pact.register(Interaction::new(
//!     "A GET request to retrieve a product",
//!     RequestSpec::get("/Products/27"),
//!     ResponseSpec::new(200).with_json_body(object([("id", like(27)), ("name", like("burger"))])),
//! ))?;
//!
//! pact.verify(|ctx| async move {
//!     let url = ctx.url("/Products/27")?;
//!     let body: serde_json::Value = reqwest::get(url).await?.json().await?;
//!     assert_eq!(body["id"], 27);
//!     Ok(())
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod contract;
pub mod error;
pub mod interaction;
pub mod matchers;
pub mod matching;
pub mod mock_server;
pub mod pact;
pub mod registry;
pub mod rules;
pub mod writer;

pub use config::{ConfigError, PactConfig, WriteMode, resolve_provider_name, resolve_provider_name_from};
pub use contract::{Contract, ContractInteraction, ContractMetadata, MatchingRules, Participant};
pub use error::PactError;
pub use interaction::{ActualRequest, HttpMethod, Interaction, RequestSpec, ResponseSpec};
pub use matchers::{MatchExpr, Pattern, array, each_like, like, literal, min_array, min_type, object, term};
pub use matching::{MatchResult, Mismatch, match_value};
pub use mock_server::{MockServer, MockServerConfig, MockServerContext, NoMatchingInteraction, ServerState};
pub use pact::Pact;
pub use registry::{Expectations, InteractionRegistry};
pub use writer::ContractWriter;
