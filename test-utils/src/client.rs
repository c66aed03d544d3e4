//! Product catalogue consumer.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A product as the consumer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Category
    #[serde(rename = "type")]
    pub kind: String,
}

/// Product client errors.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure or non-success status
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Base URI could not be extended with the resource path
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    /// Status code of a non-success response, if that is what failed.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Url(_) => None,
        }
    }
}

/// Settings shared by both product clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Whole-request timeout (default: 10s)
    pub timeout: Duration,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            user_agent: "product-consumer/0.1".to_string(),
        }
    }
}

impl ClientConfig {
    /// Replace the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client for the product provider.
#[derive(Debug, Clone)]
pub struct ProductClient {
    http: reqwest::Client,
    base: Url,
}

impl ProductClient {
    /// Create a client rooted at `base` with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url) -> Result<Self, ClientError> {
        Self::with_config(base, &ClientConfig::default())
    }

    /// Create a client rooted at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_config(base: Url, config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .build()?;
        Ok(Self { http, base })
    }

    /// `GET /Products`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unexpected body.
    pub async fn get_products(&self, authorization: Option<&str>) -> Result<Vec<Product>, ClientError> {
        let url = self.base.join("Products")?;
        let response = with_auth(self.http.get(url), authorization).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }

    /// `GET /Products/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unexpected body.
    pub async fn get_product(&self, id: i64, authorization: Option<&str>) -> Result<Product, ClientError> {
        let url = self.base.join(&format!("Products/{id}"))?;
        let response = with_auth(self.http.get(url), authorization).send().await?;
        Ok(response.error_for_status()?.json().await?)
    }
}

fn with_auth(request: reqwest::RequestBuilder, authorization: Option<&str>) -> reqwest::RequestBuilder {
    match authorization {
        Some(value) => request.header(AUTHORIZATION, value),
        None => request,
    }
}

/// Blocking variant for synchronous tests.
#[derive(Debug, Clone)]
pub struct BlockingProductClient {
    http: reqwest::blocking::Client,
    base: Url,
}

impl BlockingProductClient {
    /// Create a client rooted at `base`. Must not be called from inside an
    /// async runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, config: &ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .use_rustls_tls()
            .build()?;
        Ok(Self { http, base })
    }

    /// `GET /Products/{id}`.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status or an
    /// unexpected body.
    pub fn get_product(&self, id: i64) -> Result<Product, ClientError> {
        let url = self.base.join(&format!("Products/{id}"))?;
        Ok(self.http.get(url).send()?.error_for_status()?.json()?)
    }
}
