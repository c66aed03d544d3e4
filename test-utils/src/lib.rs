//! Shared test utilities for the consumer-pact workspace.
//!
//! This crate provides:
//! - Proptest generators for matcher trees and request shapes
//! - Product service interactions used across the test suites
//! - `ProductClient`, a small HTTP consumer exercised against the mock provider

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod fixtures;
pub mod generators;

pub use client::{BlockingProductClient, ClientConfig, ClientError, Product, ProductClient};
pub use generators::*;
