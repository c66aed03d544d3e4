//! Shared setup for the end-to-end scenarios.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::Path;

use consumer_pact::{Pact, PactConfig, WriteMode, resolve_provider_name};
use test_utils::fixtures::{CONSUMER, DEFAULT_PROVIDER};

/// Product consumer pact writing into `pact_dir`.
#[must_use]
pub fn product_pact(pact_dir: &Path) -> Pact {
    product_pact_with(PactConfig::default().with_pact_dir(pact_dir))
}

/// Product consumer pact merging into the contract in `pact_dir`.
#[must_use]
pub fn merging_product_pact(pact_dir: &Path) -> Pact {
    product_pact_with(
        PactConfig::default()
            .with_pact_dir(pact_dir)
            .with_write_mode(WriteMode::Merge),
    )
}

fn product_pact_with(config: PactConfig) -> Pact {
    Pact::new(CONSUMER, resolve_provider_name(DEFAULT_PROVIDER), config)
}
