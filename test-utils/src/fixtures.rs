//! Product service interactions.
//!
//! The consumer is a small product catalogue client; these are the
//! interactions it documents against the product provider.

use consumer_pact::{Interaction, RequestSpec, ResponseSpec, like, min_type, object};
use serde_json::json;

/// Consumer participant name.
pub const CONSUMER: &str = "pactflow-example-bi-directional-consumer-dotnet";

/// Provider name used when `PACT_PROVIDER` is unset.
pub const DEFAULT_PROVIDER: &str = "pactflow-example-bi-directional-provider-dotnet";

/// Content type the provider declares on every response.
pub const JSON_UTF8: &str = "application/json; charset=utf-8";

/// Sample product served by the provider.
#[must_use]
pub fn sample_product() -> serde_json::Value {
    json!({"id": 27, "name": "burger", "type": "food"})
}

/// `GET /Products` returning at least one product.
#[must_use]
pub fn all_products() -> Interaction {
    Interaction::new(
        "a request to retrieve all products",
        RequestSpec::get("/Products"),
        ResponseSpec::new(200)
            .with_header("Content-Type", JSON_UTF8)
            .with_json_body(min_type(sample_product(), 1)),
    )
}

/// `GET /Products/27` returning a product of the right shape.
#[must_use]
pub fn existing_product() -> Interaction {
    Interaction::new(
        "a request to retrieve a product with existing id",
        RequestSpec::get("/Products/27"),
        ResponseSpec::new(200)
            .with_header("Content-Type", JSON_UTF8)
            .with_json_body(object([
                ("id", like(27)),
                ("name", like("burger")),
                ("type", like("food")),
            ])),
    )
}

/// `GET /Products/{id}` answered with `404`.
#[must_use]
pub fn missing_product(description: &str, id: i64) -> Interaction {
    Interaction::new(
        description,
        RequestSpec::get(format!("/Products/{id}")),
        ResponseSpec::new(404).with_header("Content-Type", JSON_UTF8),
    )
}

/// `GET /Products/10` answered with `404`.
#[must_use]
pub fn unknown_product() -> Interaction {
    missing_product("a request to retrieve a product id that does not exist", 10)
}

/// `GET /Products/-10` answered with `404`.
#[must_use]
pub fn negative_product() -> Interaction {
    missing_product(
        "a request to retrieve a negative product id that does not exist",
        -10,
    )
}
