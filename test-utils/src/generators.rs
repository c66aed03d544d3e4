//! Shared proptest generators.
//!
//! Numbers are kept integral so that examples compare exactly after a trip
//! through JSON text.

use consumer_pact::{HttpMethod, MatchExpr, array, like, literal, min_array, object, term};
use proptest::prelude::*;
use serde_json::Value;

/// Generate scalar JSON values.
pub fn json_leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i32>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
    ]
}

/// Generate object keys, including ones that need bracket notation.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z][a-zA-Z0-9_]{0,8}",
        1 => Just("odd key".to_string()),
        1 => Just("type".to_string()),
    ]
}

/// Generate leaf matcher expressions.
pub fn match_leaf_strategy() -> impl Strategy<Value = MatchExpr> {
    prop_oneof![
        json_leaf_strategy().prop_map(literal),
        json_leaf_strategy().prop_map(like),
        "[a-z]{1,8}".prop_filter_map("example must match", |example| term("[a-z]+", example).ok()),
        "[0-9]{4}-[0-9]{2}-[0-9]{2}"
            .prop_filter_map("example must match", |example| term(r"\d{4}-\d{2}-\d{2}", example).ok()),
    ]
}

/// Generate nested matcher trees.
pub fn match_expr_strategy() -> impl Strategy<Value = MatchExpr> {
    match_leaf_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::btree_map(field_name_strategy(), inner.clone(), 0..4).prop_map(object),
            prop::collection::vec(inner.clone(), 0..4).prop_map(array),
            (inner, 0usize..4).prop_map(|(element, min)| min_array(element, min)),
        ]
    })
}

/// Generate object-shaped matcher trees.
pub fn object_expr_strategy() -> impl Strategy<Value = MatchExpr> {
    prop::collection::btree_map(field_name_strategy(), match_expr_strategy(), 1..5).prop_map(object)
}

/// Generate HTTP methods.
pub fn http_method_strategy() -> impl Strategy<Value = HttpMethod> {
    prop_oneof![
        Just(HttpMethod::Get),
        Just(HttpMethod::Post),
        Just(HttpMethod::Put),
        Just(HttpMethod::Patch),
        Just(HttpMethod::Delete),
    ]
}

/// Generate absolute request paths.
pub fn path_strategy() -> impl Strategy<Value = String> {
    "/[A-Za-z][A-Za-z0-9-]{0,12}(/[A-Za-z0-9-]{1,8}){0,2}"
}

/// Generate participant names.
pub fn service_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("pactflow-example-bi-directional-consumer-dotnet".to_string()),
        Just("pactflow-example-bi-directional-provider-dotnet".to_string()),
        Just("ApiClient".to_string()),
        Just("ProductService".to_string()),
        "[a-z][a-z0-9-]{2,20}",
    ]
}

/// Generate interaction descriptions.
pub fn description_strategy() -> impl Strategy<Value = String> {
    "a request to [a-z ]{3,30}"
}
