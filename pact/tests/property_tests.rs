//! Property-based tests for the matching engine and contract documents.
//!
//! Tests validate:
//! - Property 1: Examples satisfy their own expressions
//! - Property 2: Minimum-length arrays
//! - Property 3: Extra object keys are tolerated
//! - Property 4: Matching rules reproduce the expression
//! - Property 5: Contract documents survive a JSON round-trip
//! - Property 6: Registration order is preserved

use consumer_pact::rules::{ROOT, body_rules, rebuild};
use consumer_pact::{
    Contract, Interaction, InteractionRegistry, MatchExpr, RequestSpec, ResponseSpec, match_value, min_array,
};
use proptest::prelude::*;
use serde_json::Value;
use test_utils::{
    description_strategy, http_method_strategy, match_expr_strategy, match_leaf_strategy, object_expr_strategy,
    path_strategy, service_name_strategy,
};

// Strategy for generating whole interactions
fn interaction_strategy() -> impl Strategy<Value = Interaction> {
    (
        description_strategy(),
        http_method_strategy(),
        path_strategy(),
        prop::option::of(match_expr_strategy()),
        prop::sample::select(vec![200u16, 201, 204, 400, 404, 500]),
    )
        .prop_map(|(description, method, path, body, status)| {
            let response = ResponseSpec::new(status);
            let response = match body {
                Some(body) => response.with_json_body(body),
                None => response,
            };
            Interaction::new(description, RequestSpec::new(method, path), response)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Examples satisfy their own expressions**
    /// *For any* matcher tree, its example value SHALL match it.
    #[test]
    fn prop_example_matches_expression(expr in match_expr_strategy()) {
        let result = match_value(&expr, &expr.example(), "body");
        prop_assert!(result.matched(), "mismatches: {:?}", result.mismatches());
    }

    /// **Property 2: Minimum-length arrays**
    /// *For any* element and minimum, the example has `max(min, 1)` elements,
    /// and dropping below the minimum is reported.
    #[test]
    fn prop_min_array_length(element in match_leaf_strategy(), min in 0usize..6) {
        let expr = min_array(element, min);
        let example = expr.example();
        let items = example.as_array().cloned().unwrap_or_default();
        prop_assert_eq!(items.len(), min.max(1));

        let mut longer = items.clone();
        longer.push(items[0].clone());
        prop_assert!(match_value(&expr, &Value::Array(longer), "body").matched());

        if min > 0 {
            let short = Value::Array(items[..min - 1].to_vec());
            let result = match_value(&expr, &short, "body");
            prop_assert!(!result.matched(), "array of {} accepted with min {}", min - 1, min);
        }
    }

    /// **Property 3: Extra object keys are tolerated**
    /// *For any* object expression, adding an undeclared key to its example
    /// SHALL still match.
    #[test]
    fn prop_extra_keys_tolerated(expr in object_expr_strategy(), extra in any::<i32>()) {
        let mut example = expr.example();
        if let Some(members) = example.as_object_mut() {
            members.insert("__undeclared__".to_string(), Value::from(extra));
        }
        prop_assert!(match_value(&expr, &example, "body").matched());
    }

    /// **Property 4: Matching rules reproduce the expression**
    /// *For any* matcher tree, rebuilding from its example and collected
    /// rules SHALL yield its canonical form.
    #[test]
    fn prop_rules_rebuild_expression(expr in match_expr_strategy()) {
        let rules = body_rules(&expr);
        let rebuilt = rebuild(&expr.example(), ROOT, &rules);
        prop_assert!(rebuilt.is_ok());
        prop_assert_eq!(rebuilt.ok(), Some(expr.normalized()));
    }

    /// **Property 5: Contract documents survive a JSON round-trip**
    /// *For any* generated interactions, the written document parses back
    /// to an identical document and to interactions with the same shape.
    #[test]
    fn prop_contract_roundtrip(
        consumer in service_name_strategy(),
        provider in service_name_strategy(),
        interactions in prop::collection::vec(interaction_strategy(), 0..4),
    ) {
        let contract = Contract::from_interactions(&consumer, &provider, &interactions);
        let json = contract.to_json_pretty().unwrap();
        let parsed = Contract::from_json(&json).unwrap();
        prop_assert_eq!(&parsed, &contract);

        let restored = parsed.to_interactions().unwrap();
        prop_assert_eq!(restored.len(), interactions.len());
        for (restored, original) in restored.iter().zip(&interactions) {
            prop_assert_eq!(&restored.description, &original.description);
            prop_assert_eq!(restored.request.method, original.request.method);
            prop_assert_eq!(restored.response.status, original.response.status);
            prop_assert_eq!(
                restored.response.body.as_ref().map(MatchExpr::normalized),
                original.response.body.as_ref().map(MatchExpr::normalized)
            );
        }
    }

    /// **Property 6: Registration order is preserved**
    /// *For any* set of distinct descriptions, the registry and the contract
    /// list interactions in the order they were registered.
    #[test]
    fn prop_registration_order(
        descriptions in prop::collection::btree_set(description_strategy(), 1..6),
        shuffle in any::<prop::sample::Index>(),
    ) {
        let mut descriptions: Vec<String> = descriptions.into_iter().collect();
        let pivot = shuffle.index(descriptions.len());
        descriptions.rotate_left(pivot);

        let mut registry = InteractionRegistry::new();
        for description in &descriptions {
            registry
                .register(Interaction::new(description.clone(), RequestSpec::get("/Products"), ResponseSpec::new(200)))
                .unwrap();
        }

        let contract = Contract::from_interactions("c", "p", registry.interactions());
        let written: Vec<_> = contract.interactions.iter().map(|i| i.description.clone()).collect();
        prop_assert_eq!(written, descriptions);
    }
}

#[test]
fn test_duplicate_registration_rejected_regardless_of_request() {
    let mut registry = InteractionRegistry::new();
    registry
        .register(Interaction::new("same", RequestSpec::get("/a"), ResponseSpec::new(200)))
        .unwrap();
    assert!(registry
        .register(Interaction::new("same", RequestSpec::post("/b"), ResponseSpec::new(201)))
        .is_err());
}
