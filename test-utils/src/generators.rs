//! Shared proptest generators for contract testing types.

use pact_engine::matchers::{each_like, integer, like, regex};
use pact_engine::{ContractDocument, Interaction, InteractionBuilder, MatcherNode, Method, ObjectMatcher};
use proptest::collection::{btree_map, btree_set, vec};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Generate participant names.
pub fn participant_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("todo-web".to_string()),
        Just("todo-mobile".to_string()),
        Just("todo-api".to_string()),
        Just("billing-api".to_string()),
        "[a-z][a-z0-9-]{2,20}",
    ]
}

/// Generate HTTP methods.
pub fn method_strategy() -> impl Strategy<Value = Method> {
    prop_oneof![
        Just(Method::Get),
        Just(Method::Post),
        Just(Method::Put),
        Just(Method::Patch),
        Just(Method::Delete),
    ]
}

/// Generate JSON scalars. Floats are left out so values survive a text round trip.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 _-]{0,12}".prop_map(Value::String),
    ]
}

/// Generate nested JSON values.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Array),
            btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Generate regex matchers paired with a matching example.
pub fn regex_matcher_strategy() -> impl Strategy<Value = MatcherNode> {
    prop_oneof![
        Just(regex(r"\d+", "42")),
        Just(regex(r"[a-z]+-\d{2}", "proj-01")),
        Just(regex(r"\d{4}-\d{2}-\d{2}", "2025-01-31")),
        Just(regex("true|false", "true")),
    ]
}

/// Generate matcher trees whose examples satisfy them.
pub fn matcher_strategy() -> impl Strategy<Value = MatcherNode> {
    let leaf = prop_oneof![
        scalar_value_strategy().prop_map(MatcherNode::ExactValue),
        json_value_strategy().prop_map(like),
        any::<i64>().prop_map(integer),
        regex_matcher_strategy(),
    ];
    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            (inner.clone(), 0usize..3).prop_map(|(element, min)| each_like(element, min)),
            btree_map("[a-z]{1,6}", (inner, any::<bool>()), 0..4).prop_map(|fields| {
                MatcherNode::from(fields.into_iter().fold(
                    ObjectMatcher::new(),
                    |acc, (name, (node, optional))| {
                        if optional {
                            acc.optional_field(name, node)
                        } else {
                            acc.field(name, node)
                        }
                    },
                ))
            }),
        ]
    })
}

/// Generate a valid interaction on `path`.
pub fn interaction_on_path_strategy(path: String) -> impl Strategy<Value = Interaction> {
    (
        method_strategy(),
        proptest::option::of("[a-z ]{5,30}"),
        proptest::option::of(matcher_strategy()),
        prop_oneof![Just(200u16), Just(201), Just(204), Just(400), Just(404), Just(500)],
        proptest::option::of(matcher_strategy()),
    )
        .prop_map(move |(method, state, request_body, status, response_body)| {
            let mut builder = InteractionBuilder::new(format!("{method} {path}"))
                .with_request(method, path.as_str())
                .will_respond_with(status);
            if let Some(state) = state {
                builder = builder.given(state);
            }
            if let Some(body) = request_body {
                builder = builder.request_body(body);
            }
            if let Some(body) = response_body {
                builder = builder.response_body(body);
            }
            builder
                .build()
                .unwrap_or_else(|e| panic!("generated interaction is invalid: {e}"))
        })
}

/// Generate contract documents whose interactions use distinct paths.
pub fn document_strategy() -> impl Strategy<Value = ContractDocument> {
    (
        participant_name_strategy(),
        participant_name_strategy(),
        btree_set("[a-z]{1,8}", 0..5),
    )
        .prop_flat_map(|(consumer, provider, segments)| {
            let interactions: Vec<_> = segments
                .into_iter()
                .map(|segment| interaction_on_path_strategy(format!("/{segment}")))
                .collect();
            (Just(consumer), Just(provider), interactions)
        })
        .prop_map(|(consumer, provider, interactions)| {
            ContractDocument::new(consumer, provider, interactions)
        })
}
