//! End-to-end scenarios (spec.md §8), checked against the literal expected
//! JSON shapes rather than internal tree structure.

use chrono::{DateTime, Utc};
use query_compiler::{FieldMeta, FieldType};

fn meta() -> FieldMeta {
    FieldMeta::builder()
        .field("t.name", FieldType::FullText)
        .field("score", FieldType::Integer)
        .field("created_at", FieldType::Date)
        .build()
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-15T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn scenario_1_empty_input_is_match_none() {
    let compiled = query_compiler::compile_at("", "t.name", &meta(), now()).unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(json, serde_json::json!({"match_none": {}}));
}

#[test]
fn scenario_2_plain_term_routes_to_default_field() {
    let compiled = query_compiler::compile_at("twilight sparkle", "t.name", &meta(), now()).unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(json, serde_json::json!({"term": {"t.name": "twilight sparkle"}}));
}

#[test]
fn scenario_3_comma_is_and() {
    let compiled = query_compiler::compile_at(
        "twilight sparkle,starlight glimmer",
        "t.name",
        &meta(),
        now(),
    )
    .unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"bool": {"must": [
            {"term": {"t.name": "twilight sparkle"}},
            {"term": {"t.name": "starlight glimmer"}},
        ]}})
    );
}

#[test]
fn scenario_4_negated_group_and_term() {
    let compiled = query_compiler::compile_at(
        "!(pinkie pie || twilight sparkle) && rarity",
        "t.name",
        &meta(),
        now(),
    )
    .unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"bool": {"must": [
            {"bool": {"must_not": [
                {"bool": {"should": [
                    {"term": {"t.name": "pinkie pie"}},
                    {"term": {"t.name": "twilight sparkle"}},
                ]}},
            ]}},
            {"term": {"t.name": "rarity"}},
        ]}})
    );
}

#[test]
fn scenario_5_integer_range_suffix() {
    let compiled = query_compiler::compile_at("score.gt:100", "t.name", &meta(), now()).unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(json, serde_json::json!({"range": {"score": {"gt": 100}}}));
}

#[test]
fn scenario_6_date_range() {
    let compiled = query_compiler::compile_at("created_at:2015", "t.name", &meta(), now()).unwrap();
    let json = serde_json::to_value(compiled.query).unwrap();
    let start = DateTime::parse_from_rfc3339("2015-01-01T00:00:00Z")
        .unwrap()
        .timestamp_millis();
    let end = DateTime::parse_from_rfc3339("2016-01-01T00:00:00Z")
        .unwrap()
        .timestamp_millis();
    assert_eq!(
        json,
        serde_json::json!({"range": {"created_at": {"gte": start, "lt": end}}})
    );
}

#[test]
fn scenario_7_fuzzy_phrase_requires_query() {
    let compiled =
        query_compiler::compile_at("\"lyra hortstrings\"~0.9", "t.name", &meta(), now()).unwrap();
    assert!(compiled.requires_query);
    let json = serde_json::to_value(compiled.query).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"fuzzy": {"t.name": {"value": "lyra hortstrings", "fuzziness": 0.9}}})
    );
}
