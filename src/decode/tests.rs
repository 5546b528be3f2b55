//! Tests for the decode module

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// Path Tests
// ============================================================================

#[test]
fn test_extract_path_nested() {
    let body = json!({"content": {"survey": [{"name": "q1"}]}});
    assert_eq!(
        extract_path(&body, "content.survey[0].name"),
        Some(&json!("q1"))
    );
    assert_eq!(
        extract_path(&body, "$.content.survey[-1].name"),
        Some(&json!("q1"))
    );
    assert_eq!(extract_path(&body, "content.missing"), None);
    assert_eq!(extract_path(&body, "content.survey[5]"), None);
    assert_eq!(extract_path(&body, "content.survey[-5]"), None);
}

#[test]
fn test_extract_path_root() {
    let body = json!([1, 2]);
    assert_eq!(extract_path(&body, "$"), Some(&body));
}

#[test]
fn test_extract_path_string_scalars() {
    let body = json!({"token": "abc", "expires_in": 60, "active": true, "obj": {}});
    assert_eq!(extract_path_string(&body, "token"), Some("abc".to_string()));
    assert_eq!(extract_path_string(&body, "expires_in"), Some("60".to_string()));
    assert_eq!(extract_path_string(&body, "active"), Some("true".to_string()));
    assert_eq!(extract_path_string(&body, "obj"), None);
}

#[test]
fn test_extract_path_u64_accepts_numeric_strings() {
    let body = json!({"totalCount": "120", "count": 20, "bad": "x"});
    assert_eq!(extract_path_u64(&body, "totalCount"), Some(120));
    assert_eq!(extract_path_u64(&body, "count"), Some(20));
    assert_eq!(extract_path_u64(&body, "bad"), None);
}

// ============================================================================
// RecordExtractor Tests
// ============================================================================

#[test]
fn test_extract_records_at_path() {
    let body = json!({
        "count": 2,
        "next": null,
        "results": [{"_id": 1}, {"_id": 2}]
    });
    let records = RecordExtractor::with_path("results").extract(&body).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["_id"], json!(1));
    assert_eq!(records[1]["_id"], json!(2));
}

#[test]
fn test_extract_records_missing_path_is_empty() {
    let body = json!({"other": []});
    let records = RecordExtractor::with_path("data").extract(&body).unwrap();
    assert!(records.is_empty());

    let body = json!({"data": null});
    let records = RecordExtractor::with_path("data").extract(&body).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_extract_records_whole_body() {
    let body = json!([{"id": "a"}, {"id": "b"}]);
    let records = RecordExtractor::new().extract(&body).unwrap();
    assert_eq!(records.len(), 2);

    let body = json!({"id": "single"});
    let records = RecordExtractor::new().extract(&body).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!("single"));

    // No content
    let records = RecordExtractor::new().extract(&json!({})).unwrap();
    assert!(records.is_empty());
}

#[test]
fn test_empty_path_means_whole_body() {
    let extractor = RecordExtractor::with_path("");
    assert!(extractor.path().is_none());
}

#[test]
fn test_scalar_records_are_wrapped() {
    let body = json!({"codes": ["AFG", "SDN"]});
    let records = RecordExtractor::with_path("codes").extract(&body).unwrap();
    assert_eq!(records[0][SCALAR_RECORD_FIELD], json!("AFG"));
    assert_eq!(records[1][SCALAR_RECORD_FIELD], json!("SDN"));
}

#[test]
fn test_extract_records_wildcard() {
    let body = json!({
        "groups": [
            {"items": [{"id": 1}]},
            {"items": [{"id": 2}]}
        ]
    });
    let records = RecordExtractor::with_path("$.groups[*].items[*]")
        .extract(&body)
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], json!(1));
    assert_eq!(records[1]["id"], json!(2));
}
