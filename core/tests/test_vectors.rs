//! Verify signing, request building and response parsing against the JSON
//! vectors stored in `test-vectors/`.
//!
//! Signatures in `signing.json` were produced by an independent HMAC-SHA1
//! implementation. Records are compared as parsed JSON, not raw strings, so
//! field order does not matter.

use chrono::{DateTime, Utc};
use dol_core::{DolClient, DolError, HttpMethod, HttpResponse, Signer, TableQuery, USER_AGENT};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000";

fn client() -> DolClient {
    DolClient::new(Some("blah".to_string()), Some("blahblah".to_string())).with_base_url(BASE_URL)
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        other => panic!("unknown method: {other}"),
    }
}

fn simulated_response(sim: &Value) -> HttpResponse {
    let content_type = sim["content_type"].as_str().unwrap();
    let headers = if content_type.is_empty() {
        Vec::new()
    } else {
        vec![("Content-Type".to_string(), content_type.to_string())]
    };
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers,
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

#[test]
fn signing_test_vectors() {
    let raw = include_str!("../../test-vectors/signing.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let path = case["path"].as_str().unwrap();
        let timestamp = case["timestamp"].as_str().unwrap();
        let signer = Signer::new(
            case["api_key"].as_str().unwrap(),
            case["shared_secret"].as_str().unwrap(),
        );

        assert_eq!(
            signer.signing_string(path, timestamp),
            case["expected_signing_string"].as_str().unwrap(),
            "{name}: signing string"
        );

        let now: DateTime<Utc> = timestamp.parse().unwrap();
        assert_eq!(
            signer.authorization_at(path, now).unwrap(),
            case["expected_authorization"].as_str().unwrap(),
            "{name}: authorization header"
        );
    }
}

// ---------------------------------------------------------------------------
// Table requests
// ---------------------------------------------------------------------------

#[test]
fn table_request_test_vectors() {
    let raw = include_str!("../../test-vectors/table.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let input = &case["input"];
        let query = TableQuery::default()
            .top(input["top"].as_u64().unwrap() as u32)
            .skip(input["skip"].as_u64().unwrap() as u32)
            .fields(input["fields"].as_array().unwrap().iter().map(|f| f.as_str().unwrap()))
            .order_by(input["order_by"].as_str().unwrap())
            .filters(input["filters"].as_str().unwrap());
        let expected_req = &case["expected_request"];

        let req = c
            .build_table(case["dataset"].as_str().unwrap(), case["table"].as_str().unwrap(), &query)
            .unwrap();
        assert_eq!(req.method, parse_method(expected_req["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, expected_req["path"].as_str().unwrap(), "{name}: path");
        assert_eq!(req.url, format!("{BASE_URL}{}", req.path), "{name}: url");

        for header in expected_req["headers"].as_array().unwrap() {
            let header_name = header[0].as_str().unwrap();
            let expected = header[1].as_str().unwrap_or(USER_AGENT);
            assert_eq!(req.header(header_name), Some(expected), "{name}: {header_name}");
        }
        assert_eq!(
            req.header("authorization").is_some(),
            expected_req["signed"].as_bool().unwrap(),
            "{name}: signed"
        );
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let c = client();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let response = simulated_response(&case["simulated_response"]);

        if let Some(expected_error) = case.get("expected_error") {
            match c.parse_response(response) {
                Err(DolError::Api(message)) => {
                    assert_eq!(message, expected_error.as_str().unwrap(), "{name}: message")
                }
                other => panic!("{name}: expected Api error, got {other:?}"),
            }
        } else {
            let records = c.parse_table(response).unwrap();
            let fields: Vec<Value> = records
                .into_iter()
                .map(|r| Value::Object(r.fields))
                .collect();
            assert_eq!(
                Value::Array(fields),
                case["expected_records"],
                "{name}: parsed records"
            );
        }
    }
}
