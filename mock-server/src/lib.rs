//! In-process stand-in for the statistics API.
//!
//! Serves `GET /V1/<dataset>/$metadata` as EDMX XML without authentication and
//! `GET /V1/<dataset>/<table>` as a `{"d": [...]}` JSON envelope behind
//! HMAC-SHA1 request signing. Errors use the service's envelopes: JSON
//! `{"error":{"message":{"value":…}}}` for table queries, XML
//! `<error><message>…</message></error>` for metadata, and a bare plain-text
//! 401 for authentication failures.

pub mod catalog;
pub mod query;

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha1::Sha1;
use tokio::net::TcpListener;
use tracing::{debug, info};

use catalog::Catalog;

pub const DEMO_API_KEY: &str = "demo-key";
pub const DEMO_SHARED_SECRET: &str = "demo-secret";

const JSON: &str = "application/json;charset=utf-8";
const XML: &str = "application/xml;charset=utf-8";

#[derive(Clone)]
pub struct AppState {
    catalog: Arc<Catalog>,
    keys: Arc<HashMap<String, String>>,
}

/// Router over the sample catalog, accepting the demo key pair.
pub fn app() -> Router {
    app_with_keys([(DEMO_API_KEY.to_string(), DEMO_SHARED_SECRET.to_string())])
}

/// Router over the sample catalog, accepting the given `(api_key, shared_secret)` pairs.
pub fn app_with_keys(keys: impl IntoIterator<Item = (String, String)>) -> Router {
    let state = AppState {
        catalog: Arc::new(Catalog::sample()),
        keys: Arc::new(keys.into_iter().collect()),
    };
    Router::new().route("/V1/{*path}", get(handle)).with_state(state)
}

pub async fn run(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock statistics API listening");
    }
    axum::serve(listener, router).await
}

type HmacSha1 = Hmac<Sha1>;

/// HMAC-SHA1 of `message` keyed by `shared_secret`, ready to finalize or verify.
fn keyed_mac(shared_secret: &str, message: &str) -> Option<HmacSha1> {
    let mut mac = HmacSha1::new_from_slice(shared_secret.as_bytes()).ok()?;
    mac.update(message.as_bytes());
    Some(mac)
}

/// Lowercase hex HMAC-SHA1, as the client computes it.
pub fn sign(shared_secret: &str, message: &str) -> Option<String> {
    keyed_mac(shared_secret, message).map(|mac| hex::encode(mac.finalize().into_bytes()))
}

async fn handle(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let path = path.trim_matches('/');

    if let Some(dataset) = path.strip_suffix("/$metadata") {
        return metadata(&state, dataset);
    }

    let Some((dataset, table)) = path.rsplit_once('/') else {
        return json_error(StatusCode::NOT_FOUND, &format!("Resource not found for the segment '{path}'."));
    };

    let signed_path = uri.path_and_query().map_or(uri.path(), |pq| pq.as_str());
    if !authorized(&state.keys, signed_path, &headers) {
        debug!(path = signed_path, "rejecting unsigned or mis-signed request");
        return (
            StatusCode::UNAUTHORIZED,
            [(header::CONTENT_TYPE, "text/plain")],
            "Unauthorized",
        )
            .into_response();
    }

    let Some(found) = state.catalog.dataset(dataset) else {
        return json_error(StatusCode::NOT_FOUND, &format!("Resource not found for the segment '{dataset}'."));
    };
    let Some(rows) = found.table(table) else {
        return json_error(StatusCode::NOT_FOUND, &format!("Resource not found for the segment '{table}'."));
    };

    match query::apply(rows, &params) {
        Ok(rows) => {
            let projected = params.get("$select").is_some_and(|s| !s.trim().is_empty());
            let rows: Vec<Value> = rows
                .into_iter()
                .enumerate()
                .map(|(i, mut row)| {
                    if !projected {
                        row.insert(
                            "__metadata".to_string(),
                            json!({
                                "uri": format!("http://api.dol.gov/V1/{dataset}/{table}({i})"),
                                "type": format!("{}.{table}", dataset.replace('/', ".")),
                            }),
                        );
                    }
                    Value::Object(row)
                })
                .collect();
            (StatusCode::OK, [(header::CONTENT_TYPE, JSON)], json!({ "d": rows }).to_string()).into_response()
        }
        Err(err) => json_error(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

fn metadata(state: &AppState, dataset: &str) -> Response {
    match state.catalog.dataset(dataset) {
        Some(found) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, XML)],
            catalog::metadata_document(dataset, found),
        )
            .into_response(),
        None => {
            let body = format!(
                r#"<?xml version="1.0" encoding="utf-8" standalone="yes"?><error xmlns="http://schemas.microsoft.com/ado/2007/08/dataservices/metadata"><code></code><message xml:lang="en-US">Resource not found for the segment '{dataset}'.</message></error>"#
            );
            (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, XML)], body).into_response()
        }
    }
}

fn json_error(status: StatusCode, message: &str) -> Response {
    let body = json!({ "error": { "code": "", "message": { "lang": "en-US", "value": message } } });
    (status, [(header::CONTENT_TYPE, JSON)], body.to_string()).into_response()
}

/// Check `Authorization: Timestamp=…&ApiKey=…&Signature=…` against the
/// HMAC of `<path>&Timestamp=…&ApiKey=…` under the key's shared secret.
fn authorized(keys: &HashMap<String, String>, path: &str, headers: &HeaderMap) -> bool {
    let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mut timestamp = None;
    let mut api_key = None;
    let mut signature = None;
    for part in value.split('&') {
        match part.split_once('=') {
            Some(("Timestamp", v)) => timestamp = Some(v),
            Some(("ApiKey", v)) => api_key = Some(v),
            Some(("Signature", v)) => signature = Some(v),
            _ => return false,
        }
    }
    let (Some(timestamp), Some(api_key), Some(signature)) = (timestamp, api_key, signature) else {
        return false;
    };
    let Some(secret) = keys.get(api_key) else {
        return false;
    };
    let Ok(signature) = hex::decode(signature) else {
        return false;
    };

    keyed_mac(secret, &format!("{path}&Timestamp={timestamp}&ApiKey={api_key}"))
        .is_some_and(|mac| mac.verify_slice(&signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> HashMap<String, String> {
        HashMap::from([(DEMO_API_KEY.to_string(), DEMO_SHARED_SECRET.to_string())])
    }

    fn signed(path: &str, api_key: &str, secret: &str) -> HeaderMap {
        let timestamp = "2016-03-01T12:30:45Z";
        let signature = sign(secret, &format!("{path}&Timestamp={timestamp}&ApiKey={api_key}")).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Timestamp={timestamp}&ApiKey={api_key}&Signature={signature}")).unwrap(),
        );
        headers
    }

    #[test]
    fn sign_matches_known_vector() {
        let path = "/V1/statistics/BLS_Numbers/averageHourlyEarnings12MonthChange\
                    ?%24top=100&%24skip=0&%24select=&%24orderby=&%24filter=";
        let message = format!("{path}&Timestamp=2016-03-01T12:30:45Z&ApiKey=demo-key");
        assert_eq!(
            sign("demo-secret", &message).as_deref(),
            Some("7306a368020db0bb4e5921e4a187d81ae2d2bc9e")
        );
    }

    #[test]
    fn sign_and_verify_share_one_mac() {
        let message = "/V1/x&Timestamp=2016-03-01T12:30:45Z&ApiKey=demo-key";
        let signature = hex::decode(sign(DEMO_SHARED_SECRET, message).unwrap()).unwrap();
        assert!(keyed_mac(DEMO_SHARED_SECRET, message).unwrap().verify_slice(&signature).is_ok());
        assert!(keyed_mac("other", message).unwrap().verify_slice(&signature).is_err());
    }

    #[test]
    fn valid_signature_is_accepted() {
        let path = "/V1/statistics/BLS_Numbers/t?%24top=1";
        assert!(authorized(&keys(), path, &signed(path, DEMO_API_KEY, DEMO_SHARED_SECRET)));
    }

    #[test]
    fn signature_over_other_path_is_rejected() {
        let headers = signed("/V1/statistics/BLS_Numbers/t?%24top=1", DEMO_API_KEY, DEMO_SHARED_SECRET);
        assert!(!authorized(&keys(), "/V1/statistics/BLS_Numbers/t?%24top=2", &headers));
    }

    #[test]
    fn wrong_secret_or_unknown_key_is_rejected() {
        let path = "/V1/statistics/BLS_Numbers/t";
        assert!(!authorized(&keys(), path, &signed(path, DEMO_API_KEY, "nope")));
        assert!(!authorized(&keys(), path, &signed(path, "blah", "blahblah")));
    }

    #[test]
    fn missing_or_garbled_header_is_rejected() {
        let path = "/V1/statistics/BLS_Numbers/t";
        assert!(!authorized(&keys(), path, &HeaderMap::new()));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert!(!authorized(&keys(), path, &headers));
    }
}
