//! Request builder, signer and response normalizer for the statistics API.
//!
//! # Design
//! `DolClient` holds immutable configuration only: base URL, optional
//! credentials and a transport. Each operation is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`; `metadata` and `table` run both halves around a single
//! `Transport::execute` call. Pre-flight validation happens in `build_*`, so a
//! request that cannot be signed never reaches the transport.

use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::auth::Signer;
use crate::error::{DolError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{Format, Record, RequestDescriptor, TableQuery};
use crate::xml;

pub const DEFAULT_BASE_URL: &str = "http://api.dol.gov";
pub const API_VERSION: &str = "1";
pub const USER_AGENT: &str = concat!("dol-core/", env!("CARGO_PKG_VERSION"));

/// Environment variable read by `DolClient::from_env` for the API key.
pub const API_KEY_ENV: &str = "DOL_KEY";
/// Environment variable read by `DolClient::from_env` for the shared secret.
pub const SHARED_SECRET_ENV: &str = "DOL_SECRET";

/// Blocking client for the statistics API.
///
/// Credentials are optional: `metadata` works without them, `table` fails
/// with `DolError::MissingCredentials` before any I/O when either is absent.
/// The client is never mutated after construction, so a shared reference can
/// be used from several threads when the transport allows it.
#[derive(Clone)]
pub struct DolClient<T = UreqTransport> {
    base_url: String,
    api_key: Option<String>,
    shared_secret: Option<String>,
    transport: T,
}

impl DolClient<UreqTransport> {
    pub fn new(api_key: Option<String>, shared_secret: Option<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            shared_secret,
            transport: UreqTransport::new(),
        }
    }

    /// Read credentials from `DOL_KEY` and `DOL_SECRET`. Unset variables leave
    /// the client unauthenticated.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var(API_KEY_ENV).ok(),
            std::env::var(SHARED_SECRET_ENV).ok(),
        )
    }
}

impl<T> DolClient<T> {
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_transport<U: Transport>(self, transport: U) -> DolClient<U> {
        DolClient {
            base_url: self.base_url,
            api_key: self.api_key,
            shared_secret: self.shared_secret,
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Turn a descriptor into a ready-to-send request, signing it if needed.
    ///
    /// The signed string and the request line share one `path` value, so they
    /// cannot drift apart.
    pub fn build_request(&self, descriptor: &RequestDescriptor) -> Result<HttpRequest> {
        let mut path = format!("/V{API_VERSION}/{}", descriptor.path.trim_start_matches('/'));
        if !descriptor.query.is_empty() {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&descriptor.query)
                .finish();
            path.push('?');
            path.push_str(&query);
        }

        let mut headers = vec![("User-Agent".to_string(), USER_AGENT.to_string())];

        if descriptor.requires_auth {
            let (Some(api_key), Some(shared_secret)) = (&self.api_key, &self.shared_secret) else {
                return Err(DolError::MissingCredentials);
            };
            let authorization = Signer::new(api_key, shared_secret).authorization(&path)?;
            headers.push(("Authorization".to_string(), authorization));
        }

        if descriptor.format == Format::Json {
            headers.push(("Accept".to_string(), "application/json".to_string()));
        }

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}{path}", self.base_url),
            path,
            headers,
        })
    }

    pub fn build_metadata(&self, dataset: &str) -> Result<HttpRequest> {
        self.build_request(&RequestDescriptor {
            path: format!("{}/$metadata", dataset.trim_matches('/')),
            query: Vec::new(),
            requires_auth: false,
            format: Format::Xml,
        })
    }

    pub fn build_table(&self, dataset: &str, table: &str, query: &TableQuery) -> Result<HttpRequest> {
        self.build_request(&RequestDescriptor {
            path: format!("{}/{table}", dataset.trim_matches('/')),
            query: query.to_params(),
            requires_auth: true,
            format: Format::Json,
        })
    }

    /// Normalize any response: JSON envelopes are unwrapped, XML becomes a
    /// nested value, and reported errors become `DolError::Api`.
    pub fn parse_response(&self, response: HttpResponse) -> Result<Value> {
        normalize(response)
    }

    pub fn parse_metadata(&self, response: HttpResponse) -> Result<Value> {
        normalize(response)
    }

    pub fn parse_table(&self, response: HttpResponse) -> Result<Vec<Record>> {
        into_records(normalize(response)?)
    }
}

impl<T: Transport> DolClient<T> {
    /// Fetch the dataset's `$metadata` document as a nested value.
    pub fn metadata(&self, dataset: &str) -> Result<Value> {
        let request = self.build_metadata(dataset)?;
        self.parse_metadata(self.dispatch(&request)?)
    }

    /// Fetch rows from `dataset/table`. Multipart dataset names are separated
    /// by `/`, e.g. `statistics/BLS_Numbers`.
    pub fn table(&self, dataset: &str, table: &str, query: &TableQuery) -> Result<Vec<Record>> {
        let request = self.build_table(dataset, table, query)?;
        self.parse_table(self.dispatch(&request)?)
    }

    /// Send an arbitrary descriptor and return the normalized body.
    pub fn request(&self, descriptor: &RequestDescriptor) -> Result<Value> {
        let request = self.build_request(descriptor)?;
        self.parse_response(self.dispatch(&request)?)
    }

    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!(
            url = %request.url,
            signed = request.header("authorization").is_some(),
            "dispatching request"
        );
        let response = self.transport.execute(request)?;
        debug!(
            status = response.status,
            content_type = response.content_type().unwrap_or(""),
            "received response"
        );
        Ok(response)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DolClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DolClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("shared_secret", &self.shared_secret.as_ref().map(|_| "<redacted>"))
            .field("transport", &self.transport)
            .finish()
    }
}

/// Parse the body by declared content type, then apply the status-code check.
///
/// The status check runs even when the body parsed cleanly, which is what
/// turns plain-text 400/401/404 bodies into `DolError::Api`.
fn normalize(response: HttpResponse) -> Result<Value> {
    let content_type = response.content_type().unwrap_or("").to_ascii_lowercase();

    let data = if content_type.starts_with("application/json") {
        let data: Value = serde_json::from_str(&response.body)?;
        if let Some(error) = data.get("error") {
            return Err(reported(response.status, json_error_message(error)));
        }
        Some(unwrap_envelope(data))
    } else if content_type.starts_with("application/xml") {
        let data = xml::to_value(&response.body)?;
        if let Some(error) = data.get("error") {
            return Err(reported(response.status, xml_error_message(error)));
        }
        Some(data)
    } else {
        None
    };

    if let Some(err) = DolError::from_status(response.status) {
        warn!(status = response.status, "service returned an error status");
        return Err(err);
    }

    match data {
        Some(data) => Ok(data),
        None if response.status >= 400 => Err(DolError::Api(format!(
            "{} - Unexpected response from the service",
            response.status
        ))),
        None => Err(DolError::UnexpectedContentType(content_type)),
    }
}

fn reported(status: u16, message: String) -> DolError {
    warn!(status, message = %message, "service reported an error");
    DolError::Api(message)
}

fn unwrap_envelope(data: Value) -> Value {
    match data {
        Value::Object(mut map) if map.contains_key("d") => map.remove("d").unwrap_or(Value::Null),
        other => other,
    }
}

fn json_error_message(error: &Value) -> String {
    error
        .pointer("/message/value")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn xml_error_message(error: &Value) -> String {
    let message = &error["message"];
    message
        .get(xml::TEXT_KEY)
        .and_then(Value::as_str)
        .or_else(|| message.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// Accept `d` as an array, as `{ "results": [...] }`, or as a single row.
/// A null `d` is an empty table.
fn into_records(data: Value) -> Result<Vec<Record>> {
    let rows = match data {
        Value::Null => Vec::new(),
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(rows)) => rows,
            Some(other) => {
                map.insert("results".to_string(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => return Err(DolError::UnexpectedPayload(other.to_string())),
    };
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DolError::from))
        .collect()
}
