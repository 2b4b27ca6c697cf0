//! Error types for the statistics API client.
//!
//! # Design
//! Pre-flight failures (`MissingCredentials`, `InvalidFormat`) are raised
//! before any request leaves the process. `Api` carries whatever message the
//! service reported, or a canned message for the 400/401/404 statuses. Transport
//! failures keep the underlying error as their source.

use thiserror::Error;

/// Errors returned by `DolClient`.
#[derive(Debug, Error)]
pub enum DolError {
    /// A signed request was requested but the API key or shared secret is absent.
    #[error("API credentials are required")]
    MissingCredentials,

    /// The requested response format is neither `json` nor `xml`.
    #[error("acceptable formats are 'json' or 'xml', got '{0}'")]
    InvalidFormat(String),

    /// The service reported an error, either in the body or via status code.
    #[error("{0}")]
    Api(String),

    /// A successful response declared a content type the client cannot parse.
    #[error("unexpected content type: {0:?}")]
    UnexpectedContentType(String),

    /// The shared secret could not key the request MAC.
    #[error("failed to sign request: {0}")]
    Signing(String),

    /// A table response decoded cleanly but `d` held a scalar instead of rows.
    #[error("expected table rows, got {0}")]
    UnexpectedPayload(String),

    /// The body claimed to be JSON but did not decode into the expected shape.
    #[error("failed to decode JSON response: {0}")]
    Json(#[from] serde_json::Error),

    /// The body claimed to be XML but was not a well-formed document.
    #[error("failed to decode XML response: {0}")]
    Xml(#[from] crate::xml::XmlError),

    /// The HTTP round-trip itself failed (DNS, connect, read).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, DolError>;

impl DolError {
    /// Canned error for the HTTP statuses the service documents, if any.
    pub fn from_status(status: u16) -> Option<Self> {
        let message = match status {
            400 => "400 - The query contains an error",
            401 => "401 - Credentials are missing or invalid",
            404 => "404 - Dataset name or table name invalid",
            _ => return None,
        };
        Some(DolError::Api(message.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_statuses_map_to_api_errors() {
        let err = DolError::from_status(401).unwrap();
        assert_eq!(err.to_string(), "401 - Credentials are missing or invalid");
        assert!(matches!(DolError::from_status(400), Some(DolError::Api(_))));
        assert!(matches!(DolError::from_status(404), Some(DolError::Api(_))));
    }

    #[test]
    fn other_statuses_are_not_mapped() {
        assert!(DolError::from_status(200).is_none());
        assert!(DolError::from_status(500).is_none());
    }
}
