//! Request and response types for the statistics API.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DolError;

/// Response format requested through the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Xml,
}

impl FromStr for Format {
    type Err = DolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Format::Json),
            "xml" => Ok(Format::Xml),
            other => Err(DolError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("json"),
            Format::Xml => f.write_str("xml"),
        }
    }
}

/// One API call before it is turned into an `HttpRequest`.
///
/// `path` is relative to the versioned root (`/V1/`); a leading `/` is ignored.
/// `query` keeps insertion order, which is also the order of the signed
/// query string.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub requires_auth: bool,
    pub format: Format,
}

/// OData query options for a table fetch.
///
/// The service returns at most 100 rows per call whatever `top` says.
/// `order_by` takes `"field"` or `"field desc"`; `filters` is a boolean
/// expression such as `(type eq 'F') and (year eq 2013)`. Both are passed
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub top: u32,
    pub skip: u32,
    pub fields: Vec<String>,
    pub order_by: String,
    pub filters: String,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            top: 100,
            skip: 0,
            fields: Vec::new(),
            order_by: String::new(),
            filters: String::new(),
        }
    }
}

impl TableQuery {
    pub fn top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Restrict the returned columns. An empty list returns every column.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = order_by.into();
        self
    }

    pub fn filters(mut self, filters: impl Into<String>) -> Self {
        self.filters = filters.into();
        self
    }

    /// Query parameters in the order they are sent and signed.
    pub fn to_params(&self) -> Vec<(String, String)> {
        vec![
            ("$top".to_string(), self.top.to_string()),
            ("$skip".to_string(), self.skip.to_string()),
            ("$select".to_string(), self.fields.join(",")),
            ("$orderby".to_string(), self.order_by.clone()),
            ("$filter".to_string(), self.filters.clone()),
        ]
    }
}

/// One table row.
///
/// The service attaches an OData `__metadata` object to each row; it is kept
/// apart so `fields` holds only the table's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "__metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}
