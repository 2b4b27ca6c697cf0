//! Blocking client for the Department of Labor statistics API.
//!
//! # Overview
//! Builds signed `HttpRequest` values for dataset metadata and table queries,
//! executes them through a `Transport`, and normalizes the JSON or XML reply
//! into `serde_json::Value` / `Record` rows.
//!
//! ```no_run
//! use dol_core::{DolClient, TableQuery};
//!
//! # fn main() -> dol_core::Result<()> {
//! let client = DolClient::from_env();
//! let rows = client.table(
//!     "statistics/BLS_Numbers",
//!     "averageHourlyEarnings12MonthChange",
//!     &TableQuery::default().top(10).order_by("year desc"),
//! )?;
//! for row in rows {
//!     println!("{:?}", row.get("value"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - `DolClient` holds only immutable configuration; every call is one
//!   request/response round-trip with no retries.
//! - Each operation is split into `build_*` (produces request) and `parse_*`
//!   (consumes response), so the I/O boundary is explicit and testable.
//! - Signing lives in `auth`, XML tree conversion in `xml`.

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod types;
pub mod xml;

pub use auth::Signer;
pub use client::{DolClient, API_VERSION, DEFAULT_BASE_URL, USER_AGENT};
pub use error::{DolError, Result};
pub use xml::XmlError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{Format, Record, RequestDescriptor, TableQuery};
