//! HTTP transport for the remote generation API.
//!
//! Provides the [`Transport`] boundary the job runner drives (submit, poll,
//! download) and [`ApiClient`], its reqwest-backed implementation.

pub mod config;
pub mod error;
pub mod http;
pub mod transport;

pub use config::ApiConfig;
pub use error::{ClientError, TransportError};
pub use http::ApiClient;
pub use transport::{FormPart, Submission, SubmissionBody, Transport};
