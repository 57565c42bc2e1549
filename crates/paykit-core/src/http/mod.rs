//! HTTP transport: executor, retry policy, failure classification, and the
//! high-level API client

pub mod client;
pub mod error;
pub mod executor;
pub mod retry;


pub use client::{ApiClient, CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_JSON, REQUEST_ID_HEADER};
pub use error::FailureClass;
pub use executor::{Exchange, HttpExecutor, RequestDetails, ResponseDetails};
pub use retry::{RetryDecision, RetryPolicy};

pub use reqwest::{Method, StatusCode};
