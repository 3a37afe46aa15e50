//! Retry and backoff policy.
//!
//! One policy object and one retry driver shared by metadata fetches and
//! asset transfers. Errors are mapped to an [`ErrorKind`] through the
//! [`Classify`] trait; the policy decides whether and how long to wait.

mod classify;
mod policy;
mod run;

pub use classify::{classify_curl_error, classify_http_status, Classify};
pub use policy::{Backoff, ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
