//! HCP API access.
//!
//! - [`config`] - provider configuration and environment fallback
//! - [`auth`] - bearer tokens from a static token or client credentials
//! - [`http`] - the [`HcpClient`] wrapper with error classification
//! - [`retry`] - bounded retry for idempotent reads

pub mod auth;
pub mod config;
pub mod http;
pub mod retry;

pub use config::ClientConfig;
pub use http::HcpClient;
pub use retry::RetryPolicy;
