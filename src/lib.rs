//! HCP provider core.
//!
//! Building blocks for managing HashiCorp Cloud Platform resources from an
//! infrastructure-as-code tool:
//!
//! - **[`link`]**: typed resource references and their canonical string form
//! - **[`client`]**: authenticated HTTP client with 404 detection and retried reads
//! - **[`wait`]**: deadline-bound, cancellable waiters for long-running
//!   operations and resource state transitions
//! - **[`network`]**: typed HVN and peering models and service calls
//! - **[`provider`]**: the CRUD surface, implemented for `hcp_hvn` and
//!   `hcp_aws_network_peering`
//! - **[`schema`]** / **[`validation`]**: resource schemas and input checks
//! - **[`testing`]**: a harness for driving a provider without a transport
//!
//! # Quick Start
//!
//! ```no_run
//! use hcp_provider::{HcpProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), hcp_provider::HcpError> {
//! hcp_provider::try_init_logging();
//!
//! let provider = HcpProvider::new();
//! provider
//!     .configure(json!({
//!         "client_id": "id",
//!         "client_secret": "secret",
//!         "organization_id": "org",
//!         "project_id": "proj",
//!     }))
//!     .await?;
//!
//! let state = provider
//!     .create("hcp_hvn", json!({
//!         "hvn_id": "main-hvn",
//!         "cloud_provider": "aws",
//!         "region": "us-west-2",
//!         "timeouts": {"create": "15m"},
//!     }))
//!     .await?;
//! println!("created {}", state["self_link"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod error;
pub mod link;
pub mod logging;
pub mod network;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;
pub mod wait;

pub use client::{ClientConfig, HcpClient, RetryPolicy};
pub use error::{is_not_found, HcpError};
pub use link::{Link, LinkVersion, Location, Region};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{HcpProvider, ProviderService};
pub use schema::{Diagnostic, ProviderSchema};
pub use types::{ImportedResource, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};
pub use wait::{
    wait_for_operation, NotFoundPolicy, Operation, OperationWaiter, StateWaiter, WaitContext,
    WaitOutcome,
};

pub use async_trait::async_trait;
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
