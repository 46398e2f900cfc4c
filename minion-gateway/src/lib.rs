//! # minion-gateway
//!
//! HTTP implementations of the registry and tenant gateway contracts, plus
//! the bounded retry helper they share.

pub mod registry_client;
pub mod retry;
pub mod tenant_client;

pub use registry_client::HttpRegistryClient;
pub use retry::with_retries;
pub use tenant_client::HttpTenantClient;

/// Header carrying the pre-issued session credential.
pub const SESSION_HEADER: &str = "X-Magda-Session";

/// Header carrying the tenant scope of a call.
pub const TENANT_HEADER: &str = "X-Magda-Tenant-Id";
