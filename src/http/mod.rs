// ============================================================================
// Resilient Fetch Client
// ============================================================================
//
// HTTP access to the storefront REST backend. Every outcome is reduced to a
// JSON body or a classified `ApiError`; retries are invisible to callers.
//
// ============================================================================

pub mod client;
pub mod config;
pub mod mock;
pub mod retry;
pub mod transport;

pub use client::{ApiClient, with_query};
pub use config::ClientConfig;
pub use mock::{MockReply, MockTransport, RecordedCall};
pub use retry::RetryPolicy;
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport, TransportError};

pub use reqwest::Method;
