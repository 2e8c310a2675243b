//! # Error Handling Module
//!
//! Error types for the federation router: routing-level failures
//! (`FederationError`), persistence failures (`StoreError`), and the
//! provider-adapter boundary (`AdapterError`). `StoreError` and
//! `AdapterError` both convert into `FederationError` via `#[from]`, so a
//! caller driving `Router::route` only needs to match one enum.
//!
//! ## Examples
//!
//! ```rust
//! use federation_core::error::FederationError;
//!
//! fn handle(err: &FederationError) {
//!     match err {
//!         FederationError::NoEligibleProvider { intent } => {
//!             println!("no provider can serve intent {intent}");
//!         }
//!         FederationError::Cancelled => println!("routing was cancelled"),
//!         e => println!("routing failed: {e}"),
//!     }
//! }
//! ```

use thiserror::Error;

/// Errors raised while scoring and selecting a provider for a task.
///
/// No variant here represents a crash; per the routing contract, the
/// router always returns a decision except when the caller explicitly
/// cancels in-flight work or no provider can legally serve the request.
#[derive(Error, Debug)]
pub enum FederationError {
    /// No registered provider satisfies the task's hard requirements
    /// (health, compliance, data residency, specialties, context window).
    #[error("no eligible provider for intent {intent}")]
    NoEligibleProvider { intent: String },

    /// The registry, store, or outcome tracker failed to persist or load state.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A provider adapter failed the request it was asked to perform.
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// Provider configuration failed validation (e.g. negative cost, empty id).
    #[error("invalid provider configuration: {message}")]
    InvalidProvider { message: String },

    /// The caller's cancellation token fired before a decision was produced.
    #[error("routing cancelled")]
    Cancelled,
}

/// Errors raised by a `RegistryStore` implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying SQL connection or query failed.
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    /// The underlying Redis connection or command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A stored record could not be deserialized back into a domain type.
    #[error("corrupt record for provider {provider_id}: {message}")]
    Corrupt {
        provider_id: String,
        message: String,
    },

    /// The requested provider id is not present in the store.
    #[error("provider not found: {0}")]
    NotFound(String),

    /// JSON encoding/decoding of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by an `Adapter` implementation.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The adapter's HTTP transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider rejected the request with an API-level error.
    #[error("provider api error: {code} - {message}")]
    Api { code: u16, message: String },

    /// The configured API key was rejected or missing.
    #[error("invalid api key")]
    InvalidApiKey,

    /// The adapter does not support streaming responses.
    #[error("streaming not supported by this adapter")]
    StreamingUnsupported,

    /// The adapter's response could not be parsed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request timed out waiting for the provider.
    #[error("request timed out")]
    Timeout,
}
