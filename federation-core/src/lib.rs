//! # Federation Core
//!
//! Domain model, registry, scoring and learning loop for adaptive routing
//! across LLM providers. This crate holds everything that can run as a
//! synchronous, in-process decision (`Router::route`) plus the async
//! boundaries it depends on for persistence (`RegistryStore`) and execution
//! (`Adapter`).
//!
//! ## Components
//!
//! - [`models`] — the domain types: `Provider`, `Task`, `RoutingDecision`,
//!   `RoutingOutcome`.
//! - [`registry`] — the in-memory provider set plus circuit-breaker state
//!   machine, backed by a pluggable [`store::RegistryStore`].
//! - [`classifier`] — maps a free-text prompt to a [`models::TaskIntent`].
//! - [`cost`] — per-token cost estimation and per-tenant budget tracking.
//! - [`outcomes`] — rolling per-provider success/failure statistics.
//! - [`optimizer`] — UCB1 selection over the outcome tracker's statistics.
//! - [`ab_test`] — traffic-split experiments between two providers.
//! - [`router`] — the orchestrator tying the above into `route(Task)`.
//! - [`providers`] — the `Adapter` contract and reference implementations.
//! - [`rng`] — injectable randomness for the optimizer's exploration branch
//!   and the A/B test runner.
//! - [`error`] — the crate's error types.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use federation_core::cost::CostEstimator;
//! use federation_core::models::{Task, TaskRequirements};
//! use federation_core::optimizer::Optimizer;
//! use federation_core::outcomes::OutcomeTracker;
//! use federation_core::registry::Registry;
//! use federation_core::rng::StdRngSource;
//! use federation_core::router::Router;
//! use federation_core::store::in_memory;
//!
//! # async fn run() -> Result<(), federation_core::error::FederationError> {
//! let registry = Registry::new(in_memory());
//! let optimizer = Optimizer::new(Arc::new(OutcomeTracker::new()), Arc::new(StdRngSource::from_entropy()));
//! let router = Router::new(registry, CostEstimator::new(), optimizer);
//!
//! let task = Task {
//!     id: "task-1".into(),
//!     session_id: None,
//!     tenant_id: None,
//!     user_id: None,
//!     prompt: "Implement a function to calculate fibonacci".into(),
//!     system_prompt: None,
//!     intent: None,
//!     estimated_input_tokens: None,
//!     estimated_output_tokens: None,
//!     requirements: TaskRequirements::default(),
//!     priority: Default::default(),
//!     deadline: None,
//! };
//! let decision = router.route(task, None).await?;
//! println!("routed to {} ({})", decision.provider_id, decision.reasoning);
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod cost;
pub mod error;
pub mod models;
pub mod optimizer;
pub mod outcomes;
pub mod providers;
pub mod registry;
pub mod rng;
pub mod router;
pub mod store;

pub use error::FederationError;
pub use models::{Provider, RoutingDecision, RoutingOutcome, Task};
pub use registry::Registry;
pub use router::Router;
