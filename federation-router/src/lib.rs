//! # Federation Router
//!
//! The async operational wrapper around [`federation_core`]: a background
//! health-refresh loop over the registry, numeric configuration
//! (`FederationConfig`) plus provider environment overrides, and cooperative
//! cancellation shared between the loop and in-flight `route()` calls.
//!
//! This crate does not implement an HTTP server, a CLI, or a config-file
//! loader — `federation_core::router::Router` is usable entirely on its own
//! for a caller that already has a populated `Registry`. What this crate
//! adds is the part a long-running process needs around that: keeping
//! provider health current in the background, and the small number of
//! numeric knobs an operator might want to tune without a code change.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use federation_core::optimizer::Optimizer;
//! use federation_core::outcomes::OutcomeTracker;
//! use federation_core::providers::AdapterFactory;
//! use federation_core::registry::Registry;
//! use federation_core::rng::StdRngSource;
//! use federation_core::router::Router;
//! use federation_core::store::in_memory;
//! use federation_router::config::FederationConfig;
//! use federation_router::health::spawn_health_loop;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let config = FederationConfig::from_env();
//! let registry = Arc::new(Registry::new(in_memory()).with_failure_threshold(config.circuit_breaker.failure_threshold));
//! let optimizer = Optimizer::new(Arc::new(OutcomeTracker::new()), Arc::new(StdRngSource::from_entropy()))
//!     .with_exploration_rate(config.bandit.exploration_rate);
//!
//! let cancellation = CancellationToken::new();
//! let adapters = Arc::new(AdapterFactory::new());
//! let _health_loop = spawn_health_loop(
//!     Arc::clone(&registry),
//!     adapters,
//!     Duration::from_secs(config.health_check_interval_secs),
//!     cancellation.clone(),
//! );
//! # }
//! ```

pub mod config;
pub mod health;

pub use config::FederationConfig;
pub use health::spawn_health_loop;
