//! Utilities for driving the `pokerwire` harness without a network.
//!
//! [`SimulatedBackend`] stands in for both the subscription socket and the
//! command endpoint, applying the betting rules of a real table and pushing
//! the events each command produces.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use pokerwire::{HarnessConfig, Orchestrator};
//! use pokerwire_testing::SimulatedBackend;
//!
//! let backend = SimulatedBackend::default();
//! let orchestrator = Orchestrator::new(
//!     HarnessConfig::default(),
//!     Arc::new(backend.clone()),
//!     Arc::new(backend),
//! );
//! # let _ = orchestrator;
//! ```

pub mod backend;
pub mod logging;

pub use backend::{BackendOptions, Hand, RuleError, SimulatedBackend, SimulatedChannel};
pub use logging::{LoggerHandle, logger};
