#![doc(html_root_url = "https://docs.rs/pokerwire/latest")]
//! Public API for the `pokerwire` library.
//!
//! This crate drives deterministic end-to-end scenarios against a poker
//! backend that exposes GraphQL mutations over HTTP and subscriptions over
//! the `graphql-ws` WebSocket sub-protocol. Every step arms its observers
//! before the command that triggers their events is sent, so a slow
//! subscriber can never miss a frame.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod fixture;
pub mod frame;
pub mod graphql;
pub mod metrics;
pub mod model;
pub mod panic;
pub mod rendezvous;
pub mod scenario;
pub mod stream;
pub mod transport;

pub use command::{CommandActor, CommandError, CommandReply};
pub use config::{HarnessConfig, Timeouts};
pub use context::{ActorId, HandId, SessionContext, TableId};
pub use error::{AssertionFailure, HarnessError};
pub use fixture::Match;
pub use rendezvous::{Rendezvous, RendezvousError};
pub use scenario::{Orchestrator, ScenarioError, ScenarioState, Script, Step};
pub use stream::{NextOptions, StreamActor};
