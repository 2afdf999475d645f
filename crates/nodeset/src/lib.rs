//! Node-collection engine
//!
//! Selects nodes of a host tree into ordered, duplicate-free collections and
//! runs structural mutation and event operations over them.
//!
//! ## Core Design
//!
//! ```text
//! query ──→ resolver ──→ Collection ──→ mutation (html / attr)
//!                             │
//!                             └──────→ events (on / un / fire)
//!                                          │
//!                                      Registry ⇄ Host listener table
//! ```
//!
//! - **Host-agnostic**: everything goes through the `dom::Host` trait
//! - **Single-threaded**: the engine owns its host; handlers borrow the engine
//! - **Explicit teardown**: `Engine::teardown` detaches every live responder

pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod mutation;
pub mod registry;
pub mod resolver;
pub mod wrap;

pub use collection::{dedup_by, Collection};
pub use config::{DuplicatePolicy, EngineConfig, SiblingWrapContext};
pub use engine::{Engine, ScriptHook};
pub use error::{Error, Result};
pub use events::{Callback, Response, SyntheticDetails, STOCK_EVENTS};
pub use mutation::{Location, Payload};
pub use registry::{Guid, IdentityTag, Registry, Removal, Responder};
pub use resolver::Query;
