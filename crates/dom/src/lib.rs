//! In-memory document tree
//!
//! Arena-backed DOM that implements the `Host` node capability interface.
//!
//! ## Core Design
//!
//! ```text
//! markup → parser → DomArena (owned) → Host trait → collection engine
//!                       ↓                   ↓
//!                 NodeId (u32)      ListenerTable / SelectorMatcher
//! ```
//!
//! - **Data structures first**: one Vec of nodes, u32 handles, no Rc
//! - **Nothing is freed**: removed nodes are detached, handles stay valid
//! - **Pluggable matching**: selector engine sits behind a trait object

pub mod arena;
pub mod error;
pub mod events;
pub mod host;
pub mod parser;
pub mod selector;
pub mod serializer;
pub mod types;
pub mod utils;

pub use arena::DomArena;
pub use error::{DomError, Result};
pub use events::{Event, EventPhase, ListenerId, ListenerTable};
pub use host::Host;
pub use selector::{SelectorMatcher, SimpleMatcher};
pub use serializer::{DomSerializer, SerializerConfig};
pub use types::*;
