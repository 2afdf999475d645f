//! The engine value
//!
//! Owns the host tree, the registry and every per-engine hook. Resolution,
//! mutation and event operations are `impl` blocks in their own modules.

use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use dom::{Host, ListenerId};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::events::{Callback, Initializer, SyntheticDetails};
use crate::registry::Registry;

/// Receives each embedded script element and its text after an `inner` write
pub type ScriptHook<N> = Box<dyn FnMut(N, &str) -> Result<()>>;

pub struct Engine<H: Host> {
    pub(crate) host: H,
    pub(crate) config: EngineConfig,
    pub(crate) registry: Registry<H::Node>,
    /// Live adapters by the listener they are attached as
    pub(crate) adapters: AHashMap<ListenerId, Callback<H>>,
    pub(crate) synthetics: AHashMap<String, Initializer<H>>,
    pub(crate) script_hook: Option<ScriptHook<H::Node>>,
}

impl<H: Host> Engine<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, EngineConfig::default())
    }

    pub fn with_config(host: H, config: EngineConfig) -> Self {
        Self {
            host,
            config,
            registry: Registry::new(),
            adapters: AHashMap::new(),
            synthetics: AHashMap::new(),
            script_hook: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry<H::Node> {
        &self.registry
    }

    /// Run embedded scripts through `hook` after textual `inner` writes
    ///
    /// Without a hook, script elements are inserted inert.
    pub fn set_script_hook<F>(&mut self, hook: F)
    where
        F: FnMut(H::Node, &str) -> Result<()> + 'static,
    {
        self.script_hook = Some(Box::new(hook));
    }

    pub fn clear_script_hook(&mut self) {
        self.script_hook = None;
    }

    /// Install the initializer for a synthetic event kind
    ///
    /// It runs once per (node, kind), when the first responder for that
    /// pair is registered.
    pub fn define_synthetic<F>(&mut self, kind: &str, initializer: F)
    where
        F: Fn(&mut Engine<H>, SyntheticDetails<H>) -> Result<()> + 'static,
    {
        tracing::debug!("[Engine] Defined synthetic event '{}'", kind);
        self.synthetics.insert(kind.to_string(), Rc::new(initializer));
    }

    /// Give the host back, detaching every live responder first
    pub fn into_host(mut self) -> Result<H> {
        self.teardown()?;
        Ok(self.host)
    }
}

impl<H: Host + fmt::Debug> fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("adapters", &self.adapters.len())
            .field("synthetics", &self.synthetics.keys().collect::<Vec<_>>())
            .field("script_hook", &self.script_hook.is_some())
            .finish()
    }
}
