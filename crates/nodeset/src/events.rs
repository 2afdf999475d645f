//! Event Registry operations
//!
//! `register` / `unregister` keep the registry and the host's listener
//! table in step; `dispatch` walks the propagation path and runs the
//! adapters attached on each node.
//!
//! Design:
//! - Callback identity is the `Callback` handle; clones share one guid
//! - Handlers get `&mut Engine`, so they may register, unregister, mutate
//!   or dispatch while an event is in flight
//! - Listener lists are snapshotted per node; a responder removed by an
//!   earlier sibling is skipped, one added mid-dispatch waits for the next event

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use dom::{Event, EventPhase, Host};
use serde_json::Value;

use crate::collection::Collection;
use crate::config::DuplicatePolicy;
use crate::engine::Engine;
use crate::error::Result;
use crate::registry::{Guid, Removal, Responder};

/// What a handler asks of the event it just saw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Response {
    #[default]
    Continue,
    CancelDefault,
    StopPropagation,
    /// Cancel the default action and stop propagation
    Both,
}

type HandlerFn<H> = dyn Fn(&mut Engine<H>, &mut Event<<H as Host>::Node>) -> Result<Response>;

struct CallbackInner<H: Host> {
    guid: Cell<Option<Guid>>,
    handler: Box<HandlerFn<H>>,
}

/// A registrable event handler
///
/// Cloning yields the same callback: registering any clone reuses the guid
/// stamped on the first registration, and any clone can unregister it.
pub struct Callback<H: Host> {
    inner: Rc<CallbackInner<H>>,
}

impl<H: Host> Callback<H> {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&mut Engine<H>, &mut Event<H::Node>) -> Result<Response> + 'static,
    {
        Self {
            inner: Rc::new(CallbackInner {
                guid: Cell::new(None),
                handler: Box::new(handler),
            }),
        }
    }

    /// Guid, once the callback has been registered somewhere
    pub fn guid(&self) -> Option<Guid> {
        self.inner.guid.get()
    }

    /// Whether both handles are the same callback
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn stamp(&self, mint: impl FnOnce() -> Guid) -> Guid {
        match self.inner.guid.get() {
            Some(guid) => guid,
            None => {
                let guid = mint();
                self.inner.guid.set(Some(guid));
                guid
            }
        }
    }

    fn call(&self, engine: &mut Engine<H>, event: &mut Event<H::Node>) -> Result<Response> {
        (self.inner.handler)(engine, event)
    }
}

impl<H: Host> Clone for Callback<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: Host> fmt::Debug for Callback<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("guid", &self.guid())
            .finish_non_exhaustive()
    }
}

/// Handed to a synthetic event's initializer
pub struct SyntheticDetails<H: Host> {
    /// Node the first responder is being registered on
    pub node: H::Node,
    pub kind: String,
    /// Caller-supplied options, an empty object when none were given
    pub options: Value,
    /// Re-dispatches `kind` on the node it fires on, carrying that event's data
    pub handler: Callback<H>,
}

pub(crate) type Initializer<H> = Rc<dyn Fn(&mut Engine<H>, SyntheticDetails<H>) -> Result<()>>;

impl<H: Host> Engine<H> {
    /// Register `callback` for `kind` on every member
    pub fn on<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        kind: &str,
        callback: &Callback<H>,
        details: Option<Value>,
    ) -> Result<&'c Collection<H::Node>> {
        for node in collection.iter() {
            self.register(node, kind, callback, details.clone())?;
        }
        Ok(collection)
    }

    /// Unregister `callback` (or every responder, when `None`) for `kind`
    pub fn un<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        kind: &str,
        callback: Option<&Callback<H>>,
    ) -> Result<&'c Collection<H::Node>> {
        for node in collection.iter() {
            self.unregister(node, kind, callback)?;
        }
        Ok(collection)
    }

    /// Dispatch `kind` on every member, in collection order
    pub fn fire<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        kind: &str,
        data: Option<Value>,
    ) -> Result<&'c Collection<H::Node>> {
        for node in collection.iter() {
            self.dispatch(node, kind, data.clone())?;
        }
        Ok(collection)
    }

    /// Register `callback` on every member, or fire `kind` when there is none
    pub fn listen_or_fire<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        kind: &str,
        callback: Option<&Callback<H>>,
    ) -> Result<&'c Collection<H::Node>> {
        match callback {
            Some(callback) => self.on(collection, kind, callback, None),
            None => self.fire(collection, kind, None),
        }
    }

    /// Register `callback` for `kind` on `node`
    ///
    /// Returns whether a responder was attached; under
    /// `DuplicatePolicy::Ignore` a repeat registration attaches nothing.
    pub fn register(
        &mut self,
        node: H::Node,
        kind: &str,
        callback: &Callback<H>,
        details: Option<Value>,
    ) -> Result<bool> {
        if self.registry.responders(node, kind).is_empty() {
            if let Some(initializer) = self.synthetics.get(kind).cloned() {
                tracing::debug!("[Registry] Initializing synthetic '{}' on {:?}", kind, node);
                let details = SyntheticDetails {
                    node,
                    kind: kind.to_string(),
                    options: details.unwrap_or_else(|| Value::Object(Default::default())),
                    handler: redispatcher(node, kind),
                };
                initializer(self, details)?;
            }
        }

        let guid = callback.stamp(Guid::mint);

        if self.config.duplicate_registration == DuplicatePolicy::Ignore
            && self
                .registry
                .responders(node, kind)
                .iter()
                .any(|r| r.guid == guid)
        {
            tracing::trace!("[Registry] Ignoring repeat {} for '{}' on {:?}", guid, kind, node);
            return Ok(false);
        }

        let listener = self.registry.mint_listener();
        self.host.add_listener(node, kind, listener)?;
        self.adapters.insert(listener, callback.clone());
        let tag = self.registry.push(node, kind, Responder { guid, listener });
        tracing::debug!("[Registry] Attached {} for '{}' on {}", guid, kind, tag);
        Ok(true)
    }

    /// Remove responders for `kind` on `node`; returns how many went
    ///
    /// With a callback, only its responders go. A callback that was never
    /// registered, or a (node, kind) with nothing registered, removes nothing.
    /// Registry and adapters are cleared before the host is asked to detach,
    /// so a host failure is reported without leaving stale adapters behind.
    pub fn unregister(
        &mut self,
        node: H::Node,
        kind: &str,
        callback: Option<&Callback<H>>,
    ) -> Result<usize> {
        let which = match callback {
            None => Removal::All,
            Some(callback) => match callback.guid() {
                Some(guid) => Removal::Guid(guid),
                None => return Ok(0),
            },
        };

        let removed = self.registry.remove(node, kind, which);
        for responder in &removed {
            self.adapters.remove(&responder.listener);
        }

        let mut failure = None;
        for responder in &removed {
            match self.host.remove_listener(node, kind, responder.listener) {
                Ok(_) => {
                    tracing::debug!("[Registry] Detached {} for '{}' from {:?}", responder.guid, kind, node);
                }
                Err(e) => {
                    tracing::warn!("[Registry] Host failed to detach {} from {:?}: {}", responder.guid, node, e);
                    failure.get_or_insert(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(removed.len()),
        }
    }

    /// Fire `kind` at `node` and let it bubble through the ancestors
    ///
    /// A node that cannot receive events is replaced by the host's
    /// surrogate. The first handler error aborts dispatch and is returned.
    pub fn dispatch(&mut self, node: H::Node, kind: &str, data: Option<Value>) -> Result<Event<H::Node>> {
        let target = self.host.dispatch_surrogate(node).unwrap_or(node);

        let mut path = vec![target];
        let mut current = self.host.parent(target)?;
        while let Some(ancestor) = current {
            path.push(ancestor);
            current = self.host.parent(ancestor)?;
        }

        let mut event = Event::new(kind, data);
        event.target = Some(target);
        tracing::debug!("[Dispatch] '{}' at {:?} ({} nodes on path)", kind, target, path.len());

        for current in path {
            event.current_target = Some(current);
            event.phase = if current == target {
                EventPhase::AtTarget
            } else {
                EventPhase::Bubbling
            };

            for listener in self.host.listeners(current, kind)? {
                // Gone since the snapshot, or not one of ours
                let Some(callback) = self.adapters.get(&listener).cloned() else {
                    continue;
                };
                match callback.call(self, &mut event)? {
                    Response::Continue => {}
                    Response::CancelDefault => event.prevent_default(),
                    Response::StopPropagation => event.stop_propagation(),
                    Response::Both => {
                        event.prevent_default();
                        event.stop_propagation();
                    }
                }
            }

            if event.is_propagation_stopped() || !event.bubbles {
                break;
            }
        }

        event.current_target = None;
        event.phase = EventPhase::None;
        Ok(event)
    }

    /// Detach every live responder and empty the registry
    ///
    /// Synthetic definitions and the script hook stay installed. Every
    /// listener is offered to the host even if an earlier detach fails; the
    /// first failure is returned.
    pub fn teardown(&mut self) -> Result<()> {
        let drained = self.registry.drain();
        tracing::debug!("[Registry] Teardown, detaching {} responders", drained.len());
        self.adapters.clear();

        let mut failure = None;
        for (node, kind, responder) in drained {
            if let Err(e) = self.host.remove_listener(node, &kind, responder.listener) {
                tracing::warn!("[Registry] Host failed to detach {} from {:?}: {}", responder.guid, node, e);
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

/// Event kinds that get a named listen-or-fire shortcut on `Engine`
pub const STOCK_EVENTS: [&str; 11] = [
    "click",
    "load",
    "submit",
    "touchstart",
    "touchmove",
    "touchend",
    "touchcancel",
    "gesturestart",
    "gesturechange",
    "gestureend",
    "orientationchange",
];

macro_rules! stock_shortcuts {
    ($($name:ident => $kind:literal),* $(,)?) => {
        impl<H: Host> Engine<H> {
            $(
                #[doc = concat!("`listen_or_fire` for `", $kind, "`")]
                pub fn $name<'c>(
                    &mut self,
                    collection: &'c Collection<H::Node>,
                    callback: Option<&Callback<H>>,
                ) -> Result<&'c Collection<H::Node>> {
                    self.listen_or_fire(collection, $kind, callback)
                }
            )*
        }
    };
}

stock_shortcuts! {
    click => "click",
    load => "load",
    submit => "submit",
    touchstart => "touchstart",
    touchmove => "touchmove",
    touchend => "touchend",
    touchcancel => "touchcancel",
    gesturestart => "gesturestart",
    gesturechange => "gesturechange",
    gestureend => "gestureend",
    orientationchange => "orientationchange",
}

fn redispatcher<H: Host>(node: H::Node, kind: &str) -> Callback<H> {
    let kind = kind.to_string();
    Callback::new(move |engine: &mut Engine<H>, event: &mut Event<H::Node>| {
        let on = event.current_target.unwrap_or(node);
        engine.dispatch(on, &kind, Some(event.data.clone()))?;
        Ok(Response::Continue)
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use dom::DomArena;
    use serde_json::json;

    use super::*;
    use crate::config::EngineConfig;
    use crate::Error;

    type Log = Rc<RefCell<Vec<String>>>;

    fn engine(markup: &str) -> Engine<DomArena> {
        Engine::new(DomArena::from_markup(markup).unwrap())
    }

    fn logging(log: &Log, label: &str, response: Response) -> Callback<DomArena> {
        let log = Rc::clone(log);
        let label = label.to_string();
        Callback::new(move |_engine, _event| {
            log.borrow_mut().push(label.clone());
            Ok(response)
        })
    }

    #[test]
    fn test_register_then_unregister_drops_branch() {
        let mut engine = engine(r#"<button id="b">go</button>"#);
        let button = engine.select("#b").unwrap();
        let log = Log::default();
        let f = logging(&log, "f", Response::Continue);

        engine.on(&button, "click", &f, None).unwrap();
        let node = button.first().unwrap();
        assert!(engine.registry().has_branch(node));
        assert_eq!(engine.host().listeners(node, "click").unwrap().len(), 1);

        engine.un(&button, "click", Some(&f)).unwrap();
        assert!(engine.registry().responders(node, "click").is_empty());
        assert!(!engine.registry().has_branch(node));
        assert_eq!(engine.registry().branch_count(), 0);
        assert_eq!(engine.registry().tag_count(), 0);
        assert!(engine.host().listeners(node, "click").unwrap().is_empty());
        assert!(engine.adapters.is_empty());
    }

    #[test]
    fn test_guid_reused_across_registrations() {
        let mut engine = engine("<a></a><b></b>");
        let nodes = engine.select("a, b").unwrap();
        let f = Callback::new(|_, _| Ok(Response::Continue));
        assert_eq!(f.guid(), None);

        engine.on(&nodes, "click", &f, None).unwrap();
        let guid = f.guid().unwrap();
        let clone = f.clone();
        assert!(clone.ptr_eq(&f));

        for node in nodes.iter() {
            assert_eq!(engine.registry().responders(node, "click")[0].guid, guid);
        }

        // Any clone removes it
        engine.un(&nodes, "click", Some(&clone)).unwrap();
        assert_eq!(engine.registry().branch_count(), 0);
    }

    #[test]
    fn test_duplicate_registration_allowed_by_default() {
        let mut engine = engine("<p></p>");
        let p = engine.select("p").unwrap();
        let log = Log::default();
        let f = logging(&log, "f", Response::Continue);

        engine.on(&p, "click", &f, None).unwrap();
        engine.on(&p, "click", &f, None).unwrap();
        engine.fire(&p, "click", None).unwrap();
        assert_eq!(log.borrow().len(), 2);

        // One targeted removal takes both
        let node = p.first().unwrap();
        assert_eq!(engine.unregister(node, "click", Some(&f)).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let config = EngineConfig::from_json(r#"{"duplicate_registration": "ignore"}"#).unwrap();
        let mut engine = Engine::with_config(DomArena::from_markup("<p></p>").unwrap(), config);
        let node = engine.select("p").unwrap().first().unwrap();
        let log = Log::default();
        let f = logging(&log, "f", Response::Continue);

        assert!(engine.register(node, "click", &f, None).unwrap());
        assert!(!engine.register(node, "click", &f, None).unwrap());
        engine.dispatch(node, "click", None).unwrap();
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_unregister_all_and_misses() {
        let mut engine = engine("<p></p>");
        let node = engine.select("p").unwrap().first().unwrap();
        let f = Callback::new(|_, _| Ok(Response::Continue));
        let g = Callback::new(|_, _| Ok(Response::Continue));
        let never = Callback::new(|_, _| Ok(Response::Continue));

        assert_eq!(engine.unregister(node, "click", None).unwrap(), 0);
        engine.register(node, "click", &f, None).unwrap();
        engine.register(node, "click", &g, None).unwrap();
        engine.register(node, "load", &g, None).unwrap();

        assert_eq!(engine.unregister(node, "click", Some(&never)).unwrap(), 0);
        assert_eq!(engine.unregister(node, "click", None).unwrap(), 2);
        assert!(engine.registry().has_branch(node));
        assert_eq!(engine.unregister(node, "load", Some(&g)).unwrap(), 1);
        assert!(!engine.registry().has_branch(node));
    }

    #[test]
    fn test_dispatch_order_and_bubbling() {
        let mut engine = engine(r#"<div id="outer"><span id="inner"></span></div>"#);
        let outer = engine.select("#outer").unwrap();
        let inner = engine.select("#inner").unwrap();
        let log = Log::default();

        engine.on(&outer, "click", &logging(&log, "outer", Response::Continue), None).unwrap();
        engine.on(&inner, "click", &logging(&log, "inner-1", Response::Continue), None).unwrap();
        engine.on(&inner, "click", &logging(&log, "inner-2", Response::Continue), None).unwrap();

        let event = engine.dispatch(inner.first().unwrap(), "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["inner-1", "inner-2", "outer"]);
        assert_eq!(event.target, inner.first());
        assert_eq!(event.kind, "click");
        assert_eq!(event.data, json!({}));
        assert!(!event.is_default_prevented());
    }

    #[test]
    fn test_responses_cancel_and_stop() {
        let mut engine = engine(r#"<div id="outer"><span id="inner"></span></div>"#);
        let outer = engine.select("#outer").unwrap();
        let inner = engine.select("#inner").unwrap();
        let log = Log::default();

        engine.on(&outer, "click", &logging(&log, "outer", Response::Continue), None).unwrap();
        engine.on(&inner, "click", &logging(&log, "stop", Response::Both), None).unwrap();
        engine.on(&inner, "click", &logging(&log, "sibling", Response::Continue), None).unwrap();

        let event = engine.dispatch(inner.first().unwrap(), "click", None).unwrap();
        // Same-node responders still run, ancestors do not
        assert_eq!(*log.borrow(), vec!["stop", "sibling"]);
        assert!(event.is_default_prevented());
        assert!(event.is_propagation_stopped());

        log.borrow_mut().clear();
        engine.un(&inner, "click", None).unwrap();
        engine.on(&inner, "click", &logging(&log, "cancel", Response::CancelDefault), None).unwrap();
        let event = engine.dispatch(inner.first().unwrap(), "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["cancel", "outer"]);
        assert!(event.is_default_prevented());
        assert!(!event.is_propagation_stopped());
    }

    #[test]
    fn test_fire_carries_data() {
        let mut engine = engine("<form></form>");
        let form = engine.select("form").unwrap();
        let seen = Rc::new(RefCell::new(Value::Null));
        let sink = Rc::clone(&seen);
        let f = Callback::new(move |_, event: &mut Event<u32>| {
            *sink.borrow_mut() = event.data.clone();
            Ok(Response::Continue)
        });

        engine.on(&form, "submit", &f, None).unwrap();
        engine.fire(&form, "submit", Some(json!({"died": true}))).unwrap();
        assert_eq!(*seen.borrow(), json!({"died": true}));
    }

    #[test]
    fn test_self_unregistering_responder() {
        let mut engine = engine("<p></p>");
        let node = engine.select("p").unwrap().first().unwrap();
        let log = Log::default();

        let slot: Rc<RefCell<Option<Callback<DomArena>>>> = Rc::default();
        let once = {
            let log = Rc::clone(&log);
            let slot = Rc::clone(&slot);
            Callback::new(move |engine: &mut Engine<DomArena>, event: &mut Event<u32>| {
                log.borrow_mut().push("once".to_string());
                let me = slot.borrow().clone();
                if let (Some(me), Some(node)) = (me, event.current_target) {
                    engine.unregister(node, "click", Some(&me))?;
                }
                Ok(Response::Continue)
            })
        };
        *slot.borrow_mut() = Some(once.clone());

        engine.register(node, "click", &once, None).unwrap();
        engine.register(node, "click", &logging(&log, "after", Response::Continue), None).unwrap();

        engine.dispatch(node, "click", None).unwrap();
        engine.dispatch(node, "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["once", "after", "after"]);
    }

    #[test]
    fn test_responder_removed_mid_dispatch_is_skipped() {
        let mut engine = engine("<p></p>");
        let node = engine.select("p").unwrap().first().unwrap();
        let log = Log::default();
        let victim = logging(&log, "victim", Response::Continue);

        let killer = {
            let victim = victim.clone();
            let log = Rc::clone(&log);
            Callback::new(move |engine: &mut Engine<DomArena>, event: &mut Event<u32>| {
                log.borrow_mut().push("killer".to_string());
                if let Some(node) = event.current_target {
                    engine.unregister(node, "click", Some(&victim))?;
                }
                Ok(Response::Continue)
            })
        };

        engine.register(node, "click", &killer, None).unwrap();
        engine.register(node, "click", &victim, None).unwrap();
        engine.dispatch(node, "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["killer"]);
    }

    #[test]
    fn test_reentrant_dispatch() {
        let mut engine = engine("<p></p>");
        let node = engine.select("p").unwrap().first().unwrap();
        let depth = Rc::new(Cell::new(0u32));
        let max = Rc::clone(&depth);

        let f = Callback::new(move |engine: &mut Engine<DomArena>, event: &mut Event<u32>| {
            max.set(max.get() + 1);
            if max.get() < 3 {
                engine.dispatch(event.target.unwrap_or_default(), "ping", None)?;
            }
            Ok(Response::Continue)
        });
        engine.register(node, "ping", &f, None).unwrap();
        engine.dispatch(node, "ping", None).unwrap();
        assert_eq!(depth.get(), 3);
    }

    #[test]
    fn test_handler_error_propagates() {
        let mut engine = engine("<p></p>");
        let p = engine.select("p").unwrap();
        let log = Log::default();
        let failing = Callback::new(|_, _| Err(Error::Handler("nope".into())));

        engine.on(&p, "click", &failing, None).unwrap();
        engine.on(&p, "click", &logging(&log, "later", Response::Continue), None).unwrap();

        let err = engine.fire(&p, "click", None).unwrap_err();
        assert!(matches!(err, Error::Handler(msg) if msg == "nope"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_document_surrogate() {
        let mut arena = DomArena::from_markup("<html><body></body></html>").unwrap();
        arena.set_document_dispatch(false);
        let mut engine = Engine::new(arena);
        let html = engine.select("html").unwrap();
        let log = Log::default();

        engine.on(&html, "load", &logging(&log, "html", Response::Continue), None).unwrap();
        let document = engine.host().document();
        let event = engine.dispatch(document, "load", None).unwrap();
        assert_eq!(*log.borrow(), vec!["html"]);
        assert_eq!(event.target, html.first());
    }

    #[test]
    fn test_synthetic_initializer_runs_once() {
        let mut engine = engine(r#"<div id="pad"></div>"#);
        let pad = engine.select("#pad").unwrap();
        let inits = Rc::new(Cell::new(0u32));
        let options = Rc::new(RefCell::new(Value::Null));

        {
            let inits = Rc::clone(&inits);
            let options = Rc::clone(&options);
            engine.define_synthetic("tap", move |engine, details| {
                inits.set(inits.get() + 1);
                *options.borrow_mut() = details.options.clone();
                engine.register(details.node, "touchend", &details.handler, None)?;
                Ok(())
            });
        }

        let log = Log::default();
        engine.on(&pad, "tap", &logging(&log, "tap-1", Response::Continue), Some(json!({"ms": 200}))).unwrap();
        engine.on(&pad, "tap", &logging(&log, "tap-2", Response::Continue), None).unwrap();
        assert_eq!(inits.get(), 1);
        assert_eq!(*options.borrow(), json!({"ms": 200}));

        engine.fire(&pad, "touchend", Some(json!({"x": 1}))).unwrap();
        assert_eq!(*log.borrow(), vec!["tap-1", "tap-2"]);
    }

    #[test]
    fn test_teardown_detaches_everything() {
        let mut engine = engine("<a></a><b></b>");
        let nodes = engine.select("a, b").unwrap();
        let log = Log::default();
        let f = logging(&log, "f", Response::Continue);

        engine.on(&nodes, "click", &f, None).unwrap();
        engine.on(&nodes, "load", &f, None).unwrap();
        let first = nodes.first().unwrap();
        let old_tag = engine.registry().existing_tag(first).unwrap();

        engine.teardown().unwrap();
        assert_eq!(engine.registry().branch_count(), 0);
        for node in nodes.iter() {
            assert!(engine.host().listeners(node, "click").unwrap().is_empty());
        }
        engine.fire(&nodes, "click", None).unwrap();
        assert!(log.borrow().is_empty());

        // Fresh registration gets a fresh tag
        engine.on(&nodes, "click", &f, None).unwrap();
        assert!(engine.registry().existing_tag(first).unwrap() > old_tag);
    }

    #[test]
    fn test_registration_cycles_release_tags() {
        let mut engine = engine("<a></a><b></b>");
        let nodes = engine.select("a, b").unwrap();
        let f = Callback::new(|_, _| Ok(Response::Continue));

        for _ in 0..100 {
            engine.on(&nodes, "click", &f, None).unwrap();
            engine.un(&nodes, "click", Some(&f)).unwrap();
        }
        assert_eq!(engine.registry().branch_count(), 0);
        assert_eq!(engine.registry().tag_count(), 0);
    }

    #[test]
    fn test_shared_callback_across_engines() {
        let mut first = engine("<p></p>");
        let mut second = engine("<p></p>");
        let p1 = first.select("p").unwrap();
        let p2 = second.select("p").unwrap();
        let log = Log::default();
        let f = logging(&log, "f", Response::Continue);
        let g = logging(&log, "g", Response::Continue);

        // f is stamped by the first engine, g by the second
        first.on(&p1, "click", &f, None).unwrap();
        second.on(&p2, "click", &g, None).unwrap();
        second.on(&p2, "click", &f, None).unwrap();
        assert_ne!(f.guid(), g.guid());

        let node = p2.first().unwrap();
        assert_eq!(second.unregister(node, "click", Some(&f)).unwrap(), 1);
        second.fire(&p2, "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["g"]);

        first.fire(&p1, "click", None).unwrap();
        assert_eq!(*log.borrow(), vec!["g", "f"]);
    }

    #[test]
    fn test_host_detach_failure_still_clears_adapters() {
        let mut engine = engine("<p></p><q></q>");
        let p = engine.select("p").unwrap().first().unwrap();
        let q = engine.select("q").unwrap().first().unwrap();
        let f = Callback::new(|_, _| Ok(Response::Continue));
        let g = Callback::new(|_, _| Ok(Response::Continue));
        engine.register(p, "click", &f, None).unwrap();
        engine.register(p, "click", &g, None).unwrap();
        engine.register(q, "click", &f, None).unwrap();

        // A host that no longer knows these nodes refuses every detach
        *engine.host_mut() = DomArena::new();

        let err = engine.unregister(p, "click", None).unwrap_err();
        assert!(matches!(err, Error::Dom(dom::DomError::NodeNotFound(_))));
        assert!(!engine.registry().has_branch(p));
        assert_eq!(engine.adapters.len(), 1);

        assert!(engine.teardown().is_err());
        assert_eq!(engine.registry().branch_count(), 0);
        assert!(engine.adapters.is_empty());
    }

    #[test]
    fn test_stock_shortcuts_listen_or_fire() {
        let mut engine = engine(r#"<form id="f"><button>go</button></form>"#);
        let form = engine.select("#f").unwrap();
        let button = engine.find(&form, "button").unwrap();
        let log = Log::default();

        engine.click(&button, Some(&logging(&log, "click", Response::Continue))).unwrap();
        engine.submit(&form, Some(&logging(&log, "submit", Response::Continue))).unwrap();
        assert!(log.borrow().is_empty());

        engine.click(&button, None).unwrap();
        engine.submit(&form, None).unwrap();
        assert_eq!(*log.borrow(), vec!["click", "submit"]);

        for kind in STOCK_EVENTS {
            engine.listen_or_fire(&form, kind, Some(&logging(&log, kind, Response::Continue))).unwrap();
        }
        log.borrow_mut().clear();
        engine.orientationchange(&form, None).unwrap();
        engine.touchend(&form, None).unwrap();
        assert_eq!(*log.borrow(), vec!["orientationchange", "touchend"]);
    }
}
