//! Mutation Engine
//!
//! `html(collection, location, payload)` is the one structural entry point;
//! the location-named methods are shorthands for it. Every call first runs
//! the sanitation pass over each target's children, so `top` and `bottom`
//! never land next to stray whitespace text.

use std::fmt;
use std::str::FromStr;

use dom::Host;

use crate::collection::Collection;
use crate::config::SiblingWrapContext;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::wrap;

/// Where payload content goes relative to a target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Replace the target's children
    Inner,
    /// Replace the target itself
    Outer,
    /// First child of the target
    Top,
    /// Last child of the target
    Bottom,
    /// Preceding sibling of the target
    Before,
    /// Following sibling of the target
    After,
    /// Detach the target; takes no payload
    Remove,
}

impl Location {
    pub const ALL: [Location; 7] = [
        Location::Inner,
        Location::Outer,
        Location::Top,
        Location::Bottom,
        Location::Before,
        Location::After,
        Location::Remove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Location::Inner => "inner",
            Location::Outer => "outer",
            Location::Top => "top",
            Location::Bottom => "bottom",
            Location::Before => "before",
            Location::After => "after",
            Location::Remove => "remove",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Location::ALL
            .into_iter()
            .find(|location| location.as_str() == s)
            .ok_or_else(|| Error::UnknownLocation(s.to_string()))
    }
}

/// Content handed to a mutation
#[derive(Debug, Clone)]
pub enum Payload<N> {
    Empty,
    /// Markup or plain text
    Markup(String),
    /// A single node, inserted as is
    Node(N),
    /// Applied once per member, in order
    Collection(Collection<N>),
}

impl<N> From<&str> for Payload<N> {
    fn from(markup: &str) -> Self {
        Payload::Markup(markup.to_string())
    }
}

impl<N> From<String> for Payload<N> {
    fn from(markup: String) -> Self {
        Payload::Markup(markup)
    }
}

impl<N> From<i64> for Payload<N> {
    fn from(number: i64) -> Self {
        Payload::Markup(number.to_string())
    }
}

impl<N> From<f64> for Payload<N> {
    fn from(number: f64) -> Self {
        Payload::Markup(number.to_string())
    }
}

impl<N: Clone> From<&Collection<N>> for Payload<N> {
    fn from(collection: &Collection<N>) -> Self {
        Payload::Collection(collection.clone())
    }
}

impl<N> From<Collection<N>> for Payload<N> {
    fn from(collection: Collection<N>) -> Self {
        Payload::Collection(collection)
    }
}

impl<H: Host> Engine<H> {
    /// Apply `location` with `payload` to every member of `collection`
    ///
    /// Returns `collection` for chaining. A collection payload re-applies
    /// the location once per payload member.
    pub fn html<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        location: Location,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.sanitize(collection)?;

        let payload = payload.into();
        if let Payload::Collection(members) = &payload {
            for member in members.iter() {
                self.html(collection, location, Payload::Node(member))?;
            }
            return Ok(collection);
        }
        if matches!(payload, Payload::Empty) && location != Location::Remove {
            return Err(Error::MissingPayload(location));
        }

        tracing::debug!("[Mutation] {} on {} nodes", location, collection.len());
        for target in collection.iter() {
            self.apply(target, location, &payload)?;
        }
        Ok(collection)
    }

    pub fn inner<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Inner, payload)
    }

    pub fn outer<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Outer, payload)
    }

    pub fn top<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Top, payload)
    }

    pub fn bottom<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Bottom, payload)
    }

    pub fn before<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Before, payload)
    }

    pub fn after<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        payload: impl Into<Payload<H::Node>>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::After, payload)
    }

    pub fn remove<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
    ) -> Result<&'c Collection<H::Node>> {
        self.html(collection, Location::Remove, Payload::Empty)
    }

    /// Serialized children of the first member, after sanitation
    pub fn inner_html(&mut self, collection: &Collection<H::Node>) -> Result<Option<String>> {
        self.sanitize(collection)?;
        match collection.first() {
            Some(first) => Ok(Some(self.host.inner_markup(first)?)),
            None => Ok(None),
        }
    }

    /// Values of attribute `name`, in collection order, skipping members without it
    pub fn attr(&self, collection: &Collection<H::Node>, name: &str) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for node in collection.iter() {
            if let Some(value) = self.host.get_attribute(node, name)? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Set attribute `name` on every member
    ///
    /// `checked` set to `""` or `"false"` removes the attribute instead.
    pub fn set_attr<'c>(
        &mut self,
        collection: &'c Collection<H::Node>,
        name: &str,
        value: &str,
    ) -> Result<&'c Collection<H::Node>> {
        let unset = name.eq_ignore_ascii_case("checked") && (value.is_empty() || value == "false");
        for node in collection.iter() {
            if unset {
                self.host.remove_attribute(node, name)?;
            } else {
                self.host.set_attribute(node, name, value)?;
            }
        }
        Ok(collection)
    }

    /// Drop whitespace-only text children and renumber the rest
    pub fn sanitize(&mut self, collection: &Collection<H::Node>) -> Result<()> {
        for target in collection.iter() {
            let mut index = 0u32;
            for child in self.host.children(target)? {
                if wrap::is_blank_text(&self.host, child)? {
                    self.host.remove_child(target, child)?;
                } else {
                    self.host.set_sibling_index(child, index)?;
                    index += 1;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, target: H::Node, location: Location, payload: &Payload<H::Node>) -> Result<()> {
        match location {
            Location::Inner => self.apply_inner(target, payload),
            Location::Remove => {
                let parent = self.require_parent(target, location)?;
                self.host.remove_child(parent, target)?;
                Ok(())
            }
            Location::Outer => {
                let parent = self.require_parent(target, location)?;
                self.insert(payload, target, parent, Some(target))?;
                self.host.remove_child(parent, target)?;
                Ok(())
            }
            Location::Top => {
                let first = self.host.children(target)?.first().copied();
                self.insert(payload, target, target, first)
            }
            Location::Bottom => self.insert(payload, target, target, None),
            Location::Before => {
                let parent = self.require_parent(target, location)?;
                let context = self.sibling_context(target, parent);
                self.insert(payload, context, parent, Some(target))
            }
            Location::After => {
                let parent = self.require_parent(target, location)?;
                let context = self.sibling_context(target, parent);
                let next = self.host.next_sibling(target)?;
                self.insert(payload, context, parent, next)
            }
        }
    }

    fn apply_inner(&mut self, target: H::Node, payload: &Payload<H::Node>) -> Result<()> {
        match payload {
            Payload::Markup(markup) => {
                self.host.set_inner_markup(target, markup)?;
                self.run_scripts(target)
            }
            Payload::Node(node) => {
                for child in self.host.children(target)? {
                    self.host.remove_child(target, child)?;
                }
                self.host.insert_before(target, *node, None)?;
                Ok(())
            }
            Payload::Empty | Payload::Collection(_) => Ok(()),
        }
    }

    /// Place `payload` under `parent` before `reference`
    ///
    /// Markup is wrapped with a tag inferred from `context`; nodes go in as is.
    fn insert(
        &mut self,
        payload: &Payload<H::Node>,
        context: H::Node,
        parent: H::Node,
        reference: Option<H::Node>,
    ) -> Result<()> {
        match payload {
            Payload::Markup(markup) => {
                let tag = wrap::infer_tag(&self.host, context, &self.config)?;
                let staging = wrap::stage(&mut self.host, markup, &tag)?;
                let moved = wrap::unwrap(&mut self.host, staging, parent, reference)?;
                tracing::trace!("[Mutation] Unwrapped {} nodes from <{}>", moved.len(), tag);
                Ok(())
            }
            Payload::Node(node) => {
                self.host.insert_before(parent, *node, reference)?;
                Ok(())
            }
            Payload::Empty | Payload::Collection(_) => Ok(()),
        }
    }

    fn sibling_context(&self, target: H::Node, parent: H::Node) -> H::Node {
        match self.config.sibling_wrap_context {
            SiblingWrapContext::Parent => parent,
            SiblingWrapContext::Target => target,
        }
    }

    fn require_parent(&self, target: H::Node, location: Location) -> Result<H::Node> {
        self.host.parent(target)?.ok_or_else(|| Error::MissingParent {
            location,
            node: format!("{:?}", target),
        })
    }

    fn run_scripts(&mut self, target: H::Node) -> Result<()> {
        let Some(hook) = self.script_hook.as_mut() else {
            return Ok(());
        };
        for script in self.host.get_elements_by_tag_name(target, "script")? {
            let text = self.host.text_content(script)?;
            tracing::trace!("[Mutation] Running script hook on {:?}", script);
            hook(script, &text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use dom::{DomArena, DomSerializer};

    use super::*;
    use crate::config::EngineConfig;

    fn engine(markup: &str) -> Engine<DomArena> {
        Engine::new(DomArena::from_markup(markup).unwrap())
    }

    fn markup(engine: &Engine<DomArena>) -> String {
        DomSerializer::new().serialize(engine.host()).unwrap()
    }

    #[test]
    fn test_location_parse() {
        for location in Location::ALL {
            assert_eq!(location.as_str().parse::<Location>().unwrap(), location);
        }
        let err = "sideways".parse::<Location>().unwrap_err();
        assert!(matches!(err, Error::UnknownLocation(name) if name == "sideways"));
    }

    #[test]
    fn test_inner_round_trip() {
        let mut engine = engine(r#"<div id="foo">old</div>"#);
        let foo = engine.select("#foo").unwrap();
        let content = r#"<strong class="a">rock &amp; roll</strong><br>"#;

        engine.inner(&foo, content).unwrap();
        assert_eq!(engine.inner_html(&foo).unwrap().as_deref(), Some(content));

        engine.inner(&foo, 42i64).unwrap();
        assert_eq!(engine.inner_html(&foo).unwrap().as_deref(), Some("42"));
        engine.inner(&foo, 1.5f64).unwrap();
        assert_eq!(engine.inner_html(&foo).unwrap().as_deref(), Some("1.5"));
    }

    #[test]
    fn test_inner_with_node() {
        let mut engine = engine(r#"<div id="a"><i>x</i></div><p id="p">moved</p>"#);
        let a = engine.select("#a").unwrap();
        let p = engine.select("#p").unwrap().first().unwrap();

        engine.inner(&a, Payload::Node(p)).unwrap();
        assert_eq!(markup(&engine), r#"<div id="a"><p id="p">moved</p></div>"#);
    }

    #[test]
    fn test_node_payload_positions() {
        const PAGE: &str = r#"<div id="box"><p id="a">a</p><p id="b">b</p></div><span id="s">s</span>"#;
        let cases = [
            (Location::Top, "#box", "#s", r#"<div id="box"><span id="s">s</span><p id="a">a</p><p id="b">b</p></div>"#),
            (Location::Bottom, "#box", "#s", r#"<div id="box"><p id="a">a</p><p id="b">b</p><span id="s">s</span></div>"#),
            (Location::Before, "#b", "#s", r#"<div id="box"><p id="a">a</p><span id="s">s</span><p id="b">b</p></div>"#),
            (Location::After, "#a", "#s", r#"<div id="box"><p id="a">a</p><span id="s">s</span><p id="b">b</p></div>"#),
            (Location::Outer, "#a", "#s", r#"<div id="box"><span id="s">s</span><p id="b">b</p></div>"#),
            // Moves within one parent
            (Location::Before, "#a", "#b", r#"<div id="box"><p id="b">b</p><p id="a">a</p></div><span id="s">s</span>"#),
            (Location::Top, "#box", "#b", r#"<div id="box"><p id="b">b</p><p id="a">a</p></div><span id="s">s</span>"#),
        ];

        for (location, target, moved, expected) in cases {
            let mut engine = engine(PAGE);
            let target = engine.select(target).unwrap();
            let node = engine.select(moved).unwrap().first().unwrap();

            engine.html(&target, location, Payload::Node(node)).unwrap();
            assert_eq!(markup(&engine), expected, "{location}");
        }
    }

    #[test]
    fn test_node_payload_already_in_place() {
        const PAGE: &str = r#"<div id="box"><p id="a">a</p><p id="b">b</p></div>"#;
        let cases = [
            (Location::After, "#a", "#b"),
            (Location::Before, "#b", "#a"),
            (Location::Top, "#box", "#a"),
            (Location::Bottom, "#box", "#b"),
        ];

        for (location, target, moved) in cases {
            let mut engine = engine(PAGE);
            let target = engine.select(target).unwrap();
            let node = engine.select(moved).unwrap().first().unwrap();

            engine.html(&target, location, Payload::Node(node)).unwrap();
            assert_eq!(markup(&engine), PAGE, "{location}");
        }
    }

    #[test]
    fn test_outer_with_detached_node() {
        let mut engine = engine(r#"<div><p id="a">a</p></div>"#);
        let a = engine.select("#a").unwrap();
        let fresh = engine.select("<em>new</em>").unwrap().first().unwrap();

        engine.outer(&a, Payload::Node(fresh)).unwrap();
        assert_eq!(markup(&engine), "<div><em>new</em></div>");
        let old = a.first().unwrap();
        assert_eq!(engine.host().get(old).unwrap().parent_id, None);
    }

    #[test]
    fn test_leaf_targets_refuse_content() {
        let mut engine = engine("<p>hello</p>");
        let p = engine.select("p").unwrap().first().unwrap();
        let text = engine.host().child_ids(p).unwrap()[0];
        let leaf = engine.select(vec![text]).unwrap();

        let err = engine.bottom(&leaf, "<b>x</b>").unwrap_err();
        assert!(matches!(err, Error::Dom(dom::DomError::HierarchyRequest { .. })));

        let b = engine.select("<b>y</b>").unwrap().first().unwrap();
        let err = engine.top(&leaf, Payload::Node(b)).unwrap_err();
        assert!(matches!(err, Error::Dom(dom::DomError::HierarchyRequest { .. })));
        assert_eq!(markup(&engine), "<p>hello</p>");
    }

    #[test]
    fn test_wrap_then_unwrap_single_element() {
        for location in [Location::Outer, Location::Top, Location::Bottom, Location::Before, Location::After] {
            let mut engine = engine(r#"<section><div id="t"><p>x</p></div></section>"#);
            let target = engine.select("#t").unwrap();
            let section = engine.select("section").unwrap().first().unwrap();
            let parent = if matches!(location, Location::Top | Location::Bottom) {
                target.first().unwrap()
            } else {
                section
            };
            let before = engine.host().child_ids(parent).unwrap().len();

            engine.html(&target, location, r#"<em title="v">X</em>"#).unwrap();

            let ems = engine.select("em").unwrap();
            assert_eq!(ems.len(), 1, "{location}");
            let em = ems.first().unwrap();
            assert_eq!(engine.attr(&ems, "title").unwrap(), vec!["v"]);
            assert_eq!(engine.host().text_content(em).unwrap(), "X");
            assert_eq!(engine.host().get(em).unwrap().parent_id, Some(parent), "{location}");

            let expected = if location == Location::Outer { before } else { before + 1 };
            assert_eq!(engine.host().child_ids(parent).unwrap().len(), expected, "{location}");
        }
    }

    #[test]
    fn test_positions() {
        let mut engine = engine("<ul>\n  <li>b</li>\n  <li>c</li>\n</ul>");
        let ul = engine.select("ul").unwrap();

        engine.top(&ul, "<li>a</li>").unwrap();
        engine.bottom(&ul, "<li>d</li>").unwrap();
        assert_eq!(markup(&engine), "<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>");

        let last = engine.find(&ul, "li:last-child").unwrap();
        engine.before(&last, "<li>d-</li>").unwrap();
        engine.after(&last, "<li>d+</li>").unwrap();
        assert_eq!(
            engine.inner_html(&ul).unwrap().unwrap(),
            "<li>a</li><li>b</li><li>c</li><li>d-</li><li>d</li><li>d+</li>"
        );
    }

    #[test]
    fn test_text_payload_wrapped_by_inferred_tag() {
        let mut engine = engine("<ul><li>one</li></ul><table><tr></tr></table>");
        let ul = engine.select("ul").unwrap();
        engine.bottom(&ul, "two").unwrap();
        assert_eq!(engine.inner_html(&ul).unwrap().unwrap(), "<li>one</li><li>two</li>");

        let tr = engine.select("tr").unwrap();
        engine.top(&tr, "cell").unwrap();
        assert_eq!(engine.inner_html(&tr).unwrap().unwrap(), "<td>cell</td>");
    }

    #[test]
    fn test_before_infers_from_parent() {
        let mut engine = engine("<ul></ul>");
        let ul = engine.select("ul").unwrap();
        engine.before(&ul, "item").unwrap();
        // The document's first element child is the ul itself
        assert_eq!(markup(&engine), "<ul>item</ul><ul></ul>");
    }

    #[test]
    fn test_before_infers_from_target() {
        let config = EngineConfig::from_json(r#"{"sibling_wrap_context": "target"}"#).unwrap();
        let mut engine = Engine::with_config(DomArena::from_markup("<ul></ul>").unwrap(), config);
        let ul = engine.select("ul").unwrap();
        engine.before(&ul, "item").unwrap();
        assert_eq!(markup(&engine), "<li>item</li><ul></ul>");
    }

    #[test]
    fn test_multiple_top_level_nodes() {
        let mut engine = engine("<ol><li>x</li></ol>");
        let ol = engine.select("ol").unwrap();
        engine.bottom(&ol, "<li>a</li><li>b</li>").unwrap();
        assert_eq!(engine.inner_html(&ol).unwrap().unwrap(), "<li>x</li><li>a</li><li>b</li>");
    }

    #[test]
    fn test_outer_and_remove() {
        let mut engine = engine(r#"<div><p id="a">a</p><p id="b">b</p></div>"#);
        let a = engine.select("#a").unwrap();
        engine.outer(&a, r#"<h1 id="h">title</h1>"#).unwrap();
        let b = engine.select("#b").unwrap();
        engine.remove(&b).unwrap();
        assert_eq!(markup(&engine), r#"<div><h1 id="h">title</h1></div>"#);

        // Removed nodes are detached, and a second remove has no parent
        let node = b.first().unwrap();
        assert_eq!(engine.host().get(node).unwrap().parent_id, None);
        let err = engine.remove(&b).unwrap_err();
        assert!(matches!(err, Error::MissingParent { location: Location::Remove, .. }));
    }

    #[test]
    fn test_parentless_targets_fail() {
        let mut engine = engine("");
        let detached = engine.select("<p>free</p>").unwrap();
        for location in [Location::Outer, Location::Before, Location::After] {
            let err = engine.html(&detached, location, "x").unwrap_err();
            assert!(matches!(err, Error::MissingParent { .. }), "{location}");
        }
        // Positions inside the target need no parent
        engine.bottom(&detached, "<b>ok</b>").unwrap();
    }

    #[test]
    fn test_missing_payload() {
        let mut engine = engine("<p></p>");
        let p = engine.select("p").unwrap();
        let err = engine.html(&p, Location::Top, Payload::Empty).unwrap_err();
        assert!(matches!(err, Error::MissingPayload(Location::Top)));
    }

    #[test]
    fn test_collection_payload_applied_per_member() {
        let mut engine = engine(r#"<div id="box"></div><span>1</span><span>2</span>"#);
        let target = engine.select("#box").unwrap();
        let spans = engine.select("span").unwrap();

        engine.bottom(&target, &spans).unwrap();
        assert_eq!(
            markup(&engine),
            r#"<div id="box"><span>1</span><span>2</span></div>"#
        );
    }

    #[test]
    fn test_sanitation_pass() {
        let mut engine = engine("<ul>\n  <li>a</li>\n  text\n  <li>b</li>\n</ul>");
        let ul = engine.select("ul").unwrap();
        engine.sanitize(&ul).unwrap();

        let node = ul.first().unwrap();
        let children = engine.host().child_ids(node).unwrap().to_vec();
        assert_eq!(children.len(), 3);
        let indices: Vec<_> = children
            .iter()
            .map(|&c| engine.host().get(c).unwrap().sibling_index)
            .collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn test_attr_and_checked() {
        let mut engine = engine(r#"<input id="a" checked><input id="b"><p></p>"#);
        let inputs = engine.select("input").unwrap();
        let all = engine.select("input, p").unwrap();

        assert_eq!(engine.attr(&all, "id").unwrap(), vec!["a", "b"]);

        engine.set_attr(&inputs, "checked", "checked").unwrap();
        assert_eq!(engine.attr(&inputs, "checked").unwrap().len(), 2);

        engine.set_attr(&inputs, "checked", "false").unwrap();
        assert!(engine.attr(&inputs, "checked").unwrap().is_empty());

        engine.set_attr(&inputs, "value", "").unwrap();
        assert_eq!(engine.attr(&inputs, "value").unwrap(), vec!["", ""]);
    }

    #[test]
    fn test_inner_html_empty_collection() {
        let mut engine = engine("<p></p>");
        let none = engine.select("#nope").unwrap();
        assert_eq!(engine.inner_html(&none).unwrap(), None);
    }

    #[test]
    fn test_scripts_inert_without_hook() {
        let mut engine = engine("<div></div>");
        let div = engine.select("div").unwrap();
        engine.inner(&div, "<script>alert(1)</script>").unwrap();
        assert_eq!(engine.select("script").unwrap().len(), 1);
    }

    #[test]
    fn test_script_hook() {
        let mut engine = engine("<div></div>");
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let seen = Rc::clone(&seen);
            engine.set_script_hook(move |_node, text| {
                seen.borrow_mut().push(text.to_string());
                Ok(())
            });
        }

        let div = engine.select("div").unwrap();
        engine
            .inner(&div, "<script>one()</script><p><script>two()</script></p>")
            .unwrap();
        assert_eq!(*seen.borrow(), vec!["one()", "two()"]);

        // Only textual inner writes run it
        engine.bottom(&div, "<script>three()</script>").unwrap();
        assert_eq!(seen.borrow().len(), 2);

        engine.set_script_hook(|_, _| Err(Error::Script("blocked".into())));
        let err = engine.inner(&div, "<script>x()</script>").unwrap_err();
        assert!(matches!(err, Error::Script(_)));
    }
}
