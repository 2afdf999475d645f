//! Wrap / unwrap
//!
//! Textual payloads for `outer`, `top`, `bottom`, `before` and `after` are
//! built inside a detached staging container whose tag fits the insertion
//! point, then moved out child by child. The container never touches the
//! live tree.

use std::sync::LazyLock;

use dom::{parser::decode_entities, Host, NodeType};
use regex::Regex;

use crate::config::EngineConfig;
use crate::error::Result;

static LEADING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<([A-Za-z][A-Za-z0-9]*)([^>]*)>").expect("valid regex")
});
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
        .expect("valid regex")
});

/// Tag a payload placed under `context` should be wrapped in
///
/// The first element child decides when there is one. Otherwise the wrap
/// table maps the context's own tag, falling back to the tag itself, then
/// to the configured fallback for non-elements.
pub fn infer_tag<H: Host>(host: &H, context: H::Node, config: &EngineConfig) -> Result<String> {
    for child in host.children(context)? {
        if let Some(tag) = host.tag_name(child)? {
            return Ok(tag);
        }
    }

    let tag = match host.tag_name(context)? {
        Some(own) => config
            .wrap_tag_for(&own)
            .map(str::to_string)
            .unwrap_or(own),
        None => config.fallback_wrap_tag.clone(),
    };
    Ok(tag)
}

/// A payload that is exactly one `<tag attrs>content</tag>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleElement<'a> {
    pub tag: &'a str,
    pub attributes: Vec<(String, String)>,
    pub content: &'a str,
}

/// Split a single-element payload into tag, attributes and content
///
/// Returns `None` for anything else: plain text, several siblings, void
/// elements, or trailing text after the closing tag.
pub fn split_single_element(markup: &str) -> Option<SingleElement<'_>> {
    let markup = markup.trim_end();
    let caps = LEADING_TAG.captures(markup)?;
    let whole = caps.get(0)?;
    let tag = caps.get(1)?.as_str();
    let raw_attrs = caps.get(2)?.as_str();
    if raw_attrs.trim_end().ends_with('/') {
        return None;
    }

    let close_len = tag.len() + 3;
    let close_at = markup.len().checked_sub(close_len)?;
    if close_at < whole.end() {
        return None;
    }
    let close = markup.get(close_at..)?;
    if !close.starts_with("</") || !close.ends_with('>') || !close[2..close_len - 1].eq_ignore_ascii_case(tag) {
        return None;
    }

    let content = &markup[whole.end()..close_at];
    if !balanced(content, tag) {
        return None;
    }

    let attributes = ATTRIBUTE
        .captures_iter(raw_attrs)
        .map(|c| {
            let name = c[1].to_ascii_lowercase();
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| decode_entities(m.as_str()))
                .unwrap_or_default();
            (name, value)
        })
        .collect();

    Some(SingleElement {
        tag,
        attributes,
        content,
    })
}

/// True when no `</tag>` in `content` closes the outer element early
fn balanced(content: &str, tag: &str) -> bool {
    let lower = content.to_ascii_lowercase();
    let tag = tag.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut depth = 0i32;
    let mut i = 0usize;

    while let Some(pos) = lower[i..].find('<') {
        let at = i + pos;
        let (closing, name_at) = if bytes.get(at + 1) == Some(&b'/') {
            (true, at + 2)
        } else {
            (false, at + 1)
        };
        let boundary = bytes
            .get(name_at + tag.len())
            .map_or(true, |b| !b.is_ascii_alphanumeric());
        if lower[name_at..].starts_with(&tag) && boundary {
            depth += if closing { -1 } else { 1 };
            if depth < 0 {
                return false;
            }
        }
        i = at + 1;
    }
    depth == 0
}

/// Build `markup` into a detached staging container of tag `tag`
///
/// A single-element payload becomes that element, attributes set from its
/// start tag. Other markup that starts with a tag is parsed as is, so each
/// top-level node stays separate. Plain text is wrapped in a `tag` element.
pub fn stage<H: Host>(host: &mut H, markup: &str, tag: &str) -> Result<H::Node> {
    let staging = host.create_element(tag)?;

    if let Some(single) = split_single_element(markup) {
        let element = host.create_element(single.tag)?;
        for (name, value) in &single.attributes {
            host.set_attribute(element, name, value)?;
        }
        host.set_inner_markup(element, single.content)?;
        host.insert_before(staging, element, None)?;
    } else if LEADING_TAG.is_match(markup.trim_start()) {
        host.set_inner_markup(staging, markup)?;
    } else {
        let element = host.create_element(tag)?;
        host.set_inner_markup(element, markup)?;
        host.insert_before(staging, element, None)?;
    }

    Ok(staging)
}

/// Move every child of `staging` to `parent`, before `reference`
///
/// Returns the moved nodes in order. `staging` is left empty and detached.
pub fn unwrap<H: Host>(
    host: &mut H,
    staging: H::Node,
    parent: H::Node,
    reference: Option<H::Node>,
) -> Result<Vec<H::Node>> {
    let children = host.children(staging)?;
    for &child in &children {
        host.insert_before(parent, child, reference)?;
    }
    Ok(children)
}

/// Whether `node` is a text node holding only whitespace
pub fn is_blank_text<H: Host>(host: &H, node: H::Node) -> Result<bool> {
    if host.node_type(node)? != NodeType::Text {
        return Ok(false);
    }
    Ok(host
        .text(node)?
        .is_some_and(|text| text.chars().all(char::is_whitespace)))
}
