//! Selector matching
//!
//! `SelectorMatcher` is the seam: the arena holds a boxed matcher and any
//! host can swap in a full CSS engine. `SimpleMatcher` is the built-in one,
//! covering the selectors collections are usually queried with:
//!
//! - type, universal, `#id`, `.class`
//! - `[attr]`, `[attr=v]`, `^=`, `$=`, `*=`, `~=`, `|=`
//! - descendant, `>`, `+`, `~` combinators and `,` groups
//! - `:first-child`, `:last-child`, `:only-child`, `:empty`, `:not(...)`
//!
//! Matching is right-to-left against the whole tree; results are the
//! descendants of the context node, in document order.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};

/// Pluggable selector engine
pub trait SelectorMatcher {
    /// All descendants of `context` matching `pattern`, in document order
    fn query_all(&self, arena: &DomArena, context: NodeId, pattern: &str) -> Result<Vec<NodeId>>;
}

/// Built-in matcher for the common selector subset
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleMatcher;

impl SelectorMatcher for SimpleMatcher {
    fn query_all(&self, arena: &DomArena, context: NodeId, pattern: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(pattern)?;
        arena.find(context, |node| {
            groups
                .iter()
                .any(|chain| matches_chain(arena, node, chain))
        })
    }
}

/// Does `node` match `pattern`?
pub fn matches(arena: &DomArena, node: NodeId, pattern: &str) -> Result<bool> {
    let groups = parse_selector_groups(pattern)?;
    let node = arena.get(node)?;
    Ok(groups.iter().any(|chain| matches_chain(arena, node, chain)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists(String),
    Eq(String, String),
    StartsWith(String, String),
    EndsWith(String, String),
    Contains(String, String),
    Includes(String, String),
    DashMatch(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoClass {
    FirstChild,
    LastChild,
    OnlyChild,
    Empty,
    Not(Vec<Vec<SelectorPart>>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SelectorStep {
    tag: Option<String>,
    universal: bool,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
    pseudo_classes: Vec<PseudoClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    AdjacentSibling,
    GeneralSibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelectorPart {
    step: SelectorStep,
    // Relation to previous (left) selector part
    combinator: Option<Combinator>,
}

fn invalid(selector: &str) -> DomError {
    DomError::InvalidSelector(selector.to_string())
}

fn parse_selector_groups(selector: &str) -> Result<Vec<Vec<SelectorPart>>> {
    split_top_level(selector, |ch| ch == ',')?
        .iter()
        .map(|group| parse_selector_chain(group))
        .collect()
}

/// Split on a delimiter outside brackets and parentheses
fn split_top_level(selector: &str, is_delim: impl Fn(char) -> bool) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut paren_depth = 0usize;

    for ch in selector.chars() {
        match ch {
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.checked_sub(1).ok_or_else(|| invalid(selector))?,
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.checked_sub(1).ok_or_else(|| invalid(selector))?,
            _ => {}
        }
        if bracket_depth == 0 && paren_depth == 0 && is_delim(ch) {
            let trimmed = current.trim();
            if trimmed.is_empty() {
                return Err(invalid(selector));
            }
            parts.push(trimmed.to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }

    if bracket_depth != 0 || paren_depth != 0 {
        return Err(invalid(selector));
    }
    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(invalid(selector));
    }
    parts.push(trimmed.to_string());
    Ok(parts)
}

fn tokenize_selector(selector: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.trim().is_empty() {
            tokens.push(current.trim().to_string());
        }
        current.clear();
    };

    for ch in selector.chars() {
        match ch {
            '[' | '(' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| invalid(selector))?;
                current.push(ch);
            }
            '>' | '+' | '~' if depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            ch if ch.is_whitespace() && depth == 0 => flush(&mut current, &mut tokens),
            _ => current.push(ch),
        }
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_selector_chain(selector: &str) -> Result<Vec<SelectorPart>> {
    let tokens = tokenize_selector(selector)?;
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokens {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::AdjacentSibling),
            "~" => Some(Combinator::GeneralSibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || parts.is_empty() {
                return Err(invalid(selector));
            }
            pending = Some(combinator);
            continue;
        }

        let step = parse_selector_step(&token)?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(SelectorPart { step, combinator });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(invalid(selector));
    }
    Ok(parts)
}

fn parse_selector_step(part: &str) -> Result<SelectorStep> {
    let mut step = SelectorStep::default();
    let mut rest = part;

    while let Some(ch) = rest.chars().next() {
        match ch {
            '*' => {
                if step.universal || step.tag.is_some() {
                    return Err(invalid(part));
                }
                step.universal = true;
                rest = &rest[1..];
            }
            '#' => {
                let (id, next) = take_ident(&rest[1..]).ok_or_else(|| invalid(part))?;
                if step.id.replace(id).is_some() {
                    return Err(invalid(part));
                }
                rest = next;
            }
            '.' => {
                let (class, next) = take_ident(&rest[1..]).ok_or_else(|| invalid(part))?;
                step.classes.push(class);
                rest = next;
            }
            '[' => {
                let end = rest.find(']').ok_or_else(|| invalid(part))?;
                step.attrs.push(parse_attr_condition(&rest[1..end]).ok_or_else(|| invalid(part))?);
                rest = &rest[end + 1..];
            }
            ':' => {
                let (pseudo, next) = parse_pseudo(&rest[1..]).ok_or_else(|| invalid(part))?;
                step.pseudo_classes.push(pseudo);
                rest = next;
            }
            _ => {
                if step.tag.is_some()
                    || step.universal
                    || step.id.is_some()
                    || !step.classes.is_empty()
                    || !step.attrs.is_empty()
                {
                    return Err(invalid(part));
                }
                let (tag, next) = take_ident(rest).ok_or_else(|| invalid(part))?;
                step.tag = Some(tag.to_ascii_lowercase());
                rest = next;
            }
        }
    }

    Ok(step)
}

fn take_ident(src: &str) -> Option<(String, &str)> {
    let end = src
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '-' || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(src.len());
    if end == 0 {
        return None;
    }
    Some((src[..end].to_string(), &src[end..]))
}

fn parse_attr_condition(body: &str) -> Option<AttrCondition> {
    let body = body.trim();
    let Some(eq) = body.find('=') else {
        return take_ident(body)
            .filter(|(_, rest)| rest.is_empty())
            .map(|(name, _)| AttrCondition::Exists(name));
    };

    let (lhs, value) = (&body[..eq], body[eq + 1..].trim());
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
        .to_string();

    let (name, op) = match lhs.trim_end().char_indices().last() {
        Some((i, op @ ('^' | '$' | '*' | '~' | '|'))) => (lhs[..i].trim(), Some(op)),
        _ => (lhs.trim(), None),
    };
    if name.is_empty() {
        return None;
    }
    let name = name.to_string();

    Some(match op {
        None => AttrCondition::Eq(name, value),
        Some('^') => AttrCondition::StartsWith(name, value),
        Some('$') => AttrCondition::EndsWith(name, value),
        Some('*') => AttrCondition::Contains(name, value),
        Some('~') => AttrCondition::Includes(name, value),
        Some(_) => AttrCondition::DashMatch(name, value),
    })
}

fn parse_pseudo(src: &str) -> Option<(PseudoClass, &str)> {
    let (name, rest) = take_ident(src)?;
    let simple = match name.to_ascii_lowercase().as_str() {
        "first-child" => Some(PseudoClass::FirstChild),
        "last-child" => Some(PseudoClass::LastChild),
        "only-child" => Some(PseudoClass::OnlyChild),
        "empty" => Some(PseudoClass::Empty),
        "not" => None,
        _ => return None,
    };
    if let Some(pseudo) = simple {
        return Some((pseudo, rest));
    }

    let inner = rest.strip_prefix('(')?;
    let close = find_matching_paren(inner)?;
    let groups = parse_selector_groups(&inner[..close]).ok()?;
    Some((PseudoClass::Not(groups), &inner[close + 1..]))
}

fn find_matching_paren(src: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, ch) in src.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

fn matches_chain(arena: &DomArena, node: &DomNode, parts: &[SelectorPart]) -> bool {
    let Some((last, rest)) = parts.split_last() else {
        return false;
    };
    if !matches_step(arena, node, &last.step) {
        return false;
    }
    if rest.is_empty() {
        return true;
    }

    match last.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Descendant => {
            let mut current = parent_element(arena, node);
            while let Some(ancestor) = current {
                if matches_chain(arena, ancestor, rest) {
                    return true;
                }
                current = parent_element(arena, ancestor);
            }
            false
        }
        Combinator::Child => {
            parent_element(arena, node).is_some_and(|parent| matches_chain(arena, parent, rest))
        }
        Combinator::AdjacentSibling => previous_element_sibling(arena, node)
            .is_some_and(|sibling| matches_chain(arena, sibling, rest)),
        Combinator::GeneralSibling => {
            let mut current = previous_element_sibling(arena, node);
            while let Some(sibling) = current {
                if matches_chain(arena, sibling, rest) {
                    return true;
                }
                current = previous_element_sibling(arena, sibling);
            }
            false
        }
    }
}

fn matches_step(arena: &DomArena, node: &DomNode, step: &SelectorStep) -> bool {
    if node.node_type != NodeType::Element {
        return false;
    }
    if let Some(tag) = &step.tag {
        if !node.node_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if node.attr("id") != Some(id.as_str()) {
            return false;
        }
    }
    if !step
        .classes
        .iter()
        .all(|class| node.classes().any(|c| c == class))
    {
        return false;
    }
    if !step.attrs.iter().all(|cond| matches_attr(node, cond)) {
        return false;
    }
    step.pseudo_classes
        .iter()
        .all(|pseudo| matches_pseudo(arena, node, pseudo))
}

fn matches_attr(node: &DomNode, cond: &AttrCondition) -> bool {
    match cond {
        AttrCondition::Exists(name) => node.attr(name).is_some(),
        AttrCondition::Eq(name, v) => node.attr(name) == Some(v.as_str()),
        AttrCondition::StartsWith(name, v) => {
            !v.is_empty() && node.attr(name).is_some_and(|a| a.starts_with(v.as_str()))
        }
        AttrCondition::EndsWith(name, v) => {
            !v.is_empty() && node.attr(name).is_some_and(|a| a.ends_with(v.as_str()))
        }
        AttrCondition::Contains(name, v) => {
            !v.is_empty() && node.attr(name).is_some_and(|a| a.contains(v.as_str()))
        }
        AttrCondition::Includes(name, v) => node
            .attr(name)
            .is_some_and(|a| a.split_ascii_whitespace().any(|t| t == v)),
        AttrCondition::DashMatch(name, v) => node.attr(name).is_some_and(|a| {
            a == v || a.strip_prefix(v.as_str()).is_some_and(|r| r.starts_with('-'))
        }),
    }
}

fn matches_pseudo(arena: &DomArena, node: &DomNode, pseudo: &PseudoClass) -> bool {
    match pseudo {
        PseudoClass::FirstChild => previous_element_sibling(arena, node).is_none(),
        PseudoClass::LastChild => next_element_sibling(arena, node).is_none(),
        PseudoClass::OnlyChild => {
            previous_element_sibling(arena, node).is_none()
                && next_element_sibling(arena, node).is_none()
        }
        PseudoClass::Empty => node.children_ids.iter().all(|&id| {
            arena
                .get(id)
                .map(|child| child.node_type == NodeType::Comment)
                .unwrap_or(true)
        }),
        PseudoClass::Not(groups) => !groups.iter().any(|chain| matches_chain(arena, node, chain)),
    }
}

fn parent_element<'a>(arena: &'a DomArena, node: &DomNode) -> Option<&'a DomNode> {
    node.parent_id
        .and_then(|id| arena.get(id).ok())
        .filter(|parent| parent.is_element())
}

fn previous_element_sibling<'a>(arena: &'a DomArena, node: &DomNode) -> Option<&'a DomNode> {
    let mut current = arena.previous_sibling(node.node_id);
    while let Some(id) = current {
        let sibling = arena.get(id).ok()?;
        if sibling.is_element() {
            return Some(sibling);
        }
        current = arena.previous_sibling(id);
    }
    None
}

fn next_element_sibling<'a>(arena: &'a DomArena, node: &DomNode) -> Option<&'a DomNode> {
    let mut current = arena.next_sibling(node.node_id);
    while let Some(id) = current {
        let sibling = arena.get(id).ok()?;
        if sibling.is_element() {
            return Some(sibling);
        }
        current = arena.next_sibling(id);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> DomArena {
        DomArena::from_markup(concat!(
            r#"<div id="main" class="box wide">"#,
            r#"<ul><li class="x">a</li><li>b</li><li class="x y" data-k="en-US">c</li></ul>"#,
            r#"<p lang="en">para</p><span></span>"#,
            r#"</div><p>outside</p>"#,
        ))
        .unwrap()
    }

    fn names(arena: &DomArena, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| {
                let node = arena.get(id).unwrap();
                let text = node
                    .children_ids
                    .first()
                    .map(|&c| arena.get(c).unwrap().node_value.clone())
                    .unwrap_or_default();
                format!("{}:{}", node.node_name, text)
            })
            .collect()
    }

    fn query(arena: &DomArena, pattern: &str) -> Vec<String> {
        let ids = SimpleMatcher.query_all(arena, arena.root_id(), pattern).unwrap();
        names(arena, &ids)
    }

    #[test]
    fn test_simple_selectors() {
        let arena = fixture();
        assert_eq!(query(&arena, "li.x"), vec!["li:a", "li:c"]);
        assert_eq!(query(&arena, ".x.y"), vec!["li:c"]);
        assert_eq!(query(&arena, "#main > p"), vec!["p:para"]);
        assert_eq!(query(&arena, "p"), vec!["p:para", "p:outside"]);
        assert_eq!(query(&arena, "div p, span"), vec!["p:para", "span:"]);
    }

    #[test]
    fn test_attribute_selectors() {
        let arena = fixture();
        assert_eq!(query(&arena, "[data-k]"), vec!["li:c"]);
        assert_eq!(query(&arena, "[data-k|=en]"), vec!["li:c"]);
        assert_eq!(query(&arena, r#"[lang="en"]"#), vec!["p:para"]);
        assert_eq!(query(&arena, "[class~=y]"), vec!["li:c"]);
        assert_eq!(query(&arena, "[class^=bo]").len(), 1);
    }

    #[test]
    fn test_combinators_and_pseudo() {
        let arena = fixture();
        assert_eq!(query(&arena, "li + li"), vec!["li:b", "li:c"]);
        assert_eq!(query(&arena, "ul ~ span"), vec!["span:"]);
        assert_eq!(query(&arena, "li:first-child"), vec!["li:a"]);
        assert_eq!(query(&arena, "li:last-child"), vec!["li:c"]);
        assert_eq!(query(&arena, "li:not(.x)"), vec!["li:b"]);
        assert_eq!(query(&arena, "span:empty"), vec!["span:"]);
    }

    #[test]
    fn test_scoped_to_context() {
        let arena = fixture();
        let main = arena.find_by_id(arena.root_id(), "main").unwrap().unwrap();
        let found = SimpleMatcher.query_all(&arena, main, "p").unwrap();
        assert_eq!(names(&arena, &found), vec!["p:para"]);

        // Ancestors outside the context still take part in matching
        let ul = arena.find_by_tag(main, "ul").unwrap()[0];
        assert_eq!(SimpleMatcher.query_all(&arena, ul, "div li").unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_selectors() {
        let arena = fixture();
        for bad in ["", "a,", "> a", "a >", "[x", "a:hover", "p#a#b"] {
            assert!(
                matches!(
                    SimpleMatcher.query_all(&arena, arena.root_id(), bad),
                    Err(DomError::InvalidSelector(_))
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_matches() {
        let arena = fixture();
        let main = arena.find_by_id(arena.root_id(), "main").unwrap().unwrap();
        assert!(matches(&arena, main, "div.box").unwrap());
        assert!(!matches(&arena, main, "div.narrow").unwrap());
    }
}
