//! Markup fragment parser
//!
//! A small, forgiving tokenizer that builds nodes straight into the arena.
//! It is not an HTML5 tree builder: there is no implied-tag insertion and no
//! adoption agency. What it does guarantee:
//!
//! - start tags, end tags, void and self-closing elements
//! - quoted, unquoted and valueless attributes
//! - raw text for `script` / `style`
//! - comments kept as comment nodes, doctypes skipped
//! - stray end tags ignored, unclosed elements closed at end of input
//! - a `<` that cannot start markup is plain text

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{is_raw_text_element, is_void_element, NodeId};

/// Parse `markup` and append the resulting nodes under `parent`
///
/// Returns the top-level nodes created, in order.
pub fn parse_into(arena: &mut DomArena, parent: NodeId, markup: &str) -> Result<Vec<NodeId>> {
    let bytes = markup.as_bytes();
    let mut stack = vec![parent];
    let mut top_level = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            let end = find_subslice(bytes, i + 4, b"-->")
                .ok_or_else(|| DomError::Markup("unclosed comment".into()))?;
            let comment = arena.create_comment(&markup[i + 4..end]);
            attach(arena, &stack, &mut top_level, comment)?;
            i = end + 3;
            continue;
        }

        if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
            // Doctype or processing instruction
            let end = find_byte(bytes, i, b'>')
                .ok_or_else(|| DomError::Markup("unclosed declaration".into()))?;
            i = end + 1;
            continue;
        }

        if starts_with_at(bytes, i, b"</") && bytes.get(i + 2).is_some_and(|b| b.is_ascii_alphabetic()) {
            let (tag, next) = parse_end_tag(markup, i)?;
            i = next;

            // Pop to the matching open element; ignore stray end tags
            if let Some(pos) = stack
                .iter()
                .skip(1)
                .rposition(|&id| arena.get(id).map(|n| n.node_name == tag).unwrap_or(false))
            {
                stack.truncate(pos + 1);
            }
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_alphabetic()) {
            let start = parse_start_tag(markup, i)?;
            i = start.next;

            let element = arena.create_element(&start.tag);
            {
                let node = arena.get_mut(element)?;
                for (name, value) in &start.attrs {
                    node.set_attr(name, value);
                }
            }
            attach(arena, &stack, &mut top_level, element)?;

            if is_raw_text_element(&start.tag) && !start.self_closing {
                let close = find_end_tag_ci(bytes, i, start.tag.as_bytes())
                    .ok_or_else(|| DomError::Markup(format!("unclosed <{}>", start.tag)))?;
                if close > i {
                    let text = arena.create_text(&markup[i..close]);
                    arena.append_child(element, text)?;
                }
                let (_, after) = parse_end_tag(markup, close)?;
                i = after;
                continue;
            }

            if !start.self_closing && !is_void_element(&start.tag) {
                stack.push(element);
            }
            continue;
        }

        // Text run up to the next markup-starting '<'
        let text_start = i;
        i += 1;
        while i < bytes.len() && !starts_markup(bytes, i) {
            i += 1;
        }
        let text = arena.create_text(&decode_entities(&markup[text_start..i]));
        attach(arena, &stack, &mut top_level, text)?;
    }

    Ok(top_level)
}

fn attach(
    arena: &mut DomArena,
    stack: &[NodeId],
    top_level: &mut Vec<NodeId>,
    node: NodeId,
) -> Result<()> {
    let parent = *stack
        .last()
        .ok_or_else(|| DomError::Markup("missing parent element".into()))?;
    arena.append_child(parent, node)?;
    if stack.len() == 1 {
        top_level.push(node);
    }
    Ok(())
}

struct StartTag {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    next: usize,
}

fn parse_start_tag(markup: &str, at: usize) -> Result<StartTag> {
    let bytes = markup.as_bytes();
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = markup[tag_start..i].to_ascii_lowercase();

    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(DomError::Markup(format!("unclosed start tag <{tag}")));
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' {
            if bytes.get(i + 1) == Some(&b'>') {
                self_closing = true;
                i += 2;
                break;
            }
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            return Err(DomError::Markup(format!("invalid attribute in <{tag}>")));
        }
        let name = markup[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(markup, &mut i)?
        } else {
            String::new()
        };

        attrs.push((name, value));
    }

    Ok(StartTag {
        tag,
        attrs,
        self_closing,
        next: i,
    })
}

fn parse_end_tag(markup: &str, at: usize) -> Result<(String, usize)> {
    let bytes = markup.as_bytes();
    let mut i = at + 2;

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = markup[tag_start..i].to_ascii_lowercase();

    let end = find_byte(bytes, i, b'>')
        .ok_or_else(|| DomError::Markup(format!("unclosed end tag </{tag}")))?;
    Ok((tag, end + 1))
}

fn parse_attr_value(markup: &str, i: &mut usize) -> Result<String> {
    let bytes = markup.as_bytes();
    if *i >= bytes.len() {
        return Err(DomError::Markup("missing attribute value".into()));
    }

    if bytes[*i] == b'"' || bytes[*i] == b'\'' {
        let quote = bytes[*i];
        let start = *i + 1;
        let end = find_byte(bytes, start, quote)
            .ok_or_else(|| DomError::Markup("unclosed quoted attribute value".into()))?;
        *i = end + 1;
        return Ok(decode_entities(&markup[start..end]));
    }

    let start = *i;
    while *i < bytes.len()
        && !bytes[*i].is_ascii_whitespace()
        && bytes[*i] != b'>'
        && !(bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>'))
    {
        *i += 1;
    }
    Ok(decode_entities(&markup[start..*i]))
}

/// Decode the handful of character references markup fragments use
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((ch, semi)) => {
                out.push(ch);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn starts_markup(bytes: &[u8], i: usize) -> bool {
    if bytes[i] != b'<' {
        return false;
    }
    match bytes.get(i + 1) {
        Some(b'!') | Some(b'?') => true,
        Some(b'/') => bytes.get(i + 2).is_some_and(|b| b.is_ascii_alphabetic()),
        Some(b) => b.is_ascii_alphabetic(),
        None => false,
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b':' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.get(at..at + needle.len()) == Some(needle)
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes.get(from..)?.iter().position(|b| *b == needle).map(|p| p + from)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Position of `</tag` (ASCII case-insensitive) at or after `from`
fn find_end_tag_ci(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut i = from;
    while let Some(pos) = find_subslice(bytes, i, b"</") {
        let name = bytes.get(pos + 2..pos + 2 + tag.len())?;
        let boundary = bytes
            .get(pos + 2 + tag.len())
            .map_or(true, |b| !is_tag_char(*b));
        if name.eq_ignore_ascii_case(tag) && boundary {
            return Some(pos);
        }
        i = pos + 2;
    }
    None
}
