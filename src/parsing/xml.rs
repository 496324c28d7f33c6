use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

use super::tree::{attr_key, split_qname, DocTree, NodeId};
use crate::error::ParseError;

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^&(?:#\d+|#x[0-9a-fA-F]+|[A-Za-z][A-Za-z0-9]*);").unwrap());

/// Parse a strict XBRL instance document. On failure, escape unescaped
/// entities and retry; on a second failure, return `MalformedDocument`
/// carrying the best-effort tree from the lenient event walk.
pub fn parse_instance(text: &str) -> Result<DocTree, ParseError> {
    match roxmltree::Document::parse(text) {
        Ok(doc) => Ok(from_roxmltree(&doc)),
        Err(first) => {
            log::debug!("strict XML parse failed ({}), repairing and retrying", first);
            let repaired = repair_markup(text);
            match roxmltree::Document::parse(&repaired) {
                Ok(doc) => Ok(from_roxmltree(&doc)),
                Err(second) => {
                    let recovered = recover_tree(&repaired);
                    let recovered = if recovered.element_count() > 0 {
                        Some(recovered)
                    } else {
                        None
                    };
                    Err(ParseError::MalformedDocument {
                        reason: second.to_string(),
                        recovered,
                    })
                }
            }
        }
    }
}

/// Escape stray ampersands that do not begin a valid entity reference and
/// drop control characters that are illegal in XML.
pub fn repair_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if ENTITY_RE.is_match(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = &tail[1..];
    }
    out.push_str(rest);

    out.chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}

fn from_roxmltree(doc: &roxmltree::Document) -> DocTree {
    let mut tree = DocTree::new();
    let root = tree.root();
    convert_node(doc.root_element(), &mut tree, root);
    tree
}

fn convert_node(node: roxmltree::Node, tree: &mut DocTree, parent: NodeId) {
    let ns = node.tag_name().namespace();
    let prefix = ns
        .and_then(|ns| node.lookup_prefix(ns))
        .unwrap_or("")
        .to_string();
    let attrs = node
        .attributes()
        .map(|a| (attr_key(a.name()), a.value().to_string()))
        .collect();

    let id = tree.add_element(parent, &prefix, node.tag_name().name(), attrs);
    for child in node.children() {
        if child.is_element() {
            convert_node(child, tree, id);
        } else if child.is_text() {
            if let Some(text) = child.text() {
                tree.append_text(id, text);
            }
        }
    }
}

/// Best-effort event walk over markup that roxmltree rejected. End-tag names
/// are not checked, so mismatched nesting degrades instead of failing.
fn recover_tree(text: &str) -> DocTree {
    let mut reader = Reader::from_str(text);
    reader.config_mut().check_end_names = false;

    let mut tree = DocTree::new();
    let mut stack: Vec<NodeId> = vec![tree.root()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let id = push_element(&mut tree, *stack.last().unwrap(), e);
                stack.push(id);
            }
            Ok(Event::Empty(ref e)) => {
                push_element(&mut tree, *stack.last().unwrap(), e);
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).into_owned());
                tree.append_text(*stack.last().unwrap(), &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(e.as_ref()).into_owned();
                tree.append_text(*stack.last().unwrap(), &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!("recovery walk stopped at {}: {}", reader.buffer_position(), e);
                break;
            }
            _ => (),
        }
    }

    tree
}

fn push_element(
    tree: &mut DocTree,
    parent: NodeId,
    e: &quick_xml::events::BytesStart,
) -> NodeId {
    let raw = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let (prefix, local) = split_qname(&raw);
    let attrs = e
        .attributes()
        .flatten()
        .map(|a| {
            let key = attr_key(&String::from_utf8_lossy(a.key.as_ref()));
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();
    tree.add_element(parent, &prefix, &local, attrs)
}
