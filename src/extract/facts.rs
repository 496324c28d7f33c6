use std::collections::HashMap;

use crate::normalize;
use crate::parsing::tree::split_qname;
use crate::parsing::{DocTree, NodeId};
use crate::types::{Diagnostic, DiagnosticKind, Fact};

// Declaration elements that carry attributes but are never facts
const NON_FACT_LOCALS: &[&str] = &["context", "unit", "xbrl", "schemaref"];

// Markup scaffolding that never carries a disclosed value
const SCAFFOLD_LOCALS: &[&str] = &[
    "html", "head", "body", "title", "script", "style", "meta", "link", "br", "hr",
];

/// Walk every element carrying a context-reference attribute into a Fact.
/// Inline annotations name their concept in a `name` attribute; instance
/// elements are the concept themselves.
pub fn explicit_facts(
    tree: &DocTree,
    units: &HashMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Fact> {
    let mut facts = Vec::new();

    for id in tree.descendants() {
        let Some(context_ref) = tree.attr(id, "contextref") else {
            continue;
        };
        let node = tree.get(id);
        if NON_FACT_LOCALS.contains(&node.local.to_ascii_lowercase().as_str()) {
            continue;
        }

        let (prefix, name) = concept_of(tree, id);
        let value = tree.subtree_text(id).trim().to_string();
        if value.is_empty() {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::SkippedElement,
                format!("empty value for {}:{}", prefix, name),
            ));
            continue;
        }

        let unit_ref = tree.attr(id, "unitref").map(str::to_string);
        let unit_display = unit_ref.as_deref().and_then(|u| units.get(u));
        let clean = normalize::clean_text(&value);

        facts.push(Fact {
            prefix,
            name,
            formatted_value: normalize::format_value(&clean, unit_display.map(String::as_str)),
            value,
            decimals: tree.attr(id, "decimals").map(str::to_string),
            context_ref: context_ref.to_string(),
            unit_ref,
            inferred: false,
        });
    }

    facts
}

fn concept_of(tree: &DocTree, id: NodeId) -> (String, String) {
    if let Some(name_attr) = tree.attr(id, "name") {
        if name_attr.contains(':') {
            return split_qname(name_attr);
        }
    }
    let node = tree.get(id);
    (node.prefix.clone(), node.local.clone())
}

/// Fallback for documents with no context-reference attributes at all:
/// every non-empty leaf element becomes a candidate fact, assigned to the
/// nearest preceding context in document order.
pub fn leaf_facts(
    tree: &DocTree,
    context_positions: &[(NodeId, String)],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Fact> {
    let mut facts = Vec::new();

    for id in tree.descendants() {
        if !tree.is_leaf_element(id) {
            continue;
        }
        let node = tree.get(id);
        let local = node.local.to_ascii_lowercase();
        if NON_FACT_LOCALS.contains(&local.as_str()) || SCAFFOLD_LOCALS.contains(&local.as_str()) {
            continue;
        }
        if tree.has_ancestor_named(id, "context") || tree.has_ancestor_named(id, "unit") {
            continue;
        }
        let value = node.text.trim().to_string();
        if value.is_empty() {
            continue;
        }

        let Some(context_ref) = proximate_context(context_positions, id) else {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::SkippedElement,
                format!("no context to assign leaf {} to", node.local),
            ));
            continue;
        };

        let clean = normalize::clean_text(&value);
        facts.push(Fact {
            prefix: node.prefix.clone(),
            name: node.local.clone(),
            formatted_value: normalize::format_value(&clean, None),
            value,
            decimals: None,
            context_ref,
            unit_ref: None,
            inferred: true,
        });
    }

    if !facts.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::InferredFacts,
            format!("{} facts inferred from leaf elements", facts.len()),
        ));
    }

    facts
}

/// The most contextually proximate context: the nearest one declared before
/// the element in document order, else the first declared.
fn proximate_context(context_positions: &[(NodeId, String)], id: NodeId) -> Option<String> {
    context_positions
        .iter()
        .rev()
        .find(|(node, _)| *node < id)
        .or_else(|| context_positions.first())
        .map(|(_, ctx_id)| ctx_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::{html, xml};

    #[test]
    fn test_explicit_facts_from_instance() {
        let tree = xml::parse_instance(
            r#"<xbrl xmlns="urn:x" xmlns:us-gaap="urn:gaap">
                <us-gaap:Assets contextRef="c1" unitRef="usd" decimals="-3">352583000</us-gaap:Assets>
            </xbrl>"#,
        )
        .unwrap();

        let units = HashMap::from([("usd".to_string(), "iso4217:USD".to_string())]);
        let mut diagnostics = Vec::new();
        let facts = explicit_facts(&tree, &units, &mut diagnostics);

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].prefix, "us-gaap");
        assert_eq!(facts[0].name, "Assets");
        assert_eq!(facts[0].value, "352583000");
        assert_eq!(facts[0].formatted_value, "$352,583,000");
        assert_eq!(facts[0].decimals.as_deref(), Some("-3"));
        assert!(!facts[0].inferred);
    }

    #[test]
    fn test_inline_concept_comes_from_name_attribute() {
        let tree = html::parse_inline(
            r#"<html><body>
                <ix:nonFraction name="us-gaap:Revenues" contextRef="c1">118,209</ix:nonFraction>
            </body></html>"#,
        );

        let mut diagnostics = Vec::new();
        let facts = explicit_facts(&tree, &HashMap::new(), &mut diagnostics);
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].prefix, "us-gaap");
        assert_eq!(facts[0].name, "Revenues");
        assert_eq!(facts[0].value, "118,209");
    }

    #[test]
    fn test_leaf_fallback_assigns_nearest_preceding_context() {
        let tree = html::parse_inline(
            r#"<html><body>
                <p>Revenue was <b>$5,000</b> in fiscal 2023</p>
            </body></html>"#,
        );

        let positions = vec![(0, "fy2023".to_string())];
        let mut diagnostics = Vec::new();
        let facts = leaf_facts(&tree, &positions, &mut diagnostics);

        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "$5,000");
        assert_eq!(facts[0].context_ref, "fy2023");
        assert!(facts[0].inferred);
    }
}
