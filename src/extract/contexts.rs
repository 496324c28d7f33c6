use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::parsing::tree::split_qname;
use crate::parsing::{DocTree, NodeId};
use crate::types::{Diagnostic, DiagnosticKind, Dimension, Period};

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// A context as found in the document, before synthesis. `period` is `None`
/// when no period could be associated with the id.
#[derive(Clone, Debug)]
pub struct RawContext {
    pub id: String,
    pub node: NodeId,
    pub period: Option<Period>,
    pub dimensions: Vec<Dimension>,
}

/// A named pure query over the tree. Strategies are evaluated in the order
/// the FormatProfile declares, escalating on zero results.
pub struct Strategy {
    pub name: &'static str,
    pub run: fn(&DocTree) -> Vec<RawContext>,
}

pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "declared-elements",
        run: declared_elements,
    },
    Strategy {
        name: "local-name-scan",
        run: local_name_scan,
    },
    Strategy {
        name: "period-proximity",
        run: period_proximity,
    },
];

pub fn default_strategy_order() -> Vec<String> {
    STRATEGIES.iter().map(|s| s.name.to_string()).collect()
}

/// Run the strategy cascade, recording an escalation diagnostic whenever a
/// strategy comes up empty and the next one is consulted.
pub fn locate(
    tree: &DocTree,
    order: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<RawContext> {
    let ordered = order
        .iter()
        .filter_map(|name| STRATEGIES.iter().find(|s| s.name == name.as_str()))
        .chain(
            STRATEGIES
                .iter()
                .filter(|s| !order.iter().any(|name| name.as_str() == s.name)),
        );

    for (i, strategy) in ordered.enumerate() {
        let found = (strategy.run)(tree);
        if !found.is_empty() {
            if i > 0 {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::StrategyEscalation,
                    format!("contexts located by fallback strategy {}", strategy.name),
                ));
            }
            log::debug!("strategy {} found {} contexts", strategy.name, found.len());
            return found;
        }
    }

    Vec::new()
}

fn declared_elements(tree: &DocTree) -> Vec<RawContext> {
    tree.by_local_name("context")
        .filter_map(|node| parse_context(tree, node))
        .collect()
}

fn local_name_scan(tree: &DocTree) -> Vec<RawContext> {
    tree.descendants()
        .filter(|id| {
            tree.get(*id)
                .local
                .to_ascii_lowercase()
                .ends_with("context")
        })
        .filter_map(|node| parse_context(tree, node))
        .collect()
}

/// Pair period markers with the nearest enclosing element that exposes an
/// identifier. Last resort for documents that declare no context elements
/// at all.
fn period_proximity(tree: &DocTree) -> Vec<RawContext> {
    let mut grouped: BTreeMap<String, (NodeId, Vec<(String, String)>)> = BTreeMap::new();

    for id in tree.descendants() {
        let node = tree.get(id);
        let marker = node.local.to_ascii_lowercase();
        let is_period_marker = matches!(marker.as_str(), "instant" | "startdate" | "enddate");
        let date_text = node.text.trim().to_string();
        if !is_period_marker && !DATE_RE.is_match(&date_text) {
            continue;
        }
        if date_text.is_empty() {
            continue;
        }
        let Some((owner, owner_id)) = nearest_identified_ancestor(tree, id) else {
            continue;
        };
        grouped
            .entry(owner_id)
            .or_insert_with(|| (owner, Vec::new()))
            .1
            .push((marker, date_text));
    }

    grouped
        .into_iter()
        .filter_map(|(id, (node, markers))| {
            let period = classify_markers(&markers)?;
            Some(RawContext {
                id,
                node,
                period: Some(period),
                dimensions: Vec::new(),
            })
        })
        .collect()
}

fn nearest_identified_ancestor(tree: &DocTree, id: NodeId) -> Option<(NodeId, String)> {
    let mut current = Some(id);
    while let Some(node) = current {
        if let Some(ident) = tree.attr(node, "id") {
            return Some((node, ident.to_string()));
        }
        current = tree.parent(node);
    }
    None
}

fn classify_markers(markers: &[(String, String)]) -> Option<Period> {
    let find = |name: &str| {
        markers
            .iter()
            .find(|(m, _)| m == name)
            .map(|(_, v)| v.clone())
    };

    if let Some(date) = find("instant") {
        return Some(Period::Instant { date });
    }
    match (find("startdate"), find("enddate")) {
        (Some(start), Some(end)) => return Some(Period::Duration { start, end }),
        (Some(d), None) | (None, Some(d)) => {
            return Some(Period::Duration {
                start: d.clone(),
                end: d,
            })
        }
        (None, None) => {}
    }

    // Bare date text: one date is an instant, several span a duration
    let mut dates: Vec<&String> = markers.iter().map(|(_, v)| v).collect();
    dates.sort();
    match dates.as_slice() {
        [] => None,
        [only] => Some(Period::Instant {
            date: (*only).clone(),
        }),
        [first, .., last] => Some(Period::Duration {
            start: (*first).clone(),
            end: (*last).clone(),
        }),
    }
}

/// Classify a declared context element as instant or duration by sub-element
/// presence and collect its explicit dimensional members.
fn parse_context(tree: &DocTree, node: NodeId) -> Option<RawContext> {
    let id = tree.attr(node, "id")?.to_string();

    let period = tree
        .first_descendant_named(node, "period")
        .and_then(|p| classify_period(tree, p));

    let mut dimensions = Vec::new();
    for member in tree.descendants_of(node) {
        if !tree.get(member).local.eq_ignore_ascii_case("explicitmember") {
            continue;
        }
        let Some(axis) = tree.attr(member, "dimension") else {
            continue;
        };
        let member_text = tree.get(member).text.trim().to_string();
        if member_text.is_empty() {
            continue;
        }
        let (axis_prefix, axis_name) = split_qname(axis);
        let (member_prefix, member_name) = split_qname(&member_text);
        dimensions.push(Dimension {
            axis_prefix,
            axis_name,
            member_prefix,
            member_name,
        });
    }

    Some(RawContext {
        id,
        node,
        period,
        dimensions,
    })
}

fn classify_period(tree: &DocTree, period: NodeId) -> Option<Period> {
    if let Some(instant) = tree.first_descendant_named(period, "instant") {
        let date = tree.get(instant).text.trim().to_string();
        if !date.is_empty() {
            return Some(Period::Instant { date });
        }
    }

    let start = tree
        .first_descendant_named(period, "startdate")
        .map(|n| tree.get(n).text.trim().to_string())
        .filter(|t| !t.is_empty());
    let end = tree
        .first_descendant_named(period, "enddate")
        .map(|n| tree.get(n).text.trim().to_string())
        .filter(|t| !t.is_empty());

    match (start, end) {
        (Some(start), Some(end)) => Some(Period::Duration { start, end }),
        (Some(d), None) | (None, Some(d)) => Some(Period::Duration {
            start: d.clone(),
            end: d,
        }),
        (None, None) => None,
    }
}
