use crate::parsing::{DocTree, NodeId};
use crate::types::{Measure, Unit};

/// Extract unit declarations: a single measure, or a numerator/denominator
/// pair for divide units.
pub fn extract_units(tree: &DocTree) -> Vec<Unit> {
    tree.by_local_name("unit")
        .filter_map(|node| parse_unit(tree, node))
        .collect()
}

fn parse_unit(tree: &DocTree, node: NodeId) -> Option<Unit> {
    let id = tree.attr(node, "id")?.to_string();

    if let Some(divide) = tree.first_descendant_named(node, "divide") {
        let numerator = measure_under(tree, divide, "unitnumerator")?;
        let denominator = measure_under(tree, divide, "unitdenominator")?;
        return Some(Unit {
            id,
            measure: Measure::Ratio {
                numerator,
                denominator,
            },
        });
    }

    let measure = tree
        .first_descendant_named(node, "measure")
        .map(|m| tree.get(m).text.trim().to_string())
        .filter(|m| !m.is_empty())?;
    Some(Unit {
        id,
        measure: Measure::Single(measure),
    })
}

fn measure_under(tree: &DocTree, node: NodeId, part: &str) -> Option<String> {
    let part_node = tree.first_descendant_named(node, part)?;
    tree.first_descendant_named(part_node, "measure")
        .map(|m| tree.get(m).text.trim().to_string())
        .filter(|m| !m.is_empty())
}
