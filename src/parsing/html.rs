use scraper::Html;

use super::tree::{attr_key, split_qname, DocTree, NodeId};

/// Parse lenient markup. html5ever absorbs unclosed tags, mismatched
/// nesting and encoding artifacts, so this path never fails. Namespace
/// prefixes survive inside the local name (`ix:nonfraction`) and are split
/// off here.
pub fn parse_inline(text: &str) -> DocTree {
    let document = Html::parse_document(text);
    let mut tree = DocTree::new();
    let root = tree.root();
    for child in document.tree.root().children() {
        convert_node(child, &mut tree, root);
    }
    tree
}

fn convert_node(
    node: ego_tree::NodeRef<'_, scraper::Node>,
    tree: &mut DocTree,
    parent: NodeId,
) {
    match node.value() {
        scraper::Node::Element(el) => {
            let (prefix, local) = split_qname(&el.name.local);
            let attrs = el
                .attrs()
                .map(|(k, v)| (attr_key(k), v.to_string()))
                .collect();
            let id = tree.add_element(parent, &prefix, &local, attrs);
            for child in node.children() {
                convert_node(child, tree, id);
            }
        }
        scraper::Node::Text(t) => {
            tree.append_text(parent, &t.text);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_inline_annotations() {
        let html = r#"<html><body>
            <ix:nonFraction name="us-gaap:Revenues" contextRef="c1" unitRef="usd">118,209</ix:nonFraction>
        </body></html>"#;

        let tree = parse_inline(html);
        let facts: Vec<_> = tree.by_local_name("nonfraction").collect();
        assert_eq!(facts.len(), 1);
        assert_eq!(tree.get(facts[0]).prefix, "ix");
        assert_eq!(tree.attr(facts[0], "contextRef"), Some("c1"));
        assert_eq!(tree.attr(facts[0], "name"), Some("us-gaap:Revenues"));
        assert_eq!(tree.get(facts[0]).text, "118,209");
    }

    #[test]
    fn test_tolerates_unclosed_tags() {
        let html = "<html><body><div>Total assets <span>$95,281<div>next";
        let tree = parse_inline(html);
        assert!(tree.element_count() > 0);
        let spans: Vec<_> = tree.by_local_name("span").collect();
        assert_eq!(tree.get(spans[0]).text, "$95,281");
    }
}
