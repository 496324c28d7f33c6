pub type NodeId = usize;

/// One element in the arena. Attribute names are stored lowercased with any
/// namespace prefix stripped, since observed documents bind prefixes
/// inconsistently to the same namespace.
#[derive(Debug, Clone, Default)]
pub struct DocNode {
    pub prefix: String,
    pub local: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// An owned navigable tree over a parsed document, shared by the strict-XML
/// and lenient-markup paths. Nodes are pushed in document order, so NodeId
/// order is document order.
#[derive(Debug, Clone)]
pub struct DocTree {
    nodes: Vec<DocNode>,
}

pub fn attr_key(raw: &str) -> String {
    raw.rsplit(':').next().unwrap_or(raw).to_ascii_lowercase()
}

pub fn split_qname(raw: &str) -> (String, String) {
    match raw.split_once(':') {
        Some((prefix, local)) => (prefix.to_string(), local.to_string()),
        None => (String::new(), raw.to_string()),
    }
}

impl Default for DocTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DocTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![DocNode {
                local: "#document".to_string(),
                ..Default::default()
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn get(&self, id: NodeId) -> &DocNode {
        &self.nodes[id]
    }

    pub fn add_element(
        &mut self,
        parent: NodeId,
        prefix: &str,
        local: &str,
        attrs: Vec<(String, String)>,
    ) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DocNode {
            prefix: prefix.to_string(),
            local: local.to_string(),
            attrs,
            text: String::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn append_text(&mut self, id: NodeId, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let node = &mut self.nodes[id];
        if !node.text.is_empty() {
            node.text.push(' ');
        }
        node.text.push_str(text.trim());
    }

    /// Element count excluding the synthetic document root.
    pub fn element_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// All elements in document order, excluding the root.
    pub fn descendants(&self) -> impl Iterator<Item = NodeId> {
        1..self.nodes.len()
    }

    pub fn descendants_of(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            for child in self.nodes[next].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    /// Lookup by local name only, ignoring namespace prefix and case.
    pub fn by_local_name<'a>(&'a self, local: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants()
            .filter(move |id| self.nodes[*id].local.eq_ignore_ascii_case(local))
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        let key = name.to_ascii_lowercase();
        self.nodes[id]
            .attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn first_child_named(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[*c].local.eq_ignore_ascii_case(local))
    }

    pub fn first_descendant_named(&self, id: NodeId, local: &str) -> Option<NodeId> {
        self.descendants_of(id)
            .into_iter()
            .find(|d| self.nodes[*d].local.eq_ignore_ascii_case(local))
    }

    pub fn is_leaf_element(&self, id: NodeId) -> bool {
        self.nodes[id].children.is_empty()
    }

    pub fn has_ancestor_named(&self, id: NodeId, local: &str) -> bool {
        let mut current = self.nodes[id].parent;
        while let Some(p) = current {
            if self.nodes[p].local.eq_ignore_ascii_case(local) {
                return true;
            }
            current = self.nodes[p].parent;
        }
        false
    }

    /// Concatenated text of a node and its subtree, in document order.
    pub fn subtree_text(&self, id: NodeId) -> String {
        let mut pieces = Vec::new();
        if !self.nodes[id].text.is_empty() {
            pieces.push(self.nodes[id].text.clone());
        }
        for child in self.descendants_of(id) {
            if !self.nodes[child].text.is_empty() {
                pieces.push(self.nodes[child].text.clone());
            }
        }
        pieces.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_name_lookup_ignores_prefix_and_case() {
        let mut tree = DocTree::new();
        let root = tree.root();
        let ctx = tree.add_element(root, "xbrli", "context", vec![("id".into(), "c1".into())]);
        tree.add_element(ctx, "", "Period", vec![]);

        let found: Vec<_> = tree.by_local_name("CONTEXT").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(tree.attr(found[0], "ID"), Some("c1"));
        assert!(tree.first_child_named(found[0], "period").is_some());
    }

    #[test]
    fn test_subtree_text_in_document_order() {
        let mut tree = DocTree::new();
        let root = tree.root();
        let p = tree.add_element(root, "", "p", vec![]);
        tree.append_text(p, "Revenue was");
        let b = tree.add_element(p, "", "b", vec![]);
        tree.append_text(b, "$5,000");

        assert_eq!(tree.subtree_text(p), "Revenue was $5,000");
    }
}
