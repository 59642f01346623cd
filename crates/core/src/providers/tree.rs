use std::collections::BTreeMap;

/// One path segment of a [`PathTree`]; only mount points carry a value.
#[derive(Debug, Clone)]
pub struct Node<T> {
    value: Option<T>,
    children: BTreeMap<String, Node<T>>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T> Node<T> {
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn child(&self, name: &str) -> Option<&Node<T>> {
        self.children.get(name)
    }

    /// Children by segment name, in name order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Node<T>)> {
        self.children.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Trie of mount points keyed by path segment.
#[derive(Debug, Clone)]
pub struct PathTree<T> {
    root: Node<T>,
}

impl<T> Default for PathTree<T> {
    fn default() -> Self {
        Self { root: Node::default() }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl<T> PathTree<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places `value` at `path`, returning a value previously mounted there.
    pub fn add_node(&mut self, path: &str, value: T) -> Option<T> {
        let mut node = &mut self.root;
        for segment in segments(path) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.value.replace(value)
    }

    pub fn get_node(&self, path: &str) -> Option<&Node<T>> {
        segments(path).try_fold(&self.root, |node, segment| node.children.get(segment))
    }

    /// Values mounted at `path` or above it, root first.
    pub fn get_matching_nodes(&self, path: &str) -> Vec<&T> {
        let mut node = &self.root;
        let mut matching: Vec<&T> = node.value.iter().collect();
        for segment in segments(path) {
            match node.children.get(segment) {
                Some(child) => node = child,
                None => break,
            }
            matching.extend(node.value.as_ref());
        }
        matching
    }

    /// The value with the longest mount path covering `path`.
    pub fn get_best_matching_node(&self, path: &str) -> Option<&T> {
        self.get_matching_nodes(path).pop()
    }

    pub fn root(&self) -> &Node<T> {
        &self.root
    }
}
