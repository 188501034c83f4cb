//! Prefix tree over normalized keywords.

use std::collections::BTreeMap;

/// Postings of one keyword: chunk position -> index of the keyword in that
/// chunk's keyword list (the earliest occurrence).
pub type Postings = BTreeMap<usize, usize>;

#[derive(Debug, Default, Clone)]
struct Node {
    children: BTreeMap<char, Node>,
    postings: Option<Postings>,
}

/// Trie mapping keywords to the chunks that carry them.
///
/// Exact lookup walks one node per character. Prefix lookup returns every key
/// below the prefix node in lexicographic order, so iteration is deterministic.
#[derive(Debug, Default, Clone)]
pub struct KeywordTrie {
    root: Node,
    keys: usize,
}

impl KeywordTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that chunk `doc` carries `keyword` at `position` in its keyword list.
    pub fn insert(&mut self, keyword: &str, doc: usize, position: usize) {
        if keyword.is_empty() {
            return;
        }
        let mut node = &mut self.root;
        for c in keyword.chars() {
            node = node.children.entry(c).or_default();
        }
        let postings = node.postings.get_or_insert_with(|| {
            self.keys += 1;
            Postings::new()
        });
        postings
            .entry(doc)
            .and_modify(|p| *p = (*p).min(position))
            .or_insert(position);
    }

    /// Postings of exactly `keyword`.
    pub fn get(&self, keyword: &str) -> Option<&Postings> {
        self.node(keyword).and_then(|node| node.postings.as_ref())
    }

    /// Every key starting with `prefix` (including `prefix` itself), in lexicographic order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, &Postings)> {
        let mut out = Vec::new();
        if let Some(node) = self.node(prefix) {
            let mut key = prefix.to_string();
            collect(node, &mut key, &mut out);
        }
        out
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys == 0
    }

    fn node(&self, key: &str) -> Option<&Node> {
        let mut node = &self.root;
        for c in key.chars() {
            node = node.children.get(&c)?;
        }
        Some(node)
    }
}

fn collect<'a>(node: &'a Node, key: &mut String, out: &mut Vec<(String, &'a Postings)>) {
    if let Some(postings) = &node.postings {
        out.push((key.clone(), postings));
    }
    for (c, child) in &node.children {
        key.push(*c);
        collect(child, key, out);
        key.pop();
    }
}
