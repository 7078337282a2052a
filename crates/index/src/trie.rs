//! Fixed-depth trie over folded key segments

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::fold::{Segment, TrieConfig};
use crate::glob::{glob_match, is_literal, literal_prefix};

#[derive(Debug, Clone)]
struct Node<T> {
    children: BTreeMap<Segment, Node<T>>,
    /// Populated only at depth `config.depth()`
    entries: Vec<(String, T)>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: BTreeMap::new(),
            entries: Vec::new(),
        }
    }
}

impl<T> Node<T> {
    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.entries.is_empty()
    }
}

/// Multi-map from string keys to values with exact and glob lookup
#[derive(Debug, Clone)]
pub struct FoldedTrieIndex<T> {
    config: TrieConfig,
    root: Node<T>,
    len: usize,
}

impl<T: Clone + Eq + Hash> Default for FoldedTrieIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> FoldedTrieIndex<T> {
    pub fn new() -> Self {
        Self::with_config(TrieConfig::default())
    }

    pub fn with_config(config: TrieConfig) -> Self {
        Self {
            config,
            root: Node::default(),
            len: 0,
        }
    }

    #[inline]
    pub fn config(&self) -> &TrieConfig {
        &self.config
    }

    /// Number of stored `(key, value)` pairs
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
        self.len = 0;
    }

    /// Add `(key, value)`; returns false when the exact pair is already present
    pub fn insert(&mut self, key: &str, value: T) -> bool {
        let mut node = &mut self.root;
        for segment in self.config.path(key) {
            node = node.children.entry(segment).or_default();
        }

        if node
            .entries
            .iter()
            .any(|(existing, stored)| existing == key && *stored == value)
        {
            return false;
        }
        node.entries.push((key.to_string(), value));
        self.len += 1;
        true
    }

    /// Remove the pair matching both `key` and `value`, pruning emptied branches
    pub fn remove(&mut self, key: &str, value: &T) -> bool {
        let path = self.config.path(key);
        let removed = remove_at(&mut self.root, &path, key, value);
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Values stored under exactly `key`
    pub fn search_exact(&self, key: &str) -> Vec<T> {
        let mut node = &self.root;
        for segment in self.config.path(key) {
            match node.children.get(&segment) {
                Some(child) => node = child,
                None => return Vec::new(),
            }
        }
        node.entries
            .iter()
            .filter(|(stored, _)| stored == key)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Values whose key matches `pattern`, each value reported once
    pub fn search(&self, pattern: &str) -> Vec<T> {
        if is_literal(pattern) {
            let mut seen = HashSet::new();
            return self
                .search_exact(pattern)
                .into_iter()
                .filter(|value| seen.insert(value.clone()))
                .collect();
        }

        let mut subtree = &self.root;
        for segment in self.config.prefix_path(literal_prefix(pattern)) {
            match subtree.children.get(&segment) {
                Some(child) => subtree = child,
                None => return Vec::new(),
            }
        }

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        let mut queue = VecDeque::from([subtree]);
        while let Some(node) = queue.pop_front() {
            for (key, value) in &node.entries {
                if glob_match(pattern, key) && seen.insert(value.clone()) {
                    results.push(value.clone());
                }
            }
            queue.extend(node.children.values());
        }
        results
    }
}

fn remove_at<T: PartialEq>(node: &mut Node<T>, path: &[Segment], key: &str, value: &T) -> bool {
    let Some((segment, rest)) = path.split_first() else {
        let before = node.entries.len();
        if let Some(position) = node
            .entries
            .iter()
            .position(|(stored, stored_value)| stored == key && stored_value == value)
        {
            node.entries.remove(position);
        }
        return node.entries.len() != before;
    };

    let Some(child) = node.children.get_mut(segment) else {
        return false;
    };
    let removed = remove_at(child, rest, key, value);
    if child.is_empty() {
        node.children.remove(segment);
    }
    removed
}
