// SPDX-License-Identifier: MIT OR Apache-2.0

//! Segmented prefix trie.
//!
//! Keys are split into segments by [`segments`]: a segment starts at a `/` (or
//! at the start of the key) and runs up to the next `/` after its first
//! character, so `/aa/bb` holds the segments `/aa` and `/bb`. The empty key is
//! the root. Leading and trailing separators are significant, which makes
//! `/`, `aa/` and `/aa` three distinct keys.
//!
//! Besides exact lookups the trie offers an ancestor walk that collects every
//! payload met while following a key from the root. Hook dispatch is built on
//! it: because [`Path::trie_key`](crate::domain::Path::trie_key) appends the
//! scope after the route, an unscoped registration is always an ancestor of
//! the scoped keys of the same route.

pub mod registry;

pub use registry::{HookRegistry, Hooks, SubscriberId};

use crate::domain::Result;
use std::collections::BTreeMap;

/// Iterator over the segments of a trie key.
#[derive(Clone, Debug)]
pub struct Segments<'a> {
    rest: &'a str,
}

/// Splits `key` into trie segments.
///
/// # Examples
///
/// ```
/// use scopecfg::trie::segments;
///
/// assert_eq!(segments("/aa/bb").collect::<Vec<_>>(), vec!["/aa", "/bb"]);
/// assert_eq!(segments("aa/").collect::<Vec<_>>(), vec!["aa", "/"]);
/// assert_eq!(segments("").count(), 0);
/// ```
pub fn segments(key: &str) -> Segments<'_> {
    Segments { rest: key }
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let skip = first.len_utf8();
        let end = self.rest[skip..]
            .find('/')
            .map(|idx| idx + skip)
            .unwrap_or(self.rest.len());
        let (segment, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(segment)
    }
}

struct Node<V> {
    value: Option<V>,
    children: BTreeMap<String, Node<V>>,
}

impl<V> Default for Node<V> {
    fn default() -> Self {
        Node {
            value: None,
            children: BTreeMap::new(),
        }
    }
}

impl<V> Node<V> {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.children.is_empty()
    }

    fn find(&self, key: &str) -> Option<&Node<V>> {
        let mut node = self;
        for segment in segments(key) {
            node = node.children.get(segment)?;
        }
        Some(node)
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut Node<V>> {
        let mut node = self;
        for segment in segments(key) {
            node = node.children.get_mut(segment)?;
        }
        Some(node)
    }

    // Returns None if the key does not exist, otherwise whether anything was
    // cleared or pruned and whether the caller should drop this node.
    fn remove(&mut self, segs: &[&str]) -> Option<(bool, bool)> {
        match segs.split_first() {
            None => {
                let had = self.value.take().is_some();
                let drop = self.is_empty();
                Some((had || drop, drop))
            }
            Some((first, rest)) => {
                let child = self.children.get_mut(*first)?;
                let (changed, drop_child) = child.remove(rest)?;
                if drop_child {
                    self.children.remove(*first);
                }
                Some((changed, self.is_empty()))
            }
        }
    }

    fn walk<F>(&self, key: &mut String, f: &mut F) -> Result<()>
    where
        F: FnMut(&str, &V) -> Result<()>,
    {
        if let Some(value) = &self.value {
            f(key.as_str(), value)?;
        }
        for (segment, child) in &self.children {
            let len = key.len();
            key.push_str(segment);
            let res = child.walk(key, f);
            key.truncate(len);
            res?;
        }
        Ok(())
    }

    fn count(&self) -> usize {
        usize::from(self.value.is_some()) + self.children.values().map(Node::count).sum::<usize>()
    }
}

/// A prefix trie keyed by `/` separated segments.
///
/// The trie itself is not synchronized; [`HookRegistry`] wraps it in a lock.
///
/// # Examples
///
/// ```
/// use scopecfg::trie::PathTrie;
///
/// let mut trie = PathTrie::new();
/// assert!(trie.put("/aa/bb", 1));
/// assert!(trie.put("/aa/bb/cc/stores/2", 2));
///
/// assert_eq!(trie.get("/aa/bb"), Some(&1));
/// assert_eq!(trie.ancestors("/aa/bb/cc/stores/2"), vec![&1, &2]);
///
/// assert!(trie.delete("/aa/bb/cc/stores/2"));
/// assert_eq!(trie.get("/aa/bb/cc/stores/2"), None);
/// ```
pub struct PathTrie<V> {
    root: Node<V>,
}

impl<V> Default for PathTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PathTrie<V> {
    /// Creates an empty trie.
    pub fn new() -> Self {
        PathTrie {
            root: Node::default(),
        }
    }

    /// Returns true if no node holds a payload.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Number of nodes holding a payload.
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// Exact-match lookup.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.root.find(key)?.value.as_ref()
    }

    /// Exact-match mutable lookup.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.root.find_mut(key)?.value.as_mut()
    }

    /// Returns true if a node exists for `key`, with or without payload.
    pub fn contains_node(&self, key: &str) -> bool {
        self.root.find(key).is_some()
    }

    /// Stores `value` at `key`. Returns true if no payload existed before.
    pub fn put(&mut self, key: &str, value: V) -> bool {
        let node = self.node_for(key);
        node.value.replace(value).is_none()
    }

    /// Returns the payload at `key`, creating it with `init` if absent.
    ///
    /// The flag is true if the payload was created by this call.
    pub fn get_or_insert_with<F>(&mut self, key: &str, init: F) -> (&mut V, bool)
    where
        F: FnOnce() -> V,
    {
        let node = self.node_for(key);
        let created = node.value.is_none();
        (node.value.get_or_insert_with(init), created)
    }

    /// Clears the payload at `key` and prunes nodes left without payload or
    /// children, stopping below the root.
    ///
    /// Returns false if no node exists for `key` or if the node held no
    /// payload, in which case nothing changes.
    pub fn delete(&mut self, key: &str) -> bool {
        let segs: Vec<&str> = segments(key).collect();
        matches!(self.root.remove(&segs), Some((true, _)))
    }

    /// Visits every payload depth-first, children in lexical segment order.
    ///
    /// The first error aborts the walk and is returned.
    pub fn walk<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &V) -> Result<()>,
    {
        let mut key = String::new();
        self.root.walk(&mut key, &mut f)
    }

    /// Collects the payloads met while following `key` from the root,
    /// root first, including the node for `key` itself.
    pub fn ancestors(&self, key: &str) -> Vec<&V> {
        let mut node = &self.root;
        let mut found: Vec<&V> = node.value.iter().collect();
        for segment in segments(key) {
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    found.extend(node.value.iter());
                }
                None => break,
            }
        }
        found
    }

    fn node_for(&mut self, key: &str) -> &mut Node<V> {
        let mut node = &mut self.root;
        for segment in segments(key) {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node
    }
}
