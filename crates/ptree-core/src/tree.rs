//! The ordered product tree.
//!
//! [`ProductTree`] is an ordered multi-way tree keyed by [`Product::id`].
//! Nodes are stored in an insertion-ordered map, and every node keeps the
//! ordered list of its children's keys.
//!
//! # Invariants
//!
//! - A node can only be inserted once its parent is present; the first
//!   insertion is the root and carries an empty parent id.
//! - Keys are unique.
//! - The root is the only node with an empty parent id.
//!
//! Violations are reported as [`TreeError`] and leave the tree unchanged.

use std::collections::VecDeque;

use indexmap::IndexMap;
use log::trace;
use thiserror::Error;

use crate::product::Product;

/// Errors raised while assembling a [`ProductTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("product key `{0}` is already present in the tree")]
    DuplicateId(String),

    #[error("parent `{parent}` of product `{id}` is not in the tree")]
    MissingParent { id: String, parent: String },

    #[error("product `{id}` has no parent but the tree already has root `{root}`")]
    MultipleRoots { id: String, root: String },

    #[error("product with element id `{element_id}` has an empty key")]
    EmptyId { element_id: String },

    #[error("product `{0}` is not in the tree")]
    UnknownNode(String),
}

#[derive(Debug, Clone)]
struct Node {
    product: Product,
    children: Vec<String>,
    depth: usize,
}

/// An ordered multi-way tree of products keyed by product id.
#[derive(Debug, Clone, Default)]
pub struct ProductTree {
    nodes: IndexMap<String, Node>,
    root: Option<String>,
}

impl ProductTree {
    /// Creates a new empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tree around a root that keeps its parent id.
    ///
    /// This is the shape [`subtree`](Self::subtree) copies have: the root's
    /// parent belongs to an enclosing tree that is not part of this one.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyId`] if the root has an empty key.
    pub fn with_root(product: Product) -> Result<Self, TreeError> {
        if product.id().is_empty() {
            return Err(TreeError::EmptyId {
                element_id: product.element_id().to_string(),
            });
        }
        let id = product.id().to_string();
        let mut nodes = IndexMap::new();
        nodes.insert(
            id.clone(),
            Node {
                product,
                children: Vec::new(),
                depth: 0,
            },
        );
        Ok(Self {
            nodes,
            root: Some(id),
        })
    }

    /// Inserts a product below its parent.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] if the key is empty or already used, if the
    /// parent is not present yet, or if a second parentless product is
    /// inserted.
    pub fn insert(&mut self, product: Product) -> Result<(), TreeError> {
        let id = product.id().to_string();
        if id.is_empty() {
            return Err(TreeError::EmptyId {
                element_id: product.element_id().to_string(),
            });
        }
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }

        let depth = match (&self.root, product.parent_id()) {
            (None, "") => {
                self.root = Some(id.clone());
                0
            }
            (Some(root), "") => {
                return Err(TreeError::MultipleRoots {
                    id,
                    root: root.clone(),
                });
            }
            (_, parent_id) => {
                let Some(parent) = self.nodes.get_mut(parent_id) else {
                    return Err(TreeError::MissingParent {
                        id,
                        parent: parent_id.to_string(),
                    });
                };
                parent.children.push(id.clone());
                parent.depth + 1
            }
        };

        trace!(id = id.as_str(), depth; "Inserted product");
        self.nodes.insert(
            id,
            Node {
                product,
                children: Vec::new(),
                depth,
            },
        );
        Ok(())
    }

    /// Returns the number of products in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Product> {
        self.nodes.get(id).map(|node| &node.product)
    }

    pub fn root(&self) -> Option<&Product> {
        self.root.as_deref().and_then(|id| self.get(id))
    }

    /// Returns the parent of a product, `None` for the root or unknown keys.
    pub fn parent(&self, id: &str) -> Option<&Product> {
        self.get(id).and_then(|product| self.get(product.parent_id()))
    }

    /// Returns the children of a product in sibling order.
    ///
    /// Returns an empty iterator for unknown keys.
    pub fn children(&self, id: &str) -> impl Iterator<Item = &Product> {
        self.nodes
            .get(id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .map(|child| &self.nodes[child.as_str()].product)
    }

    /// Returns the depth of a product, the root being at depth 0.
    pub fn depth_of(&self, id: &str) -> Option<usize> {
        self.nodes.get(id).map(|node| node.depth)
    }

    /// Returns the maximum depth of the tree, 0 for an empty or single-node tree.
    pub fn depth(&self) -> usize {
        self.nodes.values().map(|node| node.depth).max().unwrap_or(0)
    }

    /// Returns the products of the subtree rooted at `id` that have no children.
    pub fn leaves(&self, id: &str) -> Vec<&Product> {
        self.iter_depth_first_from(id)
            .filter(|product| self.nodes[product.id()].children.is_empty())
            .collect()
    }

    /// Returns the number of products in the subtree rooted at `id`, including `id`.
    pub fn subtree_size(&self, id: &str) -> usize {
        self.iter_depth_first_from(id).count()
    }

    /// Returns the maximum depth below `id`, relative to `id`.
    pub fn subtree_depth(&self, id: &str) -> usize {
        let Some(base) = self.depth_of(id) else {
            return 0;
        };
        self.iter_depth_first_from(id)
            .map(|product| self.nodes[product.id()].depth - base)
            .max()
            .unwrap_or(0)
    }

    /// Iterates over every product in pre-order.
    pub fn iter_depth_first(&self) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: self.root.iter().map(String::as_str).collect(),
        }
    }

    /// Iterates over the subtree rooted at `id` in pre-order.
    pub fn iter_depth_first_from(&self, id: &str) -> DepthFirst<'_> {
        let stack = self
            .nodes
            .get_key_value(id)
            .map(|(key, _)| key.as_str())
            .into_iter()
            .collect();
        DepthFirst { tree: self, stack }
    }

    /// Iterates over every product level by level.
    pub fn iter_width_first(&self) -> WidthFirst<'_> {
        WidthFirst {
            tree: self,
            queue: self.root.iter().map(String::as_str).collect(),
        }
    }

    /// Copies the subtree rooted at `id` into a new tree.
    ///
    /// The copied root keeps its `parent_id`; it is the root of the new tree
    /// even though its parent is not part of it.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnknownNode`] if `id` is not in the tree.
    pub fn subtree(&self, id: &str) -> Result<ProductTree, TreeError> {
        if !self.contains(id) {
            return Err(TreeError::UnknownNode(id.to_string()));
        }
        Ok(self.copy_from(id, usize::MAX))
    }

    /// Copies the tree, dropping every product deeper than `max_depth`.
    pub fn slice(&self, max_depth: usize) -> ProductTree {
        match &self.root {
            Some(root) => self.copy_from(root, max_depth),
            None => ProductTree::new(),
        }
    }

    /// Copies the tree with every sibling list ordered by explicit index.
    ///
    /// The sort is stable: siblings without an index keep their source order
    /// and come after the indexed ones.
    pub fn sorted_by_index(&self) -> ProductTree {
        let mut sorted = self.clone();
        for node in sorted.nodes.values_mut() {
            let mut keyed: Vec<(Option<u32>, String)> = node
                .children
                .drain(..)
                .map(|child| (self.nodes[child.as_str()].product.index(), child))
                .collect();
            keyed.sort_by_key(|(index, _)| (index.is_none(), *index));
            node.children = keyed.into_iter().map(|(_, child)| child).collect();
        }
        sorted
    }

    /// Hangs several independent trees below a synthesized super-root.
    ///
    /// Each tree's root is reparented to `super_root`; the rest of each tree
    /// is copied unchanged, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::DuplicateId`] if the trees share a key, or if a
    /// key collides with the super-root.
    pub fn merge(super_root: Product, trees: &[&ProductTree]) -> Result<ProductTree, TreeError> {
        let super_id = super_root.id().to_string();
        let mut merged = ProductTree::new();
        merged.insert(super_root.with_parent(""))?;

        for tree in trees {
            let root_id = tree.root.as_deref();
            for product in tree.iter_depth_first() {
                if Some(product.id()) == root_id {
                    merged.insert(product.with_parent(super_id.as_str()))?;
                } else {
                    merged.insert(product.clone())?;
                }
            }
        }
        Ok(merged)
    }

    fn copy_from(&self, id: &str, max_depth: usize) -> ProductTree {
        let base = self.nodes[id].depth;
        let mut copy = ProductTree {
            nodes: IndexMap::new(),
            root: Some(id.to_string()),
        };
        for product in self.iter_depth_first_from(id) {
            let node = &self.nodes[product.id()];
            let depth = node.depth - base;
            if depth > max_depth {
                continue;
            }
            let children = if depth == max_depth {
                Vec::new()
            } else {
                node.children.clone()
            };
            copy.nodes.insert(
                product.id().to_string(),
                Node {
                    product: product.clone(),
                    children,
                    depth,
                },
            );
        }
        copy
    }
}

/// Pre-order iterator over a [`ProductTree`].
pub struct DepthFirst<'a> {
    tree: &'a ProductTree,
    stack: Vec<&'a str>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = &'a Product;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id];
        self.stack
            .extend(node.children.iter().rev().map(String::as_str));
        Some(&node.product)
    }
}

/// Level-order iterator over a [`ProductTree`].
pub struct WidthFirst<'a> {
    tree: &'a ProductTree,
    queue: VecDeque<&'a str>,
}

impl<'a> Iterator for WidthFirst<'a> {
    type Item = &'a Product;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.queue.pop_front()?;
        let node = &self.tree.nodes[id];
        self.queue.extend(node.children.iter().map(String::as_str));
        Some(&node.product)
    }
}


#[cfg(test)]
mod proptest_tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::*;

    // ===================
    // Strategies
    // ===================

    /// A list of parent choices; entry `i` picks the parent of node `i + 1`
    /// among nodes `0..=i`.
    fn shape_strategy() -> impl Strategy<Value = Vec<usize>> {
        prop::collection::vec(any::<prop::sample::Index>(), 0..40).prop_map(|choices| {
            choices
                .iter()
                .enumerate()
                .map(|(i, choice)| choice.index(i + 1))
                .collect()
        })
    }

    fn build(parents: &[usize]) -> ProductTree {
        let mut tree = ProductTree::new();
        tree.insert(Product::builder("n0").build()).unwrap();
        for (i, parent) in parents.iter().enumerate() {
            let product = Product::builder(format!("n{}", i + 1))
                .with_parent(format!("n{parent}"))
                .build();
            tree.insert(product).unwrap();
        }
        tree
    }

    // ===================
    // Property Test Functions
    // ===================

    /// Every non-root product references a product present in the tree.
    fn check_referential_integrity(parents: &[usize]) -> Result<(), TestCaseError> {
        let tree = build(parents);
        for product in tree.iter_depth_first() {
            if product.is_root() {
                prop_assert_eq!(product.id(), "n0");
            } else {
                prop_assert!(tree.contains(product.parent_id()));
            }
        }
        Ok(())
    }

    /// Traversals visit every product exactly once.
    fn check_traversals_visit_each_once(parents: &[usize]) -> Result<(), TestCaseError> {
        let tree = build(parents);
        let depth_first: HashSet<_> = tree.iter_depth_first().map(Product::id).collect();
        let width_first: HashSet<_> = tree.iter_width_first().map(Product::id).collect();
        prop_assert_eq!(depth_first.len(), tree.len());
        prop_assert_eq!(width_first.len(), tree.len());
        prop_assert_eq!(tree.subtree_size("n0"), tree.len());
        Ok(())
    }

    /// The leaves of the root partition the leaves of its children.
    fn check_leaves_partition(parents: &[usize]) -> Result<(), TestCaseError> {
        let tree = build(parents);
        let children: Vec<_> = tree.children("n0").map(Product::id).collect();
        if !children.is_empty() {
            let sum: usize = children.iter().map(|c| tree.leaves(c).len()).sum();
            prop_assert_eq!(sum, tree.leaves("n0").len());
        }
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn referential_integrity(parents in shape_strategy()) {
            check_referential_integrity(&parents)?;
        }

        #[test]
        fn traversals_visit_each_once(parents in shape_strategy()) {
            check_traversals_visit_each_once(&parents)?;
        }

        #[test]
        fn leaves_partition(parents in shape_strategy()) {
            check_leaves_partition(&parents)?;
        }
    }
}
