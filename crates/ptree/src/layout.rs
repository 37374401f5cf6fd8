//! Product tree layout.
//!
//! The layout engine turns a [`ProductTree`] into one or more [`Diagram`]s:
//! relative node placements, parent/child connectors and a canvas size. It
//! is a pure function of the tree shape, the [`LayoutMode`] and the
//! [`LayoutConfig`]; sibling lists are ordered by their explicit index first.
//!
//! Four geometries are supported:
//!
//! - [`LayoutMode::Portrait`]: the root on the left, each level a new column.
//! - [`LayoutMode::MixedLandscape`]: first-level nodes in a row, each subtree
//!   hanging below it in portrait, the root above the row.
//! - [`LayoutMode::FullTree`]: two nested landscape levels, for trees merged
//!   under a synthesized super-root.
//! - [`LayoutMode::Subtrees`]: one landscape diagram per first-level node.
//!
//! The landscape geometries have a compact variant that stacks every
//! subtree in a single column.

mod landscape;
mod portrait;

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use log::{debug, info};
use serde::Deserialize;

use ptree_core::{
    geometry::{Canvas, Connector, LayoutDirective},
    product::Product,
    tree::ProductTree,
};

use crate::config::LayoutConfig;

/// Geometry of a product tree diagram.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutMode {
    #[default]
    Portrait,
    #[serde(rename = "landscape")]
    MixedLandscape,
    #[serde(rename = "full")]
    FullTree,
    Subtrees,
}

impl FromStr for LayoutMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portrait" => Ok(Self::Portrait),
            "landscape" => Ok(Self::MixedLandscape),
            "full" => Ok(Self::FullTree),
            "subtrees" => Ok(Self::Subtrees),
            _ => Err("Unsupported layout mode"),
        }
    }
}

impl From<LayoutMode> for &'static str {
    fn from(val: LayoutMode) -> Self {
        match val {
            LayoutMode::Portrait => "portrait",
            LayoutMode::MixedLandscape => "landscape",
            LayoutMode::FullTree => "full",
            LayoutMode::Subtrees => "subtrees",
        }
    }
}

impl Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        write!(f, "{s}")
    }
}

/// A laid out diagram.
///
/// Directives are ordered so that every anchor is placed before the nodes
/// that refer to it. There is one directive per node and one connector per
/// parent/child edge of the laid out tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagram {
    name: String,
    directives: Vec<LayoutDirective>,
    connectors: Vec<Connector>,
    canvas: Canvas,
}

impl Diagram {
    /// Id of the product at the top of the diagram; empty for an empty tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directives(&self) -> &[LayoutDirective] {
        &self.directives
    }

    pub fn connectors(&self) -> &[Connector] {
        &self.connectors
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    /// Directive of a node, if it is part of the diagram.
    pub fn directive(&self, node_id: &str) -> Option<&LayoutDirective> {
        self.directives
            .iter()
            .find(|directive| directive.node_id() == node_id)
    }
}

/// Index of the sibling a parent is centred above.
///
/// For `count` siblings this is `⌊count/2⌋ - 1`, clamped to zero: the left
/// one of the two middle siblings for even counts, the one left of the
/// middle for odd counts.
///
/// # Examples
///
/// ```
/// # use ptree::layout::middle_sibling_index;
/// assert_eq!(middle_sibling_index(0), 0);
/// assert_eq!(middle_sibling_index(2), 0);
/// assert_eq!(middle_sibling_index(5), 1);
/// assert_eq!(middle_sibling_index(6), 2);
/// ```
pub fn middle_sibling_index(count: usize) -> usize {
    (count / 2).saturating_sub(1)
}

/// Computes diagrams from product trees.
///
/// # Examples
///
/// ```
/// # use ptree::{config::LayoutConfig, layout::{LayoutEngine, LayoutMode}};
/// # use ptree_core::tree::ProductTree;
/// let engine = LayoutEngine::new(LayoutConfig::default()).with_compact(true);
/// let diagrams = engine.layout(&ProductTree::new(), LayoutMode::MixedLandscape);
/// assert!(diagrams[0].canvas().is_zero());
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
    compact: bool,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            compact: false,
        }
    }

    /// Stack landscape subtrees in single columns.
    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn is_compact(&self) -> bool {
        self.compact
    }

    /// Lays out `tree` in the given mode.
    ///
    /// Every mode but [`LayoutMode::Subtrees`] yields exactly one diagram; an
    /// empty tree yields a single empty diagram with a zero canvas.
    /// [`LayoutMode::Subtrees`] yields one diagram per first-level node, or
    /// none for a tree without first-level nodes.
    pub fn layout(&self, tree: &ProductTree, mode: LayoutMode) -> Vec<Diagram> {
        info!(mode:% = mode, compact = self.compact, products = tree.len(); "Laying out product tree");
        let tree = tree.sorted_by_index();
        let Some(root) = tree.root() else {
            debug!("Empty tree, nothing to place");
            return match mode {
                LayoutMode::Subtrees => Vec::new(),
                _ => vec![Diagram::default()],
            };
        };

        let diagrams = match mode {
            LayoutMode::Portrait => vec![self.portrait(&tree, root)],
            LayoutMode::MixedLandscape => vec![self.landscape(&tree, root)],
            LayoutMode::FullTree => vec![self.full_tree(&tree, root)],
            LayoutMode::Subtrees => tree
                .children(root.id())
                .map(|column| self.landscape(&tree, column))
                .collect(),
        };
        for diagram in &diagrams {
            debug!(
                name = diagram.name(),
                nodes = diagram.directives().len(),
                width = diagram.canvas().width(),
                height = diagram.canvas().height();
                "Diagram laid out"
            );
        }
        diagrams
    }
}

/// Directives and connectors collected while placing nodes.
struct Sketch<'c> {
    config: &'c LayoutConfig,
    directives: Vec<LayoutDirective>,
    connectors: Vec<Connector>,
}

impl<'c> Sketch<'c> {
    fn new(config: &'c LayoutConfig) -> Self {
        Self {
            config,
            directives: Vec::new(),
            connectors: Vec::new(),
        }
    }

    fn place(&mut self, directive: LayoutDirective) {
        self.directives.push(directive);
    }

    fn connect(&mut self, connector: Connector) {
        self.connectors.push(connector);
    }

    fn finish(self, top: &Product, canvas: Canvas) -> Diagram {
        Diagram {
            name: top.id().to_string(),
            directives: self.directives,
            connectors: self.connectors,
            canvas,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_middle_sibling_index() {
        let cases = [(0, 0), (1, 0), (2, 0), (3, 0), (4, 1), (5, 1), (6, 2), (9, 3)];
        for (count, expected) in cases {
            assert_eq!(middle_sibling_index(count), expected, "{count} siblings");
        }
    }

    #[test]
    fn test_layout_mode_names() {
        for mode in [
            LayoutMode::Portrait,
            LayoutMode::MixedLandscape,
            LayoutMode::FullTree,
            LayoutMode::Subtrees,
        ] {
            assert_eq!(mode.to_string().parse::<LayoutMode>(), Ok(mode));
        }
        assert!("sideways".parse::<LayoutMode>().is_err());
    }

    #[test]
    fn test_empty_tree_has_zero_canvas() {
        let engine = LayoutEngine::default();
        for mode in [LayoutMode::Portrait, LayoutMode::MixedLandscape, LayoutMode::FullTree] {
            let diagrams = engine.layout(&ProductTree::new(), mode);
            assert_eq!(diagrams.len(), 1);
            assert!(diagrams[0].is_empty());
            assert!(diagrams[0].canvas().is_zero());
        }
        assert!(engine.layout(&ProductTree::new(), LayoutMode::Subtrees).is_empty());
    }
}
