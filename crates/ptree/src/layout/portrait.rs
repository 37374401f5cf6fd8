//! Portrait placement: each tree level is a column to the right of its parent.

use log::trace;

use ptree_core::{
    geometry::{Canvas, Connector, LayoutDirective, Length, NodeStyle, Placement, Route},
    product::Product,
    tree::ProductTree,
};

use super::{Diagram, LayoutEngine, Sketch};

impl LayoutEngine {
    /// Lays out the subtree under `top` in portrait.
    ///
    /// The canvas is `(depth + 1)` columns wide and one leaf row per leaf
    /// tall.
    pub(super) fn portrait(&self, tree: &ProductTree, top: &Product) -> Diagram {
        let config = self.config();
        let mut sketch = Sketch::new(config);
        place_portrait(
            &mut sketch,
            tree,
            top,
            LayoutDirective::origin(top.id(), NodeStyle::Root),
        );

        let depth = tree.subtree_depth(top.id());
        let leaves = tree.leaves(top.id()).len();
        let canvas = Canvas::new(
            (depth + 1) as f32 * config.column_pitch(),
            leaves as f32 * config.leaf_height() + 0.5,
        );
        sketch.finish(top, canvas)
    }
}

/// Places `top` with the given directive and its descendants in portrait.
///
/// In pre-order, a node whose previous node is a sibling goes right below
/// it. Otherwise the previous node belongs to the subtree of an earlier
/// sibling, and the node goes below that sibling, far enough to clear all of
/// its leaves. A first child has no earlier sibling and goes right of its
/// parent.
pub(super) fn place_portrait(
    sketch: &mut Sketch<'_>,
    tree: &ProductTree,
    top: &Product,
    directive: LayoutDirective,
) {
    let config = sketch.config;
    let nodes: Vec<&Product> = tree.iter_depth_first_from(top.id()).collect();
    sketch.place(directive);

    for (i, product) in nodes.iter().enumerate().skip(1) {
        let previous = nodes[i - 1];
        let directive = if previous.parent_id() == product.parent_id() {
            LayoutDirective::relative(
                product.id(),
                previous.id(),
                Placement::Below,
                config.gap(),
                NodeStyle::Product,
            )
        } else {
            let sibling = nodes[..i - 1]
                .iter()
                .skip(1)
                .rev()
                .find(|candidate| candidate.parent_id() == product.parent_id());
            match sibling {
                Some(sibling) => {
                    let leaves = tree.leaves(sibling.id()).len();
                    let offset =
                        (leaves - 1) as f32 * config.block_pt() + config.gap().to_pt();
                    trace!(node = product.id(), sibling = sibling.id(), leaves; "Clearing sibling subtree");
                    LayoutDirective::relative(
                        product.id(),
                        sibling.id(),
                        Placement::Below,
                        Length::pt(offset),
                        NodeStyle::Product,
                    )
                }
                None => LayoutDirective::relative(
                    product.id(),
                    product.parent_id(),
                    Placement::RightOf,
                    config.child_shift(),
                    NodeStyle::Product,
                ),
            }
        };
        sketch.place(directive);
        sketch.connect(Connector::new(
            product.parent_id(),
            product.id(),
            Route::Portrait,
        ));
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;
    use crate::{config::LayoutConfig, layout::LayoutMode};

    fn tree(edges: &[(&str, &str)]) -> ProductTree {
        let mut tree = ProductTree::new();
        for (id, parent) in edges {
            tree.insert(Product::builder(*id).with_name(*id).with_parent(*parent).build())
                .unwrap();
        }
        tree
    }

    fn layout(tree: &ProductTree) -> Diagram {
        LayoutEngine::new(LayoutConfig::default())
            .layout(tree, LayoutMode::Portrait)
            .remove(0)
    }

    #[test]
    fn test_chain_of_three() {
        let diagram = layout(&tree(&[("root", ""), ("a", "root"), ("b", "a")]));

        assert_eq!(diagram.directives().len(), 3);
        assert_eq!(diagram.connectors().len(), 2);
        assert_eq!(diagram.directives()[0].anchor(), None);
        assert_eq!(diagram.directives()[0].style(), NodeStyle::Root);

        let b = diagram.directive("b").unwrap();
        assert_eq!(b.anchor(), Some("a"));
        assert_eq!(b.placement(), Placement::RightOf);
        assert_eq!(b.offset(), Length::mm(15.0));

        // depth 2, a single leaf
        assert_approx_eq!(f32, diagram.canvas().width(), 3.0 * 5.2);
        assert_approx_eq!(f32, diagram.canvas().height(), 1.56 + 0.5);
    }

    #[test]
    fn test_sibling_below_previous_sibling() {
        let diagram = layout(&tree(&[("root", ""), ("a", "root"), ("b", "root")]));

        let b = diagram.directive("b").unwrap();
        assert_eq!(b.anchor(), Some("a"));
        assert_eq!(b.placement(), Placement::Below);
        assert_eq!(b.offset(), Length::pt(4.0));
    }

    #[test]
    fn test_sibling_clears_previous_subtree() {
        // a has three leaves, so b drops two blocks below a
        let diagram = layout(&tree(&[
            ("root", ""),
            ("a", "root"),
            ("a1", "a"),
            ("a2", "a"),
            ("a21", "a2"),
            ("a3", "a"),
            ("b", "root"),
        ]));

        let b = diagram.directive("b").unwrap();
        assert_eq!(b.anchor(), Some("a"));
        assert_eq!(b.placement(), Placement::Below);
        assert_approx_eq!(f32, b.offset().value(), 2.0 * 41.0 + 4.0);

        let a3 = diagram.directive("a3").unwrap();
        assert_eq!(a3.anchor(), Some("a2"));
        assert_approx_eq!(f32, a3.offset().value(), 4.0);

        assert_approx_eq!(f32, diagram.canvas().height(), 4.0 * 1.56 + 0.5);
    }

    #[test]
    fn test_single_node() {
        let diagram = layout(&tree(&[("root", "")]));
        assert_eq!(diagram.directives().len(), 1);
        assert!(diagram.connectors().is_empty());
        assert_approx_eq!(f32, diagram.canvas().width(), 5.2);
    }

    #[test]
    fn test_siblings_follow_index() {
        let mut tree = ProductTree::new();
        tree.insert(Product::builder("root").build()).unwrap();
        tree.insert(Product::builder("b").with_parent("root").with_index(Some(2)).build())
            .unwrap();
        tree.insert(Product::builder("a").with_parent("root").with_index(Some(1)).build())
            .unwrap();

        let diagram = layout(&tree);

        assert_eq!(diagram.directives()[1].node_id(), "a");
        assert_eq!(diagram.directive("b").unwrap().anchor(), Some("a"));
    }
}
