//! Landscape placement: a row of columns with the parent centred above.

use log::trace;

use ptree_core::{
    geometry::{Canvas, Connector, LayoutDirective, Length, NodeStyle, Placement, Route},
    product::Product,
    tree::ProductTree,
};

use super::{Diagram, LayoutEngine, Sketch, middle_sibling_index, portrait::place_portrait};

/// Shape of one column of a landscape row.
#[derive(Debug, Clone, Copy)]
struct Column {
    depth: usize,
    leaves: usize,
    size: usize,
}

impl Column {
    fn of(tree: &ProductTree, top: &Product) -> Self {
        Self {
            depth: tree.subtree_depth(top.id()),
            leaves: tree.leaves(top.id()).len(),
            size: tree.subtree_size(top.id()),
        }
    }
}

/// Placement state of a row that may span several blocks.
#[derive(Default)]
struct Row {
    /// Last placed column and its subtree depth.
    last: Option<(String, usize)>,
}

impl LayoutEngine {
    /// Lays out the subtree under `top` with its children in a row.
    pub(super) fn landscape(&self, tree: &ProductTree, top: &Product) -> Diagram {
        let mut sketch = Sketch::new(self.config());
        let mut row = Row::default();
        let columns = self.place_block(&mut sketch, &mut row, tree, top, NodeStyle::Root);

        let canvas = Canvas::new(
            self.block_width(&columns),
            self.canvas_height(&columns, 1),
        );
        sketch.finish(top, canvas)
    }

    /// Lays out a merged tree: the children of `top` are blocks, each laid
    /// out in landscape, side by side, with `top` centred above them.
    pub(super) fn full_tree(&self, tree: &ProductTree, top: &Product) -> Diagram {
        let config = self.config();
        let mut sketch = Sketch::new(config);
        let mut row = Row::default();

        let blocks: Vec<&Product> = tree.children(top.id()).collect();
        let mut width = 0.0;
        let mut all_columns = Vec::new();
        for block in &blocks {
            let columns = self.place_block(&mut sketch, &mut row, tree, block, NodeStyle::Product);
            width += self.block_width(&columns);
            all_columns.extend(columns);
        }

        match blocks.get(middle_sibling_index(blocks.len())) {
            Some(middle) => {
                sketch.place(LayoutDirective::relative(
                    top.id(),
                    middle.id(),
                    Placement::Above,
                    config.root_lift(),
                    NodeStyle::Root,
                ));
                for block in &blocks {
                    sketch.connect(Connector::new(top.id(), block.id(), Route::Landscape));
                }
            }
            None => {
                sketch.place(LayoutDirective::origin(top.id(), NodeStyle::Root));
                width = self.block_width(&[]);
            }
        }

        let canvas = Canvas::new(width, self.canvas_height(&all_columns, 2));
        sketch.finish(top, canvas)
    }

    /// Places `top`'s children as columns of `row` and `top` above them.
    ///
    /// A `top` without children becomes a column itself. Returns the shape
    /// of every column placed.
    fn place_block(
        &self,
        sketch: &mut Sketch<'_>,
        row: &mut Row,
        tree: &ProductTree,
        top: &Product,
        style: NodeStyle,
    ) -> Vec<Column> {
        let children: Vec<&Product> = tree.children(top.id()).collect();
        if children.is_empty() {
            trace!(node = top.id(); "Childless block placed as a column");
            self.place_column(sketch, row, tree, top, style);
            return vec![Column::of(tree, top)];
        }

        let mut columns = Vec::with_capacity(children.len());
        for child in &children {
            self.place_column(sketch, row, tree, child, NodeStyle::Product);
            columns.push(Column::of(tree, child));
        }

        let middle = children[middle_sibling_index(children.len())];
        sketch.place(LayoutDirective::relative(
            top.id(),
            middle.id(),
            Placement::Above,
            self.config().root_lift(),
            style,
        ));
        for child in &children {
            sketch.connect(Connector::new(top.id(), child.id(), Route::Landscape));
        }
        columns
    }

    /// Places the subtree of `column` right of the previous column.
    ///
    /// A full column is shifted by the depth of the previous subtree so the
    /// two never overlap; a compact column only by the compact gap. The
    /// column head is drawn in `style`.
    fn place_column(
        &self,
        sketch: &mut Sketch<'_>,
        row: &mut Row,
        tree: &ProductTree,
        column: &Product,
        style: NodeStyle,
    ) {
        let config = self.config();
        let directive = match &row.last {
            None => LayoutDirective::origin(column.id(), style),
            Some((previous, depth)) => {
                let offset = if self.is_compact() {
                    config.compact_gap()
                } else {
                    *depth as f32 * config.column_pitch() + config.big_gap()
                };
                LayoutDirective::relative(
                    column.id(),
                    previous.as_str(),
                    Placement::RightOf,
                    Length::cm(offset),
                    style,
                )
            }
        };

        if self.is_compact() {
            place_stacked(sketch, tree, column, directive);
        } else {
            place_portrait(sketch, tree, column, directive);
        }
        row.last = Some((column.id().to_string(), tree.subtree_depth(column.id())));
    }

    /// Width of one block of columns, including its right margin.
    fn block_width(&self, columns: &[Column]) -> f32 {
        let config = self.config();
        if self.is_compact() {
            columns.len() as f32 * (config.leaf_width() + config.compact_gap())
                + config.column_pitch()
        } else {
            let units: usize = columns.iter().map(|column| column.depth + 1).sum();
            (units + 1) as f32 * config.column_pitch()
        }
    }

    /// Height of the tallest column plus `levels` rows above the columns.
    fn canvas_height(&self, columns: &[Column], levels: usize) -> f32 {
        let rows = columns
            .iter()
            .map(|column| {
                if self.is_compact() {
                    column.size
                } else {
                    column.leaves
                }
            })
            .max()
            .unwrap_or(0);
        (rows + levels) as f32 * self.config().leaf_height() + 0.5
    }
}

/// Places `top` with the given directive and stacks its descendants below
/// it in pre-order.
fn place_stacked(sketch: &mut Sketch<'_>, tree: &ProductTree, top: &Product, directive: LayoutDirective) {
    let gap = sketch.config.gap();
    sketch.place(directive);
    let mut previous = top.id();
    for product in tree.iter_depth_first_from(top.id()).skip(1) {
        sketch.place(LayoutDirective::relative(
            product.id(),
            previous,
            Placement::Below,
            gap,
            NodeStyle::Product,
        ));
        sketch.connect(Connector::new(product.parent_id(), product.id(), Route::Compact));
        previous = product.id();
    }
}
