//! Layout directives and canvas dimensions.
//!
//! The layout engine does not compute absolute coordinates. It emits one
//! [`LayoutDirective`] per product, placing the node relative to a previously
//! placed anchor node, plus one [`Connector`] per parent/child edge and the
//! [`Canvas`] size the diagram needs. A renderer resolves the relative
//! placements itself.
//!
//! # Units
//!
//! Offsets carry their own [`Unit`] so they can be written out verbatim.
//! Canvas dimensions are always centimetres.

use std::fmt;

/// TeX points per centimetre (72.27 pt per inch).
const PT_PER_CM: f32 = 72.27 / 2.54;

/// Unit of a [`Length`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Cm,
    Mm,
    Pt,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            Unit::Cm => "cm",
            Unit::Mm => "mm",
            Unit::Pt => "pt",
        };
        f.write_str(unit)
    }
}

/// A distance with its unit.
///
/// # Examples
///
/// ```
/// # use ptree_core::geometry::Length;
/// let offset = Length::pt(43.0);
/// assert_eq!(offset.to_string(), "43pt");
/// assert_eq!(Length::mm(15.0).to_cm(), 1.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    value: f32,
    unit: Unit,
}

impl Length {
    pub fn new(value: f32, unit: Unit) -> Self {
        Self { value, unit }
    }

    pub fn cm(value: f32) -> Self {
        Self::new(value, Unit::Cm)
    }

    pub fn mm(value: f32) -> Self {
        Self::new(value, Unit::Mm)
    }

    pub fn pt(value: f32) -> Self {
        Self::new(value, Unit::Pt)
    }

    pub fn zero() -> Self {
        Self::cm(0.0)
    }

    pub fn value(self) -> f32 {
        self.value
    }

    pub fn unit(self) -> Unit {
        self.unit
    }

    /// Converts the length to centimetres.
    pub fn to_cm(self) -> f32 {
        match self.unit {
            Unit::Cm => self.value,
            Unit::Mm => self.value / 10.0,
            Unit::Pt => self.value / PT_PER_CM,
        }
    }

    /// Converts the length to TeX points.
    pub fn to_pt(self) -> f32 {
        self.to_cm() * PT_PER_CM
    }

    pub fn is_zero(self) -> bool {
        self.value == 0.0
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Trim float noise: offsets are multiples of a few constants.
        let rounded = (self.value * 1000.0).round() / 1000.0;
        write!(f, "{}{}", rounded, self.unit)
    }
}

/// Where a node sits relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placement {
    RightOf,
    Below,
    Above,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = match self {
            Placement::RightOf => "right",
            Placement::Below => "below",
            Placement::Above => "above",
        };
        f.write_str(keyword)
    }
}

/// Visual style of a node box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStyle {
    /// The tree root.
    Root,
    Product,
}

/// Relative placement of one node.
///
/// A directive without an anchor places the node at the diagram origin; only
/// the first directive of a diagram has no anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutDirective {
    node_id: String,
    anchor: Option<String>,
    placement: Placement,
    offset: Length,
    style: NodeStyle,
}

impl LayoutDirective {
    /// Creates a directive for a node at the origin.
    pub fn origin(node_id: impl Into<String>, style: NodeStyle) -> Self {
        Self {
            node_id: node_id.into(),
            anchor: None,
            placement: Placement::Below,
            offset: Length::zero(),
            style,
        }
    }

    /// Creates a directive placing `node_id` relative to `anchor`.
    pub fn relative(
        node_id: impl Into<String>,
        anchor: impl Into<String>,
        placement: Placement,
        offset: Length,
        style: NodeStyle,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            anchor: Some(anchor.into()),
            placement,
            offset,
            style,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn placement(&self) -> Placement {
        self.placement
    }

    pub fn offset(&self) -> Length {
        self.offset
    }

    pub fn style(&self) -> NodeStyle {
        self.style
    }
}

/// How a connector is routed between parent and child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// From the parent's east side, vertical then horizontal into the child's west side.
    Portrait,
    /// From the parent's south side, horizontal then vertical into the child's north side.
    Landscape,
    /// From the parent's south-west corner down the column into the child's west side.
    Compact,
}

/// An edge between a parent node and one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Connector {
    parent: String,
    child: String,
    route: Route,
}

impl Connector {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, route: Route) -> Self {
        Self {
            parent: parent.into(),
            child: child.into(),
            route,
        }
    }

    pub fn parent(&self) -> &str {
        &self.parent
    }

    pub fn child(&self) -> &str {
        &self.child
    }

    pub fn route(&self) -> Route {
        self.route
    }
}

/// Diagram canvas dimensions in centimetres.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Canvas {
    width: f32,
    height: f32,
}

impl Canvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn width(self) -> f32 {
        self.width
    }

    pub fn height(self) -> f32 {
        self.height
    }

    pub fn is_zero(self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }

    /// Returns a canvas large enough for both canvases.
    pub fn max(self, other: Canvas) -> Self {
        Self {
            width: self.width.max(other.width),
            height: self.height.max(other.height),
        }
    }
}
