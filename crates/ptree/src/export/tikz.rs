//! Standalone LaTeX/TikZ documents for laid out diagrams.

use std::{
    fmt::Write as _,
    io::Write,
    path::{Path, PathBuf},
};

use log::{info, warn};

use ptree_core::{
    geometry::{Canvas, Connector, LayoutDirective, NodeStyle, Route},
    tree::ProductTree,
};

use crate::{
    config::LayoutConfig,
    export::{self, Exporter, write_atomically},
    layout::Diagram,
};

/// Writes a diagram as a standalone TikZ document sized to its canvas.
pub struct Tikz {
    path: PathBuf,
    title: String,
    config: LayoutConfig,
}

impl Tikz {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            title: String::new(),
            config: LayoutConfig::default(),
        }
    }

    /// Sets the document name shown in the header comment.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Sets the sizes used for the node styles.
    pub fn with_config(mut self, config: LayoutConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renders the whole document.
    pub fn render(&self, tree: &ProductTree, diagram: &Diagram) -> String {
        let mut out = String::new();
        self.write_header(&mut out, diagram.canvas());
        for directive in diagram.directives() {
            let name = match tree.get(directive.node_id()) {
                Some(product) => product.name(),
                None => {
                    warn!(node = directive.node_id(); "Placed node is not in the tree");
                    directive.node_id()
                }
            };
            write_node(&mut out, directive, name);
        }
        for connector in diagram.connectors() {
            write_connector(&mut out, connector);
        }
        out.push_str("\n\\end{tikzpicture}\n\\end{document}\n");
        out
    }

    fn write_header(&self, out: &mut String, canvas: Canvas) {
        let rule = "%".repeat(78);
        let _ = writeln!(out, "{rule}\n%\n% Document:     {}  product tree\n%\n{rule}", self.title);
        out.push_str(
            "\\documentclass{article}\n\
             \\usepackage{times,layouts}\n\
             \\usepackage{tikz,hyperref,amsmath}\n\
             \\usetikzlibrary{positioning,arrows,shapes,decorations.shapes,shapes.arrows}\n\
             \\usetikzlibrary{backgrounds,calc}\n",
        );
        let _ = writeln!(
            out,
            "\\usepackage[paperwidth={}cm,paperheight={}cm,\n\
             left=-2mm,top=3mm,bottom=0mm,right=0mm,\n\
             noheadfoot,marginparwidth=0pt,includemp=false,\n\
             textwidth=30cm,textheight=50mm]{{geometry}}",
            round(canvas.width()),
            round(canvas.height()),
        );
        let _ = writeln!(
            out,
            "\\hypersetup{{pdftitle={{{} products}}, pdfauthor={{Autogenerated from MagicDraw}}}}",
            self.title
        );
        out.push_str(
            "\\tikzstyle{tbox}=[rectangle,text centered, text width=30mm]\n\
             \\tikzstyle{wbbox}=[rectangle, rounded corners=3pt, draw=black, top color=blue!50!white,\n\
             \x20   bottom color=white, very thick, minimum height=12mm, inner sep=2pt,\n\
             \x20   text centered, text width=30mm]\n",
        );
        let _ = writeln!(
            out,
            "\\tikzstyle{{pbox}}=[rectangle, rounded corners=3pt, draw=black, top color=yellow!50!white,\n\
             \x20   bottom color=white, very thick, minimum height={}, inner sep={},\n\
             \x20   text centered, text width=35mm]",
            self.config.text_height(),
            self.config.sep(),
        );
        out.push_str(
            "\\tikzstyle{pline}=[-, thick]\n\
             \\begin{document}\n\
             \\begin{tikzpicture}[node distance=0mm]\n\n",
        );
    }
}

impl Exporter for Tikz {
    fn export_diagram(&self, tree: &ProductTree, diagram: &Diagram) -> Result<(), export::Error> {
        info!(
            file_name:? = self.path,
            nodes = diagram.directives().len(),
            edges = diagram.connectors().len();
            "Writing TikZ diagram"
        );
        let document = self.render(tree, diagram);
        write_atomically(&self.path, |file| Ok(file.write_all(document.as_bytes())?))
    }
}

fn round(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

fn write_node(out: &mut String, directive: &LayoutDirective, name: &str) {
    let style = match directive.style() {
        NodeStyle::Root => "wbbox",
        NodeStyle::Product => "pbox",
    };
    let _ = match directive.anchor() {
        None => writeln!(out, "\\node ({}) [{style}] {{\\textbf{{{name}}}}};", directive.node_id()),
        Some(anchor) => writeln!(
            out,
            "\\node ({}) [{style}, {}={} of {anchor}] {{\\textbf{{{name}}}}};",
            directive.node_id(),
            directive.placement(),
            directive.offset(),
        ),
    };
}

fn write_connector(out: &mut String, connector: &Connector) {
    let (parent, child) = (connector.parent(), connector.child());
    let _ = match connector.route() {
        Route::Portrait => writeln!(out, " \\draw[pline] ({parent}.east) -| ++(0.4,0) |- ({child}.west);"),
        Route::Landscape => {
            writeln!(out, " \\draw[pline] ({child}.north) -- ++(0.0,0.5) -| ({parent}.south);")
        }
        Route::Compact => writeln!(
            out,
            " \\draw[pline] ([xshift=2mm]{parent}.south west) |- ({child}.west);"
        ),
    };
}
