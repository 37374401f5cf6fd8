//! Ptree - product tree diagrams from a MagicDraw model.
//!
//! Extraction of product trees from the TWCloud element API, their layout
//! in several geometries, and export to CSV snapshots, standalone TikZ
//! documents and LaTeX sections describing the git packages behind each
//! product.

pub mod config;
pub mod export;
pub mod github;
pub mod layout;

mod error;

pub use ptree_core::{geometry, product, text, tree};

pub use error::PtreeError;

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
};

use log::{debug, info};

use ptree_core::{product::Product, tree::ProductTree};
use ptree_magicdraw::{BuildSession, CancellationFlag, ElementGateway, HttpGateway, TreeBuilder};

use config::{AppConfig, FullTreeEntry, SubsystemConfig};
use export::{Exporter, csv::CsvSnapshot, dot::DependencyGraphs, git::GitSection, tikz::Tikz};
use github::{GithubClient, PackageCache, PackageInfoSource};
use layout::{Diagram, LayoutEngine, LayoutMode};

/// Builder for extracting, laying out and exporting product trees.
///
/// # Examples
///
/// ```rust,no_run
/// use ptree::{DocumentBuilder, config::AppConfig, layout::LayoutMode};
///
/// let builder = DocumentBuilder::new(AppConfig::default());
///
/// // Reload a tree saved by an earlier run
/// let tree = builder.load_snapshot("DM.csv")
///     .expect("Failed to load snapshot");
///
/// // Lay it out and write one TikZ document per diagram
/// let diagrams = builder.layout(&tree, LayoutMode::MixedLandscape, false);
/// builder.write_diagrams(&tree, &diagrams, "out", "DMTree", "LDM-294")
///     .expect("Failed to write diagrams");
/// ```
#[derive(Default)]
pub struct DocumentBuilder {
    config: AppConfig,
}

impl DocumentBuilder {
    /// Create a new document builder with the given configuration.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ptree::{DocumentBuilder, config::AppConfig};
    ///
    /// let builder = DocumentBuilder::new(AppConfig::default());
    /// assert_eq!(builder.config().layout().leaf_width(), 3.7);
    /// ```
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Connect to the element API.
    ///
    /// The resource named by the subsystem wins over the configured one.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Config`] if neither names a resource, and
    /// [`PtreeError::Extract`] if the HTTP client cannot be built.
    pub fn http_gateway(&self, subsystem: Option<&SubsystemConfig>, token: &str) -> Result<HttpGateway, PtreeError> {
        let gateway = self.config.gateway();
        let resource = subsystem
            .and_then(SubsystemConfig::resource)
            .or_else(|| gateway.resource())
            .ok_or_else(|| PtreeError::Config("no model resource configured".to_string()))?;

        info!(base_url = gateway.base_url(), resource; "Connecting to element API");
        Ok(HttpGateway::new(gateway.base_url(), resource, token)?.with_timeout(gateway.timeout())?)
    }

    /// Extract the product tree below `root_element_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Extract`] for any fatal extraction error,
    /// including cancellation. No partial tree is returned.
    pub fn extract(
        &self,
        gateway: &dyn ElementGateway,
        root_element_id: &str,
        cancel: &CancellationFlag,
    ) -> Result<ProductTree, PtreeError> {
        let mut session = BuildSession::new(gateway)
            .with_retry_policy(self.config.gateway().retry_policy())
            .with_cancellation(cancel.clone());
        Ok(TreeBuilder::new(&mut session).build(root_element_id)?)
    }

    /// Extract every subtree a subsystem lists, in order.
    ///
    /// One session serves all subtrees, so elements shared between them are
    /// fetched once.
    ///
    /// # Errors
    ///
    /// See [`DocumentBuilder::extract`]; the first failing subtree aborts
    /// the run.
    pub fn extract_subsystem(
        &self,
        gateway: &dyn ElementGateway,
        subsystem: &SubsystemConfig,
        cancel: &CancellationFlag,
    ) -> Result<Vec<ProductTree>, PtreeError> {
        let mut session = BuildSession::new(gateway)
            .with_retry_policy(self.config.gateway().retry_policy())
            .with_cancellation(cancel.clone());

        let mut trees = Vec::with_capacity(subsystem.subtrees().len());
        for entry in subsystem.subtrees() {
            info!(subsystem = subsystem.subsystem(), element = entry.id(), file_name = entry.filename(); "Extracting subtree");
            let tree = TreeBuilder::new(&mut session).build(entry.id())?;
            trees.push(tree);
        }
        info!(
            subtrees = trees.len(),
            products = session.products_processed();
            "Subsystem extracted"
        );
        Ok(trees)
    }

    /// Join trees under the synthesized super-root of a full tree.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Tree`] if two trees share a product key.
    pub fn full_tree(&self, entry: &FullTreeEntry, trees: &[&ProductTree]) -> Result<ProductTree, PtreeError> {
        let super_root = Product::builder(entry.key())
            .with_name(entry.name())
            .with_short_name(entry.key())
            .build();
        let merged = ProductTree::merge(super_root, trees)?;
        info!(key = entry.key(), trees = trees.len(), products = merged.len(); "Full tree merged");
        Ok(merged)
    }

    /// Lay out a tree with the configured sizes.
    pub fn layout(&self, tree: &ProductTree, mode: LayoutMode, compact: bool) -> Vec<Diagram> {
        LayoutEngine::new(self.config.layout().clone())
            .with_compact(compact)
            .layout(tree, mode)
    }

    /// Write the CSV snapshot of a tree.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Export`] if the file cannot be written.
    pub fn write_snapshot(&self, tree: &ProductTree, path: impl AsRef<Path>) -> Result<(), PtreeError> {
        CsvSnapshot::new(path.as_ref()).export_tree(tree)?;
        Ok(())
    }

    /// Load a tree from a CSV snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Export`] if the file cannot be read or names an
    /// unknown parent.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<ProductTree, PtreeError> {
        let tree = export::csv::load_tree(path.as_ref())?;
        debug!(file_name:? = path.as_ref(), products = tree.len(); "Snapshot loaded");
        Ok(tree)
    }

    /// Write one TikZ document per diagram into `dir`.
    ///
    /// A single diagram goes to `<basename>.tex`; several go to
    /// `<basename>_<diagram name>.tex`. Returns the written paths in diagram
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Export`] for the first document that cannot be
    /// written.
    pub fn write_diagrams(
        &self,
        tree: &ProductTree,
        diagrams: &[Diagram],
        dir: impl AsRef<Path>,
        basename: &str,
        title: &str,
    ) -> Result<Vec<PathBuf>, PtreeError> {
        let dir = dir.as_ref();
        let mut written = Vec::with_capacity(diagrams.len());
        for diagram in diagrams {
            let file_name = if diagrams.len() == 1 {
                format!("{basename}.tex")
            } else {
                format!("{basename}_{}.tex", diagram.name())
            };
            let exporter = Tikz::new(dir.join(file_name))
                .with_title(title)
                .with_config(self.config.layout().clone());
            exporter.export_diagram(tree, diagram)?;
            written.push(exporter.path().to_path_buf());
        }
        Ok(written)
    }

    /// GitHub client for package lookups.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Github`] if the HTTP client cannot be built.
    pub fn github_client(&self) -> Result<GithubClient, PtreeError> {
        Ok(GithubClient::new(self.config.github().clone())?)
    }

    /// Write the git packages section of a tree.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Export`] if the file cannot be written.
    pub fn write_git_section<S: PackageInfoSource>(
        &self,
        tree: &ProductTree,
        cache: &RefCell<PackageCache<S>>,
        path: impl AsRef<Path>,
    ) -> Result<(), PtreeError> {
        GitSection::new(path.as_ref(), cache).export_tree(tree)?;
        Ok(())
    }

    /// Write a Graphviz dependency graph for every package of a tree into
    /// `dir`.
    ///
    /// Dependencies are followed through packages the cache already holds.
    ///
    /// # Errors
    ///
    /// Returns [`PtreeError::Export`] if a graph cannot be written.
    pub fn write_dependency_graphs<S: PackageInfoSource>(
        &self,
        tree: &ProductTree,
        cache: &RefCell<PackageCache<S>>,
        dir: impl AsRef<Path>,
    ) -> Result<(), PtreeError> {
        DependencyGraphs::new(dir.as_ref(), cache).export_tree(tree)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ptree_magicdraw::{ElementKind, ElementRecord, ExtractError, InMemoryGateway};

    use super::*;

    #[test]
    fn test_gateway_needs_resource() {
        let builder = DocumentBuilder::default();
        let result = builder.http_gateway(None, "dXNlcjpwYXNz");
        assert!(matches!(result, Err(PtreeError::Config(_))));
    }

    #[test]
    fn test_subsystem_resource_wins() {
        let subsystem = SubsystemConfig::from_yaml_str(
            "subsystem: DM\ndocument: LDM-294\nresource: project-1\n",
        )
        .unwrap();
        let gateway = DocumentBuilder::default()
            .http_gateway(Some(&subsystem), "dXNlcjpwYXNz")
            .unwrap();
        assert_eq!(gateway.resource(), "project-1");
    }

    #[test]
    fn test_cancelled_extraction_returns_no_tree() {
        let gateway = InMemoryGateway::new().with(ElementRecord::new("top", ElementKind::Package, "DM"));
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let result = DocumentBuilder::default().extract(&gateway, "top", &cancel);

        assert!(matches!(result, Err(PtreeError::Extract(ExtractError::Cancelled))));
    }

    #[test]
    fn test_full_tree_super_root() {
        let mut a = ProductTree::new();
        a.insert(Product::builder("A").with_name("A").build()).unwrap();
        let mut b = ProductTree::new();
        b.insert(Product::builder("B").with_name("B").build()).unwrap();
        let entry: FullTreeEntry = serde_yaml::from_str("key: DMAll\nname: Data Management").unwrap();

        let merged = DocumentBuilder::default().full_tree(&entry, &[&a, &b]).unwrap();

        assert_eq!(merged.root().unwrap().id(), "DMAll");
        assert_eq!(merged.root().unwrap().name(), "Data Management");
        let children: Vec<&str> = merged.children("DMAll").map(Product::id).collect();
        assert_eq!(children, ["A", "B"]);
    }

    #[test]
    fn test_write_diagrams_names_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = ProductTree::new();
        tree.insert(Product::builder("DM").with_name("DM").build()).unwrap();
        tree.insert(Product::builder("A").with_name("A").with_parent("DM").build())
            .unwrap();
        tree.insert(Product::builder("B").with_name("B").with_parent("DM").build())
            .unwrap();
        let builder = DocumentBuilder::default();

        let single = builder.layout(&tree, LayoutMode::Portrait, false);
        let paths = builder
            .write_diagrams(&tree, &single, dir.path(), "DMTree", "LDM-294")
            .unwrap();
        assert_eq!(paths, [dir.path().join("DMTree.tex")]);

        let subtrees = builder.layout(&tree, LayoutMode::Subtrees, false);
        let paths = builder
            .write_diagrams(&tree, &subtrees, dir.path(), "DMTree", "LDM-294")
            .unwrap();
        assert_eq!(paths, [dir.path().join("DMTree_A.tex"), dir.path().join("DMTree_B.tex")]);
        assert!(paths.iter().all(|path| path.exists()));
    }
}
