//! Graphviz graphs of package dependencies.
//!
//! A graph starts at one package and follows the EUPS table dependencies of
//! every package already in the [`PackageCache`]. Only the starting package
//! is fetched, so drawing graphs never widens the set of GitHub lookups made
//! for the git section.

use std::{
    cell::RefCell,
    collections::HashSet,
    fmt::Write as _,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::{debug, info};

use ptree_core::tree::ProductTree;

use crate::{
    export::{self, Exporter, git::package_names, write_atomically},
    github::{PackageCache, PackageInfoSource},
};

/// Renders the dependency graph of `root` in DOT.
///
/// Returns `None` when `root` is unknown or has no dependencies.
pub fn render_dependency_graph<S: PackageInfoSource>(root: &str, cache: &mut PackageCache<S>) -> Option<String> {
    if cache.get(root)?.dependency_names().is_empty() {
        return None;
    }

    let mut nodes: IndexSet<&str> = IndexSet::new();
    let mut edges: IndexSet<(&str, &str)> = IndexSet::new();
    let mut visited = HashSet::new();
    let mut pending = vec![root];
    while let Some(package) = pending.pop() {
        if !visited.insert(package) {
            continue;
        }
        nodes.insert(package);
        let Some(info) = cache.cached(package) else {
            continue;
        };
        for dependency in info.dependency_names() {
            if edges.insert((package, dependency.as_str())) && cache.cached(dependency).is_some() {
                pending.push(dependency.as_str());
            }
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "// Dependencies of {root}");
    let _ = writeln!(out, "digraph \"{}\" {{", quoted(root));
    for node in &nodes {
        let _ = writeln!(out, "    \"{}\";", quoted(node));
    }
    for (from, to) in &edges {
        let _ = writeln!(out, "    \"{}\" -> \"{}\";", quoted(from), quoted(to));
    }
    out.push_str("}\n");
    Some(out)
}

fn quoted(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// File name of a package graph; `org/repo` names use the repository.
pub fn graph_file_name(package: &str) -> String {
    let repository = package.rsplit('/').next().unwrap_or(package);
    format!("{}.dot", repository.to_lowercase())
}

/// Writes one `<package>.dot` per package of a tree that has dependencies.
pub struct DependencyGraphs<'c, S> {
    dir: PathBuf,
    cache: &'c RefCell<PackageCache<S>>,
}

impl<'c, S: PackageInfoSource> DependencyGraphs<'c, S> {
    pub fn new(dir: impl Into<PathBuf>, cache: &'c RefCell<PackageCache<S>>) -> Self {
        Self { dir: dir.into(), cache }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl<S: PackageInfoSource> Exporter for DependencyGraphs<'_, S> {
    fn export_tree(&self, tree: &ProductTree) -> Result<(), export::Error> {
        let packages: IndexSet<&str> = tree.iter_width_first().flat_map(package_names).collect();
        fs::create_dir_all(&self.dir)?;

        let mut written = 0;
        for package in packages {
            let Some(graph) = render_dependency_graph(package, &mut self.cache.borrow_mut()) else {
                debug!(package; "No dependency graph");
                continue;
            };
            let path = self.dir.join(graph_file_name(package));
            write_atomically(&path, |file| Ok(file.write_all(graph.as_bytes())?))?;
            written += 1;
        }
        info!(dir:? = self.dir, graphs = written; "Dependency graphs written");
        Ok(())
    }
}
