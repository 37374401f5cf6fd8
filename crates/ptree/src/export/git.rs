//! LaTeX section listing the git packages of each product.

use std::{
    cell::RefCell,
    fmt::Write as _,
    io::Write,
    path::{Path, PathBuf},
};

use indexmap::IndexSet;
use log::info;

use ptree_core::{product::Product, text::sanitize_tex, tree::ProductTree};

use crate::{
    export::{self, Exporter, write_atomically},
    github::{PackageCache, PackageInfoSource},
};

/// Package names of a product.
///
/// Package attributes may hold several comma or space separated names.
pub fn package_names(product: &Product) -> Vec<&str> {
    let names: IndexSet<&str> = product
        .packages()
        .iter()
        .flat_map(|value| value.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|name| !name.is_empty())
        .collect();
    names.into_iter().collect()
}

/// Renders the section for every product that lists packages, level by
/// level.
pub fn render_git_section<S: PackageInfoSource>(
    tree: &ProductTree,
    cache: &mut PackageCache<S>,
) -> String {
    let mut out = String::new();
    for product in tree.iter_width_first() {
        let names = package_names(product);
        if names.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "\\subsubsection{{{} ({})}}\\label{{git:{}}}\n",
            product.name(),
            product.id(),
            product.id()
        );
        for name in names {
            write_package(&mut out, name, cache);
        }
    }
    out
}

fn write_package<S: PackageInfoSource>(out: &mut String, name: &str, cache: &mut PackageCache<S>) {
    let _ = writeln!(out, "\\paragraph{{{}}}", sanitize_tex(name));
    let Some(info) = cache.get(name) else {
        out.push_str("\\textit{Package not found on GitHub.}\n\n");
        return;
    };

    let _ = writeln!(out, "\\textit{{{}}}\n", sanitize_tex(info.description()));
    let _ = writeln!(out, "Github package organization: \\textit{{{}}}\n", info.organization());
    out.push_str("Readme header:\n\n");
    if info.readme_head().is_empty() {
        out.push_str("\\textit{No README provided.}\n\n");
    } else {
        let _ = writeln!(out, "\\begin{{verbatim}}\n{}\n\\end{{verbatim}}\n", info.readme_head());
    }
    if !info.dependency_names().is_empty() {
        let dependencies: Vec<String> = info
            .dependency_names()
            .iter()
            .map(|dependency| sanitize_tex(dependency))
            .collect();
        let _ = writeln!(out, "Dependencies: {}\n", dependencies.join(", "));
    }
    if !info.teams().is_empty() {
        let _ = writeln!(out, "Teams: {}\n", sanitize_tex(&info.teams().join(", ")));
    }
}

/// Writes the git section of a tree to a file.
///
/// The package cache is shared so that several trees of one run look each
/// package up once.
pub struct GitSection<'c, S> {
    path: PathBuf,
    cache: &'c RefCell<PackageCache<S>>,
}

impl<'c, S: PackageInfoSource> GitSection<'c, S> {
    pub fn new(path: impl Into<PathBuf>, cache: &'c RefCell<PackageCache<S>>) -> Self {
        Self {
            path: path.into(),
            cache,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<S: PackageInfoSource> Exporter for GitSection<'_, S> {
    fn export_tree(&self, tree: &ProductTree) -> Result<(), export::Error> {
        let section = render_git_section(tree, &mut self.cache.borrow_mut());
        info!(file_name:? = self.path, packages = self.cache.borrow().len(); "Writing git section");
        write_atomically(&self.path, |file| Ok(file.write_all(section.as_bytes())?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{GithubError, PackageInfo};

    struct Fixed;

    impl PackageInfoSource for Fixed {
        fn fetch_package_info(&self, name: &str) -> Result<Option<PackageInfo>, GithubError> {
            Ok(match name {
                "daf_butler" => Some(
                    PackageInfo::new("lsst", "daf_butler")
                        .with_description("Data access framework")
                        .with_readme_head("# daf_butler")
                        .with_dependency_names(vec!["sphgeom".to_string(), "utils".to_string()]),
                ),
                "afw" => Some(PackageInfo::new("lsst", "afw")),
                _ => None,
            })
        }
    }

    fn tree() -> ProductTree {
        let mut tree = ProductTree::new();
        tree.insert(Product::builder("DM").with_name("Data Management").build())
            .unwrap();
        tree.insert(
            Product::builder("Butler")
                .with_name("Butler")
                .with_parent("DM")
                .with_packages(vec!["daf_butler, afw".to_string(), "afw".to_string()])
                .build(),
        )
        .unwrap();
        tree.insert(
            Product::builder("Ghost")
                .with_name("Ghost")
                .with_parent("DM")
                .with_packages(vec!["lsst-dm/ghost".to_string()])
                .build(),
        )
        .unwrap();
        tree
    }

    #[test]
    fn test_package_names_split_and_dedup() {
        let tree = tree();
        assert_eq!(package_names(tree.get("Butler").unwrap()), vec!["daf_butler", "afw"]);
        assert!(package_names(tree.get("DM").unwrap()).is_empty());
    }

    #[test]
    fn test_section_content() {
        let mut cache = PackageCache::new(Fixed);
        let section = render_git_section(&tree(), &mut cache);

        assert!(!section.contains("Data Management"));
        assert!(section.contains("\\subsubsection{Butler (Butler)}\\label{git:Butler}"));
        assert!(section.contains("\\paragraph{daf\\_butler}"));
        assert!(section.contains("\\begin{verbatim}\n# daf_butler\n\\end{verbatim}"));
        assert!(section.contains("Dependencies: sphgeom, utils"));
        // afw has no README
        assert!(section.contains("\\paragraph{afw}\n\\textit{}\n\nGithub package organization: \\textit{lsst}\n\nReadme header:\n\n\\textit{No README provided.}"));
        assert!(section.contains("\\textit{Package not found on GitHub.}"));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_exporter_shares_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RefCell::new(PackageCache::new(Fixed));

        GitSection::new(dir.path().join("a.tex"), &cache)
            .export_tree(&tree())
            .unwrap();
        GitSection::new(dir.path().join("b.tex"), &cache)
            .export_tree(&tree())
            .unwrap();

        assert_eq!(cache.borrow().len(), 3);
        let written = std::fs::read_to_string(dir.path().join("b.tex")).unwrap();
        assert!(written.contains("lsst-dm/ ghost"));
    }
}
