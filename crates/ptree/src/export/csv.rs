//! Flat CSV snapshot of a product tree.
//!
//! One row per product in pre-order, parents before children, with the
//! header `key,shortname,parent,WBS,team,manager,owner,packages,name`.
//! Multi-valued fields are joined with spaces, so values that contain
//! spaces themselves do not survive a round trip; keys, parents and short
//! names do.

use std::{
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use ptree_core::{product::Product, tree::ProductTree};

use crate::export::{self, Exporter, write_atomically};

/// One snapshot row.
#[derive(Debug, Serialize, Deserialize)]
struct Row {
    key: String,
    #[serde(rename = "shortname")]
    short_name: String,
    parent: String,
    #[serde(rename = "WBS")]
    wbs: String,
    team: String,
    manager: String,
    owner: String,
    packages: String,
    name: String,
}

impl Row {
    fn from_product(product: &Product) -> Self {
        Self {
            key: product.id().to_string(),
            short_name: product.short_name().to_string(),
            parent: product.parent_id().to_string(),
            wbs: join(product.wbs()),
            team: join(product.team()),
            manager: join(product.manager()),
            owner: join(product.owner()),
            packages: join(product.packages()),
            name: product.name().to_string(),
        }
    }

    fn into_product(self) -> Product {
        Product::builder(self.key)
            .with_name(self.name)
            .with_short_name(self.short_name)
            .with_parent(self.parent)
            .with_wbs(split(&self.wbs))
            .with_team(split(&self.team))
            .with_manager(split(&self.manager))
            .with_owner(split(&self.owner))
            .with_packages(split(&self.packages))
            .build()
    }
}

fn join(values: &[String]) -> String {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn split(field: &str) -> Vec<String> {
    field.split_whitespace().map(str::to_string).collect()
}

/// Writes `tree` as a snapshot to `writer`.
///
/// # Errors
///
/// Returns [`export::Error::Csv`] if a row cannot be written.
pub fn write_tree<W: Write>(tree: &ProductTree, writer: W) -> Result<(), export::Error> {
    let mut writer = csv::Writer::from_writer(writer);
    for product in tree.iter_depth_first() {
        writer.serialize(Row::from_product(product))?;
    }
    writer.flush()?;
    Ok(())
}

/// Rebuilds a tree from a snapshot.
///
/// The first row is the root and keeps its parent column, so snapshots of
/// subtrees load back as they were written. Any later row without a parent
/// is logged and skipped.
///
/// # Errors
///
/// Returns [`export::Error::Csv`] for malformed rows, and
/// [`export::Error::Tree`] when a row names an unknown parent or repeats a
/// key.
pub fn read_tree<R: Read>(reader: R) -> Result<ProductTree, export::Error> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut tree: Option<ProductTree> = None;
    let mut lines = 0usize;

    for row in reader.deserialize::<Row>() {
        let row = row?;
        lines += 1;
        match tree.as_mut() {
            None => tree = Some(ProductTree::with_root(row.into_product())?),
            Some(_) if row.parent.is_empty() => {
                warn!(key = row.key.as_str(), line = lines + 1; "Snapshot row has no parent, skipping");
            }
            Some(tree) => tree.insert(row.into_product())?,
        }
    }

    info!(rows = lines; "Snapshot read");
    Ok(tree.unwrap_or_default())
}

/// Loads a snapshot file.
///
/// # Errors
///
/// See [`read_tree`]; also returns [`export::Error::Io`] if the file cannot
/// be opened.
pub fn load_tree(path: impl AsRef<Path>) -> Result<ProductTree, export::Error> {
    let file = File::open(path.as_ref())?;
    read_tree(file)
}

/// Exports the snapshot of a tree to a file.
pub struct CsvSnapshot {
    path: PathBuf,
}

impl CsvSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for CsvSnapshot {
    fn export_tree(&self, tree: &ProductTree) -> Result<(), export::Error> {
        info!(file_name:? = self.path, products = tree.len(); "Writing product tree snapshot");
        write_atomically(&self.path, |file| write_tree(tree, file))
    }
}
