//! Output writers for product trees and their diagrams.
//!
//! - [`csv`] writes and reads the flat tree snapshot.
//! - [`tikz`] writes a standalone LaTeX/TikZ document for a [`Diagram`].
//! - [`git`] writes the LaTeX section describing each product's packages.
//! - [`dot`] writes a Graphviz graph of each package's dependencies.
//!
//! Files are written through a temporary file in the target directory and
//! moved into place once complete, so a failed export leaves no partial
//! output behind.

pub mod csv;
pub mod dot;
pub mod git;
pub mod tikz;

use std::{
    io::{self, Write},
    path::Path,
};

use log::{debug, error};
use tempfile::NamedTempFile;
use thiserror::Error;

use ptree_core::tree::{ProductTree, TreeError};

use crate::layout::Diagram;

/// A single exporter trait covering trees and diagrams.
pub trait Exporter {
    fn export_tree(&self, _tree: &ProductTree) -> Result<(), Error> {
        Err(Error::Render("Product tree export not implemented".to_string()))
    }

    fn export_diagram(&self, _tree: &ProductTree, _diagram: &Diagram) -> Result<(), Error> {
        Err(Error::Render("Diagram export not implemented".to_string()))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Render error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("Invalid snapshot: {0}")]
    Tree(#[from] TreeError),
}

/// Writes `path` through a temporary file in the same directory.
///
/// `write` receives the temporary file; the file replaces `path` only when
/// `write` succeeds.
pub(crate) fn write_atomically<F>(path: &Path, write: F) -> Result<(), Error>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), Error>,
{
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = match NamedTempFile::new_in(directory) {
        Ok(file) => file,
        Err(err) => {
            error!(file_name:? = path, err:err; "Failed to create temporary file");
            return Err(Error::Io(err));
        }
    };

    write(&mut file)?;
    file.flush()?;
    if let Err(err) = file.persist(path) {
        let err = err.error;
        error!(file_name:? = path, err:err; "Failed to move output into place");
        return Err(Error::Io(err));
    }
    debug!(file_name:? = path; "Output written");
    Ok(())
}
