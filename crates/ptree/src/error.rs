//! Error types for ptree operations.
//!
//! [`PtreeError`] wraps the error conditions of extraction, snapshot
//! loading, diagram export and package enrichment.

use std::io;

use thiserror::Error;

use ptree_core::tree::TreeError;
use ptree_magicdraw::{ExtractError, GatewayError};

use crate::github::GithubError;

/// The main error type for ptree operations.
#[derive(Debug, Error)]
pub enum PtreeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Invalid product tree: {0}")]
    Tree(#[from] TreeError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(Box<dyn std::error::Error + Send + Sync>),

    #[error("GitHub error: {0}")]
    Github(#[from] GithubError),
}

impl From<crate::export::Error> for PtreeError {
    fn from(error: crate::export::Error) -> Self {
        Self::Export(Box::new(error))
    }
}

impl From<GatewayError> for PtreeError {
    fn from(error: GatewayError) -> Self {
        Self::Extract(ExtractError::Gateway(error))
    }
}
