//! Error adapter for converting PtreeError to miette diagnostics.
//!
//! This module bridges the library's error type and miette's report
//! formatting used in the CLI.

use std::fmt;

use miette::{Diagnostic as MietteDiagnostic, LabeledSpan};

use ptree::PtreeError;
use ptree_magicdraw::ExtractError;

/// Adapter giving every [`PtreeError`] a diagnostic code and, where the
/// remedy is known, a help line.
pub struct ErrorAdapter(pub PtreeError);

impl fmt::Debug for ErrorAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ErrorAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ErrorAdapter {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl MietteDiagnostic for ErrorAdapter {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match &self.0 {
            PtreeError::Io(_) => "ptree::io",
            PtreeError::Extract(_) => "ptree::extract",
            PtreeError::Tree(_) => "ptree::tree",
            PtreeError::Csv(_) => "ptree::csv",
            PtreeError::Config(_) => "ptree::config",
            PtreeError::Export(_) => "ptree::export",
            PtreeError::Github(_) => "ptree::github",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match &self.0 {
            PtreeError::Extract(ExtractError::MissingProductKey { .. }) => {
                "every package and class of the product tree needs a `product key` attribute"
            }
            PtreeError::Extract(ExtractError::RateLimitExhausted { .. }) => {
                "raise `gateway.max_retries` or remove it to retry without bound"
            }
            PtreeError::Config(_) => "see `ptree --help` for the configuration search order",
            _ => return None,
        };
        Some(Box::new(help))
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        None
    }
}
