use thiserror::Error;

use ptree_core::tree::TreeError;

use crate::gateway::GatewayError;

/// Fatal errors of a tree extraction run.
///
/// Any of these aborts the whole run; no partial tree is returned.
/// Recoverable conditions (unmapped child elements, odd slot values) are
/// logged and skipped instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("element `{element_id}` is a {kind}, expected a package or class at the top of a product tree")]
    UnexpectedElement { element_id: String, kind: String },

    #[error("element `{element_id}` ({name}) has no `product key` property")]
    MissingProductKey { element_id: String, name: String },

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("extraction cancelled")]
    Cancelled,

    #[error("element `{element_id}` still rate limited after {attempts} attempts")]
    RateLimitExhausted { element_id: String, attempts: u32 },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
