//! # Ptree MagicDraw
//!
//! Extraction of a [`ProductTree`] from the MagicDraw/TWCloud element REST
//! API. The pipeline walks the remote element graph from a top package:
//!
//! 1. **Gateway** - Fetch element records by id ([`ElementGateway`])
//! 2. **Properties** - Flatten instance slots into a [`PropertyMap`]
//! 3. **Relations** - Classify typed-element associations as depends-on or used-in
//! 4. **Build** - Assemble products and insert them into the tree ([`TreeBuilder`])
//!
//! All per-run caches live in a [`BuildSession`].
//!
//! ## Usage
//!
//! ```no_run
//! # use ptree_magicdraw::{BuildSession, ExtractError, HttpGateway, TreeBuilder};
//! fn main() -> Result<(), ExtractError> {
//!     let gateway = HttpGateway::new(
//!         "https://twcloud.lsst.org:8111/osmc",
//!         "698d501b-660d-4d7e-8875-c6170ca0f513",
//!         "dXNlcjpwYXNzd29yZA==",
//!     )?;
//!     let mut session = BuildSession::new(&gateway);
//!     let tree = TreeBuilder::new(&mut session).build("d7ff2d7a-7f8a-4b2a-9c4b-6d3d7f7c0c1e")?;
//!     println!("{} products", tree.len());
//!     Ok(())
//! }
//! ```
//!
//! [`ProductTree`]: ptree_core::tree::ProductTree

mod builder;
mod error;
mod gateway;
mod properties;
mod relations;
mod retry;
mod session;

pub use builder::TreeBuilder;
pub use error::ExtractError;
pub use gateway::{ElementGateway, ElementKind, ElementRecord, GatewayError, HttpGateway, InMemoryGateway};
pub use properties::{PropertyMap, keys, resolve_properties};
pub use relations::{ClassifiedRelation, RelationKind, apply_relation, resolve_relation};
pub use retry::{CancellationFlag, RetryPolicy};
pub use session::BuildSession;
