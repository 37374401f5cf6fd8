//! Ptree Core Types and Definitions
//!
//! This crate provides the foundational types shared by the product tree
//! extractor, the layout engine and the exporters. It includes:
//!
//! - **Products**: The [`product::Product`] record and its relation records
//! - **Tree**: The ordered multi-way [`tree::ProductTree`] keyed by product id
//! - **Text**: Key and TeX sanitizing helpers ([`text`] module)
//! - **Geometry**: Layout directives and canvas dimensions ([`geometry`] module)

pub mod geometry;
pub mod product;
pub mod text;
pub mod tree;
