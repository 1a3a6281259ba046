//! tstprj-core: codec, tree model and queries for VoiSona .tstprj files
//!
//! This crate focuses on a small, well-factored surface:
//! - Binary reader/writer for the tstprj element/attribute stream
//! - Arena tree model shared by the project tree and derived markup trees
//! - Lazy parser and renderer for the embedded tsml markup dialect
//! - Dot-separated key-path queries, JSON/markup projections for CLI use
//! - Project file discovery and zip backup
//!
pub mod backup;
pub mod binfmt;
pub mod binfmt_write;
pub mod bytes;
pub mod error;
pub mod json;
pub mod keypath;
pub mod markup;
pub mod model;
pub mod project;

pub use binfmt::parse;
pub use binfmt_write::{serialize_element, serialize_tree};
pub use error::{Error, Result};
pub use keypath::{
    AttrRef, ElemRef, QueryNode, attributes_by_keys, attributes_by_path, elements_by_keys,
    elements_by_path,
};
pub use markup::{element_text, escape_text, fragment_text, parse_fragment, unescape_text};
pub use model::{AttrType, AttrValue, Attribute, MARKUP_KEY, NodeId, ROOT_KEY, Tree};
pub use project::Project;
