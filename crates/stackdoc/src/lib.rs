//! Building blocks for infrastructure-as-code documents: templates with resources, parameters and
//! outputs, intrinsic functions, tokens that embed intrinsics into rendered text, parameter imports
//! between a parent document and its nested documents, content-derived identifiers and the textual
//! formats used to stage documents.

pub mod error;
pub mod format;
pub mod ids;
pub mod imports;
pub mod intrinsic;
pub mod template;
pub mod token;

pub use crate::error::Error;
pub use crate::format::{FileFormat, format_content};
pub use crate::imports::StackImports;
pub use crate::template::{Output, Parameter, Resource, Template};
pub use crate::token::TokenMap;

pub type Result<T> = std::result::Result<T, Error>;

/// Ordered map used for every document section, so that rendering is deterministic.
pub type Map<K, V> = std::collections::BTreeMap<K, V>;

pub use serde_json::Value;
