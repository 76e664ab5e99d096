//! Error types for the attribute engine.
//!
//! All errors raised by sheet operations are represented by the
//! `AttrError` enum. Every failing operation leaves the sheet as it was.

use crate::name::AttrName;
use crate::node::{AttrType, NodeId};
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[AttrName]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|name| name.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors that can occur while building or mutating a sheet.
///
/// # Examples
///
/// ```rust
/// use statsheet::AttrError;
///
/// let err = AttrError::InvalidValue("'abc' is not a finite number".to_string());
/// assert_eq!(err.to_string(), "Invalid value: 'abc' is not a finite number");
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttrError {
    /// Adding a dependency would have closed a cycle.
    ///
    /// The path is given in "depends on" order and is closed: if A depends
    /// on B and B on A, the path is `[A, B, A]`.
    #[error("Circular dependency: {}", format_cycle_path(.path))]
    CircularDependency { path: Vec<AttrName> },

    /// A string or numeric input could not be accepted.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The operation does not apply to this kind of attribute.
    #[error("Attribute {name} is a {found}, expected {expected}")]
    AttrTypeMismatch {
        name: AttrName,
        expected: &'static str,
        found: AttrType,
    },

    /// The handle does not refer to a live attribute.
    #[error("Unknown attribute handle: {0}")]
    UnknownNode(NodeId),

    /// The attribute reads an aggregate with nothing to reduce.
    #[error("Attribute {0} has no value: an aggregate it reads has no items")]
    NoItems(AttrName),

    /// The attribute cannot be destroyed while another one is built on it.
    #[error("Attribute {name} is still used by {by}")]
    InUse { name: AttrName, by: AttrName },

    /// The edge is part of an attribute's structure and cannot be cut alone.
    #[error("{dependent} structurally depends on {dependency}; that edge cannot be removed")]
    StructuralDependency {
        dependent: AttrName,
        dependency: AttrName,
    },
}
