//! Error types for entity-to-XML mapping.
//!
//! Every error aborts the `parse` call that raised it; the mapper never returns
//! a partially built document.

use thiserror::Error;

/// Errors raised while resolving mapping rules or building the element tree.
#[derive(Error, Debug)]
pub enum MapError {
    /// A type carries more than one type-level mapping declaration.
    #[error("ambiguous type mapping: '{type_name}' declares {count} type-level rules")]
    AmbiguousTypeMapping { type_name: String, count: usize },

    /// A field declares placements that cannot be combined, or a redirected
    /// placement on a value that is not a scalar.
    #[error("invalid configuration for field '{field}' of '{type_name}': {reason}")]
    InvalidFieldConfiguration {
        type_name: String,
        field: String,
        reason: String,
    },

    /// An `attribute_of`/`child_of` path matched nothing in the document built so far.
    #[error("target node not found for field '{field}': no node matches '{path}'")]
    TargetNodeNotFound { field: String, path: String },

    /// Failure surfaced by the document tree.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Failure while converting a `Serialize` value into a mapping value.
    #[error("serialization error: {0}")]
    Serialize(String),
}

/// Errors raised by [`XmlDocument`](crate::xml::XmlDocument).
#[derive(Error, Debug)]
pub enum TreeError {
    /// The element or attribute name is not a legal XML name.
    #[error("invalid XML name '{0}'")]
    InvalidName(String),

    /// The path expression could not be compiled, or does not select nodes.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// The handle does not name an element of this document, or the
    /// requested move would create a cycle.
    #[error("node not found: '{0}'")]
    NodeNotFound(String),

    /// A qualified name uses a prefix with no declaration in scope.
    #[error("prefix '{prefix}' of '{name}' is not declared")]
    UndeclaredPrefix { name: String, prefix: String },

    /// Failure reported by the underlying xot tree or its serializer.
    #[error("XML tree error: {0}")]
    Xot(#[from] xot::Error),

    /// IO error while writing a document to disk.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MapError {
    pub(crate) fn invalid_field(
        type_name: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        MapError::InvalidFieldConfiguration {
            type_name: type_name.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for MapError {
    fn from(err: std::io::Error) -> Self {
        MapError::Tree(TreeError::Io(err))
    }
}

// The serde bridge reports its failures through this impl.
impl serde::ser::Error for MapError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        MapError::Serialize(msg.to_string())
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_error_is_transparent() {
        let err: MapError = TreeError::InvalidName("1abc".to_string()).into();
        assert_eq!(err.to_string(), "invalid XML name '1abc'");
    }

    #[test]
    fn test_invalid_field_message() {
        let err = MapError::invalid_field("Person", "age", "attribute_of and child_of are exclusive");
        assert_eq!(
            err.to_string(),
            "invalid configuration for field 'age' of 'Person': attribute_of and child_of are exclusive"
        );
    }
}
