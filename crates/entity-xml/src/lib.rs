#![doc = include_str!("../README.md")]
//!
//! ## Overview
//!
//! A value goes through three stages:
//!
//! - **Conversion** into a [`Value`] through [`ToXmlValue`] (derived for
//!   annotated structs, implemented for std collections, numbers, strings,
//!   `serde_json::Value` and `chrono` types) or through [`to_value`] for any
//!   `serde::Serialize` type.
//! - **Rule resolution** by the [`RuleResolver`], which reads a type's
//!   declarations once and caches the normalized [`TypeRule`]/[`FieldRule`]s.
//! - **Tree building** by the [`TreeBuilder`] into an [`XmlDocument`], driven by
//!   the [`Mapper`] facade.
//!
//! ## Untyped values
//!
//! Maps and lists render under a `<root>` element with lower-cased keys:
//!
//! ```
//! use serde_json::json;
//!
//! let doc = entity_xml::to_xml_document(&json!({"list": [1, 2]}))?;
//! assert_eq!(
//!     doc.node_to_string(doc.root(), false)?,
//!     "<root><list>1</list><list>2</list></root>"
//! );
//! # Ok::<(), entity_xml::MapError>(())
//! ```

// Lets the derive's `::entity_xml` paths resolve inside this crate's own tests.
extern crate self as entity_xml;

pub mod builder;
pub mod error;
pub mod mapper;
pub mod resolver;
pub mod rules;
pub mod ser;
pub mod value;
pub mod xml;

pub use builder::TreeBuilder;
pub use error::{MapError, Result, TreeError};
pub use mapper::{
    Mapper, MapperOptions, serde_to_xml_string, to_xml_document, to_xml_string,
    to_xml_string_pretty,
};
pub use resolver::{ResolvedEntity, RuleResolver};
pub use rules::{
    EntityDecl, EntityMetadata, FieldRule, Namespaces, PathRef, Placement, PropertyDecl,
    TypeRule, XmlEntity,
};
pub use ser::to_value;
pub use value::{Accessors, Key, Record, Scalar, ToXmlValue, TypeKey, Value};
pub use xml::{NodeId, XmlDocument};

#[cfg(feature = "derive")]
pub use entity_xml_macro::XmlEntity;
