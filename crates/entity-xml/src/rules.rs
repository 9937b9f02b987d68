//! Mapping rules.
//!
//! Two layers live here:
//!
//! - **Declarations** ([`EntityMetadata`], [`EntityDecl`], [`PropertyDecl`]): what a
//!   type says about itself, as written by `#[derive(XmlEntity)]` or by a manual
//!   [`XmlEntity`] implementation. Declarations may be contradictory.
//! - **Rules** ([`TypeRule`], [`FieldRule`]): the normalized policy the tree builder
//!   consumes, produced by the [`RuleResolver`](crate::resolver::RuleResolver).
//!
//! ## Example
//!
//! ```ignore
//! use entity_xml::XmlEntity;
//!
//! #[derive(XmlEntity)]
//! #[xml(root = "Person", namespace(prefix = "", uri = "http://example.com"))]
//! struct Person {
//!     #[xml(rename = "Name")]
//!     name: String,
//!     #[xml(rename = "Age", attribute)]
//!     age: u32,
//! }
//! ```

use crate::value::Record;

/// Element name used for untyped, anonymous and map-like values.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Element name for numeric-keyed scalars written directly under a record or root.
pub const DEFAULT_ITEM_NAME: &str = "item";

/// Ordered `prefix -> uri` declarations. An empty prefix is the default namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces(Vec<(String, String)>);

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a declaration, replacing the URI of an existing prefix in place.
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        let prefix = prefix.into();
        let uri = uri.into();
        match self.0.iter_mut().find(|(p, _)| *p == prefix) {
            Some(entry) => entry.1 = uri,
            None => self.0.push((prefix, uri)),
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    pub fn remove(&mut self, prefix: &str) -> Option<String> {
        let index = self.0.iter().position(|(p, _)| p == prefix)?;
        Some(self.0.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<P: Into<String>, U: Into<String>> FromIterator<(P, U)> for Namespaces {
    fn from_iter<I: IntoIterator<Item = (P, U)>>(iter: I) -> Self {
        let mut namespaces = Namespaces::new();
        for (prefix, uri) in iter {
            namespaces.insert(prefix, uri);
        }
        namespaces
    }
}

/// A path expression locating a node of the document being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRef(String);

impl PathRef {
    pub fn new(path: impl Into<String>) -> Self {
        PathRef(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Where a scalar field is attached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    /// A child element of the current node.
    #[default]
    Element,
    /// An attribute of the current node.
    Attribute,
    /// An attribute of the node the path selects.
    AttributeOf(PathRef),
    /// A child element of the node the path selects.
    ChildOf(PathRef),
}

impl Placement {
    pub fn is_redirected(&self) -> bool {
        matches!(self, Placement::AttributeOf(_) | Placement::ChildOf(_))
    }
}

/// Normalized per-type policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    /// Root/container element name; never empty, may carry a prefix (`p:Root`).
    pub element_name: String,
    pub namespaces: Namespaces,
    pub preserve_case_self: bool,
    /// Keeps the case of unannotated field names.
    pub preserve_case_children: bool,
    /// Prefix (without colon) applied to the element and its default child elements.
    pub prefix: Option<String>,
    /// Skip every field without an explicit rendered name.
    pub explicit_mapping_only: bool,
}

impl TypeRule {
    /// The rule for untyped, map-like and anonymous values.
    pub fn untyped() -> Self {
        TypeRule::named(DEFAULT_ROOT_NAME)
    }

    pub(crate) fn named(element_name: impl Into<String>) -> Self {
        TypeRule {
            element_name: element_name.into(),
            namespaces: Namespaces::new(),
            preserve_case_self: false,
            preserve_case_children: false,
            prefix: None,
            explicit_mapping_only: false,
        }
    }

    /// `prefix:` ready to be prepended, or an empty string.
    pub fn prefix_qualifier(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:", prefix),
            None => String::new(),
        }
    }
}

impl Default for TypeRule {
    fn default() -> Self {
        TypeRule::untyped()
    }
}

/// Normalized per-field policy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldRule {
    /// Explicit rendered name; `None` renders the field's own name.
    pub name: Option<String>,
    pub namespaces: Namespaces,
    pub preserve_case: bool,
    pub placement: Placement,
    pub ignore: bool,
    pub ignore_if_empty: bool,
}

impl FieldRule {
    /// Rendered name of a field, lower-cased unless case is preserved either
    /// by the field or, for unannotated fields, by the containing type.
    pub fn rendered_name(&self, field_name: &str, type_rule: &TypeRule) -> String {
        let name = self.name.as_deref().unwrap_or(field_name);
        if self.preserve_case || type_rule.preserve_case_children {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }
}

/// Type-level declaration, the equivalent of one `#[xml(...)]` on a struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityDecl {
    pub root: Option<String>,
    pub namespaces: Namespaces,
    pub preserve_case: bool,
    pub preserve_case_children: bool,
    pub prefix: Option<String>,
    pub explicit: bool,
}

impl EntityDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, name: impl Into<String>) -> Self {
        self.root = Some(name.into());
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix, uri);
        self
    }

    pub fn preserve_case(mut self) -> Self {
        self.preserve_case = true;
        self
    }

    pub fn preserve_case_children(mut self) -> Self {
        self.preserve_case_children = true;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn explicit(mut self) -> Self {
        self.explicit = true;
        self
    }
}

/// Field-level declaration, the equivalent of `#[xml(...)]` on a field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyDecl {
    pub rename: Option<String>,
    pub namespaces: Namespaces,
    pub preserve_case: bool,
    pub attribute: bool,
    pub attribute_of: Option<String>,
    pub child_of: Option<String>,
    pub ignore: bool,
    pub ignore_empty: bool,
}

impl PropertyDecl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }

    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix, uri);
        self
    }

    pub fn preserve_case(mut self) -> Self {
        self.preserve_case = true;
        self
    }

    pub fn attribute(mut self) -> Self {
        self.attribute = true;
        self
    }

    pub fn attribute_of(mut self, path: impl Into<String>) -> Self {
        self.attribute_of = Some(path.into());
        self
    }

    pub fn child_of(mut self, path: impl Into<String>) -> Self {
        self.child_of = Some(path.into());
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    pub fn ignore_empty(mut self) -> Self {
        self.ignore_empty = true;
        self
    }
}

/// Everything a type declares about its XML mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityMetadata {
    pub(crate) entities: Vec<EntityDecl>,
    pub(crate) properties: Vec<(String, PropertyDecl)>,
}

impl EntityMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata of a type that declares nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds a type-level declaration. More than one makes the mapping ambiguous.
    pub fn entity(mut self, decl: EntityDecl) -> Self {
        self.entities.push(decl);
        self
    }

    /// Declares a field. A field declared twice keeps its first declaration.
    pub fn property(mut self, field: impl Into<String>, decl: PropertyDecl) -> Self {
        self.properties.push((field.into(), decl));
        self
    }

    pub fn entities(&self) -> &[EntityDecl] {
        &self.entities
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyDecl)> {
        self.properties.iter().map(|(name, decl)| (name.as_str(), decl))
    }
}

/// A type with a declarative XML mapping.
///
/// Usually derived; implement by hand to register the mapping explicitly.
pub trait XmlEntity: 'static {
    /// Declarations of this type. Read once per process by the resolver.
    fn metadata() -> EntityMetadata;

    /// Field values, in declaration order.
    fn to_record(&self) -> Record;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaces_insert_replaces_in_place() {
        let mut ns = Namespaces::new();
        ns.insert("a", "urn:a");
        ns.insert("b", "urn:b");
        ns.insert("a", "urn:a2");
        let pairs: Vec<_> = ns.iter().collect();
        assert_eq!(pairs, vec![("a", "urn:a2"), ("b", "urn:b")]);
        assert_eq!(ns.remove("a").as_deref(), Some("urn:a2"));
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_rendered_name_case_fold() {
        let type_rule = TypeRule::untyped();
        let rule = FieldRule::default();
        assert_eq!(rule.rendered_name("FirstName", &type_rule), "firstname");

        let preserving = FieldRule {
            preserve_case: true,
            ..FieldRule::default()
        };
        assert_eq!(preserving.rendered_name("FirstName", &type_rule), "FirstName");

        let renamed = FieldRule {
            name: Some("Given".to_string()),
            ..FieldRule::default()
        };
        assert_eq!(renamed.rendered_name("first", &type_rule), "given");
    }

    #[test]
    fn test_rendered_name_type_preserves_children() {
        let type_rule = TypeRule {
            preserve_case_children: true,
            ..TypeRule::untyped()
        };
        assert_eq!(
            FieldRule::default().rendered_name("FirstName", &type_rule),
            "FirstName"
        );
    }

    #[test]
    fn test_prefix_qualifier() {
        let mut rule = TypeRule::untyped();
        assert_eq!(rule.prefix_qualifier(), "");
        rule.prefix = Some("addr".to_string());
        assert_eq!(rule.prefix_qualifier(), "addr:");
    }
}
