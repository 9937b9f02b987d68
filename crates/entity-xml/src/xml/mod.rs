//! The XML tree the mapper builds into.
//!
//! [`XmlDocument`] wraps a [`xot::Xot`] arena and hands out [`NodeId`]
//! handles for the elements it creates. It offers the DOM-like primitives the
//! tree builder needs (create, append, attribute, text, select, rename);
//! serialization goes through xot's serializer and path selection through
//! `sxd-xpath`.
//!
//! ## Names and namespaces
//!
//! Names are given as qualified strings. When an element is attached (or
//! renamed, or a declaration is added to the document element) its prefix is
//! resolved against the declarations in scope; an unprefixed name takes the
//! default namespace in scope, as it reads in the serialized text. A prefix
//! with no declaration in scope is rejected.
//!
//! An element created with an explicit namespace URI carries its own
//! declaration until it is attached under a scope that already binds it.
//!
//! ```
//! use entity_xml::xml::XmlDocument;
//!
//! let mut doc = XmlDocument::empty("root", None)?;
//! let root = doc.root();
//! let child = doc.append_child(root, "item", Some("a & b"), None)?;
//! doc.add_attribute(child, "id", "1")?;
//!
//! assert_eq!(
//!     doc.node_to_string(root, false)?,
//!     r#"<root><item id="1">a &amp; b</item></root>"#
//! );
//! # Ok::<(), entity_xml::TreeError>(())
//! ```

mod select;
pub mod utils;
mod writer;

use std::collections::HashMap;
use std::fmt;

use xot::{NameId, NamespaceId, PrefixId, Xot};

use crate::error::TreeError;
use crate::rules::Namespaces;
use utils::{sanitize_name, split_qname, validate_name};

type XotNode = xot::Node;

/// Handle to an element of an [`XmlDocument`]. Only meaningful for the
/// document that created it; other documents answer
/// [`TreeError::NodeNotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// An in-memory XML document with a single document element.
pub struct XmlDocument {
    xot: Xot,
    /// Elements in creation order; `NodeId` indexes this.
    nodes: Vec<XotNode>,
    ids: HashMap<XotNode, NodeId>,
    /// Elements whose text is written as CDATA.
    cdata: Vec<XotNode>,
}

impl XmlDocument {
    /// Creates a document holding only its document element.
    pub fn empty(name: &str, namespace_uri: Option<&str>) -> Result<Self, TreeError> {
        let mut doc = XmlDocument {
            xot: Xot::new(),
            nodes: Vec::new(),
            ids: HashMap::new(),
            cdata: Vec::new(),
        };
        let root = doc.create_element(name, namespace_uri)?;
        let element = doc.node(root)?;
        doc.xot.new_document_with_element(element)?;
        doc.resolve_name(element)?;
        Ok(doc)
    }

    /// The document element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Creates a detached element. Without a namespace URI, illegal name
    /// characters are replaced by `_` before validation.
    pub fn create_element(
        &mut self,
        name: &str,
        namespace_uri: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        let name = match namespace_uri {
            Some(_) => name.to_string(),
            None => sanitize_name(name),
        };
        validate_name(&name)?;

        let element = match namespace_uri {
            Some(uri) => {
                let (prefix, local) = split_qname(&name);
                let prefix = self.prefix_id(prefix.unwrap_or(""));
                let namespace = self.xot.add_namespace(uri);
                let name = self.xot.add_name_ns(local, namespace);
                let element = self.xot.new_element(name);
                self.xot.namespaces_mut(element).insert(prefix, namespace);
                element
            }
            None => {
                let name = self.xot.add_name(&name);
                self.xot.new_element(name)
            }
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(element);
        self.ids.insert(element, id);
        Ok(id)
    }

    /// Appends a detached element (or moves an attached one) under `parent`.
    pub fn append_node(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if child == self.root() || self.xot.ancestors(parent_node).any(|n| n == child_node) {
            return Err(TreeError::NodeNotFound(format!(
                "cannot append {:?} under its own descendant {:?}",
                child, parent
            )));
        }
        if self.xot.parent(child_node).is_some() {
            self.xot.detach(child_node)?;
        }
        self.xot.append(parent_node, child_node)?;
        self.drop_inherited_declarations(child_node);

        let subtree: Vec<XotNode> = self
            .xot
            .descendants(child_node)
            .filter(|n| self.xot.is_element(*n))
            .collect();
        for element in subtree {
            self.resolve_name(element)?;
        }
        Ok(())
    }

    /// Appends a new element under `parent`, optionally holding `text`.
    pub fn append_child(
        &mut self,
        parent: NodeId,
        name: &str,
        text: Option<&str>,
        namespace_uri: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        let child = self.create_element(name, namespace_uri)?;
        self.append_node(parent, child)?;
        if let Some(text) = text {
            self.add_text(child, text, false)?;
        }
        Ok(child)
    }

    /// Sets an attribute, replacing any previous value under the same name.
    pub fn add_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), TreeError> {
        validate_name(name)?;
        let element = self.node(node)?;
        let name_id = match split_qname(name) {
            (Some(prefix), local) => {
                let prefix_id = self.prefix_id(prefix);
                let namespace = self
                    .bound_namespace(element, prefix_id)
                    .ok_or_else(|| TreeError::UndeclaredPrefix {
                        name: name.to_string(),
                        prefix: prefix.to_string(),
                    })?;
                self.xot.add_name_ns(local, namespace)
            }
            (None, local) => self.xot.add_name(local),
        };
        self.xot
            .attributes_mut(element)
            .insert(name_id, value.to_string());
        Ok(())
    }

    /// Appends text to an element. Empty text is not inserted; CDATA text is
    /// written as a CDATA section.
    pub fn add_text(&mut self, node: NodeId, text: &str, as_cdata: bool) -> Result<(), TreeError> {
        let element = self.node(node)?;
        if text.is_empty() {
            return Ok(());
        }
        self.xot.append_text(element, text)?;
        if as_cdata && !self.cdata.contains(&element) {
            self.cdata.push(element);
        }
        Ok(())
    }

    /// Declares a namespace on the document element.
    pub fn add_namespace(&mut self, prefix: &str, uri: &str) -> Result<(), TreeError> {
        if !prefix.is_empty() {
            validate_name(prefix)?;
        }
        let root = self.node(self.root())?;
        let prefix_id = self.prefix_id(prefix);
        let namespace = self.xot.add_namespace(uri);
        self.xot.namespaces_mut(root).insert(prefix_id, namespace);

        let elements: Vec<XotNode> = self
            .xot
            .descendants(root)
            .filter(|n| self.xot.is_element(*n))
            .collect();
        for element in elements {
            self.resolve_name(element)?;
        }
        Ok(())
    }

    /// URI bound to `prefix` (empty for the default namespace) in scope at `node`.
    pub fn lookup_namespace_uri(&self, node: NodeId, prefix: &str) -> Option<&str> {
        let element = self.node(node).ok()?;
        let prefix_id = if prefix.is_empty() {
            self.xot.empty_prefix()
        } else {
            self.xot.prefix(prefix)?
        };
        self.bound_namespace(element, prefix_id)
            .map(|namespace| self.xot.namespace_str(namespace))
    }

    /// Namespace URI of an element, if it is in one.
    pub fn namespace_uri(&self, node: NodeId) -> Option<&str> {
        let element = self.xot.element(self.node(node).ok()?)?;
        let namespace = self.xot.namespace_for_name(element.name());
        (namespace != self.xot.no_namespace()).then(|| self.xot.namespace_str(namespace))
    }

    /// All elements matching the XPath expression `path`, evaluated relative
    /// to `node`, in document order.
    pub fn select_nodes(
        &self,
        node: NodeId,
        path: &str,
        namespaces: Option<&Namespaces>,
    ) -> Result<Vec<NodeId>, TreeError> {
        select::select(self, node, path, namespaces)
    }

    /// The first element matching `path`, evaluated relative to `node`.
    pub fn select_single_node(
        &self,
        node: NodeId,
        path: &str,
        namespaces: Option<&Namespaces>,
    ) -> Result<Option<NodeId>, TreeError> {
        Ok(self.select_nodes(node, path, namespaces)?.into_iter().next())
    }

    /// Renames an element in place; the handle stays valid.
    pub fn rename_node(&mut self, node: NodeId, new_name: &str) -> Result<NodeId, TreeError> {
        validate_name(new_name)?;
        let element = self.node(node)?;
        let name = self.xot.add_name(new_name);
        if let Some(value) = self.xot.element_mut(element) {
            value.set_name(name);
        }
        self.resolve_name(element)?;
        Ok(node)
    }

    /// Qualified name of an element, with the prefix it serializes under.
    pub fn name(&self, node: NodeId) -> Option<String> {
        self.qualified_name(self.node(node).ok()?)
    }

    /// Concatenated text of the element and its descendants.
    pub fn text(&self, node: NodeId) -> String {
        let Ok(element) = self.node(node) else {
            return String::new();
        };
        self.xot
            .descendants(element)
            .filter_map(|n| self.xot.text_str(n))
            .collect()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        let element = self.node(node).ok()?;
        let name_id = match split_qname(name) {
            (Some(prefix), local) => {
                let namespace = self.bound_namespace(element, self.xot.prefix(prefix)?)?;
                self.xot.name_ns(local, namespace)?
            }
            (None, local) => self.xot.name(local)?,
        };
        self.xot
            .attributes(element)
            .get(name_id)
            .map(|value| value.as_str())
    }

    /// Child elements, in document order.
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Ok(element) = self.node(node) else {
            return Vec::new();
        };
        self.xot
            .children(element)
            .filter_map(|child| self.ids.get(&child).copied())
            .collect()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.xot.parent(self.node(node).ok()?)?;
        self.ids.get(&parent).copied()
    }

    /// Whether the element has any children (elements or text).
    pub fn has_content(&self, node: NodeId) -> bool {
        self.node(node)
            .map(|element| self.xot.children(element).next().is_some())
            .unwrap_or(false)
    }

    fn node(&self, id: NodeId) -> Result<XotNode, TreeError> {
        self.nodes
            .get(id.0)
            .copied()
            .ok_or_else(|| TreeError::NodeNotFound(format!("{:?} does not belong to this document", id)))
    }

    fn prefix_id(&mut self, prefix: &str) -> PrefixId {
        if prefix.is_empty() {
            self.xot.empty_prefix()
        } else {
            self.xot.add_prefix(prefix)
        }
    }

    /// Namespace `prefix` resolves to at `node`, ignoring the "no namespace"
    /// binding of an undeclared default.
    fn bound_namespace(&self, node: XotNode, prefix: PrefixId) -> Option<NamespaceId> {
        self.xot
            .namespace_for_prefix(node, prefix)
            .filter(|namespace| *namespace != self.xot.no_namespace())
    }

    fn qualified_name(&self, node: XotNode) -> Option<String> {
        let name = self.xot.element(node)?.name();
        let local = self.xot.local_name_str(name);
        let namespace = self.xot.namespace_for_name(name);
        if namespace == self.xot.no_namespace() {
            return Some(local.to_string());
        }
        match self.xot.prefix_for_namespace(node, namespace) {
            Some(prefix) if prefix != self.xot.empty_prefix() => {
                Some(format!("{}:{}", self.xot.prefix_str(prefix), local))
            }
            _ => Some(local.to_string()),
        }
    }

    /// Puts an element whose name is still an unresolved qualified string
    /// into the namespace its prefix is bound to.
    fn resolve_name(&mut self, node: XotNode) -> Result<(), TreeError> {
        let Some(element) = self.xot.element(node) else {
            return Ok(());
        };
        let name: NameId = element.name();
        if self.xot.namespace_for_name(name) != self.xot.no_namespace() {
            return Ok(());
        }
        let literal = self.xot.local_name_str(name).to_string();
        let (prefix, local) = split_qname(&literal);
        let prefix_id = self.prefix_id(prefix.unwrap_or(""));

        match (self.bound_namespace(node, prefix_id), prefix) {
            (Some(namespace), _) => {
                let resolved = self.xot.add_name_ns(local, namespace);
                if let Some(element) = self.xot.element_mut(node) {
                    element.set_name(resolved);
                }
                Ok(())
            }
            (None, Some(prefix)) if self.is_attached(node) => Err(TreeError::UndeclaredPrefix {
                name: literal.clone(),
                prefix: prefix.to_string(),
            }),
            (None, _) => Ok(()),
        }
    }

    fn is_attached(&self, node: XotNode) -> bool {
        self.nodes.first() == Some(&node) || self.xot.parent(node).is_some()
    }

    /// Removes the declarations an element carries for bindings its new
    /// parent already provides. An unprefixed element whose namespace is
    /// bound to a prefix in scope drops its default declaration and takes
    /// that prefix.
    fn drop_inherited_declarations(&mut self, node: XotNode) {
        let Some(parent) = self.xot.parent(node) else {
            return;
        };
        let own: Vec<(PrefixId, NamespaceId)> = self
            .xot
            .namespaces(node)
            .iter()
            .map(|(prefix, namespace)| (prefix.to_owned(), namespace.to_owned()))
            .collect();
        let redundant: Vec<PrefixId> = own
            .into_iter()
            .filter(|(prefix, namespace)| {
                self.bound_namespace(parent, *prefix) == Some(*namespace)
                    || (*prefix == self.xot.empty_prefix()
                        && self.xot.prefix_for_namespace(parent, *namespace).is_some())
            })
            .map(|(prefix, _)| prefix)
            .collect();
        for prefix in redundant {
            self.xot.namespaces_mut(node).remove(prefix);
        }
    }

    /// Non-default prefixes in scope at `node`, innermost binding first.
    fn in_scope_prefixes(&self, node: XotNode) -> Namespaces {
        let mut scope = Namespaces::new();
        for ancestor in self.xot.ancestors(node) {
            for (prefix, namespace) in self.xot.namespaces(ancestor).iter() {
                let prefix: PrefixId = prefix.to_owned();
                let namespace: NamespaceId = namespace.to_owned();
                if prefix == self.xot.empty_prefix() {
                    continue;
                }
                let prefix = self.xot.prefix_str(prefix);
                if scope.get(prefix).is_none() {
                    scope.insert(prefix, self.xot.namespace_str(namespace));
                }
            }
        }
        scope
    }
}

impl fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlDocument")
            .field("root", &self.name(self.root()))
            .field("elements", &self.nodes.len())
            .finish()
    }
}
