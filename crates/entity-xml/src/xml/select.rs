//! XPath selection over an [`XmlDocument`] through `sxd-xpath`.
//!
//! The element tree is mirrored into an `sxd-document` package for the
//! length of one query, since the tree is queried while it is still being
//! built. Unprefixed elements are mirrored without a namespace, so `Name`
//! matches `<Name>` under a default namespace declaration. Prefixes in scope
//! at the context node are registered for the query; `namespaces` adds to or
//! overrides them.

use sxd_document::Package;
use sxd_document::dom::{Document, Element};
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, Value as XPathValue};

use super::utils::split_qname;
use super::{NodeId, XmlDocument, XotNode};
use crate::error::TreeError;
use crate::rules::Namespaces;

pub(super) fn select(
    doc: &XmlDocument,
    node: NodeId,
    path: &str,
    namespaces: Option<&Namespaces>,
) -> Result<Vec<NodeId>, TreeError> {
    let invalid = |reason: String| TreeError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    let context_node = doc.node(node)?;
    let xpath = Factory::new()
        .build(path)
        .map_err(|e| invalid(e.to_string()))?
        .ok_or_else(|| invalid("empty expression".to_string()))?;

    let package = Package::new();
    let mirror = package.as_document();
    let mut handles = Vec::new();
    let root = mirror_element(doc, mirror, doc.node(doc.root())?, &mut handles);
    mirror.root().append_child(root);
    let start = handles
        .iter()
        .find(|(source, _)| *source == context_node)
        .map(|(_, element)| *element)
        .ok_or_else(|| TreeError::NodeNotFound(format!("{:?} is not attached to the document", node)))?;

    let mut context = Context::new();
    for (prefix, uri) in doc.in_scope_prefixes(context_node).iter() {
        context.set_namespace(prefix, uri);
    }
    for (prefix, uri) in namespaces.into_iter().flat_map(Namespaces::iter) {
        context.set_namespace(prefix, uri);
    }

    let nodes = match xpath.evaluate(&context, start) {
        Ok(XPathValue::Nodeset(nodes)) => nodes,
        Ok(_) => return Err(invalid("expression does not select nodes".to_string())),
        Err(e) => return Err(invalid(e.to_string())),
    };
    Ok(nodes
        .document_order()
        .into_iter()
        .filter_map(|found| match found {
            Node::Element(element) => handles
                .iter()
                .find(|(_, mirrored)| *mirrored == element)
                .and_then(|(source, _)| doc.ids.get(source).copied()),
            _ => None,
        })
        .collect())
}

fn mirror_element<'d>(
    doc: &XmlDocument,
    mirror: Document<'d>,
    node: XotNode,
    handles: &mut Vec<(XotNode, Element<'d>)>,
) -> Element<'d> {
    let qualified = doc.qualified_name(node).unwrap_or_default();
    let element = match (split_qname(&qualified), doc.xot.element(node)) {
        ((Some(_), local), Some(value)) => {
            let namespace = doc.xot.namespace_for_name(value.name());
            mirror.create_element((doc.xot.namespace_str(namespace), local))
        }
        ((_, local), _) => mirror.create_element(local),
    };
    handles.push((node, element));

    for (name, value) in doc.xot.attributes(node).iter() {
        let name: xot::NameId = name.to_owned();
        let local = doc.xot.local_name_str(name);
        let namespace = doc.xot.namespace_for_name(name);
        if namespace == doc.xot.no_namespace() {
            element.set_attribute_value(local, value.as_str());
        } else {
            element.set_attribute_value((doc.xot.namespace_str(namespace), local), value.as_str());
        }
    }

    for child in doc.xot.children(node) {
        if doc.xot.is_element(child) {
            let mirrored = mirror_element(doc, mirror, child, handles);
            element.append_child(mirrored);
        } else if let Some(text) = doc.xot.text_str(child) {
            element.append_child(mirror.create_text(text));
        }
    }
    element
}
