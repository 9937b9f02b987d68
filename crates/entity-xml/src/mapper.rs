//! The mapper facade: value in, [`XmlDocument`] out.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::builder::TreeBuilder;
use crate::error::Result;
use crate::resolver::RuleResolver;
use crate::rules::TypeRule;
use crate::ser::to_value;
use crate::value::{ToXmlValue, Value};
use crate::xml::utils::split_qname;
use crate::xml::{NodeId, XmlDocument};

/// Output options used when turning a document into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperOptions {
    /// Indent nested elements by two spaces.
    pub pretty: bool,
    /// Emit the `<?xml ...?>` declaration line.
    pub declaration: bool,
}

impl Default for MapperOptions {
    fn default() -> Self {
        MapperOptions {
            pretty: false,
            declaration: true,
        }
    }
}

impl MapperOptions {
    /// Renders a document according to these options.
    pub fn render(&self, doc: &XmlDocument) -> Result<String> {
        if self.declaration {
            Ok(doc.to_xml_string(self.pretty)?)
        } else {
            let mut xml = doc.node_to_string(doc.root(), self.pretty)?;
            xml.push('\n');
            Ok(xml)
        }
    }
}

/// Maps values into XML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mapper;

impl Mapper {
    pub fn new() -> Self {
        Mapper
    }

    /// Builds a new document for `value`.
    ///
    /// The document element takes the value's resolved element name. A
    /// prefixed name whose prefix is declared by the type is created in that
    /// namespace; the remaining declarations are written on the document
    /// element.
    pub fn parse(&self, value: &Value) -> Result<XmlDocument> {
        let resolved = RuleResolver::field_rules(value)?;
        let type_rule = match &resolved {
            Some(entity) => entity.type_rule.clone(),
            None => TypeRule::untyped(),
        };
        debug!(
            root = %type_rule.element_name,
            kind = value.kind(),
            "Mapping value to XML"
        );

        let mut namespaces = type_rule.namespaces.clone();
        let root_uri = split_qname(&type_rule.element_name)
            .0
            .and_then(|prefix| namespaces.remove(prefix));
        let mut doc = XmlDocument::empty(&type_rule.element_name, root_uri.as_deref())?;
        for (prefix, uri) in namespaces.iter() {
            doc.add_namespace(prefix, uri)?;
        }
        let root = doc.root();
        TreeBuilder::apply_prefix(&mut doc, root, type_rule.prefix.as_deref())?;

        TreeBuilder::new(&mut doc).write(value, &type_rule, root, resolved.as_deref())?;
        debug!(
            root = %doc.name(root).unwrap_or_default(),
            "Finished mapping value to XML"
        );
        Ok(doc)
    }

    /// Maps `value` under an existing node of `doc`. The value's namespaces
    /// are declared on the document and its prefix is applied to `node`.
    pub fn append(&self, doc: &mut XmlDocument, node: NodeId, value: &Value) -> Result<()> {
        let resolved = RuleResolver::field_rules(value)?;
        let type_rule = match &resolved {
            Some(entity) => entity.type_rule.clone(),
            None => TypeRule::untyped(),
        };
        debug!(
            node = %doc.name(node).unwrap_or_default(),
            kind = value.kind(),
            "Appending value to XML"
        );
        TreeBuilder::adopt(doc, node, &type_rule)?;
        TreeBuilder::new(doc).write(value, &type_rule, node, resolved.as_deref())
    }
}

/// Maps any convertible value into a document.
pub fn to_xml_document<T>(value: &T) -> Result<XmlDocument>
where
    T: ToXmlValue + ?Sized,
{
    Mapper::new().parse(&value.to_xml_value())
}

/// Maps a value and serializes it with the XML declaration.
///
/// # Examples
///
/// ```
/// use serde_json::json;
///
/// let xml = entity_xml::to_xml_string(&json!({"name": "John"}))?;
/// assert_eq!(
///     xml,
///     "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<root><name>John</name></root>\n"
/// );
/// # Ok::<(), entity_xml::MapError>(())
/// ```
pub fn to_xml_string<T>(value: &T) -> Result<String>
where
    T: ToXmlValue + ?Sized,
{
    MapperOptions::default().render(&to_xml_document(value)?)
}

/// Like [`to_xml_string`], with two-space indentation.
pub fn to_xml_string_pretty<T>(value: &T) -> Result<String>
where
    T: ToXmlValue + ?Sized,
{
    let options = MapperOptions {
        pretty: true,
        ..MapperOptions::default()
    };
    options.render(&to_xml_document(value)?)
}

/// Maps a `Serialize` value with default rules and serializes it.
pub fn serde_to_xml_string<T>(value: &T, options: &MapperOptions) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let doc = Mapper::new().parse(&to_value(value)?)?;
    options.render(&doc)
}
