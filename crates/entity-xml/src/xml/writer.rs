//! Serialization of [`XmlDocument`] through xot's XML serializer.

use std::io::Write;
use std::path::Path;

use xot::output::Indentation;
use xot::output::xml::Parameters;

use super::utils::XML_DECLARATION;
use super::{NodeId, XmlDocument};
use crate::error::TreeError;

impl XmlDocument {
    /// The whole document: declaration line, document element, trailing newline.
    pub fn to_xml_string(&self, pretty: bool) -> Result<String, TreeError> {
        let body = self.node_to_string(self.root(), pretty)?;
        Ok(format!("{}\n{}\n", XML_DECLARATION, body))
    }

    /// A single element and its subtree, without declaration.
    pub fn node_to_string(&self, node: NodeId, pretty: bool) -> Result<String, TreeError> {
        let element = self.node(node)?;
        let parameters = Parameters {
            indentation: pretty.then(Indentation::default),
            cdata_section_elements: self
                .cdata
                .iter()
                .filter_map(|n| self.xot.element(*n))
                .map(|e| e.name())
                .collect(),
            ..Default::default()
        };
        Ok(self.xot.serialize_xml_string(parameters, element)?)
    }

    /// Writes the whole document to `out`.
    pub fn write_to<W: Write>(&self, mut out: W, pretty: bool) -> Result<(), TreeError> {
        out.write_all(self.to_xml_string(pretty)?.as_bytes())?;
        Ok(())
    }

    /// Saves the document to a file.
    pub fn save(&self, path: impl AsRef<Path>, pretty: bool) -> Result<(), TreeError> {
        let file = std::fs::File::create(path.as_ref())?;
        let mut buffered = std::io::BufWriter::new(file);
        self.write_to(&mut buffered, pretty)?;
        buffered.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let xml = self.to_xml_string(false).map_err(|_| std::fmt::Error)?;
        f.write_str(&xml)
    }
}
