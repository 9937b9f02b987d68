//! The recursive descent that turns a [`Value`] into elements, attributes and
//! text under a node of an [`XmlDocument`].
//!
//! Each field goes through three stages, in order:
//!
//! 1. **Skip check** (`ignore`, `ignore_empty`, explicit mapping of the
//!    containing type), before any node is created.
//! 2. **Name resolution** ([`FieldRule::rendered_name`]).
//! 3. **Shape dispatch**: containers, then records and anonymous values, then
//!    scalars, which are attached according to their [`Placement`].
//!
//! ## Containers
//!
//! Sequences and mappings are written through a [`Run`]: a cursor over the
//! repeated sibling elements a container produces. Numeric-keyed scalars each
//! land in their own `<name>` sibling (`[1, 2]` under `list` gives
//! `<list>1</list><list>2</list>`), named entries share the current sibling,
//! and numeric-keyed nested containers are flattened into the same run
//! (`[{"a": 1, "b": 2}]` gives `<list><a>1</a><b>2</b></list>`).

use tracing::trace;

use crate::error::{MapError, Result, TreeError};
use crate::resolver::{ResolvedEntity, RuleResolver};
use crate::rules::{DEFAULT_ITEM_NAME, FieldRule, Placement, TypeRule};
use crate::value::{Key, Value};
use crate::xml::utils::split_qname;
use crate::xml::{NodeId, XmlDocument};

/// Writes values into a document.
pub struct TreeBuilder<'d> {
    doc: &'d mut XmlDocument,
}

/// Cursor over the sibling elements produced by one container.
#[derive(Debug)]
struct Run {
    /// Node the siblings are appended to.
    parent: NodeId,
    /// Name of every sibling.
    name: String,
    /// Sibling currently receiving named entries.
    current: Option<NodeId>,
    /// Whether `current` may still take a numeric scalar as its text.
    accepts_text: bool,
    /// `current` is the parent itself and is never replaced.
    anchored: bool,
}

impl Run {
    /// A run for a named container: its first sibling is created eagerly so
    /// an empty container still renders as `<name/>`.
    fn wrapper(doc: &mut XmlDocument, parent: NodeId, name: &str) -> Result<Self> {
        let first = doc.append_child(parent, name, None, None)?;
        Ok(Run {
            parent,
            name: name.to_string(),
            current: Some(first),
            accepts_text: true,
            anchored: false,
        })
    }

    /// A run for numeric keys met directly under a record or the root.
    fn anchored(node: NodeId) -> Self {
        Run {
            parent: node,
            name: DEFAULT_ITEM_NAME.to_string(),
            current: Some(node),
            accepts_text: false,
            anchored: true,
        }
    }

    fn push_text(&mut self, doc: &mut XmlDocument, text: &str) -> Result<()> {
        let fresh = self
            .current
            .filter(|node| self.accepts_text && !doc.has_content(*node));
        match fresh {
            Some(node) => doc.add_text(node, text, false)?,
            None => {
                doc.append_child(self.parent, &self.name, Some(text), None)?;
            }
        }
        if !self.anchored {
            self.current = None;
        }
        self.accepts_text = false;
        Ok(())
    }

    fn target(&mut self, doc: &mut XmlDocument) -> Result<NodeId> {
        match self.current {
            Some(node) => Ok(node),
            None => {
                let node = doc.append_child(self.parent, &self.name, None, None)?;
                self.current = Some(node);
                self.accepts_text = false;
                Ok(node)
            }
        }
    }
}

impl<'d> TreeBuilder<'d> {
    pub fn new(doc: &'d mut XmlDocument) -> Self {
        TreeBuilder { doc }
    }

    /// Writes `value` under `node`, using `type_rule` as the containing type
    /// and `field_rules` for declared fields (defaults when absent).
    pub fn write(
        &mut self,
        value: &Value,
        type_rule: &TypeRule,
        node: NodeId,
        field_rules: Option<&ResolvedEntity>,
    ) -> Result<()> {
        let default_rule = FieldRule::default();
        match value {
            Value::Null => Ok(()),
            Value::Scalar(_) => {
                let text = value.text().unwrap_or_default();
                self.doc.add_text(node, &text, false)?;
                Ok(())
            }
            Value::Record(record) => {
                for (field, field_value) in record.fields() {
                    let rule = field_rules
                        .and_then(|rules| rules.field_rule(field))
                        .unwrap_or(&default_rule);
                    self.write_field(record.type_name(), type_rule, field, field_value, rule, node)?;
                }
                Ok(())
            }
            Value::Mapping(entries) => {
                let mut run = Run::anchored(node);
                for (key, entry) in entries {
                    if key.is_numeric() {
                        self.write_entry(&mut run, key, entry)?;
                    } else {
                        let field = key.as_name();
                        self.write_field(
                            &type_rule.element_name,
                            type_rule,
                            &field,
                            entry,
                            &default_rule,
                            node,
                        )?;
                    }
                }
                Ok(())
            }
            Value::Sequence(items) => {
                let mut run = Run::anchored(node);
                for (index, item) in items.iter().enumerate() {
                    self.write_entry(&mut run, &Key::Index(index), item)?;
                }
                Ok(())
            }
            Value::Anonymous(accessors) => {
                let plain = TypeRule::untyped();
                for (name, getter_value) in accessors.iter() {
                    if getter_value.is_null() {
                        trace!(getter = name, "Skipping null getter");
                        continue;
                    }
                    self.write_field(
                        &plain.element_name,
                        &plain,
                        name,
                        getter_value,
                        &default_rule,
                        node,
                    )?;
                }
                Ok(())
            }
        }
    }

    /// Declares a type's namespaces on the document and applies its prefix
    /// to `node`.
    pub(crate) fn adopt(doc: &mut XmlDocument, node: NodeId, type_rule: &TypeRule) -> Result<()> {
        for (prefix, uri) in type_rule.namespaces.iter() {
            doc.add_namespace(prefix, uri)?;
        }
        Self::apply_prefix(doc, node, type_rule.prefix.as_deref())
    }

    /// Renames `node` to carry `prefix` unless it already does.
    pub(crate) fn apply_prefix(doc: &mut XmlDocument, node: NodeId, prefix: Option<&str>) -> Result<()> {
        let Some(prefix) = prefix else {
            return Ok(());
        };
        let current = doc
            .name(node)
            .ok_or_else(|| TreeError::NodeNotFound(format!("{:?} does not belong to this document", node)))?;
        if let Some(renamed) = prefixed_name(&current, prefix) {
            doc.rename_node(node, &renamed)?;
        }
        Ok(())
    }

    fn write_field(
        &mut self,
        owner: &str,
        type_rule: &TypeRule,
        field: &str,
        value: &Value,
        rule: &FieldRule,
        node: NodeId,
    ) -> Result<()> {
        if rule.ignore {
            trace!(owner, field, "Skipping ignored field");
            return Ok(());
        }
        if rule.ignore_if_empty && value.is_empty() {
            trace!(owner, field, "Skipping empty field");
            return Ok(());
        }
        if type_rule.explicit_mapping_only && rule.name.is_none() {
            trace!(owner, field, "Skipping field without explicit name");
            return Ok(());
        }

        let name = rule.rendered_name(field, type_rule);
        for (prefix, uri) in rule.namespaces.iter() {
            self.doc.add_namespace(prefix, uri)?;
        }

        if rule.placement != Placement::Element && !value.is_scalar() && !value.is_null() {
            return Err(MapError::invalid_field(
                owner,
                field,
                format!(
                    "{} placement requires a scalar value, found {}",
                    placement_label(&rule.placement),
                    value.kind()
                ),
            ));
        }

        match value {
            Value::Sequence(_) | Value::Mapping(_) => {
                let mut run = Run::wrapper(self.doc, node, &name)?;
                self.write_entries(&mut run, value)
            }
            Value::Record(_) | Value::Anonymous(_) => self.write_nested(node, &name, value),
            Value::Scalar(_) | Value::Null => {
                let text = value.text().unwrap_or_default();
                self.place_scalar(type_rule, field, &name, &text, &rule.placement, node)
            }
        }
    }

    fn write_entries(&mut self, run: &mut Run, container: &Value) -> Result<()> {
        match container {
            Value::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    self.write_entry(run, &Key::Index(index), item)?;
                }
            }
            Value::Mapping(entries) => {
                for (key, entry) in entries {
                    self.write_entry(run, key, entry)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn write_entry(&mut self, run: &mut Run, key: &Key, entry: &Value) -> Result<()> {
        match entry {
            Value::Null => Ok(()),
            Value::Scalar(_) => {
                let text = entry.text().unwrap_or_default();
                if key.is_numeric() {
                    run.push_text(self.doc, &text)
                } else {
                    let target = run.target(self.doc)?;
                    self.doc.append_child(target, &key.as_name(), Some(&text), None)?;
                    Ok(())
                }
            }
            Value::Sequence(_) | Value::Mapping(_) => {
                if key.is_numeric() {
                    self.write_entries(run, entry)
                } else {
                    let target = run.target(self.doc)?;
                    let mut inner = Run::wrapper(self.doc, target, &key.as_name())?;
                    self.write_entries(&mut inner, entry)
                }
            }
            Value::Record(_) | Value::Anonymous(_) => {
                let target = run.target(self.doc)?;
                let name = RuleResolver::type_rule(entry)?.element_name;
                self.write_nested(target, &name, entry)
            }
        }
    }

    /// Writes a record or anonymous value as a new `<name>` child of `parent`.
    fn write_nested(&mut self, parent: NodeId, name: &str, value: &Value) -> Result<()> {
        let resolved = RuleResolver::field_rules(value)?;
        let type_rule = match &resolved {
            Some(entity) => entity.type_rule.clone(),
            None => TypeRule::untyped(),
        };
        let child = self.doc.append_child(parent, name, None, None)?;
        Self::adopt(self.doc, child, &type_rule)?;
        self.write(value, &type_rule, child, resolved.as_deref())
    }

    fn place_scalar(
        &mut self,
        type_rule: &TypeRule,
        field: &str,
        name: &str,
        text: &str,
        placement: &Placement,
        node: NodeId,
    ) -> Result<()> {
        match placement {
            Placement::Element => {
                let qualified = format!("{}{}", type_rule.prefix_qualifier(), name);
                self.doc.append_child(node, &qualified, Some(text), None)?;
            }
            Placement::Attribute => self.doc.add_attribute(node, name, text)?,
            Placement::ChildOf(path) => {
                let target = self.select_target(node, field, path.as_str())?;
                self.doc.append_child(target, name, Some(text), None)?;
            }
            Placement::AttributeOf(path) => {
                let target = self.select_target(node, field, path.as_str())?;
                self.doc.add_attribute(target, name, text)?;
            }
        }
        Ok(())
    }

    fn select_target(&self, node: NodeId, field: &str, path: &str) -> Result<NodeId> {
        self.doc
            .select_single_node(node, path, None)?
            .ok_or_else(|| MapError::TargetNodeNotFound {
                field: field.to_string(),
                path: path.to_string(),
            })
    }
}

/// The name `current` takes under `prefix`, or `None` when it already carries it.
fn prefixed_name(current: &str, prefix: &str) -> Option<String> {
    match split_qname(current) {
        (Some(existing), _) if existing == prefix => None,
        (_, local) => Some(format!("{}:{}", prefix, local)),
    }
}

fn placement_label(placement: &Placement) -> &'static str {
    match placement {
        Placement::Element => "element",
        Placement::Attribute => "attribute",
        Placement::AttributeOf(_) => "attribute_of",
        Placement::ChildOf(_) => "child_of",
    }
}
