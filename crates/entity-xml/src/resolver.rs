//! Resolution of declarations into normalized rules.
//!
//! Metadata is read once per concrete type and memoized in a process-wide
//! cache that is never invalidated: declarations are fixed for the lifetime
//! of the process.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{MapError, Result};
use crate::rules::{EntityMetadata, FieldRule, PathRef, Placement, PropertyDecl, TypeRule};
use crate::value::{Record, TypeKey, Value};

static RULE_CACHE: Lazy<RwLock<HashMap<TypeKey, Arc<ResolvedEntity>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// The resolved rules of one concrete type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub type_rule: TypeRule,
    /// Rules of the declared fields, in declaration order.
    pub field_rules: Vec<(String, FieldRule)>,
}

impl ResolvedEntity {
    /// The rule of a declared field.
    pub fn field_rule(&self, field: &str) -> Option<&FieldRule> {
        self.field_rules
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rule)| rule)
    }
}

/// Produces [`TypeRule`]s and [`FieldRule`]s for values.
pub struct RuleResolver;

impl RuleResolver {
    /// The type rule of any value. Values without declared structure get the
    /// `root` rule.
    pub fn type_rule(value: &Value) -> Result<TypeRule> {
        match value {
            Value::Record(record) => Ok(Self::resolve(record)?.type_rule.clone()),
            _ => Ok(TypeRule::untyped()),
        }
    }

    /// Field rules of a typed record; `None` for values with no declared structure.
    pub fn field_rules(value: &Value) -> Result<Option<Arc<ResolvedEntity>>> {
        match value {
            Value::Record(record) => Ok(Some(Self::resolve(record)?)),
            _ => Ok(None),
        }
    }

    /// Resolves a record's rules through the cache.
    pub fn resolve(record: &Record) -> Result<Arc<ResolvedEntity>> {
        let key = record.type_key();
        if let Some(hit) = RULE_CACHE.read().get(&key) {
            trace!(type_name = record.type_name(), "Mapping rules cache hit");
            return Ok(Arc::clone(hit));
        }

        let resolved = Arc::new(Self::resolve_metadata(
            record.type_name(),
            record.short_type_name(),
            &record.read_metadata(),
        )?);
        debug!(
            type_name = record.type_name(),
            element = %resolved.type_rule.element_name,
            fields = resolved.field_rules.len(),
            "Resolved XML mapping rules"
        );

        // A concurrent resolver may have won the race; keep whichever landed first.
        let mut cache = RULE_CACHE.write();
        Ok(Arc::clone(cache.entry(key).or_insert(resolved)))
    }

    /// Normalizes declarations without touching the cache.
    pub fn resolve_metadata(
        type_name: &str,
        short_name: &str,
        metadata: &EntityMetadata,
    ) -> Result<ResolvedEntity> {
        let type_rule = match metadata.entities() {
            [] => TypeRule::named(fallback_element_name(short_name)),
            [decl] => {
                let name = decl.root.as_deref().unwrap_or(short_name);
                let preserve_case_self = decl.preserve_case || decl.root.is_some();
                TypeRule {
                    element_name: if preserve_case_self {
                        name.to_string()
                    } else {
                        name.to_lowercase()
                    },
                    namespaces: decl.namespaces.clone(),
                    preserve_case_self,
                    preserve_case_children: decl.preserve_case_children,
                    prefix: decl.prefix.clone().filter(|p| !p.is_empty()),
                    explicit_mapping_only: decl.explicit,
                }
            }
            many => {
                return Err(MapError::AmbiguousTypeMapping {
                    type_name: type_name.to_string(),
                    count: many.len(),
                });
            }
        };

        let mut field_rules: Vec<(String, FieldRule)> = Vec::new();
        for (field, decl) in metadata.properties() {
            if field_rules.iter().any(|(name, _)| name == field) {
                continue;
            }
            field_rules.push((field.to_string(), field_rule(type_name, field, decl)?));
        }

        Ok(ResolvedEntity {
            type_rule,
            field_rules,
        })
    }

    /// Number of types whose rules are memoized.
    pub fn cached_types() -> usize {
        RULE_CACHE.read().len()
    }
}

fn fallback_element_name(short_name: &str) -> String {
    if short_name.is_empty() || short_name.starts_with('{') {
        crate::rules::DEFAULT_ROOT_NAME.to_string()
    } else {
        short_name.to_lowercase()
    }
}

fn field_rule(type_name: &str, field: &str, decl: &PropertyDecl) -> Result<FieldRule> {
    let placement = match (decl.attribute, &decl.attribute_of, &decl.child_of) {
        (_, Some(_), Some(_)) => {
            return Err(MapError::invalid_field(
                type_name,
                field,
                "attribute_of and child_of are mutually exclusive",
            ));
        }
        (true, Some(_), None) | (true, None, Some(_)) => {
            return Err(MapError::invalid_field(
                type_name,
                field,
                "attribute cannot be combined with attribute_of or child_of",
            ));
        }
        (_, Some(path), None) => Placement::AttributeOf(PathRef::new(path.as_str())),
        (_, None, Some(path)) => Placement::ChildOf(PathRef::new(path.as_str())),
        (true, None, None) => Placement::Attribute,
        (false, None, None) => Placement::Element,
    };

    Ok(FieldRule {
        name: decl.rename.clone(),
        namespaces: decl.namespaces.clone(),
        preserve_case: decl.preserve_case || decl.rename.is_some(),
        placement,
        ignore: decl.ignore,
        ignore_if_empty: decl.ignore_empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{EntityDecl, XmlEntity};

    struct Plain;

    impl XmlEntity for Plain {
        fn metadata() -> EntityMetadata {
            EntityMetadata::none()
        }

        fn to_record(&self) -> Record {
            Record::new::<Self>(vec![])
        }
    }

    struct Tagged;

    impl XmlEntity for Tagged {
        fn metadata() -> EntityMetadata {
            EntityMetadata::new()
                .entity(
                    EntityDecl::new()
                        .root("p:Tagged")
                        .namespace("p", "urn:p")
                        .prefix("p"),
                )
                .property("name", PropertyDecl::new().rename("Name"))
                .property("age", PropertyDecl::new().attribute())
        }

        fn to_record(&self) -> Record {
            Record::new::<Self>(vec![])
        }
    }

    #[test]
    fn test_untyped_values_get_root_rule() -> Result<()> {
        let rule = RuleResolver::type_rule(&Value::mapping([("a", Value::Null)]))?;
        assert_eq!(rule, TypeRule::untyped());
        assert_eq!(rule.element_name, "root");
        assert!(RuleResolver::field_rules(&Value::Sequence(vec![]))?.is_none());
        Ok(())
    }

    #[test]
    fn test_undeclared_type_falls_back_to_lowercase_short_name() -> Result<()> {
        let rule = RuleResolver::type_rule(&Value::Record(Plain.to_record()))?;
        assert_eq!(rule.element_name, "plain");
        assert!(!rule.preserve_case_self);
        Ok(())
    }

    #[test]
    fn test_declared_type_rule() -> Result<()> {
        let resolved = RuleResolver::resolve(&Tagged.to_record())?;
        assert_eq!(resolved.type_rule.element_name, "p:Tagged");
        assert!(resolved.type_rule.preserve_case_self);
        assert_eq!(resolved.type_rule.prefix.as_deref(), Some("p"));
        assert_eq!(resolved.type_rule.namespaces.get("p"), Some("urn:p"));

        let name = resolved.field_rule("name").expect("declared field");
        assert_eq!(name.name.as_deref(), Some("Name"));
        assert!(name.preserve_case);
        assert_eq!(
            resolved.field_rule("age").map(|r| &r.placement),
            Some(&Placement::Attribute)
        );
        Ok(())
    }

    #[test]
    fn test_resolution_is_memoized() -> Result<()> {
        let first = RuleResolver::resolve(&Tagged.to_record())?;
        let second = RuleResolver::resolve(&Tagged.to_record())?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert!(RuleResolver::cached_types() >= 1);
        Ok(())
    }

    struct Contended;

    impl XmlEntity for Contended {
        fn metadata() -> EntityMetadata {
            EntityMetadata::new().entity(EntityDecl::new().root("Contended"))
        }

        fn to_record(&self) -> Record {
            Record::new::<Self>(vec![])
        }
    }

    #[test]
    fn test_concurrent_first_resolution_shares_one_entry() {
        const THREADS: usize = 8;
        let barrier = std::sync::Barrier::new(THREADS);
        let barrier = &barrier;
        let resolved: Vec<Option<Arc<ResolvedEntity>>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move || {
                        barrier.wait();
                        RuleResolver::resolve(&Contended.to_record()).ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("resolver thread panicked"))
                .collect()
        });

        let cached = RuleResolver::resolve(&Contended.to_record()).expect("resolvable type");
        assert_eq!(resolved.len(), THREADS);
        for entity in &resolved {
            let entity = entity.as_ref().expect("resolved in thread");
            assert!(Arc::ptr_eq(entity, &cached));
        }
    }

    #[test]
    fn test_two_type_declarations_are_ambiguous() {
        let metadata = EntityMetadata::new()
            .entity(EntityDecl::new().root("A"))
            .entity(EntityDecl::new().root("B"));
        let err = RuleResolver::resolve_metadata("demo::Twice", "Twice", &metadata).unwrap_err();
        assert!(matches!(
            err,
            MapError::AmbiguousTypeMapping { ref type_name, count: 2 } if type_name == "demo::Twice"
        ));
    }

    #[test]
    fn test_attribute_of_with_child_of_is_rejected() {
        let metadata = EntityMetadata::new().property(
            "age",
            PropertyDecl::new().attribute_of("Name").child_of("Name"),
        );
        let err = RuleResolver::resolve_metadata("demo::Bad", "Bad", &metadata).unwrap_err();
        assert!(matches!(
            err,
            MapError::InvalidFieldConfiguration { ref field, .. } if field == "age"
        ));
    }

    #[test]
    fn test_first_property_declaration_wins() -> Result<()> {
        let metadata = EntityMetadata::new()
            .property("name", PropertyDecl::new().rename("First"))
            .property("name", PropertyDecl::new().rename("Second"));
        let resolved = RuleResolver::resolve_metadata("demo::Dup", "Dup", &metadata)?;
        assert_eq!(resolved.field_rules.len(), 1);
        assert_eq!(
            resolved.field_rule("name").and_then(|r| r.name.as_deref()),
            Some("First")
        );
        Ok(())
    }

    #[test]
    fn test_root_without_explicit_case_is_lowercased() -> Result<()> {
        let metadata = EntityMetadata::new().entity(EntityDecl::new().prefix("x"));
        let resolved = RuleResolver::resolve_metadata("demo::Widget", "Widget", &metadata)?;
        assert_eq!(resolved.type_rule.element_name, "widget");
        assert_eq!(resolved.type_rule.prefix_qualifier(), "x:");
        Ok(())
    }
}
