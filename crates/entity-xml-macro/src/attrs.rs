use syn::meta::ParseNestedMeta;
use syn::{Attribute, LitStr};

const ATTR: &str = "xml";

/// One type-level `#[xml(...)]`.
#[derive(Debug, Default)]
pub(crate) struct EntityAttr {
    pub(crate) root: Option<String>,
    pub(crate) namespaces: Vec<(String, String)>,
    pub(crate) preserve_case: bool,
    pub(crate) preserve_case_children: bool,
    pub(crate) prefix: Option<String>,
    pub(crate) explicit: bool,
}

/// All field-level `#[xml(...)]` of one field, merged.
#[derive(Debug, Default)]
pub(crate) struct PropertyAttr {
    pub(crate) rename: Option<String>,
    pub(crate) namespaces: Vec<(String, String)>,
    pub(crate) preserve_case: bool,
    pub(crate) attribute: bool,
    pub(crate) attribute_of: Option<String>,
    pub(crate) child_of: Option<String>,
    pub(crate) ignore: bool,
    pub(crate) ignore_empty: bool,
}

pub(crate) fn parse_entity_attrs(attrs: &[Attribute]) -> syn::Result<Vec<EntityAttr>> {
    let mut decls = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident(ATTR)) {
        let mut decl = EntityAttr::default();
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("root") {
                decl.root = Some(string_value(&meta)?);
            } else if meta.path.is_ident("namespace") {
                decl.namespaces.push(parse_namespace(&meta)?);
            } else if meta.path.is_ident("preserve_case") {
                decl.preserve_case = true;
            } else if meta.path.is_ident("preserve_case_children") {
                decl.preserve_case_children = true;
            } else if meta.path.is_ident("prefix") {
                decl.prefix = Some(string_value(&meta)?);
            } else if meta.path.is_ident("explicit") {
                decl.explicit = true;
            } else {
                return Err(meta.error(
                    "unsupported xml option; expected `root`, `namespace`, `preserve_case`, \
                     `preserve_case_children`, `prefix` or `explicit`",
                ));
            }
            Ok(())
        })?;
        decls.push(decl);
    }
    Ok(decls)
}

/// Parses the field's attributes; `None` when it carries no `#[xml]`.
pub(crate) fn parse_property_attrs(attrs: &[Attribute]) -> syn::Result<Option<PropertyAttr>> {
    let mut found = false;
    let mut decl = PropertyAttr::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident(ATTR)) {
        found = true;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                decl.rename = Some(string_value(&meta)?);
            } else if meta.path.is_ident("namespace") {
                decl.namespaces.push(parse_namespace(&meta)?);
            } else if meta.path.is_ident("preserve_case") {
                decl.preserve_case = true;
            } else if meta.path.is_ident("attribute") {
                decl.attribute = true;
            } else if meta.path.is_ident("attribute_of") {
                decl.attribute_of = Some(string_value(&meta)?);
            } else if meta.path.is_ident("child_of") {
                decl.child_of = Some(string_value(&meta)?);
            } else if meta.path.is_ident("ignore") {
                decl.ignore = true;
            } else if meta.path.is_ident("ignore_empty") {
                decl.ignore_empty = true;
            } else {
                return Err(meta.error(
                    "unsupported xml option; expected `rename`, `namespace`, `preserve_case`, \
                     `attribute`, `attribute_of`, `child_of`, `ignore` or `ignore_empty`",
                ));
            }
            Ok(())
        })?;
    }
    Ok(found.then_some(decl))
}

fn string_value(meta: &ParseNestedMeta<'_>) -> syn::Result<String> {
    Ok(meta.value()?.parse::<LitStr>()?.value())
}

/// `namespace(prefix = "p", uri = "...")`; a missing prefix is the default namespace.
fn parse_namespace(meta: &ParseNestedMeta<'_>) -> syn::Result<(String, String)> {
    let mut prefix = None;
    let mut uri = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("prefix") {
            prefix = Some(string_value(&inner)?);
        } else if inner.path.is_ident("uri") {
            uri = Some(string_value(&inner)?);
        } else {
            return Err(inner.error("expected `prefix` or `uri`"));
        }
        Ok(())
    })?;
    let uri = uri.ok_or_else(|| meta.error("namespace requires `uri = \"...\"`"))?;
    Ok((prefix.unwrap_or_default(), uri))
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn test_each_type_attribute_is_one_declaration() {
        let input: syn::DeriveInput = parse_quote! {
            #[derive(XmlEntity)]
            #[xml(root = "p:Person", namespace(prefix = "p", uri = "urn:p"), prefix = "p")]
            #[xml(explicit)]
            struct Person;
        };
        let decls = parse_entity_attrs(&input.attrs).expect("valid attributes");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].root.as_deref(), Some("p:Person"));
        assert_eq!(decls[0].namespaces, vec![("p".to_string(), "urn:p".to_string())]);
        assert_eq!(decls[0].prefix.as_deref(), Some("p"));
        assert!(decls[1].explicit);
    }

    #[test]
    fn test_field_attributes_are_merged() {
        let field: syn::Field = parse_quote! {
            #[xml(rename = "Age")]
            #[xml(attribute_of = "Name", ignore_empty)]
            age: u32
        };
        let decl = parse_property_attrs(&field.attrs)
            .expect("valid attributes")
            .expect("annotated field");
        assert_eq!(decl.rename.as_deref(), Some("Age"));
        assert_eq!(decl.attribute_of.as_deref(), Some("Name"));
        assert!(decl.ignore_empty);
        assert!(!decl.attribute);
    }

    #[test]
    fn test_unannotated_field() {
        let field: syn::Field = parse_quote! { name: String };
        assert!(parse_property_attrs(&field.attrs).expect("no attributes").is_none());
    }

    #[test]
    fn test_default_namespace_prefix() {
        let input: syn::DeriveInput = parse_quote! {
            #[xml(namespace(uri = "http://example.com"))]
            struct Person;
        };
        let decls = parse_entity_attrs(&input.attrs).expect("valid attributes");
        assert_eq!(decls[0].namespaces[0].0, "");
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let input: syn::DeriveInput = parse_quote! {
            #[xml(rooot = "x")]
            struct Person;
        };
        assert!(parse_entity_attrs(&input.attrs).is_err());
    }

    #[test]
    fn test_namespace_without_uri_is_rejected() {
        let field: syn::Field = parse_quote! {
            #[xml(namespace(prefix = "p"))]
            name: String
        };
        assert!(parse_property_attrs(&field.attrs).is_err());
    }
}
