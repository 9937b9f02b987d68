use proc_macro2::TokenStream;
use quote::quote;
use syn::ext::IdentExt;
use syn::{Data, DeriveInput, Field, Fields, GenericParam, parse_quote};

use crate::attrs::{EntityAttr, PropertyAttr, parse_entity_attrs, parse_property_attrs};

pub(crate) fn expand(input: DeriveInput) -> syn::Result<TokenStream> {
    let fields: Vec<&Field> = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => named.named.iter().collect(),
            Fields::Unit => Vec::new(),
            Fields::Unnamed(_) => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "XmlEntity cannot be derived for tuple structs",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "XmlEntity can only be derived for structs",
            ));
        }
    };

    let entity_decls = parse_entity_attrs(&input.attrs)?
        .iter()
        .map(entity_decl)
        .collect::<Vec<_>>();

    let mut property_decls = Vec::new();
    let mut record_fields = Vec::new();
    for field in fields {
        let Some(ident) = &field.ident else {
            continue;
        };
        let name = ident.unraw().to_string();
        let decl = parse_property_attrs(&field.attrs)?;
        let ignored = decl.as_ref().is_some_and(|d| d.ignore);
        if let Some(decl) = &decl {
            let tokens = property_decl(decl);
            property_decls.push(quote! { .property(#name, #tokens) });
        }
        if !ignored {
            record_fields.push(quote! {
                (
                    ::std::string::String::from(#name),
                    ::entity_xml::ToXmlValue::to_xml_value(&self.#ident),
                )
            });
        }
    }

    let ident = &input.ident;
    let mut generics = input.generics.clone();
    let type_params: Vec<_> = generics
        .params
        .iter()
        .filter_map(|param| match param {
            GenericParam::Type(ty) => Some(ty.ident.clone()),
            _ => None,
        })
        .collect();
    let where_clause = generics.make_where_clause();
    for param in type_params {
        where_clause
            .predicates
            .push(parse_quote!(#param: ::entity_xml::ToXmlValue + 'static));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::entity_xml::XmlEntity for #ident #ty_generics #where_clause {
            fn metadata() -> ::entity_xml::EntityMetadata {
                ::entity_xml::EntityMetadata::new()
                    #(.entity(#entity_decls))*
                    #(#property_decls)*
            }

            fn to_record(&self) -> ::entity_xml::Record {
                ::entity_xml::Record::new::<Self>(::std::vec![#(#record_fields),*])
            }
        }

        impl #impl_generics ::entity_xml::ToXmlValue for #ident #ty_generics #where_clause {
            fn to_xml_value(&self) -> ::entity_xml::Value {
                ::entity_xml::Value::Record(::entity_xml::XmlEntity::to_record(self))
            }
        }
    })
}

fn entity_decl(decl: &EntityAttr) -> TokenStream {
    let mut tokens = quote!(::entity_xml::EntityDecl::new());
    if let Some(root) = &decl.root {
        tokens.extend(quote!(.root(#root)));
    }
    for (prefix, uri) in &decl.namespaces {
        tokens.extend(quote!(.namespace(#prefix, #uri)));
    }
    if decl.preserve_case {
        tokens.extend(quote!(.preserve_case()));
    }
    if decl.preserve_case_children {
        tokens.extend(quote!(.preserve_case_children()));
    }
    if let Some(prefix) = &decl.prefix {
        tokens.extend(quote!(.prefix(#prefix)));
    }
    if decl.explicit {
        tokens.extend(quote!(.explicit()));
    }
    tokens
}

fn property_decl(decl: &PropertyAttr) -> TokenStream {
    let mut tokens = quote!(::entity_xml::PropertyDecl::new());
    if let Some(rename) = &decl.rename {
        tokens.extend(quote!(.rename(#rename)));
    }
    for (prefix, uri) in &decl.namespaces {
        tokens.extend(quote!(.namespace(#prefix, #uri)));
    }
    if decl.preserve_case {
        tokens.extend(quote!(.preserve_case()));
    }
    if decl.attribute {
        tokens.extend(quote!(.attribute()));
    }
    if let Some(path) = &decl.attribute_of {
        tokens.extend(quote!(.attribute_of(#path)));
    }
    if let Some(path) = &decl.child_of {
        tokens.extend(quote!(.child_of(#path)));
    }
    if decl.ignore {
        tokens.extend(quote!(.ignore()));
    }
    if decl.ignore_empty {
        tokens.extend(quote!(.ignore_empty()));
    }
    tokens
}
