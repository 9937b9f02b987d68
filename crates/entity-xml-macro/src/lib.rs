//! Derive macro for `entity_xml::XmlEntity`.
//!
//! - `#[derive(XmlEntity)]` on a struct with named fields (or a unit struct)
//!
//! Generates:
//! - `impl XmlEntity` whose `metadata()` lists the declarations written in
//!   `#[xml(...)]` attributes and whose `to_record()` collects the field values
//! - `impl ToXmlValue` wrapping the record into a `Value::Record`
//!
//! Declarations are not validated here: contradictory ones are reported by
//! the resolver when the type is first mapped.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod attrs;
mod expand;

/// Derive the XML mapping of a struct.
///
/// ```ignore
/// #[derive(XmlEntity)]
/// #[xml(root = "Person", namespace(prefix = "", uri = "http://example.com"))]
/// pub struct Person {
///     #[xml(rename = "Name")]
///     pub name: String,
///     #[xml(rename = "Age", attribute)]
///     pub age: u32,
///     #[xml(ignore)]
///     pub cache: Vec<u8>,
/// }
/// ```
///
/// Type-level options (each `#[xml(...)]` on the struct is one declaration):
/// `root = "..."`, `namespace(prefix = "...", uri = "...")`, `preserve_case`,
/// `preserve_case_children`, `prefix = "..."`, `explicit`.
///
/// Field-level options (all `#[xml(...)]` on a field are merged):
/// `rename = "..."`, `namespace(prefix = "...", uri = "...")`, `preserve_case`,
/// `attribute`, `attribute_of = "path"`, `child_of = "path"`, `ignore`,
/// `ignore_empty`.
///
/// Ignored fields are left out of the record, so their types need not
/// implement `ToXmlValue`.
#[proc_macro_derive(XmlEntity, attributes(xml))]
pub fn derive_xml_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
