//! The input model of the mapper.
//!
//! Anything that can be rendered is first converted into a [`Value`], a closed
//! tagged union over scalars, sequences, ordered mappings and typed records.
//! The tree builder dispatches on the variant, so every shape it handles is
//! visible to the compiler.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use heck::ToLowerCamelCase;
use rust_decimal::Decimal;

use crate::rules::{EntityMetadata, XmlEntity};

/// A value to be rendered into an XML tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Null,
    /// A single textual, numeric or boolean value.
    Scalar(Scalar),
    /// An ordered list; every entry carries an implicit numeric key.
    Sequence(Vec<Value>),
    /// An ordered associative array whose keys may be numeric or not.
    Mapping(Vec<(Key, Value)>),
    /// A typed value with named fields and declared mapping rules.
    Record(Record),
    /// A value only observable through its getters.
    Anonymous(Accessors),
}

/// Scalar payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Bool(bool),
}

/// Key of a [`Value::Mapping`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

/// Identity of a concrete record type, used to memoize resolved rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// A Rust type implementing [`XmlEntity`].
    Id(TypeId),
    /// A struct reached through serde, known only by its name.
    Named(&'static str),
}

/// A typed value: its type identity, its metadata source and its fields in
/// declaration order.
#[derive(Clone)]
pub struct Record {
    type_key: TypeKey,
    type_name: &'static str,
    metadata: fn() -> EntityMetadata,
    fields: Vec<(String, Value)>,
}

/// Getter-exposed values of a type with no declared field metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Accessors {
    getters: Vec<(String, Value)>,
}

impl Value {
    /// Builds a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::String(s.into()))
    }

    /// Builds a mapping from string keys.
    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (Key::Name(k.into()), v))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    /// True for sequences and mappings.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Sequence(_) | Value::Mapping(_))
    }

    /// Numeric scalars, including strings that read as numbers.
    pub fn is_numeric(&self) -> bool {
        match self {
            Value::Scalar(s) => s.is_numeric(),
            _ => false,
        }
    }

    /// Emptiness as seen by `ignore_empty`: null, blank strings and empty
    /// containers. Numbers and booleans are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Scalar(Scalar::String(s)) => s.trim().is_empty(),
            Value::Scalar(_) => false,
            Value::Sequence(items) => items.is_empty(),
            Value::Mapping(entries) => entries.is_empty(),
            Value::Record(_) | Value::Anonymous(_) => false,
        }
    }

    /// Text rendered for a scalar or null value.
    pub fn text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Scalar(s) => Some(s.to_string()),
            _ => None,
        }
    }

    /// Short description of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(_) => "scalar",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Record(_) => "record",
            Value::Anonymous(_) => "anonymous",
        }
    }
}

impl Scalar {
    pub fn is_numeric(&self) -> bool {
        match self {
            Scalar::Int(_) | Scalar::UInt(_) | Scalar::Float(_) | Scalar::Decimal(_) => true,
            Scalar::String(s) => is_numeric_str(s),
            Scalar::Bool(_) => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::UInt(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Decimal(v) => write!(f, "{}", v),
            Scalar::Bool(b) => f.write_str(crate::xml::utils::bool_to_string(*b)),
        }
    }
}

impl Key {
    /// Index keys, and names that read as numbers.
    pub fn is_numeric(&self) -> bool {
        match self {
            Key::Index(_) => true,
            Key::Name(name) => is_numeric_str(name),
        }
    }

    pub fn as_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Whether `s` reads as a decimal or floating point number (surrounding
/// whitespace allowed, `inf`/`nan` spellings rejected).
pub(crate) fn is_numeric_str(s: &str) -> bool {
    let trimmed = s.trim();
    !trimmed.is_empty()
        && trimmed.chars().any(|c| c.is_ascii_digit())
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
        && trimmed.parse::<f64>().is_ok()
}

impl Record {
    /// Creates a record for a type implementing [`XmlEntity`].
    pub fn new<T: XmlEntity>(fields: Vec<(String, Value)>) -> Self {
        Record {
            type_key: TypeKey::Id(TypeId::of::<T>()),
            type_name: std::any::type_name::<T>(),
            metadata: T::metadata,
            fields,
        }
    }

    /// Creates a record for a type without declared metadata, identified by name.
    pub fn untyped(type_name: &'static str, fields: Vec<(String, Value)>) -> Self {
        Record {
            type_key: TypeKey::Named(type_name),
            type_name,
            metadata: EntityMetadata::none,
            fields,
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    /// Full type name as reported by the compiler or serde.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Last path segment of the type name, without generic arguments.
    pub fn short_type_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub(crate) fn read_metadata(&self) -> EntityMetadata {
        (self.metadata)()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.type_key == other.type_key && self.fields == other.fields
    }
}

pub(crate) fn short_type_name(type_name: &str) -> &str {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.rsplit("::").next().unwrap_or(base)
}

impl Accessors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a getter by its accessor name (`getName`, `get_name` or `name`).
    pub fn getter(mut self, accessor: &str, value: impl ToXmlValue) -> Self {
        self.getters
            .push((accessor_target_name(accessor), value.to_xml_value()));
        self
    }

    /// Normalized getter names and their values, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.getters.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.getters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.getters.is_empty()
    }
}

/// Strips the `get` convention from an accessor name and lower-camel-cases
/// what remains: `getFirstName` and `get_first_name` both give `firstName`.
pub fn accessor_target_name(accessor: &str) -> String {
    let stripped = accessor
        .strip_prefix("get_")
        .or_else(|| {
            accessor
                .strip_prefix("get")
                .filter(|rest| rest.starts_with(|c: char| c.is_ascii_uppercase()))
        })
        .unwrap_or(accessor);
    stripped.to_lower_camel_case()
}

/// Conversion of host values into [`Value`].
///
/// `#[derive(XmlEntity)]` implements this for annotated structs.
pub trait ToXmlValue {
    fn to_xml_value(&self) -> Value;
}

impl ToXmlValue for Value {
    fn to_xml_value(&self) -> Value {
        self.clone()
    }
}

impl<T: ToXmlValue + ?Sized> ToXmlValue for &T {
    fn to_xml_value(&self) -> Value {
        (**self).to_xml_value()
    }
}

impl<T: ToXmlValue + ?Sized> ToXmlValue for Box<T> {
    fn to_xml_value(&self) -> Value {
        (**self).to_xml_value()
    }
}

impl ToXmlValue for str {
    fn to_xml_value(&self) -> Value {
        Value::string(self)
    }
}

impl ToXmlValue for String {
    fn to_xml_value(&self) -> Value {
        Value::string(self.as_str())
    }
}

impl ToXmlValue for char {
    fn to_xml_value(&self) -> Value {
        Value::string(self.to_string())
    }
}

impl ToXmlValue for bool {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::Bool(*self))
    }
}

macro_rules! impl_signed {
    ($($t:ty),*) => {
        $(impl ToXmlValue for $t {
            fn to_xml_value(&self) -> Value {
                Value::Scalar(Scalar::Int(i64::from(*self)))
            }
        })*
    };
}

macro_rules! impl_unsigned {
    ($($t:ty),*) => {
        $(impl ToXmlValue for $t {
            fn to_xml_value(&self) -> Value {
                Value::Scalar(Scalar::UInt(u64::from(*self)))
            }
        })*
    };
}

impl_signed!(i8, i16, i32, i64);
impl_unsigned!(u8, u16, u32, u64);

impl ToXmlValue for isize {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::Int(*self as i64))
    }
}

impl ToXmlValue for usize {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::UInt(*self as u64))
    }
}

impl ToXmlValue for f32 {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::Float(f64::from(*self)))
    }
}

impl ToXmlValue for f64 {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::Float(*self))
    }
}

impl ToXmlValue for Decimal {
    fn to_xml_value(&self) -> Value {
        Value::Scalar(Scalar::Decimal(*self))
    }
}

impl ToXmlValue for chrono::NaiveDate {
    fn to_xml_value(&self) -> Value {
        Value::string(self.format("%Y-%m-%d").to_string())
    }
}

impl ToXmlValue for chrono::NaiveDateTime {
    fn to_xml_value(&self) -> Value {
        Value::string(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
    }
}

impl<Tz: chrono::TimeZone> ToXmlValue for chrono::DateTime<Tz>
where
    Tz::Offset: fmt::Display,
{
    fn to_xml_value(&self) -> Value {
        Value::string(self.to_rfc3339())
    }
}

impl<T: ToXmlValue> ToXmlValue for Option<T> {
    fn to_xml_value(&self) -> Value {
        match self {
            Some(v) => v.to_xml_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToXmlValue> ToXmlValue for [T] {
    fn to_xml_value(&self) -> Value {
        Value::Sequence(self.iter().map(ToXmlValue::to_xml_value).collect())
    }
}

impl<T: ToXmlValue> ToXmlValue for Vec<T> {
    fn to_xml_value(&self) -> Value {
        self.as_slice().to_xml_value()
    }
}

impl<K: AsRef<str>, V: ToXmlValue> ToXmlValue for BTreeMap<K, V> {
    fn to_xml_value(&self) -> Value {
        Value::Mapping(
            self.iter()
                .map(|(k, v)| (Key::Name(k.as_ref().to_string()), v.to_xml_value()))
                .collect(),
        )
    }
}

// Iteration order of a HashMap is unspecified, so the rendered order is too.
impl<K: AsRef<str>, V: ToXmlValue, S> ToXmlValue for HashMap<K, V, S> {
    fn to_xml_value(&self) -> Value {
        Value::Mapping(
            self.iter()
                .map(|(k, v)| (Key::Name(k.as_ref().to_string()), v.to_xml_value()))
                .collect(),
        )
    }
}

impl ToXmlValue for serde_json::Value {
    fn to_xml_value(&self) -> Value {
        match self {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Scalar(Scalar::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Scalar(Scalar::UInt(u))
                } else {
                    Value::Scalar(Scalar::Float(n.as_f64().unwrap_or_default()))
                }
            }
            serde_json::Value::String(s) => Value::string(s.as_str()),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.iter().map(ToXmlValue::to_xml_value).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.iter()
                    .map(|(k, v)| (Key::Name(k.clone()), v.to_xml_value()))
                    .collect(),
            ),
        }
    }
}

impl ToXmlValue for Accessors {
    fn to_xml_value(&self) -> Value {
        Value::Anonymous(self.clone())
    }
}
