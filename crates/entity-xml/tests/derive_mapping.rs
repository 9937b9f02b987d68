use entity_xml::{
    MapError, Mapper, Result, RuleResolver, ToXmlValue, TreeError, XmlDocument, XmlEntity,
    to_xml_document, to_xml_string,
};

const DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

fn render<T: ToXmlValue>(value: &T) -> Result<String> {
    let doc = to_xml_document(value)?;
    Ok(doc.node_to_string(doc.root(), false)?)
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct Person {
    #[xml(rename = "Name")]
    name: String,
    #[xml(rename = "Age", attribute)]
    age: u32,
}

#[derive(XmlEntity)]
#[xml(
    root = "Address",
    namespace(prefix = "addr", uri = "http://www.example.com/address"),
    prefix = "addr"
)]
struct Address {
    #[xml(rename = "Id", attribute)]
    id: Option<String>,
    #[xml(rename = "Street")]
    street: String,
    #[xml(rename = "Number")]
    number: u32,
}

#[derive(XmlEntity)]
#[xml(
    root = "Person",
    namespace(prefix = "", uri = "http://example.com"),
    namespace(prefix = "ns1", uri = "http://www.example.com/person")
)]
struct PersonWithAddress {
    #[xml(rename = "Name")]
    name: String,
    #[xml(rename = "Age", attribute)]
    age: u32,
    #[xml(rename = "Address")]
    address: Address,
}

fn main_st() -> Address {
    Address {
        id: Some("1234".to_string()),
        street: "Main St".to_string(),
        number: 123,
    }
}

#[test]
fn test_person_with_attribute() -> Result<()> {
    let xml = to_xml_string(&Person {
        name: "John".to_string(),
        age: 30,
    })?;
    assert_eq!(
        xml,
        format!("{DECLARATION}<Person Age=\"30\"><Name>John</Name></Person>\n")
    );
    Ok(())
}

#[test]
fn test_nested_record_namespaces_and_prefix() -> Result<()> {
    let person = PersonWithAddress {
        name: "John".to_string(),
        age: 30,
        address: main_st(),
    };
    assert_eq!(
        render(&person)?,
        concat!(
            "<Person xmlns=\"http://example.com\" xmlns:ns1=\"http://www.example.com/person\" ",
            "xmlns:addr=\"http://www.example.com/address\" Age=\"30\">",
            "<Name>John</Name>",
            "<addr:Address Id=\"1234\">",
            "<addr:Street>Main St</addr:Street>",
            "<addr:Number>123</addr:Number>",
            "</addr:Address>",
            "</Person>"
        )
    );
    Ok(())
}

#[test]
fn test_nested_record_output_is_namespace_well_formed() -> Result<()> {
    let person = PersonWithAddress {
        name: "John".to_string(),
        age: 30,
        address: main_st(),
    };
    let xml = to_xml_string(&person)?;
    let parsed = roxmltree::Document::parse(&xml).expect("well-formed XML");
    let root = parsed.root_element();
    assert_eq!(root.tag_name().namespace(), Some("http://example.com"));
    assert_eq!(root.attribute("Age"), Some("30"));

    let address = root
        .children()
        .find(|n| n.has_tag_name("Address"))
        .expect("address element");
    assert_eq!(
        address.tag_name().namespace(),
        Some("http://www.example.com/address")
    );
    assert_eq!(address.attribute("Id"), Some("1234"));
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "p:Person", namespace(prefix = "p", uri = "http://example.com"))]
struct PrefixedPerson {
    #[xml(rename = "Name")]
    name: String,
    #[xml(ignore_empty)]
    nickname: String,
}

#[test]
fn test_prefixed_root_is_declared_once() -> Result<()> {
    let person = PrefixedPerson {
        name: "John".to_string(),
        nickname: String::new(),
    };
    assert_eq!(
        render(&person)?,
        "<p:Person xmlns:p=\"http://example.com\"><Name>John</Name></p:Person>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "Contact", explicit)]
struct Contact {
    #[xml(rename = "Email")]
    email: String,
    phone: String,
}

#[test]
fn test_explicit_mapping_keeps_only_named_fields() -> Result<()> {
    let contact = Contact {
        email: "john@example.com".to_string(),
        phone: "555-0100".to_string(),
    };
    assert_eq!(
        render(&contact)?,
        "<Contact><Email>john@example.com</Email></Contact>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "Person", namespace(prefix = "", uri = "http://example.com"))]
struct AgeOnName {
    #[xml(rename = "Name")]
    name: String,
    #[xml(rename = "Age", attribute_of = "Name")]
    age: u32,
}

#[test]
fn test_attribute_of_targets_sibling() -> Result<()> {
    let person = AgeOnName {
        name: "John".to_string(),
        age: 30,
    };
    assert_eq!(
        render(&person)?,
        "<Person xmlns=\"http://example.com\"><Name Age=\"30\">John</Name></Person>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct Career {
    #[xml(rename = "Name")]
    name: String,
    #[xml(rename = "Profession", child_of = "Name")]
    profession: String,
    #[xml(rename = "Name", child_of = "//Profession")]
    profession_name: String,
}

#[test]
fn test_child_of_targets_selected_nodes() -> Result<()> {
    let career = Career {
        name: "John".to_string(),
        profession: "Engineer".to_string(),
        profession_name: "Software".to_string(),
    };
    assert_eq!(
        render(&career)?,
        "<Person><Name>John<Profession>Engineer<Name>Software</Name></Profession></Name></Person>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct AgeBeforeName {
    #[xml(rename = "Age", attribute_of = "Name")]
    age: u32,
    #[xml(rename = "Name")]
    name: String,
}

#[test]
fn test_missing_target_node_aborts() {
    let person = AgeBeforeName {
        age: 30,
        name: "John".to_string(),
    };
    let err = to_xml_document(&person).unwrap_err();
    assert!(matches!(
        err,
        MapError::TargetNodeNotFound { ref field, ref path } if field == "age" && path == "Name"
    ));
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct AddressAsChildOf {
    #[xml(rename = "Name")]
    name: String,
    #[xml(rename = "Address", child_of = "Name")]
    address: Address,
}

#[test]
fn test_redirected_non_scalar_is_rejected() {
    let person = AddressAsChildOf {
        name: "John".to_string(),
        address: main_st(),
    };
    let err = to_xml_document(&person).unwrap_err();
    assert!(matches!(
        err,
        MapError::InvalidFieldConfiguration { ref field, .. } if field == "address"
    ));
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct TagsAsAttribute {
    #[xml(rename = "Tags", attribute)]
    tags: Vec<String>,
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct AddressAsAttribute {
    #[xml(rename = "Address", attribute)]
    address: Address,
}

#[test]
fn test_attribute_placement_requires_a_scalar() {
    let err = to_xml_document(&TagsAsAttribute {
        tags: vec!["a".to_string(), "b".to_string()],
    })
    .unwrap_err();
    assert!(matches!(
        err,
        MapError::InvalidFieldConfiguration { ref field, ref reason, .. }
            if field == "tags" && reason.contains("attribute placement")
    ));

    let err = to_xml_document(&AddressAsAttribute { address: main_st() }).unwrap_err();
    assert!(matches!(
        err,
        MapError::InvalidFieldConfiguration { ref field, .. } if field == "address"
    ));
}

#[derive(XmlEntity)]
#[xml(root = "Person")]
struct ConflictingPlacement {
    #[xml(attribute_of = "Name", child_of = "Name")]
    age: u32,
}

#[test]
fn test_conflicting_placement_is_rejected() {
    let err = to_xml_document(&ConflictingPlacement { age: 1 }).unwrap_err();
    assert!(matches!(err, MapError::InvalidFieldConfiguration { .. }));
}

#[derive(XmlEntity)]
#[xml(root = "A")]
#[xml(root = "B")]
struct Twice {
    value: u32,
}

#[test]
fn test_two_type_declarations_are_ambiguous() {
    let err = to_xml_document(&Twice { value: 1 }).unwrap_err();
    assert!(matches!(err, MapError::AmbiguousTypeMapping { count: 2, .. }));
}

struct Opaque;

#[derive(XmlEntity)]
#[allow(dead_code)]
struct Session {
    user: String,
    #[xml(ignore)]
    handle: Opaque,
    #[xml(ignore)]
    token: String,
}

#[test]
fn test_ignored_fields_leave_no_trace() -> Result<()> {
    let session = Session {
        user: "john".to_string(),
        handle: Opaque,
        token: "secret".to_string(),
    };
    let xml = render(&session)?;
    assert_eq!(xml, "<session><user>john</user></session>");
    assert!(!xml.contains("secret"));
    Ok(())
}

#[derive(XmlEntity)]
struct Measurement {
    #[xml(ignore_empty)]
    city: Option<String>,
    #[xml(ignore_empty)]
    weight: Option<u32>,
    #[xml(ignore_empty)]
    addresses: Vec<String>,
    label: String,
}

#[test]
fn test_ignore_empty_keeps_zero() -> Result<()> {
    let empty = Measurement {
        city: Some("  ".to_string()),
        weight: None,
        addresses: vec![],
        label: String::new(),
    };
    assert_eq!(render(&empty)?, "<measurement><label/></measurement>");

    let zero = Measurement {
        city: None,
        weight: Some(0),
        addresses: vec![],
        label: "x".to_string(),
    };
    assert_eq!(
        render(&zero)?,
        "<measurement><weight>0</weight><label>x</label></measurement>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[allow(non_snake_case)]
struct Names {
    firstName: String,
    #[xml(preserve_case)]
    lastName: String,
    r#type: String,
}

#[test]
fn test_field_names_are_case_folded() -> Result<()> {
    let names = Names {
        firstName: "John".to_string(),
        lastName: "Doe".to_string(),
        r#type: "person".to_string(),
    };
    assert_eq!(
        render(&names)?,
        "<names><firstname>John</firstname><lastName>Doe</lastName><type>person</type></names>"
    );
    Ok(())
}

#[derive(XmlEntity)]
#[xml(preserve_case_children)]
#[allow(non_snake_case)]
struct KeepsCase {
    FirstName: String,
}

#[test]
fn test_type_can_preserve_child_case() -> Result<()> {
    let value = KeepsCase {
        FirstName: "John".to_string(),
    };
    assert_eq!(render(&value)?, "<keepscase><FirstName>John</FirstName></keepscase>");
    Ok(())
}

#[derive(XmlEntity)]
#[xml(root = "Member")]
struct Member {
    #[xml(rename = "Name")]
    name: String,
}

#[derive(XmlEntity)]
#[xml(root = "Team")]
struct Team {
    #[xml(rename = "Members")]
    members: Vec<Member>,
    #[xml(rename = "Scores")]
    scores: Vec<u32>,
}

#[test]
fn test_records_inside_lists() -> Result<()> {
    let team = Team {
        members: vec![
            Member {
                name: "Ann".to_string(),
            },
            Member {
                name: "Bob".to_string(),
            },
        ],
        scores: vec![3, 5],
    };
    assert_eq!(
        render(&team)?,
        concat!(
            "<Team><Members><Member><Name>Ann</Name></Member><Member><Name>Bob</Name></Member></Members>",
            "<Scores>3</Scores><Scores>5</Scores></Team>"
        )
    );
    Ok(())
}

#[derive(XmlEntity)]
struct Wrapper<T> {
    inner: T,
}

#[test]
fn test_generic_record() -> Result<()> {
    assert_eq!(
        render(&Wrapper { inner: 5 })?,
        "<wrapper><inner>5</inner></wrapper>"
    );
    Ok(())
}

#[test]
fn test_rule_resolution_is_idempotent() -> Result<()> {
    let person = Person {
        name: "John".to_string(),
        age: 30,
    };
    let first = RuleResolver::resolve(&person.to_record())?;
    let second = RuleResolver::resolve(&person.to_record())?;
    assert_eq!(*first, *second);
    assert_eq!(first.type_rule.element_name, "Person");
    Ok(())
}

#[test]
fn test_append_applies_type_prefix_to_target() -> Result<()> {
    let mut doc = XmlDocument::empty("Envelope", None)?;
    let root = doc.root();
    let body = doc.append_child(root, "Body", None, None)?;
    Mapper::new().append(&mut doc, body, &main_st().to_xml_value())?;
    assert_eq!(
        doc.node_to_string(root, false)?,
        concat!(
            "<Envelope xmlns:addr=\"http://www.example.com/address\">",
            "<addr:Body Id=\"1234\"><addr:Street>Main St</addr:Street><addr:Number>123</addr:Number></addr:Body>",
            "</Envelope>"
        )
    );
    Ok(())
}

#[test]
fn test_append_under_foreign_node_is_not_found() -> Result<()> {
    let mut other = XmlDocument::empty("Envelope", None)?;
    let other_root = other.root();
    other.append_child(other_root, "Header", None, None)?;
    let foreign = other.append_child(other_root, "Body", None, None)?;

    let mut doc = XmlDocument::empty("Envelope", None)?;
    let err = Mapper::new()
        .append(&mut doc, foreign, &main_st().to_xml_value())
        .unwrap_err();
    assert!(matches!(err, MapError::Tree(TreeError::NodeNotFound(_))));

    let err = Mapper::new()
        .append(&mut doc, foreign, &serde_json::json!({"x": 1}).to_xml_value())
        .unwrap_err();
    assert!(matches!(err, MapError::Tree(TreeError::NodeNotFound(_))));
    Ok(())
}
