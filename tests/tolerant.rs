use jsonrt::registry::{lookup_or_register, ReflectEnum};
use jsonrt::{ErrorKind, ParseOptions, Reflect, TypeInfo};
use rstest::rstest;
use serde_json::json;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Role {
    #[default]
    Guest,
    Member,
}

impl ReflectEnum for Role {
    const NAMES: &'static [&'static str] = &["rGuest", "rMember"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        [Role::Guest, Role::Member].get(ordinal).copied()
    }
}

impl Reflect for Role {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| TypeInfo::enumeration::<Self>("Role"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Person {
    name: String,
    age: u32,
    role: Role,
    token: i64,
    query: serde_json::Value,
}

jsonrt::reflect_record!(Person {
    name,
    age,
    role,
    token,
    query
});

const LOOSE: &str = "{
  name: 'John', // first name only
  /* age in years */
  age: \"1972\",
  role: 'Member',
  token: 'ffffffffffffffff',
  shoeSize: 44,
  query: {age: {$gt: 18}, born: isodate('1972-01-01'), re: /jo.*/i},
}";

#[rstest]
fn tolerant_accepts_loose_input() {
    let person: Person = jsonrt::from_str_with_options(LOOSE, &ParseOptions::tolerant()).unwrap();
    assert_eq!(person.name, "John");
    assert_eq!(person.age, 1972);
    assert_eq!(person.role, Role::Member);
    assert_eq!(person.token, -1);
    assert_eq!(
        person.query,
        json!({"age": {"$gt": 18}, "born": "isodate('1972-01-01')", "re": "/jo.*/i"})
    );
}

#[rstest]
fn strict_rejects_loose_input() {
    let err = jsonrt::from_str::<Person>(LOOSE).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Structural);
    let location = err.location_in(LOOSE.as_bytes()).unwrap();
    assert_eq!((location.line, location.column), (2, 3));
}

#[rstest]
#[case::unknown_property(
    r#"{"name":"x","shoeSize":44}"#,
    ParseOptions::strict().with_ignore_unknown_property(true)
)]
#[case::string_number(
    r#"{"age":"12"}"#,
    ParseOptions::strict().with_ignore_string_type_mismatch(true)
)]
#[case::unknown_enum(
    r#"{"role":"Admin"}"#,
    ParseOptions::strict().with_ignore_unknown_enum(true)
)]
#[case::hex_int64(
    r#"{"token":"0x10"}"#,
    ParseOptions::strict().with_allow_int64_hex(true)
)]
fn each_flag_relaxes_one_rule(#[case] input: &str, #[case] options: ParseOptions) {
    assert!(jsonrt::from_str::<Person>(input).is_err());
    assert!(jsonrt::from_str_with_options::<Person>(input, &options).is_ok());
}

#[rstest]
fn unknown_property_reports_name_offset() {
    let input = r#"{"name":"x", "shoeSize":44}"#;
    let err = jsonrt::from_str::<Person>(input).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Domain);
    assert_eq!(err.offset, Some(14));
}

#[rstest]
fn trailing_commas_need_extended_syntax() {
    let input = br#"{"name":"x",}"#;
    assert!(!jsonrt::is_valid(input, &ParseOptions::strict()));
    assert!(jsonrt::is_valid(
        input,
        &ParseOptions::strict().with_extended_syntax(true)
    ));
}
