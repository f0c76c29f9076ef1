use std::collections::{BTreeMap, HashMap};

use jsonrt::registry::{lookup_or_register, ReflectEnum, ReflectSet};
use jsonrt::{
    field, Blob, Guid, Hash256, ParseOptions, Reflect, SaveOptions, SetFormat, TypeInfo, UnixTime,
};
use rstest::rstest;
use serde_json::json;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
enum Color {
    #[default]
    Red,
    Green,
    Blue,
}

impl ReflectEnum for Color {
    const NAMES: &'static [&'static str] = &["clRed", "clGreen", "clBlue"];

    fn ordinal(self) -> usize {
        self as usize
    }

    fn from_ordinal(ordinal: usize) -> Option<Self> {
        [Color::Red, Color::Green, Color::Blue].get(ordinal).copied()
    }
}

impl Reflect for Color {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| TypeInfo::enumeration::<Self>("Color"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Features(u64);

impl ReflectSet for Features {
    const NAMES: &'static [&'static str] = &["Gift", "Express", "Insured"];

    fn bits(&self) -> u64 {
        self.0
    }

    fn set_bits(&mut self, bits: u64) {
        self.0 = bits;
    }
}

impl Reflect for Features {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| TypeInfo::set::<Self>("Features"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Address {
    street: String,
    zip: u32,
}

jsonrt::reflect_record!(Address { street, zip });

#[derive(Debug, Clone, PartialEq)]
struct Order {
    id: u64,
    total: f64,
    color: Color,
    features: Features,
    tags: Vec<String>,
    scores: [i16; 3],
    stock: BTreeMap<String, u32>,
    names: HashMap<u32, String>,
    address: Option<Box<Address>>,
    payload: Blob,
    created: OffsetDateTime,
    stamp: UnixTime,
    reference: Guid,
    digest: Hash256,
    extra: serde_json::Value,
}

impl Default for Order {
    fn default() -> Self {
        Self {
            id: 0,
            total: 0.0,
            color: Color::default(),
            features: Features::default(),
            tags: Vec::new(),
            scores: [0; 3],
            stock: BTreeMap::new(),
            names: HashMap::new(),
            address: None,
            payload: Blob::default(),
            created: OffsetDateTime::UNIX_EPOCH,
            stamp: UnixTime::default(),
            reference: Guid::default(),
            digest: Hash256::default(),
            extra: serde_json::Value::Null,
        }
    }
}

impl Reflect for Order {
    fn type_info() -> &'static TypeInfo {
        lookup_or_register::<Self>(|| {
            TypeInfo::record::<Self>(
                "Order",
                vec![
                    field!(Order, id),
                    field!(Order, total),
                    field!(Order, color),
                    field!(Order, features),
                    field!(Order, tags),
                    field!(Order, scores),
                    field!(Order, stock),
                    field!(Order, names),
                    field!(Order, address),
                    field!(Order, payload),
                    field!(Order, created),
                    field!(Order, stamp),
                    field!(Order, reference),
                    field!(Order, digest),
                    field!(Order, extra),
                ],
            )
        })
    }
}

fn order() -> Order {
    Order {
        id: u64::MAX,
        total: -12.75,
        color: Color::Blue,
        features: Features(0b101),
        tags: vec!["fragile".to_string(), "tab\there \"quoted\"".to_string()],
        scores: [-3, 0, 300],
        stock: BTreeMap::from([("apple".to_string(), 3), ("pear".to_string(), 0)]),
        names: HashMap::from([(7, "seven".to_string()), (11, "eleven".to_string())]),
        address: Some(Box::new(Address {
            street: "Rue de l'Été".to_string(),
            zip: 75001,
        })),
        payload: Blob(vec![0, 1, 2, 250, 255]),
        created: OffsetDateTime::from_unix_timestamp(1_709_209_800).unwrap(),
        stamp: UnixTime(1_700_000_000),
        reference: "3F2504E0-4F89-11D3-9A0C-0305E82C3301".parse().unwrap(),
        digest: Hash256([0xab; 32]),
        extra: json!({"nested": [1, "two", null, true], "ratio": 1.5, "offset": -0.125}),
    }
}

#[rstest]
#[case::compact(SaveOptions::default())]
#[case::human(SaveOptions::human())]
#[case::names(
    SaveOptions::default()
        .with_enums_as_text(true)
        .with_set_format(SetFormat::Names)
)]
#[case::trimmed_flags(
    SaveOptions::default()
        .with_enums_as_text(true)
        .with_trim_enum_prefix(true)
        .with_set_format(SetFormat::Flags)
)]
fn round_trip_preserves_value(#[case] options: SaveOptions) {
    let original = order();
    let mut json = jsonrt::to_vec_with_options(&original, &options).unwrap();
    assert!(jsonrt::is_valid(&json, &ParseOptions::strict()));

    let loaded: Order = jsonrt::from_slice(&mut json).unwrap();
    assert_eq!(loaded, original);
}

#[rstest]
fn round_trip_default_value() {
    let json = jsonrt::to_string(&Order::default()).unwrap();
    let loaded: Order = jsonrt::from_str(&json).unwrap();
    assert_eq!(loaded, Order::default());
}

#[rstest]
fn strict_output_shape() {
    let json = jsonrt::to_string(&order()).unwrap();
    assert!(json.starts_with(r#"{"id":18446744073709551615,"total":-12.75,"color":2,"features":5,"#));
    assert!(json.contains(r#""tags":["fragile","tab\there \"quoted\""]"#));
    assert!(json.contains(r#""scores":[-3,0,300]"#));
    assert!(json.contains(r#""stock":{"apple":3,"pear":0}"#));
    assert!(json.contains(r#""payload":"AAEC+v8=""#));
    assert!(json.contains(r#""created":"2024-02-29T12:30:00Z""#));
    assert!(json.contains(r#""reference":"3F2504E0-4F89-11D3-9A0C-0305E82C3301""#));
}

#[rstest]
fn load_into_merges_absent_fields() {
    let mut value = order();
    let mut buf = br#"{"total": 1.5, "tags": []}"#.to_vec();
    jsonrt::load_into(&mut value, &mut buf, &ParseOptions::strict()).unwrap();

    let mut expected = order();
    expected.total = 1.5;
    expected.tags.clear();
    assert_eq!(value, expected);
}

#[rstest]
fn failed_load_into_leaves_value() {
    let mut value = order();
    let mut buf = br#"{"total": 1.5, "scores": [1, 2]}"#.to_vec();
    let err = jsonrt::load_into(&mut value, &mut buf, &ParseOptions::strict()).unwrap_err();
    assert_eq!(err.kind, jsonrt::ErrorKind::Domain);
    assert_eq!(value, order());
}
