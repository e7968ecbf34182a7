//! Struct arguments and return values

mod common;

use std::collections::BTreeMap;

use common::{bridge, foreign};
use nsbridge_core::marshal::{marshal, MarshalError};
use nsbridge_core::{BridgeError, HostValue, StructValue};
use nsbridge_sdk::ForeignValue;
use nsbridge_types::{parse_one, TypeDescriptor};
use pretty_assertions::assert_eq;

fn range(location: i32, length: i32) -> HostValue {
    let mut map = BTreeMap::new();
    map.insert("location".to_string(), HostValue::from(location));
    map.insert("length".to_string(), HostValue::from(length));
    HostValue::Map(map)
}

#[test]
fn test_struct_argument_from_map() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "hello");
    let sub = text.invoke("substringWithRange", &[range(1, 3)]).unwrap();
    assert_eq!(bridge.to_host(&sub).unwrap(), HostValue::Text("ell".to_string()));
}

#[test]
fn test_struct_argument_from_struct_value() {
    let (_, bridge) = bridge();
    let mut value = bridge.struct_value("NSRange").unwrap();
    value.set("location", 2.into()).unwrap();
    value.set("length", 2.into()).unwrap();

    let sub = foreign(&bridge, "hello")
        .invoke("substringWithRange", &[value.into()])
        .unwrap();
    assert_eq!(bridge.to_host(&sub).unwrap(), HostValue::Text("ll".to_string()));
}

#[test]
fn test_struct_argument_from_array() {
    let (_, bridge) = bridge();
    let sub = foreign(&bridge, "hello")
        .invoke("substringWithRange", &[HostValue::Array(vec![0.into(), 1.into()])])
        .unwrap();
    assert_eq!(bridge.to_host(&sub).unwrap(), HostValue::Text("h".to_string()));

    let err = foreign(&bridge, "hello")
        .invoke("substringWithRange", &[HostValue::Array(vec![0.into()])])
        .unwrap_err();
    assert!(matches!(err, BridgeError::ArgumentType { index: 0, .. }));
}

#[test]
fn test_struct_return_value() {
    let (_, bridge) = bridge();
    let found = foreign(&bridge, "hello")
        .invoke("rangeOfString", &["ll".into()])
        .unwrap();
    let HostValue::Struct(found) = found else {
        panic!("expected a struct, got {:?}", found);
    };
    assert_eq!(found.struct_type().name(), "_NSRange");
    assert_eq!(found.get("location"), Some(&HostValue::Number(2.0)));
    assert_eq!(found.get("length"), Some(&HostValue::Number(2.0)));
    assert_eq!(found.to_string(), "_NSRange { location: 2, length: 2 }");
}

#[test]
fn test_not_found_range() {
    let (_, bridge) = bridge();
    let found = foreign(&bridge, "hello")
        .invoke("rangeOfString", &["xyz".into()])
        .unwrap();
    let HostValue::Struct(found) = found else {
        panic!("expected a struct");
    };
    assert_eq!(found.get("location"), Some(&HostValue::Number(nsbridge_sim::NOT_FOUND as f64)));
}

#[test]
fn test_unknown_field() {
    let (_, bridge) = bridge();
    let mut value = bridge.struct_value("NSRange").unwrap();
    assert_eq!(
        value.set("start", 1.into()).unwrap_err(),
        BridgeError::UnknownStructField {
            struct_name: "_NSRange".to_string(),
            field: "start".to_string(),
        }
    );

    let mut bad = BTreeMap::new();
    bad.insert("start".to_string(), HostValue::from(1));
    let err = foreign(&bridge, "hello")
        .invoke("substringWithRange", &[HostValue::Map(bad)])
        .unwrap_err();
    assert!(matches!(err, BridgeError::UnknownStructField { .. }));
}

#[test]
fn test_define_struct() {
    let (_, bridge) = bridge();
    let ty = bridge
        .define_struct("{CGVector=\"dx\"d\"dy\"d}", &["NSVector"])
        .unwrap();
    assert_eq!(ty.name(), "CGVector");

    let value = bridge.struct_value("NSVector").unwrap();
    assert_eq!(value.values(), &[HostValue::Number(0.0), HostValue::Number(0.0)]);
    assert!(matches!(
        bridge.struct_value("CGMissing").unwrap_err(),
        BridgeError::Encoding(_)
    ));
}

#[test]
fn test_mismatched_struct_is_rejected() {
    let (_, bridge) = bridge();
    let point = bridge.struct_value("NSPoint").unwrap();
    let err = foreign(&bridge, "hello")
        .invoke("substringWithRange", &[point.into()])
        .unwrap_err();
    assert!(matches!(err, BridgeError::ArgumentType { .. }));
}

#[test]
fn test_anonymous_struct_arity_must_match() {
    let (_, bridge) = bridge();
    let TypeDescriptor::Struct(pair) = parse_one("{?=ii}", bridge.structs()).unwrap() else {
        panic!("expected a struct");
    };
    let triple = parse_one("{?=iii}", bridge.structs()).unwrap();

    let value = StructValue::from_values(pair, vec![1.into(), 2.into()]).unwrap();
    let err = marshal(&bridge, &triple, &value.clone().into()).unwrap_err();
    assert!(matches!(err, MarshalError::TypeMismatch { got: "anonymous struct", .. }));

    let same = parse_one("{?=ii}", bridge.structs()).unwrap();
    assert_eq!(
        marshal(&bridge, &same, &value.into()).unwrap(),
        ForeignValue::Struct(vec![ForeignValue::Int(1), ForeignValue::Int(2)])
    );
}

#[test]
fn test_struct_value_field_count() {
    let (_, bridge) = bridge();
    let range = bridge.structs().get("NSRange").unwrap();
    assert_eq!(
        StructValue::from_values(range, vec![1.into(), 2.into(), 3.into()]).unwrap_err(),
        BridgeError::StructFieldCount {
            struct_name: "_NSRange".to_string(),
            expected: 2,
            got: 3,
        }
    );
}

#[test]
fn test_out_of_bounds_ranges_raise() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "hello");
    let largest_location = 18_446_744_073_709_549_568.0;
    let ranges = [
        (nsbridge_sim::NOT_FOUND as f64, 1.0),
        (largest_location, 4096.0),
        (3.0, 3.0),
    ];
    for (location, length) in ranges {
        let mut map = BTreeMap::new();
        map.insert("location".to_string(), HostValue::from(location));
        map.insert("length".to_string(), HostValue::from(length));
        match text.invoke("substringWithRange", &[HostValue::Map(map)]).unwrap_err() {
            BridgeError::ForeignException { name, .. } => assert_eq!(name, "NSRangeException"),
            other => panic!("expected ForeignException, got {:?}", other),
        }
    }
}
