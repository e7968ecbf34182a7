//! Host <-> Foundation value conversion

mod common;

use std::collections::BTreeMap;

use common::{bridge, foreign, round_trip};
use nsbridge_core::{BridgeError, Fallback, HostValue, Timestamp, Unconverted};
use nsbridge_sdk::ForeignValue;
use pretty_assertions::assert_eq;

fn map(entries: &[(&str, HostValue)]) -> HostValue {
    HostValue::Map(
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect::<BTreeMap<_, _>>(),
    )
}

#[test]
fn test_string_round_trip() {
    let (_, bridge) = bridge();
    assert_eq!(round_trip(&bridge, "hello"), HostValue::Text("hello".to_string()));
    assert_eq!(round_trip(&bridge, ""), HostValue::Text(String::new()));
    assert_eq!(round_trip(&bridge, "grüße ✓"), HostValue::Text("grüße ✓".to_string()));
}

#[test]
fn test_string_becomes_nsstring() {
    let (_, bridge) = bridge();
    let proxy = foreign(&bridge, "hello");
    assert!(proxy.is_kind_of("NSString").unwrap());
    assert_eq!(proxy.invoke("length", &[]).unwrap(), HostValue::Number(5.0));
}

#[test]
fn test_number_round_trip() {
    let (_, bridge) = bridge();
    assert_eq!(round_trip(&bridge, 42), HostValue::Number(42.0));
    assert_eq!(round_trip(&bridge, -0.5), HostValue::Number(-0.5));
    assert!(foreign(&bridge, 42).is_kind_of("NSNumber").unwrap());
}

#[test]
fn test_booleans_are_singletons() {
    let (_, bridge) = bridge();
    let first = foreign(&bridge, true);
    let second = foreign(&bridge, true);
    let no = foreign(&bridge, false);

    assert_eq!(first, second);
    assert_ne!(first, no);
    assert!(first.is_kind_of("__NSCFBoolean").unwrap());
    assert_eq!(round_trip(&bridge, true), HostValue::Bool(true));
    assert_eq!(round_trip(&bridge, false), HostValue::Bool(false));
}

#[test]
fn test_number_with_bool_decodes_as_boolean() {
    let (_, bridge) = bridge();
    let number_class = bridge.class("NSNumber").unwrap();
    let yes = number_class.invoke("numberWithBool", &[true.into()]).unwrap();
    let plain = number_class.invoke("numberWithInt", &[1.into()]).unwrap();

    assert_eq!(bridge.to_host(&yes).unwrap(), HostValue::Bool(true));
    assert_eq!(bridge.to_host(&plain).unwrap(), HostValue::Number(1.0));
}

#[test]
fn test_date_round_trip() {
    let (_, bridge) = bridge();
    let date = Timestamp::from_secs(1_500_000_000.25);
    assert_eq!(round_trip(&bridge, date), HostValue::Date(date));
    assert!(foreign(&bridge, date).is_kind_of("NSDate").unwrap());
}

#[test]
fn test_array_round_trip() {
    let (_, bridge) = bridge();
    let items = vec![HostValue::from(1), "a".into(), true.into()];
    let proxy = foreign(&bridge, items.clone());

    assert!(proxy.is_kind_of("NSArray").unwrap());
    assert_eq!(proxy.invoke("count", &[]).unwrap(), HostValue::Number(3.0));
    assert_eq!(
        bridge.to_host(&HostValue::Object(proxy)).unwrap(),
        HostValue::Array(items)
    );
}

#[test]
fn test_empty_array() {
    let (_, bridge) = bridge();
    assert_eq!(round_trip(&bridge, Vec::<HostValue>::new()), HostValue::Array(Vec::new()));
}

#[test]
fn test_map_round_trip() {
    let (_, bridge) = bridge();
    let value = map(&[
        ("name", "lukas".into()),
        ("age", 30.into()),
        ("tags", HostValue::Array(vec!["a".into(), "b".into()])),
    ]);
    assert_eq!(round_trip(&bridge, value.clone()), value);
}

#[test]
fn test_map_lookup_from_foreign_side() {
    let (_, bridge) = bridge();
    let proxy = foreign(&bridge, map(&[("key", "value".into())]));
    let found = proxy.invoke("objectForKey", &["key".into()]).unwrap();
    assert_eq!(bridge.to_host(&found).unwrap(), HostValue::Text("value".to_string()));

    let missing = proxy.invoke("objectForKey", &["other".into()]).unwrap();
    assert_eq!(missing, HostValue::Null);
}

#[test]
fn test_null_is_nil() {
    let (_, bridge) = bridge();
    assert_eq!(bridge.to_foreign(&HostValue::Null).unwrap(), ForeignValue::NIL);
    assert_eq!(bridge.to_host(&HostValue::Null).unwrap(), HostValue::Null);
}

#[test]
fn test_proxy_passes_through_unchanged() {
    let (_, bridge) = bridge();
    let proxy = foreign(&bridge, "x");
    assert_eq!(
        bridge.to_foreign(&HostValue::Object(proxy.clone())).unwrap(),
        ForeignValue::Object(Some(proxy.ptr()))
    );
}

#[test]
fn test_unconvertible_value_fails_by_default() {
    let (_, bridge) = bridge();
    let err = bridge.to_foreign(&HostValue::Pointer(0x40)).unwrap_err();
    assert_eq!(err, BridgeError::UnconvertibleValue { kind: "pointer".to_string() });
}

#[test]
fn test_container_conversion_is_all_or_nothing() {
    let (_, bridge) = bridge();
    let value = HostValue::Array(vec![1.into(), HostValue::Pointer(0x40)]);

    let err = bridge.to_foreign(&value).unwrap_err();
    assert_eq!(err, BridgeError::UnconvertibleValue { kind: "array".to_string() });

    let handled = bridge
        .to_foreign_with(&value, Unconverted::Handler(&|v| {
            assert_eq!(v.kind_name(), "array");
            Ok(ForeignValue::Pointer(7))
        }))
        .unwrap();
    assert_eq!(handled, ForeignValue::Pointer(7));
}

#[test]
fn test_map_with_unconvertible_value_goes_to_handler() {
    let (_, bridge) = bridge();
    let value = map(&[("ok", 1.into()), ("bad", HostValue::Selector("count".into()))]);
    let result = bridge
        .to_foreign_with(&value, Unconverted::Handler(&|v| {
            Ok(ForeignValue::Pointer(v.kind_name().len()))
        }))
        .unwrap();
    assert_eq!(result, ForeignValue::Pointer("map".len()));
}

#[test]
fn test_pass_through_marshals_raw_values() {
    let (_, bridge) = bridge();
    let selector = bridge
        .to_foreign_with(&HostValue::Selector("count".into()), Unconverted::PassThrough)
        .unwrap();
    assert!(matches!(selector, ForeignValue::Selector(Some(_))));

    let pointer = bridge
        .to_foreign_with(&HostValue::Pointer(0x80), Unconverted::PassThrough)
        .unwrap();
    assert_eq!(pointer, ForeignValue::Pointer(0x80));

    let err = bridge
        .to_foreign_with(&HostValue::Ref(Default::default()), Unconverted::PassThrough)
        .unwrap_err();
    assert_eq!(err, BridgeError::UnconvertibleValue { kind: "ref".to_string() });
}

#[test]
fn test_unknown_objects_fall_back_to_proxy() {
    let (_, bridge) = bridge();
    let error = bridge
        .class("NSError")
        .unwrap()
        .invoke("errorWithDomain_code_userInfo", &["Demo".into(), 3.into(), HostValue::Null])
        .unwrap();

    let converted = bridge.to_host(&error).unwrap();
    assert_eq!(converted, error);

    let handled = bridge
        .to_host_with(&error, Fallback::Handler(&|proxy| {
            Ok(HostValue::Text(proxy.class_name()))
        }))
        .unwrap();
    assert_eq!(handled, HostValue::Text("NSError".to_string()));
}

#[test]
fn test_classes_are_not_converted() {
    let (_, bridge) = bridge();
    let class = HostValue::Object(bridge.class("NSString").unwrap());
    assert_eq!(bridge.to_host(&class).unwrap(), class);
}

#[test]
fn test_non_objects_are_returned_unchanged() {
    let (_, bridge) = bridge();
    for value in [HostValue::Number(1.5), HostValue::Text("x".into()), HostValue::Bool(true)] {
        assert_eq!(bridge.to_host(&value).unwrap(), value);
    }
}
