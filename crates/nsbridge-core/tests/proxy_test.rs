//! Object proxies: method calls, attributes, iteration and display

mod common;

use std::collections::BTreeMap;

use common::{bridge, foreign, instance};
use nsbridge_core::{Attribute, BridgeError, HandleKind, HostValue};
use pretty_assertions::assert_eq;

#[test]
fn test_greeter_end_to_end() {
    let (_, bridge) = bridge();
    let greeter = instance(&bridge, "Greeter");
    let greeting = greeter.invoke("greet", &["lukas".into()]).unwrap();
    assert_eq!(
        bridge.to_host(&greeting).unwrap(),
        HostValue::Text("hello, lukas!".to_string())
    );
}

#[test]
fn test_method_proxy_calls_through() {
    let (_, bridge) = bridge();
    let greeter = instance(&bridge, "Greeter");
    let Attribute::Method(greet) = greeter.attribute("greet") else {
        panic!("expected a method");
    };
    assert_eq!(greet.name(), "greet");
    assert_eq!(greet.target(), &greeter);
    assert_eq!(greet.to_string(), "[objc.MethodProxy '-[Greeter greet]']");

    let greeting = greet.call(&["ada".into()]).unwrap();
    assert_eq!(greeting.as_object().unwrap().to_string_value().unwrap(), "hello, ada!");
}

#[test]
fn test_ptr_attribute() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    match text.attribute("ptr") {
        Attribute::Pointer(ptr) => assert_eq!(ptr, text.ptr()),
        Attribute::Method(_) => panic!("ptr should not resolve to a method"),
    }
}

#[test]
fn test_handle_kind() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSString").unwrap();
    let text = foreign(&bridge, "x");

    assert_eq!(class.handle().kind, HandleKind::Class);
    assert_eq!(text.handle().kind, HandleKind::Instance);
    assert!(class.is_class());
    assert!(!text.is_class());
}

#[test]
fn test_wrap_is_identity_preserving() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    assert_eq!(bridge.wrap(text.ptr()), text);
    assert_eq!(text.class_name(), "NSString");
}

#[test]
fn test_display_collapses_whitespace() {
    let (_, bridge) = bridge();
    let array = foreign(&bridge, vec![HostValue::from("A"), "B".into()]);
    assert_eq!(array.to_string(), "[objc ( A, B )]");
    assert_eq!(foreign(&bridge, "hi  there").to_string(), "[objc hi there]");
    assert_eq!(bridge.class("NSArray").unwrap().to_string(), "[objc.Class NSArray]");
}

#[test]
fn test_to_string_and_to_number() {
    let (_, bridge) = bridge();
    assert_eq!(foreign(&bridge, 2.5).to_string_value().unwrap(), "2.5");
    assert_eq!(foreign(&bridge, 2.5).to_number().unwrap(), 2.5);
    assert!(foreign(&bridge, "x").to_number().is_err());
}

#[test]
fn test_iterate_array() {
    let (_, bridge) = bridge();
    let array = foreign(&bridge, vec![HostValue::from("A"), "B".into(), "C".into()]);
    let mut iter = array.iter().unwrap();

    let mut seen = Vec::new();
    for item in iter.by_ref() {
        seen.push(item.unwrap().to_string_value().unwrap());
    }
    assert_eq!(seen, vec!["A", "B", "C"]);
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
}

#[test]
fn test_iterate_dictionary_keys() {
    let (_, bridge) = bridge();
    let mut map = BTreeMap::new();
    map.insert("b".to_string(), HostValue::from(2));
    map.insert("a".to_string(), HostValue::from(1));
    let dictionary = foreign(&bridge, map);

    let mut keys = dictionary
        .iter()
        .unwrap()
        .map(|key| key.unwrap().to_string_value().unwrap())
        .collect::<Vec<_>>();
    keys.sort();
    assert_eq!(keys, vec!["a", "b"]);
}

#[test]
fn test_iterate_set() {
    let (_, bridge) = bridge();
    let array = foreign(&bridge, vec![HostValue::from(1), 2.into()]);
    let set = bridge
        .class("NSSet")
        .unwrap()
        .invoke("setWithArray", &[array.into()])
        .unwrap();
    let set = set.as_object().unwrap();

    assert_eq!(set.iter().unwrap().count(), 2);
}

#[test]
fn test_non_collections_are_not_enumerable() {
    let (_, bridge) = bridge();
    let err = foreign(&bridge, "x").iter().unwrap_err();
    assert_eq!(err, BridgeError::NotEnumerable { class: "NSString".to_string() });

    let err = bridge.class("NSArray").unwrap().iter().unwrap_err();
    assert_eq!(err, BridgeError::NotEnumerable { class: "NSArray".to_string() });
}

#[test]
fn test_nil_results_are_null() {
    let (_, bridge) = bridge();
    let empty = foreign(&bridge, Vec::<HostValue>::new());
    assert_eq!(empty.invoke("firstObject", &[]).unwrap(), HostValue::Null);
}

#[test]
fn test_class_methods_on_subclass_receiver() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSMutableDictionary").unwrap();
    let dictionary = class.invoke("dictionary", &[]).unwrap();
    let dictionary = dictionary.as_object().unwrap();
    dictionary
        .invoke("setObject_forKey", &["value".into(), "key".into()])
        .unwrap();

    let mut expected = BTreeMap::new();
    expected.insert("key".to_string(), HostValue::from("value"));
    assert_eq!(
        bridge.to_host(&HostValue::Object(dictionary.clone())).unwrap(),
        HostValue::Map(expected)
    );
}
