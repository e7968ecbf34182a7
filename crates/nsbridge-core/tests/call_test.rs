//! Selector resolution, call descriptors and argument checking

mod common;

use std::sync::Arc;

use common::{bridge, foreign, instance};
use nsbridge_core::{Bridge, BridgeError, BridgeOptions, HostValue};
use nsbridge_sdk::MethodSide;
use pretty_assertions::assert_eq;

#[test]
fn test_underscores_resolve_to_colons() {
    let (_, bridge) = bridge();
    let resolver = instance(&bridge, "Resolver");
    assert_eq!(bridge.resolve_selector(resolver.ptr(), "foo_bar_").unwrap(), "foo:bar:");
}

#[test]
fn test_underscore_kept_when_selector_has_one() {
    let (_, bridge) = bridge();
    let resolver = instance(&bridge, "Resolver");
    assert_eq!(bridge.resolve_selector(resolver.ptr(), "set_value_").unwrap(), "set_value:");

    let result = resolver.invoke("set_value", &["x".into()]).unwrap();
    assert_eq!(bridge.to_host(&result).unwrap(), HostValue::Text("set_value:".into()));
}

#[test]
fn test_invoke_appends_trailing_underscore() {
    let (_, bridge) = bridge();
    let resolver = instance(&bridge, "Resolver");
    let result = resolver.invoke("foo_bar", &[1.into(), 2.into()]).unwrap();
    assert_eq!(bridge.to_host(&result).unwrap(), HostValue::Text("foo:bar:".into()));
}

#[test]
fn test_method_not_found_with_suggestion() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSString").unwrap();
    let err = bridge.resolve_selector(class.ptr(), "stringWithString").unwrap_err();
    assert_eq!(
        err,
        BridgeError::MethodNotFound {
            class: "NSString".to_string(),
            name: "stringWithString".to_string(),
            suggestion: Some("stringWithString_".to_string()),
        }
    );
    assert!(err.to_string().contains("did you mean stringWithString_?"));
}

#[test]
fn test_method_not_found_without_suggestion() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    let err = text.invoke("frobnicate", &[]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::MethodNotFound {
            class: "NSString".to_string(),
            name: "frobnicate".to_string(),
            suggestion: None,
        }
    );
}

#[test]
fn test_suggestions_can_be_disabled() {
    let runtime = common::runtime();
    let options = BridgeOptions {
        suggest_corrections: false,
        ..BridgeOptions::default()
    };
    let bridge = Bridge::with_options(runtime, options);
    let class = bridge.class("NSString").unwrap();
    match bridge.resolve_selector(class.ptr(), "stringWithString") {
        Err(BridgeError::MethodNotFound { suggestion, .. }) => assert_eq!(suggestion, None),
        other => panic!("expected MethodNotFound, got {:?}", other),
    }
}

#[test]
fn test_class_and_instance_sides() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSString").unwrap();
    let text = foreign(&bridge, "x");

    assert!(class.responds_to("stringWithString:"));
    assert!(!class.responds_to("length"));
    assert!(text.responds_to("length"));
    assert!(!text.responds_to("stringWithString:"));

    let descriptor = bridge.introspect(class.ptr(), "stringWithString:").unwrap();
    assert_eq!(descriptor.side(), MethodSide::Class);
    assert_eq!(descriptor.class_name(), "NSString");
}

#[test]
fn test_inherited_methods_resolve() {
    let (_, bridge) = bridge();
    let array = bridge.class("NSMutableArray").unwrap().invoke("array", &[]).unwrap();
    let array = array.as_object().unwrap();
    assert_eq!(array.class_name(), "NSMutableArray");
    assert_eq!(array.invoke("count", &[]).unwrap(), HostValue::Number(0.0));
}

#[test]
fn test_descriptor_describes_the_method() {
    let (_, bridge) = bridge();
    let counter = instance(&bridge, "Counter");
    let descriptor = bridge.introspect(counter.ptr(), "add:to:").unwrap();

    assert_eq!(descriptor.selector(), "add:to:");
    assert_eq!(descriptor.encoding(), "q32@0:8q16q24");
    assert_eq!(descriptor.explicit_arity(), 2);
    assert_eq!(descriptor.argument_types().len(), 2);
    assert_eq!(descriptor.return_type().to_string(), "q");
    assert!(descriptor.inout_positions().is_empty());
}

#[test]
fn test_descriptors_are_cached_per_class() {
    let (_, bridge) = bridge();
    let first = foreign(&bridge, "a");
    let second = foreign(&bridge, "b");
    let before = bridge.signatures().len();

    let one = bridge.introspect(first.ptr(), "length").unwrap();
    let two = bridge.introspect(second.ptr(), "length").unwrap();

    assert!(Arc::ptr_eq(&one, &two));
    assert_eq!(bridge.signatures().len(), before + 1);
}

#[test]
fn test_selector_not_found() {
    let (_, bridge) = bridge();
    let counter = instance(&bridge, "Counter");
    let err = bridge.introspect(counter.ptr(), "reset").unwrap_err();
    assert_eq!(
        err,
        BridgeError::SelectorNotFound {
            class: "Counter".to_string(),
            selector: "reset".to_string(),
        }
    );
}

#[test]
fn test_class_not_found() {
    let (_, bridge) = bridge();
    assert_eq!(
        bridge.class("NSWidget").unwrap_err(),
        BridgeError::ClassNotFound { name: "NSWidget".to_string() }
    );
}

#[test]
fn test_classes_are_cached() {
    let (_, bridge) = bridge();
    assert_eq!(bridge.class("NSArray").unwrap(), bridge.class("NSArray").unwrap());
}

#[test]
fn test_primitive_arguments_and_results() {
    let (_, bridge) = bridge();
    let counter = instance(&bridge, "Counter");
    assert_eq!(
        counter.invoke("add_to", &[40.into(), 2.into()]).unwrap(),
        HostValue::Number(42.0)
    );
}

#[test]
fn test_argument_count_is_checked() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    let err = bridge.send(text.ptr(), "length", &[1.into()]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::ArgumentCount {
            selector: "length".to_string(),
            expected: 0,
            got: 1,
        }
    );
}

#[test]
fn test_argument_type_is_checked() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSNumber").unwrap();
    match class.invoke("numberWithDouble", &["x".into()]).unwrap_err() {
        BridgeError::ArgumentType { selector, index, encoding, .. } => {
            assert_eq!(selector, "numberWithDouble:");
            assert_eq!(index, 0);
            assert_eq!(encoding, "@@:d");
        }
        other => panic!("expected ArgumentType, got {:?}", other),
    }
}

#[test]
fn test_integer_arguments_must_fit_their_width() {
    let (_, bridge) = bridge();
    let class = bridge.class("NSNumber").unwrap();
    let rejected = [
        ("numberWithInt", 5e9),
        ("numberWithInt", 1.5),
        ("numberWithBool", 300.0),
    ];
    for (method, n) in rejected {
        match class.invoke(method, &[n.into()]).unwrap_err() {
            BridgeError::ArgumentType { index, .. } => assert_eq!(index, 0),
            other => panic!("{} accepted {}: {:?}", method, n, other),
        }
    }

    let counter = instance(&bridge, "Counter");
    assert!(matches!(
        counter.invoke("add_to", &[40.5.into(), 2.into()]).unwrap_err(),
        BridgeError::ArgumentType { .. }
    ));
    assert!(class.invoke("numberWithLongLong", &[5e9.into()]).is_ok());
}

#[test]
fn test_foreign_exceptions_surface_as_errors() {
    let (_, bridge) = bridge();
    let array = foreign(&bridge, vec![HostValue::from(1)]);
    match array.invoke("objectAtIndex", &[5.into()]).unwrap_err() {
        BridgeError::ForeignException { name, .. } => assert_eq!(name, "NSRangeException"),
        other => panic!("expected ForeignException, got {:?}", other),
    }
}

#[test]
fn test_selector_arguments() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    let yes = text
        .invoke("respondsToSelector", &[HostValue::Selector("length".into())])
        .unwrap();
    let no = text
        .invoke("respondsToSelector", &[HostValue::Selector("count".into())])
        .unwrap();
    assert_eq!(yes, HostValue::Bool(true));
    assert_eq!(no, HostValue::Bool(false));
}

#[test]
fn test_class_arguments() {
    let (_, bridge) = bridge();
    let text = foreign(&bridge, "x");
    let string_class = bridge.class("NSString").unwrap();
    let result = text.invoke("isKindOfClass", &[string_class.into()]).unwrap();
    assert_eq!(result, HostValue::Bool(true));

    let err = text.invoke("isKindOfClass", &["NSString".into()]).unwrap_err();
    assert!(matches!(err, BridgeError::ArgumentType { index: 0, .. }));
}
