//! In/out reference cells

mod common;

use common::{bridge, foreign, instance};
use nsbridge_core::{Bridge, BridgeError, HostValue, InOutRef};
use pretty_assertions::assert_eq;

fn write_to(bridge: &Bridge, path: &str, error: HostValue) -> HostValue {
    foreign(bridge, "contents")
        .invoke(
            "writeToFile_atomically_encoding_error",
            &[path.into(), true.into(), 4.into(), error],
        )
        .unwrap()
}

#[test]
fn test_error_out_parameter() {
    let (_, bridge) = bridge();
    let error = InOutRef::empty();

    let ok = write_to(&bridge, "/nonexistent/file.txt", error.clone().into());
    assert_eq!(ok, HostValue::Bool(false));

    let value = error.value();
    let proxy = value.as_object().expect("error was written back");
    assert_eq!(proxy.class_name(), "NSError");
    assert_eq!(proxy.invoke("code", &[]).unwrap(), HostValue::Number(4.0));
    let domain = proxy.invoke("domain", &[]).unwrap();
    assert_eq!(
        bridge.to_host(&domain).unwrap(),
        HostValue::Text("NSCocoaErrorDomain".to_string())
    );
}

#[test]
fn test_untouched_out_parameter_reads_back_nil() {
    let (_, bridge) = bridge();
    let error = InOutRef::empty();

    let ok = write_to(&bridge, "/tmp/file.txt", error.clone().into());
    assert_eq!(ok, HostValue::Bool(true));
    assert_eq!(error.value(), HostValue::Null);
}

#[test]
fn test_null_for_out_parameter() {
    let (_, bridge) = bridge();
    let ok = write_to(&bridge, "/nonexistent/file.txt", HostValue::Null);
    assert_eq!(ok, HostValue::Bool(false));
}

#[test]
fn test_primitive_in_out() {
    let (_, bridge) = bridge();
    let counter = instance(&bridge, "Counter");
    let cell = InOutRef::new(41);

    counter.invoke("increment", &[cell.clone().into()]).unwrap();
    assert_eq!(cell.value(), HostValue::Number(42.0));
    assert!(!cell.is_bound());

    counter.invoke("increment", &[cell.clone().into()]).unwrap();
    assert_eq!(cell.value(), HostValue::Number(43.0));
}

#[test]
fn test_wrong_initial_value_is_an_argument_error() {
    let (_, bridge) = bridge();
    let counter = instance(&bridge, "Counter");
    let cell = InOutRef::new("not a number");

    let err = counter.invoke("increment", &[cell.clone().into()]).unwrap_err();
    assert!(matches!(err, BridgeError::ArgumentType { index: 0, .. }));
    assert_eq!(cell.value(), HostValue::Text("not a number".to_string()));
}

#[test]
fn test_set_before_call() {
    let cell = InOutRef::empty();
    assert_eq!(cell.value(), HostValue::Null);
    assert!(!cell.is_bound());

    cell.set(5);
    assert_eq!(cell.value(), HostValue::Number(5.0));
}

#[test]
fn test_clones_share_the_cell() {
    let cell = InOutRef::new(1);
    let other = cell.clone();
    other.set(2);
    assert_eq!(cell.value(), HostValue::Number(2.0));
    assert_eq!(cell, other);
}
