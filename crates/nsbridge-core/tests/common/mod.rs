//! Shared fixtures for the bridge integration tests

#![allow(dead_code)]

use std::sync::Arc;

use nsbridge_core::{Bridge, HostValue, ObjectProxy};
use nsbridge_sdk::{ForeignValue, ObjectPtr};
use nsbridge_sim::{int_arg, object_arg, slot_arg, SimRuntime};

/// A runtime with the simulated Foundation plus a few test classes
pub fn runtime() -> Arc<SimRuntime> {
    let runtime = Arc::new(SimRuntime::new());

    runtime
        .class_builder("Greeter")
        .instance_method("greet:", "@@:@", |rt, _, args| {
            let name = object_arg(args, 0)?
                .and_then(|ptr| rt.string_value(ptr))
                .unwrap_or_default();
            Ok(ForeignValue::Object(Some(rt.new_string(format!("hello, {}!", name))?)))
        })
        .register()
        .unwrap();

    runtime
        .class_builder("Resolver")
        .instance_method("foo:bar:", "@32@0:8@16@24", |rt, _, _| {
            Ok(ForeignValue::Object(Some(rt.new_string("foo:bar:")?)))
        })
        .instance_method("set_value:", "@24@0:8@16", |rt, _, _| {
            Ok(ForeignValue::Object(Some(rt.new_string("set_value:")?)))
        })
        .instance_method("count", "Q16@0:8", |_, _, _| Ok(ForeignValue::UInt(7)))
        .register()
        .unwrap();

    runtime
        .class_builder("Counter")
        .instance_method("increment:", "v24@0:8^q16", |_, _, args| {
            if let Some(slot) = slot_arg(args, 0)? {
                let mut value = slot.lock();
                *value = ForeignValue::Int(value.as_i64().unwrap_or_default() + 1);
            }
            Ok(ForeignValue::Void)
        })
        .instance_method("add:to:", "q32@0:8q16q24", |_, _, args| {
            Ok(ForeignValue::Int(int_arg(args, 0)? + int_arg(args, 1)?))
        })
        .register()
        .unwrap();

    runtime
}

/// A bridge over [`runtime`], keeping the concrete runtime for inspection
pub fn bridge() -> (Arc<SimRuntime>, Bridge) {
    let runtime = runtime();
    let bridge = Bridge::new(runtime.clone());
    (runtime, bridge)
}

/// `[[name new] ...]` as a proxy
pub fn instance(bridge: &Bridge, class: &str) -> ObjectProxy {
    let created = bridge.class(class).unwrap().invoke("new", &[]).unwrap();
    created.as_object().cloned().expect("new returned an object")
}

/// Convert to a foreign object and wrap it as a proxy
pub fn foreign(bridge: &Bridge, value: impl Into<HostValue>) -> ObjectProxy {
    let converted = bridge.to_foreign(&value.into()).unwrap();
    let ptr: ObjectPtr = converted.as_object().expect("converted to an object");
    bridge.wrap(ptr)
}

/// Host value to foreign object and back
pub fn round_trip(bridge: &Bridge, value: impl Into<HostValue>) -> HostValue {
    let proxy = foreign(bridge, value);
    bridge.to_host(&HostValue::Object(proxy)).unwrap()
}
