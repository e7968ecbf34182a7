use std::sync::Arc;

use nsbridge_types::{parse_one, EncodingError, StructRegistry, TypeDescriptor};
use pretty_assertions::assert_eq;

fn parse_struct(encoding: &str, registry: &StructRegistry) -> Arc<nsbridge_types::StructType> {
    match parse_one(encoding, registry).unwrap() {
        TypeDescriptor::Struct(st) => st,
        other => panic!("expected struct, got {other:?}"),
    }
}

#[test]
fn test_more_detailed_definition_wins() {
    let registry = StructRegistry::new();
    let unnamed = parse_struct("{Pt=ii}", &registry);
    assert_eq!(unnamed.completeness(), (0, 2));

    let named = parse_struct("{Pt=\"x\"i\"y\"i}", &registry);
    assert_eq!(named.field_index("y"), Some(1));

    let by_name = registry.get("Pt").unwrap();
    assert!(Arc::ptr_eq(&by_name, &named));
    // the encoding key of the poorer definition now aliases the winner
    assert!(Arc::ptr_eq(&registry.get("{Pt=ii}").unwrap(), &named));
    assert!(Arc::ptr_eq(
        &registry.get("{Pt=\"x\"i\"y\"i}").unwrap(),
        &named
    ));
    // the replaced definition handed out earlier is untouched
    assert_eq!(unnamed.completeness(), (0, 2));
}

#[test]
fn test_less_detailed_definition_reuses_entry() {
    let registry = StructRegistry::new();
    let full = parse_struct("{_NSRange=\"location\"Q\"length\"Q}", &registry);
    let partial = parse_struct("{_NSRange=QQ}", &registry);
    assert!(Arc::ptr_eq(&full, &partial));
    assert!(Arc::ptr_eq(&registry.get("{_NSRange=QQ}").unwrap(), &full));

    let reference = parse_struct("{_NSRange}", &registry);
    assert!(Arc::ptr_eq(&reference, &full));

    let forward = parse_struct("{_NSRange=}", &registry);
    assert!(Arc::ptr_eq(&forward, &full));
}

#[test]
fn test_name_only_reference_requires_definition() {
    let registry = StructRegistry::new();
    assert_eq!(
        parse_one("{Pt}", &registry),
        Err(EncodingError::UnresolvedStructReference {
            encoding: "{Pt}".to_string(),
            name: "Pt".to_string(),
        })
    );
}

#[test]
fn test_forward_declaration_is_filled_later() {
    let registry = StructRegistry::new();
    let forward = parse_struct("{Opaque=}", &registry);
    assert!(forward.is_forward());
    let full = parse_struct("{Opaque=\"a\"q}", &registry);
    assert!(!full.is_forward());
    assert!(Arc::ptr_eq(&registry.get("Opaque").unwrap(), &full));
}

#[test]
fn test_define_with_aliases() {
    let registry = StructRegistry::new();
    let ty = registry
        .define("{Vec2=\"dx\"f\"dy\"f}", &["Vector", "Offset"])
        .unwrap();
    assert!(Arc::ptr_eq(&registry.get("Vector").unwrap(), &ty));
    assert!(Arc::ptr_eq(&registry.get("Offset").unwrap(), &ty));

    let other = registry.define("{Other=i}", &[]).unwrap();
    assert_eq!(
        registry.alias("Vector", &other),
        Err(EncodingError::AliasExists {
            alias: "Vector".to_string()
        })
    );
}

#[test]
fn test_aliases_follow_merge() {
    let registry = StructRegistry::new();
    registry.define("{Sz=dd}", &["Dimensions"]).unwrap();
    let named = registry
        .define("{Sz=\"width\"d\"height\"d}", &[])
        .unwrap();
    assert!(Arc::ptr_eq(&registry.get("Dimensions").unwrap(), &named));
}

#[test]
fn test_global_registry_is_shared() {
    let a = StructRegistry::global();
    let b = StructRegistry::global();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.contains("NSRect"));
}
