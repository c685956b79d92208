use super::*;
use crate::registry::TypeRegistry;
use crate::resolve::resolve_all;
use crate::types::{IntrinsicKind, ObjectShape, PropertyInfo};

fn number() -> TypeIr {
    TypeIr::Intrinsic(IntrinsicKind::Number)
}

fn box_registry() -> TypeRegistry {
    let mut registry = TypeRegistry::with_builtins();
    registry.register(
        "Box",
        TypeIr::interface(
            1,
            ObjectShape::new(vec![PropertyInfo::new("value", TypeIr::Param(0))]),
        ),
    );
    registry.register(
        "Pair",
        TypeIr::interface(
            0,
            ObjectShape::new(vec![
                PropertyInfo::new(
                    "first",
                    TypeIr::applied("Box", vec![TypeIr::reference("number")]),
                ),
                PropertyInfo::new(
                    "second",
                    TypeIr::applied("Box", vec![TypeIr::reference("number")]),
                ),
            ]),
        ),
    );
    resolve_all(&mut registry).unwrap();
    registry
}

#[test]
fn memoizes_structurally_equal_instantiations() {
    let registry = box_registry();
    let mut state = InstantiationState::new(&registry);

    let root = instantiate(&TypeIr::reference("Pair"), &mut state).unwrap();
    assert_eq!(root, TypeIr::Instantiated { key: "Pair".into() });

    // Two references, one memo entry, usage count folded to 2.
    let box_keys: Vec<_> = state
        .memo()
        .keys()
        .filter(|k| k.starts_with("Box"))
        .collect();
    assert_eq!(box_keys, vec!["Box<number>"]);
    assert_eq!(state.usage()["Box<number>"], 2);
    assert!(!state.memo()["Box<number>"].circular);

    let entry = &state.memo()["Box<number>"];
    assert_eq!(
        entry.value,
        TypeIr::Object(ObjectShape::new(vec![PropertyInfo::new("value", number())]))
    );
}

#[test]
fn memo_hit_replays_recorded_usage() {
    let registry = box_registry();
    let mut state = InstantiationState::new(&registry);

    instantiate(&TypeIr::reference("Pair"), &mut state).unwrap();
    assert_eq!(state.usage()["Pair"], 1);
    assert_eq!(state.usage()["Box<number>"], 2);

    // Second instantiation hits the memo and replays Pair's body counts.
    instantiate(&TypeIr::reference("Pair"), &mut state).unwrap();
    assert_eq!(state.usage()["Pair"], 2);
    assert_eq!(state.usage()["Box<number>"], 4);
    assert_eq!(state.memo().keys().filter(|k| *k == "Pair").count(), 1);
}

#[test]
fn self_referential_generic_terminates_and_is_marked_circular() {
    let mut registry = TypeRegistry::with_builtins();
    registry.register(
        "Node",
        TypeIr::interface(
            1,
            ObjectShape::new(vec![
                PropertyInfo::new("value", TypeIr::Param(0)),
                PropertyInfo::new("next", TypeIr::applied("Node", vec![TypeIr::Param(0)])),
            ]),
        ),
    );
    resolve_all(&mut registry).unwrap();

    let mut state = InstantiationState::new(&registry);
    let root = instantiate(&TypeIr::applied("Node", vec![number()]), &mut state).unwrap();
    assert_eq!(
        root,
        TypeIr::Instantiated {
            key: "Node<number>".into()
        }
    );

    let entry = &state.memo()["Node<number>"];
    assert!(entry.circular);
    let TypeIr::Object(shape) = &entry.value else {
        panic!("expected object body, got {:?}", entry.value);
    };
    assert_eq!(shape.property("value").unwrap().ty, number());
    assert_eq!(
        shape.property("next").unwrap().ty,
        TypeIr::Instantiated {
            key: "Node<number>".into()
        }
    );
}

#[test]
fn mutual_recursion_terminates() {
    let mut registry = TypeRegistry::with_builtins();
    registry.register(
        "Even",
        TypeIr::interface(
            0,
            ObjectShape::new(vec![PropertyInfo::optional("odd", TypeIr::reference("Odd"))]),
        ),
    );
    registry.register(
        "Odd",
        TypeIr::interface(
            0,
            ObjectShape::new(vec![PropertyInfo::optional(
                "even",
                TypeIr::reference("Even"),
            )]),
        ),
    );
    resolve_all(&mut registry).unwrap();

    let mut state = InstantiationState::new(&registry);
    instantiate(&TypeIr::reference("Even"), &mut state).unwrap();
    // Only the revisited key carries the flag; Odd's body terminates through
    // the named Even indirection.
    assert!(state.memo()["Even"].circular);
    assert!(!state.memo()["Odd"].circular);
    assert_eq!(
        state.memo()["Odd"]
            .value
            .to_string(),
        "{even?: Even}"
    );
}

#[test]
fn new_keys_lists_only_the_latest_call() {
    let registry = box_registry();
    let mut state = InstantiationState::new(&registry);

    instantiate(&TypeIr::applied("Box", vec![number()]), &mut state).unwrap();
    assert_eq!(state.new_keys(), ["Box<number>"]);

    instantiate(&TypeIr::reference("Pair"), &mut state).unwrap();
    // Box<number> was already memoized, so only Pair is new.
    assert_eq!(state.new_keys(), ["Pair"]);
}

#[test]
fn rejects_parameters_on_non_generic_declarations() {
    let mut registry = TypeRegistry::with_builtins();
    registry.register("three", TypeIr::number_lit(3.0));

    let mut state = InstantiationState::new(&registry);
    let result = instantiate(&TypeIr::applied("three", vec![number()]), &mut state);
    assert_eq!(
        result,
        Err(crate::SolverError::TypeDoesNotAcceptGenericParameters {
            name: "three".into(),
            kind: "a literal",
        })
    );
}

#[test]
fn unknown_reference_is_reported() {
    let registry = TypeRegistry::with_builtins();
    let mut state = InstantiationState::new(&registry);
    assert_eq!(
        instantiate(&TypeIr::reference("Missing"), &mut state),
        Err(crate::SolverError::UnregisteredType("Missing".into()))
    );
}

#[test]
fn deep_nesting_is_a_user_error_not_a_crash() {
    let mut registry = TypeRegistry::with_builtins();
    let last = MAX_INSTANTIATION_DEPTH + 4;
    for i in 0..last {
        let body = if i + 1 == last {
            TypeIr::reference("number")
        } else {
            TypeIr::reference(format!("Level{}", i + 1))
        };
        registry.register(
            format!("Level{i}"),
            TypeIr::interface(0, ObjectShape::new(vec![PropertyInfo::new("inner", body)])),
        );
    }
    resolve_all(&mut registry).unwrap();

    let mut state = InstantiationState::new(&registry);
    let result = instantiate(&TypeIr::reference("Level0"), &mut state);
    assert_eq!(
        result,
        Err(crate::SolverError::DepthLimitExceeded {
            context: "instantiating generic types",
            depth: MAX_INSTANTIATION_DEPTH,
        })
    );
}

#[test]
fn canonical_keys_are_deterministic() {
    assert_eq!(canonical_key("Node", &[number()]), "Node<number>");
    assert_eq!(
        canonical_key("Map", &[TypeIr::Intrinsic(IntrinsicKind::String), number()]),
        "Map<string, number>"
    );
    assert_eq!(canonical_key("User", &[]), "User");
}
