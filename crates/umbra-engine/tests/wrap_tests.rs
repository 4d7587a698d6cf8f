//! Graph wrapping: identity, cycles, sharing and sequence shape

use umbra_engine::umbra_sdk::{AttributeBridge, ForeignValue, InMemoryRuntime};
use umbra_engine::{
    ClassKind, GraphWrapper, IdentityMap, MirrorArena, MirrorClassRegistry, MirrorError,
    MirrorSchema, NativeType, Value,
};

fn mirror(name: &str) -> NativeType {
    NativeType::Mirror(name.to_string())
}

fn list_of(elem: NativeType) -> NativeType {
    NativeType::List(Box::new(elem))
}

fn registry() -> MirrorClassRegistry {
    let registry = MirrorClassRegistry::default();
    registry
        .define_mirror_class(
            "Link",
            &MirrorSchema::new()
                .property("getLabel", NativeType::Str)
                .property("getNext", mirror("Link")),
            ClassKind::Fact,
        )
        .unwrap();
    registry
        .define_mirror_class(
            "Item",
            &MirrorSchema::new().property("getWeight", NativeType::Int),
            ClassKind::Fact,
        )
        .unwrap();
    registry
}

// ============================================================================
// Null handling
// ============================================================================

#[test]
fn test_null_wraps_to_null_for_every_type() {
    let rt = InMemoryRuntime::new();
    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();

    for target in [
        mirror("Link"),
        list_of(mirror("Item")),
        NativeType::Object,
        NativeType::Int,
    ] {
        let value = wrapper.wrap(&target, None, &mut arena, &mut ids).unwrap();
        assert!(value.is_null(), "{:?} should wrap null to null", target);
    }
    assert!(ids.is_empty());
}

#[test]
fn test_null_attribute_stays_null() {
    let rt = InMemoryRuntime::new();
    let a = rt.alloc_object("Link");
    rt.put(a, "getLabel", "end");
    rt.put(a, "getNext", ForeignValue::Null);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let root = wrapper.wrap(&mirror("Link"), Some(a), &mut arena, &mut ids).unwrap();

    let instance = arena.instance(root.as_mirror().unwrap()).unwrap();
    assert_eq!(instance.fields(), &[Value::from("end"), Value::Null]);
    assert_eq!(ids.len(), 1);
}

// ============================================================================
// Cycles and identity
// ============================================================================

#[test]
fn test_two_node_cycle() {
    let rt = InMemoryRuntime::new();
    let a = rt.alloc_object("Link");
    let b = rt.alloc_object("Link");
    rt.put(a, "getLabel", "A");
    rt.put(a, "getNext", b);
    rt.put(b, "getLabel", "B");
    rt.put(b, "getNext", a);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let native_a = wrapper.wrap(&mirror("Link"), Some(a), &mut arena, &mut ids).unwrap();

    let ha = native_a.as_mirror().unwrap();
    let next_of_a = arena.instance(ha).unwrap().fields()[1].clone();
    let hb = next_of_a.as_mirror().expect("A.next should be a mirror");
    let next_of_b = arena.instance(hb).unwrap().fields()[1].clone();

    assert_ne!(ha, hb);
    assert_eq!(next_of_b, Value::Mirror(ha));
    assert_eq!(arena.instance(hb).unwrap().fields()[0], Value::from("B"));
    assert_eq!(ids.len(), 2);
    assert_eq!(arena.len(), 2);
}

#[test]
fn test_long_cycle_registers_each_id_once() {
    let rt = InMemoryRuntime::new();
    let nodes: Vec<_> = (0..50).map(|_| rt.alloc_object("Link")).collect();
    for (i, node) in nodes.iter().enumerate() {
        rt.put(*node, "getLabel", format!("n{}", i));
        rt.put(*node, "getNext", nodes[(i + 1) % nodes.len()]);
    }

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    wrapper
        .wrap(&mirror("Link"), Some(nodes[17]), &mut arena, &mut ids)
        .unwrap();

    assert_eq!(ids.len(), 50);
    assert_eq!(arena.len(), 50);
    for node in &nodes {
        assert!(ids.contains(rt.identify(*node).unwrap()));
    }
}

#[test]
fn test_long_chain_does_not_grow_the_stack() {
    let rt = InMemoryRuntime::new();
    let nodes: Vec<_> = (0..50_000).map(|_| rt.alloc_object("Link")).collect();
    for (i, node) in nodes.iter().enumerate() {
        rt.put(*node, "getLabel", format!("n{}", i));
        match nodes.get(i + 1) {
            Some(next) => rt.put(*node, "getNext", *next),
            None => rt.put(*node, "getNext", ForeignValue::Null),
        }
    }

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let head = wrapper
        .wrap(&mirror("Link"), Some(nodes[0]), &mut arena, &mut ids)
        .unwrap();

    assert_eq!(ids.len(), nodes.len());
    let mut current = head.as_mirror();
    let mut walked = 0;
    while let Some(handle) = current {
        let instance = arena.instance(handle).unwrap();
        assert_eq!(instance.fields()[0], Value::from(format!("n{}", walked)));
        current = instance.fields()[1].as_mirror();
        walked += 1;
    }
    assert_eq!(walked, nodes.len());
}

#[test]
fn test_same_id_yields_same_instance() {
    let rt = InMemoryRuntime::new();
    let a = rt.alloc_object("Item");
    rt.put(a, "getWeight", 4i64);
    // A second handle reporting the same foreign id
    let alias = rt.alloc_object_with_id("Item", rt.identify(a).unwrap());
    rt.put(alias, "getWeight", 99i64);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let first = wrapper.wrap(&mirror("Item"), Some(a), &mut arena, &mut ids).unwrap();
    let second = wrapper.wrap(&mirror("Item"), Some(alias), &mut arena, &mut ids).unwrap();

    assert_eq!(first, second);
    assert_eq!(arena.len(), 1);
    // The first wrap's values are kept
    assert_eq!(
        arena.instance(first.as_mirror().unwrap()).unwrap().fields()[0],
        Value::Int(4)
    );
}

// ============================================================================
// Sequences
// ============================================================================

#[test]
fn test_shared_elements_in_sequence() {
    let rt = InMemoryRuntime::new();
    let x = rt.alloc_object("Item");
    let y = rt.alloc_object("Item");
    rt.put(x, "getWeight", 1i64);
    rt.put(y, "getWeight", 2i64);
    let list = rt.alloc_array(vec![x, y, x]);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let seq = wrapper
        .wrap(&list_of(mirror("Item")), Some(list), &mut arena, &mut ids)
        .unwrap();

    let items = arena.sequence(seq.as_sequence().unwrap()).unwrap().items();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0], items[2]);
    assert_ne!(items[0], items[1]);
    // list + x + y
    assert_eq!(ids.len(), 3);
}

#[test]
fn test_sequence_preserves_order_and_length() {
    let rt = InMemoryRuntime::new();
    let elements: Vec<_> = (0..10)
        .map(|w| {
            let item = rt.alloc_object("Item");
            rt.put(item, "getWeight", w as i64);
            item
        })
        .collect();
    let list = rt.alloc_array(elements);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let seq = wrapper
        .wrap(
            &NativeType::Array(Box::new(mirror("Item"))),
            Some(list),
            &mut arena,
            &mut ids,
        )
        .unwrap();

    let items = arena.sequence(seq.as_sequence().unwrap()).unwrap().items().to_vec();
    assert_eq!(items.len(), 10);
    for (expected, item) in items.iter().enumerate() {
        let instance = arena.instance(item.as_mirror().unwrap()).unwrap();
        assert_eq!(instance.fields()[0], Value::Int(expected as i64));
    }
}

#[test]
fn test_self_containing_sequence() {
    let rt = InMemoryRuntime::new();
    let list = rt.alloc_array(Vec::new());
    rt.set_elements(list, vec![list]);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let target = list_of(list_of(NativeType::Object));
    let seq = wrapper.wrap(&target, Some(list), &mut arena, &mut ids).unwrap();

    let handle = seq.as_sequence().unwrap();
    assert_eq!(arena.sequence(handle).unwrap().items(), &[Value::Sequence(handle)]);
    assert_eq!(ids.len(), 1);
}

#[test]
fn test_object_elements_are_not_mirrored() {
    let rt = InMemoryRuntime::new();
    let x = rt.alloc_object("Whatever");
    let list = rt.alloc_array(vec![x]);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let mut arena = MirrorArena::new();
    let mut ids = IdentityMap::new();
    let seq = wrapper
        .wrap(&NativeType::reference_array(), Some(list), &mut arena, &mut ids)
        .unwrap();

    assert_eq!(
        arena.sequence(seq.as_sequence().unwrap()).unwrap().items(),
        &[Value::Foreign(x)]
    );
    // Only the array itself is registered
    assert_eq!(ids.len(), 1);
}

// ============================================================================
// Shape mismatches
// ============================================================================

#[test]
fn test_non_enumerable_collection_is_a_schema_mismatch() {
    let rt = InMemoryRuntime::new();
    let x = rt.alloc_object("Item");
    rt.put(x, "name", "solo");

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let err = wrapper
        .wrap(
            &list_of(mirror("Item")),
            Some(x),
            &mut MirrorArena::new(),
            &mut IdentityMap::new(),
        )
        .unwrap_err();

    match err {
        MirrorError::SchemaMismatch { object, detail } => {
            assert_eq!(object, "Item(solo)");
            assert!(detail.contains("not array-shaped"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_scalar_where_mirror_declared() {
    let rt = InMemoryRuntime::new();
    let a = rt.alloc_object("Link");
    rt.put(a, "getLabel", "A");
    rt.put(a, "getNext", 12i64);

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let err = wrapper
        .wrap(
            &mirror("Link"),
            Some(a),
            &mut MirrorArena::new(),
            &mut IdentityMap::new(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MirrorError::SchemaMismatch { ref detail, .. } if detail.contains("getNext")
    ));
}

#[test]
fn test_missing_attribute_is_a_bridge_error() {
    let rt = InMemoryRuntime::new();
    let a = rt.alloc_object("Item");

    let registry = registry();
    let wrapper = GraphWrapper::new(&rt, &registry);
    let err = wrapper
        .wrap(
            &mirror("Item"),
            Some(a),
            &mut MirrorArena::new(),
            &mut IdentityMap::new(),
        )
        .unwrap_err();
    assert!(matches!(err, MirrorError::Bridge { .. }));
}
