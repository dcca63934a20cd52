use crate::color::{Color, ColorChannel};
use crate::entities::{Entity, EntityChange, EntityStore, Role};
use crate::error::EntityError;
use std::cell::RefCell;
use std::rc::Rc;

fn entity(name: &str, key: Option<&str>) -> Entity {
    Entity::new(
        name,
        key,
        Role::Box,
        Color::parse("#eeeeee").unwrap(),
        Color::parse("#333333").unwrap(),
    )
}

#[test]
fn defaults_carry_preset_colors() {
    let defaults = Entity::defaults();
    assert_eq!(defaults.len(), 3);
    assert_eq!(defaults[0].display_name, "Consumer (C)");
    assert_eq!(defaults[0].lifeline_key.as_deref(), Some("C"));
    assert_eq!(defaults[0].role, Role::Actor);
    assert_eq!(defaults[0].fill.as_str(), "#87CEEB");
    assert_eq!(defaults[0].color(ColorChannel::Stroke).as_str(), "#4682B4");
    assert_eq!(defaults[2].display_name, "Broker (B)");
}

#[test]
fn names_and_keys_stay_unique() {
    let mut store = EntityStore::with_defaults();
    assert!(matches!(
        store.add(entity("Broker (B)", None)),
        Err(EntityError::DuplicateName(_))
    ));
    assert!(matches!(
        store.add(entity("Bank", Some("B"))),
        Err(EntityError::DuplicateKey(_))
    ));
    assert!(matches!(
        store.add(entity("   ", None)),
        Err(EntityError::EmptyName)
    ));
    assert_eq!(store.add(entity("  Bank  ", Some("K"))).unwrap(), 3);
    assert_eq!(store.get(3).unwrap().display_name, "Bank");
}

#[test]
fn keys_may_be_cleared() {
    let mut store = EntityStore::with_defaults();
    store.set_key(1, Some("  ")).unwrap();
    assert_eq!(store.get(1).unwrap().lifeline_key, None);
    store.set_key(1, Some("C")).unwrap_err();
    store.set_key(1, Some("X")).unwrap();
    assert_eq!(store.get(1).unwrap().lifeline_key.as_deref(), Some("X"));
}

#[test]
fn renaming_to_own_name_is_not_a_change() {
    let mut store = EntityStore::with_defaults();
    let before = store.revision();
    store.rename(0, "Consumer (C)").unwrap();
    assert_eq!(store.revision(), before);
    assert!(matches!(
        store.rename(0, "Broker (B)"),
        Err(EntityError::DuplicateName(_))
    ));
    assert!(matches!(
        store.rename(9, "x"),
        Err(EntityError::UnknownIndex(9))
    ));
}

#[test]
fn subscribers_see_every_change() {
    let seen: Rc<RefCell<Vec<(EntityChange, usize)>>> = Rc::default();
    let mut store = EntityStore::with_defaults();
    let sink = Rc::clone(&seen);
    store.subscribe(move |change, list| sink.borrow_mut().push((change.clone(), list.len())));

    store.add(entity("Dora", None)).unwrap();
    store
        .set_color(3, ColorChannel::Fill, Color::parse("gold").unwrap())
        .unwrap();
    store.remove(0).unwrap();
    store.clear();
    store.reset_to_defaults();

    assert_eq!(
        *seen.borrow(),
        vec![
            (EntityChange::Added(3), 4),
            (EntityChange::Updated(3), 4),
            (EntityChange::Removed(0), 3),
            (EntityChange::Replaced, 0),
            (EntityChange::Replaced, 3),
        ]
    );
    assert_eq!(store.revision(), 5);
}

#[test]
fn rejected_lists_leave_the_store_untouched() {
    let mut store = EntityStore::with_defaults();
    let err = store
        .replace_all(vec![entity("A", Some("k")), entity("B", Some("k"))])
        .unwrap_err();
    assert!(matches!(err, EntityError::DuplicateKey(_)));
    assert_eq!(store.len(), 3);
}

#[test]
fn json_uses_short_field_names() {
    let json = serde_json::to_value(&Entity::defaults()[1]).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "name": "Intermediary (I)",
            "key": "I",
            "type": "participant",
            "bg": "#FFB6C1",
            "border": "#DC143C"
        })
    );

    let parsed: Entity = serde_json::from_str(
        r#"{"name":"Ann","key":"","type":"actor","bg":"white","border":"black"}"#,
    )
    .unwrap();
    assert_eq!(parsed.lifeline_key, None);
    assert_eq!(parsed.role, Role::Actor);

    let bad = serde_json::from_str::<Entity>(
        r#"{"name":"Ann","type":"actor","bg":"not-a-color","border":"black"}"#,
    );
    assert!(bad.is_err());
}
