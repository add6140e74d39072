use dynui::domain::Node;
use dynui::state::StateStore;
use dynui::DynUiError;
use serde_json::{json, Map, Value};

fn nodes(value: Value) -> Vec<Node> {
    serde_json::from_value(value).unwrap()
}

#[test]
fn reads_back_what_was_written_at_any_depth() {
    let mut store = StateStore::default();
    let cases = [
        ("a", json!(1)),
        ("b.c", json!("two")),
        ("d.e.f.g", json!([3])),
        ("b.h", json!({ "nested": true })),
    ];
    for (path, value) in &cases {
        store.update_state(path, value.clone(), Some("node"));
        store.update_state(path, value.clone(), None);
    }
    for (path, value) in &cases {
        assert_eq!(store.get_state_value(path, Some("node")).as_ref(), Some(value), "{path}");
        assert_eq!(store.get_state_value(path, None).as_ref(), Some(value), "{path}");
    }
    assert_eq!(store.get_state_value("b.c", Some("node")), Some(json!("two")));
    assert_eq!(store.get_component_state("node")["b"]["h"], json!({ "nested": true }));
}

#[test]
fn write_through_a_scalar_replaces_it_with_an_object() {
    let mut store = StateStore::default();
    store.update_state("profile", json!("flat"), None);
    store.update_state("profile.name", json!("Ada"), None);
    assert_eq!(store.global(), &json!({ "profile": { "name": "Ada" } }));
}

#[test]
fn missing_paths_read_as_undefined() {
    let mut store = StateStore::default();
    store.update_state("a.b", json!(1), Some("n"));
    assert_eq!(store.get_state_value("a.x.y", Some("n")), None);
    assert_eq!(store.get_state_value("a.b.c", Some("n")), None);
    assert_eq!(store.get_state_value("a", Some("other")), None);
    assert_eq!(store.get_component_state("other"), json!({}));
}

#[test]
fn initialization_seeds_defaults() {
    let mut store = StateStore::default();
    store
        .initialize(&nodes(json!([{
            "id": "form", "componentName": "Form", "defaultValue": { "email": "" },
            "children": [
                { "id": "agree", "componentName": "Checkbox", "defaultValue": false },
                { "id": "plain", "componentName": "Text" },
                { "id": "nulled", "componentName": "Text", "defaultValue": null }
            ]
        }])))
        .unwrap();

    assert_eq!(store.component_state("form"), Some(&json!({ "email": "" })));
    assert_eq!(store.component_state("agree"), Some(&json!(false)));
    assert_eq!(store.component_state("plain"), None);
    assert_eq!(store.component_state("nulled"), None);
}

#[test]
fn duplicate_id_aborts_before_any_state_is_committed() {
    let mut global = Map::new();
    global.insert("theme".to_string(), json!("dark"));
    let mut store = StateStore::new(global);
    let before = store.clone();

    let schema = nodes(json!([
        { "id": "first", "componentName": "Text", "defaultValue": { "seeded": true } },
        { "id": "page", "componentName": "View", "children": [
            { "id": "first", "componentName": "Text", "defaultValue": { "seeded": "again" } }
        ] }
    ]));

    for _ in 0..2 {
        let err = store.initialize(&schema).unwrap_err();
        assert!(matches!(err, DynUiError::DuplicateId(ref id) if id == "first"));
        assert_eq!(store, before);
    }
}

#[test]
fn retired_ids_drop_late_writes() {
    let mut store = StateStore::default();
    store.update_state("value", json!(1), Some("gone"));
    store.retire("gone");

    store.update_state("value", json!(2), Some("gone"));
    store.set_component_state("gone", json!({ "value": 3 }));
    assert_eq!(store.component_state("gone"), None);

    store.revive("gone");
    store.update_state("value", json!(4), Some("gone"));
    assert_eq!(store.get_state_value("value", Some("gone")), Some(json!(4)));
}
