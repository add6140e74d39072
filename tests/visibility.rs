use dynui::expression::EvaluatorKind;
use dynui::schema::Schema;
use dynui::UiContext;
use serde_json::json;

const SCHEMA: &str = r#"{
    "version": "1.0",
    "components": [{
        "id": "page", "componentName": "Page",
        "children": [
            { "id": "show_more", "componentName": "Switch", "defaultValue": { "on": true } },
            {
                "id": "details", "componentName": "View",
                "defaultValue": { "note": "" },
                "visibleOption": { "mode": "parse", "condition": "$.show_more.on" },
                "children": [
                    {
                        "id": "always_shown", "componentName": "Input",
                        "defaultValue": { "value": "initial" },
                        "visibleOption": { "mode": "read", "condition": true }
                    },
                    {
                        "id": "group", "componentName": "View",
                        "children": [
                            { "id": "deep", "componentName": "Input", "defaultValue": { "value": 0 } },
                            { "id": "no_default", "componentName": "Text" }
                        ]
                    }
                ]
            },
            {
                "id": "broken", "componentName": "Text",
                "defaultValue": { "kept": true },
                "visibleOption": { "mode": "parse", "condition": "$.show_more.on.deeper.still" }
            }
        ]
    }]
}"#;

fn context(kind: EvaluatorKind) -> UiContext {
    UiContext::builder()
        .with_evaluator(kind)
        .build(Schema::from_json_str(SCHEMA).unwrap())
        .unwrap()
}

#[test]
fn hiding_resets_every_descendant_with_a_default() {
    for kind in [EvaluatorKind::Unrestricted, EvaluatorKind::Restricted] {
        let context = context(kind);
        assert!(context.render_tree().unwrap()[0].children[1].visible, "{kind}");

        context.update_state("note", json!("draft"), Some("details"));
        context.update_state("value", json!("typed"), Some("always_shown"));
        context.update_state("value", json!(42), Some("deep"));
        context.update_state("scratch", json!(1), Some("no_default"));

        context.update_state("on", json!(false), Some("show_more"));
        let tree = context.render_tree().unwrap();
        let details = &tree[0].children[1];
        assert!(!details.visible, "{kind}");
        assert!(details.children.is_empty(), "{kind}");

        let always_shown = context.node("always_shown").unwrap();
        assert!(context.is_visible(&always_shown), "{kind}");
        assert_eq!(context.get_component_state("details"), json!({ "note": "" }), "{kind}");
        assert_eq!(context.get_component_state("always_shown"), json!({ "value": "initial" }), "{kind}");
        assert_eq!(context.get_component_state("deep"), json!({ "value": 0 }), "{kind}");
        assert_eq!(context.get_component_state("no_default"), json!({ "scratch": 1 }), "{kind}");
    }
}

#[test]
fn showing_again_has_no_side_effect() {
    let context = context(EvaluatorKind::Unrestricted);
    context.render_tree().unwrap();
    context.update_state("on", json!(false), Some("show_more"));
    context.render_tree().unwrap();

    context.update_state("value", json!(7), Some("deep"));
    context.update_state("on", json!(true), Some("show_more"));
    let tree = context.render_tree().unwrap();
    assert!(tree[0].children[1].visible);
    assert_eq!(context.get_component_state("deep"), json!({ "value": 7 }));
}

#[test]
fn visibility_is_recomputed_not_cached() {
    let context = context(EvaluatorKind::Unrestricted);
    let details = context.node("details").unwrap();
    assert!(context.is_visible(&details));
    context.update_state("on", json!(0), Some("show_more"));
    assert!(!context.is_visible(&details));
    context.update_state("on", json!("yes"), Some("show_more"));
    assert!(context.is_visible(&details));
}

#[test]
fn failing_condition_keeps_node_visible_and_state_intact() {
    let context = context(EvaluatorKind::Unrestricted);
    context.render_tree().unwrap();
    context.update_state("kept", json!("changed"), Some("broken"));

    let tree = context.render_tree().unwrap();
    assert!(tree[0].children[2].visible);
    assert_eq!(context.get_component_state("broken"), json!({ "kept": "changed" }));

    let err = context.try_is_visible(&context.node("broken").unwrap()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("broken"), "{message}");
}

#[test]
fn explicit_visibility_change_resets_subtree() {
    let context = context(EvaluatorKind::Restricted);
    context.update_state("value", json!(9), Some("deep"));
    let group = context.node("group").unwrap();

    context.handle_visibility_change(&group, true);
    assert_eq!(context.get_component_state("deep"), json!({ "value": 9 }));

    context.handle_visibility_change(&group, false);
    assert_eq!(context.get_component_state("deep"), json!({ "value": 0 }));
}

#[test]
fn condition_on_unwritten_state_hides_until_written() {
    let schema = r#"[
        { "id": "toggle", "componentName": "Switch", "defaultValue": {} },
        {
            "id": "panel", "componentName": "View",
            "visibleOption": { "mode": "parse", "condition": "$.toggle.on" }
        }
    ]"#;
    for kind in [EvaluatorKind::Unrestricted, EvaluatorKind::Restricted] {
        let context = UiContext::builder()
            .with_evaluator(kind)
            .build(Schema::from_json_str(schema).unwrap())
            .unwrap();
        let panel = context.node("panel").unwrap();
        assert_eq!(context.resolve(panel.visible_option.as_ref().unwrap()).unwrap(), None, "{kind}");
        assert!(!context.try_is_visible(&panel).unwrap(), "{kind}");
        assert!(!context.render_tree().unwrap()[1].visible, "{kind}");

        context.update_state("on", json!(true), Some("toggle"));
        assert!(context.is_visible(&panel), "{kind}");
    }
}
