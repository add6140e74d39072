use dynui::domain::ExecutionMode;
use dynui::infrastructure::{PlatformCall, RecordingPlatform};
use dynui::schema::Schema;
use dynui::UiContext;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::sleep;

const SCHEMA: &str = r#"[
    {
        "id": "parallel", "componentName": "Button",
        "events": {
            "click": [
                { "action": "updateState", "payload": { "path": "last", "value": "d0" } },
                { "action": "updateState", "payload": { "path": "last", "value": "d500" }, "delay": 500 },
                { "action": "updateState", "payload": { "path": "last", "value": "d200" }, "delay": 200 }
            ],
            "tap": [
                { "action": "emit", "payload": { "event": "order", "data": 0 }, "delay": 300 },
                { "action": "emit", "payload": { "event": "order", "data": 1 }, "delay": 100 },
                { "action": "emit", "payload": { "event": "order", "data": 2 }, "delay": 100 },
                { "action": "emit", "payload": { "event": "order", "data": 3 } },
                { "action": "emit", "payload": { "event": "order", "data": 4 }, "delay": 100 }
            ]
        }
    },
    {
        "id": "sequential", "componentName": "Button",
        "eventExecutionMode": "sequential",
        "events": {
            "click": [
                { "action": "updateState", "payload": { "path": "a", "value": 1 }, "delay": 1000, "waitAfter": 500 },
                { "action": "updateState", "payload": { "path": "b", "value": 2 } },
                { "action": "navigate", "payload": { "url": "/done" }, "delay": 100 }
            ]
        }
    },
    {
        "id": "form", "componentName": "Form",
        "defaultValue": { "status": "idle" },
        "children": [{
            "id": "submit", "componentName": "Button",
            "events": {
                "click": {
                    "action": "updateState", "target": "form",
                    "payload": { "path": "status", "value": "sent" }, "delay": 1000
                }
            }
        }]
    }
]"#;

fn context_with(platform: RecordingPlatform) -> UiContext {
    UiContext::builder()
        .with_platform(platform)
        .build(Schema::from_json_str(SCHEMA).unwrap())
        .unwrap()
}

fn context() -> UiContext {
    context_with(RecordingPlatform::new())
}

fn record_order(context: &UiContext) -> Rc<RefCell<Vec<Value>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    context.on("order", move |data| {
        sink.borrow_mut().push(data.clone());
        Ok(())
    });
    seen
}

#[tokio::test(start_paused = true)]
async fn parallel_delays_count_from_the_trigger() {
    let context = context();
    let last = |c: &UiContext| c.get_state_value("last", Some("parallel"));

    let (executed, ()) = tokio::join!(context.dispatch("parallel", "click"), async {
        sleep(Duration::from_millis(100)).await;
        assert_eq!(last(&context), Some(json!("d0")));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(last(&context), Some(json!("d200")));
        sleep(Duration::from_millis(150)).await;
        assert_eq!(last(&context), Some(json!("d200")));
        sleep(Duration::from_millis(100)).await;
        assert_eq!(last(&context), Some(json!("d500")));
    });
    assert_eq!(executed.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn equal_delays_keep_declaration_order() {
    let context = context();
    let seen = record_order(&context);

    let started = tokio::time::Instant::now();
    assert_eq!(context.dispatch("parallel", "tap").await.unwrap(), 5);
    assert!((300..305).contains(&started.elapsed().as_millis()));
    assert_eq!(*seen.borrow(), vec![json!(3), json!(1), json!(2), json!(4), json!(0)]);
}

#[tokio::test(start_paused = true)]
async fn sequential_waits_for_delay_and_wait_after() {
    let platform = RecordingPlatform::new();
    let context = context_with(platform.clone());
    let value = |c: &UiContext, path: &str| c.get_state_value(path, Some("sequential"));

    let (executed, ()) = tokio::join!(context.dispatch("sequential", "click"), async {
        sleep(Duration::from_millis(990)).await;
        assert_eq!(value(&context, "a"), None);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(value(&context, "a"), Some(json!(1)));
        assert_eq!(value(&context, "b"), None);
        sleep(Duration::from_millis(480)).await;
        assert_eq!(value(&context, "b"), None);
        sleep(Duration::from_millis(20)).await;
        assert_eq!(value(&context, "b"), Some(json!(2)));
        assert!(platform.calls().is_empty());
    });
    assert_eq!(executed.unwrap(), 3);
    assert_eq!(platform.calls(), vec![PlatformCall::Navigate { url: "/done".to_string() }]);
}

#[tokio::test(start_paused = true)]
async fn default_mode_applies_to_nodes_without_one() {
    let context = UiContext::builder()
        .with_default_execution_mode(ExecutionMode::Sequential)
        .build(Schema::from_json_str(SCHEMA).unwrap())
        .unwrap();
    let seen = record_order(&context);

    let started = tokio::time::Instant::now();
    assert_eq!(context.dispatch("parallel", "tap").await.unwrap(), 5);
    assert!((600..610).contains(&started.elapsed().as_millis()));
    assert_eq!(*seen.borrow(), vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
}

#[tokio::test(start_paused = true)]
async fn handler_target_writes_to_another_node() {
    let context = context();
    assert_eq!(context.dispatch("submit", "click").await.unwrap(), 1);
    assert_eq!(context.get_component_state("form"), json!({ "status": "sent" }));
    assert_eq!(context.get_component_state("submit"), json!({}));
}

#[tokio::test(start_paused = true)]
async fn page_teardown_cancels_every_pending_handler() {
    let context = context();
    let seen = record_order(&context);

    let (tap, click, ()) = tokio::join!(
        context.dispatch("parallel", "tap"),
        context.dispatch("sequential", "click"),
        async {
            sleep(Duration::from_millis(150)).await;
            context.teardown();
        }
    );
    assert_eq!(tap.unwrap(), 4);
    assert_eq!(click.unwrap(), 0);
    assert_eq!(*seen.borrow(), vec![json!(3), json!(1), json!(2), json!(4)]);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(seen.borrow().len(), 4);
    assert!(context.is_torn_down());
    assert_eq!(context.dispatch("parallel", "click").await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn tearing_down_a_parent_cancels_its_descendants() {
    let context = context();
    let (executed, ()) = tokio::join!(context.dispatch("submit", "click"), async {
        sleep(Duration::from_millis(10)).await;
        context.teardown_node("form").unwrap();
    });
    assert_eq!(executed.unwrap(), 0);
    assert_eq!(context.get_state_value("status", Some("form")), None);
    assert!(!context.is_torn_down());
}

#[tokio::test(start_paused = true)]
async fn dispatch_all_reports_in_input_order() {
    let context = context();
    let results = context
        .dispatch_all(&[("parallel", "click"), ("ghost", "click"), ("form", "click")])
        .await;
    assert_eq!(results.len(), 3);
    assert_eq!(*results[0].as_ref().unwrap(), 3);
    assert!(results[1].is_err());
    assert_eq!(*results[2].as_ref().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn spawned_dispatches_run_on_a_local_set() {
    let context = Rc::new(context());
    let local = tokio::task::LocalSet::new();
    let (first, second) = local
        .run_until(async {
            let first = context.spawn_dispatch("parallel", "click");
            let second = context.spawn_dispatch("submit", "click");
            (first.await.unwrap(), second.await.unwrap())
        })
        .await;
    assert_eq!(first.unwrap(), 3);
    assert_eq!(second.unwrap(), 1);
    assert_eq!(context.get_state_value("status", Some("form")), Some(json!("sent")));
}
