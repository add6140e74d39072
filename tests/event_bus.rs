use dynui::bus::EventBus;
use dynui::schema::Schema;
use dynui::UiContext;
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn recorder() -> (Rc<RefCell<Vec<String>>>, impl Fn(&'static str) -> Box<dyn Fn(&Value) -> dynui::bus::SubscriberResult>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let make = move |name: &'static str| {
        let sink = Rc::clone(&sink);
        Box::new(move |payload: &Value| {
            sink.borrow_mut().push(format!("{name}:{payload}"));
            Ok(())
        }) as Box<dyn Fn(&Value) -> dynui::bus::SubscriberResult>
    };
    (log, make)
}

#[test]
fn failing_subscribers_do_not_block_later_ones() {
    let bus = EventBus::new();
    let (log, make) = recorder();

    bus.on("saved", make("first"));
    bus.on("saved", |_| Err("rejected".into()));
    bus.on("saved", |_| panic!("subscriber bug"));
    bus.on("saved", make("last"));

    bus.emit("saved", &json!(1));
    bus.emit("saved", &json!(2));
    assert_eq!(*log.borrow(), ["first:1", "last:1", "first:2", "last:2"]);
}

#[test]
fn off_removes_one_or_all() {
    let bus = EventBus::new();
    let (log, make) = recorder();

    let a = bus.on("tick", make("a"));
    bus.on("tick", make("b"));
    bus.on("other", make("c"));

    assert!(bus.off("tick", Some(a)));
    assert!(!bus.off("tick", Some(a)));
    bus.emit("tick", &json!(null));
    assert_eq!(*log.borrow(), ["b:null"]);

    assert!(bus.off("tick", None));
    assert_eq!(bus.subscriber_count("tick"), 0);
    assert_eq!(bus.subscriber_count("other"), 1);
    bus.emit("tick", &json!(null));
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn subscribing_during_delivery_waits_for_the_next_emit() {
    let bus = Rc::new(EventBus::new());
    let (log, make) = recorder();
    let make = Rc::new(make);

    let inner_bus = Rc::clone(&bus);
    let inner_make = Rc::clone(&make);
    bus.on("open", move |_| {
        inner_bus.on("open", inner_make("late"));
        Ok(())
    });

    bus.emit("open", &json!(1));
    assert!(log.borrow().is_empty());
    bus.emit("open", &json!(2));
    assert_eq!(*log.borrow(), ["late:2"]);
}

#[tokio::test(start_paused = true)]
async fn emit_handlers_and_expressions_share_the_context_bus() {
    let schema = Schema::from_json_str(
        r#"[{
            "id": "save", "componentName": "Button",
            "events": {
                "click": [
                    { "action": "emit", "payload": { "event": "saved", "data": { "from": "handler" } } },
                    { "action": "custom", "payload": {
                        "mode": "parse",
                        "condition": "$$$.context.eventBus.emit('saved', 'expression')"
                    } }
                ]
            }
        }]"#,
    )
    .unwrap();
    let context = UiContext::builder().build(schema).unwrap();
    let (log, make) = recorder();
    context.on("saved", make("host"));

    assert_eq!(context.dispatch("save", "click").await.unwrap(), 2);
    assert_eq!(*log.borrow(), [r#"host:{"from":"handler"}"#, r#"host:"expression""#]);
}
