use std::cell::RefCell;
use std::rc::Rc;

use domc_core::{Function, Value};
use domc_dom::{Document, Mutation, events};

fn recorder() -> (Rc<RefCell<Vec<Vec<Value>>>>, Function) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let f = {
        let calls = calls.clone();
        Function::new(move |args| {
            calls.borrow_mut().push(args.to_vec());
            Value::Undefined
        })
    };
    (calls, f)
}

#[test]
fn dispatch_reaches_ancestor_three_levels_up() {
    let doc = Document::new();
    let section = doc.create_element("section");
    let div = doc.create_element("div");
    let p = doc.create_element("p");
    let span = doc.create_element("span");
    doc.append_child(p, span);
    doc.append_child(div, p);
    doc.append_child(section, div);

    let (calls, f) = recorder();
    doc.set_handler(section, "click", f);
    doc.set_handler_data(section, "click", Rc::from(vec![Value::from(1)]));
    doc.set_handler_data(section, "click", Rc::from(vec![Value::from(2)]));

    events::ensure_listening(&doc, "click");
    let fired = doc.fire(span, "click");

    assert_eq!(fired, 1);
    assert_eq!(*calls.borrow(), vec![vec![Value::from(2)]]);
}

#[test]
fn dispatch_stops_at_first_match() {
    let doc = Document::new();
    let outer = doc.create_element("div");
    let inner = doc.create_element("button");
    doc.append_child(outer, inner);

    let (outer_calls, outer_f) = recorder();
    let (inner_calls, inner_f) = recorder();
    doc.set_handler(outer, "click", outer_f);
    doc.set_handler(inner, "click", inner_f);

    assert_eq!(events::dispatch(&doc, inner, "click"), Some(inner));
    assert_eq!(inner_calls.borrow().len(), 1);
    assert!(outer_calls.borrow().is_empty());
    // no data stored yet: the handler sees an empty argument list
    assert_eq!(inner_calls.borrow()[0], Vec::<Value>::new());
}

#[test]
fn unmatched_event_is_dropped() {
    let doc = Document::new();
    let div = doc.create_element("div");
    events::ensure_listening(&doc, "keydown");
    assert_eq!(events::dispatch(&doc, div, "keydown"), None);
    assert_eq!(doc.fire(div, "keydown"), 1);
    assert_eq!(doc.fire(div, "scroll"), 0);
}

#[test]
fn updating_data_does_not_touch_handler() {
    let doc = Document::with_journal();
    let b = doc.create_element("button");
    let (_calls, f) = recorder();
    doc.set_handler(b, "click", f.clone());
    doc.take_journal();

    doc.set_handler_data(b, "click", Rc::from(vec![Value::from("x")]));

    let journal = doc.take_journal();
    assert!(matches!(journal.as_slice(), [Mutation::SetHandlerData { .. }]));
    assert!(doc.handler(b, "click").is_some_and(|h| h.ptr_eq(&f)));
}

#[test]
fn handler_may_mutate_document_during_dispatch() {
    let doc = Document::new();
    let button = doc.create_element("button");
    let label = doc.create_text("0");
    doc.append_child(button, label);

    let handler = {
        let doc = doc.clone();
        Function::new(move |args| {
            let next = args.first().cloned().unwrap_or_default();
            doc.set_text(label, &next.to_string());
            Value::Undefined
        })
    };
    doc.set_handler(button, "click", handler);
    doc.set_handler_data(button, "click", Rc::from(vec![Value::from(5)]));
    events::ensure_listening(&doc, "click");

    doc.fire(label, "click");
    assert_eq!(doc.text(button), "5");
}
