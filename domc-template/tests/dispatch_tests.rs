use std::cell::RefCell;
use std::rc::Rc;

use domc_core::{Function, Scope, Value};
use domc_dom::{Document, events};
use domc_template::{TemplateInstance, compile_str};

#[test]
fn event_reaches_handler_three_levels_up() {
    let t = compile_str(
        r#"<section onclick="${pick(id)}"><div><p><span>${label}</span></p></div></section>"#,
    )
    .unwrap();
    let doc = Document::new();
    let calls = Rc::new(RefCell::new(Vec::new()));
    let pick = {
        let calls = calls.clone();
        Function::new(move |args| {
            calls.borrow_mut().push(args.to_vec());
            Value::Undefined
        })
    };
    let scope = |id: i32| {
        Scope::new()
            .with("id", id)
            .with("label", "x")
            .with("pick", pick.clone())
    };

    let mut inst = t.create_instance(&doc, &scope(1)).unwrap();
    inst.update(&doc, &scope(2)).unwrap();

    let root = inst.root();
    let div = doc.children(root)[0];
    let p = doc.children(div)[0];
    let span = doc.children(p)[0];
    assert!(!doc.has_handler(div, "click") && !doc.has_handler(p, "click"));
    assert_eq!(events::find_handler(&doc, span, "click"), Some(root));

    doc.fire(span, "click");
    assert_eq!(*calls.borrow(), vec![vec![Value::from(2)]]);
}

#[test]
fn one_root_listener_per_event_name() {
    let t = compile_str(r#"<div><a onclick="${go(1)}">a</a><b onclick="${go(2)}">b</b></div>"#)
        .unwrap();
    let doc = Document::new();
    let scope = Scope::new().with("go", Value::function(|_| Value::Undefined));
    for _ in 0..3 {
        t.create_instance(&doc, &scope).unwrap();
    }
    assert_eq!(doc.root_listener_count("click"), 1);
    assert!(events::is_listening(&doc, "click"));
    assert!(!events::is_listening(&doc, "input"));
}

#[test]
fn events_without_handlers_are_dropped() {
    let t = compile_str(r#"<div><p onclick="${go()}">a</p><i>b</i></div>"#).unwrap();
    let doc = Document::new();
    let hits = Rc::new(RefCell::new(0));
    let go = {
        let hits = hits.clone();
        Function::new(move |_| {
            *hits.borrow_mut() += 1;
            Value::Undefined
        })
    };
    let inst = t.create_instance(&doc, &Scope::new().with("go", go)).unwrap();
    let i = doc.children(inst.root())[1];

    assert_eq!(doc.fire(i, "click"), 1);
    assert_eq!(*hits.borrow(), 0);
}

#[test]
fn handler_may_update_its_own_instance() {
    let t = compile_str(r#"<button onclick="${bump(count)}">${count}</button>"#).unwrap();
    let doc = Document::new();
    let slot: Rc<RefCell<Option<TemplateInstance>>> = Rc::new(RefCell::new(None));

    let bump = {
        let doc = doc.clone();
        let slot = slot.clone();
        let this: Rc<RefCell<Option<Function>>> = Rc::new(RefCell::new(None));
        let f = {
            let this = this.clone();
            Function::new(move |args| {
                let next = args.first().map_or(0.0, Value::to_number) + 1.0;
                let bump = this.borrow().clone().map(Value::from).unwrap_or_default();
                let scope = Scope::new().with("count", next).with("bump", bump);
                if let Some(inst) = slot.borrow_mut().as_mut() {
                    inst.update(&doc, &scope).unwrap();
                }
                Value::Undefined
            })
        };
        *this.borrow_mut() = Some(f.clone());
        f
    };

    let inst = t
        .create_instance(&doc, &Scope::new().with("count", 0).with("bump", bump))
        .unwrap();
    let root = inst.root();
    *slot.borrow_mut() = Some(inst);

    doc.fire(root, "click");
    doc.fire(root, "click");
    assert_eq!(doc.text(root), "2");
    assert_eq!(doc.handler_data(root, "click").as_deref(), Some(&[Value::from(2)][..]));
}
