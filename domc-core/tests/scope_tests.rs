use std::cell::RefCell;
use std::rc::Rc;

use domc_core::{Function, Scope, Value};

#[test]
fn missing_names_read_as_undefined() {
    let scope = Scope::new().with("count", 1);
    assert_eq!(scope.lookup("count"), Value::from(1));
    assert_eq!(scope.lookup("nope"), Value::Undefined);
    assert!(scope.get("nope").is_none());
}

#[test]
fn narrow_keeps_only_requested_names() {
    let scope = Scope::new().with("a", 1).with("b", 2).with("c", 3);
    let narrowed = scope.narrow(["a", "c", "zzz"]);
    assert_eq!(narrowed.len(), 2);
    assert!(narrowed.contains("a"));
    assert!(!narrowed.contains("b"));
}

#[test]
fn functions_keep_identity_across_scope_clones() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let handler = {
        let calls = calls.clone();
        Function::new(move |args| {
            calls.borrow_mut().push(args.to_vec());
            Value::Undefined
        })
    };
    let a = Scope::new().with("onClick", handler.clone());
    let b = a.clone().with("count", 2);

    assert!(a.lookup("onClick").is_identical(&b.lookup("onClick")));

    if let Some(f) = b.lookup("onClick").as_function() {
        f.call(&[Value::from(7)]);
    }
    assert_eq!(*calls.borrow(), vec![vec![Value::from(7)]]);
}
