#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::*;

    fn counter(model: &Model) -> (Rc<Cell<u32>>, Subscription) {
        let hits = Rc::new(Cell::new(0));
        let sub = model.subscribe({
            let hits = hits.clone();
            move || hits.set(hits.get() + 1)
        });
        (hits, sub)
    }

    #[test]
    fn test_count_scenario() {
        let model = Model::new(object! { "count" => 0 });
        let (hits, _sub) = counter(&model);

        model.state().set("count", 1).unwrap();
        assert_eq!(hits.get(), 1);

        model.state().set("count", 1).unwrap();
        assert_eq!(hits.get(), 1);

        assert!(model.state().delete("count").unwrap());
        assert_eq!(hits.get(), 2);
        assert_eq!(model.state().get("count"), None);
    }

    #[test]
    fn test_delete_missing_still_notifies() {
        let model = Model::new(object! {});
        let (hits, _sub) = counter(&model);

        assert!(!model.state().delete("ghost").unwrap());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_new_field_notifies() {
        let model = Model::new(Object::new());
        let (hits, _sub) = counter(&model);

        model.state().set("fresh", Value::Null).unwrap();
        assert_eq!(hits.get(), 1);
        model.state().set("fresh", Value::Null).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_nested_write_notifies_once() {
        let model = Model::new(object! { "a" => object! { "b" => 0 } });
        let (hits, _sub) = counter(&model);

        model.state().child("a").unwrap().set("b", 1).unwrap();
        assert_eq!(hits.get(), 1);

        model.state().set_path(["a", "b"], 2).unwrap();
        assert_eq!(hits.get(), 2);
        assert_eq!(
            model.state().child("a").unwrap().get("b"),
            Some(Value::Int(2))
        );
    }

    #[test]
    fn test_identity_equality() {
        let inner = object! { "x" => 1 };
        let model = Model::new(object! { "inner" => inner.clone() });
        let (hits, _sub) = counter(&model);

        // same node: silent
        model.state().set("inner", inner.clone()).unwrap();
        assert_eq!(hits.get(), 0);

        // structurally equal, different node: change
        let twin = object! { "x" => 1 };
        assert!(Value::from(twin.clone()).deep_eq(&Value::from(inner)));
        model.state().set("inner", twin).unwrap();
        assert_eq!(hits.get(), 1);

        // a number of another representation is a different value
        model.state().set("n", 1).unwrap();
        model.state().set("n", 1.0).unwrap();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_nan_always_differs() {
        let model = Model::new(object! { "x" => f64::NAN });
        let (hits, _sub) = counter(&model);
        model.state().set("x", f64::NAN).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_state_identity_is_stable_children_are_fresh() {
        let model = Model::new(object! { "a" => object! {} });
        assert!(model.state().ptr_eq(model.state()));

        let c1 = model.state().child("a").unwrap();
        let c2 = model.state().child("a").unwrap();
        assert!(!c1.ptr_eq(&c2));
        assert!(c1.same_node(&c2));
    }

    #[test]
    fn test_child_of_primitive_or_missing() {
        let model = Model::new(object! { "n" => 3 });
        assert!(model.state().child("n").is_none());
        assert!(model.state().child("missing").is_none());
        assert_eq!(
            model.state().set_path(["n", "deeper"], 1),
            Err(StateError::NotANode { key: "n".into() })
        );
        assert_eq!(
            model.state().set_path(Vec::<Key>::new(), 1),
            Err(StateError::EmptyPath)
        );
    }

    #[test]
    fn test_frozen_write_fails_silently_for_listeners() {
        let settings = object! { "theme" => "dark" };
        settings.freeze();
        let model = Model::new(object! { "settings" => settings });
        let (hits, _sub) = counter(&model);

        let view = model.state().child("settings").unwrap();
        assert_eq!(
            view.set("theme", "light"),
            Err(StateError::Frozen(NodeKind::Object))
        );
        assert_eq!(
            view.delete("theme"),
            Err(StateError::Frozen(NodeKind::Object))
        );
        assert_eq!(hits.get(), 0);
        assert_eq!(view.get("theme"), Some(Value::from("dark")));

        // the parent itself is not frozen
        model.state().set("other", true).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_key_kind_mismatch() {
        let model = Model::new(array![1, 2]);
        let (hits, _sub) = counter(&model);
        assert_eq!(
            model.state().set("length", 0),
            Err(StateError::KeyKind {
                key: "length".into(),
                kind: NodeKind::Array,
            })
        );
        let obj = Model::new(object! {});
        assert!(matches!(
            obj.state().push(1),
            Err(StateError::NotAnArray(NodeKind::Object))
        ));
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_array_semantics() {
        let model = Model::new(object! { "todos" => array!["a"] });
        let (hits, _sub) = counter(&model);
        let todos = model.state().child("todos").unwrap();

        todos.push("b").unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(todos.len(), 2);

        // write past the end grows with holes
        todos.set(4usize, "e").unwrap();
        assert_eq!(hits.get(), 2);
        assert_eq!(todos.len(), 5);
        assert_eq!(todos.get(3usize), None);
        assert!(!todos.contains_key(3usize));

        // delete leaves a hole, length unchanged
        assert!(todos.delete(0usize).unwrap());
        assert_eq!(hits.get(), 3);
        assert_eq!(todos.len(), 5);
        assert_eq!(todos.get(0usize), None);
        assert!(!todos.contains_key(0usize));
        assert_eq!(todos.keys(), vec![Key::Index(1), Key::Index(4)]);

        // the hole is gone, but the delete still notifies
        assert!(!todos.delete(0usize).unwrap());
        assert_eq!(hits.get(), 4);

        assert_eq!(todos.pop().unwrap(), Some(Value::from("e")));
        assert_eq!(hits.get(), 5);

        // trailing hole: the array shrinks, nothing comes out
        assert_eq!(todos.pop().unwrap(), None);
        assert_eq!(hits.get(), 6);
        assert_eq!(todos.len(), 3);

        todos.set_len(3).unwrap();
        assert_eq!(hits.get(), 6);
        todos.set_len(0).unwrap();
        assert_eq!(hits.get(), 7);
        assert_eq!(todos.pop().unwrap(), None);
        assert_eq!(hits.get(), 7);
        assert_eq!(todos.keys(), Vec::<Key>::new());
    }

    #[test]
    fn test_hole_is_not_null() {
        let model = Model::new(array![Value::Null, 1]);
        let (hits, _sub) = counter(&model);
        let list = model.state();

        assert!(list.contains_key(0usize));
        assert_eq!(list.get(0usize), Some(Value::Null));
        assert!(list.delete(0usize).unwrap());
        assert!(!list.contains_key(0usize));
        assert_eq!(list.get(0usize), None);

        // filling a hole with null is a change
        list.set(0usize, Value::Null).unwrap();
        assert_eq!(hits.get(), 2);
        assert!(list.contains_key(0usize));

        let holed = Array::new();
        Model::new(holed.clone()).state().set_len(1).unwrap();
        assert!(!Value::from(holed).deep_eq(&Value::from(array![Value::Null])));
    }

    #[test]
    fn test_array_delete_out_of_range() {
        let model = Model::new(array!["a"]);
        let (hits, _sub) = counter(&model);

        assert!(!model.state().delete(7usize).unwrap());
        assert_eq!(hits.get(), 1);
        assert_eq!(model.state().len(), 1);
        assert_eq!(model.state().get(0usize), Some(Value::from("a")));
    }

    #[test]
    fn test_set_len_grows_with_holes() {
        let model = Model::new(array![1]);
        let (hits, _sub) = counter(&model);

        model.state().set_len(4).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(model.state().len(), 4);
        assert_eq!(model.state().get(0usize), Some(Value::from(1)));
        for i in 1..4usize {
            assert_eq!(model.state().get(i), None);
            assert!(!model.state().contains_key(i));
        }
        assert_eq!(model.state().keys(), vec![Key::Index(0)]);
    }

    #[test]
    fn test_array_growth_is_bounded() {
        let model = Model::new(object! { "list" => array![1, 2] });
        let (hits, _sub) = counter(&model);
        let list = model.state().child("list").unwrap();

        assert_eq!(
            list.set(usize::MAX, 3),
            Err(StateError::ArrayLimit {
                requested: usize::MAX,
                max: MAX_ARRAY_LEN,
            })
        );
        assert_eq!(
            list.set(MAX_ARRAY_LEN, 3),
            Err(StateError::ArrayLimit {
                requested: MAX_ARRAY_LEN + 1,
                max: MAX_ARRAY_LEN,
            })
        );
        assert_eq!(
            list.set_len(MAX_ARRAY_LEN + 1),
            Err(StateError::ArrayLimit {
                requested: MAX_ARRAY_LEN + 1,
                max: MAX_ARRAY_LEN,
            })
        );
        assert_eq!(
            model.state().set_path([Key::from("list"), Key::Index(usize::MAX)], 3),
            Err(StateError::ArrayLimit {
                requested: usize::MAX,
                max: MAX_ARRAY_LEN,
            })
        );
        assert_eq!(hits.get(), 0);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1usize), Some(Value::from(2)));
    }

    #[test]
    fn test_frozen_array_rejects_every_write() {
        let items = array!["x", "y"];
        items.freeze();
        let model = Model::new(object! { "items" => items });
        let (hits, _sub) = counter(&model);
        let view = model.state().child("items").unwrap();
        let frozen = Err(StateError::Frozen(NodeKind::Array));

        assert_eq!(view.set(0usize, "z"), frozen);
        assert_eq!(view.set(5usize, "z"), frozen);
        assert_eq!(view.delete(0usize).map(|_| ()), frozen);
        assert_eq!(view.push("z"), frozen);
        assert_eq!(view.pop().map(|_| ()), frozen);
        assert_eq!(view.set_len(0), frozen);
        assert_eq!(view.set_len(10), frozen);

        assert_eq!(hits.get(), 0);
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(0usize), Some(Value::from("x")));
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let model = Model::new(object! { "count" => 0 });
        let (hits, sub) = counter(&model);

        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert_eq!(model.listener_count(), 0);

        model.state().set("count", 1).unwrap();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_unsubscribe_after_model_dropped() {
        let model = Model::new(object! {});
        let (_hits, sub) = counter(&model);
        drop(model);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_independent_subscriptions() {
        let model = Model::new(object! { "v" => 0 });
        let (a, sub_a) = counter(&model);
        let (b, _sub_b) = counter(&model);

        model.state().set("v", 1).unwrap();
        assert_eq!((a.get(), b.get()), (1, 1));

        sub_a.unsubscribe();
        model.state().set("v", 2).unwrap();
        assert_eq!((a.get(), b.get()), (1, 2));
    }

    #[test]
    fn test_same_callback_twice_registers_twice() {
        let model = Model::new(object! { "v" => 0 });
        let hits = Rc::new(Cell::new(0));
        let cb: Rc<dyn Fn()> = {
            let hits = hits.clone();
            Rc::new(move || hits.set(hits.get() + 1))
        };
        let first = model.subscribe({
            let cb = cb.clone();
            move || cb()
        });
        let _second = model.subscribe(move || cb());
        assert_eq!(model.listener_count(), 2);

        model.state().set("v", 1).unwrap();
        assert_eq!(hits.get(), 2);

        first.unsubscribe();
        model.state().set("v", 2).unwrap();
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn test_reentrant_listener_does_not_skip_others() {
        let model = Rc::new(Model::new(object! { "v" => 0, "echo" => 0 }));
        let log = Rc::new(RefCell::new(Vec::new()));

        let _first = model.subscribe({
            let model = Rc::downgrade(&model);
            let log = log.clone();
            move || {
                log.borrow_mut().push("first");
                if let Some(model) = model.upgrade() {
                    // nested change while the outer one is still being delivered
                    model.state().set("echo", 1).unwrap();
                }
            }
        });
        let _second = model.subscribe({
            let log = log.clone();
            move || log.borrow_mut().push("second")
        });

        model.state().set("v", 1).unwrap();
        // outer: first, (inner: first, second), second
        assert_eq!(
            *log.borrow(),
            vec!["first", "first", "second", "second"]
        );
    }

    #[test]
    fn test_unsubscribe_during_dispatch_keeps_current_delivery() {
        let model = Model::new(object! { "v" => 0 });
        let (late_hits, late) = {
            let hits = Rc::new(Cell::new(0));
            let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
            let _killer = model.subscribe({
                let slot = slot.clone();
                move || {
                    if let Some(s) = slot.borrow().as_ref() {
                        s.unsubscribe();
                    }
                }
            });
            let sub = model.subscribe({
                let hits = hits.clone();
                move || hits.set(hits.get() + 1)
            });
            *slot.borrow_mut() = Some(sub.clone());
            (hits, sub)
        };

        model.state().set("v", 1).unwrap();
        assert_eq!(late_hits.get(), 1);
        assert!(!late.is_active());

        model.state().set("v", 2).unwrap();
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_isolated_listener_panic() {
        let model = Model::new(object! { "v" => 0 });
        let _boom = model.subscribe(|| panic!("listener failure"));
        let (hits, _sub) = counter(&model);

        model.state().set("v", 1).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_propagated_listener_panic() {
        let model = Model::with_policy(object! { "v" => 0 }, PanicPolicy::Propagate);
        let _boom = model.subscribe(|| panic!("listener failure"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            model.state().set("v", 1)
        }));
        assert!(outcome.is_err());
        // the write itself happened before dispatch
        assert_eq!(model.state().get("v"), Some(Value::Int(1)));
    }

    #[test]
    fn test_async_result_in_state() {
        let model = Model::new(object! { "load" => AsyncResult::<i64>::idle() });
        let (hits, _sub) = counter(&model);

        model
            .state()
            .set_async("load", AsyncResult::<i64>::pending())
            .unwrap();
        model
            .state()
            .set_async("load", AsyncResult::<i64, String>::from(Ok(42)))
            .unwrap();
        assert_eq!(hits.get(), 2);

        let view = model.state().child("load").unwrap();
        let back = AsyncResult::<Value, String>::from_observed(&view).unwrap();
        assert!(back.is_success());
        assert_eq!(back.data, Some(Value::Int(42)));
        assert_eq!(back.error, None);

        model
            .state()
            .set_async("load", AsyncResult::<i64>::failure("offline".to_string()))
            .unwrap();
        let back = AsyncResult::<Value, String>::from_observed(&model.state().child("load").unwrap()).unwrap();
        assert_eq!(back.status, AsyncStatus::Error);
        assert_eq!(back.error.as_deref(), Some("offline"));
    }

    #[test]
    fn test_async_status_parse() {
        assert_eq!("pending".parse::<AsyncStatus>(), Ok(AsyncStatus::Pending));
        assert!("done".parse::<AsyncStatus>().is_err());
        assert_eq!(AsyncStatus::Success.to_string(), "success");
    }

    #[test]
    fn test_circular_debug() {
        let model = Model::new(object! {});
        let root = match model.state().node() {
            Node::Object(o) => o.clone(),
            Node::Array(_) => unreachable!(),
        };
        model.state().set("me", root).unwrap();
        let printed = format!("{:?}", model.state());
        assert!(printed.contains("[Circular]"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Set(u8, i64),
            Delete(u8),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0u8..4, -2i64..3).prop_map(|(k, v)| Op::Set(k, v)),
                (0u8..4).prop_map(Op::Delete),
            ]
        }

        proptest! {
            #[test]
            fn notifications_match_effective_writes(ops in proptest::collection::vec(arb_op(), 0..40)) {
                let model = Model::new(Object::new());
                let (hits, _sub) = counter(&model);
                let mut shadow: std::collections::HashMap<u8, i64> = Default::default();
                let mut expected = 0u32;

                for op in ops {
                    match op {
                        Op::Set(k, v) => {
                            if shadow.insert(k, v) != Some(v) {
                                expected += 1;
                            }
                            model.state().set(format!("k{k}"), v).unwrap();
                        }
                        Op::Delete(k) => {
                            shadow.remove(&k);
                            expected += 1;
                            model.state().delete(format!("k{k}")).unwrap();
                        }
                    }
                    prop_assert_eq!(hits.get(), expected);
                }
            }
        }
    }

    mod nested_props {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            SetIdx(usize, i64),
            DelIdx(usize),
            Pop,
            NestedSet(u8, i64),
            NestedDelete(u8),
        }

        fn arb_op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0usize..6, -2i64..3).prop_map(|(i, v)| Op::SetIdx(i, v)),
                (0usize..8).prop_map(Op::DelIdx),
                Just(Op::Pop),
                (0u8..3, -2i64..3).prop_map(|(k, v)| Op::NestedSet(k, v)),
                (0u8..3).prop_map(Op::NestedDelete),
            ]
        }

        proptest! {
            #[test]
            fn nested_and_indexed_writes_notify_once_per_change(ops in proptest::collection::vec(arb_op(), 0..40)) {
                let model = Model::new(object! {
                    "list" => array![],
                    "nested" => object! {},
                });
                let (hits, _sub) = counter(&model);
                let mut list: Vec<Option<i64>> = Vec::new();
                let mut nested: std::collections::HashMap<u8, i64> = Default::default();
                let mut expected = 0u32;

                for op in ops {
                    match op {
                        Op::SetIdx(i, v) => {
                            if i < list.len() {
                                if list[i].replace(v) != Some(v) {
                                    expected += 1;
                                }
                            } else {
                                list.resize(i, None);
                                list.push(Some(v));
                                expected += 1;
                            }
                            model.state().child("list").unwrap().set(i, v).unwrap();
                        }
                        Op::DelIdx(i) => {
                            if let Some(slot) = list.get_mut(i) {
                                *slot = None;
                            }
                            expected += 1;
                            model.state().child("list").unwrap().delete(i).unwrap();
                        }
                        Op::Pop => {
                            if list.pop().is_some() {
                                expected += 1;
                            }
                            model.state().child("list").unwrap().pop().unwrap();
                        }
                        Op::NestedSet(k, v) => {
                            if nested.insert(k, v) != Some(v) {
                                expected += 1;
                            }
                            model
                                .state()
                                .set_path([Key::from("nested"), Key::from(format!("k{k}"))], v)
                                .unwrap();
                        }
                        Op::NestedDelete(k) => {
                            nested.remove(&k);
                            expected += 1;
                            model
                                .state()
                                .child_path(["nested"])
                                .unwrap()
                                .delete(format!("k{k}"))
                                .unwrap();
                        }
                    }
                    prop_assert_eq!(hits.get(), expected);
                }

                let view = model.state().child("list").unwrap();
                prop_assert_eq!(view.len(), list.len());
                for (i, slot) in list.iter().enumerate() {
                    prop_assert_eq!(view.get(i), slot.map(Value::from));
                    prop_assert_eq!(view.contains_key(i), slot.is_some());
                }
                let nested_view = model.state().child("nested").unwrap();
                prop_assert_eq!(nested_view.len(), nested.len());
                for (k, v) in &nested {
                    prop_assert_eq!(nested_view.get(format!("k{k}")), Some(Value::from(*v)));
                }
            }
        }
    }
}
