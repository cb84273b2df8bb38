//! End-to-end coverage of the reactive node layer through its public
//! API only: two source nodes feeding a concatenating node over
//! sockets, and a standalone node exercising nested operation
//! re-evaluation.

use compute_core::{AttrMap, PortSpec, Value, ValueMap};
use compute_node::{Direction, NodeHandle};

#[test]
fn socket_connected_nodes_propagate_string_concatenation() {
    let node_a = NodeHandle::new("source_a");
    let da = node_a.add_data("da", Value::from("developer"), None);
    let oa = node_a.add_socket("oa", Direction::Output, None);
    oa.set_data_interface(&da);

    let node_b = NodeHandle::new("source_b");
    let db = node_b.add_data("db", Value::from(""), None);
    let ob = node_b.add_socket("ob", Direction::Output, None);
    ob.set_data_interface(&db);

    let node_c = NodeHandle::new("concat");
    node_c.add_data("da", Value::from(""), None);
    node_c.add_data("db", Value::from(""), None);
    node_c.add_data("dc", Value::from(""), None);
    let ia = node_c.add_socket("ia", Direction::Input, None);
    let ib = node_c.add_socket("ib", Direction::Input, None);
    ia.set_data_interface(&node_c.interface_by_name("da").unwrap());
    ib.set_data_interface(&node_c.interface_by_name("db").unwrap());
    node_c.add_operation(
        "concat",
        vec![PortSpec::required("da"), PortSpec::required("db")],
        vec!["dc".into()],
        |args, _| Ok(vec![Value::from(format!("{}_{}", args[0].as_str()?, args[1].as_str()?))]),
        AttrMap::default(),
        None,
    );

    // Connecting publishes the current value immediately, so node_c
    // already reflects "developer_" before any update.
    oa.connect(&ia);
    ob.connect(&ib);
    assert_eq!(
        node_c.interface_by_name("dc").unwrap().borrow().get(),
        Value::from("developer_")
    );

    let mut update = ValueMap::default();
    update.insert("db".into(), Value::from("working"));
    node_b.update_values(&update);

    assert_eq!(
        node_c.interface_by_name("dc").unwrap().borrow().get(),
        Value::from("developer_working")
    );
}

#[test]
fn repeated_update_with_same_value_does_not_re_trigger() {
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    let invocations = Arc::new(AtomicI64::new(0));
    let counted = invocations.clone();

    let node = NodeHandle::new("counter");
    node.add_data("x", Value::from(0i64), None);
    node.add_data("calls", Value::from(0i64), None);
    node.add_operation(
        "count",
        vec![PortSpec::required("x")],
        vec!["calls".into()],
        move |args, _attrs| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(vec![args[0].clone()])
        },
        AttrMap::default(),
        None,
    );

    let mut update = ValueMap::default();
    update.insert("x".into(), Value::from(1i64));
    node.update_values(&update);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // Same value again: the differential-update short circuit means
    // the interface write is skipped entirely and `evaluate` never runs.
    node.update_values(&update);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    update.insert("x".into(), Value::from(2i64));
    node.update_values(&update);
    assert_eq!(invocations.load(Ordering::SeqCst), 2);
}
