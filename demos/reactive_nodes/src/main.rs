//! Three nodes wired through sockets: two source nodes each expose a
//! string on an output socket, a third node concatenates whatever it
//! receives on its two input sockets. Updating a source re-evaluates
//! and propagates all the way through.

use compute_core::{AttrMap, PortSpec, Value, ValueMap};
use compute_node::{Direction, NodeHandle};

fn main() {
    env_logger::init();

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

    oa.connect(&ia);
    ob.connect(&ib);

    println!("initial dc = {}", node_c.interface_by_name("dc").unwrap().borrow().get());

    let mut update = ValueMap::default();
    update.insert("db".into(), Value::from("working"));
    node_b.update_values(&update);

    println!("after updating source_b: dc = {}", node_c.interface_by_name("dc").unwrap().borrow().get());
}
