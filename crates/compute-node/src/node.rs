//! A node: a named bundle of [`DataInterface`]s, [`Socket`]s, and
//! [`Operation`]s, plus the reactive evaluate/execute/propagate cycle
//! that ties them together.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use compute_core::{AttrMap, Identifier, Operation, OperationError, PortSpec, Uid, Value, ValueMap};

use crate::interface::DataInterface;
use crate::socket::{Direction, Socket};

fn fatal(msg: impl fmt::Display) -> ! {
    log::error!("{msg}");
    panic!("{msg}");
}

/// The node's owned state. Never constructed directly; always reached
/// through a [`NodeHandle`], since interfaces need a `Weak` back
/// reference to it that only exists once the node itself is behind an
/// `Rc`.
pub struct Node {
    identifier: Identifier,
    interfaces: Vec<Rc<RefCell<DataInterface>>>,
    sockets: Vec<Rc<Socket>>,
    operations: Vec<Operation>,
}

/// A cheaply-cloneable handle to a node, and the type every public
/// node operation is defined on.
#[derive(Clone)]
pub struct NodeHandle(Rc<RefCell<Node>>);

impl NodeHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Rc::new(RefCell::new(Node {
            identifier: Identifier::new(name, None),
            interfaces: Vec::new(),
            sockets: Vec::new(),
            operations: Vec::new(),
        })))
    }

    pub(crate) fn from_rc(inner: Rc<RefCell<Node>>) -> Self {
        Self(inner)
    }

    pub fn name(&self) -> String {
        self.0.borrow().identifier.name.clone()
    }

    pub fn uid(&self) -> Uid {
        self.0.borrow().identifier.uid
    }

    /// Register a new interface. Fatal if an interface with this name
    /// or uid already exists on the node.
    pub fn add_data(
        &self,
        name: impl Into<String>,
        initial_value: Value,
        uid: Option<Uid>,
    ) -> Rc<RefCell<DataInterface>> {
        let name = name.into();
        let mut node = self.0.borrow_mut();

        if node.interfaces.iter().any(|i| i.borrow().name() == name) {
            let owner = node.identifier.name.clone();
            drop(node);
            fatal(format!(
                "interface with name `{name}` already exists in node `{owner}`"
            ));
        }
        if let Some(uid) = uid {
            if node.interfaces.iter().any(|i| i.borrow().uid() == uid) {
                let owner = node.identifier.name.clone();
                drop(node);
                fatal(format!(
                    "interface with uid `{uid}` already exists in node `{owner}`"
                ));
            }
        }

        let interface = Rc::new(RefCell::new(DataInterface::new(
            Identifier::new(name, uid),
            initial_value,
            Rc::downgrade(&self.0),
        )));
        node.interfaces.push(interface.clone());
        interface
    }

    /// Register a new socket. Fatal if a socket with this name or uid
    /// already exists on the node.
    pub fn add_socket(
        &self,
        name: impl Into<String>,
        direction: Direction,
        uid: Option<Uid>,
    ) -> Rc<Socket> {
        let name = name.into();
        let mut node = self.0.borrow_mut();

        if node.sockets.iter().any(|s| s.name() == name) {
            let owner = node.identifier.name.clone();
            drop(node);
            fatal(format!(
                "socket with name `{name}` already exists in node `{owner}`"
            ));
        }
        if let Some(uid) = uid {
            if node.sockets.iter().any(|s| s.uid() == uid) {
                let owner = node.identifier.name.clone();
                drop(node);
                fatal(format!(
                    "socket with uid `{uid}` already exists in node `{owner}`"
                ));
            }
        }

        let socket = Rc::new(Socket::new(Identifier::new(name, uid), direction));
        node.sockets.push(socket.clone());
        socket
    }

    /// Register a new operation. Fatal if an operation with this name
    /// already exists, or if any declared input/output name is not
    /// already a data interface on this node.
    pub fn add_operation(
        &self,
        name: impl Into<String>,
        inputs: Vec<PortSpec>,
        outputs: Vec<String>,
        function: impl Fn(&[Value], &AttrMap) -> Result<Vec<Value>, OperationError> + Send + Sync + 'static,
        attrs: AttrMap,
        uid: Option<Uid>,
    ) -> Operation {
        let name = name.into();
        let mut node = self.0.borrow_mut();

        if node.operations.iter().any(|op| op.name() == name) {
            let owner = node.identifier.name.clone();
            drop(node);
            fatal(format!(
                "operation with name `{name}` already exists in node `{owner}`"
            ));
        }

        let available: Vec<String> = node.interfaces.iter().map(|i| i.borrow().name().to_string()).collect();
        for port in &inputs {
            if !available.contains(&port.name) {
                let owner = node.identifier.name.clone();
                drop(node);
                fatal(format!(
                    "operation input `{}` not available in node `{owner}`",
                    port.name
                ));
            }
        }
        for output in &outputs {
            if !available.contains(output) {
                let owner = node.identifier.name.clone();
                drop(node);
                fatal(format!(
                    "operation output `{output}` not available in node `{owner}`"
                ));
            }
        }

        let mut operation = Operation::with_attrs(name, inputs, outputs, function, attrs)
            .unwrap_or_else(|err| fatal(err));
        if let Some(uid) = uid {
            operation = operation.with_uid(uid);
        }

        node.operations.push(operation.clone());
        operation
    }

    pub fn socket_by_name(&self, name: &str) -> Option<Rc<Socket>> {
        self.0.borrow().sockets.iter().find(|s| s.name() == name).cloned()
    }

    pub fn interface_by_name(&self, name: &str) -> Option<Rc<RefCell<DataInterface>>> {
        self.0
            .borrow()
            .interfaces
            .iter()
            .find(|i| i.borrow().name() == name)
            .cloned()
    }

    /// A snapshot of every interface's current value.
    pub fn get_values(&self) -> ValueMap {
        self.0
            .borrow()
            .interfaces
            .iter()
            .map(|i| {
                let iface = i.borrow();
                (iface.name().to_string(), iface.get())
            })
            .collect()
    }

    /// Write values directly, without triggering re-evaluation. Names
    /// absent from the node are logged and skipped.
    pub fn set_values(&self, values: &ValueMap) {
        let node = self.0.borrow();
        for (name, value) in values {
            match node.interfaces.iter().find(|i| i.borrow().name() == name) {
                Some(interface) => interface.borrow_mut().set(value.clone()),
                None => log::error!(
                    "cannot update interface `{name}` value, not found in node `{}`",
                    node.identifier.name
                ),
            }
        }
    }

    /// Write values through the differential-update path, triggering
    /// [`NodeHandle::evaluate`] for each name whose value actually
    /// changes. Names absent from the node are logged and skipped.
    pub fn update_values(&self, values: &ValueMap) {
        let (interfaces, owner_name) = {
            let node = self.0.borrow();
            (node.interfaces.clone(), node.identifier.name.clone())
        };
        for (name, value) in values {
            match interfaces.iter().find(|i| i.borrow().name() == name) {
                Some(interface) => DataInterface::update(interface, value.clone()),
                None => log::error!("cannot update interface `{name}` value, not found in node `{owner_name}`"),
            }
        }
    }

    /// Run every operation that reads `changed_name`, then
    /// [`NodeHandle::propagate`].
    pub fn evaluate(&self, changed_name: &str) {
        let matching: Vec<Operation> = {
            let node = self.0.borrow();
            node.operations
                .iter()
                .filter(|op| op.inputs().iter().any(|p| p.name == changed_name))
                .cloned()
                .collect()
        };
        for op in &matching {
            log::info!("evaluate triggered for interface `{changed_name}`");
            self.execute(op);
        }
        self.propagate();
    }

    /// Run every operation unconditionally, then
    /// [`NodeHandle::propagate`].
    pub fn compute(&self) {
        let operations: Vec<Operation> = self.0.borrow().operations.clone();
        for op in &operations {
            self.execute(op);
        }
        self.propagate();
    }

    /// Run a single operation against the current interface snapshot
    /// and write its result back through [`NodeHandle::update_values`].
    pub fn execute(&self, op: &Operation) {
        log::debug!("executing operation `{}`", op.name());
        let snapshot = self.get_values();
        match op.compute(&snapshot, None) {
            Ok(result) => self.update_values(&result),
            Err(OperationError::Value(msg)) => {
                log::warn!("operation `{}` raised a value error: {msg}", op.name());
            }
            Err(OperationError::Other(msg)) => {
                log::error!("operation `{}` failed: {msg}", op.name());
            }
        }
    }

    /// Publish every output socket's bound value to its connected peers.
    pub fn propagate(&self) {
        let outputs: Vec<Rc<Socket>> = self
            .0
            .borrow()
            .sockets
            .iter()
            .filter(|s| s.direction() == Direction::Output)
            .cloned()
            .collect();
        for socket in outputs {
            socket.propagate();
        }
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHandle").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bool_val(v: bool) -> Value {
        Value::Bool(v)
    }

    #[test]
    fn simple_operation_reacts_to_set_and_update() {
        let node = NodeHandle::new("bool_node");
        node.add_data("bool_in_1", bool_val(false), None);
        node.add_data("bool_in_2", bool_val(false), None);
        node.add_data("bool_out_1", bool_val(false), None);
        node.add_operation(
            "ior",
            vec![PortSpec::required("bool_in_1"), PortSpec::required("bool_in_2")],
            vec!["bool_out_1".into()],
            |args, _| Ok(vec![Value::Bool(args[0].as_bool()? || args[1].as_bool()?)]),
            AttrMap::default(),
            None,
        );

        let mut values = ValueMap::default();
        values.insert("bool_in_1".into(), bool_val(true));
        node.set_values(&values);
        node.compute();
        assert_eq!(
            node.interface_by_name("bool_out_1").unwrap().borrow().get(),
            bool_val(true)
        );

        let mut update = ValueMap::default();
        update.insert("bool_in_1".into(), bool_val(false));
        node.update_values(&update);
        assert_eq!(
            node.interface_by_name("bool_out_1").unwrap().borrow().get(),
            bool_val(false)
        );
    }

    #[test]
    fn nested_evaluation_propagates_through_nested_operations() {
        let node = NodeHandle::new("bool_chain");
        for name in ["b1", "b2", "b3", "out"] {
            node.add_data(name, bool_val(false), None);
        }
        node.add_operation(
            "iand",
            vec![PortSpec::required("b1"), PortSpec::required("b2")],
            vec!["b3".into()],
            |args, _| Ok(vec![Value::Bool(args[0].as_bool()? && args[1].as_bool()?)]),
            AttrMap::default(),
            None,
        );
        node.add_operation(
            "not",
            vec![PortSpec::required("b3")],
            vec!["out".into()],
            |args, _| Ok(vec![Value::Bool(!args[0].as_bool()?)]),
            AttrMap::default(),
            None,
        );

        node.compute();
        assert_eq!(node.interface_by_name("b3").unwrap().borrow().get(), bool_val(false));
        assert_eq!(node.interface_by_name("out").unwrap().borrow().get(), bool_val(true));

        let mut update = ValueMap::default();
        update.insert("b1".into(), bool_val(true));
        node.update_values(&update);
        assert_eq!(node.interface_by_name("b3").unwrap().borrow().get(), bool_val(false));
        assert_eq!(node.interface_by_name("out").unwrap().borrow().get(), bool_val(true));

        let mut update = ValueMap::default();
        update.insert("b2".into(), bool_val(true));
        node.update_values(&update);
        assert_eq!(node.interface_by_name("b3").unwrap().borrow().get(), bool_val(true));
        assert_eq!(node.interface_by_name("out").unwrap().borrow().get(), bool_val(false));
    }

    #[test]
    fn socket_connected_nodes_propagate_on_update() {
        let node_a = NodeHandle::new("a");
        let da = node_a.add_data("da", Value::from("developer"), None);
        let oa = node_a.add_socket("oa", Direction::Output, None);
        oa.set_data_interface(&da);

        let node_b = NodeHandle::new("b");
        let db = node_b.add_data("db", Value::from(""), None);
        let ob = node_b.add_socket("ob", Direction::Output, None);
        ob.set_data_interface(&db);

        let node_c = NodeHandle::new("c");
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

        let mut update = ValueMap::default();
        update.insert("db".into(), Value::from("working"));
        node_b.update_values(&update);

        assert_eq!(
            node_c.interface_by_name("dc").unwrap().borrow().get(),
            Value::from("developer_working")
        );
    }

    #[test]
    #[should_panic]
    fn duplicate_interface_name_is_fatal() {
        let node = NodeHandle::new("dup");
        node.add_data("x", bool_val(false), None);
        node.add_data("x", bool_val(false), None);
    }
}
