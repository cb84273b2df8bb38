//! A named, mutable value cell owned by exactly one [`crate::Node`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use compute_core::{Identifier, Uid, Value};

use crate::node::{Node, NodeHandle};

/// A data slot local to a node. Holds the node's non-owning back
/// reference so [`DataInterface::update`] can trigger re-evaluation.
pub struct DataInterface {
    pub(crate) identifier: Identifier,
    value: Value,
    pub(crate) owner: Weak<RefCell<Node>>,
}

impl DataInterface {
    pub fn name(&self) -> &str {
        &self.identifier.name
    }

    pub fn uid(&self) -> Uid {
        self.identifier.uid
    }

    /// Read the current value.
    pub fn get(&self) -> Value {
        self.value.clone()
    }

    /// Write unconditionally, without triggering re-evaluation.
    pub fn set(&mut self, value: Value) {
        self.value = value;
    }

    pub(crate) fn new(identifier: Identifier, value: Value, owner: Weak<RefCell<Node>>) -> Self {
        Self {
            identifier,
            value,
            owner,
        }
    }

    /// Write `value` and, if it differs from the current value, notify
    /// the owning node's [`NodeHandle::evaluate`] for this interface's
    /// name.
    ///
    /// Equality is checked *before* the write so that two mutually
    /// connected sockets holding the same value terminate a propagation
    /// chain instead of recursing indefinitely.
    pub fn update(this: &Rc<RefCell<DataInterface>>, value: Value) {
        let (changed, owner, name) = {
            let mut iface = this.borrow_mut();
            if iface.value == value {
                (false, None, iface.identifier.name.clone())
            } else {
                iface.value = value;
                (true, iface.owner.upgrade(), iface.identifier.name.clone())
            }
        };

        if changed {
            if let Some(owner) = owner {
                NodeHandle::from_rc(owner).evaluate(&name);
            }
        }
    }
}
