//! Connection points that expose a node's interfaces to peer nodes.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use compute_core::{Identifier, Uid, Value};

use crate::interface::DataInterface;

/// Which way data flows through a socket. Convention only: an `Output`
/// socket is meant to connect to `Input` sockets on other nodes, but
/// this is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A named connection point on a node.
///
/// Holds only non-owning references: a `Weak` link to the bound
/// interface (owned by the same node) and `Weak` links to peer sockets
/// (owned by other nodes), so a socket graph never keeps its
/// participants alive.
pub struct Socket {
    identifier: Identifier,
    direction: Direction,
    bound: RefCell<Option<Weak<RefCell<DataInterface>>>>,
    peers: RefCell<Vec<Weak<Socket>>>,
}

impl Socket {
    pub(crate) fn new(identifier: Identifier, direction: Direction) -> Self {
        Self {
            identifier,
            direction,
            bound: RefCell::new(None),
            peers: RefCell::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.identifier.name
    }

    pub fn uid(&self) -> Uid {
        self.identifier.uid
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_data_interface(&self, interface: &Rc<RefCell<DataInterface>>) {
        *self.bound.borrow_mut() = Some(Rc::downgrade(interface));
    }

    pub fn get_value(&self) -> Option<Value> {
        let bound = self.bound.borrow();
        let interface = bound.as_ref()?.upgrade()?;
        let value = interface.borrow().get();
        Some(value)
    }

    /// Add `peer` to the connection set (a repeat connection is a
    /// no-op), then immediately [`Socket::propagate`] so the new peer
    /// receives the current value.
    pub fn connect(&self, peer: &Rc<Socket>) {
        let candidate = Rc::downgrade(peer);
        let already_connected = self
            .peers
            .borrow()
            .iter()
            .any(|existing| existing.ptr_eq(&candidate));
        if !already_connected {
            self.peers.borrow_mut().push(candidate);
            self.propagate();
        }
    }

    pub fn disconnect(&self, peer: &Rc<Socket>) {
        let target = Rc::downgrade(peer);
        self.peers.borrow_mut().retain(|existing| !existing.ptr_eq(&target));
    }

    /// Apply an incoming value from a peer. A no-op if this socket has
    /// no bound interface, or if the bound interface already holds
    /// `value` — this equality short-circuit is what lets a cyclic
    /// socket graph terminate.
    pub fn update_value(&self, value: Value) {
        let Some(interface) = self.bound.borrow().as_ref().and_then(Weak::upgrade) else {
            log::debug!("socket `{}` has no data interface", self.identifier.name);
            return;
        };

        if interface.borrow().get() == value {
            log::debug!(
                "socket `{}` data interface value has not changed",
                self.identifier.name
            );
            return;
        }

        DataInterface::update(&interface, value);
    }

    /// Publish the bound interface's current value to every connected
    /// peer socket.
    pub fn propagate(&self) {
        let Some(value) = self.get_value() else {
            return;
        };

        let peers: Vec<Rc<Socket>> = self.peers.borrow().iter().filter_map(Weak::upgrade).collect();
        for peer in peers {
            peer.update_value(value.clone());
        }
    }
}
