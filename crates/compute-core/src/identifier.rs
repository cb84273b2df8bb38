//! Human-readable names plus a globally unique opaque token, shared by
//! every entity in the network and node layers (operations, interfaces,
//! sockets, nodes).

use std::fmt;

/// A 128-bit random token, rendered as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid(u128);

impl Uid {
    /// Generate a fresh, globally unique token.
    pub fn generate() -> Self {
        Self(rand::random())
    }
}

impl Default for Uid {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// A human-readable `name` plus a globally unique `uid`.
///
/// `uid` defaults to a freshly generated token when not supplied.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub name: String,
    pub uid: Uid,
}

impl Identifier {
    pub fn new(name: impl Into<String>, uid: Option<Uid>) -> Self {
        Self {
            name: name.into(),
            uid: uid.unwrap_or_default(),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.uid)
    }
}
