pub mod identifier;
pub mod operation;
pub mod value;

pub use identifier::{Identifier, Uid};
pub use operation::{AttrMap, Operation, OperationError, PortSpec};
pub use value::{Value, ValueMap};
