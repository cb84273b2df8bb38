use thiserror::Error;

use crate::executor::ComputeMethod;

/// An error raised by [`super::Network::compile`].
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// The operation/data-slot graph is not a DAG.
    #[error("could not compile network: a cycle was detected in the operation graph")]
    CycleDetected,
}

/// An error raised by [`super::Network::add_operation`].
#[derive(Debug, Clone, Error)]
pub enum AddOperationError {
    /// Another operation with this name is already registered.
    #[error("an operation named `{0}` is already registered in this network")]
    DuplicateName(String),
}

/// An error raised by [`super::Network::call`].
#[derive(Debug, Clone, Error)]
pub enum NetworkCallError {
    /// `call` was invoked before a successful `compile`.
    #[error("network has not been compiled")]
    NotCompiled,
    /// `compile` produced an empty plan (the network has no operations).
    #[error("compiled plan is empty")]
    EmptyPlan,
    /// The inputs needed to produce the requested outputs were not supplied.
    #[error("missing required inputs: {0:?}")]
    MissingInputs(Vec<String>),
    /// The requested compute method is not implemented by this executor.
    #[error("compute method {0:?} is not implemented")]
    MethodNotImplemented(ComputeMethod),
}
