pub mod executor;
pub mod graph;

pub use executor::{sequential_compute, ComputeMethod};
pub use graph::{
    AddOperationError, CompileError, Network, NetworkCallError, NetworkConfig, OperationId,
    PlanStep,
};
