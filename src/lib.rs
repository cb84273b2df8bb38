//! A dataflow compute engine: dependency-ordered operation networks and
//! a reactive node/socket wiring layer, built on a shared [`Operation`]
//! abstraction.
//!
//! This crate is a thin facade over three workspace members:
//! `compute_core` (the `Operation`/`Value`/`Identifier` types shared by
//! both subsystems), `compute_network` (the scheduler: plan
//! compilation, requirement pruning, sequential execution), and
//! `compute_node` (the reactive node/socket wiring layer). The two
//! subsystems are functionally independent; nothing here combines them.

pub use compute_core::*;
pub use compute_network::*;
pub use compute_node::*;
