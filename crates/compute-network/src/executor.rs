//! The sequential executor: walks a compiled (or specialized) plan,
//! maintaining a cache of computed values and dropping entries at
//! [`PlanStep::Discard`] markers.
//!
//! Exposed as a free function, not only as a private detail of
//! [`crate::graph::Network::call`], so it can be driven directly against
//! a full un-specialized plan — useful for inspecting discard behavior
//! that `call` itself never exercises, since `call` always runs a
//! specialized plan with discard markers already stripped.

use std::time::Instant;

use compute_core::{Operation, OperationError, Value, ValueMap};

use crate::graph::{OperationId, PlanStep};

/// Which strategy [`crate::graph::Network::call`] should use to run a
/// specialized plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeMethod {
    /// Run plan steps one at a time, in order, on the calling thread.
    Sequential,
    /// Not implemented: independent branches would run across a thread
    /// pool.
    Parallel,
    /// Not implemented: independent branches would run across worker
    /// processes or machines.
    Distributed,
}

/// Run `plan` against `input_dict`, returning only the entries named in
/// `outputs` (or every produced value, in plan order, when `outputs` is
/// empty).
///
/// `resolve` looks up the [`Operation`] behind a [`PlanStep::Op`]; it is
/// a callback rather than a borrowed table so callers can hand over a
/// cheap clone (operations are `Arc`-backed internally) without holding
/// a borrow across the whole run.
///
/// `on_step` receives the name of each op/discard step and the
/// wall-clock seconds it took, mirroring a network's per-step
/// performance register.
///
/// A step whose operation raises [`OperationError::Value`] logs at
/// `warn` and contributes no outputs; any other error logs at `error`
/// and likewise contributes nothing. Neither aborts the run.
pub fn sequential_compute(
    plan: &[PlanStep],
    resolve: impl Fn(OperationId) -> Operation,
    input_dict: ValueMap,
    outputs: &[String],
    mut on_step: impl FnMut(&str, f64),
) -> ValueMap {
    let mut cache: ValueMap = input_dict;

    for step in plan {
        let start = Instant::now();
        match step {
            PlanStep::Op(id) => {
                let op = resolve(*id);
                match op.compute(&cache, None) {
                    Ok(produced) => cache.extend(produced),
                    Err(OperationError::Value(msg)) => {
                        log::warn!("operation `{}` raised a value error: {msg}", op.name());
                    }
                    Err(OperationError::Other(msg)) => {
                        log::error!("operation `{}` failed: {msg}", op.name());
                    }
                }
                on_step(op.name(), start.elapsed().as_secs_f64());
            }
            PlanStep::Discard(name) => {
                cache.shift_remove(name);
                on_step(&format!("discard:{name}"), start.elapsed().as_secs_f64());
            }
        }
    }

    if outputs.is_empty() {
        cache
    } else {
        // Order follows the cache's insertion order, not `outputs`'s.
        cache
            .into_iter()
            .filter(|(name, _)| outputs.iter().any(|o| o == name))
            .collect()
    }
}
