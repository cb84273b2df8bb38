//! The plan compiler: topological sort of the bipartite operation/data-slot
//! graph via Kahn's algorithm, plus liveness-driven discard emission.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use thunderdome::Arena;

use compute_core::Operation;

use super::error::CompileError;

/// A globally unique identifier for an [`Operation`] stored in a
/// [`super::Network`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub(crate) thunderdome::Index);

impl std::fmt::Debug for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op#{}-{}", self.0.slot(), self.0.generation())
    }
}

impl OperationId {
    #[cfg(test)]
    pub(crate) fn for_test(idx: thunderdome::Index) -> Self {
        Self(idx)
    }
}

/// An entry in the operation arena: the operation itself plus its
/// insertion sequence number, used only to break topological-sort ties
/// deterministically.
pub(crate) struct OperationEntry {
    pub operation: Operation,
    pub seq: u64,
}

/// An index into [`super::Network`]'s slot table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(pub usize);

/// Adjacency information for one named data slot: which operations
/// produce it (edges `Op -> Slot`) and which consume it (edges
/// `Slot -> Op`).
#[derive(Default)]
pub(crate) struct SlotEntry {
    pub name: String,
    pub producers: Vec<OperationId>,
    pub consumers: Vec<OperationId>,
    pub seq: u64,
}

/// A vertex in the bipartite operation/data-slot graph.
///
/// Modeled as a tagged sum rather than runtime type discrimination: two
/// disjoint vertex kinds indexed by small integer handles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) enum Vertex {
    Op(OperationId),
    Slot(SlotId),
}

/// One step of a compiled plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanStep {
    /// Run this operation.
    Op(OperationId),
    /// Drop this data slot from the executor's cache; it will not be read
    /// again by any later step.
    Discard(String),
}

fn predecessors(v: Vertex, ops: &Arena<OperationEntry>, slots: &[SlotEntry]) -> Vec<Vertex> {
    match v {
        Vertex::Op(id) => {
            let op = &ops[id.0].operation;
            let mut seen = AHashSet::default();
            op.inputs()
                .iter()
                .filter_map(|p| {
                    let idx = slots.iter().position(|s| s.name == p.name)?;
                    seen.insert(idx).then_some(Vertex::Slot(SlotId(idx)))
                })
                .collect()
        }
        Vertex::Slot(id) => slots[id.0]
            .producers
            .iter()
            .map(|&op_id| Vertex::Op(op_id))
            .collect(),
    }
}

fn successors(v: Vertex, ops: &Arena<OperationEntry>, slots: &[SlotEntry]) -> Vec<Vertex> {
    match v {
        Vertex::Op(id) => {
            let op = &ops[id.0].operation;
            op.outputs()
                .iter()
                .filter_map(|name| {
                    let idx = slots.iter().position(|s| &s.name == name)?;
                    Some(Vertex::Slot(SlotId(idx)))
                })
                .collect()
        }
        Vertex::Slot(id) => slots[id.0]
            .consumers
            .iter()
            .map(|&op_id| Vertex::Op(op_id))
            .collect(),
    }
}

/// All vertices strictly above `start` in the dependency order (does not
/// include `start` itself).
pub(crate) fn ancestors(
    start: Vertex,
    ops: &Arena<OperationEntry>,
    slots: &[SlotEntry],
) -> AHashSet<Vertex> {
    let mut seen = AHashSet::default();
    let mut queue: VecDeque<Vertex> = predecessors(start, ops, slots).into_iter().collect();
    while let Some(v) = queue.pop_front() {
        if seen.insert(v) {
            queue.extend(predecessors(v, ops, slots));
        }
    }
    seen
}

fn vertex_seq(v: Vertex, ops: &Arena<OperationEntry>, slots: &[SlotEntry]) -> u64 {
    match v {
        Vertex::Op(id) => ops[id.0].seq,
        Vertex::Slot(id) => slots[id.0].seq,
    }
}

/// Topologically sort the full bipartite graph with Kahn's algorithm,
/// breaking ties between simultaneously-ready vertices by insertion
/// order so the result is reproducible for a given construction history.
///
/// Returns the operations in dependency order, or [`CompileError::CycleDetected`]
/// if the graph is not a DAG.
pub(crate) fn topological_order(
    ops: &Arena<OperationEntry>,
    slots: &[SlotEntry],
) -> Result<Vec<OperationId>, CompileError> {
    let all_vertices: Vec<Vertex> = ops
        .iter()
        .map(|(idx, _)| Vertex::Op(OperationId(idx)))
        .chain((0..slots.len()).map(|i| Vertex::Slot(SlotId(i))))
        .collect();

    let mut in_degree: AHashMap<Vertex, usize> = all_vertices
        .iter()
        .map(|&v| (v, predecessors(v, ops, slots).len()))
        .collect();

    let mut ready: Vec<Vertex> = all_vertices
        .iter()
        .copied()
        .filter(|v| in_degree[v] == 0)
        .collect();
    ready.sort_by_key(|&v| vertex_seq(v, ops, slots));
    let mut queue: VecDeque<Vertex> = ready.into();

    let mut order = Vec::with_capacity(all_vertices.len());
    let mut ordered_ops = Vec::new();

    while let Some(v) = queue.pop_front() {
        order.push(v);
        if let Vertex::Op(id) = v {
            ordered_ops.push(id);
        }

        let mut newly_ready: Vec<Vertex> = Vec::new();
        for succ in successors(v, ops, slots) {
            let degree = in_degree.get_mut(&succ).expect("vertex must be known");
            *degree -= 1;
            if *degree == 0 {
                newly_ready.push(succ);
            }
        }
        newly_ready.sort_by_key(|&v| vertex_seq(v, ops, slots));
        queue.extend(newly_ready);
    }

    if order.len() != all_vertices.len() {
        return Err(CompileError::CycleDetected);
    }

    Ok(ordered_ops)
}

/// Build the plan from a topological operation order, inserting
/// [`PlanStep::Discard`] markers right after an operation that is the
/// last consumer of one of its input slots, when `optimize` is set.
pub(crate) fn build_plan(
    ordered_ops: &[OperationId],
    ops: &Arena<OperationEntry>,
    slots: &[SlotEntry],
    optimize: bool,
) -> Vec<PlanStep> {
    let mut plan = Vec::with_capacity(ordered_ops.len());

    if !optimize {
        plan.extend(ordered_ops.iter().map(|&id| PlanStep::Op(id)));
        return plan;
    }

    let position: AHashMap<OperationId, usize> = ordered_ops
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i))
        .collect();

    for (i, &op_id) in ordered_ops.iter().enumerate() {
        plan.push(PlanStep::Op(op_id));

        let op = &ops[op_id.0].operation;
        let mut seen = AHashSet::default();
        let mut discards: Vec<&SlotEntry> = Vec::new();

        for input in op.inputs() {
            let Some(slot_idx) = slots.iter().position(|s| s.name == input.name) else {
                continue;
            };
            if !seen.insert(slot_idx) {
                continue;
            }
            let slot = &slots[slot_idx];
            let last_use = slot
                .consumers
                .iter()
                .filter_map(|c| position.get(c))
                .copied()
                .max();
            if last_use == Some(i) {
                discards.push(slot);
            }
        }

        discards.sort_by_key(|s| s.seq);
        plan.extend(
            discards
                .into_iter()
                .map(|s| PlanStep::Discard(s.name.clone())),
        );
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_core::{Operation, PortSpec};

    fn noop(name: &str, inputs: &[&str], outputs: &[&str]) -> Operation {
        Operation::new(
            name,
            inputs.iter().map(|n| PortSpec::required(*n)).collect(),
            outputs.iter().map(|n| n.to_string()).collect(),
            |args, _| Ok(args.to_vec()),
        )
        .unwrap()
    }

    fn build(ops_defs: Vec<Operation>) -> (Arena<OperationEntry>, Vec<SlotEntry>) {
        let mut ops = Arena::new();
        let mut slots: Vec<SlotEntry> = Vec::new();
        let mut seq = 0u64;

        let mut ids = Vec::new();
        for op in ops_defs {
            let id = OperationId(ops.insert(OperationEntry {
                operation: op,
                seq,
            }));
            ids.push(id);
            seq += 1;
        }

        for (idx, id) in ids.iter().enumerate() {
            let op = &ops[id.0].operation;
            for name in op.outputs() {
                if let Some(existing) = slots.iter_mut().find(|s| &s.name == name) {
                    existing.producers.push(*id);
                } else {
                    slots.push(SlotEntry {
                        name: name.clone(),
                        producers: vec![*id],
                        consumers: vec![],
                        seq,
                    });
                    seq += 1;
                }
            }
            let _ = idx;
        }
        for id in &ids {
            let op = &ops[id.0].operation;
            for port in op.inputs() {
                if let Some(slot) = slots.iter_mut().find(|s| s.name == port.name) {
                    slot.consumers.push(*id);
                } else {
                    slots.push(SlotEntry {
                        name: port.name.clone(),
                        producers: vec![],
                        consumers: vec![*id],
                        seq,
                    });
                    seq += 1;
                }
            }
        }

        (ops, slots)
    }

    #[test]
    fn linear_chain_sorts_in_dependency_order() {
        let a = noop("a", &["x"], &["y"]);
        let b = noop("b", &["y"], &["z"]);
        let (ops, slots) = build(vec![a, b]);
        let order = topological_order(&ops, &slots).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(ops[order[0].0].operation.name(), "a");
        assert_eq!(ops[order[1].0].operation.name(), "b");
    }

    #[test]
    fn cycle_is_detected() {
        let a = noop("a", &["z"], &["y"]);
        let b = noop("b", &["y"], &["z"]);
        let (ops, slots) = build(vec![a, b]);
        assert!(matches!(
            topological_order(&ops, &slots),
            Err(CompileError::CycleDetected)
        ));
    }

    #[test]
    fn discard_follows_last_consumer() {
        let a = noop("a", &["x"], &["y"]);
        let b = noop("b", &["y"], &["z"]);
        let (ops, slots) = build(vec![a, b]);
        let order = topological_order(&ops, &slots).unwrap();
        let plan = build_plan(&order, &ops, &slots, true);
        assert_eq!(
            plan,
            vec![
                PlanStep::Op(order[0]),
                PlanStep::Discard("x".into()),
                PlanStep::Op(order[1]),
                PlanStep::Discard("y".into()),
            ]
        );
    }
}
