//! The operation network: a bipartite graph of [`Operation`]s and named
//! data slots, compiled into an ordered plan and executed by
//! [`crate::executor`].

mod compiler;
mod error;

use ahash::AHashMap;
use thunderdome::Arena;

use compute_core::Operation;

use crate::executor::{self, ComputeMethod};
use compute_core::ValueMap;

pub use self::compiler::{OperationId, PlanStep};
use self::compiler::{ancestors, build_plan, topological_order, OperationEntry, SlotEntry, SlotId, Vertex};
pub use self::error::{AddOperationError, CompileError, NetworkCallError};

/// Construction-time sizing hints for a [`Network`], mirroring the
/// default-capacity knobs exposed by arena-backed graphs elsewhere in
/// this codebase.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    pub initial_operation_capacity: usize,
    pub initial_slot_capacity: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            initial_operation_capacity: 64,
            initial_slot_capacity: 128,
        }
    }
}

type RequirementKey = (Vec<String>, Vec<String>);

#[derive(Clone)]
struct CachedRequirement {
    required_inputs: Vec<String>,
    specialized_ops: Vec<OperationId>,
}

/// A compiled, sequentially-executable network of [`Operation`]s.
///
/// Operations are added with [`Network::add_operation`], then
/// [`Network::compile`] produces an ordered [`PlanStep`] plan. [`Network::call`]
/// runs a specialized slice of that plan against a set of supplied
/// inputs, pruning the operations whose outputs cannot affect the
/// requested results.
pub struct Network {
    operations: Arena<OperationEntry>,
    name_to_id: AHashMap<String, OperationId>,
    slots: Vec<SlotEntry>,
    slot_by_name: AHashMap<String, SlotId>,
    next_seq: u64,
    compiled: bool,
    plan: Vec<PlanStep>,
    req_cache: AHashMap<RequirementKey, CachedRequirement>,
    perf_register: Vec<(String, f64)>,
}

impl Network {
    pub fn new() -> Self {
        Self::with_config(NetworkConfig::default())
    }

    pub fn with_config(config: NetworkConfig) -> Self {
        Self {
            operations: Arena::with_capacity(config.initial_operation_capacity),
            name_to_id: AHashMap::with_capacity(config.initial_operation_capacity),
            slots: Vec::with_capacity(config.initial_slot_capacity),
            slot_by_name: AHashMap::with_capacity(config.initial_slot_capacity),
            next_seq: 0,
            compiled: false,
            plan: Vec::new(),
            req_cache: AHashMap::default(),
            perf_register: Vec::new(),
        }
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn slot_id(&mut self, name: &str) -> SlotId {
        if let Some(&id) = self.slot_by_name.get(name) {
            return id;
        }
        let seq = self.next_seq();
        let id = SlotId(self.slots.len());
        self.slots.push(SlotEntry {
            name: name.to_string(),
            producers: Vec::new(),
            consumers: Vec::new(),
            seq,
        });
        self.slot_by_name.insert(name.to_string(), id);
        id
    }

    /// Register an operation. Adding an operation with a name already
    /// present in the network is rejected; it is logged and skipped in
    /// [`Network::add_operations`] rather than erroring, matching how a
    /// bulk import tolerates re-adding a shared subgraph.
    pub fn add_operation(&mut self, operation: Operation) -> Result<OperationId, AddOperationError> {
        if self.name_to_id.contains_key(operation.name()) {
            return Err(AddOperationError::DuplicateName(operation.name().to_string()));
        }

        let name = operation.name().to_string();
        let seq = self.next_seq();
        let inputs: Vec<String> = operation.inputs().iter().map(|p| p.name.clone()).collect();
        let outputs: Vec<String> = operation.outputs().to_vec();

        let idx = self.operations.insert(OperationEntry { operation, seq });
        let id = OperationId(idx);
        self.name_to_id.insert(name, id);

        let mut seen_inputs = ahash::AHashSet::default();
        for input_name in inputs {
            if !seen_inputs.insert(input_name.clone()) {
                continue;
            }
            let slot = self.slot_id(&input_name);
            self.slots[slot.0].consumers.push(id);
        }
        for output_name in outputs {
            let slot = self.slot_id(&output_name);
            self.slots[slot.0].producers.push(id);
        }

        self.compiled = false;
        self.req_cache.clear();
        Ok(id)
    }

    /// Add many operations at once. An operation whose name is already
    /// registered is logged at `warn` and skipped rather than failing
    /// the whole batch.
    pub fn add_operations(&mut self, operations: impl IntoIterator<Item = Operation>) {
        for operation in operations {
            let name = operation.name().to_string();
            if let Err(err) = self.add_operation(operation) {
                log::warn!("skipping operation `{name}`: {err}");
            }
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn ordered_steps(&self) -> &[PlanStep] {
        &self.plan
    }

    pub fn perf_register(&self) -> &[(String, f64)] {
        &self.perf_register
    }

    /// The `(required_inputs, requested_outputs)` keys currently held in
    /// the requirement memoization table.
    pub fn cached_requirements(&self) -> Vec<(Vec<String>, Vec<String>)> {
        self.req_cache.keys().cloned().collect()
    }

    fn operation(&self, id: OperationId) -> &Operation {
        &self.operations[id.0].operation
    }

    /// Topologically sort the operation graph and build the execution
    /// plan. With `optimize` set, [`PlanStep::Discard`] markers are
    /// interleaved after an operation that is the last consumer of one
    /// of its inputs.
    ///
    /// On a cycle the plan is left untouched, `compiled` is left false,
    /// and the error is logged and returned.
    ///
    /// On success clears the cached requirement specializations, since
    /// they were computed against the previous plan.
    pub fn compile(&mut self, optimize: bool) -> Result<&[PlanStep], CompileError> {
        let ordered_ops = topological_order(&self.operations, &self.slots).map_err(|err| {
            log::error!("{err}");
            err
        })?;
        self.plan = build_plan(&ordered_ops, &self.operations, &self.slots, optimize);
        self.compiled = true;
        self.req_cache.clear();
        Ok(&self.plan)
    }

    /// Narrow the compiled plan down to the operations needed to produce
    /// `requested` outputs given `available` inputs, plus the inputs
    /// still required after that pruning.
    ///
    /// Results are memoized; unknown names in `available`/`requested`
    /// are logged and otherwise ignored. Note the cache is keyed on
    /// *output* of this call (`required_inputs`, `requested`), not on
    /// `available` itself — a later call whose `available` differs but
    /// whose true requirement set coincides hits the same cache entry.
    pub(crate) fn evaluate_computation_requirements(
        &mut self,
        available: &[String],
        requested: &[String],
    ) -> (Vec<String>, Vec<OperationId>) {
        let mut available_sorted: Vec<String> = available.to_vec();
        available_sorted.sort();
        available_sorted.dedup();
        let mut requested_sorted: Vec<String> = requested.to_vec();
        requested_sorted.sort();
        requested_sorted.dedup();

        if let Some(cached) = self
            .req_cache
            .get(&(available_sorted.clone(), requested_sorted.clone()))
        {
            return (cached.required_inputs.clone(), cached.specialized_ops.clone());
        }

        let resolve = |names: &[String]| -> Vec<SlotId> {
            names
                .iter()
                .filter_map(|name| match self.slot_by_name.get(name) {
                    Some(&id) => Some(id),
                    None => {
                        log::warn!("unknown data slot `{name}` ignored in requirement evaluation");
                        None
                    }
                })
                .collect()
        };

        let removable: ahash::AHashSet<Vertex> = resolve(&available_sorted)
            .into_iter()
            .flat_map(|slot| ancestors(Vertex::Slot(slot), &self.operations, &self.slots))
            .collect();

        let needed: ahash::AHashSet<Vertex> = if requested_sorted.is_empty() {
            self.operations
                .iter()
                .map(|(idx, _)| Vertex::Op(OperationId(idx)))
                .chain((0..self.slots.len()).map(|i| Vertex::Slot(SlotId(i))))
                .collect()
        } else {
            resolve(&requested_sorted)
                .into_iter()
                .flat_map(|slot| ancestors(Vertex::Slot(slot), &self.operations, &self.slots))
                .collect()
        };

        let needed: ahash::AHashSet<Vertex> = needed.difference(&removable).copied().collect();

        let specialized_ops: Vec<OperationId> = self
            .plan
            .iter()
            .filter_map(|step| match step {
                PlanStep::Op(id) if needed.contains(&Vertex::Op(*id)) => Some(*id),
                _ => None,
            })
            .collect();

        let mut required_inputs: Vec<String> = specialized_ops
            .iter()
            .flat_map(|id| self.operation(*id).inputs().iter().map(|p| p.name.clone()))
            .filter(|name| {
                self.slot_by_name
                    .get(name)
                    .map(|&slot| self.slots[slot.0].producers.is_empty())
                    .unwrap_or(true)
            })
            .chain(available_sorted.iter().cloned())
            .collect();
        required_inputs.sort();
        required_inputs.dedup();

        self.req_cache.insert(
            (required_inputs.clone(), requested_sorted.clone()),
            CachedRequirement {
                required_inputs: required_inputs.clone(),
                specialized_ops: specialized_ops.clone(),
            },
        );

        (required_inputs, specialized_ops)
    }

    /// Run the network: specialize the compiled plan against the given
    /// inputs and the requested `outputs` (all outputs, in no
    /// particular order, when empty), then execute it with `method`.
    pub fn call(
        &mut self,
        input_dict: ValueMap,
        outputs: &[String],
        method: ComputeMethod,
    ) -> Result<ValueMap, NetworkCallError> {
        if !self.compiled {
            log::error!("call attempted on an uncompiled network");
            return Err(NetworkCallError::NotCompiled);
        }
        if self.plan.is_empty() {
            log::error!("call attempted on a network with an empty plan");
            return Err(NetworkCallError::EmptyPlan);
        }

        let provided: Vec<String> = input_dict.keys().cloned().collect();
        let (required_inputs, specialized_ops) =
            self.evaluate_computation_requirements(&provided, outputs);

        let missing: Vec<String> = required_inputs
            .iter()
            .filter(|name| !input_dict.contains_key(*name))
            .cloned()
            .collect();
        if !missing.is_empty() {
            log::error!("missing required inputs: {missing:?}");
            return Err(NetworkCallError::MissingInputs(missing));
        }

        if method != ComputeMethod::Sequential {
            log::error!("compute method {method:?} is not implemented");
            return Err(NetworkCallError::MethodNotImplemented(method));
        }

        self.perf_register.clear();
        let specialized_plan: Vec<PlanStep> =
            specialized_ops.iter().map(|&id| PlanStep::Op(id)).collect();

        // Disjoint field borrows: `resolve` only ever reads `operations`,
        // `on_step` only ever writes `perf_register`. Splitting them up
        // front (rather than calling the `&self` helper `operation()`)
        // keeps the two borrows non-overlapping, since method calls are
        // opaque to the borrow checker's field-level disjointness check.
        let ops = &self.operations;
        let perf = &mut self.perf_register;

        let result = executor::sequential_compute(
            &specialized_plan,
            |id| ops[id.0].operation.clone(),
            input_dict,
            outputs,
            |name, seconds| perf.push((name.to_string(), seconds)),
        );

        Ok(result)
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute_core::{PortSpec, Value};

    fn build_scenario_a() -> Network {
        let mut net = Network::new();
        net.add_operation(
            Operation::new(
                "op_sub",
                vec![PortSpec::required("a"), PortSpec::required("b")],
                vec!["a_minus_b".into()],
                |args, _| Ok(vec![Value::from(args[0].as_f64()? - args[1].as_f64()?)]),
            )
            .unwrap(),
        )
        .unwrap();
        net.add_operation(
            Operation::new(
                "op_div",
                vec![PortSpec::required("a_minus_b"), PortSpec::required("c")],
                vec!["divided".into()],
                |args, _| Ok(vec![Value::from(args[0].as_f64()? / args[1].as_f64()?)]),
            )
            .unwrap(),
        )
        .unwrap();
        net
    }

    #[test]
    fn compile_orders_dependents_after_dependencies() {
        let mut net = build_scenario_a();
        let plan = net.compile(false).unwrap();
        assert_eq!(plan.len(), 2);
        match (&plan[0], &plan[1]) {
            (PlanStep::Op(first), PlanStep::Op(second)) => {
                assert_eq!(net.operation(*first).name(), "op_sub");
                assert_eq!(net.operation(*second).name(), "op_div");
            }
            other => panic!("unexpected plan shape: {other:?}"),
        }
    }

    #[test]
    fn call_before_compile_is_rejected() {
        let mut net = build_scenario_a();
        let mut inputs = ValueMap::default();
        inputs.insert("a".into(), Value::from(1.0));
        inputs.insert("b".into(), Value::from(2.0));
        inputs.insert("c".into(), Value::from(3.0));
        let err = net.call(inputs, &[], ComputeMethod::Sequential).unwrap_err();
        assert!(matches!(err, NetworkCallError::NotCompiled));
    }

    #[test]
    fn call_runs_the_full_chain() {
        let mut net = build_scenario_a();
        net.compile(false).unwrap();
        let mut inputs = ValueMap::default();
        inputs.insert("a".into(), Value::from(1.0));
        inputs.insert("b".into(), Value::from(4.7));
        inputs.insert("c".into(), Value::from(1.1));
        let out = net.call(inputs, &[], ComputeMethod::Sequential).unwrap();
        let divided = out.get("divided").unwrap().as_f64().unwrap();
        assert!((divided - (-3.3636363636)).abs() < 1e-6);
    }

    #[test]
    fn missing_inputs_are_reported() {
        let mut net = build_scenario_a();
        net.compile(false).unwrap();
        let inputs = ValueMap::default();
        let err = net.call(inputs, &[], ComputeMethod::Sequential).unwrap_err();
        match err {
            NetworkCallError::MissingInputs(mut missing) => {
                missing.sort();
                assert_eq!(missing, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
            }
            other => panic!("expected MissingInputs, got {other:?}"),
        }
    }

    #[test]
    fn specialization_prunes_unreachable_operations() {
        let mut net = build_scenario_a();
        net.add_operation(
            Operation::new(
                "unrelated",
                vec![PortSpec::required("z")],
                vec!["unused".into()],
                |args, _| Ok(args.to_vec()),
            )
            .unwrap(),
        )
        .unwrap();
        net.compile(false).unwrap();

        let mut inputs = ValueMap::default();
        inputs.insert("a".into(), Value::from(1.0));
        inputs.insert("b".into(), Value::from(2.0));
        inputs.insert("c".into(), Value::from(3.0));
        let out = net
            .call(inputs, &["a_minus_b".to_string()], ComputeMethod::Sequential)
            .unwrap();
        assert!(out.contains_key("a_minus_b"));
        assert!(!out.contains_key("divided"));
    }

    #[test]
    fn duplicate_operation_name_is_rejected() {
        let mut net = build_scenario_a();
        let err = net
            .add_operation(
                Operation::new(
                    "op_sub",
                    vec![PortSpec::required("a")],
                    vec!["y".into()],
                    |args, _| Ok(args.to_vec()),
                )
                .unwrap(),
            )
            .unwrap_err();
        assert!(matches!(err, AddOperationError::DuplicateName(_)));
    }
}
