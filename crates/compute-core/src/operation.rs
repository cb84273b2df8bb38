//! The operation abstraction shared by both the network scheduler and the
//! reactive node layer: a pure function with named input/output slots.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;

use crate::identifier::{Identifier, Uid};
use crate::value::{Value, ValueMap, ValueTypeError};

/// An attribute map: constant keyword values baked into an [`Operation`]
/// at construction time.
pub type AttrMap = AHashMap<String, Value>;

/// A single named input port, optionally marked `optional`.
///
/// Optional inputs are passed to the function by name only when present
/// in the caller's value map, and are not required for the operation to
/// run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub optional: bool,
}

impl PortSpec {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

impl From<&str> for PortSpec {
    fn from(name: &str) -> Self {
        PortSpec::required(name)
    }
}

impl From<String> for PortSpec {
    fn from(name: String) -> Self {
        PortSpec::required(name)
    }
}

/// An error raised by an operation's user-supplied function.
///
/// The sequential executor (in `compute-network`) distinguishes the two
/// variants only in how loudly it logs them; both result in the
/// operation's outputs being treated as empty for that step.
#[derive(Debug, Clone)]
pub enum OperationError {
    /// A value/range error: the inputs were well-formed but the function
    /// could not produce a result (e.g. a type mismatch surfaced via
    /// [`crate::value::ValueTypeError`], or a domain error such as
    /// division by zero).
    Value(String),
    /// Any other failure. Logged at the highest available severity.
    Other(String),
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationError::Value(msg) => write!(f, "{msg}"),
            OperationError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for OperationError {}

impl From<ValueTypeError> for OperationError {
    fn from(err: ValueTypeError) -> Self {
        OperationError::Value(err.to_string())
    }
}

/// Raised by [`Operation::new`] when `inputs` and `outputs` are not
/// disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlappingPortsError {
    pub name: String,
    pub overlapping: Vec<String>,
}

impl fmt::Display for OverlappingPortsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation `{}` declares names in both inputs and outputs: {:?}",
            self.name, self.overlapping
        )
    }
}

impl std::error::Error for OverlappingPortsError {}

type OperationFn = dyn Fn(&[Value], &AttrMap) -> Result<Vec<Value>, OperationError> + Send + Sync;

/// An immutable declaration of a pure function over named data slots.
///
/// Cloning an `Operation` is cheap: the function is stored behind an
/// [`Arc`].
#[derive(Clone)]
pub struct Operation {
    pub identifier: Identifier,
    inputs: Vec<PortSpec>,
    outputs: Vec<String>,
    function: Arc<OperationFn>,
    attrs: AttrMap,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<PortSpec>,
        outputs: Vec<String>,
        function: impl Fn(&[Value], &AttrMap) -> Result<Vec<Value>, OperationError>
            + Send
            + Sync
            + 'static,
    ) -> Result<Self, OverlappingPortsError> {
        Self::with_attrs(name, inputs, outputs, function, AttrMap::default())
    }

    pub fn with_attrs(
        name: impl Into<String>,
        inputs: Vec<PortSpec>,
        outputs: Vec<String>,
        function: impl Fn(&[Value], &AttrMap) -> Result<Vec<Value>, OperationError>
            + Send
            + Sync
            + 'static,
        attrs: AttrMap,
    ) -> Result<Self, OverlappingPortsError> {
        let name = name.into();

        let overlapping: Vec<String> = inputs
            .iter()
            .map(|p| &p.name)
            .filter(|n| outputs.contains(n))
            .cloned()
            .collect();

        if !overlapping.is_empty() {
            return Err(OverlappingPortsError { name, overlapping });
        }

        Ok(Self {
            identifier: Identifier::new(name, None),
            inputs,
            outputs,
            function: Arc::new(function),
            attrs,
        })
    }

    /// Override the randomly generated uid, e.g. when a caller supplies
    /// its own stable identifier.
    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.identifier.uid = uid;
        self
    }

    pub fn name(&self) -> &str {
        &self.identifier.name
    }

    pub fn uid(&self) -> Uid {
        self.identifier.uid
    }

    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn attrs(&self) -> &AttrMap {
        &self.attrs
    }

    /// Evaluate the operation against a snapshot of available values.
    ///
    /// Positional arguments are the non-optional inputs, in declared
    /// order. Optional inputs are passed alongside `attrs` as keyword
    /// arguments only when present in `value_map`; if that combined
    /// keyword set is empty the function is still called with zero
    /// keyword arguments (mirroring the distinction the source makes
    /// between calling `fn(*args)` and `fn(*args, **kwargs)`, observable
    /// when `function` rejects unknown keyword arguments).
    ///
    /// On error the result is an empty map; the caller decides how loud
    /// to log based on the [`OperationError`] variant.
    pub fn compute(
        &self,
        value_map: &ValueMap,
        selected_outputs: Option<&[String]>,
    ) -> Result<ValueMap, OperationError> {
        let mut positional = Vec::with_capacity(self.inputs.len());
        for port in &self.inputs {
            if port.optional {
                continue;
            }
            match value_map.get(&port.name) {
                Some(v) => positional.push(v.clone()),
                None => {
                    return Err(OperationError::Value(format!(
                        "missing required input `{}` for operation `{}`",
                        port.name,
                        self.name()
                    )))
                }
            }
        }

        let mut kwargs = self.attrs.clone();
        for port in &self.inputs {
            if port.optional {
                if let Some(v) = value_map.get(&port.name) {
                    kwargs.insert(port.name.clone(), v.clone());
                }
            }
        }

        // `function` always returns one value per declared output; for the
        // common single-output case authors return `vec![value]` (the
        // source's analogous step is wrapping a bare scalar return into a
        // one-element list before zipping it with `outputs`).
        let result = (self.function)(&positional, &kwargs)?;

        if result.len() != self.outputs.len() {
            return Err(OperationError::Other(format!(
                "operation `{}` declares {} outputs but its function returned {} values",
                self.name(),
                self.outputs.len(),
                result.len()
            )));
        }

        let mut out = ValueMap::default();
        for (name, value) in self.outputs.iter().zip(result.into_iter()) {
            if let Some(selected) = selected_outputs {
                if !selected.iter().any(|s| s == name) {
                    continue;
                }
            }
            out.insert(name.clone(), value);
        }
        Ok(out)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name())
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
