//! Graph node annotation.
//!
//! Correlates the parsed effect table with the live argument values of
//! captured kernel launches: for every node, the launched function's name is
//! resolved and looked up, and each reported pointer argument is read back
//! through a checked double dereference. The raw parameter slot holds the
//! address of a pointer-sized argument; the reported value is the 4-byte
//! integer that argument points at.
//!
//! Nodes are inspected in enumeration order, exactly as the graph facility
//! returned them. That order is implementation-defined and not stable across
//! captures; it is reported but never relied upon.

use std::ffi::c_void;
use std::fmt;
use std::mem;

use crate::error::{InspectError, Result};
use crate::report::ReportTable;

/// How annotation reacts to node-level failures.
///
/// One missing report entry should not necessarily invalidate inspection of
/// the remaining nodes, so the default records failures per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Abort the whole pass on the first node-level error.
    FailFast,
    /// Record the error in that node's report and continue.
    #[default]
    Collect,
}

/// One captured kernel launch, as the execution-graph facility exposes it.
///
/// The annotator needs exactly three things from a node: the resolved name
/// of the launched function, the declared shape of its parameter list, and
/// the raw argument-storage slots. Real nodes are backed by graph queries
/// ([`crate::driver::KernelLaunch`]); tests use synthetic nodes.
///
/// # Safety
///
/// Implementors guarantee, for the lifetime of any `&self` borrow:
/// - a slot address returned by [`arg_slot`](Self::arg_slot) is valid for a
///   pointer-sized read;
/// - when [`arg_size`](Self::arg_size) reports a pointer-sized slot, the
///   pointer stored in that slot is either null or valid for a 4-byte host
///   read (device-only memory behind an argument violates the contract).
pub unsafe trait LaunchNode {
    /// Resolved display name of the launched function.
    ///
    /// # Errors
    ///
    /// Returns a driver error when the runtime cannot resolve the name.
    fn function_name(&self) -> Result<String>;

    /// Number of declared parameter slots.
    fn param_count(&self) -> usize;

    /// Declared size in bytes of parameter `index`, `None` when out of range.
    fn arg_size(&self, index: usize) -> Option<usize>;

    /// Address of the staging slot holding parameter `index`.
    fn arg_slot(&self, index: usize) -> Option<*const c_void>;
}

/// Annotated value of one pointer argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgAnnotation {
    /// Parameter index from the report
    pub index: u32,
    /// Declared effect from the report (e.g. `ReadOnly`)
    pub effect: String,
    /// Observed pointee value, or why it could not be read
    pub value: Result<i32>,
}

/// Successful annotation of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotated {
    /// Overall memory-effect class from the report
    pub memory_effect: String,
    /// One entry per reported pointer argument, in report order
    pub args: Vec<ArgAnnotation>,
}

/// Annotation outcome for one graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReport {
    /// Position in the graph's node enumeration
    pub ordinal: usize,
    /// Resolved function name; `None` when resolution itself failed
    pub function: Option<String>,
    /// Per-argument annotations, or the node-level failure
    pub outcome: Result<Annotated>,
}

impl fmt::Display for NodeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function.as_deref().unwrap_or("<unresolved>");
        match &self.outcome {
            Ok(annotated) => {
                writeln!(
                    f,
                    "node {}: {} [{}]",
                    self.ordinal, name, annotated.memory_effect
                )?;
                for arg in &annotated.args {
                    match &arg.value {
                        Ok(value) => {
                            writeln!(f, "  arg {}: {} = {}", arg.index, arg.effect, value)?;
                        }
                        Err(err) => {
                            writeln!(f, "  arg {}: {} ! {}", arg.index, arg.effect, err)?;
                        }
                    }
                }
                Ok(())
            }
            Err(err) => writeln!(f, "node {}: {} ! {}", self.ordinal, name, err),
        }
    }
}

/// Annotate every node against the report table.
///
/// Produces one [`NodeReport`] per node in enumeration order. Under
/// [`ErrorPolicy::Collect`] node-level failures (unresolvable name, unknown
/// kernel) are recorded in that node's report; under
/// [`ErrorPolicy::FailFast`] the first such failure aborts the pass.
/// Argument-level failures are always isolated to the argument entry.
///
/// # Errors
///
/// Only fails under [`ErrorPolicy::FailFast`], with the first node's error.
pub fn annotate_nodes<N: LaunchNode>(
    nodes: &[N],
    table: &ReportTable,
    policy: ErrorPolicy,
) -> Result<Vec<NodeReport>> {
    let mut reports = Vec::with_capacity(nodes.len());
    for (ordinal, node) in nodes.iter().enumerate() {
        let report = annotate_node(ordinal, node, table);
        if policy == ErrorPolicy::FailFast {
            if let Err(err) = &report.outcome {
                return Err(err.clone());
            }
        }
        reports.push(report);
    }
    Ok(reports)
}

fn annotate_node<N: LaunchNode>(ordinal: usize, node: &N, table: &ReportTable) -> NodeReport {
    let function = match node.function_name() {
        Ok(name) => name,
        Err(err) => {
            return NodeReport {
                ordinal,
                function: None,
                outcome: Err(err),
            }
        }
    };

    let Some(info) = table.get(&function) else {
        let err = InspectError::UnknownKernel(function.clone());
        return NodeReport {
            ordinal,
            function: Some(function),
            outcome: Err(err),
        };
    };

    let args = info
        .ptr_args
        .iter()
        .map(|arg| ArgAnnotation {
            index: arg.index,
            effect: arg.effect.clone(),
            value: read_arg_value(node, arg.index),
        })
        .collect();

    NodeReport {
        ordinal,
        function: Some(function),
        outcome: Ok(Annotated {
            memory_effect: info.memory_effect.clone(),
            args,
        }),
    }
}

/// Checked double dereference of a pointer argument slot.
///
/// Validates the index against the declared parameter count and the slot's
/// declared size against the pointer width before touching memory, so a
/// report that disagrees with the running binary yields an error instead of
/// a wild read.
fn read_arg_value<N: LaunchNode>(node: &N, index: u32) -> Result<i32> {
    let slot_index = index as usize;
    let Some(size) = node.arg_size(slot_index) else {
        return Err(InspectError::ArgIndexOutOfRange {
            index,
            param_count: node.param_count(),
        });
    };
    if size != mem::size_of::<*const c_void>() {
        return Err(InspectError::ArgTypeMismatch { index, size });
    }
    let Some(slot) = node.arg_slot(slot_index) else {
        return Err(InspectError::ArgTypeMismatch { index, size });
    };

    // SAFETY: the index is in range and the slot is declared pointer-sized;
    // the LaunchNode contract guarantees the slot is readable and holds a
    // pointer that is null or valid for a 4-byte host read.
    let arg_ptr = unsafe { *slot.cast::<*const i32>() };
    if arg_ptr.is_null() {
        return Err(InspectError::NullPointerArg { index });
    }
    // SAFETY: non-null, host-readable per the LaunchNode contract.
    Ok(unsafe { *arg_ptr })
}
