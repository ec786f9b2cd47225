//! Captured Execution Graphs
//!
//! Read-only inspection of a graph produced by stream capture: enumerate
//! nodes, pick out kernel launches, and expose each launch's function handle
//! and staged argument slots through the [`LaunchNode`] interface the
//! annotator consumes.
//!
//! Node enumeration order is whatever `cuGraphGetNodes` returns - it is
//! stable for one call but implementation-defined and not an execution
//! order.

use std::ffi::{c_void, CStr};
use std::marker::PhantomData;
use std::ptr;

use super::context::get_driver;
use super::sys::{
    CUfunction, CUgraph, CUgraphNode, CUgraphNodeType, CudaDriver, CudaKernelNodeParams,
    CUDA_SUCCESS, CU_GRAPH_NODE_TYPE_KERNEL,
};
use crate::annotate::LaunchNode;
use crate::error::{InspectError, Result};

/// Kernel parameter space is capped at 4 KiB, so a function can declare at
/// most 1024 parameters; bound the introspection probe accordingly.
const MAX_PARAMS: usize = 1024;

// ============================================================================
// CUDA Graph
// ============================================================================

/// Captured execution graph with RAII cleanup
///
/// Owns the `CUgraph` handle; destroyed on drop. All node views borrow from
/// the graph, so they cannot outlive it.
pub struct CudaGraph {
    /// Graph handle
    graph: CUgraph,
}

// SAFETY: graph queries are read-only and the handle is owned
unsafe impl Send for CudaGraph {}
unsafe impl Sync for CudaGraph {}

impl CudaGraph {
    /// Wrap a raw graph handle produced by stream capture
    pub(crate) fn from_raw(graph: CUgraph) -> Self {
        Self { graph }
    }

    /// Raw node handles, in the facility's enumeration order
    fn raw_nodes(&self) -> Result<Vec<CUgraphNode>> {
        let driver = get_driver()?;

        // Two-call pattern: query the count, then fill.
        let mut count: usize = 0;
        // SAFETY: null nodes pointer with a valid count pointer queries the count
        let result = unsafe { (driver.cuGraphGetNodes)(self.graph, ptr::null_mut(), &mut count) };
        CudaDriver::check(result)?;

        let mut nodes: Vec<CUgraphNode> = vec![ptr::null_mut(); count];
        // SAFETY: nodes has capacity for `count` handles
        let result = unsafe { (driver.cuGraphGetNodes)(self.graph, nodes.as_mut_ptr(), &mut count) };
        CudaDriver::check(result)?;
        nodes.truncate(count);

        Ok(nodes)
    }

    /// Number of nodes of any kind in the graph
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::CudaDriver)` if the query fails.
    pub fn node_count(&self) -> Result<usize> {
        Ok(self.raw_nodes()?.len())
    }

    /// Kernel-launch views over the graph's kernel nodes
    ///
    /// Each view records its ordinal in the full node enumeration (memcpy
    /// and other node kinds keep their slots in the numbering but are not
    /// inspected).
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::CudaDriver)` if any node query fails.
    pub fn kernel_launches(&self) -> Result<Vec<KernelLaunch<'_>>> {
        let driver = get_driver()?;
        let mut launches = Vec::new();

        for (ordinal, node) in self.raw_nodes()?.into_iter().enumerate() {
            let mut node_type: CUgraphNodeType = -1;
            // SAFETY: node handle comes from cuGraphGetNodes on a live graph
            let result = unsafe { (driver.cuGraphNodeGetType)(node, &mut node_type) };
            CudaDriver::check(result)?;
            if node_type != CU_GRAPH_NODE_TYPE_KERNEL {
                continue;
            }

            let mut params = CudaKernelNodeParams::zeroed();
            // SAFETY: node is a kernel node per the type check above
            let result = unsafe { (driver.cuGraphKernelNodeGetParams)(node, &mut params) };
            CudaDriver::check(result)?;

            let param_sizes = probe_param_sizes(driver, params.func);
            launches.push(KernelLaunch {
                ordinal,
                params,
                param_sizes,
                _graph: PhantomData,
            });
        }

        Ok(launches)
    }
}

impl Drop for CudaGraph {
    fn drop(&mut self) {
        if let Ok(driver) = get_driver() {
            // SAFETY: graph is valid from capture
            unsafe {
                let _ = (driver.cuGraphDestroy)(self.graph);
            }
        }
    }
}

/// Declared size of every parameter of `func`, probed via
/// `cuFuncGetParamInfo` until the driver reports the index out of range.
fn probe_param_sizes(driver: &CudaDriver, func: CUfunction) -> Vec<usize> {
    let mut sizes = Vec::new();
    for index in 0..MAX_PARAMS {
        let mut offset: usize = 0;
        let mut size: usize = 0;
        // SAFETY: out-pointers are valid; an out-of-range index is reported
        // as an error, not undefined behavior
        let result = unsafe { (driver.cuFuncGetParamInfo)(func, index, &mut offset, &mut size) };
        if result != CUDA_SUCCESS {
            break;
        }
        sizes.push(size);
    }
    sizes
}

// ============================================================================
// Kernel Launch View
// ============================================================================

/// One kernel-launch node of a captured graph
///
/// Borrows from the graph: the staged `kernel_params` array the view reads
/// is owned by the graph and freed with it.
///
/// The argument *pointees* read during annotation must be host-accessible
/// (managed or host-registered memory); a graph whose pointer arguments
/// reference device-only allocations cannot be value-annotated.
pub struct KernelLaunch<'g> {
    /// Position in the full node enumeration
    ordinal: usize,
    /// Staged launch parameters
    params: CudaKernelNodeParams,
    /// Declared parameter sizes, probed at construction
    param_sizes: Vec<usize>,
    _graph: PhantomData<&'g CudaGraph>,
}

impl KernelLaunch<'_> {
    /// Position of this launch in the graph's node enumeration
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Grid dimensions of the recorded launch
    #[must_use]
    pub fn grid(&self) -> (u32, u32, u32) {
        (
            self.params.grid_dim_x,
            self.params.grid_dim_y,
            self.params.grid_dim_z,
        )
    }

    /// Block dimensions of the recorded launch
    #[must_use]
    pub fn block(&self) -> (u32, u32, u32) {
        (
            self.params.block_dim_x,
            self.params.block_dim_y,
            self.params.block_dim_z,
        )
    }
}

// SAFETY: the slots returned point into the graph-owned kernel_params array,
// which lives for 'g; sizes come from driver introspection of the launched
// function, so a pointer-sized slot holds the staged copy of a pointer
// argument.
unsafe impl LaunchNode for KernelLaunch<'_> {
    fn function_name(&self) -> Result<String> {
        let driver = get_driver()?;

        let mut name: *const std::os::raw::c_char = ptr::null();
        // SAFETY: func comes from the node's launch parameters; the returned
        // string is owned by the driver and outlives the module
        let result = unsafe { (driver.cuFuncGetName)(&mut name, self.params.func) };
        CudaDriver::check(result)?;
        if name.is_null() {
            return Err(InspectError::FunctionNotFound(
                "kernel node function has no name".to_string(),
            ));
        }

        // SAFETY: non-null, null-terminated per the driver API
        Ok(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }

    fn param_count(&self) -> usize {
        self.param_sizes.len()
    }

    fn arg_size(&self, index: usize) -> Option<usize> {
        self.param_sizes.get(index).copied()
    }

    fn arg_slot(&self, index: usize) -> Option<*const c_void> {
        if index >= self.param_sizes.len() || self.params.kernel_params.is_null() {
            return None;
        }
        // SAFETY: kernel_params holds one slot per declared parameter and
        // index is validated against the declared count above
        let slot = unsafe { *self.params.kernel_params.add(index) };
        Some(slot.cast_const())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_params_matches_hardware_limit() {
        // 4 KiB parameter space / 4-byte minimum parameter size
        assert_eq!(MAX_PARAMS, 1024);
    }

    #[test]
    #[cfg(not(feature = "cuda"))]
    fn test_graph_queries_require_driver() {
        let graph = CudaGraph::from_raw(std::ptr::null_mut());
        assert!(graph.node_count().is_err());
        assert!(graph.kernel_launches().is_err());
    }
}
