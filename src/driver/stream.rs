//! CUDA Stream Management and Capture
//!
//! Commands submitted to a stream execute in order. For inspection we never
//! execute the stream's work at all: capture mode records every launch into
//! an execution graph instead, which is what the annotator walks.

use std::ffi::c_void;
use std::ptr;

use super::context::{get_driver, CudaContext};
use super::graph::CudaGraph;
use super::module::CudaModule;
use super::sys::{
    CUgraph, CUstream, CudaDriver, CU_STREAM_CAPTURE_MODE_GLOBAL, CU_STREAM_NON_BLOCKING,
};
use super::types::LaunchConfig;
use crate::error::InspectError;

// ============================================================================
// CUDA Stream
// ============================================================================

/// CUDA execution stream
///
/// Created non-blocking (does not synchronize with stream 0). Automatically
/// destroyed when dropped; must not outlive its context.
pub struct CudaStream {
    /// Stream handle
    stream: CUstream,
}

// SAFETY: CUstream handles are thread-safe
unsafe impl Send for CudaStream {}
unsafe impl Sync for CudaStream {}

impl CudaStream {
    /// Create a new CUDA stream
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::StreamCreate)` if stream creation fails.
    pub fn new(_ctx: &CudaContext) -> Result<Self, InspectError> {
        let driver = get_driver()?;

        let mut stream: CUstream = ptr::null_mut();
        // SAFETY: stream pointer is valid
        let result = unsafe { (driver.cuStreamCreate)(&mut stream, CU_STREAM_NON_BLOCKING) };
        CudaDriver::check(result).map_err(|e| InspectError::StreamCreate(e.to_string()))?;

        Ok(Self { stream })
    }

    /// Get raw stream handle
    ///
    /// # Safety
    ///
    /// The returned handle is only valid while this `CudaStream` is alive.
    #[must_use]
    pub fn raw(&self) -> CUstream {
        self.stream
    }

    /// Synchronize this stream
    ///
    /// Blocks until all commands in this stream have completed.
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::StreamSync)` if synchronization fails.
    pub fn synchronize(&self) -> Result<(), InspectError> {
        let driver = get_driver()?;

        // SAFETY: stream is valid from constructor
        let result = unsafe { (driver.cuStreamSynchronize)(self.stream) };
        CudaDriver::check(result).map_err(|e| InspectError::StreamSync(e.to_string()))
    }

    /// Begin recording this stream's work into a graph
    ///
    /// Launches between `begin_capture` and [`end_capture`](Self::end_capture)
    /// are recorded, not executed.
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::StreamCapture)` if the stream is already
    /// capturing or capture cannot start.
    pub fn begin_capture(&self) -> Result<(), InspectError> {
        let driver = get_driver()?;

        // SAFETY: stream is valid from constructor
        let result =
            unsafe { (driver.cuStreamBeginCapture)(self.stream, CU_STREAM_CAPTURE_MODE_GLOBAL) };
        CudaDriver::check(result).map_err(|e| InspectError::StreamCapture(e.to_string()))
    }

    /// Finish recording and return the captured graph
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::StreamCapture)` if the stream was not
    /// capturing or the capture was invalidated.
    pub fn end_capture(&self) -> Result<CudaGraph, InspectError> {
        let driver = get_driver()?;

        let mut graph: CUgraph = ptr::null_mut();
        // SAFETY: stream is valid, graph pointer is valid
        let result = unsafe { (driver.cuStreamEndCapture)(self.stream, &mut graph) };
        CudaDriver::check(result).map_err(|e| InspectError::StreamCapture(e.to_string()))?;

        if graph.is_null() {
            return Err(InspectError::StreamCapture(
                "capture produced no graph".to_string(),
            ));
        }
        Ok(CudaGraph::from_raw(graph))
    }

    /// Launch a kernel on this stream
    ///
    /// While the stream is capturing, the launch is recorded into the graph
    /// instead of executing.
    ///
    /// # Arguments
    ///
    /// * `module` - Module containing the kernel
    /// * `func_name` - Name of the kernel function
    /// * `config` - Launch configuration (grid, block, shared memory)
    /// * `args` - Kernel arguments as raw pointers
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `args` contains valid pointers to kernel arguments
    /// - Arguments match the kernel signature
    /// - Device pointers in args are valid
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::KernelLaunch)` if the launch fails.
    pub unsafe fn launch_kernel(
        &self,
        module: &mut CudaModule,
        func_name: &str,
        config: &LaunchConfig,
        args: &mut [*mut c_void],
    ) -> Result<(), InspectError> {
        let driver = get_driver()?;
        let func = module.get_function(func_name)?;

        // SAFETY: func is valid, args contains valid pointers (caller's
        // responsibility per this function's contract)
        let result = unsafe {
            (driver.cuLaunchKernel)(
                func,
                config.grid.0,
                config.grid.1,
                config.grid.2,
                config.block.0,
                config.block.1,
                config.block.2,
                config.shared_mem,
                self.stream,
                args.as_mut_ptr(),
                ptr::null_mut(), // extra (not used)
            )
        };

        CudaDriver::check(result).map_err(|e| InspectError::KernelLaunch(e.to_string()))
    }
}

impl Drop for CudaStream {
    fn drop(&mut self) {
        if let Ok(driver) = get_driver() {
            // SAFETY: stream is valid from constructor
            unsafe {
                let _ = (driver.cuStreamDestroy)(self.stream);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(feature = "cuda"))]
    fn test_stream_new_without_feature() {
        // No context can exist without the driver, so exercise the driver
        // lookup path directly.
        use super::super::context::get_driver;
        assert!(get_driver().is_err());
    }

    #[test]
    fn test_launch_config_default_block() {
        let config = LaunchConfig::default();
        assert_eq!(config.block.0, 256);
    }
}
