//! Minimal CUDA Driver API FFI Bindings
//!
//! Hand-written FFI for the driver functions graph inspection actually
//! needs: context/module/stream setup, stream capture, graph queries, and
//! function introspection. Dynamic loading via libcuda.so/nvcuda.dll keeps
//! the crate free of link-time CUDA dependencies.
//!
//! # Safety
//!
//! All functions in this module are unsafe. Safe wrappers are provided in
//! sibling modules (context.rs, module.rs, stream.rs, graph.rs, memory.rs).

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

use crate::error::InspectError;

// ============================================================================
// CUDA Type Definitions (from cuda.h)
// ============================================================================

/// CUDA error code
pub type CUresult = c_int;

/// CUDA device handle
pub type CUdevice = c_int;

/// CUDA context handle (opaque pointer)
pub type CUcontext = *mut c_void;

/// CUDA module handle (opaque pointer)
pub type CUmodule = *mut c_void;

/// CUDA function handle (opaque pointer)
pub type CUfunction = *mut c_void;

/// CUDA stream handle (opaque pointer)
pub type CUstream = *mut c_void;

/// CUDA execution graph handle (opaque pointer)
pub type CUgraph = *mut c_void;

/// CUDA graph node handle (opaque pointer)
pub type CUgraphNode = *mut c_void;

/// CUDA graph node type discriminant
pub type CUgraphNodeType = c_int;

/// CUDA stream capture mode
pub type CUstreamCaptureMode = c_int;

/// CUDA device pointer (GPU memory address)
pub type CUdeviceptr = u64;

/// Kernel node parameters (`CUDA_KERNEL_NODE_PARAMS_v1` layout from cuda.h)
///
/// `kernel_params` is the graph's staged copy of the launch arguments: an
/// array of `num-params` pointers, each addressing the storage of one
/// argument value.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CudaKernelNodeParams {
    /// Function launched by the node
    pub func: CUfunction,
    /// Grid width
    pub grid_dim_x: c_uint,
    /// Grid height
    pub grid_dim_y: c_uint,
    /// Grid depth
    pub grid_dim_z: c_uint,
    /// Block width
    pub block_dim_x: c_uint,
    /// Block height
    pub block_dim_y: c_uint,
    /// Block depth
    pub block_dim_z: c_uint,
    /// Dynamic shared memory per block (bytes)
    pub shared_mem_bytes: c_uint,
    /// Array of pointers to the staged argument values
    pub kernel_params: *mut *mut c_void,
    /// Alternative packed-argument mechanism (unused here)
    pub extra: *mut *mut c_void,
}

impl CudaKernelNodeParams {
    /// Zeroed parameter block for the driver to fill in.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            func: std::ptr::null_mut(),
            grid_dim_x: 0,
            grid_dim_y: 0,
            grid_dim_z: 0,
            block_dim_x: 0,
            block_dim_y: 0,
            block_dim_z: 0,
            shared_mem_bytes: 0,
            kernel_params: std::ptr::null_mut(),
            extra: std::ptr::null_mut(),
        }
    }
}

// ============================================================================
// CUDA Constants (subset we handle)
// ============================================================================

/// CUDA success
pub const CUDA_SUCCESS: CUresult = 0;
/// Invalid value passed
pub const CUDA_ERROR_INVALID_VALUE: CUresult = 1;
/// Out of memory
pub const CUDA_ERROR_OUT_OF_MEMORY: CUresult = 2;
/// CUDA not initialized
pub const CUDA_ERROR_NOT_INITIALIZED: CUresult = 3;
/// CUDA deinitialized
pub const CUDA_ERROR_DEINITIALIZED: CUresult = 4;
/// No CUDA device
pub const CUDA_ERROR_NO_DEVICE: CUresult = 100;
/// Invalid device
pub const CUDA_ERROR_INVALID_DEVICE: CUresult = 101;
/// Invalid PTX
pub const CUDA_ERROR_INVALID_PTX: CUresult = 218;
/// Function not found
pub const CUDA_ERROR_NOT_FOUND: CUresult = 500;
/// Operation illegal in the current stream capture state
pub const CUDA_ERROR_STREAM_CAPTURE_INVALIDATED: CUresult = 901;

/// Default stream creation flag
pub const CU_STREAM_DEFAULT: c_uint = 0;
/// Non-blocking stream (doesn't synchronize with stream 0)
pub const CU_STREAM_NON_BLOCKING: c_uint = 1;

/// Capture mode: potentially unsafe API calls fail anywhere in the process
pub const CU_STREAM_CAPTURE_MODE_GLOBAL: CUstreamCaptureMode = 0;

/// Graph node type: kernel launch
pub const CU_GRAPH_NODE_TYPE_KERNEL: CUgraphNodeType = 0;
/// Graph node type: memcpy
pub const CU_GRAPH_NODE_TYPE_MEMCPY: CUgraphNodeType = 1;
/// Graph node type: memset
pub const CU_GRAPH_NODE_TYPE_MEMSET: CUgraphNodeType = 2;

/// Managed allocation visible to the whole system
pub const CU_MEM_ATTACH_GLOBAL: c_uint = 1;

// ============================================================================
// CUDA Driver Function Pointers
// ============================================================================

/// Dynamically loaded CUDA driver functions
///
/// All function pointers are loaded at runtime from libcuda.so (Linux)
/// or nvcuda.dll (Windows). This avoids link-time dependency on CUDA.
#[allow(non_snake_case)]
pub struct CudaDriver {
    // Initialization and device management
    /// cuInit - Initialize the CUDA driver
    pub cuInit: unsafe extern "C" fn(flags: c_uint) -> CUresult,
    /// cuDeviceGetCount - Get number of CUDA devices
    pub cuDeviceGetCount: unsafe extern "C" fn(count: *mut c_int) -> CUresult,
    /// cuDeviceGet - Get device handle by ordinal
    pub cuDeviceGet: unsafe extern "C" fn(device: *mut CUdevice, ordinal: c_int) -> CUresult,
    /// cuDeviceGetName - Get device name
    pub cuDeviceGetName:
        unsafe extern "C" fn(name: *mut c_char, len: c_int, device: CUdevice) -> CUresult,

    // Context management (Primary Context API)
    /// cuDevicePrimaryCtxRetain - Retain primary context
    pub cuDevicePrimaryCtxRetain:
        unsafe extern "C" fn(ctx: *mut CUcontext, device: CUdevice) -> CUresult,
    /// cuDevicePrimaryCtxRelease - Release primary context
    pub cuDevicePrimaryCtxRelease: unsafe extern "C" fn(device: CUdevice) -> CUresult,
    /// cuCtxSetCurrent - Set current context
    pub cuCtxSetCurrent: unsafe extern "C" fn(ctx: CUcontext) -> CUresult,
    /// cuCtxSynchronize - Synchronize current context
    pub cuCtxSynchronize: unsafe extern "C" fn() -> CUresult,

    // Module management
    /// cuModuleLoadData - Load module from PTX/cubin data
    pub cuModuleLoadData:
        unsafe extern "C" fn(module: *mut CUmodule, image: *const c_void) -> CUresult,
    /// cuModuleUnload - Unload module
    pub cuModuleUnload: unsafe extern "C" fn(module: CUmodule) -> CUresult,
    /// cuModuleGetFunction - Get function from module
    pub cuModuleGetFunction: unsafe extern "C" fn(
        func: *mut CUfunction,
        module: CUmodule,
        name: *const c_char,
    ) -> CUresult,

    // Function introspection
    /// cuFuncGetName - Resolve a function handle to its display name
    pub cuFuncGetName:
        unsafe extern "C" fn(name: *mut *const c_char, func: CUfunction) -> CUresult,
    /// cuFuncGetParamInfo - Offset and size of one declared parameter
    pub cuFuncGetParamInfo: unsafe extern "C" fn(
        func: CUfunction,
        param_index: usize,
        param_offset: *mut usize,
        param_size: *mut usize,
    ) -> CUresult,

    // Memory management
    /// cuMemAllocManaged - Allocate unified memory (host- and device-visible)
    pub cuMemAllocManaged:
        unsafe extern "C" fn(ptr: *mut CUdeviceptr, size: usize, flags: c_uint) -> CUresult,
    /// cuMemFree - Free device memory
    pub cuMemFree: unsafe extern "C" fn(ptr: CUdeviceptr) -> CUresult,

    // Stream management and capture
    /// cuStreamCreate - Create a stream
    pub cuStreamCreate: unsafe extern "C" fn(stream: *mut CUstream, flags: c_uint) -> CUresult,
    /// cuStreamDestroy - Destroy a stream
    pub cuStreamDestroy: unsafe extern "C" fn(stream: CUstream) -> CUresult,
    /// cuStreamSynchronize - Synchronize a stream
    pub cuStreamSynchronize: unsafe extern "C" fn(stream: CUstream) -> CUresult,
    /// cuStreamBeginCapture - Start recording stream work into a graph
    pub cuStreamBeginCapture:
        unsafe extern "C" fn(stream: CUstream, mode: CUstreamCaptureMode) -> CUresult,
    /// cuStreamEndCapture - Finish recording and return the captured graph
    pub cuStreamEndCapture:
        unsafe extern "C" fn(stream: CUstream, graph: *mut CUgraph) -> CUresult,

    // Kernel launch
    /// cuLaunchKernel - Launch a kernel
    #[allow(clippy::type_complexity)]
    pub cuLaunchKernel: unsafe extern "C" fn(
        func: CUfunction,
        grid_dim_x: c_uint,
        grid_dim_y: c_uint,
        grid_dim_z: c_uint,
        block_dim_x: c_uint,
        block_dim_y: c_uint,
        block_dim_z: c_uint,
        shared_mem_bytes: c_uint,
        stream: CUstream,
        kernel_params: *mut *mut c_void,
        extra: *mut *mut c_void,
    ) -> CUresult,

    // Graph queries
    /// cuGraphGetNodes - Enumerate a graph's nodes (two-call pattern)
    pub cuGraphGetNodes: unsafe extern "C" fn(
        graph: CUgraph,
        nodes: *mut CUgraphNode,
        num_nodes: *mut usize,
    ) -> CUresult,
    /// cuGraphNodeGetType - Discriminate node kinds
    pub cuGraphNodeGetType:
        unsafe extern "C" fn(node: CUgraphNode, node_type: *mut CUgraphNodeType) -> CUresult,
    /// cuGraphKernelNodeGetParams - Launch parameters of a kernel node
    pub cuGraphKernelNodeGetParams:
        unsafe extern "C" fn(node: CUgraphNode, params: *mut CudaKernelNodeParams) -> CUresult,
    /// cuGraphDestroy - Destroy a graph
    pub cuGraphDestroy: unsafe extern "C" fn(graph: CUgraph) -> CUresult,
}

// ============================================================================
// Dynamic Loading
// ============================================================================

#[cfg(feature = "cuda")]
mod loading {
    use super::*;
    use libloading::{Library, Symbol};
    use std::sync::OnceLock;

    /// Global driver instance (loaded once)
    static DRIVER: OnceLock<Option<CudaDriver>> = OnceLock::new();

    /// Library handle (must outlive function pointers)
    static LIBRARY: OnceLock<Option<Library>> = OnceLock::new();

    impl CudaDriver {
        /// Load CUDA driver dynamically
        ///
        /// Returns `None` if CUDA is not available (no driver installed).
        /// This is NOT an error - it's expected on systems without NVIDIA
        /// GPUs, and the inspector then runs in parse-only mode.
        #[must_use]
        pub fn load() -> Option<&'static Self> {
            let _ = LIBRARY.get_or_init(|| {
                #[cfg(target_os = "linux")]
                let lib_names = ["libcuda.so.1", "libcuda.so"];
                #[cfg(target_os = "windows")]
                let lib_names = ["nvcuda.dll"];
                #[cfg(target_os = "macos")]
                let lib_names: [&str; 0] = []; // No CUDA on macOS

                for name in lib_names {
                    // SAFETY: We're loading a well-known system library
                    if let Ok(lib) = unsafe { Library::new(name) } {
                        return Some(lib);
                    }
                }
                None
            });

            DRIVER
                .get_or_init(|| {
                    let lib = LIBRARY.get()?.as_ref()?;
                    Self::load_from_library(lib)
                })
                .as_ref()
        }

        /// Load function pointers from library
        fn load_from_library(lib: &Library) -> Option<Self> {
            // SAFETY: All symbols are standard CUDA driver API functions
            unsafe {
                // Helper macro to load symbols with explicit type
                macro_rules! load_sym {
                    ($name:ident, $ty:ty) => {{
                        let sym: Symbol<'_, $ty> = lib.get(stringify!($name).as_bytes()).ok()?;
                        *sym
                    }};
                }

                type FnInit = unsafe extern "C" fn(c_uint) -> CUresult;
                type FnDeviceGetCount = unsafe extern "C" fn(*mut c_int) -> CUresult;
                type FnDeviceGet = unsafe extern "C" fn(*mut CUdevice, c_int) -> CUresult;
                type FnDeviceGetName =
                    unsafe extern "C" fn(*mut c_char, c_int, CUdevice) -> CUresult;
                type FnPrimaryCtxRetain =
                    unsafe extern "C" fn(*mut CUcontext, CUdevice) -> CUresult;
                type FnPrimaryCtxRelease = unsafe extern "C" fn(CUdevice) -> CUresult;
                type FnCtxSetCurrent = unsafe extern "C" fn(CUcontext) -> CUresult;
                type FnCtxSync = unsafe extern "C" fn() -> CUresult;
                type FnModuleLoadData =
                    unsafe extern "C" fn(*mut CUmodule, *const c_void) -> CUresult;
                type FnModuleUnload = unsafe extern "C" fn(CUmodule) -> CUresult;
                type FnModuleGetFunction =
                    unsafe extern "C" fn(*mut CUfunction, CUmodule, *const c_char) -> CUresult;
                type FnFuncGetName =
                    unsafe extern "C" fn(*mut *const c_char, CUfunction) -> CUresult;
                type FnFuncGetParamInfo =
                    unsafe extern "C" fn(CUfunction, usize, *mut usize, *mut usize) -> CUresult;
                type FnMemAllocManaged =
                    unsafe extern "C" fn(*mut CUdeviceptr, usize, c_uint) -> CUresult;
                type FnMemFree = unsafe extern "C" fn(CUdeviceptr) -> CUresult;
                type FnStreamCreate = unsafe extern "C" fn(*mut CUstream, c_uint) -> CUresult;
                type FnStreamDestroy = unsafe extern "C" fn(CUstream) -> CUresult;
                type FnStreamSync = unsafe extern "C" fn(CUstream) -> CUresult;
                type FnStreamBeginCapture =
                    unsafe extern "C" fn(CUstream, CUstreamCaptureMode) -> CUresult;
                type FnStreamEndCapture = unsafe extern "C" fn(CUstream, *mut CUgraph) -> CUresult;
                type FnLaunchKernel = unsafe extern "C" fn(
                    CUfunction,
                    c_uint,
                    c_uint,
                    c_uint,
                    c_uint,
                    c_uint,
                    c_uint,
                    c_uint,
                    CUstream,
                    *mut *mut c_void,
                    *mut *mut c_void,
                ) -> CUresult;
                type FnGraphGetNodes =
                    unsafe extern "C" fn(CUgraph, *mut CUgraphNode, *mut usize) -> CUresult;
                type FnGraphNodeGetType =
                    unsafe extern "C" fn(CUgraphNode, *mut CUgraphNodeType) -> CUresult;
                type FnGraphKernelNodeGetParams =
                    unsafe extern "C" fn(CUgraphNode, *mut CudaKernelNodeParams) -> CUresult;
                type FnGraphDestroy = unsafe extern "C" fn(CUgraph) -> CUresult;

                Some(CudaDriver {
                    cuInit: load_sym!(cuInit, FnInit),
                    cuDeviceGetCount: load_sym!(cuDeviceGetCount, FnDeviceGetCount),
                    cuDeviceGet: load_sym!(cuDeviceGet, FnDeviceGet),
                    cuDeviceGetName: load_sym!(cuDeviceGetName, FnDeviceGetName),
                    cuDevicePrimaryCtxRetain: load_sym!(
                        cuDevicePrimaryCtxRetain,
                        FnPrimaryCtxRetain
                    ),
                    cuDevicePrimaryCtxRelease: load_sym!(
                        cuDevicePrimaryCtxRelease_v2,
                        FnPrimaryCtxRelease
                    ),
                    cuCtxSetCurrent: load_sym!(cuCtxSetCurrent, FnCtxSetCurrent),
                    cuCtxSynchronize: load_sym!(cuCtxSynchronize, FnCtxSync),
                    cuModuleLoadData: load_sym!(cuModuleLoadData, FnModuleLoadData),
                    cuModuleUnload: load_sym!(cuModuleUnload, FnModuleUnload),
                    cuModuleGetFunction: load_sym!(cuModuleGetFunction, FnModuleGetFunction),
                    cuFuncGetName: load_sym!(cuFuncGetName, FnFuncGetName),
                    cuFuncGetParamInfo: load_sym!(cuFuncGetParamInfo, FnFuncGetParamInfo),
                    cuMemAllocManaged: load_sym!(cuMemAllocManaged, FnMemAllocManaged),
                    cuMemFree: load_sym!(cuMemFree_v2, FnMemFree),
                    cuStreamCreate: load_sym!(cuStreamCreate, FnStreamCreate),
                    cuStreamDestroy: load_sym!(cuStreamDestroy_v2, FnStreamDestroy),
                    cuStreamSynchronize: load_sym!(cuStreamSynchronize, FnStreamSync),
                    cuStreamBeginCapture: load_sym!(cuStreamBeginCapture_v2, FnStreamBeginCapture),
                    cuStreamEndCapture: load_sym!(cuStreamEndCapture, FnStreamEndCapture),
                    cuLaunchKernel: load_sym!(cuLaunchKernel, FnLaunchKernel),
                    cuGraphGetNodes: load_sym!(cuGraphGetNodes, FnGraphGetNodes),
                    cuGraphNodeGetType: load_sym!(cuGraphNodeGetType, FnGraphNodeGetType),
                    cuGraphKernelNodeGetParams: load_sym!(
                        cuGraphKernelNodeGetParams,
                        FnGraphKernelNodeGetParams
                    ),
                    cuGraphDestroy: load_sym!(cuGraphDestroy, FnGraphDestroy),
                })
            }
        }

        /// Check CUDA result and convert to InspectError
        ///
        /// # Errors
        ///
        /// Returns `Err(InspectError::CudaDriver)` if result is not
        /// CUDA_SUCCESS.
        pub fn check(result: CUresult) -> Result<(), InspectError> {
            if result == CUDA_SUCCESS {
                Ok(())
            } else {
                Err(InspectError::CudaDriver(
                    cuda_error_string(result).to_string(),
                    result,
                ))
            }
        }
    }
}

#[cfg(not(feature = "cuda"))]
mod loading {
    use super::*;

    impl CudaDriver {
        /// CUDA not available without feature
        #[must_use]
        pub fn load() -> Option<&'static Self> {
            None
        }

        /// Check is a no-op without CUDA
        pub fn check(_result: CUresult) -> Result<(), InspectError> {
            Err(InspectError::CudaNotAvailable(
                "cuda feature not enabled".to_string(),
            ))
        }
    }
}

// ============================================================================
// Error String Conversion
// ============================================================================

/// Convert CUDA error code to human-readable string
#[must_use]
pub fn cuda_error_string(code: CUresult) -> &'static str {
    match code {
        CUDA_SUCCESS => "CUDA_SUCCESS",
        CUDA_ERROR_INVALID_VALUE => "CUDA_ERROR_INVALID_VALUE",
        CUDA_ERROR_OUT_OF_MEMORY => "CUDA_ERROR_OUT_OF_MEMORY",
        CUDA_ERROR_NOT_INITIALIZED => "CUDA_ERROR_NOT_INITIALIZED",
        CUDA_ERROR_DEINITIALIZED => "CUDA_ERROR_DEINITIALIZED",
        CUDA_ERROR_NO_DEVICE => "CUDA_ERROR_NO_DEVICE",
        CUDA_ERROR_INVALID_DEVICE => "CUDA_ERROR_INVALID_DEVICE",
        CUDA_ERROR_INVALID_PTX => "CUDA_ERROR_INVALID_PTX",
        CUDA_ERROR_NOT_FOUND => "CUDA_ERROR_NOT_FOUND",
        CUDA_ERROR_STREAM_CAPTURE_INVALIDATED => "CUDA_ERROR_STREAM_CAPTURE_INVALIDATED",
        _ => "CUDA_ERROR_UNKNOWN",
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// cuda_error_string never panics for any i32
        #[test]
        fn prop_error_string_never_panics(code in any::<i32>()) {
            let _ = cuda_error_string(code);
        }

        /// cuda_error_string returns valid string for all inputs
        #[test]
        fn prop_error_string_valid(code in any::<i32>()) {
            let result = cuda_error_string(code);
            prop_assert!(!result.is_empty());
            prop_assert!(result.starts_with("CUDA_"));
        }
    }
}
