//! PTX Module Loading
//!
//! Loads PTX source into GPU-executable modules. The PTX is JIT-compiled to
//! device assembly at load time, so the toy kernel needs no offline
//! compilation step.

use std::collections::HashMap;
use std::ffi::CString;
use std::ptr;

use super::context::{get_driver, CudaContext};
use super::sys::{CUfunction, CUmodule, CudaDriver};
use crate::error::InspectError;

// ============================================================================
// CUDA Module
// ============================================================================

/// Compiled CUDA module containing kernels
///
/// Caches function handles for efficient lookup. Automatically unloaded when
/// dropped.
pub struct CudaModule {
    /// Module handle
    module: CUmodule,
    /// Cached function handles
    functions: HashMap<String, CUfunction>,
}

// SAFETY: CUmodule handles are thread-safe for read-only operations
unsafe impl Send for CudaModule {}
unsafe impl Sync for CudaModule {}

impl CudaModule {
    /// Load PTX source and JIT compile to device code
    ///
    /// # Arguments
    ///
    /// * `_ctx` - CUDA context (must be current)
    /// * `ptx` - PTX assembly source code
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::ModuleLoad)` if the PTX is invalid or
    /// compilation fails.
    pub fn from_ptx(_ctx: &CudaContext, ptx: &str) -> Result<Self, InspectError> {
        let driver = get_driver()?;

        // Ensure PTX is null-terminated
        let ptx_cstring = CString::new(ptx)
            .map_err(|_| InspectError::ModuleLoad("PTX contains null bytes".to_string()))?;

        // SAFETY: ptx_cstring is valid null-terminated string
        let mut module: CUmodule = ptr::null_mut();
        let result =
            unsafe { (driver.cuModuleLoadData)(&mut module, ptx_cstring.as_ptr().cast()) };
        CudaDriver::check(result).map_err(|e| InspectError::ModuleLoad(e.to_string()))?;

        Ok(Self {
            module,
            functions: HashMap::new(),
        })
    }

    /// Get kernel function handle by name
    ///
    /// Function handles are cached for efficient repeated lookup.
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::FunctionNotFound)` if the function doesn't
    /// exist in the module.
    pub fn get_function(&mut self, name: &str) -> Result<CUfunction, InspectError> {
        // Check cache first
        if let Some(&func) = self.functions.get(name) {
            return Ok(func);
        }

        let driver = get_driver()?;
        let name_cstring =
            CString::new(name).map_err(|_| InspectError::FunctionNotFound(name.to_string()))?;

        // SAFETY: module is valid, name_cstring is null-terminated
        let mut func: CUfunction = ptr::null_mut();
        let result =
            unsafe { (driver.cuModuleGetFunction)(&mut func, self.module, name_cstring.as_ptr()) };
        CudaDriver::check(result).map_err(|_| InspectError::FunctionNotFound(name.to_string()))?;

        // Cache for future lookups
        self.functions.insert(name.to_string(), func);
        Ok(func)
    }

    /// Get raw module handle
    ///
    /// # Safety
    ///
    /// The returned handle is only valid while this `CudaModule` is alive.
    #[must_use]
    pub fn raw(&self) -> CUmodule {
        self.module
    }
}

impl Drop for CudaModule {
    fn drop(&mut self) {
        if let Ok(driver) = get_driver() {
            // SAFETY: module is valid from constructor
            unsafe {
                let _ = (driver.cuModuleUnload)(self.module);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #[test]
    #[cfg(not(feature = "cuda"))]
    fn test_module_requires_cuda_feature() {
        // Without the cuda feature there is no driver, hence no context to
        // load a module under. This test just verifies the module compiles.
        assert!(true);
    }
}
