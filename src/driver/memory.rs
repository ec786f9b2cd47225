//! Unified Memory Buffers
//!
//! The annotator reads kernel argument pointees from the host, so the demo
//! buffers live in managed (unified) memory: one allocation addressable from
//! both host and device. Plain device allocations would make the host-side
//! dereference invalid.

use std::marker::PhantomData;
use std::mem;
use std::slice;

use super::context::{get_driver, CudaContext};
use super::sys::{CUdeviceptr, CudaDriver, CU_MEM_ATTACH_GLOBAL};
use crate::error::InspectError;

// ============================================================================
// Managed Buffer
// ============================================================================

/// Typed unified-memory allocation
///
/// Host-visible and device-visible. Freed on drop; must not outlive its
/// context.
pub struct ManagedBuffer<T: Copy> {
    /// Device pointer (also valid as a host address for managed memory)
    ptr: CUdeviceptr,
    /// Element count
    len: usize,
    _marker: PhantomData<T>,
}

// SAFETY: the allocation is owned and access is through &self/&mut self
unsafe impl<T: Copy + Send> Send for ManagedBuffer<T> {}
unsafe impl<T: Copy + Sync> Sync for ManagedBuffer<T> {}

impl<T: Copy> ManagedBuffer<T> {
    /// Allocate a managed buffer of `len` elements
    ///
    /// # Errors
    ///
    /// Returns `Err(InspectError::MemoryAllocation)` if the allocation fails
    /// or `len` is zero.
    pub fn new(_ctx: &CudaContext, len: usize) -> Result<Self, InspectError> {
        if len == 0 {
            return Err(InspectError::MemoryAllocation(
                "zero-length buffer".to_string(),
            ));
        }
        let driver = get_driver()?;

        let bytes = len * mem::size_of::<T>();
        let mut ptr: CUdeviceptr = 0;
        // SAFETY: ptr is a valid out-pointer, bytes is nonzero
        let result = unsafe { (driver.cuMemAllocManaged)(&mut ptr, bytes, CU_MEM_ATTACH_GLOBAL) };
        CudaDriver::check(result).map_err(|e| InspectError::MemoryAllocation(e.to_string()))?;

        Ok(Self {
            ptr,
            len,
            _marker: PhantomData,
        })
    }

    /// Element count
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has no elements
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes
    #[must_use]
    pub const fn size_bytes(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    /// Raw device pointer
    #[must_use]
    pub const fn device_ptr(&self) -> CUdeviceptr {
        self.ptr
    }

    /// View the buffer as a host slice
    ///
    /// Valid because the allocation is managed; the caller must synchronize
    /// the device before reading values a kernel wrote.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: managed allocations are host-addressable; ptr/len come
        // from the constructor
        unsafe { slice::from_raw_parts(self.ptr as *const T, self.len) }
    }

    /// View the buffer as a mutable host slice
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: managed allocations are host-addressable; &mut self
        // guarantees exclusive access
        unsafe { slice::from_raw_parts_mut(self.ptr as *mut T, self.len) }
    }

    /// Address of the device-pointer field, for use as a kernel launch
    /// argument slot
    ///
    /// `cuLaunchKernel` expects each argument slot to hold the address of
    /// the argument value; for a buffer argument that value is the device
    /// pointer itself.
    pub fn launch_arg(&mut self) -> *mut std::ffi::c_void {
        (&mut self.ptr as *mut CUdeviceptr).cast()
    }
}

impl<T: Copy> Drop for ManagedBuffer<T> {
    fn drop(&mut self) {
        if let Ok(driver) = get_driver() {
            // SAFETY: ptr is valid from constructor
            unsafe {
                let _ = (driver.cuMemFree)(self.ptr);
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
    fn test_alloc_requires_driver() {
        // Allocation needs a context, which needs the driver; without the
        // cuda feature the driver lookup fails first.
        use super::super::context::get_driver;
        assert!(get_driver().is_err());
    }
}
