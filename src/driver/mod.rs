//! CUDA Driver API boundary
//!
//! Minimal hand-written bindings plus safe RAII wrappers for everything the
//! inspection flow touches: context, module, stream (with capture), managed
//! memory, and captured graphs. Only what we need is bound; all unsafe code
//! lives here and in [`sys`].
//!
//! The driver is loaded dynamically at runtime (feature `cuda`); without it
//! every entry point reports [`crate::InspectError::CudaNotAvailable`], and
//! the parser/annotator remain fully usable against synthetic nodes.

mod context;
mod graph;
mod memory;
mod module;
mod stream;
mod types;

pub mod sys;

pub use context::{cuda_available, device_count, get_driver, CudaContext};
pub use graph::{CudaGraph, KernelLaunch};
pub use memory::ManagedBuffer;
pub use module::CudaModule;
pub use stream::CudaStream;
pub use types::LaunchConfig;
