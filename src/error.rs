//! Error types for graph inspection.
//!
//! One enum covers the whole pipeline: report parsing, CUDA driver calls,
//! and per-node annotation. Parse errors abort before any annotation begins;
//! node- and argument-level errors can be collected per entry instead of
//! failing the whole pass (see [`crate::annotate::ErrorPolicy`]).

use thiserror::Error;

/// Result type alias for sonda operations
pub type Result<T> = std::result::Result<T, InspectError>;

/// Errors that can occur while parsing a report or inspecting a graph
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InspectError {
    /// Report file missing or unreadable
    #[error("cannot open report {path}: {cause}")]
    ReportOpen {
        /// Path as given by the caller
        path: String,
        /// Underlying I/O failure
        cause: String,
    },

    /// Report text does not conform to the expected grammar
    #[error("malformed report at line {line}: {detail}")]
    ReportFormat {
        /// 1-based line of the offending token
        line: usize,
        /// What was expected vs. found
        detail: String,
    },

    /// A graph node's resolved function name has no entry in the report table
    #[error("kernel `{0}` has no entry in the analysis report")]
    UnknownKernel(String),

    /// A reported argument index has no parameter slot on the node
    #[error("argument index {index} out of range ({param_count} declared parameters)")]
    ArgIndexOutOfRange {
        /// Index from the report
        index: u32,
        /// Declared parameter count of the launched function
        param_count: usize,
    },

    /// The declared parameter slot is not pointer-sized
    #[error("argument {index} is not pointer-typed (declared size {size} bytes)")]
    ArgTypeMismatch {
        /// Index from the report
        index: u32,
        /// Declared slot size in bytes
        size: usize,
    },

    /// The pointer argument holds a null pointer
    #[error("argument {index} holds a null pointer")]
    NullPointerArg {
        /// Index from the report
        index: u32,
    },

    /// CUDA driver call failure
    #[error("CUDA driver error: {0} (code: {1})")]
    CudaDriver(String, i32),

    /// CUDA driver not installed or feature disabled
    #[error("CUDA not available: {0}")]
    CudaNotAvailable(String),

    /// Device ordinal does not exist
    #[error("CUDA device {0} not found ({1} available)")]
    DeviceNotFound(i32, usize),

    /// Device initialization failure
    #[error("CUDA initialization failed: {0}")]
    DeviceInit(String),

    /// PTX module load failure
    #[error("module load failed: {0}")]
    ModuleLoad(String),

    /// Kernel function not present in the loaded module
    #[error("kernel function not found: {0}")]
    FunctionNotFound(String),

    /// Stream creation failure
    #[error("stream creation failed: {0}")]
    StreamCreate(String),

    /// Stream or context synchronization failure
    #[error("synchronization failed: {0}")]
    StreamSync(String),

    /// Stream capture begin/end failure
    #[error("stream capture failed: {0}")]
    StreamCapture(String),

    /// Kernel launch failure
    #[error("kernel launch failed: {0}")]
    KernelLaunch(String),

    /// GPU memory allocation failure
    #[error("GPU memory allocation failed: {0}")]
    MemoryAllocation(String),
}
