//! Static-analysis report model and parser.
//!
//! An external analysis pass classifies every kernel's memory behavior and
//! writes a semi-structured text report: one block per function, each block
//! naming the function, its overall memory-effect class, and the effect and
//! escape ("capture") flag of each pointer argument. This module reads that
//! report end-to-end into an immutable lookup table keyed by function name.
//!
//! Parsing is a pure function from input text to a [`ReportTable`] or an
//! error; no partial table escapes on failure.

mod cursor;
mod parser;

pub use cursor::TokenCursor;

use std::collections::HashMap;
use std::path::Path;

use crate::error::{InspectError, Result};

/// Effect metadata for one pointer argument of a kernel.
///
/// The index addresses the kernel's full parameter list, matching the offset
/// the launch parameters expose at runtime. Effect and capture tags are kept
/// as opaque strings: the analysis tool's vocabulary is open-ended and only
/// partially known (`ReadOnly`, `ReadWrite`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ArgEffect {
    /// Parameter index into the kernel's argument list
    pub index: u32,
    /// Access class of the pointee (e.g. `ReadOnly`)
    pub effect: String,
    /// Whether the pointer escapes the function (recorded, not correlated)
    pub capture: String,
}

/// Analysis results for one kernel function.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelInfo {
    /// Function name as the runtime resolves it for the launched kernel
    pub name: String,
    /// Overall memory-access class of the function (e.g. `ArgMemOnly`)
    pub memory_effect: String,
    /// Per-pointer-argument effects, in report order
    pub ptr_args: Vec<ArgEffect>,
}

/// Immutable mapping from function name to its [`KernelInfo`].
///
/// Built atomically by [`ReportTable::parse`]; read-only afterwards. When a
/// report names the same function twice, the later block wins.
#[derive(Debug, Default)]
pub struct ReportTable {
    entries: HashMap<String, KernelInfo>,
}

impl ReportTable {
    /// Parse report text into a table.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::ReportFormat`] when the text does not conform
    /// to the report grammar. Nothing of a failed parse is retained.
    pub fn parse(text: &str) -> Result<Self> {
        parser::parse(text)
    }

    /// Read and parse a report file.
    ///
    /// # Errors
    ///
    /// Returns [`InspectError::ReportOpen`] when the file cannot be read and
    /// [`InspectError::ReportFormat`] when its content is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| InspectError::ReportOpen {
            path: path.display().to_string(),
            cause: e.to_string(),
        })?;
        Self::parse(&text)
    }

    /// Look up a function by its resolved name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&KernelInfo> {
        self.entries.get(name)
    }

    /// Number of functions in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the report contained no function blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &KernelInfo> {
        self.entries.values()
    }

    /// Insert a completed block. Last write wins on duplicate names.
    pub(crate) fn insert(&mut self, info: KernelInfo) {
        self.entries.insert(info.name.clone(), info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = ReportTable::default();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
        assert!(table.get("vec_add").is_none());
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = ReportTable::default();
        table.insert(KernelInfo {
            name: "vec_add".to_string(),
            memory_effect: "ArgMemOnly".to_string(),
            ptr_args: vec![],
        });
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("vec_add").unwrap().memory_effect, "ArgMemOnly");
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = ReportTable::from_file("/nonexistent/effects.txt").unwrap_err();
        assert!(matches!(err, InspectError::ReportOpen { .. }));
        assert!(err.to_string().contains("/nonexistent/effects.txt"));
    }

    #[test]
    fn test_from_file_roundtrip() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Function (@vec_add):").unwrap();
        writeln!(file, "Memory Effect: ArgMemOnly").unwrap();
        writeln!(file, "Arg #0: Effect: ReadOnly Capture: No").unwrap();
        file.flush().unwrap();

        let table = ReportTable::from_file(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        let info = table.get("vec_add").unwrap();
        assert_eq!(info.ptr_args.len(), 1);
    }
}
