//! End-to-end correlation without CUDA hardware.
//!
//! Exercises the full report-to-annotation pipeline against synthetic nodes
//! implementing the same interface the graph facility backs at runtime.

use std::ffi::c_void;
use std::io::Write;
use std::mem;

use sonda::annotate::{annotate_nodes, ErrorPolicy, LaunchNode};
use sonda::report::ReportTable;
use sonda::{InspectError, Result};

/// Synthetic launch node owning its argument storage.
struct SyntheticNode {
    name: String,
    pointees: Vec<Box<i32>>,
    arg_ptrs: Vec<*const i32>,
    sizes: Vec<usize>,
}

impl SyntheticNode {
    fn new(name: &str, values: &[i32]) -> Self {
        let pointees: Vec<Box<i32>> = values.iter().copied().map(Box::new).collect();
        let arg_ptrs = pointees.iter().map(|b| &**b as *const i32).collect();
        let sizes = vec![mem::size_of::<*const c_void>(); values.len()];
        Self {
            name: name.to_string(),
            pointees,
            arg_ptrs,
            sizes,
        }
    }

    /// Append a 4-byte scalar slot, as a kernel's trailing `n` argument.
    fn with_scalar(mut self) -> Self {
        self.pointees.push(Box::new(0));
        self.arg_ptrs.push(std::ptr::null());
        self.sizes.push(4);
        self
    }
}

// SAFETY: slots point into owned Vec storage; pointees are boxed and live
// as long as the node.
unsafe impl LaunchNode for SyntheticNode {
    fn function_name(&self) -> Result<String> {
        Ok(self.name.clone())
    }

    fn param_count(&self) -> usize {
        self.sizes.len()
    }

    fn arg_size(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).copied()
    }

    fn arg_slot(&self, index: usize) -> Option<*const c_void> {
        self.arg_ptrs
            .get(index)
            .map(|slot| (slot as *const *const i32).cast::<c_void>())
    }
}

const REPORT: &str = "\
Function (@vec_add):
Memory Effect: ArgMemOnly
Arg #0: Effect: ReadOnly Capture: No
Arg #1: Effect: ReadOnly Capture: No
Arg #2: Effect: ReadWrite Capture: No
Function (@scale):
Memory Effect: ArgMemOnly
Arg #0: Effect: ReadWrite Capture: No
";

#[test]
fn report_file_to_annotation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(REPORT.as_bytes()).unwrap();
    file.flush().unwrap();

    let table = ReportTable::from_file(file.path()).unwrap();
    assert_eq!(table.len(), 2);

    let nodes = vec![
        SyntheticNode::new("vec_add", &[10, 20, 0]).with_scalar(),
        SyntheticNode::new("scale", &[7]).with_scalar(),
    ];
    let reports = annotate_nodes(&nodes, &table, ErrorPolicy::Collect).unwrap();

    assert_eq!(reports.len(), 2);

    let vec_add = reports[0].outcome.as_ref().unwrap();
    assert_eq!(vec_add.memory_effect, "ArgMemOnly");
    let values: Vec<&Result<i32>> = vec_add.args.iter().map(|a| &a.value).collect();
    assert_eq!(values, vec![&Ok(10), &Ok(20), &Ok(0)]);

    let scale = reports[1].outcome.as_ref().unwrap();
    assert_eq!(scale.args[0].value, Ok(7));
}

#[test]
fn report_entry_beyond_node_params_is_contained() {
    let table = ReportTable::parse(
        "Function (@tiny):\nMemory Effect: Any\nArg #5: Effect: ReadOnly Capture: No\n",
    )
    .unwrap();
    let nodes = vec![SyntheticNode::new("tiny", &[1])];

    let reports = annotate_nodes(&nodes, &table, ErrorPolicy::Collect).unwrap();
    let annotated = reports[0].outcome.as_ref().unwrap();
    assert_eq!(
        annotated.args[0].value,
        Err(InspectError::ArgIndexOutOfRange {
            index: 5,
            param_count: 1
        })
    );
}

#[test]
fn scalar_slot_in_report_is_rejected_without_read() {
    // The report wrongly claims the scalar slot 3 is a pointer argument.
    let table = ReportTable::parse(
        "Function (@vec_add):\nMemory Effect: Any\nArg #3: Effect: ReadOnly Capture: No\n",
    )
    .unwrap();
    let nodes = vec![SyntheticNode::new("vec_add", &[1, 2, 3]).with_scalar()];

    let reports = annotate_nodes(&nodes, &table, ErrorPolicy::Collect).unwrap();
    let annotated = reports[0].outcome.as_ref().unwrap();
    assert_eq!(
        annotated.args[0].value,
        Err(InspectError::ArgTypeMismatch { index: 3, size: 4 })
    );
}

#[test]
fn missing_table_entry_respects_policy() {
    let table = ReportTable::parse(REPORT).unwrap();
    let nodes = vec![
        SyntheticNode::new("vec_add", &[1, 2, 3]).with_scalar(),
        SyntheticNode::new("unlisted", &[4]),
    ];

    // Collect: the unknown node carries its own error, the rest annotate.
    let reports = annotate_nodes(&nodes, &table, ErrorPolicy::Collect).unwrap();
    assert!(reports[0].outcome.is_ok());
    assert_eq!(
        reports[1].outcome,
        Err(InspectError::UnknownKernel("unlisted".to_string()))
    );

    // FailFast: the same input aborts the pass.
    let err = annotate_nodes(&nodes, &table, ErrorPolicy::FailFast).unwrap_err();
    assert_eq!(err, InspectError::UnknownKernel("unlisted".to_string()));
}

#[test]
fn display_output_is_one_block_per_node() {
    let table = ReportTable::parse(REPORT).unwrap();
    let nodes = vec![SyntheticNode::new("scale", &[42]).with_scalar()];

    let reports = annotate_nodes(&nodes, &table, ErrorPolicy::Collect).unwrap();
    let rendered = reports
        .iter()
        .map(ToString::to_string)
        .collect::<String>();

    assert!(rendered.contains("node 0: scale [ArgMemOnly]"));
    assert!(rendered.contains("arg 0: ReadWrite = 42"));
}
