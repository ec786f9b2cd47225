//! sonda: annotate a captured CUDA graph with static memory-effect metadata.
//!
//! Demo flow: parse the analysis report, capture a toy vector-add launch
//! into an execution graph, then correlate the report's per-argument effects
//! with the argument values staged in the graph's kernel nodes.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sonda::annotate::{annotate_nodes, ErrorPolicy};
use sonda::driver::{
    cuda_available, CudaContext, CudaModule, CudaStream, LaunchConfig, ManagedBuffer,
};
use sonda::report::ReportTable;
use sonda::Result;

/// Toy vector-add kernel: c[i] = a[i] + b[i].
///
/// The entry name and parameter list must match the shipped sample report:
/// three pointer arguments (indices 0-2) and one scalar (index 3).
const VEC_ADD_PTX: &str = r#"
.version 7.0
.target sm_70
.address_size 64

.visible .entry vec_add(
    .param .u64 vec_add_param_0,
    .param .u64 vec_add_param_1,
    .param .u64 vec_add_param_2,
    .param .u32 vec_add_param_3
)
{
    .reg .pred  %p<2>;
    .reg .b32   %r<8>;
    .reg .b64   %rd<11>;

    ld.param.u64    %rd1, [vec_add_param_0];
    ld.param.u64    %rd2, [vec_add_param_1];
    ld.param.u64    %rd3, [vec_add_param_2];
    ld.param.u32    %r1, [vec_add_param_3];
    mov.u32         %r2, %ctaid.x;
    mov.u32         %r3, %ntid.x;
    mov.u32         %r4, %tid.x;
    mad.lo.s32      %r5, %r2, %r3, %r4;
    setp.ge.s32     %p1, %r5, %r1;
    @%p1 bra        DONE;

    cvta.to.global.u64  %rd4, %rd1;
    cvta.to.global.u64  %rd5, %rd2;
    cvta.to.global.u64  %rd6, %rd3;
    mul.wide.s32    %rd7, %r5, 4;
    add.s64         %rd8, %rd4, %rd7;
    add.s64         %rd9, %rd5, %rd7;
    add.s64         %rd10, %rd6, %rd7;
    ld.global.u32   %r6, [%rd8];
    ld.global.u32   %r7, [%rd9];
    add.s32         %r6, %r6, %r7;
    st.global.u32   [%rd10], %r6;

DONE:
    ret;
}
"#;

/// Elements in each demo buffer
const N: usize = 256;

#[derive(Parser)]
#[command(
    name = "sonda",
    version,
    about = "Annotate captured CUDA graphs with static memory-effect metadata"
)]
struct Cli {
    /// Path to the static-analysis report
    #[arg(long, default_value = "demos/vec_add_report.txt")]
    report: PathBuf,

    /// CUDA device ordinal
    #[arg(long, default_value_t = 0)]
    device: i32,

    /// Abort on the first node-level error instead of collecting per node
    #[arg(long)]
    fail_fast: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let table = ReportTable::from_file(&cli.report)?;
    info!(
        kernels = table.len(),
        report = %cli.report.display(),
        "parsed analysis report"
    );

    if !cuda_available() {
        warn!("CUDA not available; printing parsed table only");
        for entry in table.iter() {
            println!(
                "{}: {} ({} pointer args)",
                entry.name,
                entry.memory_effect,
                entry.ptr_args.len()
            );
        }
        return Ok(());
    }

    let ctx = CudaContext::new(cli.device)?;
    info!(device = %ctx.device_name()?, "inspecting on device");

    let mut module = CudaModule::from_ptx(&ctx, VEC_ADD_PTX)?;
    let stream = CudaStream::new(&ctx)?;

    // Managed memory keeps the argument pointees host-readable for the
    // annotator's value readback.
    let mut a = ManagedBuffer::<i32>::new(&ctx, N)?;
    let mut b = ManagedBuffer::<i32>::new(&ctx, N)?;
    let mut c = ManagedBuffer::<i32>::new(&ctx, N)?;
    for (i, v) in a.as_mut_slice().iter_mut().enumerate() {
        *v = i as i32;
    }
    b.as_mut_slice().fill(100);
    c.as_mut_slice().fill(0);

    let mut n = N as i32;
    stream.begin_capture()?;
    let mut args = [
        a.launch_arg(),
        b.launch_arg(),
        c.launch_arg(),
        (&mut n as *mut i32).cast(),
    ];
    // SAFETY: args matches vec_add(i32*, i32*, i32*, i32); the buffers and
    // `n` outlive the launch call.
    unsafe {
        stream.launch_kernel(
            &mut module,
            "vec_add",
            &LaunchConfig::linear(N as u32, 128),
            &mut args,
        )?;
    }
    let graph = stream.end_capture()?;

    let launches = graph.kernel_launches()?;
    info!(
        nodes = graph.node_count()?,
        kernels = launches.len(),
        "captured execution graph"
    );

    let policy = if cli.fail_fast {
        ErrorPolicy::FailFast
    } else {
        ErrorPolicy::Collect
    };
    let reports = annotate_nodes(&launches, &table, policy)?;
    for report in &reports {
        print!("{report}");
    }

    Ok(())
}
