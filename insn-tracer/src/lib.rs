//! Instruction Tracer - Instruction-level execution traces driven through a debugger
//!
//! This crate records every machine instruction a program executes between a
//! start location and a stop condition, optionally annotated with disassembly
//! and symbol labels, and writes the result as a streaming JSON document.
//!
//! # Overview
//!
//! The tracer does not control processes itself. It orchestrates a debugger
//! through the [`ExecutionControl`] trait:
//!
//! * Break at the start location; when it is not the entry point, rerun it
//!   with reverse recording so the function's first instruction is captured
//! * Watch the caller's return address to bound the trace window
//! * Single-step, examining and formatting each instruction
//! * Stop on the instruction limit, the boundary, an interrupt or a failure,
//!   always finishing the document with its footer
//!
//! # Usage
//!
//! ```no_run
//! use insn_tracer::{ExecutionControl, TraceConfig, TraceController};
//!
//! fn trace_main(debugger: &mut impl ExecutionControl) -> Result<(), insn_tracer::TraceError> {
//!     let config = TraceConfig {
//!         disassemble: true,
//!         limit: Some(1000),
//!         ..TraceConfig::default()
//!     };
//!     let controller = TraceController::new(config)?;
//!     let summary = controller.run(debugger)?;
//!     println!("Done: {}", summary.stop_reason);
//!     println!("{} instructions executed", summary.instruction_count);
//!     Ok(())
//! }
//! ```
//!
//! # Limitations
//!
//! * Only single-threaded targets are traced.
//! * If the process is killed before the loop observes an interrupt, the
//!   output file is left without its footer.

pub mod config;
pub mod control;
pub mod error;
pub mod format;
pub mod monitor;
pub mod session;
pub mod signal;
pub mod trace;
pub mod writer;

pub use config::TraceConfig;
pub use control::{BreakpointHandle, BreakpointObserver, Disassembly, ExecutionControl};
pub use error::TraceError;
pub use format::{format_examine, FormatWarning, Formatted};
pub use monitor::StopPointMonitor;
pub use session::TraceController;
pub use signal::{ctrlc_cause, InterruptRelay, StopLatch};
pub use trace::{SessionStatus, StopReason, TraceRecord, TraceSession, TraceSummary};
pub use writer::TraceWriter;

/// Result type for debugger operations
pub type Result<T> = anyhow::Result<T>;
