//! Trace session controller
//!
//! Drives the debugger through the trace window:
//!
//! 1. break at the start location and run the target there,
//! 2. when the start location is not the entry point, rerun it with reverse
//!    recording enabled so the function entry can be stepped back into,
//! 3. watch the caller's return address as the stop boundary,
//! 4. step one instruction at a time, recording each, until the limit, the
//!    boundary, an interrupt or a debugger failure ends the session.
//!
//! The trace document gets its footer and the debugger is released on every
//! path once the output sink has been opened.

use crate::config::TraceConfig;
use crate::control::{BreakpointHandle, ExecutionControl};
use crate::error::TraceError;
use crate::format::format_examine;
use crate::monitor::StopPointMonitor;
use crate::signal::{InterruptRelay, StopLatch};
use crate::trace::{SessionStatus, StopReason, TraceRecord, TraceSession, TraceSummary, NO_LABEL};
use crate::writer::TraceWriter;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

/// Runs one trace session. A controller is consumed by [`run`](Self::run).
pub struct TraceController {
    config: TraceConfig,
    session: TraceSession,
    interrupt: Arc<StopLatch>,
    boundary_hit: Arc<StopLatch>,
    start_breakpoint: Option<BreakpointHandle>,
    /// Return address and the breakpoint watching it
    boundary: Option<(u64, BreakpointHandle)>,
}

impl TraceController {
    /// Create a controller, rejecting an invalid configuration before any
    /// output exists.
    pub fn new(config: TraceConfig) -> Result<Self, TraceError> {
        config.validate()?;
        Ok(Self {
            config,
            session: TraceSession::new(),
            interrupt: Arc::new(StopLatch::new()),
            boundary_hit: Arc::new(StopLatch::new()),
            start_breakpoint: None,
            boundary: None,
        })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Handle for requesting cancellation from another thread; see
    /// [`InterruptRelay::install_ctrlc`] for ctrl+c
    pub fn interrupt_relay(&self) -> InterruptRelay {
        InterruptRelay::new(self.interrupt.clone())
    }

    /// Trace into the configured output file
    pub fn run<C: ExecutionControl>(self, control: &mut C) -> Result<TraceSummary, TraceError> {
        let file = File::create(&self.config.output).map_err(|e| {
            TraceError::Configuration(format!(
                "cannot open {}: {}",
                self.config.output.display(),
                e
            ))
        })?;
        self.run_with_sink(control, BufWriter::new(file))
    }

    /// Trace into an arbitrary sink
    pub fn run_with_sink<C: ExecutionControl, W: Write>(
        mut self,
        control: &mut C,
        sink: W,
    ) -> Result<TraceSummary, TraceError> {
        tracing::info!(
            "Starting instruction trace at {} (limit: {:?}, disassemble: {})",
            self.config.breakpoint,
            self.config.effective_limit(),
            self.config.disassemble
        );

        let mut writer = TraceWriter::new(sink);
        if let Err(e) = writer.write_header(&self.config, self.session.started_at()) {
            tracing::error!("Failed to write trace header: {}", e);
            if let Err(close) = writer.close() {
                tracing::warn!("Failed to close trace sink: {}", close);
            }
            release(control);
            return Err(e);
        }

        let (reason, setup_error) = match self.arm(control) {
            Ok(()) => (self.step(control, &mut writer), None),
            Err(e) => {
                tracing::error!("{}", e);
                let reason = match &e {
                    TraceError::Setup { stage, source } => StopReason::SetupFailure {
                        stage: stage.to_string(),
                        message: format!("{:#}", source),
                    },
                    other => StopReason::SetupFailure {
                        stage: "arming".to_string(),
                        message: other.to_string(),
                    },
                };
                (reason, Some(e))
            }
        };
        self.session.stop(reason);

        let summary = self.finish(control, writer);
        match setup_error {
            Some(e) => Err(e),
            None => summary,
        }
    }

    /// Arm the trace window and leave the target on the first instruction
    /// to record.
    fn arm<C: ExecutionControl>(&mut self, control: &mut C) -> Result<(), TraceError> {
        control
            .set_option("pagination", "off")
            .map_err(setup("disabling pagination"))?;
        control
            .set_option("confirm", "off")
            .map_err(setup("disabling confirmation"))?;
        let start = control
            .set_breakpoint(&self.config.breakpoint)
            .map_err(setup("installing the start breakpoint"))?;
        self.start_breakpoint = Some(start);
        control
            .launch_until_breakpoint()
            .map_err(setup("running to the start breakpoint"))?;
        self.session.advance(SessionStatus::Armed);

        let from_entry = self.config.starts_at_entry();
        if from_entry {
            // Needed to see a frame above the entry function
            control
                .set_option("backtrace past-main", "on")
                .map_err(setup("exposing the frame above the entry point"))?;
        } else {
            // Recording has to be active before the traced instructions run
            control
                .enable_reverse_recording()
                .map_err(setup("enabling reverse recording"))?;
            control
                .continue_execution()
                .map_err(setup("rerunning to the start breakpoint"))?;
            self.session.advance(SessionStatus::Recording);
        }

        let boundary = control
            .caller_program_counter()
            .map_err(setup("reading the caller frame"))?;
        let monitor = StopPointMonitor::new(boundary, self.boundary_hit.clone());
        let watch = control
            .watch_address(boundary, Box::new(monitor))
            .map_err(setup("arming the stop boundary"))?;
        self.boundary = Some((boundary, watch));
        tracing::debug!("Stop boundary armed at {:#x} ({:?})", boundary, watch);

        if !from_entry {
            // The breakpoint lands past the function's first instruction
            control
                .reverse_step_instruction()
                .map_err(setup("stepping back to the function entry"))?;
        }

        self.session.advance(SessionStatus::Stepping);
        Ok(())
    }

    /// Step-and-record loop. Returns why it stopped.
    fn step<C: ExecutionControl, W: Write>(
        &mut self,
        control: &mut C,
        writer: &mut TraceWriter<W>,
    ) -> StopReason {
        let limit = self.config.effective_limit();
        loop {
            if let Some(reason) = self.poll_stop() {
                return reason;
            }
            if limit.is_some_and(|n| self.session.instruction_count() >= n) {
                return StopReason::LimitReached;
            }

            let record = match self.capture(control) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Examine failed: {:#}", e);
                    return StopReason::ExamineError { message: format!("{:#}", e) };
                }
            };
            if let Err(e) = writer.append_record(&record) {
                tracing::error!("Failed to append trace record: {}", e);
                return StopReason::SinkError { message: e.to_string() };
            }
            self.session.record_instruction();

            if let Err(e) = control.step_instruction() {
                tracing::warn!("Single step failed: {:#}", e);
                return StopReason::StepError { message: format!("{:#}", e) };
            }
        }
    }

    fn poll_stop(&self) -> Option<StopReason> {
        if self.interrupt.is_raised() {
            let cause = self.interrupt.reason().unwrap_or("interrupted").to_string();
            return Some(StopReason::Interrupted { cause });
        }
        if self.boundary_hit.is_raised() {
            let address = self.boundary.map(|(address, _)| address).unwrap_or_default();
            let cause = self.boundary_hit.reason().unwrap_or("boundary reached").to_string();
            return Some(StopReason::BoundaryReached { address, cause });
        }
        None
    }

    /// Read, disassemble and format the instruction at the program counter
    fn capture<C: ExecutionControl>(&self, control: &mut C) -> crate::Result<TraceRecord> {
        let pc = control.program_counter().context("reading the program counter")?;
        let insn = control
            .disassemble(pc)
            .with_context(|| format!("disassembling {:#x}", pc))?;
        let raw = control
            .examine_bytes(pc, insn.length)
            .with_context(|| format!("examining {} bytes at {:#x}", insn.length, pc))?;

        let formatted = format_examine(&raw);
        if let Some(warning) = &formatted.warning {
            tracing::warn!("Malformed examine output at {:#x}: {}", pc, warning);
        }

        let (mnemonic, label) = if self.config.disassemble {
            let label = formatted.label.unwrap_or_else(|| NO_LABEL.to_string());
            (Some(normalize_whitespace(&insn.text)), Some(label))
        } else {
            (None, None)
        };

        Ok(TraceRecord {
            address: formatted.address,
            raw_bytes: formatted.raw_bytes,
            mnemonic,
            label,
        })
    }

    /// Write the footer, close the sink and release the debugger
    fn finish<C: ExecutionControl, W: Write>(
        mut self,
        control: &mut C,
        mut writer: TraceWriter<W>,
    ) -> Result<TraceSummary, TraceError> {
        let ended_at = self.session.finalize();
        let count = self.session.instruction_count();

        let footer = match self.session.stop_reason() {
            Some(reason) => writer.write_footer(count, ended_at, reason),
            None => Err(TraceError::Misuse("session finalized without a stop reason")),
        };
        let closed = writer.close();
        tracing::debug!(
            "Releasing start breakpoint {:?} and boundary watch {:?}",
            self.start_breakpoint,
            self.boundary.map(|(_, watch)| watch)
        );
        release(control);

        if let Some(reason) = self.session.stop_reason() {
            match reason.detail() {
                Some(detail) => tracing::info!("Done: {} ({})", reason, detail),
                None => tracing::info!("Done: {}", reason),
            }
        }
        tracing::info!("{} instructions executed", count);

        footer?;
        closed?;
        self.session
            .summary()
            .ok_or(TraceError::Misuse("session summary incomplete"))
    }
}

fn setup(stage: &'static str) -> impl FnOnce(anyhow::Error) -> TraceError {
    move |source| TraceError::Setup { stage, source }
}

fn release<C: ExecutionControl>(control: &mut C) {
    if let Err(e) = control.terminate() {
        tracing::warn!("Failed to release the debugger session: {:#}", e);
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
