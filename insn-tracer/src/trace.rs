//! Data structures for instruction traces and the session that produces them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label written when an address does not resolve inside a known routine
pub const NO_LABEL: &str = "n/a";

/// Trace of a single executed instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Instruction address, in the form printed by the debugger
    #[serde(rename = "addr")]
    pub address: String,
    /// Instruction bytes concatenated in examine order
    #[serde(rename = "insn")]
    pub raw_bytes: String,
    /// Disassembled instruction, only when disassembly was requested
    #[serde(rename = "asm", skip_serializing_if = "Option::is_none", default)]
    pub mnemonic: Option<String>,
    /// Symbol the address resolves to
    #[serde(rename = "debug", skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

/// Lifecycle of a trace session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Init,
    Armed,
    Recording,
    Stepping,
    Stopped,
    Finalized,
}

impl SessionStatus {
    /// Whether `next` is a legal forward transition from `self`.
    ///
    /// `Stopped` is reachable from every non-terminal state so that a setup
    /// failure can still finalize the session.
    pub fn can_advance_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Init, Armed)
                | (Armed, Recording)
                | (Armed, Stepping)
                | (Recording, Stepping)
                | (Init | Armed | Recording | Stepping, Stopped)
                | (Stopped, Finalized)
        )
    }
}

/// Why tracing stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The configured instruction limit was reached
    LimitReached,
    /// Execution returned to the caller frame captured at trace start
    BoundaryReached { address: u64, cause: String },
    /// Cooperative cancellation was requested
    Interrupted { cause: String },
    /// Reading the current instruction failed
    ExamineError { message: String },
    /// Single-stepping the target failed, usually because it exited
    StepError { message: String },
    /// The output sink rejected a record
    SinkError { message: String },
    /// Arming the trace window failed
    SetupFailure { stage: String, message: String },
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::LimitReached => "limit reached",
            StopReason::BoundaryReached { .. } => "boundary reached",
            StopReason::Interrupted { .. } => "interrupted",
            StopReason::ExamineError { .. } => "examine error",
            StopReason::StepError { .. } => "step error",
            StopReason::SinkError { .. } => "sink error",
            StopReason::SetupFailure { .. } => "setup failure",
        }
    }

    /// Human-readable detail beyond the short reason, if any
    pub fn detail(&self) -> Option<String> {
        match self {
            StopReason::LimitReached => None,
            StopReason::BoundaryReached { cause, .. } | StopReason::Interrupted { cause } => {
                Some(cause.clone())
            }
            StopReason::ExamineError { message }
            | StopReason::StepError { message }
            | StopReason::SinkError { message } => Some(message.clone()),
            StopReason::SetupFailure { stage, message } => Some(format!("{}: {}", stage, message)),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one trace session.
///
/// Owned by the controller and never shared across threads.
#[derive(Debug, Clone)]
pub struct TraceSession {
    status: SessionStatus,
    stop_reason: Option<StopReason>,
    instruction_count: u64,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TraceSession {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Init,
            stop_reason: None,
            instruction_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Move to the next non-terminal state of the arming sequence
    pub(crate) fn advance(&mut self, next: SessionStatus) {
        debug_assert!(
            self.status.can_advance_to(next) && next != SessionStatus::Stopped,
            "illegal session transition {:?} -> {:?}",
            self.status,
            next
        );
        tracing::debug!("Session {:?} -> {:?}", self.status, next);
        self.status = next;
    }

    /// Count one more recorded instruction
    pub(crate) fn record_instruction(&mut self) {
        debug_assert_eq!(self.status, SessionStatus::Stepping);
        self.instruction_count += 1;
    }

    /// Stop the session. The first reason wins; later calls are ignored.
    pub(crate) fn stop(&mut self, reason: StopReason) {
        if self.stop_reason.is_some() {
            return;
        }
        tracing::debug!("Session {:?} -> Stopped ({})", self.status, reason);
        self.status = SessionStatus::Stopped;
        self.stop_reason = Some(reason);
    }

    /// Mark the session finalized and stamp the end time
    pub(crate) fn finalize(&mut self) -> DateTime<Utc> {
        debug_assert_eq!(self.status, SessionStatus::Stopped);
        let now = Utc::now();
        self.status = SessionStatus::Finalized;
        self.ended_at = Some(now);
        now
    }

    pub(crate) fn summary(&self) -> Option<TraceSummary> {
        Some(TraceSummary {
            stop_reason: self.stop_reason.clone()?,
            instruction_count: self.instruction_count,
            started_at: self.started_at,
            ended_at: self.ended_at?,
        })
    }
}

impl Default for TraceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome reported to the caller once a session is finalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub stop_reason: StopReason,
    pub instruction_count: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}
