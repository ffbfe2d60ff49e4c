//! Cooperative stop signalling
//!
//! A [`StopLatch`] is a set-once flag plus the reason it was set. The
//! controller owns the latches of its session and hands out clones of the
//! `Arc` to the interrupt relay and the stop-point monitor, then polls them
//! between steps.

use crate::error::TraceError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// Signal number delivered for ctrl+c
pub const SIGINT: i32 = 2;

/// Interrupt cause recorded when the operator presses ctrl+c
pub fn ctrlc_cause(signum: i32) -> String {
    format!("ctrl+c has been pressed (signal: {})", signum)
}

/// Set-once stop flag
#[derive(Debug, Default)]
pub struct StopLatch {
    raised: AtomicBool,
    reason: OnceLock<String>,
}

impl StopLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the latch. Returns `false` if it was already raised, in which
    /// case the first reason is kept.
    pub fn raise(&self, reason: impl Into<String>) -> bool {
        let first = self.reason.set(reason.into()).is_ok();
        self.raised.store(true, Ordering::Release);
        first
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<&str> {
        if !self.is_raised() {
            return None;
        }
        self.reason.get().map(String::as_str)
    }
}

/// Handle through which an asynchronous actor (a signal handler, a UI, a
/// test) asks the session to stop.
///
/// Cloneable and `Send + Sync`. The request is observed at the next loop
/// boundary; an in-flight debugger call is allowed to finish.
#[derive(Debug, Clone)]
pub struct InterruptRelay {
    latch: Arc<StopLatch>,
}

impl InterruptRelay {
    pub(crate) fn new(latch: Arc<StopLatch>) -> Self {
        Self { latch }
    }

    /// Request cancellation with a human-readable cause
    pub fn interrupt(&self, cause: impl Into<String>) {
        let cause = cause.into();
        if self.latch.raise(cause.clone()) {
            tracing::info!("Interrupt requested: {}", cause);
        }
    }

    pub fn is_interrupted(&self) -> bool {
        self.latch.is_raised()
    }

    /// Route ctrl+c (SIGINT) to this relay.
    ///
    /// The handler runs on a thread owned by `ctrlc`, not inside the signal
    /// context. Only one handler can be installed per process.
    pub fn install_ctrlc(&self) -> Result<(), TraceError> {
        let relay = self.clone();
        ctrlc::set_handler(move || relay.on_ctrlc())?;
        tracing::debug!("ctrl+c handler installed");
        Ok(())
    }

    fn on_ctrlc(&self) {
        self.interrupt(ctrlc_cause(SIGINT));
    }
}
