//! Stop-point monitor
//!
//! Watches the return address captured when tracing starts. Reaching it means
//! the traced function returned, so the session should stop.

use crate::control::BreakpointObserver;
use crate::signal::StopLatch;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct StopPointMonitor {
    boundary: u64,
    latch: Arc<StopLatch>,
}

impl StopPointMonitor {
    pub fn new(boundary: u64, latch: Arc<StopLatch>) -> Self {
        Self { boundary, latch }
    }

    pub fn boundary(&self) -> u64 {
        self.boundary
    }

    pub fn location_spec(&self) -> String {
        format!("*{:#x}", self.boundary)
    }
}

impl BreakpointObserver for StopPointMonitor {
    fn hit(&self) -> bool {
        if self.latch.raise(format!("breakpoint {} has been reached", self.location_spec())) {
            tracing::debug!("Stop boundary {:#x} reached", self.boundary);
        }
        // The trace loop decides whether to keep stepping
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_raises_latch_without_pausing() {
        let latch = Arc::new(StopLatch::new());
        let monitor = StopPointMonitor::new(0x401150, latch.clone());

        assert!(!latch.is_raised());
        assert!(!monitor.hit());
        assert!(latch.is_raised());
        assert_eq!(latch.reason(), Some("breakpoint *0x401150 has been reached"));

        // Hitting again keeps the first reason
        assert!(!monitor.hit());
        assert_eq!(latch.reason(), Some("breakpoint *0x401150 has been reached"));
    }
}
