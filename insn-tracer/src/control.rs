//! Execution control interface
//!
//! The tracer does not emulate or control processes itself. It drives a
//! debugger through [`ExecutionControl`], one blocking call at a time.

use crate::Result;

/// Opaque id of a breakpoint installed by the debugger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BreakpointHandle(pub u32);

/// Disassembly of the instruction at one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disassembly {
    /// Instruction length in bytes
    pub length: usize,
    /// Mnemonic and operands as printed by the debugger
    pub text: String,
}

/// Observer notified when a watched address is reached.
///
/// Replaces subclassing a debugger breakpoint type: the debugger owns the
/// breakpoint and calls back into the observer.
pub trait BreakpointObserver {
    /// Called when execution reaches the watched address.
    ///
    /// Returns whether the debugger should pause as it would for an ordinary
    /// breakpoint.
    fn hit(&self) -> bool;
}

/// Debugger operations the trace controller relies on.
///
/// Every call fails when the target has exited, the address is invalid or the
/// debugger reports an internal fault.
pub trait ExecutionControl {
    /// Set a debugger option, e.g. `("pagination", "off")`
    fn set_option(&mut self, name: &str, value: &str) -> Result<()>;

    /// Install a breakpoint at a location spec (function name or `*addr`)
    fn set_breakpoint(&mut self, location: &str) -> Result<BreakpointHandle>;

    /// Install a breakpoint at `address` that reports to `observer`
    fn watch_address(
        &mut self,
        address: u64,
        observer: Box<dyn BreakpointObserver>,
    ) -> Result<BreakpointHandle>;

    /// Start the target (or resume it) and run until a breakpoint is hit
    fn launch_until_breakpoint(&mut self) -> Result<()>;

    /// Start recording execution history so reverse stepping is possible
    fn enable_reverse_recording(&mut self) -> Result<()>;

    /// Continue until the next breakpoint
    fn continue_execution(&mut self) -> Result<()>;

    fn reverse_step_instruction(&mut self) -> Result<()>;

    fn step_instruction(&mut self) -> Result<()>;

    fn program_counter(&mut self) -> Result<u64>;

    /// Program counter of the frame one level up (the return address)
    fn caller_program_counter(&mut self) -> Result<u64>;

    fn disassemble(&mut self, address: u64) -> Result<Disassembly>;

    /// Raw text of an examine request for `length` bytes at `address`
    fn examine_bytes(&mut self, address: u64, length: usize) -> Result<String>;

    /// Kill the target and release the debugger
    fn terminate(&mut self) -> Result<()>;
}
