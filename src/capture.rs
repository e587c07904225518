//! Native stack capture
//!
//! Sprint 7: backtrace-based snapshots for hosts without their own frames
//!
//! Hosts embedded in an interpreter hand the hook their language-level
//! stack directly. Native hosts have nothing to hand over, so this module
//! resolves the machine backtrace into [`StackFrame`]s in the same
//! innermost-first order the attributor expects.
//!
//! Symbol resolution needs debug info; release builds without it resolve
//! most frames to placeholders, which the attributor reports as UNKNOWN
//! rather than failing.

use crate::frame::StackFrame;

/// Frames resolved per snapshot before the walk stops
///
/// Deep enough for real call chains while bounding resolution cost, which
/// dominates snapshot time.
pub const MAX_CAPTURE_DEPTH: usize = 64;

/// Placeholder function name for frames without symbol info
pub const UNRESOLVED_FUNCTION: &str = "<unresolved>";

/// Placeholder file name for frames without source info
pub const UNKNOWN_FILE: &str = "<unknown>";

/// Capture the current thread's native stack as attribution frames
///
/// Frames are innermost first. Each native frame contributes one entry
/// per resolved symbol (inlined callees expand to their own entries);
/// frames the resolver cannot identify still appear, carrying
/// placeholder names so stack shape is preserved for the scan.
pub fn capture_stack() -> Vec<StackFrame> {
    let mut frames = Vec::with_capacity(MAX_CAPTURE_DEPTH);

    backtrace::trace(|frame| {
        let mut resolved_any = false;
        backtrace::resolve_frame(frame, |symbol| {
            resolved_any = true;
            let function = symbol
                .name()
                .map(|name| name.to_string())
                .unwrap_or_else(|| UNRESOLVED_FUNCTION.to_string());
            let file = symbol
                .filename()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| UNKNOWN_FILE.to_string());
            let line = symbol.lineno().unwrap_or(0);
            frames.push(StackFrame::new(function, file, line));
        });
        if !resolved_any {
            frames.push(StackFrame::new(UNRESOLVED_FUNCTION, UNKNOWN_FILE, 0));
        }
        frames.len() < MAX_CAPTURE_DEPTH
    });

    tracing::trace!(frames = frames.len(), "captured native stack");
    frames
}
