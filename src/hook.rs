//! The call-stack memory hook
//!
//! Sprint 1: MVP - format and emit CALLSTACK lines
//! Sprint 3: full-chain mode
//! Sprint 5: event filtering
//! Sprint 6: per-owner statistics
//!
//! [`CallStackHook`] is the piece the host framework talks to. The pool
//! invokes it around each allocation and free; the hook attributes the
//! event, formats one line, and writes it to the configured sink. The
//! hook never allocates device memory and never dispatches itself; both
//! belong to the host.
//!
//! Output is one space-separated line per event:
//!
//! ```text
//! CALLSTACK MALLOC 2 8388608 0x3effab600000 0x3effd466f0f0 __call__:convolution_2d.py:googlenet.py:37
//! ```
//!
//! In full mode the caller chain follows the owner, each entry terminated
//! by a comma.

use crate::attribution::{AttributionResult, Attributor};
use crate::event::MemoryEvent;
use crate::filter::EventFilter;
use crate::frame::StackFrame;
use crate::scope::ScopeStack;
use crate::stats::MemoryStatsTracker;
use std::io::{self, Write};
use thiserror::Error;

/// Errors for hook logging operations
#[derive(Error, Debug)]
pub enum HookError {
    #[error("failed to write trace line: {0}")]
    Sink(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, HookError>;

/// Memory hook that logs pool events with call-stack attribution
///
/// Construction follows the builder pattern; all switches default off:
///
/// ```
/// use rastro::hook::CallStackHook;
///
/// let hook = CallStackHook::with_sink(Vec::new())
///     .flush_each_line(true)
///     .full_chain(true);
/// # let _ = hook;
/// ```
#[derive(Debug)]
pub struct CallStackHook<W: Write> {
    sink: W,
    /// Force-flush the sink after every line
    flush: bool,
    /// Append the full caller chain after the owner
    full: bool,
    attributor: Attributor,
    filter: EventFilter,
    stats: Option<MemoryStatsTracker>,
}

impl CallStackHook<io::Stdout> {
    /// Hook writing to standard output
    pub fn new() -> Self {
        CallStackHook::with_sink(io::stdout())
    }
}

impl Default for CallStackHook<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> CallStackHook<W> {
    /// Hook writing to the given sink
    pub fn with_sink(sink: W) -> Self {
        CallStackHook {
            sink,
            flush: false,
            full: false,
            attributor: Attributor::new(),
            filter: EventFilter::all(),
            stats: None,
        }
    }

    /// Flush the sink after every emitted line (default: off)
    pub fn flush_each_line(mut self, flush: bool) -> Self {
        self.flush = flush;
        self
    }

    /// Append the full caller chain to every line (default: off)
    pub fn full_chain(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    /// Replace the default attributor
    pub fn with_attributor(mut self, attributor: Attributor) -> Self {
        self.attributor = attributor;
        self
    }

    /// Log only events passing the filter
    pub fn with_filter(mut self, filter: EventFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Accumulate per-owner statistics alongside the line stream
    pub fn track_stats(mut self) -> Self {
        self.stats = Some(MemoryStatsTracker::new());
        self
    }

    /// Accumulated statistics, if tracking is enabled
    pub fn stats(&self) -> Option<&MemoryStatsTracker> {
        self.stats.as_ref()
    }

    /// Host entry point: called just after the pool allocated
    ///
    /// Argument order mirrors the host's dispatch protocol: device id,
    /// rounded size in bytes, memory pointer, pool object id, then the
    /// stack snapshot taken at dispatch time.
    pub fn malloc_postprocess(
        &mut self,
        device_id: u32,
        size_bytes: u64,
        mem_ptr: u64,
        pool_id: u64,
        stack: &[StackFrame],
    ) -> Result<()> {
        let event = MemoryEvent::malloc(device_id, size_bytes, mem_ptr, pool_id);
        self.record(&event, stack)
    }

    /// Host entry point: called just before the pool frees
    pub fn free_preprocess(
        &mut self,
        device_id: u32,
        size_bytes: u64,
        mem_ptr: u64,
        pool_id: u64,
        stack: &[StackFrame],
    ) -> Result<()> {
        let event = MemoryEvent::free(device_id, size_bytes, mem_ptr, pool_id);
        self.record(&event, stack)
    }

    /// Attribute from a frame snapshot and log the event
    pub fn record(&mut self, event: &MemoryEvent, stack: &[StackFrame]) -> Result<()> {
        let attribution = self.attributor.attribute(stack, self.full);
        self.emit(event, &attribution)
    }

    /// Attribute from the current thread's scope markers and log the event
    ///
    /// For hosts without observable call frames: the innermost
    /// [`ScopeStack`] marker owns the event, no heuristics involved.
    pub fn record_scoped(&mut self, event: &MemoryEvent) -> Result<()> {
        let markers = ScopeStack::snapshot();
        let attribution = self.attributor.attribute_scopes(&markers, self.full);
        self.emit(event, &attribution)
    }

    /// Attribute from a native backtrace taken here and log the event
    #[cfg(feature = "capture")]
    pub fn record_captured(&mut self, event: &MemoryEvent) -> Result<()> {
        let stack = crate::capture::capture_stack();
        self.record(event, &stack)
    }

    fn format_line(&self, event: &MemoryEvent, attribution: &AttributionResult) -> String {
        let mut line = format!(
            "CALLSTACK {} {} {} {:#x} {:#x} {}",
            event.kind,
            event.device_id,
            event.size_bytes,
            event.mem_ptr,
            event.pool_id,
            attribution.owner
        );
        if self.full {
            // The chain field keeps its leading space and per-entry
            // trailing commas even when the chain is empty.
            line.push(' ');
            for entry in &attribution.chain {
                line.push_str(entry);
                line.push(',');
            }
        }
        line
    }

    fn emit(&mut self, event: &MemoryEvent, attribution: &AttributionResult) -> Result<()> {
        // Statistics cover every recorded event; the filter only cuts
        // line volume. Accounting against a partial event stream would
        // report wrong live-byte numbers.
        if let Some(stats) = &mut self.stats {
            stats.record(&attribution.owner, event);
        }
        if !self.filter.should_log(event, &attribution.owner) {
            return Ok(());
        }
        let line = self.format_line(event, attribution);
        self.sink.write_all(line.as_bytes())?;
        self.sink.write_all(b"\n")?;
        if self.flush {
            self.sink.flush()?;
        }
        Ok(())
    }

    /// Consume the hook, returning the sink
    pub fn into_sink(self) -> W {
        self.sink
    }
}
