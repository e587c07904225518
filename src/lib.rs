//! Rastro - Call-stack attribution for GPU memory-pool events
//!
//! This library provides the diagnostic hook a tensor-computation
//! framework attaches to its memory pool: every allocation and free is
//! logged as one CALLSTACK line attributed to the logical layer that
//! triggered it, via frame-pair scanning, explicit scope markers, or
//! native backtrace capture.

pub mod attribution;
#[cfg(feature = "capture")]
pub mod capture; // Sprint 7: native backtrace snapshots
pub mod event;
pub mod filter;
pub mod frame;
pub mod hook;
pub mod scope;
pub mod stats;
