//! Memory-pool event records
//!
//! Sprint 1: event model for the CALLSTACK line output
//!
//! Events arrive from the host framework's pool dispatch, one per
//! allocation or free, carrying the rounded size and two opaque 64-bit
//! identifiers (device pointer and pool object id) that are rendered as
//! lowercase `0x`-prefixed hex in the output line.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of memory-pool event delivered to the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Pool serviced an allocation (hook runs just after)
    Malloc,
    /// Pool is about to release a block (hook runs just before)
    Free,
}

impl EventKind {
    /// Wire name used as the second field of the CALLSTACK line
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Malloc => "MALLOC",
            EventKind::Free => "FREE",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single allocation or free event as reported by the host pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// Event kind (MALLOC or FREE)
    pub kind: EventKind,
    /// Non-negative device index
    pub device_id: u32,
    /// Allocation size in bytes, as rounded by the pool
    pub size_bytes: u64,
    /// Device memory pointer (opaque, hex-rendered)
    pub mem_ptr: u64,
    /// Pool object id (opaque, hex-rendered)
    pub pool_id: u64,
}

impl MemoryEvent {
    /// Allocation event
    pub fn malloc(device_id: u32, size_bytes: u64, mem_ptr: u64, pool_id: u64) -> Self {
        MemoryEvent {
            kind: EventKind::Malloc,
            device_id,
            size_bytes,
            mem_ptr,
            pool_id,
        }
    }

    /// Free event
    pub fn free(device_id: u32, size_bytes: u64, mem_ptr: u64, pool_id: u64) -> Self {
        MemoryEvent {
            kind: EventKind::Free,
            device_id,
            size_bytes,
            mem_ptr,
            pool_id,
        }
    }
}
