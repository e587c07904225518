//! Per-owner memory accounting
//!
//! Sprint 6: aggregate statistics alongside the line stream
//!
//! Trace lines answer "what happened"; the tracker answers "who holds how
//! much". Every event the hook records also updates counters keyed by
//! owner label, so at any point the hook can report allocation totals,
//! live bytes, and the high-water mark per layer.

use crate::event::{EventKind, MemoryEvent};
use fnv::FnvHashMap;
use serde::Serialize;

/// Statistics for a single owner label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OwnerStats {
    /// Number of allocations attributed to this owner
    pub malloc_count: u64,
    /// Number of frees attributed to this owner
    pub free_count: u64,
    /// Total bytes allocated
    pub bytes_allocated: u64,
    /// Total bytes freed
    pub bytes_freed: u64,
    /// Bytes currently held
    pub live_bytes: u64,
    /// Highest live_bytes ever observed
    pub peak_live_bytes: u64,
}

/// Summary totals across all owners
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatTotals {
    pub malloc_count: u64,
    pub free_count: u64,
    pub bytes_allocated: u64,
    pub bytes_freed: u64,
    pub live_bytes: u64,
}

/// Root JSON report structure
#[derive(Debug, Serialize)]
struct JsonStatsReport<'a> {
    /// Format version identifier
    version: String,
    /// Format name
    format: String,
    /// Per-owner statistics, sorted by bytes allocated descending
    owners: Vec<JsonOwnerEntry<'a>>,
    /// Totals across all owners
    totals: StatTotals,
}

#[derive(Debug, Serialize)]
struct JsonOwnerEntry<'a> {
    owner: &'a str,
    #[serde(flatten)]
    stats: &'a OwnerStats,
}

/// Tracks memory statistics for all owners
#[derive(Debug, Clone, Default)]
pub struct MemoryStatsTracker {
    /// Map from owner label to statistics
    stats: FnvHashMap<String, OwnerStats>,
}

impl MemoryStatsTracker {
    /// Create a new statistics tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event under its attributed owner
    ///
    /// Frees observed without a matching allocation (the hook was attached
    /// mid-run) saturate live_bytes at zero instead of wrapping.
    pub fn record(&mut self, owner: &str, event: &MemoryEvent) {
        let entry = self.stats.entry(owner.to_string()).or_default();
        match event.kind {
            EventKind::Malloc => {
                entry.malloc_count += 1;
                entry.bytes_allocated += event.size_bytes;
                entry.live_bytes += event.size_bytes;
                if entry.live_bytes > entry.peak_live_bytes {
                    entry.peak_live_bytes = entry.live_bytes;
                }
            }
            EventKind::Free => {
                entry.free_count += 1;
                entry.bytes_freed += event.size_bytes;
                entry.live_bytes = entry.live_bytes.saturating_sub(event.size_bytes);
            }
        }
    }

    /// Get access to the stats map for export
    pub fn stats_map(&self) -> &FnvHashMap<String, OwnerStats> {
        &self.stats
    }

    /// Statistics for one owner, if any event was attributed to it
    pub fn owner(&self, owner: &str) -> Option<&OwnerStats> {
        self.stats.get(owner)
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Calculate totals across all owners
    pub fn totals(&self) -> StatTotals {
        let mut totals = StatTotals::default();
        for stats in self.stats.values() {
            totals.malloc_count += stats.malloc_count;
            totals.free_count += stats.free_count;
            totals.bytes_allocated += stats.bytes_allocated;
            totals.bytes_freed += stats.bytes_freed;
            totals.live_bytes += stats.live_bytes;
        }
        totals
    }

    /// Owners sorted by bytes allocated (descending), name as tiebreak
    fn sorted_owners(&self) -> Vec<(&String, &OwnerStats)> {
        let mut sorted: Vec<_> = self.stats.iter().collect();
        sorted.sort_by(|a, b| {
            b.1.bytes_allocated
                .cmp(&a.1.bytes_allocated)
                .then_with(|| a.0.cmp(b.0))
        });
        sorted
    }

    /// Print statistics summary to stderr
    pub fn print_summary(&self) {
        if self.stats.is_empty() {
            eprintln!("No memory events recorded.");
            return;
        }

        let totals = self.totals();

        eprintln!("   allocated       freed        live        peak   mallocs    frees owner");
        eprintln!("------------ ------------ ------------ ------------ --------- -------- ----------------");

        for (name, stats) in self.sorted_owners() {
            eprintln!(
                "{:>12} {:>12} {:>12} {:>12} {:>9} {:>8} {}",
                stats.bytes_allocated,
                stats.bytes_freed,
                stats.live_bytes,
                stats.peak_live_bytes,
                stats.malloc_count,
                stats.free_count,
                name
            );
        }

        eprintln!("------------ ------------ ------------ ------------ --------- -------- ----------------");
        eprintln!(
            "{:>12} {:>12} {:>12} {:>12} {:>9} {:>8} total",
            totals.bytes_allocated,
            totals.bytes_freed,
            totals.live_bytes,
            "",
            totals.malloc_count,
            totals.free_count,
        );
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        let report = JsonStatsReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "rastro-stats-v1".to_string(),
            owners: self
                .sorted_owners()
                .into_iter()
                .map(|(owner, stats)| JsonOwnerEntry { owner, stats })
                .collect(),
            totals: self.totals(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}
