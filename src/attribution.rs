//! Layer attribution for memory events
//!
//! Sprint 2: frame-pair scan with configurable layer conventions
//! Sprint 4: scope-marker attribution
//!
//! Given the call stack captured when a pool event fired, the attributor
//! finds the frame pair that identifies the logical layer responsible and
//! renders it as an owner label. Hosts that annotate their call sites with
//! explicit scope markers get the same result without any frame heuristics.
//!
//! # Stack ordering
//!
//! Snapshots are ordered innermost first (index 0 nearest the hook). The
//! two innermost frames belong to the hook machinery and the outermost
//! frame is the program entry; none of them can be an owner.

use crate::frame::StackFrame;
use crate::scope::ScopeMarker;
use serde::{Deserialize, Serialize};

/// Owner label emitted when no frame pair matches the layer convention
pub const UNKNOWN_OWNER: &str = "UNKNOWN";

/// Innermost frames belonging to the hook machinery, never scanned as `current`
const INNER_SYNTHETIC_FRAMES: usize = 2;

/// Outermost frames excluded from the scan (the program entry frame)
const OUTER_SKIPPED_FRAMES: usize = 1;

/// Naming convention that marks a frame pair as a layer invocation
///
/// The default is the classic convention of the original host framework:
/// layer objects are entered through `__call__`, and parameter uploads go
/// through `to_gpu` defined in `link.py`. Other hosts substitute their own
/// names; the scan itself is convention-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerConvention {
    /// Function name of the generic layer invocation entry point
    pub call_entry: String,
    /// Function that moves parameters onto the device
    pub transfer_function: String,
    /// Base name of the module file defining `transfer_function`
    pub transfer_file: String,
}

impl LayerConvention {
    /// Convention with caller-chosen names
    pub fn new(
        call_entry: impl Into<String>,
        transfer_function: impl Into<String>,
        transfer_file: impl Into<String>,
    ) -> Self {
        LayerConvention {
            call_entry: call_entry.into(),
            transfer_function: transfer_function.into(),
            transfer_file: transfer_file.into(),
        }
    }

    /// The classic `__call__` / `to_gpu` / `link.py` convention
    pub fn classic() -> Self {
        LayerConvention::new("__call__", "to_gpu", "link.py")
    }

    /// Whether the `(current, caller)` pair marks a layer invocation
    fn matches(&self, current: &StackFrame, caller: &StackFrame) -> bool {
        current.function == self.call_entry
            || (caller.function == self.transfer_function
                && caller.file_basename() == self.transfer_file)
    }
}

impl Default for LayerConvention {
    fn default() -> Self {
        LayerConvention::classic()
    }
}

/// Attribution outcome for one memory event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionResult {
    /// Owner label, or [`UNKNOWN_OWNER`] when nothing matched
    pub owner: String,
    /// Full caller chain; populated only in verbose mode
    pub chain: Vec<String>,
}

impl AttributionResult {
    /// Result carrying the unknown sentinel and no chain
    pub fn unknown() -> Self {
        AttributionResult {
            owner: UNKNOWN_OWNER.to_string(),
            chain: Vec::new(),
        }
    }

    /// Whether no owner could be identified
    pub fn is_unknown(&self) -> bool {
        self.owner == UNKNOWN_OWNER
    }
}

/// Attributes memory events to the logical layer that triggered them
///
/// Pure over its inputs: attributing the same snapshot twice yields the
/// same result, and nothing is mutated or retained.
#[derive(Debug, Clone, Default)]
pub struct Attributor {
    convention: LayerConvention,
}

impl Attributor {
    /// Attributor using the classic layer convention
    pub fn new() -> Self {
        Attributor::default()
    }

    /// Attributor using a caller-supplied convention
    pub fn with_convention(convention: LayerConvention) -> Self {
        Attributor { convention }
    }

    /// The active convention
    pub fn convention(&self) -> &LayerConvention {
        &self.convention
    }

    /// Attribute a memory event to the frame pair that triggered it
    ///
    /// # Algorithm
    ///
    /// 1. Scan pairs `(current = stack[i], caller = stack[i-1])` for `i`
    ///    from `len-2` down to `2`, so the two innermost synthetic frames
    ///    and the outermost frame are never examined as `current`. The scan
    ///    starts at the outermost eligible pair: with nested layer calls the
    ///    top-level invocation site wins, which is what attributes an event
    ///    to the model source rather than to library internals.
    /// 2. A pair matches per [`LayerConvention`]; the first match renders
    ///    `caller.function:caller_file:current_file:current_line` and stops
    ///    the scan.
    /// 3. No match (or fewer than 4 frames) yields [`UNKNOWN_OWNER`].
    /// 4. In verbose mode the chain collects frames `2..=len-2` in stack
    ///    order, rendered as `function:file:line` entries.
    pub fn attribute(&self, stack: &[StackFrame], verbose: bool) -> AttributionResult {
        let len = stack.len();
        if len < INNER_SYNTHETIC_FRAMES + OUTER_SKIPPED_FRAMES + 1 {
            return AttributionResult::unknown();
        }

        let mut owner = None;
        for i in (INNER_SYNTHETIC_FRAMES..=len - 2).rev() {
            let current = &stack[i];
            let caller = &stack[i - 1];
            if self.convention.matches(current, caller) {
                owner = Some(format!(
                    "{}:{}:{}:{}",
                    caller.function,
                    caller.file_basename(),
                    current.file_basename(),
                    current.line
                ));
                break;
            }
        }

        let chain = if verbose {
            stack[INNER_SYNTHETIC_FRAMES..=len - 2]
                .iter()
                .map(|frame| frame.to_string())
                .collect()
        } else {
            Vec::new()
        };

        AttributionResult {
            owner: owner.unwrap_or_else(|| UNKNOWN_OWNER.to_string()),
            chain,
        }
    }

    /// Attribute from explicit scope markers instead of a frame snapshot
    ///
    /// Markers are expected in push order (outermost first). The innermost
    /// marker owns the event; the verbose chain lists labels innermost to
    /// outermost. An empty stack yields [`UNKNOWN_OWNER`].
    pub fn attribute_scopes(&self, markers: &[ScopeMarker], verbose: bool) -> AttributionResult {
        let owner = match markers.last() {
            Some(marker) => marker.label.clone(),
            None => return AttributionResult::unknown(),
        };

        let chain = if verbose {
            markers.iter().rev().map(|m| m.label.clone()).collect()
        } else {
            Vec::new()
        };

        AttributionResult { owner, chain }
    }
}
