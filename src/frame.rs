//! Stack frame snapshots for memory-event attribution
//!
//! A frame records the function name, source file, and line of one call-stack
//! entry at the moment an allocation or free event fired. Snapshots are
//! ordered innermost first: index 0 is the frame nearest the hook invocation,
//! the last index is the outermost caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single stack frame captured at event time
///
/// Read-only snapshot; created for one hook invocation and discarded after
/// use. `file` keeps the full path as reported by the host runtime, and
/// [`StackFrame::file_basename`] strips it down to the final path component
/// for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// Function name as reported by the host runtime
    pub function: String,
    /// Source file path (possibly absolute)
    pub file: String,
    /// Line number within `file`
    pub line: u32,
}

impl StackFrame {
    /// Create a frame record
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        StackFrame {
            function: function.into(),
            file: file.into(),
            line,
        }
    }

    /// Final component of the file path (after the last `/`)
    ///
    /// Paths without a separator are returned unchanged.
    pub fn file_basename(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}

/// Chain-entry rendering: `function:file_basename:line`
impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.function, self.file_basename(), self.line)
    }
}
