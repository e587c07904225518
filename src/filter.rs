//! Event filtering for KEY=VALUE expressions
//!
//! Sprint 5: cut trace volume at the source
//!
//! A busy training run emits one line per pool event; most investigations
//! only care about a slice of them. Filters drop events before any line is
//! formatted or written. Supported expressions:
//! - Event kind: events=malloc or events=malloc,free
//! - Device: device=0
//! - Size floor: min_size=1048576
//! - Owner: owner=LABEL (exact) or owner=/regex/ (pattern)
//!
//! Conditions combine conjunctively: an event must pass every configured
//! condition to be logged.

use crate::event::{EventKind, MemoryEvent};
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;

/// Event filter that determines which pool events to log
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Event kinds to include (None = both)
    kinds: Option<HashSet<EventKind>>,
    /// Device to include (None = all devices)
    device: Option<u32>,
    /// Minimum allocation size in bytes (None = no floor)
    min_size: Option<u64>,
    /// Exact owner label to include
    owner_exact: Option<String>,
    /// Owner pattern to include
    owner_regex: Option<Regex>,
}

impl EventFilter {
    /// Create a filter that logs all events
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a filter expression like "events=malloc" or "min_size=1048576"
    pub fn from_expr(expr: &str) -> Result<Self> {
        let Some((key, value)) = expr.split_once('=') else {
            bail!(
                "Invalid filter expression: {}. Expected format: KEY=VALUE",
                expr
            );
        };

        match key.trim() {
            "events" => Self::from_events_spec(value),
            "device" => {
                let device = value
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid device id: {}", value))?;
                Ok(Self::all().with_device(device))
            }
            "min_size" => {
                let min_size = value
                    .trim()
                    .parse::<u64>()
                    .with_context(|| format!("Invalid size in bytes: {}", value))?;
                Ok(Self::all().with_min_size(min_size))
            }
            "owner" => Self::from_owner_spec(value.trim()),
            other => bail!(
                "Unknown filter key: {}. Expected events, device, min_size, or owner",
                other
            ),
        }
    }

    /// Parse an event kind list (the part after "events=")
    fn from_events_spec(spec: &str) -> Result<Self> {
        let mut kinds = HashSet::new();
        for part in spec.split(',') {
            let part = part.trim();
            match part.to_ascii_lowercase().as_str() {
                "malloc" => {
                    kinds.insert(EventKind::Malloc);
                }
                "free" => {
                    kinds.insert(EventKind::Free);
                }
                _ => bail!("Unknown event kind: {}. Expected malloc or free", part),
            }
        }
        Ok(Self {
            kinds: Some(kinds),
            ..Self::default()
        })
    }

    /// Parse an owner spec: /re/ is a pattern, anything else is exact
    fn from_owner_spec(spec: &str) -> Result<Self> {
        if spec.len() >= 2 && spec.starts_with('/') && spec.ends_with('/') {
            let pattern = &spec[1..spec.len() - 1];
            let regex = Regex::new(pattern)
                .with_context(|| format!("Invalid owner pattern: {}", pattern))?;
            Ok(Self::all().with_owner_regex(regex))
        } else {
            Ok(Self::all().with_owner(spec))
        }
    }

    /// Restrict to the given event kinds
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = EventKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Restrict to one device
    pub fn with_device(mut self, device: u32) -> Self {
        self.device = Some(device);
        self
    }

    /// Drop events smaller than the given byte count
    pub fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = Some(min_size);
        self
    }

    /// Restrict to an exact owner label
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner_exact = Some(owner.into());
        self.owner_regex = None;
        self
    }

    /// Restrict to owners matching a pattern
    pub fn with_owner_regex(mut self, regex: Regex) -> Self {
        self.owner_regex = Some(regex);
        self.owner_exact = None;
        self
    }

    /// Check if an event with the given owner should be logged
    pub fn should_log(&self, event: &MemoryEvent, owner: &str) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(device) = self.device {
            if event.device_id != device {
                return false;
            }
        }
        if let Some(min_size) = self.min_size {
            if event.size_bytes < min_size {
                return false;
            }
        }
        if let Some(exact) = &self.owner_exact {
            if owner != exact {
                return false;
            }
        }
        if let Some(regex) = &self.owner_regex {
            if !regex.is_match(owner) {
                return false;
            }
        }
        true
    }
}
