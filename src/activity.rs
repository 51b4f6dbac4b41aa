//! Viewer activity log
//!
//! Bounded, timestamped record of the user-visible transitions the viewer
//! made. Oldest entries are dropped once the limit is reached.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One recorded transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Unique entry ID
    pub entry_id: String,

    /// When the transition happened
    pub timestamp: DateTime<Utc>,

    /// Human-readable description
    pub description: String,
}

impl ActivityEntry {
    pub fn new(description: &str) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    limit: usize,
}

impl ActivityLog {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn record(&mut self, description: &str) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityEntry::new(description));
    }

    /// Entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&ActivityEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
