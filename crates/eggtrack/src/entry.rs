//! Core label entry types for eggtrack.
//!
//! An [`Entry`] is one printed label: an egg identifier, the name and cage it
//! belongs to, and the link its QR code points at. The whole collection is
//! persisted as a single JSON array, so the serde shape here is the on-disk
//! format.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single label entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Opaque unique identifier.
    pub id: String,

    /// Display identifier, normally `Egg-<N>`.
    pub egg_id: String,

    /// Name printed on the label.
    pub name: String,

    /// Cage (location tag) printed on the label.
    pub cage: String,

    /// Destination encoded in the label's QR code.
    pub link: String,

    /// When the entry was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    /// Marks a synthetic counter-reset record rather than a physical egg.
    #[serde(rename = "isReset", default, skip_serializing_if = "is_false")]
    pub is_reset: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl Entry {
    /// Create a new entry with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(
        egg_id: impl Into<String>,
        name: impl Into<String>,
        cage: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            id: new_entry_id(),
            egg_id: egg_id.into(),
            name: name.into(),
            cage: cage.into(),
            link: link.into(),
            created_at: now_millis(),
            is_reset: false,
        }
    }

    /// Create a counter-reset marker carrying `egg_id` as the new baseline.
    #[must_use]
    pub fn reset_marker(egg_id: impl Into<String>) -> Self {
        Self {
            id: new_entry_id(),
            egg_id: egg_id.into(),
            name: String::new(),
            cage: String::new(),
            link: String::new(),
            created_at: now_millis(),
            is_reset: true,
        }
    }

    /// Whether this entry should be shown and counted.
    #[must_use]
    pub fn is_display(&self) -> bool {
        !self.is_reset
    }

    /// Title printed at the top of a label: the name, or the egg id when
    /// the name is blank.
    #[must_use]
    pub fn title(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.egg_id
        } else {
            &self.name
        }
    }
}

/// Generate a new opaque entry id.
#[must_use]
pub fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time truncated to millisecond precision, matching the ISO-8601
/// timestamps already present in stored documents.
#[must_use]
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
