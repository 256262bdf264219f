//! Sequential egg id allocation.
//!
//! Egg ids follow the sequence `Egg-1, Egg-2, ...`. The next number is
//! derived from the collection itself: the highest `Egg-<digits>` suffix
//! among real entries, plus one. An operator can move the sequence by
//! recording a reset marker (an entry with `isReset` set) whose `egg_id`
//! carries the new baseline; the latest marker wins.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use crate::entry::Entry;

/// Prefix shared by every allocated egg id.
pub const EGG_ID_PREFIX: &str = "Egg-";

fn egg_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Egg-(\d+)").expect("egg id pattern is valid"))
}

/// Extract the number from the first `Egg-<digits>` run in an id.
///
/// Trailing text is ignored, so `Egg-12b` reads as 12. Returns `None` for ids
/// with no such run or whose number does not fit in a `u64`.
#[must_use]
pub fn parse_egg_number(egg_id: &str) -> Option<u64> {
    egg_id_pattern()
        .captures(egg_id.trim())
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Format an egg number as an id.
#[must_use]
pub fn format_egg_id(number: u64) -> String {
    format!("{EGG_ID_PREFIX}{number}")
}

/// Compute the number the next allocation will receive.
///
/// Returns `None` only when the sequence would overflow.
#[must_use]
pub fn next_egg_number(entries: &[Entry]) -> Option<u64> {
    let marker = entries
        .iter()
        .enumerate()
        .rev()
        .find(|(_, entry)| entry.is_reset)
        .and_then(|(idx, entry)| parse_egg_number(&entry.egg_id).map(|n| (idx, n)));

    let (scan_from, baseline) = match marker {
        Some((idx, number)) => (idx + 1, number.max(1)),
        None => (0, 1),
    };

    let highest = entries[scan_from..]
        .iter()
        .filter(|entry| entry.is_display())
        .filter_map(|entry| parse_egg_number(&entry.egg_id))
        .max()
        .unwrap_or(0);

    let mut candidate = baseline.max(highest.checked_add(1)?);

    let taken: HashSet<u64> = entries
        .iter()
        .filter(|entry| entry.is_display())
        .filter_map(|entry| parse_egg_number(&entry.egg_id))
        .collect();
    while taken.contains(&candidate) {
        candidate = candidate.checked_add(1)?;
    }

    Some(candidate)
}

/// Allocate the next egg id for the given collection.
///
/// Falls back to a timestamp-derived id (`Egg-<epoch millis>`) when the
/// sequence cannot advance, so ingest always makes progress.
#[must_use]
pub fn next_egg_id(entries: &[Entry]) -> String {
    if let Some(number) = next_egg_number(entries) {
        debug!(egg_number = number, "allocated sequential egg id");
        format_egg_id(number)
    } else {
        let millis = Utc::now().timestamp_millis();
        warn!(fallback = millis, "egg sequence exhausted, using timestamp id");
        format!("{EGG_ID_PREFIX}{millis}")
    }
}

/// Build the reset marker that makes `number` the next allocation.
#[must_use]
pub fn reset_marker(number: u64) -> Entry {
    Entry::reset_marker(format_egg_id(number))
}
