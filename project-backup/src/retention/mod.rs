//! Tiered retention for stored bundles.
//!
//! A bundle's tier comes from the calendar position of the timestamp in its
//! file name, never from the file system:
//!
//! | Bundle date        | Tier    | Deleted once older than   |
//! |--------------------|---------|---------------------------|
//! | Sunday             | weekly  | `weeks * 7` days          |
//! | 1st of the month   | monthly | `months * 30` days        |
//! | any other day      | daily   | `days` days               |
//!
//! The rules are checked in the order daily, weekly, monthly and the first
//! match wins. Sunday and 1st-of-month bundles are exempt from the daily rule.
//! A bundle dated on a Sunday that is also the 1st is judged by the weekly
//! rule first and only reaches the monthly rule if the weekly one keeps it.

use crate::archive::{BUNDLE_EXTENSION, TIMESTAMP_FORMAT};
use crate::config::RetentionConfig;
use crate::utils::errors::Result;
use chrono::{Datelike, NaiveDateTime, Weekday};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Daily,
    Weekly,
    Monthly,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tier::Daily => "daily",
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Retain,
    Delete(Tier),
}

/// Deletion tallies of one pruning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,

    /// Bundles inspected and kept
    pub retained: usize,

    /// `.zip` files without a parsable timestamp
    pub skipped: usize,
}

impl PruneReport {
    pub fn deleted(&self) -> usize {
        self.daily + self.weekly + self.monthly
    }

    fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Daily => self.daily += 1,
            Tier::Weekly => self.weekly += 1,
            Tier::Monthly => self.monthly += 1,
        }
    }
}

/// Extract the timestamp from `<prefix>_<YYYYMMDD>_<HHMMSS>.zip`.
///
/// The two trailing underscore-separated fields are used, so the prefix may
/// itself contain underscores. Returns `None` for anything else.
pub fn parse_bundle_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let stem = file_name.strip_suffix(BUNDLE_EXTENSION)?;
    let (rest, time) = stem.rsplit_once('_')?;
    let date = rest.rsplit_once('_').map_or(rest, |(_, date)| date);

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if date.len() != 8 || time.len() != 6 || !all_digits(date) || !all_digits(time) {
        return None;
    }

    NaiveDateTime::parse_from_str(&format!("{}_{}", date, time), TIMESTAMP_FORMAT).ok()
}

/// Whole days elapsed from `timestamp` to `now`, rounded down.
pub fn age_in_days(now: NaiveDateTime, timestamp: NaiveDateTime) -> i64 {
    (now - timestamp).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// Decide the fate of a bundle stamped `timestamp` at instant `now`.
pub fn classify(timestamp: NaiveDateTime, now: NaiveDateTime, policy: &RetentionConfig) -> Verdict {
    let age = age_in_days(now, timestamp);
    let is_sunday = timestamp.weekday() == Weekday::Sun;
    let is_first = timestamp.day() == 1;

    if age > i64::from(policy.days) && !is_sunday && !is_first {
        Verdict::Delete(Tier::Daily)
    } else if is_sunday && age > i64::from(policy.weeks) * 7 {
        Verdict::Delete(Tier::Weekly)
    } else if is_first && age > i64::from(policy.months) * 30 {
        Verdict::Delete(Tier::Monthly)
    } else {
        Verdict::Retain
    }
}

/// Scan `dir` recursively and delete every bundle whose retention expired.
///
/// Unreadable directories are logged and skipped. A failed deletion aborts
/// the pass with the underlying error.
pub fn prune(dir: &Path, now: NaiveDateTime, policy: &RetentionConfig) -> Result<PruneReport> {
    prune_with(dir, now, policy, |path| fs::remove_file(path))
}

fn prune_with<F>(
    dir: &Path,
    now: NaiveDateTime,
    policy: &RetentionConfig,
    mut remove: F,
) -> Result<PruneReport>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut report = PruneReport::default();

    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable path during pruning: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(BUNDLE_EXTENSION) {
            continue;
        }

        let Some(timestamp) = parse_bundle_timestamp(&file_name) else {
            debug!("Ignoring {}: no bundle timestamp", entry.path().display());
            report.skipped += 1;
            continue;
        };

        match classify(timestamp, now, policy) {
            Verdict::Delete(tier) => {
                if let Err(e) = remove(entry.path()) {
                    error!("Failed to delete {}: {}", entry.path().display(), e);
                    return Err(e.into());
                }
                debug!("Deleted {} bundle {}", tier, entry.path().display());
                report.record(tier);
            }
            Verdict::Retain => report.retained += 1,
        }
    }

    info!("Deleted {} old daily backup(s)", report.daily);
    info!("Deleted {} old weekly backup(s)", report.weekly);
    info!("Deleted {} old monthly backup(s)", report.monthly);

    Ok(report)
}
