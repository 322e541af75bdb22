//! Candidate path construction for call recordings
//!
//! The upstream call log stores an imprecise recording locator: sometimes a
//! full path, sometimes a bucket-relative path, sometimes just a filename,
//! occasionally URL-encoded. The locator turns that hint into an ordered
//! list of absolute paths to probe on the recording server. No I/O happens
//! here; the fetcher does the probing.
//!
//! Candidates are ordered most-likely-first: explicit path variants, then
//! the rolling date window (today, then the previous 7 days), then bare
//! filename fallbacks.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Bucket prefix some log writers prepend to the locator
const BUCKET_PREFIX: &str = "recordings/";

/// Days of history to probe in the rolling date window
const DATE_WINDOW_DAYS: i64 = 7;

/// Candidate path builder for the recording server
pub struct PathLocator {
    remote_root: String,
}

impl PathLocator {
    pub fn new(remote_root: impl Into<String>) -> Self {
        let mut remote_root = remote_root.into();
        while remote_root.ends_with('/') {
            remote_root.pop();
        }
        Self { remote_root }
    }

    /// Build the ordered, de-duplicated candidate list for a locator hint
    pub fn locate(&self, hint: &str) -> Vec<String> {
        self.locate_at(hint, Utc::now())
    }

    /// Same as [`locate`](Self::locate) with an explicit clock, so the
    /// date window is deterministic under test
    pub fn locate_at(&self, hint: &str, now: DateTime<Utc>) -> Vec<String> {
        // Log writers occasionally URL-encode the hint. A decode failure
        // is non-fatal; probe the raw hint instead.
        let decoded = match urlencoding::decode(hint) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => hint.to_string(),
        };

        let mut candidates = Vec::new();

        if decoded.contains('/') {
            let relative = strip_bucket_prefix(&decoded);
            candidates.push(format!("{}/{}", self.remote_root, relative));
            candidates.push(relative.to_string());
        }

        let filename = decoded.rsplit('/').next().unwrap_or(&decoded);

        for offset in 0..=DATE_WINDOW_DAYS {
            let day = now - Duration::days(offset);
            let dated = format!("{}/{}", day.format("%Y/%m/%d"), filename);
            candidates.push(format!("{}/{}", self.remote_root, dated));
            candidates.push(dated);
        }

        // Last resort: the bare filename at the root and relative to the
        // session working directory
        candidates.push(format!("{}/{}", self.remote_root, filename));
        candidates.push(filename.to_string());

        dedup_preserving_order(candidates)
    }
}

/// Strip a known bucket token and any leading slash from a path hint
fn strip_bucket_prefix(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.strip_prefix(BUCKET_PREFIX).unwrap_or(path)
}

fn dedup_preserving_order(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn locator() -> PathLocator {
        PathLocator::new("/var/spool/recordings")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_bucket_prefix_stripped_and_root_prefixed_first() {
        let candidates = locator().locate_at("recordings/2026/03/15/call-42.wav", fixed_now());
        assert_eq!(
            candidates[0],
            "/var/spool/recordings/2026/03/15/call-42.wav"
        );
        assert_eq!(candidates[1], "2026/03/15/call-42.wav");
    }

    #[test]
    fn test_leading_slash_normalized() {
        let candidates = locator().locate_at("/recordings/calls/call-42.wav", fixed_now());
        assert_eq!(candidates[0], "/var/spool/recordings/calls/call-42.wav");
    }

    #[test]
    fn test_url_encoded_hint_is_decoded() {
        let candidates = locator().locate_at("recordings%2Fcalls%2Fcall%2042.wav", fixed_now());
        assert_eq!(candidates[0], "/var/spool/recordings/calls/call 42.wav");
    }

    #[test]
    fn test_date_window_covers_today_and_prior_seven_days() {
        let candidates = locator().locate_at("call-42.wav", fixed_now());
        assert!(candidates.contains(&"/var/spool/recordings/2026/03/15/call-42.wav".to_string()));
        assert!(candidates.contains(&"/var/spool/recordings/2026/03/08/call-42.wav".to_string()));
        // Day 8 back is outside the window
        assert!(!candidates.iter().any(|c| c.contains("2026/03/07")));
    }

    #[test]
    fn test_no_duplicates() {
        let candidates = locator().locate_at("recordings/call-42.wav", fixed_now());
        let mut seen = HashSet::new();
        for candidate in &candidates {
            assert!(seen.insert(candidate), "duplicate candidate: {}", candidate);
        }
    }

    #[test]
    fn test_bare_filename_fallback_is_last() {
        let candidates = locator().locate_at("recordings/sub/call-42.wav", fixed_now());
        let len = candidates.len();
        assert_eq!(candidates[len - 2], "/var/spool/recordings/call-42.wav");
        assert_eq!(candidates[len - 1], "call-42.wav");
    }

    #[test]
    fn test_date_candidates_precede_bare_fallback() {
        let candidates = locator().locate_at("call-42.wav", fixed_now());
        let dated_pos = candidates
            .iter()
            .position(|c| c.contains("2026/03/15"))
            .unwrap();
        let bare_pos = candidates
            .iter()
            .position(|c| c == "/var/spool/recordings/call-42.wav")
            .unwrap();
        assert!(dated_pos < bare_pos);
    }

    #[test]
    fn test_empty_hint_still_yields_date_window() {
        let candidates = locator().locate_at("", fixed_now());
        // Callers reject empty hints upstream; the locator itself still
        // produces the day-window shape.
        assert!(candidates.contains(&"/var/spool/recordings/2026/03/15/".to_string()));
    }

    #[test]
    fn test_trailing_slash_on_root_trimmed() {
        let locator = PathLocator::new("/var/spool/recordings/");
        let candidates = locator.locate_at("recordings/call-42.wav", fixed_now());
        assert_eq!(candidates[0], "/var/spool/recordings/call-42.wav");
    }
}
