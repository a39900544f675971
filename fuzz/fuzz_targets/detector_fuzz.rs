//! Fuzz target for breaking change detection.
//!
//! The input is split at the first NUL byte into an old and a new snapshot.
//! Comparing them must never fail, and comparing a snapshot with itself must
//! report no changes.
//!
//! Run with: cargo +nightly fuzz run detector_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use medic_core::{AgentName, SemVer};
use medic_surface::BreakingChangeDetector;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (old, new) = input.split_once('\0').unwrap_or((input, ""));
    let detector = BreakingChangeDetector::default();
    let agent = AgentName::from("fuzz");
    let from = SemVer::new(1, 0, 0);
    let to = SemVer::new(1, 1, 0);

    let report = detector.compare(&agent, from, to, old, new);
    assert_eq!(report.migration_required, report.breaking_changes().next().is_some());

    let same = detector.compare(&agent, from, to, old, old);
    assert!(same.changes.is_empty());
});
