//! Fuzz target for public surface extraction.
//!
//! Arbitrary UTF-8 must either extract or fail with a `CodeParse` error
//! pointing at a real line; it must never panic or loop.
//!
//! Run with: cargo +nightly fuzz run surface_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use medic_core::SurfaceError;
use medic_surface::{PythonSurfaceExtractor, SurfaceExtractor};

fuzz_target!(|data: &[u8]| {
    if let Ok(code) = std::str::from_utf8(data) {
        match PythonSurfaceExtractor::new().extract(code, "new") {
            Ok(surface) => {
                for (name, function) in &surface.functions {
                    assert_eq!(name, &function.name);
                    assert!(!name.starts_with('_') || name.starts_with("__"));
                }
                for (name, class) in &surface.classes {
                    assert_eq!(name, &class.name);
                }
            }
            Err(SurfaceError::CodeParse { line, .. }) => {
                assert!(line >= 1, "lines are 1-based");
                assert!(line <= code.lines().count().max(1), "line past end of input");
            }
        }
    }
});
