#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

/// Asserts `actual` is within `tolerance` of `expected`.
pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} ± {tolerance}, got {actual}"
    );
}
