//! Fuzz test for identifier validation
//!
//! This fuzz target feeds arbitrary byte sequences through the handle and
//! group id parsers to find:
//! - Panics or crashes
//! - Accepted values that violate the documented format
//!
//! Run with: cargo +nightly fuzz run ident_fuzz -- -max_total_time=60

#![no_main]

use foothold_core::{GroupId, Handle};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Parsing should handle any valid UTF-8 string without panicking
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(handle) = Handle::parse(input) {
            let s = handle.as_str();

            // An accepted handle obeys the documented format
            assert!(
                (3..=24).contains(&s.len()),
                "Accepted handle length out of range"
            );
            assert!(
                s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')),
                "Accepted handle contains a forbidden character"
            );

            // A validated handle must reparse to itself
            assert_eq!(Handle::parse(s), Ok(handle));
        }

        if let Ok(group) = GroupId::parse(input) {
            let s = group.as_str();
            assert!(
                (1..=16).contains(&s.len()),
                "Accepted group id length out of range"
            );
            assert!(
                s.chars().all(|c| c.is_ascii_alphanumeric()),
                "Accepted group id contains a forbidden character"
            );
        }
    }
});
