//! Dotted release numbers as published by the upstream file listings.
//!
//! Versions are not compared component by component. Every component is
//! exploded into its decimal digits and the digit runs are concatenated, so
//! `1.10` becomes `[1, 1, 0]` and sorts *below* `1.9` (`[1, 9]`). Existing
//! source trees on disk were pruned with this ordering, so it is kept.

use crate::error::{Error, Result};

/// Explode a dotted version into its digit sequence.
///
/// A bare number without any `.` is rejected, as is any component that is not
/// a non-negative decimal integer.
pub fn digits_of(version: &str) -> Result<Vec<u32>> {
    let components: Vec<&str> = version.split('.').collect();
    if components.len() == 1 {
        return Err(Error::parse(
            format!("version '{version}'"),
            "expected at least one '.' separator",
        ));
    }

    let mut digits = Vec::new();
    for component in components {
        let trimmed = component.trim();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if unsigned.is_empty() || !unsigned.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(Error::parse(
                format!("version '{version}'"),
                format!("component '{component}' is not a decimal integer"),
            ));
        }
        // Any length is accepted; leading zeros are not digits of the value.
        let significant = unsigned.trim_start_matches('0');
        let significant = if significant.is_empty() { "0" } else { significant };
        digits.extend(significant.bytes().map(|digit| u32::from(digit - b'0')));
    }
    Ok(digits)
}

/// `true` when `v1` is strictly greater than `v2`; `false` when either side
/// does not parse.
pub fn is_greater(v1: &str, v2: &str) -> bool {
    let (Ok(left), Ok(right)) = (digits_of(v1), digits_of(v2)) else {
        return false;
    };

    for (l, r) in left.iter().zip(right.iter()) {
        if l != r {
            return l > r;
        }
    }
    left.len() > right.len()
}
