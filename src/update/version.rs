/*
 * Copyright 2025 Michael Krolikowski
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{cmp::Ordering, fmt};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    Other,
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateType::Major => "major",
            UpdateType::Minor => "minor",
            UpdateType::Patch => "patch",
            UpdateType::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
enum Token<'a> {
    /// Digits only, leading zeros stripped.
    Numeric(&'a str),
    Text(&'a str),
}

impl Token<'_> {
    fn as_str(&self) -> &str {
        match self {
            Token::Numeric(s) | Token::Text(s) => s,
        }
    }
}

const ZERO: Token<'static> = Token::Numeric("0");

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn tokens(version: &str) -> Vec<Token<'_>> {
    strip_v(version)
        .split(['.', '-'])
        .map(|t| {
            if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
                match t.trim_start_matches('0') {
                    "" => ZERO,
                    digits => Token::Numeric(digits),
                }
            } else {
                Token::Text(t)
            }
        })
        .collect()
}

fn compare_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Numeric(a), Token::Numeric(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
        (a, b) => a.as_str().cmp(b.as_str()),
    }
}

/// Orders two version tags position by position.
///
/// Numeric positions compare as numbers, any other position falls back to a
/// string comparison. Missing trailing positions count as `0`. There is no
/// notion of pre-release precedence, so unstable tags have to be filtered out
/// before they get here.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let a = tokens(a);
    let b = tokens(b);
    (0..a.len().max(b.len()))
        .map(|i| compare_tokens(a.get(i).unwrap_or(&ZERO), b.get(i).unwrap_or(&ZERO)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// First three positions, anything that is not a number counting as `0`.
fn leading_numbers(version: &str) -> [Token<'_>; 3] {
    let mut numbers = [ZERO; 3];
    for (n, t) in numbers.iter_mut().zip(tokens(version)) {
        if let Token::Numeric(_) = t {
            *n = t;
        }
    }
    numbers
}

/// Size of the jump from `current` to `candidate`, looking only at the first
/// three positions. Meant to be called once `candidate` is known to be newer.
pub fn classify(current: &str, candidate: &str) -> UpdateType {
    let current = leading_numbers(current);
    let candidate = leading_numbers(candidate);
    let newer = |i: usize| compare_tokens(&candidate[i], &current[i]).is_gt();
    if newer(0) {
        UpdateType::Major
    } else if newer(1) {
        UpdateType::Minor
    } else if newer(2) {
        UpdateType::Patch
    } else {
        UpdateType::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_segments() {
        assert_eq!(compare_versions("6.7.1", "6.7.0"), Ordering::Greater);
        assert_eq!(compare_versions("1.9", "1.10"), Ordering::Less);
        assert_eq!(compare_versions("10.0", "9.9.9"), Ordering::Greater);
    }

    #[test]
    fn leading_v_is_ignored() {
        assert_eq!(compare_versions("v1.2.3", "1.2.3"), Ordering::Equal);
        assert_eq!(compare_versions("v1.2.4", "1.2.3"), Ordering::Greater);
    }

    #[test]
    fn missing_positions_are_zero() {
        assert_eq!(compare_versions("1.0", "1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.1", "1"), Ordering::Greater);
    }

    #[test]
    fn leading_zeros_and_large_numbers() {
        assert_eq!(compare_versions("1.01", "1.1"), Ordering::Equal);
        assert_eq!(
            compare_versions("20240101000000000000", "99999999999999999999"),
            Ordering::Less
        );
    }

    #[test]
    fn text_positions_fall_back_to_strings() {
        assert_eq!(compare_versions("1.2-alpine", "1.2-bookworm"), Ordering::Less);
        assert_eq!(compare_versions("1.2.3", "1.2.x"), Ordering::Less);
        // "0" sorts before any letter, so a suffix beats a missing position
        assert_eq!(compare_versions("1.2-alpine", "1.2"), Ordering::Greater);
    }

    #[test]
    fn reflexive_and_antisymmetric() {
        let versions = [
            "1", "1.0", "v1.0.0", "1.10", "1.9", "2.0-rc1", "2.0-alpine", "latest", "", "1..2",
            "2024.01.05",
        ];
        for a in versions {
            assert_eq!(compare_versions(a, a), Ordering::Equal, "{a}");
            for b in versions {
                assert_eq!(
                    compare_versions(a, b),
                    compare_versions(b, a).reverse(),
                    "{a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn classify_by_first_three_positions() {
        assert_eq!(classify("6.7.0", "6.7.1"), UpdateType::Patch);
        assert_eq!(classify("1.2.3", "1.3.0"), UpdateType::Minor);
        assert_eq!(classify("1.2.3", "2.0.0"), UpdateType::Major);
        assert_eq!(classify("v1.2", "v1.2.1"), UpdateType::Patch);
    }

    #[test]
    fn classify_numbers_beyond_u64() {
        assert_eq!(
            classify("20240101000000000000", "20250101000000000000"),
            UpdateType::Major
        );
        assert_eq!(
            classify("1.18446744073709551616", "1.18446744073709551617"),
            UpdateType::Minor
        );
        assert_eq!(classify("1.2.x", "1.2.3"), UpdateType::Patch);
    }

    #[test]
    fn classify_beyond_third_position_is_other() {
        assert_eq!(compare_versions("1.2.3.5", "1.2.3.4"), Ordering::Greater);
        assert_eq!(classify("1.2.3.4", "1.2.3.5"), UpdateType::Other);
        assert_eq!(compare_versions("1.2.3-2", "1.2.3-1"), Ordering::Greater);
        assert_eq!(classify("1.2.3-1", "1.2.3-2"), UpdateType::Other);
    }

    #[test]
    fn classify_ignores_lower_positions_going_down() {
        // a minor bump with a smaller patch number still counts as minor
        assert_eq!(classify("1.2.9", "1.3.0"), UpdateType::Minor);
        // position 1 increased but position 0 is what the comparator saw; the
        // classifier only checks each position for being strictly greater
        assert_eq!(classify("2.0.0", "1.5.0"), UpdateType::Minor);
    }

    #[test]
    fn classify_text_positions_count_as_zero() {
        assert_eq!(classify("1.2.3-alpine", "1.2.3-bookworm"), UpdateType::Other);
        assert_eq!(classify("x.1", "1.0"), UpdateType::Major);
    }
}
