//! Matching free-text location cells to known storage locations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::fold_accents;

/// Default minimum Jaro-Winkler similarity for a fuzzy match
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.88;

/// Minimal view of a location used for matching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRef {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Outcome of matching one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationMatch {
    Exact { location: LocationRef },
    Fuzzy { location: LocationRef, score: f64 },
    Ambiguous { candidates: Vec<String> },
    NotFound,
}

impl LocationMatch {
    pub fn location(&self) -> Option<&LocationRef> {
        match self {
            LocationMatch::Exact { location } | LocationMatch::Fuzzy { location, .. } => {
                Some(location)
            }
            _ => None,
        }
    }
}

/// Normalise a location code or name for comparison
///
/// Folds accents, uppercases, drops spaces and punctuation, abbreviates "PARQUE" to "P"
/// and strips leading zeros from numbers: "Parque 01" and "p-1" both become "P1".
pub fn normalize_location_code(input: &str) -> String {
    let compact: String = fold_accents(input)
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let abbreviated = compact.replace("PARQUE", "P");

    let mut out = String::with_capacity(abbreviated.len());
    let mut number = String::new();
    for c in abbreviated.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        push_number(&mut out, &mut number);
        out.push(c);
    }
    push_number(&mut out, &mut number);
    out
}

fn push_number(out: &mut String, number: &mut String) {
    if number.is_empty() {
        return;
    }
    let trimmed = number.trim_start_matches('0');
    out.push_str(if trimmed.is_empty() { "0" } else { trimmed });
    number.clear();
}

fn digits_of(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[derive(Debug, Clone)]
struct Candidate {
    code: String,
    name: String,
    location: LocationRef,
}

/// Matches spreadsheet location cells against the company's active locations
#[derive(Debug, Clone)]
pub struct LocationMatcher {
    candidates: Vec<Candidate>,
    threshold: f64,
}

impl LocationMatcher {
    pub fn new(locations: &[LocationRef]) -> Self {
        Self::with_threshold(locations, DEFAULT_FUZZY_THRESHOLD)
    }

    pub fn with_threshold(locations: &[LocationRef], threshold: f64) -> Self {
        let candidates = locations
            .iter()
            .filter(|l| l.is_active)
            .map(|l| Candidate {
                code: normalize_location_code(&l.code),
                name: normalize_location_code(&l.name),
                location: l.clone(),
            })
            .collect();
        Self {
            candidates,
            threshold,
        }
    }

    pub fn find(&self, raw: &str) -> LocationMatch {
        let needle = normalize_location_code(raw);
        if needle.is_empty() {
            return LocationMatch::NotFound;
        }

        if let Some(c) = self.candidates.iter().find(|c| c.code == needle) {
            return LocationMatch::Exact {
                location: c.location.clone(),
            };
        }

        let by_name: Vec<&Candidate> = self.candidates.iter().filter(|c| c.name == needle).collect();
        match by_name.as_slice() {
            [only] => {
                return LocationMatch::Exact {
                    location: only.location.clone(),
                }
            }
            [] => {}
            many => {
                return LocationMatch::Ambiguous {
                    candidates: many.iter().map(|c| c.location.code.clone()).collect(),
                }
            }
        }

        // Numbers must agree exactly: "P12" is never a typo of "P1"
        let needle_digits = digits_of(&needle);
        let mut scored: Vec<(f64, &Candidate)> = self
            .candidates
            .iter()
            .filter_map(|c| {
                let code_score = if digits_of(&c.code) == needle_digits {
                    strsim::jaro_winkler(&needle, &c.code)
                } else {
                    0.0
                };
                let name_score = if digits_of(&c.name) == needle_digits {
                    strsim::jaro_winkler(&needle, &c.name)
                } else {
                    0.0
                };
                let score = code_score.max(name_score);
                (score >= self.threshold).then_some((score, c))
            })
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let Some(&(best, first)) = scored.first() else {
            return LocationMatch::NotFound;
        };
        let tied: Vec<String> = scored
            .iter()
            .filter(|(s, _)| (best - s).abs() < 1e-9)
            .map(|(_, c)| c.location.code.clone())
            .collect();
        if tied.len() > 1 {
            return LocationMatch::Ambiguous { candidates: tied };
        }
        LocationMatch::Fuzzy {
            location: first.location.clone(),
            score: best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(code: &str, name: &str) -> LocationRef {
        LocationRef {
            id: Uuid::new_v4(),
            code: code.into(),
            name: name.into(),
            is_active: true,
        }
    }

    #[test]
    fn normalisation() {
        assert_eq!(normalize_location_code("Parque 01"), "P1");
        assert_eq!(normalize_location_code("p-1"), "P1");
        assert_eq!(normalize_location_code("P10"), "P10");
        assert_eq!(normalize_location_code("P0"), "P0");
        assert_eq!(normalize_location_code("Armazém 007 B"), "ARMAZEM7B");
        assert_eq!(normalize_location_code("  "), "");
    }

    #[test]
    fn exact_and_fuzzy() {
        let locations = vec![loc("P1", "Parque Norte"), loc("P2", "Parque Sul")];
        let matcher = LocationMatcher::new(&locations);

        assert!(matches!(matcher.find("parque 1"), LocationMatch::Exact { location } if location.code == "P1"));
        assert!(matches!(matcher.find("Parque Sul"), LocationMatch::Exact { location } if location.code == "P2"));
        assert!(matches!(matcher.find("Parque Nrte"), LocationMatch::Fuzzy { location, .. } if location.code == "P1"));
        assert_eq!(matcher.find("P3"), LocationMatch::NotFound);
        assert_eq!(matcher.find("P12"), LocationMatch::NotFound);
    }

    #[test]
    fn inactive_locations_are_ignored() {
        let mut closed = loc("P9", "Antigo");
        closed.is_active = false;
        let matcher = LocationMatcher::new(&[closed]);
        assert_eq!(matcher.find("P9"), LocationMatch::NotFound);
    }
}
