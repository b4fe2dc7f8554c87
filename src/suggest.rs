//! Levenshtein-based "did you mean" suggestions.
//!
//! Mirrors `viua::support::string::levenshtein_filter`/`levenshtein_best`
//! from the original assembler: candidates further than half the input's
//! length are discarded, then the closest survivor wins.

use strsim::levenshtein;

/// Return the closest candidate to `input`, or `None` if nothing is close
/// enough to be worth suggesting.
pub fn did_you_mean(input: &str, candidates: &[&str]) -> Option<String> {
    let threshold = (input.chars().count() / 2).max(1);

    candidates
        .iter()
        .map(|candidate| (*candidate, levenshtein(input, candidate)))
        .filter(|(candidate, distance)| *distance <= threshold && *candidate != input)
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_closest_within_threshold() {
        let known = ["return", "call", "move"];
        assert_eq!(did_you_mean("retrun", &known), Some("return".to_string()));
    }

    #[test]
    fn suggests_nothing_when_too_far() {
        let known = ["return", "call", "move"];
        assert_eq!(did_you_mean("xyz", &known), None);
    }

    #[test]
    fn suggests_nothing_for_exact_match() {
        let known = ["return", "call", "move"];
        assert_eq!(did_you_mean("return", &known), None);
    }
}
