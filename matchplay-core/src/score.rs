//! Per-set score parsing and winner determination.
//!
//! Scores are stored as comma separated lists of integers, one value per set, e.g. `"21,15,11"`.
use crate::id::TeamId;

/// Parses a comma separated list of set scores. Returns `None` if the list is empty or any value
/// is not an integer in `0..=65535`.
pub fn parse_sets(input: &str) -> Option<Vec<i64>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    input
        .split(',')
        .map(|set| set.trim().parse::<u16>().ok().map(i64::from))
        .collect()
}

/// The sets of a match, parsed from both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetScores {
    sets: Vec<[i64; 2]>,
}

impl SetScores {
    /// Parses both sides. Returns `None` unless both sides parse to the same, non-zero number of
    /// sets.
    pub fn parse(first: &str, second: &str) -> Option<Self> {
        let first = parse_sets(first)?;
        let second = parse_sets(second)?;

        if first.len() != second.len() {
            log::debug!(
                "Mismatched set counts: {} and {}",
                first.len(),
                second.len()
            );
            return None;
        }

        let sets = first
            .into_iter()
            .zip(second)
            .map(|(a, b)| [a, b])
            .collect();

        Some(Self { sets })
    }

    /// Returns the number of sets won by each side. Sets with equal values are won by neither.
    pub fn sets_won(&self) -> [u32; 2] {
        let mut won = [0, 0];
        for [a, b] in &self.sets {
            if a > b {
                won[0] += 1;
            } else if b > a {
                won[1] += 1;
            }
        }

        won
    }

    /// Returns the total points scored by each side over all sets.
    pub fn points(&self) -> [i64; 2] {
        self.sets
            .iter()
            .fold([0, 0], |acc, [a, b]| [acc[0] + a, acc[1] + b])
    }

    /// Returns the winning slot (0 or 1). Returns `None` if both sides won the same number of
    /// sets.
    pub fn winning_slot(&self) -> Option<usize> {
        let [a, b] = self.sets_won();

        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Returns `true` if any recorded set value is non-zero.
    pub fn is_played(&self) -> bool {
        self.sets.iter().any(|[a, b]| *a != 0 || *b != 0)
    }
}

/// Determines the winner of a match between `teams` given the per-set `scores` of both sides.
///
/// Returns `None` (indeterminate) if a score list is malformed, the set counts differ, both sides
/// won the same number of sets or the winning side has no team.
///
/// # Examples
///
/// ```
/// # use matchplay_core::{determine_winner, TeamId};
/// let teams = [Some(TeamId(1)), Some(TeamId(2))];
///
/// assert_eq!(determine_winner(teams, "21,15,11", "15,21,9"), Some(TeamId(1)));
/// assert_eq!(determine_winner(teams, "21,15", "21"), None);
/// ```
pub fn determine_winner(teams: [Option<TeamId>; 2], first: &str, second: &str) -> Option<TeamId> {
    let scores = SetScores::parse(first, second)?;
    let slot = scores.winning_slot()?;

    teams[slot]
}
