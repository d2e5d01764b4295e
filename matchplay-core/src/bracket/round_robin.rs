use super::{BracketPlan, MatchPlan};
use crate::competition::Competition;
use crate::id::TeamId;
use crate::team::Teams;

pub(super) fn build(competition: &Competition, teams: &Teams) -> BracketPlan {
    let teams: Vec<TeamId> = teams.confirmed_by_seed().iter().map(|team| team.id).collect();

    let mut plan = BracketPlan::new();
    push_matches(
        &mut plan,
        &teams,
        "Round Robin",
        competition.double_round_robin,
        &mut 0,
    );

    plan
}

/// Pushes the round robin matches between `teams` into round 1 of `plan`. `number` is the last
/// match number used in round 1.
pub(super) fn push_matches(
    plan: &mut BracketPlan,
    teams: &[TeamId],
    name: &str,
    double: bool,
    number: &mut u32,
) {
    let pairs = pairs(teams.len());

    for (a, b) in &pairs {
        *number += 1;
        plan.push(MatchPlan::active(
            1,
            name.to_owned(),
            *number,
            [teams[*a], teams[*b]],
        ));
    }

    if double {
        for (a, b) in &pairs {
            *number += 1;
            plan.push(MatchPlan::active(
                1,
                name.to_owned(),
                *number,
                [teams[*b], teams[*a]],
            ));
        }
    }
}

/// Returns every unordered pair of `n` entrants exactly once, ordered by the circle method: the
/// pairs of one rotation come before the pairs of the next, so consecutive matches involve
/// different entrants as far as possible.
pub fn pairs(n: usize) -> Vec<(usize, usize)> {
    if n < 2 {
        return Vec::new();
    }

    // Odd numbers get a phantom entrant, pairs with it are skipped.
    let n_even = n + n % 2;

    let mut pairs = Vec::with_capacity(n * (n - 1) / 2);
    for round in 0..n_even - 1 {
        for index in 0..n_even / 2 {
            let first = circle_entrant(n_even, round, index);
            let second = circle_entrant(n_even, round, n_even - index - 1);

            if first < n && second < n {
                pairs.push((first, second));
            }
        }
    }

    pairs
}

/// Returns the index of entrant of the at the given `index` in a circle of length `n` at the given
/// `round`. Entrant 0 is pinned, all others rotate by one position per round.
#[inline]
fn circle_entrant(n: usize, round: usize, index: usize) -> usize {
    debug_assert!(n % 2 == 0);

    if index == 0 {
        return 0;
    }

    match index as isize - round as isize {
        res if res <= 0 => n - res.unsigned_abs() - 1,
        res => res as usize,
    }
}
