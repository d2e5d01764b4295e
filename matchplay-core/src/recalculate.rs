//! # Recalculation
//!
//! Correcting the result of a match that already advanced its winner invalidates every match
//! that follows it. [`Progression::recalculate`] resets those matches and replays them so that
//! the bracket ends up exactly as if the corrected result had been entered in the first place.
use std::collections::{HashMap, HashSet};

use crate::id::{MatchId, TeamId};
use crate::matches::MatchStatus;
use crate::progression::{decide, Progression};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The report of a recalculation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Recalculation {
    /// All matches downstream of the edited match, in the order they were found.
    pub affected: Vec<MatchId>,
    /// Whether the final (or the third place match) was affected. Awards must be resolved again.
    pub final_affected: bool,
}

impl<'a> Progression<'a> {
    /// Recalculates all matches following the match `edited` after its winner changed.
    ///
    /// The status and winner of `edited` must already be updated. Scores recorded on the
    /// following matches are kept and applied again if the match can still be played.
    pub fn recalculate(&mut self, edited: MatchId) -> Recalculation {
        let affected = self.downstream(edited);
        let set: HashSet<MatchId> = affected.iter().copied().collect();

        log::debug!(
            "Recalculating {} matches after match {}",
            affected.len(),
            edited
        );

        let mut recorded: HashMap<MatchId, [String; 2]> = HashMap::new();
        for id in &affected {
            if let Some(m) = self.matches.get_mut(*id) {
                if m.has_scores() {
                    recorded.insert(*id, m.scores.clone());
                }

                m.reset();
            }
        }

        self.advance(edited);

        // Every other decided match feeding a reset match has to place its teams again.
        let feeders: Vec<MatchId> = self
            .matches
            .ordered_ids()
            .into_iter()
            .filter(|id| *id != edited && !set.contains(id))
            .filter(|id| {
                let m = &self.matches[*id];

                m.is_decided()
                    && [m.next_match, m.next_loser_match]
                        .into_iter()
                        .flatten()
                        .any(|target| set.contains(&target))
            })
            .collect();

        for id in feeders {
            self.advance(id);
        }

        // Replay in round order, so a match is only replayed once its teams are known.
        for id in self.matches.ordered_ids() {
            if !set.contains(&id) {
                continue;
            }

            let Some(scores) = recorded.remove(&id) else {
                continue;
            };

            let Some(m) = self.matches.get_mut(id) else {
                continue;
            };

            if m.status != MatchStatus::Active {
                log::debug!("Dropping recorded scores of match {}", id);
                continue;
            }

            m.scores = scores;
            if let Some(winner) = decide(m) {
                log::debug!("Replayed match {}, won by team {}", id, winner);

                m.winner = Some(winner);
                m.status = MatchStatus::Done;
                self.advance_winner(id);
            }
        }

        self.rederive_third_place();

        let final_id = self.matches.final_match().map(|m| m.id);
        let third_id = self.matches.third_place_match().map(|m| m.id);

        let final_affected = [final_id, third_id]
            .into_iter()
            .flatten()
            .any(|id| id == edited || set.contains(&id));

        Recalculation {
            affected,
            final_affected,
        }
    }

    /// Returns all matches reachable from `id` through winner and loser links.
    fn downstream(&self, id: MatchId) -> Vec<MatchId> {
        let mut visited = HashSet::from([id]);
        let mut affected = Vec::new();

        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(m) = self.matches.get(id) else {
                continue;
            };

            for next in [m.next_match, m.next_loser_match].into_iter().flatten() {
                if visited.insert(next) {
                    affected.push(next);
                    stack.push(next);
                }
            }
        }

        affected
    }

    /// Rebuilds the third place match from the current semifinal losers if its teams are
    /// outdated.
    fn rederive_third_place(&mut self) {
        let Some(third) = self.matches.third_place_match() else {
            return;
        };
        let third_id = third.id;

        let mut expected: [Option<TeamId>; 2] = [None, None];
        for semifinal in self.matches.feeders(third_id) {
            if semifinal.next_loser_match == Some(third_id) && semifinal.is_decided() {
                expected[semifinal.slot()] = semifinal.loser();
            }
        }

        if third.teams == expected {
            return;
        }

        log::debug!(
            "Third place match {} is outdated: {:?} != {:?}",
            third_id,
            third.teams,
            expected
        );

        let scores = third.has_scores().then(|| third.scores.clone());

        if let Some(m) = self.matches.get_mut(third_id) {
            m.reset();
            m.teams = expected;
        }

        self.settle(third_id);

        if let (Some(scores), Some(m)) = (scores, self.matches.get_mut(third_id)) {
            if m.status == MatchStatus::Active {
                m.scores = scores;
                if let Some(winner) = decide(m) {
                    m.winner = Some(winner);
                    m.status = MatchStatus::Done;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::id::{MatchId, TeamId};
    use crate::matches::{MatchStatus, Matches};
    use crate::progression::{Progression, ScoreOutcome};
    use crate::tests::elimination;

    /// Plays every match in round order with the given scores. Matches without scores in `scores`
    /// are won by the first slot.
    fn play(matches: &mut Matches, scores: &HashMap<MatchId, (&str, &str)>) {
        let mut progression = Progression::new(matches);

        for id in progression.matches().ordered_ids() {
            if progression.matches()[id].status != MatchStatus::Active {
                continue;
            }

            let (first, second) = scores.get(&id).copied().unwrap_or(("21", "10"));
            progression.submit_score(id, first, second).unwrap();
        }
    }

    #[test]
    fn test_edit_final() {
        let mut matches = elimination(8, true);
        play(&mut matches, &HashMap::new());

        let before = matches.clone();
        let final_id = matches.final_match().unwrap().id;
        assert_eq!(matches[final_id].winner, Some(TeamId(1)));

        let outcome = Progression::new(&mut matches)
            .submit_score(final_id, "10", "21")
            .unwrap();

        match outcome {
            ScoreOutcome::Recalculated(recalculation) => {
                assert!(recalculation.affected.is_empty());
                assert!(recalculation.final_affected);
            }
            outcome => panic!("unexpected outcome: {:?}", outcome),
        }

        let changed: Vec<MatchId> = matches.changed_since(&before).map(|m| m.id).collect();
        assert_eq!(changed, [final_id]);

        let final_match = &matches[final_id];
        assert_eq!(final_match.winner, final_match.teams[1]);
        assert_eq!(final_match.loser(), Some(TeamId(1)));
    }

    #[test]
    fn test_recalculation_matches_replay() {
        let mut scores = HashMap::new();
        scores.insert(MatchId(2), ("21,19,21", "15,21,10"));
        scores.insert(MatchId(6), ("10", "21"));
        scores.insert(MatchId(7), ("21,21", "19,10"));
        // Third place
        scores.insert(MatchId(8), ("3", "21"));

        let mut matches = elimination(8, true);
        play(&mut matches, &scores);

        // 4 v 5 is corrected to a win for 5.
        let outcome = Progression::new(&mut matches)
            .submit_score(MatchId(2), "21,19,10", "15,21,21")
            .unwrap();

        let recalculation = match outcome {
            ScoreOutcome::Recalculated(recalculation) => recalculation,
            outcome => panic!("unexpected outcome: {:?}", outcome),
        };

        let mut affected = recalculation.affected.clone();
        affected.sort();
        assert_eq!(affected, [MatchId(5), MatchId(7), MatchId(8)]);
        assert!(recalculation.final_affected);

        scores.insert(MatchId(2), ("21,19,10", "15,21,21"));
        let mut replayed = elimination(8, true);
        play(&mut replayed, &scores);

        assert_eq!(matches, replayed);
        assert_eq!(matches[MatchId(5)].teams, [Some(TeamId(1)), Some(TeamId(5))]);
    }

    #[test]
    fn test_recalculation_to_undecided() {
        let mut matches = elimination(8, false);
        play(&mut matches, &HashMap::new());

        Progression::new(&mut matches)
            .submit_score(MatchId(1), "21", "21")
            .unwrap();

        let edited = &matches[MatchId(1)];
        assert_eq!(edited.status, MatchStatus::Active);
        assert_eq!(edited.winner, None);

        // The semifinal waits for the edited match again, the final for the semifinal.
        let semifinal = &matches[MatchId(5)];
        assert_eq!(semifinal.status, MatchStatus::Pending);
        assert_eq!(semifinal.teams, [None, Some(TeamId(4))]);
        assert!(semifinal.scores.iter().all(String::is_empty));

        let final_match = &matches[MatchId(7)];
        assert_eq!(final_match.status, MatchStatus::Pending);
        assert_eq!(final_match.teams, [None, Some(TeamId(3))]);
    }

    #[test]
    fn test_recalculation_keeps_byes() {
        let mut matches = elimination(5, true);
        play(&mut matches, &HashMap::new());

        // 4 v 5 corrected: 5 now meets 1 in the semifinal.
        Progression::new(&mut matches)
            .submit_score(MatchId(2), "10", "21")
            .unwrap();

        assert_eq!(matches[MatchId(1)].status, MatchStatus::Bye);
        assert_eq!(
            matches[MatchId(5)].teams,
            [Some(TeamId(1)), Some(TeamId(5))]
        );
        assert_eq!(matches[MatchId(5)].status, MatchStatus::Done);
        assert_eq!(matches[MatchId(5)].winner, Some(TeamId(1)));

        let third = matches.third_place_match().unwrap();
        assert_eq!(third.teams[0], Some(TeamId(5)));
        assert_eq!(third.status, MatchStatus::Done);
    }

    #[test]
    fn test_rederive_third_place() {
        let mut matches = elimination(4, true);
        play(&mut matches, &HashMap::new());

        let third_id = matches.third_place_match().unwrap().id;
        let expected = matches[third_id].teams;

        // Corrupt the third place match, a recalculation anywhere restores it.
        matches.get_mut(third_id).unwrap().teams = [Some(TeamId(9)), None];

        let mut progression = Progression::new(&mut matches);
        progression.rederive_third_place();

        assert_eq!(matches[third_id].teams, expected);
        assert_eq!(matches[third_id].status, MatchStatus::Done);
    }
}
