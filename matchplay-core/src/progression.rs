//! # Match progression
//!
//! [`Progression`] applies results to a [`Matches`] arena: it records scores, moves winners (and
//! semifinal losers) into the following matches and resolves matches that can never be played
//! because a slot stays empty (BYEs).
use crate::id::{MatchId, TeamId};
use crate::matches::{Match, MatchStatus, Matches, TeamSpot};
use crate::recalculate::Recalculation;
use crate::score::SetScores;
use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The result of a score submission.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "outcome", rename_all = "snake_case"))]
pub enum ScoreOutcome {
    /// The scores were recorded but don't determine a winner. The match stays `Active`.
    Undecided,
    /// The match is `Done` and `winner` advanced.
    Decided { winner: TeamId },
    /// The winner of a `Done` match changed and every following match was recalculated.
    Recalculated(Recalculation),
}

/// Mutably borrows the matches of a schedule to apply results to them.
#[derive(Debug)]
pub struct Progression<'a> {
    pub(crate) matches: &'a mut Matches,
}

impl<'a> Progression<'a> {
    #[inline]
    pub fn new(matches: &'a mut Matches) -> Self {
        Self { matches }
    }

    #[inline]
    pub fn matches(&self) -> &Matches {
        self.matches
    }

    /// Records the scores of the match `id` and advances the winner.
    ///
    /// A winner is only determined if the scores parse, both sides have the same number of sets,
    /// one side won more sets and at least one set value is non-zero. Otherwise the scores are
    /// kept and the match stays open for another submission.
    ///
    /// Submitting a result with a different winner (or no winner) for a match that is already
    /// `Done` recalculates all following matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatchNotFound`] if no match with `id` exists and
    /// [`Error::MatchNotPlayable`] if the match is neither `Active` nor `Done`.
    pub fn submit_score(&mut self, id: MatchId, first: &str, second: &str) -> Result<ScoreOutcome> {
        let m = self.matches.get_mut(id).ok_or(Error::MatchNotFound(id))?;

        if !matches!(m.status, MatchStatus::Active | MatchStatus::Done) {
            return Err(Error::MatchNotPlayable {
                id,
                status: m.status,
            });
        }

        m.scores = [first.trim().to_owned(), second.trim().to_owned()];
        let winner = decide(m);

        if m.status == MatchStatus::Done {
            if let Some(winner) = winner.filter(|winner| m.winner == Some(*winner)) {
                log::debug!("Scores of match {} changed, winner unchanged", id);
                return Ok(ScoreOutcome::Decided { winner });
            }

            log::debug!(
                "Winner of match {} changed from {:?} to {:?}",
                id,
                m.winner,
                winner
            );

            m.winner = winner;
            m.status = match winner {
                Some(_) => MatchStatus::Done,
                None => MatchStatus::Active,
            };

            let recalculation = self.recalculate(id);
            return Ok(ScoreOutcome::Recalculated(recalculation));
        }

        match winner {
            Some(winner) => {
                m.winner = Some(winner);
                m.status = MatchStatus::Done;

                log::debug!("Match {} won by team {}", id, winner);

                self.advance_winner(id);
                Ok(ScoreOutcome::Decided { winner })
            }
            None => Ok(ScoreOutcome::Undecided),
        }
    }

    /// Moves the winner of the match `id` into its next match and the loser into the third place
    /// match, then settles both.
    pub fn advance_winner(&mut self, id: MatchId) {
        let Some(m) = self.matches.get(id) else {
            return;
        };

        let slot = m.slot();
        let winner = m.winner;
        let loser = m.loser();
        let next = m.next_match;
        let next_loser = m.next_loser_match;

        if let Some(next) = next {
            self.place(next, slot, winner);
        }

        if let Some(third) = next_loser {
            // Replaces any stale team this match left there before.
            self.place(third, slot, loser);
        }
    }

    /// Clears the slot the double BYE `id` feeds in its following matches, then settles them.
    pub fn advance_double_bye(&mut self, id: MatchId) {
        let Some(m) = self.matches.get(id) else {
            return;
        };

        let slot = m.slot();
        let targets = [m.next_match, m.next_loser_match];

        for target in targets.into_iter().flatten() {
            self.place(target, slot, None);
        }
    }

    /// Advances the match `id` if it is decided: the winner of a `Done` match or single BYE, the
    /// empty slot of a double BYE.
    pub fn advance(&mut self, id: MatchId) {
        let Some(m) = self.matches.get(id) else {
            return;
        };

        match (m.status, m.winner) {
            (MatchStatus::Bye, None) => self.advance_double_bye(id),
            (MatchStatus::Bye | MatchStatus::Done, Some(_)) => self.advance_winner(id),
            _ => (),
        }
    }

    /// Advances every BYE and settles every pending match. Used after a bracket was built or the
    /// playoff was seeded.
    pub fn resolve_byes(&mut self) {
        for id in self.matches.ordered_ids() {
            match self.matches.get(id).map(|m| m.status) {
                Some(MatchStatus::Bye) => self.advance(id),
                Some(MatchStatus::Pending) => self.settle(id),
                _ => (),
            }
        }
    }

    fn place(&mut self, target: MatchId, slot: usize, team: Option<TeamId>) {
        match self.matches.get_mut(target) {
            Some(m) => m.teams[slot] = team,
            None => {
                log::warn!("Match {} links to unknown match", target);
                return;
            }
        }

        self.settle(target);
    }

    /// Updates the status of the `Pending` match `id` from its slots.
    pub(crate) fn settle(&mut self, id: MatchId) {
        if self.matches.get(id).map(|m| m.status) != Some(MatchStatus::Pending) {
            return;
        }

        let spots = [self.matches.spot(id, 0), self.matches.spot(id, 1)];

        let Some(m) = self.matches.get_mut(id) else {
            return;
        };

        match spots {
            [TeamSpot::Team(_), TeamSpot::Team(_)] => {
                log::debug!("Match {} is ready", id);
                m.status = MatchStatus::Active;
            }
            [TeamSpot::Team(team), TeamSpot::Empty] | [TeamSpot::Empty, TeamSpot::Team(team)] => {
                log::debug!("Match {} is a BYE for team {}", id, team);

                m.status = MatchStatus::Bye;
                m.is_bye = true;
                m.winner = Some(team);
                self.advance_winner(id);
            }
            [TeamSpot::Empty, TeamSpot::Empty] => {
                log::debug!("Match {} is a double BYE", id);

                m.status = MatchStatus::Bye;
                m.is_bye = true;
                m.winner = None;
                self.advance_double_bye(id);
            }
            _ => (),
        }
    }
}

/// Returns the winner determined by the recorded scores of `m`. Scores with only zeros don't
/// determine a winner.
pub(crate) fn decide(m: &Match) -> Option<TeamId> {
    let scores = SetScores::parse(&m.scores[0], &m.scores[1])?;
    if !scores.is_played() {
        return None;
    }

    m.teams[scores.winning_slot()?]
}

#[cfg(test)]
mod tests {
    use super::{Progression, ScoreOutcome};
    use crate::id::{MatchId, TeamId};
    use crate::matches::{MatchStatus, TeamSpot};
    use crate::tests::elimination;
    use crate::Error;

    #[test]
    fn test_resolve_byes_5() {
        let matches = elimination(5, false);

        // Quarter-finals: 1 BYE, 4 v 5, 3 BYE, 2 BYE.
        assert_eq!(
            matches.iter().filter(|m| m.status == MatchStatus::Bye).count(),
            3
        );

        // Semifinal 1 waits for 4 v 5, semifinal 2 is 3 v 2.
        let semifinals = matches.round(2);
        assert_eq!(semifinals[0].teams, [Some(TeamId(1)), None]);
        assert_eq!(semifinals[0].status, MatchStatus::Pending);
        assert_eq!(matches.spot(semifinals[0].id, 1), TeamSpot::Tbd);
        assert_eq!(semifinals[1].teams, [Some(TeamId(3)), Some(TeamId(2))]);
        assert_eq!(semifinals[1].status, MatchStatus::Active);
    }

    #[test]
    fn test_double_bye_reaches_final() {
        let matches = elimination(2, true);

        let final_match = matches.final_match().unwrap();
        assert_eq!(final_match.round, 3);
        assert_eq!(final_match.teams, [Some(TeamId(1)), Some(TeamId(2))]);
        assert_eq!(final_match.status, MatchStatus::Active);

        // No semifinal produces a loser.
        let third = matches.third_place_match().unwrap();
        assert_eq!(third.status, MatchStatus::Bye);
        assert_eq!(third.winner, None);

        // Every match before the final is a BYE.
        assert!(matches
            .iter()
            .filter(|m| m.round < 3)
            .all(|m| m.status == MatchStatus::Bye));
    }

    #[test]
    fn test_submit_score() {
        let mut matches = elimination(5, false);
        let mut progression = Progression::new(&mut matches);

        // 4 v 5
        let outcome = progression.submit_score(MatchId(2), "21,15,11", "15,21,9");
        assert_eq!(
            outcome,
            Ok(ScoreOutcome::Decided {
                winner: TeamId(4)
            })
        );

        let semifinal = &matches[MatchId(5)];
        assert_eq!(semifinal.teams, [Some(TeamId(1)), Some(TeamId(4))]);
        assert_eq!(semifinal.status, MatchStatus::Active);
    }

    #[test]
    fn test_submit_score_undecided() {
        let mut matches = elimination(8, false);
        let mut progression = Progression::new(&mut matches);

        for (first, second) in [("21,15", "21"), ("21,15", "15,21"), ("0", "0"), ("x", "1")] {
            assert_eq!(
                progression.submit_score(MatchId(1), first, second),
                Ok(ScoreOutcome::Undecided)
            );
        }

        let m = &matches[MatchId(1)];
        assert_eq!(m.status, MatchStatus::Active);
        assert_eq!(m.winner, None);
        assert_eq!(m.scores, [String::from("x"), String::from("1")]);
    }

    #[test]
    fn test_submit_score_not_playable() {
        let mut matches = elimination(5, false);
        let mut progression = Progression::new(&mut matches);

        // BYE
        assert_eq!(
            progression.submit_score(MatchId(1), "21", "0"),
            Err(Error::MatchNotPlayable {
                id: MatchId(1),
                status: MatchStatus::Bye
            })
        );

        // Semifinal 1 still waits for 4 v 5.
        assert_eq!(
            progression.submit_score(MatchId(5), "21", "0"),
            Err(Error::MatchNotPlayable {
                id: MatchId(5),
                status: MatchStatus::Pending
            })
        );

        assert_eq!(
            progression.submit_score(MatchId(99), "21", "0"),
            Err(Error::MatchNotFound(MatchId(99)))
        );
    }

    #[test]
    fn test_submit_score_same_winner() {
        let mut matches = elimination(8, false);
        let mut progression = Progression::new(&mut matches);

        progression.submit_score(MatchId(1), "21", "10").unwrap();
        progression.submit_score(MatchId(2), "21", "10").unwrap();
        assert_eq!(
            progression.submit_score(MatchId(5), "21", "10"),
            Ok(ScoreOutcome::Decided { winner: TeamId(1) })
        );

        // A correction with the same winner keeps everything following it.
        assert_eq!(
            progression.submit_score(MatchId(1), "21", "19"),
            Ok(ScoreOutcome::Decided { winner: TeamId(1) })
        );

        assert_eq!(matches[MatchId(1)].scores[1], "19");
        assert_eq!(matches[MatchId(5)].status, MatchStatus::Done);
        assert_eq!(matches[MatchId(7)].teams[0], Some(TeamId(1)));
    }

    #[test]
    fn test_loser_to_third_place() {
        let mut matches = elimination(4, true);
        let mut progression = Progression::new(&mut matches);

        // With 4 teams in a bracket of 8 every quarter-final is a BYE.
        let semifinals: Vec<MatchId> = progression
            .matches()
            .round(2)
            .iter()
            .map(|m| m.id)
            .collect();

        progression.submit_score(semifinals[0], "21", "3").unwrap();
        progression.submit_score(semifinals[1], "3", "21").unwrap();

        let third = matches.third_place_match().unwrap();
        assert_eq!(third.status, MatchStatus::Active);
        assert_eq!(third.teams, [Some(TeamId(4)), Some(TeamId(3))]);

        let final_match = matches.final_match().unwrap();
        assert_eq!(final_match.teams, [Some(TeamId(1)), Some(TeamId(2))]);
    }
}
