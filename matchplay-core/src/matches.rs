use std::collections::HashMap;
use std::ops::{Deref, Index};

use crate::id::{MatchId, ScheduleId, TeamId};
use crate::utils::byte_enum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchStatus {
    /// At least one team is not known yet.
    #[default]
    Pending,
    /// Both teams are known and the match waits for a score.
    Active,
    /// The match has less than two teams and was resolved without being played.
    Bye,
    /// A score was recorded and a winner determined.
    Done,
}

byte_enum!(MatchStatus {
    Pending = 0 => "Pending",
    Active = 1 => "Active",
    Bye = 2 => "Bye",
    Done = 3 => "Done",
});

/// A match between two teams.
///
/// A match is linked to the matches following it through [`next_match`] (the destination of the
/// winner) and [`next_loser_match`] (the destination of the loser, only set on semifinals when a
/// third place match is played). The slot filled in both destinations is given by [`position`].
///
/// [`next_match`]: Self::next_match
/// [`next_loser_match`]: Self::next_loser_match
/// [`position`]: Self::position
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub schedule_id: ScheduleId,
    pub round: u32,
    pub round_name: String,
    pub number: u32,
    pub teams: [Option<TeamId>; 2],
    pub scores: [String; 2],
    pub status: MatchStatus,
    pub winner: Option<TeamId>,
    pub is_bye: bool,
    pub is_third_place: bool,
    /// Either 1 or 2.
    pub position: u8,
    pub next_match: Option<MatchId>,
    pub next_loser_match: Option<MatchId>,
}

impl Match {
    /// Returns the slot index (0 or 1) this match fills in its destination matches.
    #[inline]
    pub fn slot(&self) -> usize {
        match self.position {
            2 => 1,
            _ => 0,
        }
    }

    /// Returns `true` if the match has a winner or was resolved as a BYE.
    #[inline]
    pub fn is_decided(&self) -> bool {
        matches!(self.status, MatchStatus::Done | MatchStatus::Bye)
    }

    /// Returns `true` if both sides have a recorded score.
    #[inline]
    pub fn has_scores(&self) -> bool {
        self.scores.iter().all(|score| !score.trim().is_empty())
    }

    /// Returns the team that lost the match. Returns `None` if the match has no winner or only a
    /// single team.
    pub fn loser(&self) -> Option<TeamId> {
        let winner = self.winner?;

        self.teams
            .iter()
            .flatten()
            .copied()
            .find(|team| *team != winner)
    }

    /// Returns `true` if `team` plays in this match.
    #[inline]
    pub fn contains(&self, team: TeamId) -> bool {
        self.teams.contains(&Some(team))
    }

    /// Resets the match into the state it had when the bracket was built: no teams, no scores,
    /// no winner.
    pub fn reset(&mut self) {
        self.teams = [None, None];
        self.scores = [String::new(), String::new()];
        self.winner = None;
        self.status = MatchStatus::Pending;
        self.is_bye = false;
    }
}

/// A spot for a team in a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TeamSpot<T> {
    Team(T),
    /// The spot will never be filled.
    Empty,
    /// The spot is waiting for the result of a previous match.
    Tbd,
}

impl<T> TeamSpot<T> {
    /// Returns `true` if the `TeamSpot` is [`Team`].
    ///
    /// # Examples
    ///
    /// ```
    /// # use matchplay_core::TeamSpot;
    /// let spot = TeamSpot::Team(());
    /// assert!(spot.is_team());
    /// ```
    ///
    /// [`Team`]: Self::Team
    #[inline]
    pub fn is_team(&self) -> bool {
        matches!(self, Self::Team(_))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    #[inline]
    pub fn is_tbd(&self) -> bool {
        matches!(self, Self::Tbd)
    }

    /// Converts the `TeamSpot` into an [`Option`], discarding the difference between
    /// [`Empty`] and [`Tbd`].
    ///
    /// [`Empty`]: Self::Empty
    /// [`Tbd`]: Self::Tbd
    #[inline]
    pub fn team(self) -> Option<T> {
        match self {
            Self::Team(team) => Some(team),
            _ => None,
        }
    }
}

/// All matches of a schedule, addressable by [`MatchId`].
///
/// `Matches` is an arena: matches refer to each other only through ids, never through references.
/// The order of the matches is preserved as given.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Matches {
    matches: Vec<Match>,
    index: HashMap<MatchId, usize>,
}

impl Matches {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the match with the given `id`.
    #[inline]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.index.get(&id).map(|index| &self.matches[*index])
    }

    /// Returns a mutable reference to the match with the given `id`.
    ///
    /// Changing the `id` of the returned match is not allowed and leaves the arena in an
    /// inconsistent state.
    #[inline]
    pub fn get_mut(&mut self, id: MatchId) -> Option<&mut Match> {
        match self.index.get(&id) {
            Some(index) => self.matches.get_mut(*index),
            None => None,
        }
    }

    /// Returns an iterator over mutable references to all matches.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Match> {
        self.matches.iter_mut()
    }

    /// Appends a match. An existing match with the same id is replaced.
    pub fn push(&mut self, m: Match) {
        match self.index.get(&m.id) {
            Some(index) => self.matches[*index] = m,
            None => {
                self.index.insert(m.id, self.matches.len());
                self.matches.push(m);
            }
        }
    }

    /// Returns the ids of the matches whose winner or loser feeds the match `id`.
    pub fn feeders(&self, id: MatchId) -> impl Iterator<Item = &Match> {
        self.matches
            .iter()
            .filter(move |m| m.next_match == Some(id) || m.next_loser_match == Some(id))
    }

    /// Returns the matches of `round`, ordered by match number.
    pub fn round(&self, round: u32) -> Vec<&Match> {
        let mut matches: Vec<&Match> = self.matches.iter().filter(|m| m.round == round).collect();
        matches.sort_by_key(|m| (m.is_third_place, m.number));
        matches
    }

    /// Returns the match ids ordered by round and match number.
    pub fn ordered_ids(&self) -> Vec<MatchId> {
        let mut matches: Vec<&Match> = self.matches.iter().collect();
        matches.sort_by_key(|m| (m.round, m.is_third_place, m.number));
        matches.into_iter().map(|m| m.id).collect()
    }

    /// Returns the final match: the last match of an elimination tree. Round robin and pool
    /// matches are always in round 1 and never fed by other matches.
    pub fn final_match(&self) -> Option<&Match> {
        self.matches
            .iter()
            .filter(|m| !m.is_third_place && m.next_match.is_none())
            .filter(|m| m.round > 1 || self.feeders(m.id).next().is_some())
            .max_by_key(|m| m.round)
    }

    /// Returns the dedicated third place match.
    #[inline]
    pub fn third_place_match(&self) -> Option<&Match> {
        self.matches.iter().find(|m| m.is_third_place)
    }

    /// Returns the matches that differ from the match with the same id in `before`. Matches not
    /// contained in `before` are returned as well.
    pub fn changed_since<'a>(&'a self, before: &'a Matches) -> impl Iterator<Item = &'a Match> {
        self.matches
            .iter()
            .filter(move |m| before.get(m.id) != Some(*m))
    }

    /// Returns the spot in slot `slot` (0 or 1) of the match `id`.
    ///
    /// An unfilled slot is [`TeamSpot::Empty`] when no team can ever arrive there: the match
    /// feeding the slot was a BYE without a winner (or a BYE without a loser for the third place
    /// match), or the slot has no feeder at all and the match is a BYE.
    pub fn spot(&self, id: MatchId, slot: usize) -> TeamSpot<TeamId> {
        let Some(m) = self.get(id) else {
            return TeamSpot::Empty;
        };

        if let Some(team) = m.teams[slot] {
            return TeamSpot::Team(team);
        }

        let feeder = self.feeders(id).find(|feeder| feeder.slot() == slot);

        match feeder {
            Some(feeder) => {
                let loser_feed = feeder.next_loser_match == Some(id);

                let dead = if loser_feed {
                    feeder.status == MatchStatus::Bye
                } else {
                    feeder.status == MatchStatus::Bye && feeder.winner.is_none()
                };

                if dead {
                    TeamSpot::Empty
                } else {
                    TeamSpot::Tbd
                }
            }
            None if m.is_bye => TeamSpot::Empty,
            None => TeamSpot::Tbd,
        }
    }
}

impl Deref for Matches {
    type Target = [Match];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.matches
    }
}

impl Index<MatchId> for Matches {
    type Output = Match;

    #[inline]
    fn index(&self, id: MatchId) -> &Self::Output {
        match self.get(id) {
            Some(m) => m,
            None => panic!("no match with id {}", id),
        }
    }
}

impl FromIterator<Match> for Matches {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Match>,
    {
        let mut this = Self::new();
        for m in iter {
            this.push(m);
        }

        this
    }
}

impl From<Vec<Match>> for Matches {
    #[inline]
    fn from(matches: Vec<Match>) -> Self {
        matches.into_iter().collect()
    }
}

impl From<Matches> for Vec<Match> {
    #[inline]
    fn from(matches: Matches) -> Self {
        matches.matches
    }
}
