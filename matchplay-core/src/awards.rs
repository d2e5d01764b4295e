//! # Awards
//!
//! Resolves the teams holding the award positions of a schedule from its results.
use crate::competition::{Competition, Format};
use crate::id::{AwardId, ScheduleId, TeamId};
use crate::matches::{Match, MatchStatus, Matches};
use crate::standings::Standings;
use crate::team::Teams;
use crate::utils::byte_enum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AwardPosition {
    Champion,
    FirstRunnerUp,
    SecondRunnerUp,
}

byte_enum!(AwardPosition {
    Champion = 0 => "Champion",
    FirstRunnerUp = 1 => "1st Runner-Up",
    SecondRunnerUp = 2 => "2nd Runner-Up",
});

impl AwardPosition {
    pub const ALL: [Self; 3] = [Self::Champion, Self::FirstRunnerUp, Self::SecondRunnerUp];
}

/// An award of a schedule. `team_id` is `None` until the position is decided.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Award {
    pub id: AwardId,
    pub schedule_id: ScheduleId,
    pub position: AwardPosition,
    pub team_id: Option<TeamId>,
}

/// The teams holding each award position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Resolution {
    pub champion: Option<TeamId>,
    pub first_runner_up: Option<TeamId>,
    pub second_runner_up: Option<TeamId>,
}

impl Resolution {
    /// Resolves the award positions from the current state of `matches`.
    ///
    /// Bracket competitions take the positions from the final and the third place match once
    /// they are decided. Round robin competitions take them from the standings, but only after
    /// every match is `Done`.
    pub fn resolve(competition: &Competition, teams: &Teams, matches: &Matches) -> Self {
        match competition.format {
            Format::RoundRobin => Self::from_standings(competition, teams, matches),
            Format::Elimination | Format::PoolPlay => Self::from_bracket(matches),
        }
    }

    fn from_bracket(matches: &Matches) -> Self {
        let mut resolution = Self::default();

        if let Some(m) = matches.final_match().filter(|m| decided(m)) {
            resolution.champion = m.winner;
            resolution.first_runner_up = m.loser();
        }

        if let Some(m) = matches.third_place_match().filter(|m| decided(m)) {
            resolution.second_runner_up = m.winner;
        }

        resolution
    }

    fn from_standings(competition: &Competition, teams: &Teams, matches: &Matches) -> Self {
        if matches.is_empty() || matches.iter().any(|m| m.status != MatchStatus::Done) {
            return Self::default();
        }

        let teams: Vec<TeamId> = teams.confirmed_by_seed().iter().map(|team| team.id).collect();
        let standings = Standings::calculate(competition, &teams, matches.iter());
        let mut ranked = standings.ranked();

        Self {
            champion: ranked.next(),
            first_runner_up: ranked.next(),
            second_runner_up: ranked.next(),
        }
    }

    #[inline]
    pub fn get(&self, position: AwardPosition) -> Option<TeamId> {
        match position {
            AwardPosition::Champion => self.champion,
            AwardPosition::FirstRunnerUp => self.first_runner_up,
            AwardPosition::SecondRunnerUp => self.second_runner_up,
        }
    }

    /// Writes the resolution into `awards`. Returns the ids of the awards whose team changed.
    pub fn apply(&self, awards: &mut [Award]) -> Vec<AwardId> {
        let mut changed = Vec::new();

        for award in awards {
            let team_id = self.get(award.position);

            if award.team_id != team_id {
                log::debug!(
                    "Award {} ({}) changes from {:?} to {:?}",
                    award.id,
                    award.position,
                    award.team_id,
                    team_id
                );

                award.team_id = team_id;
                changed.push(award.id);
            }
        }

        changed
    }
}

/// A match decides award positions when it is `Done` or a BYE with a winner.
fn decided(m: &Match) -> bool {
    match m.status {
        MatchStatus::Done => true,
        MatchStatus::Bye => m.winner.is_some(),
        _ => false,
    }
}
