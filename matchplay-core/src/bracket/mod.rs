//! # Bracket building
//!
//! The builders turn the confirmed teams of a schedule into a [`BracketPlan`]: every match the
//! competition will ever need, linked through indices into the plan. Ids only exist once the
//! matches were stored, so building happens in two phases:
//!
//! 1. [`BracketPlan::build`] creates the plan.
//! 2. After the store has created a record for every planned match, [`BracketPlan::assign_ids`]
//!    turns the plan into [`Matches`] with the links resolved to [`MatchId`]s.
//!
//! BYEs in the new bracket are not advanced by the builders; call
//! [`Progression::resolve_byes`] on the result.
//!
//! [`Progression::resolve_byes`]: crate::Progression::resolve_byes
mod elimination;
mod pool_play;
mod round_robin;

pub use pool_play::advance_to_playoff;
pub use round_robin::pairs;

use crate::competition::{Competition, Format};
use crate::id::{MatchId, ScheduleId, TeamId};
use crate::matches::{Match, MatchStatus, Matches};
use crate::team::{Pool, Teams};
use crate::{Error, Result};

/// A match of a [`BracketPlan`]. Links point to other matches of the same plan by index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchPlan {
    pub round: u32,
    pub round_name: String,
    pub number: u32,
    pub teams: [Option<TeamId>; 2],
    pub status: MatchStatus,
    pub winner: Option<TeamId>,
    pub is_bye: bool,
    pub is_third_place: bool,
    pub position: u8,
    pub next: Option<usize>,
    pub next_loser: Option<usize>,
}

impl MatchPlan {
    fn new(round: u32, round_name: String, number: u32) -> Self {
        Self {
            round,
            round_name,
            number,
            teams: [None, None],
            status: MatchStatus::Pending,
            winner: None,
            is_bye: false,
            is_third_place: false,
            position: 1,
            next: None,
            next_loser: None,
        }
    }

    /// Creates an `Active` match between two known teams.
    fn active(round: u32, round_name: String, number: u32, teams: [TeamId; 2]) -> Self {
        Self {
            teams: [Some(teams[0]), Some(teams[1])],
            status: MatchStatus::Active,
            ..Self::new(round, round_name, number)
        }
    }
}

/// All matches of a competition before they are stored.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BracketPlan {
    pub matches: Vec<MatchPlan>,
}

impl BracketPlan {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the plan for `competition` using the confirmed `teams`. `pools` is only used by
    /// [`Format::PoolPlay`] and must already have the teams assigned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotEnoughTeams`] if less than 2 teams are confirmed.
    pub fn build(competition: &Competition, teams: &Teams, pools: &[Pool]) -> Result<Self> {
        let confirmed = teams.confirmed().count();
        if confirmed < 2 {
            return Err(Error::NotEnoughTeams(confirmed));
        }

        log::debug!(
            "Building {} bracket for {} confirmed teams",
            competition.format,
            confirmed
        );

        let plan = match competition.format {
            Format::RoundRobin => round_robin::build(competition, teams),
            Format::Elimination => elimination::build(competition, teams),
            Format::PoolPlay => pool_play::build(competition, teams, pools),
        };

        log::debug!("Planned {} matches", plan.len());

        Ok(plan)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Pushes a match and returns its index.
    fn push(&mut self, m: MatchPlan) -> usize {
        self.matches.push(m);
        self.matches.len() - 1
    }

    /// Turns the plan into [`Matches`]. `ids` are the ids of the stored matches in plan order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNumberOfIds`] if `ids` has not exactly one id per planned match.
    pub fn assign_ids<I>(self, schedule_id: ScheduleId, ids: I) -> Result<Matches>
    where
        I: IntoIterator<Item = MatchId>,
    {
        let ids: Vec<MatchId> = ids.into_iter().collect();

        if ids.len() != self.matches.len() {
            return Err(Error::InvalidNumberOfIds {
                expected: self.matches.len(),
                found: ids.len(),
            });
        }

        let matches = self
            .matches
            .into_iter()
            .zip(ids.iter())
            .map(|(m, id)| Match {
                id: *id,
                schedule_id,
                round: m.round,
                round_name: m.round_name,
                number: m.number,
                teams: m.teams,
                scores: [String::new(), String::new()],
                status: m.status,
                winner: m.winner,
                is_bye: m.is_bye,
                is_third_place: m.is_third_place,
                position: m.position,
                next_match: m.next.map(|index| ids[index]),
                next_loser_match: m.next_loser.map(|index| ids[index]),
            })
            .collect();

        Ok(matches)
    }

    /// Pushes an elimination tree starting at `first_round`. `slots` are the teams of the first
    /// round matches, its length must be a power of two. Every match starts as `Pending`.
    ///
    /// Returns the indices of the first round matches.
    fn push_tree(
        &mut self,
        first_round: u32,
        slots: Vec<[Option<TeamId>; 2]>,
        third_place_match: bool,
    ) -> Vec<usize> {
        debug_assert!(slots.len().is_power_of_two());

        let mut teams_in_round = slots.len() * 2;

        let mut current: Vec<usize> = slots
            .into_iter()
            .enumerate()
            .map(|(index, teams)| {
                self.push(MatchPlan {
                    teams,
                    position: (index % 2) as u8 + 1,
                    ..MatchPlan::new(first_round, round_name(teams_in_round), index as u32 + 1)
                })
            })
            .collect();

        let first = current.clone();

        let mut round = first_round;
        let mut semifinals = Vec::new();
        while current.len() > 1 {
            round += 1;
            teams_in_round /= 2;

            let mut next = Vec::with_capacity(current.len() / 2);
            for (index, pair) in current.chunks(2).enumerate() {
                let target = self.push(MatchPlan {
                    position: (index % 2) as u8 + 1,
                    ..MatchPlan::new(round, round_name(teams_in_round), index as u32 + 1)
                });

                for feeder in pair {
                    self.matches[*feeder].next = Some(target);
                }

                next.push(target);
            }

            if next.len() == 1 {
                semifinals = current;
            }

            current = next;
        }

        if third_place_match && semifinals.len() == 2 {
            log::debug!("Adding third place match in round {}", round);

            let index = self.push(MatchPlan {
                is_third_place: true,
                ..MatchPlan::new(round, String::from("Third Place"), 2)
            });

            for semifinal in semifinals {
                self.matches[semifinal].next_loser = Some(index);
            }
        }

        first
    }
}

/// Returns the name of an elimination round with `teams` teams.
pub fn round_name(teams: usize) -> String {
    match teams {
        2 => String::from("Final"),
        4 => String::from("Semi-Finals"),
        8 => String::from("Quarter-Finals"),
        n => format!("Round of {}", n),
    }
}
