//! # matchplay-core
//!
//! This crate contains the competition engine of matchplay: it turns the confirmed teams of a
//! schedule into matches, advances results through the bracket and derives standings and awards.
//! The crate does no I/O, all state is passed in and returned.
//!
//! Important types:
//! - [`Competition`]: The configuration of a schedule's competition (format, pools, points).
//! - [`Teams`]: A wrapper around `Vec<Team>` with the teams of a schedule.
//! - [`BracketPlan`]: All matches of a competition before they are stored.
//! - [`Matches`]: An arena of [`Match`]es linked by [`MatchId`].
//! - [`TeamSpot`]: A slot within a match, which can contain a team, be permanently empty or
//! wait for the result of another match.
//! - [`Progression`]: Applies scores to [`Matches`], advancing winners and resolving BYEs. Also
//! recalculates all following matches when a result is corrected.
//! - [`Standings`]: A ranked table of team records.
//! - [`Resolution`]: The teams holding the award positions.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to almost all types.
//!
pub mod awards;
pub mod bracket;
pub mod competition;
pub mod id;
pub mod matches;
pub mod progression;
pub mod recalculate;
pub mod score;
pub mod seeding;
pub mod standings;
pub mod team;
pub mod view;

mod utils;

pub use awards::{Award, AwardPosition, Resolution};
pub use bracket::{advance_to_playoff, BracketPlan, MatchPlan};
pub use competition::{Competition, Format, StandingMethod};
pub use id::{AwardId, MatchId, PoolId, ScheduleId, TeamId};
pub use matches::{Match, MatchStatus, Matches, TeamSpot};
pub use progression::{Progression, ScoreOutcome};
pub use recalculate::Recalculation;
pub use score::determine_winner;
pub use standings::Standings;
pub use team::{Pool, Team, TeamStatus, Teams};

use thiserror::Error;

use std::result;

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("not enough confirmed teams: need at least 2, found {0}")]
    NotEnoughTeams(usize),
    #[error("no match with id {0}")]
    MatchNotFound(MatchId),
    #[error("match {id} cannot be scored while it is {status}")]
    MatchNotPlayable { id: MatchId, status: MatchStatus },
    #[error("invalid number of ids: expected {expected}, found {found}")]
    InvalidNumberOfIds { expected: usize, found: usize },
    #[error("not every pool match is done")]
    PoolStageIncomplete,
    #[error("the playoff has already started")]
    PlayoffStarted,
    #[error("competition format is {0}, not Pool Play")]
    NotPoolPlay(Format),
}

#[cfg(test)]
mod tests {
    use crate::bracket::BracketPlan;
    use crate::competition::{Competition, Format};
    use crate::id::{MatchId, ScheduleId};
    use crate::matches::Matches;
    use crate::progression::Progression;

    /// Creates `Teams` with `n` confirmed, unseeded teams with the ids `1..=n` in schedule 1.
    #[macro_export]
    macro_rules! teams {
        ($n:expr) => {{
            (1..=$n as u64)
                .map(|id| $crate::team::Team {
                    id: $crate::id::TeamId(id),
                    schedule_id: $crate::id::ScheduleId(1),
                    name: format!("Team {}", id),
                    status: $crate::team::TeamStatus::Confirmed,
                    pool_id: None,
                    seed: None,
                    members: vec![format!("Player {}", id)],
                })
                .collect::<$crate::team::Teams>()
        }};
    }

    /// Builds an elimination bracket for `n` teams with the match ids `1..`, BYEs resolved.
    pub fn elimination(n: usize, third_place_match: bool) -> Matches {
        let mut competition = Competition::new(ScheduleId(1), Format::Elimination);
        competition.third_place_match = third_place_match;

        let plan = BracketPlan::build(&competition, &teams![n], &[]).unwrap();
        let len = plan.len() as u64;
        let mut matches = plan
            .assign_ids(ScheduleId(1), (1..=len).map(MatchId))
            .unwrap();

        Progression::new(&mut matches).resolve_byes();
        matches
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            crate::Error::NotEnoughTeams(1).to_string(),
            "not enough confirmed teams: need at least 2, found 1"
        );
        assert_eq!(
            crate::Error::MatchNotPlayable {
                id: MatchId(3),
                status: crate::MatchStatus::Pending
            }
            .to_string(),
            "match 3 cannot be scored while it is Pending"
        );
    }
}
