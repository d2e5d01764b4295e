//! # Views
//!
//! Read-only projections of the matches and the draw of a schedule, with team names resolved.
use crate::competition::{Competition, Format};
use crate::id::{MatchId, PoolId, TeamId};
use crate::matches::{Match, MatchStatus, Matches};
use crate::team::{Pool, Teams};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TeamView {
    pub id: TeamId,
    pub name: String,
}

impl TeamView {
    fn new(teams: &Teams, id: TeamId) -> Self {
        Self {
            id,
            name: teams.name(id).unwrap_or_default().to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchView {
    pub id: MatchId,
    pub round: u32,
    pub round_name: String,
    pub number: u32,
    pub teams: [Option<TeamView>; 2],
    pub scores: [String; 2],
    pub status: MatchStatus,
    pub winner: Option<TeamId>,
    pub is_bye: bool,
    pub is_third_place: bool,
    pub next_match: Option<MatchId>,
    pub next_loser_match: Option<MatchId>,
}

impl MatchView {
    pub fn new(teams: &Teams, m: &Match) -> Self {
        Self {
            id: m.id,
            round: m.round,
            round_name: m.round_name.clone(),
            number: m.number,
            teams: m.teams.map(|team| team.map(|id| TeamView::new(teams, id))),
            scores: m.scores.clone(),
            status: m.status,
            winner: m.winner,
            is_bye: m.is_bye,
            is_third_place: m.is_third_place,
            next_match: m.next_match,
            next_loser_match: m.next_loser_match,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoundView {
    pub round: u32,
    pub name: String,
    pub matches: Vec<MatchView>,
}

/// The matches of a schedule grouped into rounds. Pool matches are grouped per pool.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BracketView {
    pub format: Format,
    pub rounds: Vec<RoundView>,
    pub third_place: Option<MatchView>,
}

impl BracketView {
    pub fn new(competition: &Competition, teams: &Teams, matches: &Matches) -> Self {
        let mut rounds: Vec<RoundView> = Vec::new();
        let mut third_place = None;

        for m in MatchListing::new(teams, matches).matches {
            if m.is_third_place {
                third_place = Some(m);
                continue;
            }

            match rounds.iter_mut().find(|round| {
                round.round == m.round && round.name == m.round_name
            }) {
                Some(round) => round.matches.push(m),
                None => rounds.push(RoundView {
                    round: m.round,
                    name: m.round_name.clone(),
                    matches: vec![m],
                }),
            }
        }

        Self {
            format: competition.format,
            rounds,
            third_place,
        }
    }
}

/// All matches of a schedule ordered by round and match number.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MatchListing {
    pub matches: Vec<MatchView>,
}

impl MatchListing {
    pub fn new(teams: &Teams, matches: &Matches) -> Self {
        let matches = matches
            .ordered_ids()
            .into_iter()
            .map(|id| MatchView::new(teams, &matches[id]))
            .collect();

        Self { matches }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolView {
    pub id: PoolId,
    pub name: String,
    pub teams: Vec<TeamView>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeedView {
    pub seed: Option<u32>,
    pub team: TeamView,
}

/// The draw of a schedule: the pools with their teams for pool play, the seeded teams otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DrawView {
    pub format: Format,
    pub published: bool,
    pub pools: Vec<PoolView>,
    pub seeds: Vec<SeedView>,
}

impl DrawView {
    pub fn new(competition: &Competition, teams: &Teams, pools: &[Pool]) -> Self {
        let mut view = Self {
            format: competition.format,
            published: competition.draw_published,
            pools: Vec::new(),
            seeds: Vec::new(),
        };

        match competition.format {
            Format::PoolPlay => {
                view.pools = pools
                    .iter()
                    .map(|pool| PoolView {
                        id: pool.id,
                        name: pool.name.clone(),
                        teams: teams
                            .confirmed_by_seed()
                            .into_iter()
                            .filter(|team| team.pool_id == Some(pool.id))
                            .map(|team| TeamView::new(teams, team.id))
                            .collect(),
                    })
                    .collect();
            }
            Format::Elimination | Format::RoundRobin => {
                view.seeds = teams
                    .confirmed_by_seed()
                    .into_iter()
                    .map(|team| SeedView {
                        seed: team.seed,
                        team: TeamView::new(teams, team.id),
                    })
                    .collect();
            }
        }

        view
    }
}
