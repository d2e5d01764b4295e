use super::round_robin::push_matches;
use super::BracketPlan;
use crate::competition::{Competition, Format};
use crate::id::TeamId;
use crate::matches::{MatchStatus, Matches};
use crate::progression::Progression;
use crate::seeding::cross_pool_order;
use crate::standings::Standings;
use crate::team::{Pool, Teams};
use crate::{Error, Result};

pub(super) fn build(competition: &Competition, teams: &Teams, pools: &[Pool]) -> BracketPlan {
    let mut plan = BracketPlan::new();

    let mut number = 0;
    for pool in pools {
        let members = pool_members(teams, pool);

        if members.len() < 2 {
            log::debug!("{} has {} teams, skipping", pool.name, members.len());
        }

        push_matches(&mut plan, &members, &pool.name, false, &mut number);
    }

    let size = competition.total_advancing().next_power_of_two();
    if size > 1 {
        log::debug!("Adding playoff tree with {} slots", size);

        plan.push_tree(
            2,
            vec![[None, None]; size / 2],
            competition.third_place_match,
        );
    }

    plan
}

/// Returns the confirmed teams of `pool` in seed order.
fn pool_members(teams: &Teams, pool: &Pool) -> Vec<TeamId> {
    teams
        .confirmed_by_seed()
        .into_iter()
        .filter(|team| team.pool_id == Some(pool.id))
        .map(|team| team.id)
        .collect()
}

/// Seeds the pool winners into the playoff tree.
///
/// Every pool is ranked with the pool stage results, the top `winners_per_pool` teams of every
/// pool qualify. The qualifiers are ordered by [`cross_pool_order`] and fill the first playoff
/// round from the top: qualifier `k` takes slot `k % 2` of match `k / 2`. Slots left over become
/// BYEs which are resolved immediately.
///
/// Returns the qualifiers in seeding order.
///
/// # Errors
///
/// - [`Error::NotPoolPlay`] if the competition is not [`Format::PoolPlay`].
/// - [`Error::PoolStageIncomplete`] if any pool match is not `Done`.
/// - [`Error::PlayoffStarted`] if any playoff match is already `Done`.
pub fn advance_to_playoff(
    competition: &Competition,
    teams: &Teams,
    pools: &[Pool],
    matches: &mut Matches,
) -> Result<Vec<TeamId>> {
    if competition.format != Format::PoolPlay {
        return Err(Error::NotPoolPlay(competition.format));
    }

    if matches
        .iter()
        .any(|m| m.round == 1 && m.status != MatchStatus::Done)
    {
        return Err(Error::PoolStageIncomplete);
    }

    if matches
        .iter()
        .any(|m| m.round > 1 && m.status == MatchStatus::Done)
    {
        return Err(Error::PlayoffStarted);
    }

    let winners = competition.winners_per_pool as usize;

    let ranked: Vec<Vec<TeamId>> = pools
        .iter()
        .map(|pool| {
            let members = pool_members(teams, pool);
            let standings = Standings::calculate(
                competition,
                &members,
                matches.iter().filter(|m| m.round == 1),
            );

            standings.ranked().take(winners).collect()
        })
        .collect();

    let qualifiers = cross_pool_order(&ranked, winners);
    log::debug!("{} teams qualified for the playoff", qualifiers.len());

    let Some(first) = matches.iter().filter(|m| m.round > 1).map(|m| m.round).min() else {
        log::debug!("No playoff tree, nothing to seed");
        return Ok(qualifiers);
    };

    let first_round: Vec<_> = matches
        .round(first)
        .into_iter()
        .filter(|m| !m.is_third_place)
        .map(|m| m.id)
        .collect();

    for m in matches.iter_mut().filter(|m| m.round > 1) {
        m.reset();
    }

    for (index, id) in first_round.into_iter().enumerate() {
        let Some(m) = matches.get_mut(id) else {
            continue;
        };

        m.teams = [
            qualifiers.get(index * 2).copied(),
            qualifiers.get(index * 2 + 1).copied(),
        ];

        match m.teams {
            [Some(_), Some(_)] => m.status = MatchStatus::Active,
            [Some(team), None] | [None, Some(team)] => {
                m.status = MatchStatus::Bye;
                m.is_bye = true;
                m.winner = Some(team);
            }
            [None, None] => {
                m.status = MatchStatus::Bye;
                m.is_bye = true;
            }
        }
    }

    Progression::new(matches).resolve_byes();

    Ok(qualifiers)
}

#[cfg(test)]
mod tests {
    use super::advance_to_playoff;
    use crate::bracket::BracketPlan;
    use crate::competition::{Competition, Format};
    use crate::id::{MatchId, PoolId, ScheduleId, TeamId};
    use crate::matches::{MatchStatus, Matches};
    use crate::progression::{Progression, ScoreOutcome};
    use crate::team::{Pool, Teams};
    use crate::{teams, Error};

    fn setup(
        pool_count: usize,
        teams_per_pool: usize,
        winners: u32,
    ) -> (Competition, Teams, Vec<Pool>, Matches) {
        let mut competition = Competition::new(ScheduleId(1), Format::PoolPlay);
        competition.pool_count = pool_count as u32;
        competition.winners_per_pool = winners;
        competition.third_place_match = true;

        let pools: Vec<Pool> = (0..pool_count)
            .map(|index| Pool {
                id: PoolId(index as u64 + 1),
                schedule_id: ScheduleId(1),
                name: Pool::name_for(index),
            })
            .collect();

        let mut teams = teams![pool_count * teams_per_pool];
        for (index, team) in teams.iter_mut().enumerate() {
            team.pool_id = Some(pools[index / teams_per_pool].id);
        }

        let plan = BracketPlan::build(&competition, &teams, &pools).unwrap();
        let len = plan.len() as u64;
        let matches = plan
            .assign_ids(ScheduleId(1), (1..=len).map(MatchId))
            .unwrap();

        (competition, teams, pools, matches)
    }

    /// Plays every pool match, the team with the lower id wins.
    fn play_pools(matches: &mut Matches) {
        let ids: Vec<MatchId> = matches
            .iter()
            .filter(|m| m.round == 1)
            .map(|m| m.id)
            .collect();

        let mut progression = Progression::new(matches);
        for id in ids {
            let teams = progression.matches()[id].teams;
            let (first, second) = if teams[0] < teams[1] {
                ("21", "10")
            } else {
                ("10", "21")
            };

            let outcome = progression.submit_score(id, first, second).unwrap();
            assert!(matches!(outcome, ScoreOutcome::Decided { .. }));
        }
    }

    #[test]
    fn test_pool_play_plan() {
        let (_, _, _, matches) = setup(2, 4, 2);

        // 2 pools of 4: 6 matches each, a playoff of 4 and a third place match.
        assert_eq!(matches.len(), 12 + 3 + 1);
        assert_eq!(matches.round(1).len(), 12);
        assert_eq!(matches[MatchId(1)].round_name, "Pool A");
        assert_eq!(matches[MatchId(7)].round_name, "Pool B");

        let semifinals = matches.round(2);
        assert_eq!(semifinals.len(), 2);
        assert!(semifinals.iter().all(|m| m.status == MatchStatus::Pending));
        assert_eq!(semifinals[0].round_name, "Semi-Finals");
        assert!(matches.third_place_match().is_some());
    }

    #[test]
    fn test_advance_to_playoff() {
        let (competition, teams, pools, mut matches) = setup(2, 4, 2);

        assert_eq!(
            advance_to_playoff(&competition, &teams, &pools, &mut matches),
            Err(Error::PoolStageIncomplete)
        );

        play_pools(&mut matches);

        let qualifiers = advance_to_playoff(&competition, &teams, &pools, &mut matches).unwrap();
        // A1, B2, B1, A2
        assert_eq!(qualifiers, [TeamId(1), TeamId(6), TeamId(5), TeamId(2)]);

        let semifinals = matches.round(2);
        assert_eq!(semifinals[0].teams, [Some(TeamId(1)), Some(TeamId(6))]);
        assert_eq!(semifinals[1].teams, [Some(TeamId(5)), Some(TeamId(2))]);
        assert!(semifinals.iter().all(|m| m.status == MatchStatus::Active));

        // Advancing again before any playoff match is played reseeds the same way.
        let again = advance_to_playoff(&competition, &teams, &pools, &mut matches).unwrap();
        assert_eq!(again, qualifiers);

        let id = matches.round(2)[0].id;
        Progression::new(&mut matches)
            .submit_score(id, "21", "3")
            .unwrap();

        assert_eq!(
            advance_to_playoff(&competition, &teams, &pools, &mut matches),
            Err(Error::PlayoffStarted)
        );
    }

    #[test]
    fn test_advance_to_playoff_byes() {
        // 3 pools with 2 winners each: 6 qualifiers in a playoff of 8.
        let (competition, teams, pools, mut matches) = setup(3, 3, 2);
        play_pools(&mut matches);

        let qualifiers = advance_to_playoff(&competition, &teams, &pools, &mut matches).unwrap();
        assert_eq!(
            qualifiers,
            [TeamId(1), TeamId(4), TeamId(7), TeamId(2), TeamId(5), TeamId(8)]
        );

        let quarterfinals = matches.round(2);
        assert_eq!(quarterfinals.len(), 4);
        assert_eq!(quarterfinals[2].teams, [Some(TeamId(5)), Some(TeamId(8))]);

        // The last match has no teams and propagates an empty slot.
        assert_eq!(quarterfinals[3].status, MatchStatus::Bye);
        assert_eq!(quarterfinals[3].winner, None);

        // The second semifinal waits for match 3, its other slot is empty.
        let semifinals = matches.round(3);
        assert_eq!(semifinals[1].status, MatchStatus::Pending);
    }

    #[test]
    fn test_advance_to_playoff_wrong_format() {
        let (mut competition, teams, pools, mut matches) = setup(2, 2, 1);
        competition.format = Format::Elimination;

        assert_eq!(
            advance_to_playoff(&competition, &teams, &pools, &mut matches),
            Err(Error::NotPoolPlay(Format::Elimination))
        );
    }
}
