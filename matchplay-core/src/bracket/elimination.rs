use super::{BracketPlan, MatchPlan};
use crate::competition::Competition;
use crate::id::TeamId;
use crate::matches::MatchStatus;
use crate::seeding::{bracket_size, standard_order};
use crate::team::Teams;

pub(super) fn build(competition: &Competition, teams: &Teams) -> BracketPlan {
    let seeded: Vec<TeamId> = teams.confirmed_by_seed().iter().map(|team| team.id).collect();

    let size = bracket_size(seeded.len());
    let order = standard_order(size);

    log::debug!(
        "Placing {} teams into a bracket of size {}",
        seeded.len(),
        size
    );

    // Seeds above the number of teams are empty slots.
    let team = |seed: u32| seeded.get(seed as usize - 1).copied();

    let slots = order
        .chunks(2)
        .map(|pair| [team(pair[0]), team(pair[1])])
        .collect();

    let mut plan = BracketPlan::new();
    let first = plan.push_tree(1, slots, competition.third_place_match);

    for index in first {
        settle_first_round(&mut plan.matches[index]);
    }

    plan
}

/// Sets the status of a first round match from its teams. Matches with a missing team become
/// BYEs.
fn settle_first_round(m: &mut MatchPlan) {
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

#[cfg(test)]
mod tests {
    use crate::bracket::BracketPlan;
    use crate::competition::{Competition, Format};
    use crate::id::{ScheduleId, TeamId};
    use crate::matches::MatchStatus;
    use crate::{teams, Error};

    fn competition(third_place_match: bool) -> Competition {
        let mut competition = Competition::new(ScheduleId(1), Format::Elimination);
        competition.third_place_match = third_place_match;
        competition
    }

    #[test]
    fn test_not_enough_teams() {
        assert_eq!(
            BracketPlan::build(&competition(false), &teams![1], &[]),
            Err(Error::NotEnoughTeams(1))
        );
        assert_eq!(
            BracketPlan::build(&competition(false), &teams![0], &[]),
            Err(Error::NotEnoughTeams(0))
        );
    }

    #[test]
    fn test_elimination_8() {
        let plan = BracketPlan::build(&competition(false), &teams![8], &[]).unwrap();
        assert_eq!(plan.len(), 7);

        let first: Vec<[Option<TeamId>; 2]> =
            plan.matches[0..4].iter().map(|m| m.teams).collect();
        assert_eq!(
            first,
            [
                [Some(TeamId(1)), Some(TeamId(8))],
                [Some(TeamId(4)), Some(TeamId(5))],
                [Some(TeamId(3)), Some(TeamId(6))],
                [Some(TeamId(2)), Some(TeamId(7))],
            ]
        );

        assert!(plan.matches[0..4]
            .iter()
            .all(|m| m.status == MatchStatus::Active && !m.is_bye));
        assert!(plan.matches[4..]
            .iter()
            .all(|m| m.status == MatchStatus::Pending));
        assert_eq!(plan.matches[6].round, 3);
        assert_eq!(plan.matches[6].round_name, "Final");
    }

    #[test]
    fn test_elimination_5_byes() {
        let plan = BracketPlan::build(&competition(false), &teams![5], &[]).unwrap();

        let byes: Vec<_> = plan.matches.iter().filter(|m| m.is_bye).collect();
        assert_eq!(byes.len(), 3);
        for m in byes {
            assert_eq!(m.status, MatchStatus::Bye);
            assert!(m.winner.is_some());
        }

        // Seeds 1, 2 and 3 advance automatically.
        let mut winners: Vec<TeamId> = plan.matches.iter().filter_map(|m| m.winner).collect();
        winners.sort();
        assert_eq!(winners, [TeamId(1), TeamId(2), TeamId(3)]);

        // 4 plays 5.
        assert_eq!(plan.matches[1].teams, [Some(TeamId(4)), Some(TeamId(5))]);
    }

    #[test]
    fn test_elimination_respects_seeds() {
        let mut teams = teams![4];
        teams[0].seed = Some(4);
        teams[1].seed = Some(3);
        teams[2].seed = Some(2);
        teams[3].seed = Some(1);

        let plan = BracketPlan::build(&competition(false), &teams, &[]).unwrap();
        assert_eq!(plan.matches[0].teams, [Some(TeamId(4)), None]);
        assert_eq!(plan.matches[0].winner, Some(TeamId(4)));
    }

    #[test]
    fn test_elimination_third_place() {
        let plan = BracketPlan::build(&competition(true), &teams![16], &[]).unwrap();
        assert_eq!(plan.len(), 16);

        let third = plan.matches.last().unwrap();
        assert!(third.is_third_place);
        assert_eq!(third.round_name, "Third Place");
        assert_eq!(third.round, 4);
        assert_eq!(third.number, 2);

        let feeding = plan
            .matches
            .iter()
            .filter(|m| m.next_loser == Some(plan.len() - 1))
            .count();
        assert_eq!(feeding, 2);
    }

    #[test]
    fn test_elimination_large() {
        let plan = BracketPlan::build(&competition(false), &teams![40], &[]).unwrap();
        assert_eq!(plan.len(), 63);
        assert_eq!(plan.matches[0].round_name, "Round of 64");
        assert_eq!(plan.matches.iter().filter(|m| m.is_bye).count(), 24);
    }
}
