//! The operations of the engine on stored schedules.
//!
//! Every mutating operation holds the schedule's lock from [`ScheduleLocks`] and runs in a single
//! transaction which starts by locking the schedule row. Either all changes of an operation
//! become visible or none.
use matchplay_core::bracket::advance_to_playoff;
use matchplay_core::seeding;
use matchplay_core::view::{BracketView, DrawView, MatchListing, MatchView};
use matchplay_core::{
    Award, AwardPosition, BracketPlan, Competition, Format, MatchId, Matches, Pool, PoolId,
    Progression, Resolution, ScheduleId, ScoreOutcome, Standings, TeamId, Teams,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::locks::ScheduleLocks;
use crate::store::{ScheduleStatus, Store, Transaction};
use crate::Error;

/// The response to a score submission.
#[derive(Clone, Debug, Serialize)]
pub struct ScoreSubmission {
    #[serde(rename = "match")]
    pub m: MatchView,
    #[serde(flatten)]
    pub outcome: ScoreOutcome,
}

/// The standings of a pool, or of all teams in a round robin competition.
#[derive(Clone, Debug, Serialize)]
pub struct StandingsTable {
    pub name: String,
    pub pool_id: Option<PoolId>,
    pub standings: Standings,
}

#[derive(Debug)]
pub struct Service {
    store: Store,
    locks: ScheduleLocks,
}

impl Service {
    pub fn new(store: Store, locks: ScheduleLocks) -> Self {
        Self { store, locks }
    }

    /// Assigns pools (Pool Play) or bracket seeds to the confirmed teams that have none yet.
    pub async fn generate_draw(&self, schedule: ScheduleId) -> Result<DrawView, Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let mut teams = tx.teams(schedule).list().await?;
        let mut pools = tx.pools(schedule).list().await?;

        draw(&mut tx, &competition, &mut teams, &mut pools).await?;

        tx.commit().await?;
        Ok(DrawView::new(&competition, &teams, &pools))
    }

    /// Throws away the current draw and draws again. Fails once the competition has matches.
    pub async fn regenerate_draw(&self, schedule: ScheduleId) -> Result<DrawView, Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;

        if tx.matches(schedule).count().await? > 0 {
            return Err(Error::CompetitionStarted(schedule));
        }

        let mut teams = tx.teams(schedule).list().await?;
        let mut pools = Vec::new();

        log::info!("Regenerating draw of schedule {}", schedule);

        match competition.format {
            Format::PoolPlay => {
                for team in teams.iter_mut().filter(|team| team.pool_id.is_some()) {
                    tx.teams(schedule).set_pool(team.id, None).await?;
                    team.pool_id = None;
                }

                tx.pools(schedule).delete_all().await?;
                draw(&mut tx, &competition, &mut teams, &mut pools).await?;
            }
            Format::Elimination | Format::RoundRobin => {
                let assignments = {
                    let mut rng = StdRng::from_entropy();
                    seeding::reseed(&teams, &mut rng)
                };

                set_seeds(&mut tx, schedule, &mut teams, assignments).await?;
                pools = tx.pools(schedule).list().await?;
            }
        }

        tx.commit().await?;
        Ok(DrawView::new(&competition, &teams, &pools))
    }

    pub async fn publish_draw(&self, schedule: ScheduleId, published: bool) -> Result<(), Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        lock_schedule(&mut tx, schedule).await?;
        load_competition(&mut tx, schedule).await?;

        tx.competitions()
            .set_draw_published(schedule, published)
            .await?;

        tx.commit().await
    }

    /// Returns the current draw.
    pub async fn draw(&self, schedule: ScheduleId) -> Result<DrawView, Error> {
        let mut tx = self.store.begin().await?;

        find_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let pools = tx.pools(schedule).list().await?;

        Ok(DrawView::new(&competition, &teams, &pools))
    }

    /// Deletes all matches of the schedule and builds them again from the current draw.
    pub async fn start_competition(&self, schedule: ScheduleId) -> Result<BracketView, Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        let status = lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let mut teams = tx.teams(schedule).list().await?;
        let mut pools = tx.pools(schedule).list().await?;

        draw(&mut tx, &competition, &mut teams, &mut pools).await?;

        let plan = BracketPlan::build(&competition, &teams, &pools)?;

        let deleted = tx.matches(schedule).delete_all().await?;
        if deleted > 0 {
            log::info!(
                "Restarting schedule {}: deleted {} matches",
                schedule,
                deleted
            );
        }

        // The matches need ids before they can link to each other.
        let mut ids = Vec::with_capacity(plan.len());
        for m in &plan.matches {
            ids.push(tx.matches(schedule).insert(m).await?);
        }

        let mut matches = plan.assign_ids(schedule, ids)?;
        Progression::new(&mut matches).resolve_byes();

        for m in matches.iter() {
            tx.matches(schedule).update(m).await?;
        }

        log::info!(
            "Started {} competition of schedule {} with {} matches",
            competition.format,
            schedule,
            matches.len()
        );

        tx.schedules()
            .set_status(schedule, ScheduleStatus::InProgress)
            .await?;
        refresh_awards(
            &mut tx,
            &competition,
            &teams,
            &matches,
            ScheduleStatus::InProgress,
        )
        .await?;

        if status != ScheduleStatus::Upcoming {
            log::debug!("Schedule {} was {} before the start", schedule, status);
        }

        tx.commit().await?;
        Ok(BracketView::new(&competition, &teams, &matches))
    }

    /// Records the scores of match `id`. Correcting a decided match recalculates the bracket.
    pub async fn submit_score(
        &self,
        id: MatchId,
        first: &str,
        second: &str,
    ) -> Result<ScoreSubmission, Error> {
        let schedule = self
            .store
            .match_schedule(id)
            .await?
            .ok_or(Error::NotFound)?;

        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        let status = lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let mut matches = tx.matches(schedule).list().await?;

        let before = matches.clone();
        let outcome = Progression::new(&mut matches).submit_score(id, first, second)?;

        match &outcome {
            ScoreOutcome::Undecided => {
                log::debug!("Match {} has no winner yet", id);
            }
            ScoreOutcome::Decided { winner } => {
                log::info!("Match {} won by team {}", id, winner);
            }
            ScoreOutcome::Recalculated(recalculation) => {
                log::info!(
                    "Match {} corrected, recalculated {} matches",
                    id,
                    recalculation.affected.len()
                );
            }
        }

        save_changes(&mut tx, schedule, &matches, &before).await?;
        refresh_awards(&mut tx, &competition, &teams, &matches, status).await?;

        tx.commit().await?;

        Ok(ScoreSubmission {
            m: MatchView::new(&teams, &matches[id]),
            outcome,
        })
    }

    /// Seeds the playoff of a Pool Play competition with the pool winners.
    pub async fn advance_to_playoff(&self, schedule: ScheduleId) -> Result<BracketView, Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        let status = lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let pools = tx.pools(schedule).list().await?;
        let mut matches = tx.matches(schedule).list().await?;

        let before = matches.clone();
        let qualifiers = advance_to_playoff(&competition, &teams, &pools, &mut matches)?;

        log::info!(
            "Advanced {} teams of schedule {} to the playoff",
            qualifiers.len(),
            schedule
        );

        save_changes(&mut tx, schedule, &matches, &before).await?;
        refresh_awards(&mut tx, &competition, &teams, &matches, status).await?;

        tx.commit().await?;
        Ok(BracketView::new(&competition, &teams, &matches))
    }

    pub async fn bracket(&self, schedule: ScheduleId) -> Result<BracketView, Error> {
        let mut tx = self.store.begin().await?;

        find_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let matches = tx.matches(schedule).list().await?;

        Ok(BracketView::new(&competition, &teams, &matches))
    }

    pub async fn matches(&self, schedule: ScheduleId) -> Result<MatchListing, Error> {
        let mut tx = self.store.begin().await?;

        find_schedule(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let matches = tx.matches(schedule).list().await?;

        Ok(MatchListing::new(&teams, &matches))
    }

    pub async fn standings(&self, schedule: ScheduleId) -> Result<Vec<StandingsTable>, Error> {
        let mut tx = self.store.begin().await?;

        find_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;
        let teams = tx.teams(schedule).list().await?;
        let pools = tx.pools(schedule).list().await?;
        let matches = tx.matches(schedule).list().await?;

        Ok(standings_tables(&competition, &teams, &pools, &matches))
    }

    /// Creates or updates the competition of a schedule.
    ///
    /// Settings that shape the bracket can only be changed as long as the schedule has no
    /// matches. The draw
    /// publication flag is kept, use [`publish_draw`] to change it.
    ///
    /// [`publish_draw`]: Self::publish_draw
    pub async fn configure(&self, mut competition: Competition) -> Result<Competition, Error> {
        let schedule = competition.schedule_id;

        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        lock_schedule(&mut tx, schedule).await?;

        if let Some(current) = tx.competitions().get(schedule).await? {
            let started = tx.matches(schedule).count().await? > 0;
            check_reconfigure(&current, &competition, started)?;

            competition.draw_published = current.draw_published;
        }

        tx.competitions().put(&competition).await?;

        log::info!(
            "Configured {} competition for schedule {}",
            competition.format,
            schedule
        );

        tx.commit().await?;
        Ok(competition)
    }

    /// Creates the awards of a schedule, if they don't exist yet, and resolves them.
    pub async fn configure_awards(&self, schedule: ScheduleId) -> Result<Vec<Award>, Error> {
        let _guard = self.locks.lock(schedule).await;
        let mut tx = self.store.begin().await?;

        let status = lock_schedule(&mut tx, schedule).await?;
        let competition = load_competition(&mut tx, schedule).await?;

        if tx.awards(schedule).list().await?.is_empty() {
            for position in AwardPosition::ALL {
                tx.awards(schedule).insert(position).await?;
            }
        }

        let teams = tx.teams(schedule).list().await?;
        let matches = tx.matches(schedule).list().await?;
        let awards = refresh_awards(&mut tx, &competition, &teams, &matches, status).await?;

        tx.commit().await?;
        Ok(awards)
    }

    pub async fn awards(&self, schedule: ScheduleId) -> Result<Vec<Award>, Error> {
        let mut tx = self.store.begin().await?;

        find_schedule(&mut tx, schedule).await?;
        let awards = tx.awards(schedule).list().await?;

        Ok(awards)
    }
}

/// Locks the schedule row. Fails with [`Error::NotFound`] if it does not exist.
async fn lock_schedule(
    tx: &mut Transaction<'_>,
    schedule: ScheduleId,
) -> Result<ScheduleStatus, Error> {
    tx.schedules().lock(schedule).await?.ok_or(Error::NotFound)
}

async fn find_schedule(
    tx: &mut Transaction<'_>,
    schedule: ScheduleId,
) -> Result<ScheduleStatus, Error> {
    tx.schedules().get(schedule).await?.ok_or(Error::NotFound)
}

async fn load_competition(
    tx: &mut Transaction<'_>,
    schedule: ScheduleId,
) -> Result<Competition, Error> {
    tx.competitions()
        .get(schedule)
        .await?
        .ok_or(Error::NotConfigured(schedule))
}

/// Creates the pools if needed and assigns pools or seeds to the confirmed teams without one.
/// `teams` and `pools` are updated in place.
async fn draw(
    tx: &mut Transaction<'_>,
    competition: &Competition,
    teams: &mut Teams,
    pools: &mut Vec<Pool>,
) -> Result<(), Error> {
    let schedule = competition.schedule_id;

    match competition.format {
        Format::PoolPlay => {
            if pools.is_empty() {
                for index in 0..competition.pool_count as usize {
                    let name = Pool::name_for(index);
                    let id = tx.pools(schedule).insert(&name).await?;

                    pools.push(Pool {
                        id,
                        schedule_id: schedule,
                        name,
                    });
                }
            }

            let assignments = seeding::assign_pools(teams, pools);
            for (team_id, pool_id) in assignments {
                tx.teams(schedule).set_pool(team_id, Some(pool_id)).await?;

                if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
                    team.pool_id = Some(pool_id);
                }
            }
        }
        Format::Elimination | Format::RoundRobin => {
            let assignments = {
                let mut rng = StdRng::from_entropy();
                seeding::assign_bracket_seeds(teams, &mut rng)
            };

            set_seeds(tx, schedule, teams, assignments).await?;
        }
    }

    Ok(())
}

async fn set_seeds(
    tx: &mut Transaction<'_>,
    schedule: ScheduleId,
    teams: &mut Teams,
    assignments: Vec<(TeamId, u32)>,
) -> Result<(), Error> {
    for (team_id, seed) in assignments {
        tx.teams(schedule).set_seed(team_id, Some(seed)).await?;

        if let Some(team) = teams.iter_mut().find(|team| team.id == team_id) {
            team.seed = Some(seed);
        }
    }

    Ok(())
}

/// Rejects a new configuration that would build different matches than the existing ones.
fn check_reconfigure(
    current: &Competition,
    competition: &Competition,
    started: bool,
) -> Result<(), Error> {
    if started && !current.same_bracket(competition) {
        return Err(Error::CompetitionStarted(current.schedule_id));
    }

    Ok(())
}

/// Writes every match that differs from `before`.
async fn save_changes(
    tx: &mut Transaction<'_>,
    schedule: ScheduleId,
    matches: &Matches,
    before: &Matches,
) -> Result<(), Error> {
    let mut count = 0;
    for m in matches.changed_since(before) {
        tx.matches(schedule).update(m).await?;
        count += 1;
    }

    log::debug!("Saved {} changed matches of schedule {}", count, schedule);
    Ok(())
}

/// Resolves the awards from the current matches and stores the awards that changed. The
/// schedule is completed once the champion is known.
async fn refresh_awards(
    tx: &mut Transaction<'_>,
    competition: &Competition,
    teams: &Teams,
    matches: &Matches,
    status: ScheduleStatus,
) -> Result<Vec<Award>, Error> {
    let schedule = competition.schedule_id;

    let resolution = Resolution::resolve(competition, teams, matches);
    let mut awards = tx.awards(schedule).list().await?;

    for id in resolution.apply(&mut awards) {
        if let Some(award) = awards.iter().find(|award| award.id == id) {
            log::info!(
                "Award {} of schedule {} goes to {:?}",
                award.position,
                schedule,
                award.team_id
            );

            tx.awards(schedule).set_team(id, award.team_id).await?;
        }
    }

    let next = status_after(status, &resolution);
    if next != status {
        log::info!("Schedule {} is now {}", schedule, next);
        tx.schedules().set_status(schedule, next).await?;
    }

    Ok(awards)
}

/// Returns the schedule status once `resolution` is known.
fn status_after(status: ScheduleStatus, resolution: &Resolution) -> ScheduleStatus {
    match (status, resolution.champion) {
        (ScheduleStatus::InProgress, Some(_)) => ScheduleStatus::Completed,
        // A corrected final can take the champion away again.
        (ScheduleStatus::Completed, None) => ScheduleStatus::InProgress,
        (status, _) => status,
    }
}

/// Builds one table per pool (Pool Play) or a single table (Round Robin). Elimination
/// competitions have no standings.
fn standings_tables(
    competition: &Competition,
    teams: &Teams,
    pools: &[Pool],
    matches: &Matches,
) -> Vec<StandingsTable> {
    match competition.format {
        Format::Elimination => Vec::new(),
        Format::RoundRobin => {
            let ids: Vec<TeamId> = teams.confirmed_by_seed().iter().map(|t| t.id).collect();

            vec![StandingsTable {
                name: String::from("Round Robin"),
                pool_id: None,
                standings: Standings::calculate(competition, &ids, matches.iter()),
            }]
        }
        Format::PoolPlay => pools
            .iter()
            .map(|pool| {
                let ids: Vec<TeamId> = teams
                    .confirmed_by_seed()
                    .into_iter()
                    .filter(|team| team.pool_id == Some(pool.id))
                    .map(|team| team.id)
                    .collect();

                // Playoff matches between teams of the same pool don't count.
                let pool_matches = matches.iter().filter(|m| m.round == 1);

                StandingsTable {
                    name: pool.name.clone(),
                    pool_id: Some(pool.id),
                    standings: Standings::calculate(competition, &ids, pool_matches),
                }
            })
            .collect(),
    }
}
