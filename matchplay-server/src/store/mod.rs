//! The MySQL store.
//!
//! Every operation of the service runs inside a [`Transaction`]. Mutating operations first lock
//! the schedule row with [`SchedulesClient::lock`], which serializes them against other processes
//! sharing the same database.
use std::fmt::{self, Display, Formatter};

use futures::TryStreamExt;
use matchplay_core::{
    Award, AwardId, AwardPosition, Competition, Format, Match, MatchId, MatchPlan, MatchStatus,
    Matches, Pool, PoolId, ScheduleId, StandingMethod, Team, TeamId, TeamStatus, Teams,
};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::Row;

use crate::Error;

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

/// Decodes a byte enum column, failing with a decode error on unknown values.
macro_rules! byte_column {
    ($row:expr, $column:expr, $ty:ty) => {{
        let value: u8 = $row.try_get($column)?;
        <$ty>::from_u8(value).ok_or_else(|| invalid_value($column, value))?
    }};
}

fn invalid_value(column: &str, value: u8) -> Error {
    sqlx::Error::Decode(format!("invalid value {} in column {}", value, column).into()).into()
}

/// The lifecycle state of a schedule.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScheduleStatus {
    Upcoming,
    InProgress,
    Completed,
}

impl ScheduleStatus {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Upcoming => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Upcoming),
            1 => Some(Self::InProgress),
            2 => Some(Self::Completed),
            _ => None,
        }
    }
}

impl Display for ScheduleStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Upcoming => "Upcoming",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        })
    }
}

#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    /// Creates all tables that don't exist yet.
    pub async fn create_tables(&self) -> Result<(), Error> {
        let tables = [
            "CREATE TABLE IF NOT EXISTS {}schedules (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, status TINYINT UNSIGNED NOT NULL DEFAULT 0)",
            "CREATE TABLE IF NOT EXISTS {}schedule_staff (schedule_id BIGINT UNSIGNED NOT NULL, user_id BIGINT UNSIGNED NOT NULL, PRIMARY KEY (schedule_id, user_id))",
            "CREATE TABLE IF NOT EXISTS {}competitions (schedule_id BIGINT UNSIGNED PRIMARY KEY, format TINYINT UNSIGNED NOT NULL, pool_count INT UNSIGNED NOT NULL, winners_per_pool INT UNSIGNED NOT NULL, third_place_match BOOLEAN NOT NULL, double_round_robin BOOLEAN NOT NULL, standing_method TINYINT UNSIGNED NOT NULL, win_points BIGINT NOT NULL, loss_points BIGINT NOT NULL, draw_points BIGINT NOT NULL, draw_published BOOLEAN NOT NULL)",
            "CREATE TABLE IF NOT EXISTS {}teams (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, schedule_id BIGINT UNSIGNED NOT NULL, name TEXT NOT NULL, status TINYINT UNSIGNED NOT NULL, pool_id BIGINT UNSIGNED, seed INT UNSIGNED, members TEXT NOT NULL, INDEX (schedule_id))",
            "CREATE TABLE IF NOT EXISTS {}pools (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, schedule_id BIGINT UNSIGNED NOT NULL, name TEXT NOT NULL, INDEX (schedule_id))",
            "CREATE TABLE IF NOT EXISTS {}matches (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, schedule_id BIGINT UNSIGNED NOT NULL, round INT UNSIGNED NOT NULL, round_name TEXT NOT NULL, number INT UNSIGNED NOT NULL, team1 BIGINT UNSIGNED, team2 BIGINT UNSIGNED, score1 TEXT NOT NULL, score2 TEXT NOT NULL, status TINYINT UNSIGNED NOT NULL, winner BIGINT UNSIGNED, is_bye BOOLEAN NOT NULL, is_third_place BOOLEAN NOT NULL, position TINYINT UNSIGNED NOT NULL, next_match BIGINT UNSIGNED, next_loser_match BIGINT UNSIGNED, INDEX (schedule_id))",
            "CREATE TABLE IF NOT EXISTS {}awards (id BIGINT UNSIGNED AUTO_INCREMENT PRIMARY KEY, schedule_id BIGINT UNSIGNED NOT NULL, position TINYINT UNSIGNED NOT NULL, team_id BIGINT UNSIGNED, INDEX (schedule_id))",
        ];

        for table in tables {
            let sql = table.replacen("{}", &self.table_prefix, 1);
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        log::info!("Created {} tables", tables.len());

        Ok(())
    }

    /// Begins a new [`Transaction`].
    pub async fn begin(&self) -> Result<Transaction<'_>, Error> {
        let inner = self.pool.begin().await?;

        Ok(Transaction {
            inner,
            table_prefix: &self.table_prefix,
        })
    }

    /// Returns the schedule of the match with the given `id`.
    pub async fn match_schedule(&self, id: MatchId) -> Result<Option<ScheduleId>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT schedule_id FROM {}matches WHERE id = ?",
                self.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
        );

        Ok(Some(ScheduleId(row.try_get("schedule_id")?)))
    }

    /// Returns `true` if the user `user_id` is an organizer or staff member of `schedule`.
    pub async fn is_staff(&self, schedule: ScheduleId, user_id: u64) -> Result<bool, Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS count FROM {}schedule_staff WHERE schedule_id = ? AND user_id = ?",
            self.table_prefix
        ))
        .bind(schedule.0)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count > 0)
    }
}

/// A database transaction. Dropping it without calling [`commit`] rolls back all changes.
///
/// [`commit`]: Self::commit
pub struct Transaction<'a> {
    inner: sqlx::Transaction<'static, MySql>,
    table_prefix: &'a str,
}

impl<'a> Transaction<'a> {
    pub async fn commit(self) -> Result<(), Error> {
        self.inner.commit().await?;
        Ok(())
    }

    #[inline]
    pub fn schedules(&mut self) -> SchedulesClient<'_, 'a> {
        SchedulesClient { tx: self }
    }

    #[inline]
    pub fn competitions(&mut self) -> CompetitionsClient<'_, 'a> {
        CompetitionsClient { tx: self }
    }

    #[inline]
    pub fn teams(&mut self, schedule: ScheduleId) -> TeamsClient<'_, 'a> {
        TeamsClient { tx: self, schedule }
    }

    #[inline]
    pub fn pools(&mut self, schedule: ScheduleId) -> PoolsClient<'_, 'a> {
        PoolsClient { tx: self, schedule }
    }

    #[inline]
    pub fn matches(&mut self, schedule: ScheduleId) -> MatchesClient<'_, 'a> {
        MatchesClient { tx: self, schedule }
    }

    #[inline]
    pub fn awards(&mut self, schedule: ScheduleId) -> AwardsClient<'_, 'a> {
        AwardsClient { tx: self, schedule }
    }
}

pub struct SchedulesClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
}

impl<'t, 'a> SchedulesClient<'t, 'a> {
    /// Returns the status of the schedule `id`. Returns `None` if the schedule does not exist.
    pub async fn get(&mut self, id: ScheduleId) -> Result<Option<ScheduleStatus>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT status FROM {}schedules WHERE id = ?",
                self.tx.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&mut self.tx.inner)
            .await
        );

        Ok(Some(byte_column!(row, "status", ScheduleStatus)))
    }

    /// Locks the row of schedule `id` until the transaction ends and returns its status.
    /// Returns `None` if the schedule does not exist.
    pub async fn lock(&mut self, id: ScheduleId) -> Result<Option<ScheduleStatus>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT status FROM {}schedules WHERE id = ? FOR UPDATE",
                self.tx.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&mut self.tx.inner)
            .await
        );

        Ok(Some(byte_column!(row, "status", ScheduleStatus)))
    }

    pub async fn set_status(&mut self, id: ScheduleId, status: ScheduleStatus) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}schedules SET status = ? WHERE id = ?",
            self.tx.table_prefix
        ))
        .bind(status.to_u8())
        .bind(id.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }
}

pub struct CompetitionsClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
}

impl<'t, 'a> CompetitionsClient<'t, 'a> {
    /// Returns the competition of `schedule`.
    pub async fn get(&mut self, schedule: ScheduleId) -> Result<Option<Competition>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT format, pool_count, winners_per_pool, third_place_match, double_round_robin, standing_method, win_points, loss_points, draw_points, draw_published FROM {}competitions WHERE schedule_id = ?",
                self.tx.table_prefix
            ))
            .bind(schedule.0)
            .fetch_one(&mut self.tx.inner)
            .await
        );

        Ok(Some(Competition {
            schedule_id: schedule,
            format: byte_column!(row, "format", Format),
            pool_count: row.try_get("pool_count")?,
            winners_per_pool: row.try_get("winners_per_pool")?,
            third_place_match: row.try_get("third_place_match")?,
            double_round_robin: row.try_get("double_round_robin")?,
            standing_method: byte_column!(row, "standing_method", StandingMethod),
            win_points: row.try_get("win_points")?,
            loss_points: row.try_get("loss_points")?,
            draw_points: row.try_get("draw_points")?,
            draw_published: row.try_get("draw_published")?,
        }))
    }

    /// Inserts or replaces the competition of `competition.schedule_id`.
    pub async fn put(&mut self, competition: &Competition) -> Result<(), Error> {
        sqlx::query(&format!(
            "INSERT INTO {}competitions (schedule_id, format, pool_count, winners_per_pool, third_place_match, double_round_robin, standing_method, win_points, loss_points, draw_points, draw_published) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) ON DUPLICATE KEY UPDATE format = VALUES(format), pool_count = VALUES(pool_count), winners_per_pool = VALUES(winners_per_pool), third_place_match = VALUES(third_place_match), double_round_robin = VALUES(double_round_robin), standing_method = VALUES(standing_method), win_points = VALUES(win_points), loss_points = VALUES(loss_points), draw_points = VALUES(draw_points), draw_published = VALUES(draw_published)",
            self.tx.table_prefix
        ))
        .bind(competition.schedule_id.0)
        .bind(competition.format.to_u8())
        .bind(competition.pool_count)
        .bind(competition.winners_per_pool)
        .bind(competition.third_place_match)
        .bind(competition.double_round_robin)
        .bind(competition.standing_method.to_u8())
        .bind(competition.win_points)
        .bind(competition.loss_points)
        .bind(competition.draw_points)
        .bind(competition.draw_published)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }

    pub async fn set_draw_published(
        &mut self,
        schedule: ScheduleId,
        published: bool,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}competitions SET draw_published = ? WHERE schedule_id = ?",
            self.tx.table_prefix
        ))
        .bind(published)
        .bind(schedule.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }
}

pub struct TeamsClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
    schedule: ScheduleId,
}

impl<'t, 'a> TeamsClient<'t, 'a> {
    /// Returns all teams of the schedule, ordered by id.
    pub async fn list(&mut self) -> Result<Teams, Error> {
        let sql = format!(
            "SELECT id, name, status, pool_id, seed, members FROM {}teams WHERE schedule_id = ? ORDER BY id ASC",
            self.tx.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.schedule.0)
            .fetch(&mut self.tx.inner);

        let mut teams = Teams::new();
        while let Some(row) = rows.try_next().await? {
            let members: String = row.try_get("members")?;

            teams.push(Team {
                id: TeamId(row.try_get("id")?),
                schedule_id: self.schedule,
                name: row.try_get("name")?,
                status: byte_column!(row, "status", TeamStatus),
                pool_id: row.try_get::<Option<u64>, _>("pool_id")?.map(PoolId),
                seed: row.try_get("seed")?,
                members: serde_json::from_str(&members)?,
            });
        }

        Ok(teams)
    }

    pub async fn set_pool(&mut self, id: TeamId, pool: Option<PoolId>) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}teams SET pool_id = ? WHERE schedule_id = ? AND id = ?",
            self.tx.table_prefix
        ))
        .bind(pool.map(|pool| pool.0))
        .bind(self.schedule.0)
        .bind(id.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }

    pub async fn set_seed(&mut self, id: TeamId, seed: Option<u32>) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}teams SET seed = ? WHERE schedule_id = ? AND id = ?",
            self.tx.table_prefix
        ))
        .bind(seed)
        .bind(self.schedule.0)
        .bind(id.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }
}

pub struct PoolsClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
    schedule: ScheduleId,
}

impl<'t, 'a> PoolsClient<'t, 'a> {
    /// Returns all pools of the schedule in creation order.
    pub async fn list(&mut self) -> Result<Vec<Pool>, Error> {
        let sql = format!(
            "SELECT id, name FROM {}pools WHERE schedule_id = ? ORDER BY id ASC",
            self.tx.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.schedule.0)
            .fetch(&mut self.tx.inner);

        let mut pools = Vec::new();
        while let Some(row) = rows.try_next().await? {
            pools.push(Pool {
                id: PoolId(row.try_get("id")?),
                schedule_id: self.schedule,
                name: row.try_get("name")?,
            });
        }

        Ok(pools)
    }

    pub async fn insert(&mut self, name: &str) -> Result<PoolId, Error> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}pools (schedule_id, name) VALUES (?, ?)",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .bind(name)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(PoolId(res.last_insert_id()))
    }

    /// Deletes all pools of the schedule.
    pub async fn delete_all(&mut self) -> Result<(), Error> {
        sqlx::query(&format!(
            "DELETE FROM {}pools WHERE schedule_id = ?",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }
}

pub struct MatchesClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
    schedule: ScheduleId,
}

impl<'t, 'a> MatchesClient<'t, 'a> {
    /// Returns all matches of the schedule.
    pub async fn list(&mut self) -> Result<Matches, Error> {
        let sql = format!(
            "SELECT id, round, round_name, number, team1, team2, score1, score2, status, winner, is_bye, is_third_place, position, next_match, next_loser_match FROM {}matches WHERE schedule_id = ? ORDER BY id ASC",
            self.tx.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.schedule.0)
            .fetch(&mut self.tx.inner);

        let mut matches = Matches::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(decode_match(self.schedule, &row)?);
        }

        Ok(matches)
    }

    /// Returns the number of matches of the schedule.
    pub async fn count(&mut self) -> Result<u64, Error> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS count FROM {}matches WHERE schedule_id = ?",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .fetch_one(&mut self.tx.inner)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(count as u64)
    }

    /// Inserts a planned match without its links and returns the new id.
    pub async fn insert(&mut self, m: &MatchPlan) -> Result<MatchId, Error> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}matches (schedule_id, round, round_name, number, team1, team2, score1, score2, status, winner, is_bye, is_third_place, position) VALUES (?, ?, ?, ?, ?, ?, '', '', ?, ?, ?, ?, ?)",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .bind(m.round)
        .bind(&m.round_name)
        .bind(m.number)
        .bind(m.teams[0].map(|id| id.0))
        .bind(m.teams[1].map(|id| id.0))
        .bind(m.status.to_u8())
        .bind(m.winner.map(|id| id.0))
        .bind(m.is_bye)
        .bind(m.is_third_place)
        .bind(m.position)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(MatchId(res.last_insert_id()))
    }

    /// Writes the complete state of `m`, including its links.
    pub async fn update(&mut self, m: &Match) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}matches SET team1 = ?, team2 = ?, score1 = ?, score2 = ?, status = ?, winner = ?, is_bye = ?, is_third_place = ?, position = ?, next_match = ?, next_loser_match = ? WHERE schedule_id = ? AND id = ?",
            self.tx.table_prefix
        ))
        .bind(m.teams[0].map(|id| id.0))
        .bind(m.teams[1].map(|id| id.0))
        .bind(&m.scores[0])
        .bind(&m.scores[1])
        .bind(m.status.to_u8())
        .bind(m.winner.map(|id| id.0))
        .bind(m.is_bye)
        .bind(m.is_third_place)
        .bind(m.position)
        .bind(m.next_match.map(|id| id.0))
        .bind(m.next_loser_match.map(|id| id.0))
        .bind(self.schedule.0)
        .bind(m.id.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }

    /// Deletes all matches of the schedule.
    pub async fn delete_all(&mut self) -> Result<u64, Error> {
        let res = sqlx::query(&format!(
            "DELETE FROM {}matches WHERE schedule_id = ?",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(res.rows_affected())
    }
}

fn decode_match(schedule: ScheduleId, row: &MySqlRow) -> Result<Match, Error> {
    let team = |column: &str| -> Result<Option<TeamId>, Error> {
        Ok(row.try_get::<Option<u64>, _>(column)?.map(TeamId))
    };
    let link = |column: &str| -> Result<Option<MatchId>, Error> {
        Ok(row.try_get::<Option<u64>, _>(column)?.map(MatchId))
    };

    Ok(Match {
        id: MatchId(row.try_get("id")?),
        schedule_id: schedule,
        round: row.try_get("round")?,
        round_name: row.try_get("round_name")?,
        number: row.try_get("number")?,
        teams: [team("team1")?, team("team2")?],
        scores: [row.try_get("score1")?, row.try_get("score2")?],
        status: byte_column!(row, "status", MatchStatus),
        winner: team("winner")?,
        is_bye: row.try_get("is_bye")?,
        is_third_place: row.try_get("is_third_place")?,
        position: row.try_get("position")?,
        next_match: link("next_match")?,
        next_loser_match: link("next_loser_match")?,
    })
}

pub struct AwardsClient<'t, 'a> {
    tx: &'t mut Transaction<'a>,
    schedule: ScheduleId,
}

impl<'t, 'a> AwardsClient<'t, 'a> {
    /// Returns all awards of the schedule, ordered by position.
    pub async fn list(&mut self) -> Result<Vec<Award>, Error> {
        let sql = format!(
            "SELECT id, position, team_id FROM {}awards WHERE schedule_id = ? ORDER BY position ASC, id ASC",
            self.tx.table_prefix
        );

        let mut rows = sqlx::query(&sql)
            .bind(self.schedule.0)
            .fetch(&mut self.tx.inner);

        let mut awards = Vec::new();
        while let Some(row) = rows.try_next().await? {
            awards.push(Award {
                id: AwardId(row.try_get("id")?),
                schedule_id: self.schedule,
                position: byte_column!(row, "position", AwardPosition),
                team_id: row.try_get::<Option<u64>, _>("team_id")?.map(TeamId),
            });
        }

        Ok(awards)
    }

    /// Inserts an award without a team.
    pub async fn insert(&mut self, position: AwardPosition) -> Result<AwardId, Error> {
        let res = sqlx::query(&format!(
            "INSERT INTO {}awards (schedule_id, position, team_id) VALUES (?, ?, NULL)",
            self.tx.table_prefix
        ))
        .bind(self.schedule.0)
        .bind(position.to_u8())
        .execute(&mut self.tx.inner)
        .await?;

        Ok(AwardId(res.last_insert_id()))
    }

    pub async fn set_team(&mut self, id: AwardId, team: Option<TeamId>) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}awards SET team_id = ? WHERE schedule_id = ? AND id = ?",
            self.tx.table_prefix
        ))
        .bind(team.map(|id| id.0))
        .bind(self.schedule.0)
        .bind(id.0)
        .execute(&mut self.tx.inner)
        .await?;

        Ok(())
    }
}
