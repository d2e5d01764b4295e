use std::ops::{Deref, DerefMut};
use std::vec::IntoIter;

use crate::id::{PoolId, ScheduleId, TeamId};
use crate::utils::byte_enum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The registration status of a [`Team`]. Only [`Confirmed`] teams take part in the draw.
///
/// [`Confirmed`]: Self::Confirmed
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TeamStatus {
    Pending,
    OnHold,
    Confirmed,
}

byte_enum!(TeamStatus {
    Pending = 0 => "Pending",
    OnHold = 1 => "On Hold",
    Confirmed = 2 => "Confirmed",
});

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Team {
    pub id: TeamId,
    pub schedule_id: ScheduleId,
    pub name: String,
    pub status: TeamStatus,
    pub pool_id: Option<PoolId>,
    /// The bracket seed, unique among the confirmed teams of the schedule.
    pub seed: Option<u32>,
    /// The roster, one or two member names.
    pub members: Vec<String>,
}

impl Team {
    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.status == TeamStatus::Confirmed
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pool {
    pub id: PoolId,
    pub schedule_id: ScheduleId,
    pub name: String,
}

impl Pool {
    /// Returns the display name of the pool at `index`: "Pool A", "Pool B", ...
    pub fn name_for(index: usize) -> String {
        let mut label = String::new();
        let mut n = index;

        // Spreadsheet style after "Z": "AA", "AB", ...
        loop {
            label.insert(0, (b'A' + (n % 26) as u8) as char);
            if n < 26 {
                break;
            }
            n = n / 26 - 1;
        }

        format!("Pool {}", label)
    }
}

/// A wrapper around a `Vec<Team>` holding the teams of a single schedule.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Teams {
    teams: Vec<Team>,
}

impl Teams {
    #[inline]
    pub fn new() -> Self {
        Self { teams: Vec::new() }
    }

    /// Returns the team with the given `id`.
    pub fn get_team(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == id)
    }

    /// Returns an iterator over all confirmed teams in their stored order.
    pub fn confirmed(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter().filter(|team| team.is_confirmed())
    }

    /// Returns the confirmed teams ordered by seed. Seeded teams come first in ascending order,
    /// unseeded teams follow by id.
    pub fn confirmed_by_seed(&self) -> Vec<&Team> {
        let mut teams: Vec<&Team> = self.confirmed().collect();
        teams.sort_by_key(|team| (team.seed.is_none(), team.seed, team.id));
        teams
    }

    /// Returns the confirmed teams assigned to `pool`.
    pub fn in_pool(&self, pool: PoolId) -> impl Iterator<Item = &Team> {
        self.confirmed().filter(move |team| team.pool_id == Some(pool))
    }

    /// Returns the display name of the team with the given `id`.
    pub fn name(&self, id: TeamId) -> Option<&str> {
        self.get_team(id).map(|team| team.name.as_str())
    }
}

impl FromIterator<Team> for Teams {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Team>,
    {
        Self {
            teams: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Teams {
    type Item = Team;
    type IntoIter = IntoIter<Team>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.teams.into_iter()
    }
}

impl Deref for Teams {
    type Target = Vec<Team>;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.teams
    }
}

impl DerefMut for Teams {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.teams
    }
}

impl From<Vec<Team>> for Teams {
    #[inline]
    fn from(teams: Vec<Team>) -> Self {
        Self { teams }
    }
}

#[cfg(test)]
mod tests {
    use super::{Pool, Teams};
    use crate::id::TeamId;
    use crate::teams;

    #[test]
    fn test_pool_name() {
        assert_eq!(Pool::name_for(0), "Pool A");
        assert_eq!(Pool::name_for(3), "Pool D");
        assert_eq!(Pool::name_for(25), "Pool Z");
        assert_eq!(Pool::name_for(26), "Pool AA");
    }

    #[test]
    fn test_confirmed_by_seed() {
        let mut teams: Teams = teams![4];
        teams[0].seed = Some(2);
        teams[2].seed = Some(1);
        teams[3].status = super::TeamStatus::OnHold;

        let order: Vec<TeamId> = teams.confirmed_by_seed().iter().map(|t| t.id).collect();
        assert_eq!(order, [TeamId(3), TeamId(1), TeamId(2)]);
    }
}
