//! # Standings
//!
//! Ranks teams by their results in `Done` matches. Used for the round robin table, to pick the
//! qualifiers of every pool and to resolve round robin awards.
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::iter::FusedIterator;

use crate::competition::{Competition, StandingMethod};
use crate::id::TeamId;
use crate::matches::{Match, MatchStatus};
use crate::score::SetScores;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The accumulated results of a single team.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Record {
    pub team: TeamId,
    pub played: u32,
    pub won: u32,
    pub lost: u32,
    pub sets_won: u32,
    pub sets_lost: u32,
    /// Points scored over all sets.
    pub points_for: i64,
    /// Points conceded over all sets.
    pub points_against: i64,
    /// Table points: `won * win_points + lost * loss_points`.
    pub points: i64,
}

impl Record {
    #[inline]
    pub fn new(team: TeamId) -> Self {
        Self {
            team,
            ..Default::default()
        }
    }

    /// Returns the score differential.
    #[inline]
    pub fn differential(&self) -> i64 {
        self.points_for - self.points_against
    }

    fn add(&mut self, won: bool, sets: [u32; 2], points: [i64; 2]) {
        self.played += 1;
        if won {
            self.won += 1;
        } else {
            self.lost += 1;
        }

        self.sets_won += sets[0];
        self.sets_lost += sets[1];
        self.points_for += points[0];
        self.points_against += points[1];
    }

    /// Compares two records by the ranking keys. The better record orders first.
    fn rank_cmp(&self, other: &Self, method: StandingMethod) -> Ordering {
        let primary = match method {
            StandingMethod::Wins => other.won.cmp(&self.won),
            StandingMethod::Points => other.points.cmp(&self.points),
        };

        primary
            .then_with(|| other.sets_won.cmp(&self.sets_won))
            .then_with(|| self.sets_lost.cmp(&other.sets_lost))
            .then_with(|| other.differential().cmp(&self.differential()))
    }
}

/// A ranked standings table.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Standings {
    entries: Vec<Entry>,
    keys: Vec<Cow<'static, str>>,
}

impl Standings {
    /// Ranks `teams` using all `Done` matches between them.
    ///
    /// Teams with equal records keep the order they have in `teams`.
    pub fn calculate<'a, I>(competition: &Competition, teams: &[TeamId], matches: I) -> Self
    where
        I: IntoIterator<Item = &'a Match>,
    {
        let mut records: HashMap<TeamId, Record> =
            teams.iter().map(|team| (*team, Record::new(*team))).collect();

        for m in matches {
            if m.status != MatchStatus::Done {
                continue;
            }

            let [Some(first), Some(second)] = m.teams else {
                continue;
            };

            if !records.contains_key(&first) || !records.contains_key(&second) {
                continue;
            }

            let Some(scores) = SetScores::parse(&m.scores[0], &m.scores[1]) else {
                log::warn!("Match {} is done but has invalid scores", m.id);
                continue;
            };

            let [a, b] = scores.sets_won();
            let [p, q] = scores.points();

            if let Some(record) = records.get_mut(&first) {
                record.add(m.winner == Some(first), [a, b], [p, q]);
            }

            if let Some(record) = records.get_mut(&second) {
                record.add(m.winner == Some(second), [b, a], [q, p]);
            }
        }

        let mut ranked: Vec<Record> = teams
            .iter()
            .filter_map(|team| records.get(team).copied())
            .map(|mut record| {
                record.points = i64::from(record.won) * competition.win_points
                    + i64::from(record.lost) * competition.loss_points;
                record
            })
            .collect();

        // Stable, equal records keep the input order.
        ranked.sort_by(|a, b| a.rank_cmp(b, competition.standing_method));

        let mut builder = Builder::new();
        builder
            .key("Played")
            .key("Won")
            .key("Lost")
            .key("Sets Won")
            .key("Sets Lost")
            .key("Difference")
            .key("Points");

        for (index, record) in ranked.into_iter().enumerate() {
            builder.entry(index as u32 + 1, record);
        }

        builder.build()
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self,
            next: 0,
        }
    }

    #[inline]
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            inner: self,
            next: 0,
        }
    }

    /// Returns the team ids in rank order.
    pub fn ranked(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.entries.iter().map(|entry| entry.record.team)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
struct Builder {
    keys: Vec<Cow<'static, str>>,
    entries: Vec<Entry>,
}

impl Builder {
    #[inline]
    const fn new() -> Self {
        Self {
            keys: Vec::new(),
            entries: Vec::new(),
        }
    }

    #[inline]
    fn key<K>(&mut self, key: K) -> &mut Self
    where
        K: Into<Cow<'static, str>>,
    {
        self.keys.push(key.into());
        self
    }

    fn entry(&mut self, rank: u32, record: Record) -> &mut Self {
        let values = vec![
            record.played.into(),
            record.won.into(),
            record.lost.into(),
            record.sets_won.into(),
            record.sets_lost.into(),
            record.differential().into(),
            record.points.into(),
        ];

        debug_assert_eq!(values.len(), self.keys.len());

        self.entries.push(Entry {
            rank,
            record,
            values,
        });
        self
    }

    #[inline]
    fn build(self) -> Standings {
        Standings {
            entries: self.entries,
            keys: self.keys,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Iter<'a> {
    inner: &'a Standings,
    next: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.inner.entries.get(self.next)?;
        self.next += 1;
        Some(entry)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl<'a> ExactSizeIterator for Iter<'a> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.entries.len() - self.next
    }
}

impl<'a> FusedIterator for Iter<'a> {}

#[derive(Clone, Debug)]
pub struct Keys<'a> {
    inner: &'a Standings,
    next: usize,
}

impl<'a> Iterator for Keys<'a> {
    type Item = &'a str;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let key = self.inner.keys.get(self.next)?;
        self.next += 1;
        Some(key)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len(), Some(self.len()))
    }
}

impl<'a> ExactSizeIterator for Keys<'a> {
    #[inline]
    fn len(&self) -> usize {
        self.inner.keys.len() - self.next
    }
}

/// A row of the standings table. `values` line up with [`Standings::keys`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entry {
    /// 1-based rank.
    pub rank: u32,
    pub record: Record,
    pub values: Vec<EntryValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum EntryValue {
    I64(i64),
    U64(u64),
}

impl Display for EntryValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::I64(val) => Display::fmt(val, f),
            Self::U64(val) => Display::fmt(val, f),
        }
    }
}

impl From<i64> for EntryValue {
    #[inline]
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<u32> for EntryValue {
    #[inline]
    fn from(value: u32) -> Self {
        Self::U64(value.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{EntryValue, Standings};
    use crate::competition::{Competition, Format, StandingMethod};
    use crate::id::{MatchId, ScheduleId, TeamId};
    use crate::matches::{Match, MatchStatus};

    fn done(id: u64, teams: [u64; 2], scores: [&str; 2]) -> Match {
        let teams = [Some(TeamId(teams[0])), Some(TeamId(teams[1]))];

        let mut m = Match {
            id: MatchId(id),
            schedule_id: ScheduleId(1),
            round: 1,
            round_name: String::from("Round Robin"),
            number: id as u32,
            teams,
            scores: [scores[0].to_owned(), scores[1].to_owned()],
            status: MatchStatus::Done,
            winner: None,
            is_bye: false,
            is_third_place: false,
            position: 1,
            next_match: None,
            next_loser_match: None,
        };
        m.winner = crate::determine_winner(teams, scores[0], scores[1]);
        m
    }

    fn ids(standings: &Standings) -> Vec<u64> {
        standings.ranked().map(|id| id.0).collect()
    }

    #[test]
    fn test_standings_by_wins() {
        let competition = Competition::new(ScheduleId(1), Format::RoundRobin);
        let teams: Vec<TeamId> = (1..=4).map(TeamId).collect();

        // 3 beats everyone, 1 beats 2 and 4, 4 beats 2.
        let matches = vec![
            done(1, [1, 2], ["21", "10"]),
            done(2, [3, 4], ["21", "10"]),
            done(3, [1, 3], ["10", "21"]),
            done(4, [2, 4], ["10", "21"]),
            done(5, [1, 4], ["21", "10"]),
            done(6, [2, 3], ["10", "21"]),
        ];

        let standings = Standings::calculate(&competition, &teams, &matches);
        assert_eq!(ids(&standings), [3, 1, 4, 2]);

        let won: Vec<u32> = standings.iter().map(|entry| entry.record.won).collect();
        assert_eq!(won, [3, 2, 1, 0]);

        let first = standings.iter().next().unwrap();
        assert_eq!(first.rank, 1);
        assert_eq!(first.record.played, 3);
        assert_eq!(first.record.differential(), 33);
        assert_eq!(first.values[1], EntryValue::U64(3));
        assert_eq!(standings.keys().len(), first.values.len());
    }

    #[test]
    fn test_standings_tiebreakers() {
        let competition = Competition::new(ScheduleId(1), Format::RoundRobin);
        let teams: Vec<TeamId> = (1..=3).map(TeamId).collect();

        // Every team wins once. 1 and 3 won 3 sets, 1 lost fewer.
        let matches = vec![
            done(1, [1, 2], ["21,21", "10,10"]),
            done(2, [2, 3], ["21,15,21", "10,21,10"]),
            done(3, [3, 1], ["21,15,21", "19,21,20"]),
        ];

        let standings = Standings::calculate(&competition, &teams, &matches);
        assert_eq!(ids(&standings), [1, 3, 2]);

        let sets: Vec<(u32, u32)> = standings
            .iter()
            .map(|entry| (entry.record.sets_won, entry.record.sets_lost))
            .collect();
        assert_eq!(sets, [(3, 2), (3, 3), (2, 3)]);
    }

    #[test]
    fn test_standings_stable() {
        let competition = Competition::new(ScheduleId(1), Format::RoundRobin);
        let teams = [TeamId(4), TeamId(2), TeamId(9)];

        let standings = Standings::calculate(&competition, &teams, &[]);
        assert_eq!(ids(&standings), [4, 2, 9]);
    }

    #[test]
    fn test_standings_by_points() {
        let mut competition = Competition::new(ScheduleId(1), Format::RoundRobin);
        competition.standing_method = StandingMethod::Points;
        competition.win_points = 2;
        competition.loss_points = 1;

        let teams = [TeamId(1), TeamId(2), TeamId(3)];
        let matches = vec![
            done(1, [1, 2], ["21", "10"]),
            done(2, [2, 3], ["21", "10"]),
            done(3, [2, 3], ["21", "10"]),
        ];

        // 2 has 2 wins and a loss (5 points), 1 a single win (2 points), 3 two losses (2 points).
        let standings = Standings::calculate(&competition, &teams, &matches);
        assert_eq!(ids(&standings), [2, 1, 3]);

        let points: Vec<i64> = standings.iter().map(|entry| entry.record.points).collect();
        assert_eq!(points, [5, 2, 2]);
    }

    #[test]
    fn test_standings_ignores_other_matches() {
        let competition = Competition::new(ScheduleId(1), Format::PoolPlay);
        let teams = [TeamId(1), TeamId(2)];

        let mut pending = done(2, [1, 2], ["10", "21"]);
        pending.status = MatchStatus::Active;

        let matches = vec![
            done(1, [1, 2], ["21", "10"]),
            pending,
            done(3, [2, 5], ["21", "10"]),
        ];

        let standings = Standings::calculate(&competition, &teams, &matches);
        assert_eq!(ids(&standings), [1, 2]);
        assert!(standings.iter().all(|entry| entry.record.played == 1));
    }

    #[test]
    fn test_standings_out_of_range_scores() {
        let competition = Competition::new(ScheduleId(1), Format::RoundRobin);
        let plan = crate::BracketPlan::build(&competition, &crate::teams![2], &[]).unwrap();
        let mut matches = plan
            .assign_ids(ScheduleId(1), [MatchId(1)])
            .unwrap();

        let outcome = crate::Progression::new(&mut matches)
            .submit_score(MatchId(1), "9223372036854775807,5", "0,0")
            .unwrap();
        assert_eq!(outcome, crate::ScoreOutcome::Undecided);
        assert_eq!(matches[MatchId(1)].status, MatchStatus::Active);

        let teams = [TeamId(1), TeamId(2)];
        let standings = Standings::calculate(&competition, &teams, matches.iter());
        assert!(standings.iter().all(|entry| entry.record.played == 0));

        // The largest accepted values still sum without overflow.
        let matches = vec![done(2, [1, 2], ["65535,65535,65535", "0,0,0"])];
        let standings = Standings::calculate(&competition, &teams, &matches);
        assert_eq!(ids(&standings), [1, 2]);
        assert_eq!(standings.iter().next().unwrap().record.differential(), 3 * 65535);
    }
}
