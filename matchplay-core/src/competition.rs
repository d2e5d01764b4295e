//! # Competition configuration
//!
//! A [`Competition`] describes how the confirmed teams of a schedule play against each other. It
//! is written by the organizer before the draw and only read by the engine.
use crate::id::ScheduleId;
use crate::utils::byte_enum;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The format of a competition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Format {
    /// Round robin pools followed by an elimination playoff between the pool winners.
    PoolPlay,
    /// A single elimination bracket.
    Elimination,
    /// Every team plays every other team.
    RoundRobin,
}

byte_enum!(Format {
    PoolPlay = 0 => "Pool Play",
    Elimination = 1 => "Elimination",
    RoundRobin = 2 => "Round Robin",
});

/// The primary key used to rank teams in a standings table.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StandingMethod {
    /// Rank by number of matches won.
    #[default]
    Wins,
    /// Rank by points awarded for wins, losses and draws.
    Points,
}

byte_enum!(StandingMethod {
    Wins = 0 => "Wins",
    Points = 1 => "Points",
});

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Competition {
    #[cfg_attr(feature = "serde", serde(default))]
    pub schedule_id: ScheduleId,
    pub format: Format,
    #[cfg_attr(feature = "serde", serde(default = "defaults::pool_count"))]
    pub pool_count: u32,
    #[cfg_attr(feature = "serde", serde(default = "defaults::winners_per_pool"))]
    pub winners_per_pool: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub third_place_match: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub double_round_robin: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub standing_method: StandingMethod,
    #[cfg_attr(feature = "serde", serde(default = "defaults::win_points"))]
    pub win_points: i64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loss_points: i64,
    /// Points for a drawn match. Kept for configuration only: a match with equal sets won never
    /// becomes `Done`, so no standings record ever contains a draw.
    #[cfg_attr(feature = "serde", serde(default = "defaults::draw_points"))]
    pub draw_points: i64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub draw_published: bool,
}

impl Competition {
    /// Creates a new `Competition` with the given `format` and default values for everything
    /// else.
    pub fn new(schedule_id: ScheduleId, format: Format) -> Self {
        Self {
            schedule_id,
            format,
            pool_count: defaults::pool_count(),
            winners_per_pool: defaults::winners_per_pool(),
            third_place_match: false,
            double_round_robin: false,
            standing_method: StandingMethod::Wins,
            win_points: defaults::win_points(),
            loss_points: 0,
            draw_points: defaults::draw_points(),
            draw_published: false,
        }
    }

    /// Returns the number of teams advancing from the pool stage into the playoff.
    #[inline]
    pub fn total_advancing(&self) -> usize {
        self.pool_count as usize * self.winners_per_pool as usize
    }

    /// Returns `true` if `other` builds the same matches as `self`. Only the scoring settings
    /// and the draw publication may differ.
    pub fn same_bracket(&self, other: &Self) -> bool {
        self.format == other.format
            && self.pool_count == other.pool_count
            && self.winners_per_pool == other.winners_per_pool
            && self.third_place_match == other.third_place_match
            && self.double_round_robin == other.double_round_robin
    }
}

mod defaults {
    pub fn pool_count() -> u32 {
        2
    }

    pub fn winners_per_pool() -> u32 {
        2
    }

    pub fn win_points() -> i64 {
        3
    }

    pub fn draw_points() -> i64 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::{Competition, Format, StandingMethod};
    use crate::id::ScheduleId;

    #[test]
    fn test_format_bytes() {
        for format in [Format::PoolPlay, Format::Elimination, Format::RoundRobin] {
            assert_eq!(Format::from_u8(format.to_u8()), Some(format));
        }

        assert_eq!(Format::from_u8(3), None);
        assert_eq!(StandingMethod::from_u8(1), Some(StandingMethod::Points));
        assert_eq!(Format::PoolPlay.to_string(), "Pool Play");
    }

    #[test]
    fn test_total_advancing() {
        let mut competition = Competition::new(ScheduleId(1), Format::PoolPlay);
        competition.pool_count = 3;
        competition.winners_per_pool = 2;

        assert_eq!(competition.total_advancing(), 6);
    }

    #[test]
    fn test_same_bracket() {
        let competition = Competition::new(ScheduleId(1), Format::PoolPlay);

        let mut other = competition.clone();
        other.standing_method = StandingMethod::Points;
        other.win_points = 2;
        other.draw_published = true;
        assert!(competition.same_bracket(&other));

        let mut other = competition.clone();
        other.winners_per_pool = 1;
        assert!(!competition.same_bracket(&other));

        let mut other = competition.clone();
        other.pool_count = 4;
        assert!(!competition.same_bracket(&other));

        let mut other = competition.clone();
        other.third_place_match = true;
        assert!(!competition.same_bracket(&other));

        let mut other = competition.clone();
        other.format = Format::Elimination;
        assert!(!competition.same_bracket(&other));
    }
}
