//! # Seeding
//!
//! Pool assignment (snake order), bracket seed assignment and the fixed seeding orders used to
//! place seeds into an elimination bracket.
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::id::{PoolId, TeamId};
use crate::team::{Pool, Teams};

/// Returns the pool index for the `index`-th team in snake order over `pools` pools:
/// `0, 1, .., n-1, n-1, .., 1, 0, 0, 1, ..`.
#[inline]
pub fn snake_index(index: usize, pools: usize) -> usize {
    let cycle = index / pools;
    let pos = index % pools;

    if cycle % 2 == 0 {
        pos
    } else {
        pools - 1 - pos
    }
}

/// Distributes the confirmed teams without a pool across `pools` in snake order.
///
/// Teams enter the snake in seed order. If some teams already have a pool, the snake continues
/// after them. Returns the new assignments only; the result is empty if every confirmed team
/// already has a pool, if there are no pools or if less than 2 teams are confirmed.
pub fn assign_pools(teams: &Teams, pools: &[Pool]) -> Vec<(TeamId, PoolId)> {
    let confirmed = teams.confirmed_by_seed();
    if confirmed.len() < 2 || pools.is_empty() {
        return Vec::new();
    }

    let known: HashSet<PoolId> = pools.iter().map(|pool| pool.id).collect();

    let assigned = confirmed
        .iter()
        .filter(|team| matches!(team.pool_id, Some(pool) if known.contains(&pool)))
        .count();

    confirmed
        .iter()
        .filter(|team| !matches!(team.pool_id, Some(pool) if known.contains(&pool)))
        .enumerate()
        .map(|(index, team)| {
            let pool = &pools[snake_index(assigned + index, pools.len())];
            log::debug!("Assigning team {} to {}", team.id, pool.name);

            (team.id, pool.id)
        })
        .collect()
}

/// Assigns bracket seeds `1..=n` to the `n` confirmed teams.
///
/// Valid existing seeds (in range and unique) are kept. The remaining seed numbers are handed out
/// to the remaining teams in a uniformly random order. Returns the new assignments only; the
/// result is empty if all teams are validly seeded or less than 2 teams are confirmed.
pub fn assign_bracket_seeds<R>(teams: &Teams, rng: &mut R) -> Vec<(TeamId, u32)>
where
    R: Rng + ?Sized,
{
    let confirmed: Vec<_> = teams.confirmed().collect();
    if confirmed.len() < 2 {
        return Vec::new();
    }

    let count = confirmed.len() as u32;

    let mut taken = HashSet::new();
    let mut unseeded = Vec::new();
    for team in &confirmed {
        match team.seed {
            Some(seed) if (1..=count).contains(&seed) && taken.insert(seed) => (),
            _ => unseeded.push(team.id),
        }
    }

    if unseeded.is_empty() {
        return Vec::new();
    }

    let mut free: Vec<u32> = (1..=count).filter(|seed| !taken.contains(seed)).collect();
    free.shuffle(rng);

    log::debug!("Assigning {} free seeds", free.len());

    unseeded.into_iter().zip(free).collect()
}

/// Assigns new seeds to all confirmed teams, ignoring existing ones.
pub fn reseed<R>(teams: &Teams, rng: &mut R) -> Vec<(TeamId, u32)>
where
    R: Rng + ?Sized,
{
    let cleared: Teams = teams
        .iter()
        .cloned()
        .map(|mut team| {
            team.seed = None;
            team
        })
        .collect();

    assign_bracket_seeds(&cleared, rng)
}

/// Returns the smallest standard bracket size that fits `teams` teams: 8, 16, 32 or 64. Larger
/// fields use the next power of two.
pub fn bracket_size(teams: usize) -> usize {
    [8, 16, 32, 64]
        .into_iter()
        .find(|size| *size >= teams)
        .unwrap_or_else(|| teams.next_power_of_two())
}

const ORDER_8: [u32; 8] = [1, 8, 4, 5, 3, 6, 2, 7];

const ORDER_16: [u32; 16] = [1, 16, 8, 9, 4, 13, 5, 12, 2, 15, 7, 10, 3, 14, 6, 11];

const ORDER_32: [u32; 32] = [
    1, 32, 16, 17, 8, 25, 9, 24, 4, 29, 13, 20, 5, 28, 12, 21, 2, 31, 15, 18, 7, 26, 10, 23, 3, 30,
    14, 19, 6, 27, 11, 22,
];

/// Returns the seed order of the first round slots for a bracket of `size` slots. Consecutive
/// entries play each other in the first round.
pub fn standard_order(size: usize) -> Vec<u32> {
    match size {
        8 => ORDER_8.to_vec(),
        16 => ORDER_16.to_vec(),
        32 => ORDER_32.to_vec(),
        // Seed i plays seed 65 - i.
        64 => (1..=32).flat_map(|seed| [seed, 65 - seed]).collect(),
        _ => fold_order(size),
    }
}

/// Builds a seed order by repeatedly folding: every seed `s` of the order for `n` slots is
/// followed by `2n + 1 - s`.
fn fold_order(size: usize) -> Vec<u32> {
    let mut order = vec![1];
    while order.len() < size {
        let n = order.len() as u32 * 2;
        order = order.into_iter().flat_map(|seed| [seed, n + 1 - seed]).collect();
    }

    order
}

/// Orders the qualifiers of the ranked pools for the playoff. `ranked` contains the ranked teams
/// of every pool in pool order.
///
/// Two pools with two qualifiers each use `[A1, B2, B1, A2]` so that teams of the same pool
/// don't meet in the first playoff round. Every other layout orders by position, then by pool:
/// `[A1, B1, C1, A2, B2, C2, ..]`.
pub fn cross_pool_order(ranked: &[Vec<TeamId>], winners_per_pool: usize) -> Vec<TeamId> {
    if ranked.len() == 2 && winners_per_pool == 2 {
        return [(0, 0), (1, 1), (1, 0), (0, 1)]
            .into_iter()
            .filter_map(|(pool, rank)| ranked[pool].get(rank).copied())
            .collect();
    }

    (0..winners_per_pool)
        .flat_map(|rank| ranked.iter().filter_map(move |pool| pool.get(rank).copied()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::id::ScheduleId;
    use crate::teams;

    fn pools(n: usize) -> Vec<Pool> {
        (0..n)
            .map(|index| Pool {
                id: PoolId(index as u64 + 1),
                schedule_id: ScheduleId(1),
                name: Pool::name_for(index),
            })
            .collect()
    }

    #[test]
    fn test_snake_index() {
        let order: Vec<usize> = (0..9).map(|index| snake_index(index, 3)).collect();
        assert_eq!(order, [0, 1, 2, 2, 1, 0, 0, 1, 2]);
    }

    #[test]
    fn test_assign_pools_balanced() {
        for n in 2..20 {
            let teams = teams![n];
            let assignments = assign_pools(&teams, &pools(3));
            assert_eq!(assignments.len(), n);

            let mut sizes: HashMap<PoolId, usize> = HashMap::new();
            for (_, pool) in assignments {
                *sizes.entry(pool).or_default() += 1;
            }

            let max = sizes.values().max().unwrap();
            let min = if sizes.len() < 3 { &0 } else { sizes.values().min().unwrap() };
            assert!(max - min <= 1, "unbalanced pools for {} teams: {:?}", n, sizes);
        }
    }

    #[test]
    fn test_assign_pools_noop() {
        let pools = pools(2);
        let mut teams = teams![4];
        for team in teams.iter_mut() {
            team.pool_id = Some(PoolId(1));
        }

        assert!(assign_pools(&teams, &pools).is_empty());
        assert!(assign_pools(&teams![1], &pools).is_empty());
        assert!(assign_pools(&teams![4], &[]).is_empty());
    }

    #[test]
    fn test_assign_bracket_seeds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut teams = teams![6];

        let seeds = assign_bracket_seeds(&teams, &mut rng);
        assert_eq!(seeds.len(), 6);

        let mut numbers: Vec<u32> = seeds.iter().map(|(_, seed)| *seed).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, [1, 2, 3, 4, 5, 6]);

        for (id, seed) in seeds {
            teams.iter_mut().find(|t| t.id == id).unwrap().seed = Some(seed);
        }

        // Stable once assigned.
        assert!(assign_bracket_seeds(&teams, &mut rng).is_empty());
    }

    #[test]
    fn test_reseed() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut teams = teams![5];
        for (index, team) in teams.iter_mut().enumerate() {
            team.seed = Some(index as u32 + 1);
        }

        assert!(assign_bracket_seeds(&teams, &mut rng).is_empty());

        let seeds = reseed(&teams, &mut rng);
        assert_eq!(seeds.len(), 5);

        let mut numbers: Vec<u32> = seeds.iter().map(|(_, seed)| *seed).collect();
        numbers.sort_unstable();
        assert_eq!(numbers, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_assign_bracket_seeds_fills_gaps() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut teams = teams![4];
        teams[0].seed = Some(2);
        teams[1].seed = Some(2);
        teams[2].seed = Some(9);

        let seeds = assign_bracket_seeds(&teams, &mut rng);
        let mut numbers: Vec<u32> = seeds.iter().map(|(_, seed)| *seed).collect();
        numbers.sort_unstable();

        // Team 1 keeps seed 2, the duplicate and the out-of-range seed are replaced.
        assert_eq!(seeds.len(), 3);
        assert!(seeds.iter().all(|(id, _)| id.0 != 1));
        assert_eq!(numbers, [1, 3, 4]);

        assert!(assign_bracket_seeds(&teams![1], &mut rng).is_empty());
    }

    #[test]
    fn test_standard_order_pairs_top_seed_with_lowest() {
        for size in [8, 16, 32, 64] {
            let order = standard_order(size);
            assert_eq!(order.len(), size);

            let mut sorted = order.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, (1..=size as u32).collect::<Vec<_>>());

            // Every first round pair adds up to size + 1, which puts seed 1 against the highest
            // seed.
            for pair in order.chunks(2) {
                assert_eq!(pair[0] + pair[1], size as u32 + 1);
            }
            assert_eq!(&order[0..2], &[1, size as u32]);
        }
    }

    #[test]
    fn test_standard_order_highest_surviving_seed() {
        // With 5 teams in an 8 bracket seed 1 still faces the highest seed present in its pair.
        let order = standard_order(8);
        let teams = 5;

        let pair = &order[0..2];
        let surviving: Vec<u32> = pair.iter().copied().filter(|s| *s <= teams).collect();
        assert_eq!(surviving, [1]);
    }

    #[test]
    fn test_fold_order() {
        assert_eq!(fold_order(2), [1, 2]);
        assert_eq!(fold_order(4), [1, 4, 2, 3]);
        assert_eq!(standard_order(128).len(), 128);
    }

    #[test]
    fn test_bracket_size() {
        assert_eq!(bracket_size(2), 8);
        assert_eq!(bracket_size(5), 8);
        assert_eq!(bracket_size(9), 16);
        assert_eq!(bracket_size(33), 64);
        assert_eq!(bracket_size(65), 128);
    }

    #[test]
    fn test_cross_pool_order() {
        let ranked = vec![
            vec![TeamId(1), TeamId(2), TeamId(3)],
            vec![TeamId(4), TeamId(5), TeamId(6)],
        ];

        assert_eq!(
            cross_pool_order(&ranked, 2),
            [TeamId(1), TeamId(5), TeamId(4), TeamId(2)]
        );

        let ranked = vec![
            vec![TeamId(1), TeamId(2)],
            vec![TeamId(3), TeamId(4)],
            vec![TeamId(5), TeamId(6)],
        ];

        assert_eq!(
            cross_pool_order(&ranked, 2),
            [TeamId(1), TeamId(3), TeamId(5), TeamId(2), TeamId(4), TeamId(6)]
        );
    }
}
