use crate::error::Result;
use crate::registry::{Direction, KpiRegistry};
use crate::types::{LeafRecord, RankedRecord};
use tracing::debug;

/// How peers sharing a value are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiePolicy {
    /// Every tied peer takes the position of the first occurrence in the
    /// directional sort and the next distinct value skips ahead: 1, 1, 3.
    #[default]
    FirstMatch,
    /// Tied peers share a rank and the next distinct value follows on: 1, 1, 2.
    Dense,
}

/// Display placing derived from a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Podium {
    First,
    Second,
    Third,
    Unplaced,
}

impl Podium {
    pub fn from_rank(rank: Option<usize>) -> Self {
        match rank {
            Some(1) => Self::First,
            Some(2) => Self::Second,
            Some(3) => Self::Third,
            _ => Self::Unplaced,
        }
    }
}

impl RankedRecord {
    pub fn podium(&self, kpi: &str) -> Podium {
        Podium::from_rank(self.rank(kpi))
    }
}

/// Rank every non-rollup record against its peers for each registry KPI.
pub fn rank_peers(records: &[LeafRecord], registry: &KpiRegistry) -> Result<Vec<RankedRecord>> {
    rank_peers_with(records, registry, TiePolicy::FirstMatch)
}

pub fn rank_peers_with(
    records: &[LeafRecord],
    registry: &KpiRegistry,
    policy: TiePolicy,
) -> Result<Vec<RankedRecord>> {
    let mut ranked: Vec<RankedRecord> = records
        .iter()
        .cloned()
        .map(RankedRecord::unranked)
        .collect();

    for kpi in registry.iter() {
        // Validate every peer before ranking anything. The rollup row is
        // never compared, so its value is not read.
        let mut values: Vec<Option<f64>> = Vec::with_capacity(records.len());
        for r in records {
            values.push(if r.rollup { None } else { Some(r.value(&kpi.key)?) });
        }

        let mut ladder: Vec<f64> = values.iter().flatten().copied().collect();
        match kpi.direction() {
            Direction::HigherIsBetter => ladder.sort_by(|a, b| b.total_cmp(a)),
            Direction::LowerIsBetter => ladder.sort_by(|a, b| a.total_cmp(b)),
        }
        if policy == TiePolicy::Dense {
            ladder.dedup();
        }

        for (out, v) in ranked.iter_mut().zip(values.iter().copied()) {
            let rank = v.and_then(|v| ladder.iter().position(|c| *c == v).map(|i| i + 1));
            out.ranks.insert(kpi.key.clone(), rank);
        }
    }

    debug!(
        family = registry.family(),
        records = records.len(),
        peers = records.iter().filter(|r| !r.rollup).count(),
        "ranked peers"
    );
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KpiError;
    use crate::registry::{Metric, REGION_BATTLE};
    use rstest::rstest;

    fn region(name: &str, retention: f64) -> LeafRecord {
        LeafRecord::new(name, name).with_value("retention", retention)
    }

    fn retention_only() -> KpiRegistry {
        KpiRegistry::new("test").bind("retention", Metric::Retention)
    }

    #[test]
    fn battle_retention_ranks_and_rollup_is_null() {
        let records = vec![
            region("South 1", 32.0),
            region("South 2", 39.3),
            region("South 3", 36.6),
            region("South", 34.8).as_rollup(),
        ];
        let ranked = rank_peers(&records, &retention_only()).unwrap();
        let ranks: Vec<Option<usize>> = ranked.iter().map(|r| r.rank("retention")).collect();
        assert_eq!(ranks, vec![Some(3), Some(1), Some(2), None]);
        assert!(ranked[3].ranks.contains_key("retention"));
        assert_eq!(ranked[1].podium("retention"), Podium::First);
        assert_eq!(ranked[3].podium("retention"), Podium::Unplaced);
    }

    #[test]
    fn lower_is_better_sorts_ascending() {
        let reg = KpiRegistry::new("test").bind("unreg", Metric::UnregisteredTransactions);
        let records = vec![
            LeafRecord::new("a", "a").with_value("unreg", 6.7),
            LeafRecord::new("b", "b").with_value("unreg", 9.3),
            LeafRecord::new("c", "c").with_value("unreg", 8.2),
        ];
        let ranked = rank_peers(&records, &reg).unwrap();
        let ranks: Vec<_> = ranked.iter().map(|r| r.rank("unreg")).collect();
        assert_eq!(ranks, vec![Some(1), Some(3), Some(2)]);
    }

    #[rstest]
    #[case::first_match(TiePolicy::FirstMatch, vec![1, 1, 1, 4])]
    #[case::dense(TiePolicy::Dense, vec![1, 1, 1, 2])]
    fn ties_follow_policy(#[case] policy: TiePolicy, #[case] expected: Vec<usize>) {
        let records = vec![
            region("a", 40.0),
            region("b", 40.0),
            region("c", 40.0),
            region("d", 12.5),
        ];
        let ranked = rank_peers_with(&records, &retention_only(), policy).unwrap();
        let ranks: Vec<usize> = ranked.iter().filter_map(|r| r.rank("retention")).collect();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn distinct_values_give_a_permutation_for_every_kpi() {
        let records: Vec<LeafRecord> = (0..7)
            .map(|i| {
                REGION_BATTLE.iter().fold(
                    LeafRecord::new(format!("r{i}"), "g"),
                    |rec, kpi| rec.with_value(kpi.key.clone(), ((i * 37) % 11) as f64 + 0.5),
                )
            })
            .collect();
        let ranked = rank_peers(&records, &REGION_BATTLE).unwrap();
        for kpi in REGION_BATTLE.iter() {
            let mut ranks: Vec<usize> = ranked.iter().filter_map(|r| r.rank(&kpi.key)).collect();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=7).collect::<Vec<_>>(), "{}", kpi.key);
        }
    }

    #[test]
    fn rollup_value_does_not_affect_peer_ranks() {
        let base = vec![region("a", 10.0), region("b", 20.0)];
        let mut with_rollup = base.clone();
        with_rollup.push(region("total", 99.0).as_rollup());
        let without = rank_peers(&base, &retention_only()).unwrap();
        let with = rank_peers(&with_rollup, &retention_only()).unwrap();
        assert_eq!(without[0].rank("retention"), with[0].rank("retention"));
        assert_eq!(without[1].rank("retention"), Some(1));
        assert_eq!(with[1].rank("retention"), Some(1));
        assert_eq!(with[2].rank("retention"), None);
    }

    #[test]
    fn rollup_without_value_is_still_unranked() {
        let records = vec![
            region("South 1", 32.0),
            region("South 2", 39.3),
            LeafRecord::new("South", "South").as_rollup(),
        ];
        let ranked = rank_peers(&records, &retention_only()).unwrap();
        let ranks: Vec<_> = ranked.iter().map(|r| r.rank("retention")).collect();
        assert_eq!(ranks, vec![Some(2), Some(1), None]);
    }

    #[test]
    fn missing_kpi_fails_fast() {
        let records = vec![region("a", 10.0), LeafRecord::new("b", "b")];
        let err = rank_peers(&records, &retention_only()).unwrap_err();
        assert!(matches!(err, KpiError::MissingField { ref record, .. } if record == "b"));
    }

    #[test]
    fn repeated_ranking_is_identical() {
        let records = vec![region("a", 1.0), region("b", 3.0), region("c", 2.0)];
        let first = serde_json::to_string(&rank_peers(&records, &retention_only()).unwrap()).unwrap();
        let second = serde_json::to_string(&rank_peers(&records, &retention_only()).unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
