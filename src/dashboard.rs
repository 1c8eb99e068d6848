//! One explicit, pure pass from loaded leaf records to every derived table.
//!
//! Nothing here is cached: callers rebuild the dashboard whenever their
//! inputs change, and the same inputs always give the same output.

use crate::aggregate::{
    aggregate_by_group, area_average, audit_plan, cluster_snapshot_plan, top_groups_by, Baseline,
    KpiStanding,
};
use crate::config::DashboardConfig;
use crate::error::{KpiError, Result};
use crate::highlight::{join_families, select_highlights};
use crate::period::{aggregate_metric_by_period, PeriodMetric};
use crate::rank::rank_peers;
use crate::registry::{Direction, KpiRegistry, Metric, REGION_BATTLE, STORE_DETAIL};
use crate::resolve::GroupDirectory;
use crate::types::{GroupAggregate, HighlightCandidate, LeafRecord, MultiPeriodAggregate, RankedRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Every dataset the report is built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardInputs {
    pub region_battle: Vec<LeafRecord>,
    pub store_kpis: Vec<LeafRecord>,
    pub store_retention: Vec<LeafRecord>,
    pub store_acb: Vec<LeafRecord>,
    pub app_adoption: Vec<LeafRecord>,
    pub store_audit: Vec<LeafRecord>,
    /// Review league rows carry only a store name; the cluster is resolved.
    pub store_reviews: Vec<LeafRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStanding {
    pub store: String,
    pub cluster: String,
    pub standings: Vec<KpiStanding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewStanding {
    pub store: String,
    pub cluster: String,
    pub reviews: i64,
    pub last_rank: i64,
    pub current_rank: i64,
    /// Places gained since the last period (negative means dropped).
    pub change: i64,
}

// Counts and league positions must be whole numbers.
fn whole_number(r: &LeafRecord, field: &str) -> Result<i64> {
    let v = r.value(field)?;
    if v.fract() != 0.0 {
        return Err(KpiError::InvalidValue {
            record: r.name.clone(),
            field: field.to_string(),
            raw: v.to_string(),
        });
    }
    Ok(v as i64)
}

impl ReviewStanding {
    fn from_record(r: &LeafRecord) -> Result<Self> {
        let last_rank = whole_number(r, "lastRank")?;
        let current_rank = whole_number(r, "currentRank")?;
        Ok(Self {
            store: r.name.clone(),
            cluster: r.group.clone(),
            reviews: whole_number(r, "reviews")?,
            last_rank,
            current_rank,
            change: last_rank - current_rank,
        })
    }
}

/// Every store's value for one period against that period's area average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSnapshot {
    pub period: String,
    pub metric: Metric,
    pub baseline: Baseline,
    pub stores: Vec<StoreStanding>,
}

fn classify_all(
    leaves: &[LeafRecord],
    baseline: &Baseline,
    registry: &KpiRegistry,
) -> Result<Vec<StoreStanding>> {
    leaves
        .iter()
        .map(|s| {
            Ok(StoreStanding {
                store: s.name.clone(),
                cluster: s.group.clone(),
                standings: baseline.classify(s, registry)?,
            })
        })
        .collect()
}

/// Snapshot of a per-period dataset: the `period` column read as `metric`.
pub fn period_snapshot(leaves: &[LeafRecord], period: &str, metric: Metric) -> Result<PeriodSnapshot> {
    let registry = KpiRegistry::new(format!("{period} snapshot")).bind(period, metric);
    let baseline = area_average(leaves, &registry)?;
    let stores = classify_all(leaves, &baseline, &registry)?;
    Ok(PeriodSnapshot {
        period: period.to_string(),
        metric,
        baseline,
        stores,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub battle: Vec<RankedRecord>,
    pub area_baseline: Baseline,
    pub store_standings: Vec<StoreStanding>,
    pub cluster_snapshot: Vec<GroupAggregate>,
    pub audit: Vec<GroupAggregate>,
    pub retention: Vec<MultiPeriodAggregate>,
    pub active_customer_base: Vec<MultiPeriodAggregate>,
    pub app_adoption: Vec<MultiPeriodAggregate>,
    /// Latest configured period of app adoption, store by store.
    pub app_adoption_snapshot: PeriodSnapshot,
    pub trade_in_leaders: Vec<String>,
    pub highlights: Vec<HighlightCandidate>,
    pub review_league: Vec<ReviewStanding>,
}

fn prefixed(rows: &[MultiPeriodAggregate], prefix: &str) -> Vec<GroupAggregate> {
    rows.iter().map(|r| r.to_group_aggregate(prefix)).collect()
}

pub fn build_dashboard(inputs: &DashboardInputs, config: &DashboardConfig) -> Result<Dashboard> {
    config.validate()?;

    let battle = rank_peers(&inputs.region_battle, &REGION_BATTLE)?;

    let area_baseline = area_average(&inputs.store_kpis, &STORE_DETAIL)?;
    let store_standings = classify_all(&inputs.store_kpis, &area_baseline, &STORE_DETAIL)?;

    let cluster_snapshot =
        aggregate_by_group(&inputs.store_kpis, LeafRecord::group_key, &cluster_snapshot_plan())?;
    let audit = aggregate_by_group(&inputs.store_audit, LeafRecord::group_key, &audit_plan())?;

    let periods = config.periods.as_slice();
    let retention = aggregate_metric_by_period(
        &inputs.store_retention,
        LeafRecord::group_key,
        periods,
        PeriodMetric::Retention,
    )?;
    let active_customer_base = aggregate_metric_by_period(
        &inputs.store_acb,
        LeafRecord::group_key,
        periods,
        PeriodMetric::ActiveCustomerBase,
    )?;
    let app_adoption = aggregate_metric_by_period(
        &inputs.app_adoption,
        LeafRecord::group_key,
        periods,
        PeriodMetric::AppAdoption,
    )?;

    let snapshot_period = periods
        .last()
        .ok_or_else(|| KpiError::InvalidConfig("periods must not be empty".into()))?;
    let app_adoption_snapshot =
        period_snapshot(&inputs.app_adoption, snapshot_period, Metric::AppAdoption)?;

    let trade_in_leaders = top_groups_by(
        &cluster_snapshot,
        "tradeInVsKitSales",
        Direction::HigherIsBetter,
        config.trade_in_leaders,
    )?
    .into_iter()
    .map(|g| g.group.clone())
    .collect();

    let retention_view = prefixed(&retention, "retention");
    let acb_view = prefixed(&active_customer_base, "acb");
    let app_view = prefixed(&app_adoption, "appAdoption");
    let candidates = join_families(&[
        ("cluster snapshot", cluster_snapshot.as_slice()),
        ("retention", retention_view.as_slice()),
        ("active customer base", acb_view.as_slice()),
        ("app adoption", app_view.as_slice()),
        ("audit", audit.as_slice()),
    ])?;
    let highlights = select_highlights(&candidates, &config.highlight_rules, config.highlight_limit)?;

    let mut directory = GroupDirectory::from_leaves(&inputs.store_kpis)?;
    for (alias, canonical) in &config.store_aliases {
        directory.alias(alias, canonical)?;
    }
    let mut review_league = directory
        .assign(&inputs.store_reviews)?
        .iter()
        .map(ReviewStanding::from_record)
        .collect::<Result<Vec<_>>>()?;
    review_league.sort_by_key(|r| r.current_rank);

    info!(
        regions = battle.len(),
        stores = inputs.store_kpis.len(),
        clusters = cluster_snapshot.len(),
        highlights = highlights.len(),
        "built dashboard"
    );

    Ok(Dashboard {
        battle,
        area_baseline,
        store_standings,
        cluster_snapshot,
        audit,
        retention,
        active_customer_base,
        app_adoption,
        app_adoption_snapshot,
        trade_in_leaders,
        highlights,
        review_league,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightScore {
    pub cluster: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_stores: usize,
    pub total_clusters: usize,
    pub ranked_regions: usize,
    /// Regions holding rank 1, per battle KPI.
    pub battle_leaders: BTreeMap<String, Vec<String>>,
    /// Number of battle KPIs each region tops.
    pub first_places: BTreeMap<String, usize>,
    pub trade_in_leaders: Vec<String>,
    pub highlights: Vec<HighlightScore>,
}

impl Dashboard {
    pub fn summary(&self) -> DashboardSummary {
        let mut battle_leaders: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut first_places: BTreeMap<String, usize> = BTreeMap::new();
        for kpi in REGION_BATTLE.iter() {
            let leaders: Vec<String> = self
                .battle
                .iter()
                .filter(|r| r.rank(&kpi.key) == Some(1))
                .map(|r| r.record.name.clone())
                .collect();
            for name in &leaders {
                *first_places.entry(name.clone()).or_default() += 1;
            }
            battle_leaders.insert(kpi.key.clone(), leaders);
        }
        DashboardSummary {
            total_stores: self.store_standings.len(),
            total_clusters: self.cluster_snapshot.len(),
            ranked_regions: self.battle.iter().filter(|r| !r.record.rollup).count(),
            battle_leaders,
            first_places,
            trade_in_leaders: self.trade_in_leaders.clone(),
            highlights: self
                .highlights
                .iter()
                .map(|h| HighlightScore {
                    cluster: h.group.clone(),
                    score: h.score,
                })
                .collect(),
        }
    }
}
