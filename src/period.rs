//! Per-period rollups (one column per month) keyed by group.

use crate::aggregate::{aggregate_by_group, AggregationPlan};
use crate::error::Result;
use crate::types::{LeafRecord, MultiPeriodAggregate};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Combine {
    Sum,
    Mean,
}

/// Metric families reported per period. Each family fixes its combine mode
/// so call sites never pick one ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PeriodMetric {
    /// Active customer base: a head count, summed across stores.
    ActiveCustomerBase,
    /// Retention rate, averaged across stores.
    Retention,
    /// Share of customers with the app, averaged across stores.
    AppAdoption,
}

impl PeriodMetric {
    pub const fn combine(self) -> Combine {
        match self {
            Self::ActiveCustomerBase => Combine::Sum,
            Self::Retention | Self::AppAdoption => Combine::Mean,
        }
    }
}

/// Reduce each period column independently per group.
pub fn aggregate_by_group_and_period<F, S>(
    leaves: &[LeafRecord],
    group_key: F,
    periods: &[S],
    combine: Combine,
) -> Result<Vec<MultiPeriodAggregate>>
where
    F: Fn(&LeafRecord) -> &str,
    S: AsRef<str>,
{
    let plan = periods.iter().fold(AggregationPlan::new(), |plan, p| {
        let p = p.as_ref();
        match combine {
            Combine::Sum => plan.sum(p, p),
            Combine::Mean => plan.mean(p, p),
        }
    });
    let groups = aggregate_by_group(leaves, group_key, &plan)?;
    debug!(?combine, periods = periods.len(), groups = groups.len(), "aggregated by period");
    Ok(groups
        .into_iter()
        .map(|g| MultiPeriodAggregate {
            group: g.group,
            count: g.count,
            combine,
            periods: g.fields,
        })
        .collect())
}

pub fn aggregate_metric_by_period<F, S>(
    leaves: &[LeafRecord],
    group_key: F,
    periods: &[S],
    metric: PeriodMetric,
) -> Result<Vec<MultiPeriodAggregate>>
where
    F: Fn(&LeafRecord) -> &str,
    S: AsRef<str>,
{
    aggregate_by_group_and_period(leaves, group_key, periods, metric.combine())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KpiError;
    use approx::assert_relative_eq;

    const MONTHS: [&str; 3] = ["July", "August", "September"];

    fn store(name: &str, cluster: &str, v: [f64; 3]) -> LeafRecord {
        MONTHS
            .iter()
            .zip(v)
            .fold(LeafRecord::new(name, cluster), |r, (m, x)| r.with_value(*m, x))
    }

    fn leaves() -> Vec<LeafRecord> {
        vec![
            store("Barnstaple", "S1-2-BE", [450.0, 430.0, 438.0]),
            store("Bristol", "S1-1-B", [944.0, 894.0, 963.0]),
            store("Exeter", "S1-2-BE", [847.0, 872.0, 951.0]),
        ]
    }

    #[test]
    fn customer_base_is_summed_per_period() {
        let out = aggregate_metric_by_period(
            &leaves(),
            LeafRecord::group_key,
            &MONTHS,
            PeriodMetric::ActiveCustomerBase,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].group, "S1-2-BE");
        assert_eq!(out[0].count, 2);
        assert_eq!(out[0].value("July"), Some(1297.0));
        assert_eq!(out[0].value("September"), Some(1389.0));
        assert_eq!(out[1].value("August"), Some(894.0));
    }

    #[test]
    fn retention_is_averaged_per_period() {
        let leaves = vec![
            store("Barnstaple", "S1-2-BE", [39.5, 56.1, 48.8]),
            store("Exeter", "S1-2-BE", [37.5, 28.5, 33.3]),
        ];
        let out =
            aggregate_metric_by_period(&leaves, LeafRecord::group_key, &MONTHS, PeriodMetric::Retention)
                .unwrap();
        assert_eq!(out[0].combine, Combine::Mean);
        assert_relative_eq!(out[0].value("July").unwrap(), 38.5, epsilon = 1e-9);
        assert_relative_eq!(out[0].value("September").unwrap(), 41.05, epsilon = 1e-9);
    }

    #[test]
    fn prefixed_view_renames_periods() {
        let out = aggregate_by_group_and_period(&leaves(), LeafRecord::group_key, &MONTHS, Combine::Sum)
            .unwrap();
        let view = out[1].to_group_aggregate("acb");
        assert_eq!(view.number("acbJuly").unwrap(), 944.0);
        assert!(view.get("July").is_none());
    }

    #[test]
    fn missing_period_column_is_an_error() {
        let leaves = vec![LeafRecord::new("a", "g").with_value("July", 1.0)];
        assert!(matches!(
            aggregate_by_group_and_period(&leaves, LeafRecord::group_key, &MONTHS, Combine::Mean),
            Err(KpiError::MissingField { .. })
        ));
    }
}
