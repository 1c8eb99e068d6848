use crate::error::{KpiError, Result};
use crate::registry::{Direction, KpiRegistry};
use crate::types::{AggregateField, AggregateValue, GroupAggregate, LeafRecord};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// How one output field is combined across a group's leaves.
///
/// `Ratio` and `Mean` are not interchangeable: averaging per-store
/// percentages gives a different number from re-deriving the percentage
/// from summed components.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOp {
    Sum(String),
    Mean(String),
    Ratio { numerator: String, denominator: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub name: String,
    pub op: AggregateOp,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationPlan {
    fields: Vec<OutputField>,
}

impl AggregationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sum(self, output: impl Into<String>, field: impl Into<String>) -> Self {
        self.with(output, AggregateOp::Sum(field.into()))
    }

    pub fn mean(self, output: impl Into<String>, field: impl Into<String>) -> Self {
        self.with(output, AggregateOp::Mean(field.into()))
    }

    pub fn ratio(
        self,
        output: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        self.with(
            output,
            AggregateOp::Ratio {
                numerator: numerator.into(),
                denominator: denominator.into(),
            },
        )
    }

    fn with(mut self, output: impl Into<String>, op: AggregateOp) -> Self {
        self.fields.push(OutputField {
            name: output.into(),
            op,
        });
        self
    }

    pub fn fields(&self) -> &[OutputField] {
        &self.fields
    }
}

/// Sales/NC totals and the September key-metric snapshot per cluster.
pub fn cluster_snapshot_plan() -> AggregationPlan {
    AggregationPlan::new()
        .sum("salesQ3", "Sales")
        .sum("salesTargetQ3", "SalesTarget")
        .ratio("salesVsTarget", "Sales", "SalesTarget")
        .sum("ncQ3", "NC")
        .sum("ncTargetQ3", "NCTGT")
        .ratio("ncVsTarget", "NC", "NCTGT")
        .mean("wrc", "WRC")
        .mean("unregisteredTransaction", "Unregistered_percent")
        .mean("tradeInVsKitSales", "Trade_in_Vs_Kit_Sales")
        .mean("vltz", "VLTZ_percent")
        .mean("septemberRetention", "Retention")
}

/// Mean audit scores per cluster.
pub fn audit_plan() -> AggregationPlan {
    AggregationPlan::new()
        .mean("mww", "MWW")
        .mean("compliance", "Compliance")
}

/// Reduce leaves to one record per group key, in first-seen key order.
pub fn aggregate_by_group<F>(
    leaves: &[LeafRecord],
    group_key: F,
    plan: &AggregationPlan,
) -> Result<Vec<GroupAggregate>>
where
    F: Fn(&LeafRecord) -> &str,
{
    #[derive(Default)]
    struct Slot {
        total: f64,
        denominator: f64,
    }
    struct Acc {
        group: String,
        count: usize,
        slots: Vec<Slot>,
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Acc> = Vec::new();
    for leaf in leaves {
        let key = group_key(leaf);
        let i = match index.get(key) {
            Some(&i) => i,
            None => {
                groups.push(Acc {
                    group: key.to_string(),
                    count: 0,
                    slots: plan.fields.iter().map(|_| Slot::default()).collect(),
                });
                index.insert(key.to_string(), groups.len() - 1);
                groups.len() - 1
            }
        };
        let acc = &mut groups[i];
        acc.count += 1;
        for (slot, field) in acc.slots.iter_mut().zip(&plan.fields) {
            match &field.op {
                AggregateOp::Sum(f) | AggregateOp::Mean(f) => slot.total += leaf.value(f)?,
                AggregateOp::Ratio {
                    numerator,
                    denominator,
                } => {
                    slot.total += leaf.value(numerator)?;
                    slot.denominator += leaf.value(denominator)?;
                }
            }
        }
    }

    let out: Vec<GroupAggregate> = groups
        .into_iter()
        .map(|acc| {
            let fields = acc
                .slots
                .into_iter()
                .zip(&plan.fields)
                .map(|(slot, field)| {
                    let value = match field.op {
                        AggregateOp::Sum(_) => AggregateValue::Sum { total: slot.total },
                        AggregateOp::Mean(_) => AggregateValue::Mean {
                            total: slot.total,
                            mean: slot.total / acc.count as f64,
                        },
                        AggregateOp::Ratio { .. } => {
                            let value = if slot.denominator == 0.0 {
                                warn!(group = %acc.group, field = %field.name, "ratio denominator sums to zero");
                                None
                            } else {
                                Some(100.0 * slot.total / slot.denominator)
                            };
                            AggregateValue::Ratio {
                                numerator: slot.total,
                                denominator: slot.denominator,
                                value,
                            }
                        }
                    };
                    AggregateField {
                        name: field.name.clone(),
                        value,
                    }
                })
                .collect();
            GroupAggregate {
                group: acc.group,
                count: acc.count,
                fields,
            }
        })
        .collect();

    debug!(leaves = leaves.len(), groups = out.len(), "aggregated by group");
    Ok(out)
}

/// The `n` groups with the best value of `field`; undefined values sort last.
pub fn top_groups_by<'a>(
    groups: &'a [GroupAggregate],
    field: &str,
    direction: Direction,
    n: usize,
) -> Result<Vec<&'a GroupAggregate>> {
    let mut keyed = Vec::with_capacity(groups.len());
    for g in groups {
        keyed.push((g.value(field)?, g));
    }
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => match direction {
            Direction::HigherIsBetter => b.total_cmp(a),
            Direction::LowerIsBetter => a.total_cmp(b),
        },
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    Ok(keyed.into_iter().take(n).map(|(_, g)| g).collect())
}

const AREA_KEY: &str = "area";

fn whole_area(_: &LeafRecord) -> &str {
    AREA_KEY
}

/// Flat per-KPI average across every leaf, used as the comparison baseline
/// for the detail table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    pub count: usize,
    pub averages: Vec<(String, f64)>,
}

/// Which side of the baseline a value falls on, in the "is better" sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Standing {
    AboveAverage,
    BelowAverage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiStanding {
    pub key: String,
    pub value: f64,
    pub average: f64,
    pub standing: Standing,
}

impl Baseline {
    pub fn average(&self, key: &str) -> Option<f64> {
        self.averages
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }

    /// Compare one record against the baseline for every registry KPI.
    pub fn classify(&self, record: &LeafRecord, registry: &KpiRegistry) -> Result<Vec<KpiStanding>> {
        registry
            .iter()
            .map(|kpi| {
                let value = record.value(&kpi.key)?;
                let average = self
                    .average(&kpi.key)
                    .ok_or_else(|| KpiError::missing("area baseline", &kpi.key))?;
                let standing = if kpi.direction().at_least_as_good(value, average) {
                    Standing::AboveAverage
                } else {
                    Standing::BelowAverage
                };
                Ok(KpiStanding {
                    key: kpi.key.clone(),
                    value,
                    average,
                    standing,
                })
            })
            .collect()
    }
}

/// Mean of each registry KPI over all leaves, regardless of group.
pub fn area_average(leaves: &[LeafRecord], registry: &KpiRegistry) -> Result<Baseline> {
    if leaves.is_empty() {
        return Err(KpiError::EmptyInput(format!(
            "{} area average",
            registry.family()
        )));
    }
    let plan = registry
        .iter()
        .fold(AggregationPlan::new(), |plan, kpi| plan.mean(kpi.key.clone(), kpi.key.clone()));
    let mut groups = aggregate_by_group(leaves, whole_area, &plan)?;
    let area = groups
        .pop()
        .ok_or_else(|| KpiError::EmptyInput(registry.family().to_string()))?;
    let averages = area
        .fields
        .iter()
        .filter_map(|f| f.value.value().map(|v| (f.name.clone(), v)))
        .collect();
    Ok(Baseline {
        count: area.count,
        averages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Metric, STORE_DETAIL};
    use approx::assert_relative_eq;

    fn store(name: &str, cluster: &str, num: f64, den: f64) -> LeafRecord {
        LeafRecord::new(name, cluster)
            .with_value("num", num)
            .with_value("den", den)
            .with_value("pct", 100.0 * num / den)
    }

    #[test]
    fn ratio_of_sums_differs_from_mean_of_ratios() {
        let leaves = vec![store("a", "g", 10.0, 20.0), store("b", "g", 30.0, 40.0)];
        let plan = AggregationPlan::new()
            .ratio("ratio", "num", "den")
            .mean("meanPct", "pct");
        let out = aggregate_by_group(&leaves, LeafRecord::group_key, &plan).unwrap();
        assert_eq!(out.len(), 1);
        let ratio = out[0].number("ratio").unwrap();
        let mean = out[0].number("meanPct").unwrap();
        assert_relative_eq!(ratio, 66.666_666, epsilon = 1e-4);
        assert_relative_eq!(mean, 62.5, epsilon = 1e-9);
        assert!((ratio - mean).abs() > 1.0);
    }

    #[test]
    fn counts_and_sums_match_leaves_exactly() {
        let leaves = vec![
            store("a", "x", 1.0, 2.0),
            store("b", "y", 3.0, 4.0),
            store("c", "x", 5.0, 6.0),
            store("d", "z", 7.0, 8.0),
            store("e", "y", 9.0, 10.0),
        ];
        let plan = AggregationPlan::new().sum("num", "num").sum("den", "den");
        let out = aggregate_by_group(&leaves, LeafRecord::group_key, &plan).unwrap();

        let groups: Vec<&str> = out.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(groups, vec!["x", "y", "z"]);
        assert_eq!(out.iter().map(|g| g.count).sum::<usize>(), leaves.len());
        for g in &out {
            let expected: f64 = leaves
                .iter()
                .filter(|l| l.group == g.group)
                .map(|l| l.get("num").unwrap())
                .sum();
            assert_eq!(g.number("num").unwrap(), expected);
        }
        let total: f64 = out.iter().map(|g| g.number("den").unwrap()).sum();
        assert_eq!(total, 30.0);
    }

    #[test]
    fn zero_denominator_is_undefined_not_nan() {
        let leaves = vec![store("a", "g", 0.0, 1.0).with_value("den", 0.0)];
        let plan = AggregationPlan::new().ratio("ratio", "num", "den");
        let out = aggregate_by_group(&leaves, LeafRecord::group_key, &plan).unwrap();
        assert_eq!(out[0].value("ratio").unwrap(), None);
        assert!(matches!(
            out[0].number("ratio"),
            Err(KpiError::ZeroDenominator { .. })
        ));
    }

    #[test]
    fn missing_input_field_is_surfaced() {
        let leaves = vec![LeafRecord::new("a", "g").with_value("num", 1.0)];
        let plan = AggregationPlan::new().ratio("ratio", "num", "den");
        assert!(matches!(
            aggregate_by_group(&leaves, LeafRecord::group_key, &plan),
            Err(KpiError::MissingField { .. })
        ));
    }

    #[test]
    fn area_average_and_classification_respect_direction() {
        let reg = KpiRegistry::new("t")
            .bind("wrc", Metric::Wrc)
            .bind("unreg", Metric::UnregisteredTransactions);
        let leaves = vec![
            LeafRecord::new("a", "x").with_value("wrc", 60.0).with_value("unreg", 4.0),
            LeafRecord::new("b", "y").with_value("wrc", 80.0).with_value("unreg", 8.0),
        ];
        let baseline = area_average(&leaves, &reg).unwrap();
        assert_eq!(baseline.count, 2);
        assert_eq!(baseline.average("wrc"), Some(70.0));
        assert_eq!(baseline.average("unreg"), Some(6.0));

        let a = baseline.classify(&leaves[0], &reg).unwrap();
        assert_eq!(a[0].standing, Standing::BelowAverage);
        assert_eq!(a[1].standing, Standing::AboveAverage);

        let at_avg = LeafRecord::new("c", "x").with_value("wrc", 70.0).with_value("unreg", 6.0);
        let c = baseline.classify(&at_avg, &reg).unwrap();
        assert!(c.iter().all(|s| s.standing == Standing::AboveAverage));
    }

    #[test]
    fn area_average_recomputes_from_current_leaves() {
        let reg = KpiRegistry::new("t").bind("wrc", Metric::Wrc);
        let mut leaves = vec![LeafRecord::new("a", "x").with_value("wrc", 50.0)];
        assert_eq!(area_average(&leaves, &reg).unwrap().average("wrc"), Some(50.0));
        leaves.push(LeafRecord::new("b", "x").with_value("wrc", 70.0));
        assert_eq!(area_average(&leaves, &reg).unwrap().average("wrc"), Some(60.0));
    }

    #[test]
    fn area_average_rejects_empty_input() {
        assert!(matches!(
            area_average(&[], &STORE_DETAIL),
            Err(KpiError::EmptyInput(_))
        ));
    }

    #[test]
    fn top_groups_puts_undefined_last() {
        let groups = vec![
            GroupAggregate {
                group: "a".into(),
                count: 1,
                fields: vec![AggregateField {
                    name: "f".into(),
                    value: AggregateValue::Ratio {
                        numerator: 1.0,
                        denominator: 0.0,
                        value: None,
                    },
                }],
            },
            GroupAggregate {
                group: "b".into(),
                count: 1,
                fields: vec![AggregateField {
                    name: "f".into(),
                    value: AggregateValue::Sum { total: 2.0 },
                }],
            },
        ];
        let top = top_groups_by(&groups, "f", Direction::HigherIsBetter, 1).unwrap();
        assert_eq!(top[0].group, "b");
    }
}
