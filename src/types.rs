use crate::error::{KpiError, Result};
use crate::period::Combine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// One physical entity (store or region) for one reporting period.
///
/// Values live in a sorted map so serialising the same record twice always
/// yields the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafRecord {
    pub name: String,
    pub group: String,
    /// Marks the synthetic total row that is shown but never ranked.
    pub rollup: bool,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

impl LeafRecord {
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            rollup: false,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), value);
        self
    }

    pub fn as_rollup(mut self) -> Self {
        self.rollup = true;
        self
    }

    /// Group key accessor, usable directly as a grouping function.
    pub fn group_key(&self) -> &str {
        &self.group
    }

    /// Look up a required numeric field.
    ///
    /// Missing fields and non-finite values are errors; substituting zero
    /// would silently corrupt sums and rankings.
    pub fn value(&self, field: &str) -> Result<f64> {
        let v = *self
            .values
            .get(field)
            .ok_or_else(|| KpiError::missing(&self.name, field))?;
        if !v.is_finite() {
            return Err(KpiError::InvalidValue {
                record: self.name.clone(),
                field: field.to_string(),
                raw: v.to_string(),
            });
        }
        Ok(v)
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// A leaf record plus one rank per registry KPI.
///
/// `None` means "not ranked", which is what the rollup row always gets.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRecord {
    pub record: LeafRecord,
    pub ranks: BTreeMap<String, Option<usize>>,
}

impl RankedRecord {
    pub(crate) fn unranked(record: LeafRecord) -> Self {
        Self {
            record,
            ranks: BTreeMap::new(),
        }
    }

    pub fn rank(&self, kpi: &str) -> Option<usize> {
        self.ranks.get(kpi).copied().flatten()
    }
}

// Ranks are emitted as `<kpi>Rank` next to the raw values, which is the
// shape the table renderer binds to.
impl Serialize for RankedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let r = &self.record;
        let mut map = serializer.serialize_map(Some(3 + r.values.len() + self.ranks.len()))?;
        map.serialize_entry("name", &r.name)?;
        map.serialize_entry("group", &r.group)?;
        map.serialize_entry("rollup", &r.rollup)?;
        for (k, v) in &r.values {
            map.serialize_entry(k, v)?;
        }
        for (k, rank) in &self.ranks {
            map.serialize_entry(&format!("{k}Rank"), rank)?;
        }
        map.end()
    }
}

/// Finalised value of one aggregated output field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AggregateValue {
    Sum { total: f64 },
    Mean { total: f64, mean: f64 },
    /// `value` is `100 * numerator / denominator`, or `None` when the
    /// denominator summed to zero.
    Ratio {
        numerator: f64,
        denominator: f64,
        value: Option<f64>,
    },
}

impl AggregateValue {
    /// The number a consumer should display or compare, if defined.
    pub fn value(&self) -> Option<f64> {
        match *self {
            Self::Sum { total } => Some(total),
            Self::Mean { mean, .. } => Some(mean),
            Self::Ratio { value, .. } => value,
        }
    }

    /// Accumulated total behind the value (the numerator for ratios).
    pub fn total(&self) -> f64 {
        match *self {
            Self::Sum { total } | Self::Mean { total, .. } => total,
            Self::Ratio { numerator, .. } => numerator,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregateField {
    pub name: String,
    pub value: AggregateValue,
}

/// One output record per distinct group key.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAggregate {
    pub group: String,
    pub count: usize,
    pub fields: Vec<AggregateField>,
}

impl GroupAggregate {
    pub fn get(&self, field: &str) -> Option<&AggregateValue> {
        self.fields.iter().find(|f| f.name == field).map(|f| &f.value)
    }

    /// Value of an output field; `Ok(None)` for an undefined ratio.
    pub fn value(&self, field: &str) -> Result<Option<f64>> {
        self.get(field)
            .map(AggregateValue::value)
            .ok_or_else(|| KpiError::missing(&self.group, field))
    }

    /// Value of an output field for callers that cannot handle "undefined".
    pub fn number(&self, field: &str) -> Result<f64> {
        self.value(field)?.ok_or_else(|| KpiError::ZeroDenominator {
            group: self.group.clone(),
            field: field.to_string(),
        })
    }
}

impl Serialize for GroupAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.fields.len()))?;
        map.serialize_entry("group", &self.group)?;
        map.serialize_entry("count", &self.count)?;
        for f in &self.fields {
            map.serialize_entry(&f.name, &f.value.value())?;
        }
        map.end()
    }
}

/// One record per group, with one combined value per period column.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPeriodAggregate {
    pub group: String,
    pub count: usize,
    pub combine: Combine,
    pub periods: Vec<AggregateField>,
}

impl MultiPeriodAggregate {
    pub fn value(&self, period: &str) -> Option<f64> {
        self.periods
            .iter()
            .find(|p| p.name == period)
            .and_then(|p| p.value.value())
    }

    /// Re-key the periods as `<prefix><Period>` so they can be joined with
    /// other families without clashing (e.g. `retentionSeptember`).
    pub fn to_group_aggregate(&self, prefix: &str) -> GroupAggregate {
        GroupAggregate {
            group: self.group.clone(),
            count: self.count,
            fields: self
                .periods
                .iter()
                .map(|p| AggregateField {
                    name: format!("{prefix}{}", p.name),
                    value: p.value,
                })
                .collect(),
        }
    }
}

impl Serialize for MultiPeriodAggregate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2 + self.periods.len()))?;
        map.serialize_entry("group", &self.group)?;
        map.serialize_entry("count", &self.count)?;
        for p in &self.periods {
            map.serialize_entry(&p.name, &p.value.value())?;
        }
        map.end()
    }
}

/// A group's joined rollup values across KPI families, plus its highlight
/// score once selected.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightCandidate {
    pub group: String,
    pub score: f64,
    /// `None` marks a field that exists but is undefined (zero-denominator
    /// ratio); it never satisfies a threshold.
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl HighlightCandidate {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            score: 0.0,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, field: impl Into<String>, value: f64) -> Self {
        self.values.insert(field.into(), Some(value));
        self
    }

    pub fn field(&self, name: &str) -> Result<Option<f64>> {
        self.values
            .get(name)
            .copied()
            .ok_or_else(|| KpiError::missing(&self.group, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_is_an_error_not_zero() {
        let r = LeafRecord::new("Bristol", "S1-1-B").with_value("WRC", 71.0);
        assert_eq!(r.value("WRC").unwrap(), 71.0);
        match r.value("ATV") {
            Err(KpiError::MissingField { record, field }) => {
                assert_eq!(record, "Bristol");
                assert_eq!(field, "ATV");
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn nan_value_is_rejected() {
        let r = LeafRecord::new("Rugby", "S1-1-R").with_value("WRC", f64::NAN);
        assert!(matches!(r.value("WRC"), Err(KpiError::InvalidValue { .. })));
    }

    #[test]
    fn ranked_record_serialises_rank_suffix() {
        let mut ranked = RankedRecord::unranked(
            LeafRecord::new("South 1", "South 1").with_value("retention", 32.0),
        );
        ranked.ranks.insert("retention".into(), Some(3));
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json["retention"], 32.0);
        assert_eq!(json["retentionRank"], 3);
    }

    #[test]
    fn undefined_ratio_serialises_as_null_and_refuses_number() {
        let agg = GroupAggregate {
            group: "S1-9-Z".into(),
            count: 1,
            fields: vec![AggregateField {
                name: "salesVsTarget".into(),
                value: AggregateValue::Ratio {
                    numerator: 10.0,
                    denominator: 0.0,
                    value: None,
                },
            }],
        };
        let json = serde_json::to_value(&agg).unwrap();
        assert!(json["salesVsTarget"].is_null());
        assert_eq!(agg.value("salesVsTarget").unwrap(), None);
        assert!(matches!(
            agg.number("salesVsTarget"),
            Err(KpiError::ZeroDenominator { .. })
        ));
        assert!(matches!(
            agg.value("ncVsTarget"),
            Err(KpiError::MissingField { .. })
        ));
    }
}
