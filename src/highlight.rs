//! Threshold-based highlight selection over joined group rollups.

use crate::error::{KpiError, Result};
use crate::types::{GroupAggregate, HighlightCandidate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Gt,
    Lt,
}

impl Comparator {
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reward {
    ExcessAbove,
    ExcessBelow,
}

fn unit_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub field: String,
    pub comparator: Comparator,
    pub threshold: f64,
    pub reward: Reward,
    #[serde(default = "unit_weight")]
    pub weight: f64,
}

impl ThresholdRule {
    /// `field > threshold`, scored by how far above.
    pub fn above(field: impl Into<String>, threshold: f64) -> Self {
        Self {
            field: field.into(),
            comparator: Comparator::Gt,
            threshold,
            reward: Reward::ExcessAbove,
            weight: 1.0,
        }
    }

    /// `field < threshold`, scored by how far below.
    pub fn below(field: impl Into<String>, threshold: f64) -> Self {
        Self {
            field: field.into(),
            comparator: Comparator::Lt,
            threshold,
            reward: Reward::ExcessBelow,
            weight: 1.0,
        }
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// An undefined value never satisfies a rule.
    pub fn is_satisfied_by(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| self.comparator.holds(v, self.threshold))
    }

    fn contribution(&self, value: f64) -> f64 {
        match self.reward {
            Reward::ExcessAbove => (value - self.threshold) * self.weight,
            Reward::ExcessBelow => (self.threshold - value) * self.weight,
        }
    }
}

/// The September shout-out criteria. The unregistered-transactions rule is
/// weighted 10x relative to the others.
pub fn september_rules() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule::above("salesVsTarget", 100.0),
        ThresholdRule::above("ncVsTarget", 100.0),
        ThresholdRule::above("septemberRetention", 40.0),
        ThresholdRule::above("vltz", 70.0),
        ThresholdRule::above("wrc", 70.0),
        ThresholdRule::below("unregisteredTransaction", 5.0).weighted(10.0),
    ]
}

/// Merge group rollups from several families into one candidate per group.
///
/// The first family fixes the group order. Every group must appear in every
/// family; a missing peer is reported instead of defaulting to zero.
pub fn join_families(families: &[(&str, &[GroupAggregate])]) -> Result<Vec<HighlightCandidate>> {
    let Some((primary_name, primary)) = families.first() else {
        return Ok(Vec::new());
    };
    let known: HashSet<&str> = primary.iter().map(|g| g.group.as_str()).collect();

    for (name, rows) in &families[1..] {
        if let Some(stray) = rows.iter().find(|g| !known.contains(g.group.as_str())) {
            return Err(KpiError::UnresolvedGroupKey {
                key: stray.group.clone(),
                context: format!("{primary_name} (joining {name})"),
            });
        }
    }

    let mut out = Vec::with_capacity(primary.len());
    for base in primary.iter() {
        let mut values: BTreeMap<String, Option<f64>> = BTreeMap::new();
        for (name, rows) in families {
            let row = rows.iter().find(|g| g.group == base.group).ok_or_else(|| {
                KpiError::UnresolvedGroupKey {
                    key: base.group.clone(),
                    context: (*name).to_string(),
                }
            })?;
            for f in &row.fields {
                if values.insert(f.name.clone(), f.value.value()).is_some() {
                    return Err(KpiError::DuplicateField {
                        group: base.group.clone(),
                        field: f.name.clone(),
                    });
                }
            }
        }
        out.push(HighlightCandidate {
            group: base.group.clone(),
            score: 0.0,
            values,
        });
    }
    debug!(families = families.len(), candidates = out.len(), "joined families");
    Ok(out)
}

/// Score a candidate: the sum of contributions of every satisfied rule, or
/// `None` when no rule is satisfied.
pub fn score(candidate: &HighlightCandidate, rules: &[ThresholdRule]) -> Result<Option<f64>> {
    let mut total = 0.0;
    let mut matched = false;
    for rule in rules {
        let value = candidate.field(&rule.field)?;
        if rule.is_satisfied_by(value) {
            matched = true;
            total += value.map_or(0.0, |v| rule.contribution(v));
        }
    }
    Ok(matched.then_some(total))
}

/// Keep candidates that clear at least one rule, order by score (highest
/// first, ties in input order) and keep the first `limit`.
pub fn select_highlights(
    candidates: &[HighlightCandidate],
    rules: &[ThresholdRule],
    limit: usize,
) -> Result<Vec<HighlightCandidate>> {
    let mut eligible = Vec::new();
    for c in candidates {
        if let Some(s) = score(c, rules)? {
            let mut picked = c.clone();
            picked.score = s;
            eligible.push(picked);
        }
    }
    eligible.sort_by(|a, b| match (a.score.is_nan(), b.score.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal),
    });
    eligible.truncate(limit);
    debug!(
        candidates = candidates.len(),
        selected = eligible.len(),
        limit,
        "selected highlights"
    );
    Ok(eligible)
}
