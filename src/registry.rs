//! KPI registry.
//!
//! Directionality belongs to the semantic [`Metric`], not to a family's field
//! key, so the region battle and the store detail table can never disagree
//! about whether, say, retention should go up. A family binds its own field
//! keys to metrics and may override direction explicitly.

use crate::util::{format_currency, format_number};
use once_cell::sync::Lazy;
use serde::Serialize;

/// Which way a KPI improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    pub const fn higher_is_better(self) -> bool {
        matches!(self, Self::HigherIsBetter)
    }

    /// `true` when `value` is at least as good as `reference`.
    pub fn at_least_as_good(self, value: f64, reference: f64) -> bool {
        match self {
            Self::HigherIsBetter => value >= reference,
            Self::LowerIsBetter => value <= reference,
        }
    }
}

/// Display format of a KPI value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueFormat {
    Percent,
    Currency,
}

impl ValueFormat {
    pub fn render(self, v: f64) -> String {
        match self {
            Self::Percent => format!("{}%", format_number(v, 1)),
            Self::Currency => format_currency(v),
        }
    }
}

/// Canonical semantic metrics shared by every family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    SalesVsTarget,
    AverageTransactionValue,
    NewCustomersVsTarget,
    ReferAFriend,
    Vltz,
    Wrc,
    UnregisteredTransactions,
    AppAdoption,
    Retention,
    TradeInVsKitSales,
    EmailCapture,
    PhoneCapture,
}

impl Metric {
    pub const fn direction(self) -> Direction {
        match self {
            Self::UnregisteredTransactions => Direction::LowerIsBetter,
            _ => Direction::HigherIsBetter,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::SalesVsTarget => "Sales vs TGT %",
            Self::AverageTransactionValue => "ATV (£)",
            Self::NewCustomersVsTarget => "NC vs TGT %",
            Self::ReferAFriend => "RAF %",
            Self::Vltz => "VLTZ %",
            Self::Wrc => "WRC %",
            Self::UnregisteredTransactions => "Unreg %",
            Self::AppAdoption => "App Adop %",
            Self::Retention => "RET %",
            Self::TradeInVsKitSales => "Trade-In %",
            Self::EmailCapture => "Email Cap %",
            Self::PhoneCapture => "Phone Cap %",
        }
    }

    pub const fn format(self) -> ValueFormat {
        match self {
            Self::AverageTransactionValue => ValueFormat::Currency,
            _ => ValueFormat::Percent,
        }
    }
}

/// A family's field key bound to a canonical metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiDefinition {
    pub key: String,
    pub metric: Metric,
    direction_override: Option<Direction>,
}

impl KpiDefinition {
    pub fn direction(&self) -> Direction {
        self.direction_override
            .unwrap_or_else(|| self.metric.direction())
    }

    pub fn higher_is_better(&self) -> bool {
        self.direction().higher_is_better()
    }

    pub fn label(&self) -> &'static str {
        self.metric.label()
    }

    pub fn render(&self, v: f64) -> String {
        self.metric.format().render(v)
    }
}

/// Ordered KPI definitions for one family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiRegistry {
    family: String,
    kpis: Vec<KpiDefinition>,
}

impl KpiRegistry {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            kpis: Vec::new(),
        }
    }

    pub fn bind(mut self, key: impl Into<String>, metric: Metric) -> Self {
        self.kpis.push(KpiDefinition {
            key: key.into(),
            metric,
            direction_override: None,
        });
        self
    }

    /// Bind with a direction that differs from the metric's canonical one.
    pub fn bind_with_direction(
        mut self,
        key: impl Into<String>,
        metric: Metric,
        direction: Direction,
    ) -> Self {
        self.kpis.push(KpiDefinition {
            key: key.into(),
            metric,
            direction_override: Some(direction),
        });
        self
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn iter(&self) -> impl Iterator<Item = &KpiDefinition> {
        self.kpis.iter()
    }

    pub fn get(&self, key: &str) -> Option<&KpiDefinition> {
        self.kpis.iter().find(|k| k.key == key)
    }

    pub fn len(&self) -> usize {
        self.kpis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
    }
}

/// Region-level "battle of the areas" family.
pub static REGION_BATTLE: Lazy<KpiRegistry> = Lazy::new(|| {
    KpiRegistry::new("region battle")
        .bind("revenueVsTarget", Metric::SalesVsTarget)
        .bind("atv", Metric::AverageTransactionValue)
        .bind("ncVsTGT", Metric::NewCustomersVsTarget)
        .bind("raf", Metric::ReferAFriend)
        .bind("vltz", Metric::Vltz)
        .bind("wrc", Metric::Wrc)
        .bind("unregisteredTransations", Metric::UnregisteredTransactions)
        .bind("appAdoption", Metric::AppAdoption)
        .bind("retention", Metric::Retention)
});

/// Store-level detail table family.
pub static STORE_DETAIL: Lazy<KpiRegistry> = Lazy::new(|| {
    KpiRegistry::new("store detail")
        .bind("SalesVsTGT", Metric::SalesVsTarget)
        .bind("NCVsTGT", Metric::NewCustomersVsTarget)
        .bind("ATV", Metric::AverageTransactionValue)
        .bind("Retention", Metric::Retention)
        .bind("WRC", Metric::Wrc)
        .bind("VLTZ_percent", Metric::Vltz)
        .bind("Unregistered_percent", Metric::UnregisteredTransactions)
        .bind("Trade_in_Vs_Kit_Sales", Metric::TradeInVsKitSales)
        .bind("RAF_percent", Metric::ReferAFriend)
        .bind("NC_Email_Capture_percent", Metric::EmailCapture)
        .bind("NC_Phone_Number_capture_percent", Metric::PhoneCapture)
});
