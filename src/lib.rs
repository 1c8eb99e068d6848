//! KPI rollup and ranking engine for store performance dashboards.
//!
//! Leaf records (stores or regions) are loaded from CSV, ranked against
//! their peers, rolled up into clusters and months, and scored for
//! highlights. [`dashboard::build_dashboard`] runs the whole pipeline.

pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod highlight;
pub mod loader;
pub mod output;
pub mod period;
pub mod rank;
pub mod registry;
pub mod reports;
pub mod resolve;
pub mod types;
pub mod util;

pub use aggregate::{aggregate_by_group, area_average, AggregationPlan, Baseline, Standing};
pub use config::DashboardConfig;
pub use dashboard::{build_dashboard, Dashboard, DashboardInputs};
pub use error::{KpiError, Result};
pub use highlight::{select_highlights, ThresholdRule};
pub use period::{aggregate_by_group_and_period, Combine};
pub use rank::{rank_peers, rank_peers_with, TiePolicy};
pub use registry::{Direction, KpiRegistry, Metric};
pub use types::{GroupAggregate, HighlightCandidate, LeafRecord, MultiPeriodAggregate, RankedRecord};
