use crate::aggregate::Standing;
use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, PeriodSnapshot};
use crate::output::ReportTable;
use crate::rank::Podium;
use crate::registry::{KpiRegistry, REGION_BATTLE, STORE_DETAIL};
use crate::types::{GroupAggregate, MultiPeriodAggregate};
use crate::util::{format_int, format_number, format_optional};
use serde::Serialize;
use tabled::Tabled;

/// One output file: where it goes, how it is titled, what it holds.
#[derive(Debug, Clone)]
pub struct Report {
    pub file: &'static str,
    pub title: &'static str,
    pub note: Option<String>,
    pub table: ReportTable,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct HighlightRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[serde(rename = "Cluster")]
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "Score")]
    #[tabled(rename = "Score")]
    pub score: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ReviewRow {
    #[serde(rename = "Rank")]
    #[tabled(rename = "Rank")]
    pub rank: i64,
    #[serde(rename = "Store")]
    #[tabled(rename = "Store")]
    pub store: String,
    #[serde(rename = "Cluster")]
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "Reviews")]
    #[tabled(rename = "Reviews")]
    pub reviews: String,
    #[serde(rename = "LastRank")]
    #[tabled(rename = "LastRank")]
    pub last_rank: i64,
    #[serde(rename = "Change")]
    #[tabled(rename = "Change")]
    pub change: String,
}

fn ordinal(rank: Option<usize>) -> String {
    match (Podium::from_rank(rank), rank) {
        (Podium::First, _) => "1st".into(),
        (Podium::Second, _) => "2nd".into(),
        (Podium::Third, _) => "3rd".into(),
        (Podium::Unplaced, Some(r)) => {
            let suffix = match (r % 10, r % 100) {
                (_, 11..=13) => "th",
                (1, _) => "st",
                (2, _) => "nd",
                (3, _) => "rd",
                _ => "th",
            };
            format!("{r}{suffix}")
        }
        (Podium::Unplaced, None) => "-".into(),
    }
}

/// Region battle: each KPI value followed by its peer rank.
pub fn battle_table(dashboard: &Dashboard) -> ReportTable {
    let mut headers = vec!["Region".to_string()];
    for kpi in REGION_BATTLE.iter() {
        headers.push(kpi.label().to_string());
        headers.push(format!("{} Rank", kpi.label()));
    }
    let mut table = ReportTable::new(headers);
    for ranked in &dashboard.battle {
        let mut row = vec![ranked.record.name.clone()];
        for kpi in REGION_BATTLE.iter() {
            row.push(format_optional_with(&REGION_BATTLE, &kpi.key, ranked.record.get(&kpi.key)));
            row.push(ordinal(ranked.rank(&kpi.key)));
        }
        table.push_row(row);
    }
    table
}

fn format_optional_with(registry: &KpiRegistry, key: &str, v: Option<f64>) -> String {
    match (registry.get(key), v) {
        (Some(kpi), Some(v)) => kpi.render(v),
        (None, v) => format_optional(v, 2),
        (_, None) => "n/a".into(),
    }
}

/// Store detail: every store against the flat area average.
pub fn store_detail_table(dashboard: &Dashboard) -> ReportTable {
    let mut headers = vec!["Store".to_string(), "Cluster".to_string()];
    headers.extend(STORE_DETAIL.iter().map(|k| k.label().to_string()));
    let mut table = ReportTable::new(headers);
    for store in &dashboard.store_standings {
        let mut row = vec![store.store.clone(), store.cluster.clone()];
        for s in &store.standings {
            let marker = match s.standing {
                Standing::AboveAverage => "+",
                Standing::BelowAverage => "-",
            };
            row.push(format!(
                "{} ({marker})",
                format_optional_with(&STORE_DETAIL, &s.key, Some(s.value))
            ));
        }
        table.push_row(row);
    }
    let mut avg = vec![
        "Area average".to_string(),
        format!("{} stores", format_int(dashboard.area_baseline.count)),
    ];
    for kpi in STORE_DETAIL.iter() {
        avg.push(format_optional_with(
            &STORE_DETAIL,
            &kpi.key,
            dashboard.area_baseline.average(&kpi.key),
        ));
    }
    table.push_row(avg);
    table
}

/// Any grouped aggregate, one column per output field.
pub fn aggregate_table(groups: &[GroupAggregate]) -> ReportTable {
    let mut headers = vec!["Cluster".to_string(), "Stores".to_string()];
    if let Some(first) = groups.first() {
        headers.extend(first.fields.iter().map(|f| f.name.clone()));
    }
    let mut table = ReportTable::new(headers);
    for g in groups {
        let mut row = vec![g.group.clone(), format_int(g.count)];
        row.extend(g.fields.iter().map(|f| format_optional(f.value.value(), 2)));
        table.push_row(row);
    }
    table
}

pub fn period_table(rows: &[MultiPeriodAggregate], periods: &[String]) -> ReportTable {
    let mut headers = vec!["Cluster".to_string(), "Stores".to_string()];
    headers.extend(periods.iter().cloned());
    let mut table = ReportTable::new(headers);
    for r in rows {
        let mut row = vec![r.group.clone(), format_int(r.count)];
        row.extend(periods.iter().map(|p| format_optional(r.value(p), 2)));
        table.push_row(row);
    }
    table
}

/// One period's store values next to the recomputed area average.
pub fn snapshot_table(snapshot: &PeriodSnapshot) -> ReportTable {
    let format = snapshot.metric.format();
    let mut table = ReportTable::new([
        "Store".to_string(),
        "Cluster".to_string(),
        snapshot.period.clone(),
        "Area Average".to_string(),
        "vs Average".to_string(),
    ]);
    for store in &snapshot.stores {
        for s in &store.standings {
            let side = match s.standing {
                Standing::AboveAverage => "Above",
                Standing::BelowAverage => "Below",
            };
            table.push_row([
                store.store.clone(),
                store.cluster.clone(),
                format.render(s.value),
                format.render(s.average),
                side.to_string(),
            ]);
        }
    }
    table
}

pub fn highlight_rows(dashboard: &Dashboard) -> Vec<HighlightRow> {
    dashboard
        .highlights
        .iter()
        .enumerate()
        .map(|(i, h)| HighlightRow {
            rank: i + 1,
            cluster: h.group.clone(),
            score: format_number(h.score, 2),
        })
        .collect()
}

pub fn review_rows(dashboard: &Dashboard) -> Vec<ReviewRow> {
    dashboard
        .review_league
        .iter()
        .map(|r| ReviewRow {
            rank: r.current_rank,
            store: r.store.clone(),
            cluster: r.cluster.clone(),
            reviews: format_int(r.reviews),
            last_rank: r.last_rank,
            change: if r.change == 0 {
                "0".to_string()
            } else {
                format!("{:+}", r.change)
            },
        })
        .collect()
}

/// Every report in output order.
pub fn build_reports(dashboard: &Dashboard, config: &DashboardConfig) -> Vec<Report> {
    vec![
        Report {
            file: "report1_region_battle.csv",
            title: "Battle of the Regions",
            note: Some(format!("Rollup row '{}' is not ranked", config.rollup_region)),
            table: battle_table(dashboard),
        },
        Report {
            file: "report2_store_detail.csv",
            title: "Store KPIs vs Area Average",
            note: Some("(+) at or better than average, (-) worse".to_string()),
            table: store_detail_table(dashboard),
        },
        Report {
            file: "report3_cluster_snapshot.csv",
            title: "Cluster Sales, New Customers and Key Metrics",
            note: Some(format!(
                "Trade-in leaders: {}",
                dashboard.trade_in_leaders.join(", ")
            )),
            table: aggregate_table(&dashboard.cluster_snapshot),
        },
        Report {
            file: "report4_cluster_audit.csv",
            title: "Cluster Audit Scores",
            note: None,
            table: aggregate_table(&dashboard.audit),
        },
        Report {
            file: "report5_cluster_retention.csv",
            title: "Cluster Retention by Month",
            note: Some("Mean of store rates".to_string()),
            table: period_table(&dashboard.retention, &config.periods),
        },
        Report {
            file: "report6_cluster_acb.csv",
            title: "Cluster Active Customer Base by Month",
            note: Some("Sum of store counts".to_string()),
            table: period_table(&dashboard.active_customer_base, &config.periods),
        },
        Report {
            file: "report7_cluster_app_adoption.csv",
            title: "Cluster App Adoption by Month",
            note: Some("Mean of store rates".to_string()),
            table: period_table(&dashboard.app_adoption, &config.periods),
        },
        Report {
            file: "report8_app_adoption_snapshot.csv",
            title: "App Adoption Snapshot vs Area Average",
            note: Some(format!(
                "{} area average {}",
                dashboard.app_adoption_snapshot.period,
                format_optional(
                    dashboard
                        .app_adoption_snapshot
                        .baseline
                        .average(&dashboard.app_adoption_snapshot.period),
                    2
                )
            )),
            table: snapshot_table(&dashboard.app_adoption_snapshot),
        },
        Report {
            file: "report9_highlights.csv",
            title: "Cluster Highlights",
            note: Some(format!("Top {} by weighted score", config.highlight_limit)),
            table: ReportTable::from_rows(&highlight_rows(dashboard)),
        },
        Report {
            file: "report10_review_league.csv",
            title: "Google Reviews League",
            note: None,
            table: ReportTable::from_rows(&review_rows(dashboard)),
        },
    ]
}
