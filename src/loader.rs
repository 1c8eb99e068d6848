use crate::config::DashboardConfig;
use crate::dashboard::DashboardInputs;
use crate::error::{KpiError, Result};
use crate::types::LeafRecord;
use crate::util::parse_f64_safe;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Which columns identify a row. Every other column is numeric.
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions<'a> {
    pub name_column: &'a str,
    /// `None` makes each row its own group (region-level data).
    pub group_column: Option<&'a str>,
    /// Row name that marks the rollup pseudo-entity.
    pub rollup_name: Option<&'a str>,
}

impl<'a> LoadOptions<'a> {
    pub const fn stores() -> Self {
        Self {
            name_column: "store",
            group_column: Some("cluster"),
            rollup_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Blank cells are left out of the record rather than read as zero.
    pub blank_cells: usize,
}

pub fn read_leaf_records<R: Read>(
    reader: R,
    source: &str,
    options: &LoadOptions<'_>,
) -> Result<(Vec<LeafRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| KpiError::missing(source, name))
    };
    let name_idx = column(options.name_column)?;
    let group_idx = match options.group_column {
        Some(g) => Some(column(g)?),
        None => None,
    };

    let mut records = Vec::new();
    let mut report = LoadReport::default();
    for row in rdr.records() {
        let row = row?;
        report.total_rows += 1;

        let name = row.get(name_idx).unwrap_or_default();
        if name.is_empty() {
            return Err(KpiError::missing(
                &format!("{source} row {}", report.total_rows),
                options.name_column,
            ));
        }
        let group = match group_idx {
            Some(i) => row.get(i).unwrap_or_default(),
            None => name,
        };
        if group.is_empty() {
            return Err(KpiError::missing(name, options.group_column.unwrap_or_default()));
        }

        let mut record = LeafRecord::new(name, group);
        for (i, (header, raw)) in headers.iter().zip(row.iter()).enumerate() {
            if i == name_idx || Some(i) == group_idx {
                continue;
            }
            if raw.is_empty() {
                report.blank_cells += 1;
                continue;
            }
            let v = parse_f64_safe(raw).ok_or_else(|| KpiError::InvalidValue {
                record: record.name.clone(),
                field: header.to_string(),
                raw: raw.to_string(),
            })?;
            record.values.insert(header.to_string(), v);
        }
        record.rollup = options.rollup_name == Some(record.name.as_str());
        records.push(record);
    }

    info!(
        source,
        rows = report.total_rows,
        blank_cells = report.blank_cells,
        "loaded leaf records"
    );
    Ok((records, report))
}

pub fn load_leaf_records(
    path: &Path,
    options: &LoadOptions<'_>,
) -> Result<(Vec<LeafRecord>, LoadReport)> {
    let file = File::open(path)?;
    read_leaf_records(file, &path.display().to_string(), options)
}

/// Read every dataset named in the configuration.
pub fn load_inputs(config: &DashboardConfig) -> Result<(DashboardInputs, LoadReport)> {
    let files = &config.files;
    let stores = LoadOptions::stores();
    let mut totals = LoadReport::default();
    let mut load = |file: &str, options: &LoadOptions<'_>| -> Result<Vec<LeafRecord>> {
        let (records, report) = load_leaf_records(&config.data_path(file), options)?;
        totals.total_rows += report.total_rows;
        totals.blank_cells += report.blank_cells;
        Ok(records)
    };

    let inputs = DashboardInputs {
        region_battle: load(
            &files.region_battle,
            &LoadOptions {
                name_column: "region",
                group_column: None,
                rollup_name: Some(config.rollup_region.as_str()),
            },
        )?,
        store_kpis: load(&files.store_kpis, &stores)?,
        store_retention: load(&files.store_retention, &stores)?,
        store_acb: load(&files.store_acb, &stores)?,
        app_adoption: load(&files.app_adoption, &stores)?,
        store_audit: load(&files.store_audit, &stores)?,
        store_reviews: load(
            &files.store_reviews,
            &LoadOptions {
                group_column: None,
                ..stores
            },
        )?,
    };
    Ok((inputs, totals))
}
