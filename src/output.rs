use crate::error::Result;
use serde::Serialize;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Tabled};

/// A rendered report: display strings only, one header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build from rows that derive `Tabled`, keeping their column renames.
    pub fn from_rows<T: Tabled>(rows: &[T]) -> Self {
        let mut table = Self::new(T::headers().into_iter().map(|h| h.into_owned()));
        for r in rows {
            table.push_row(r.fields().into_iter().map(|f| f.into_owned()));
        }
        table
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let idx = self.headers.iter().position(|h| h == header)?;
        Some(
            self.rows
                .iter()
                .map(|r| r.get(idx).map(String::as_str).unwrap_or_default())
                .collect(),
        )
    }

    /// Markdown preview of the first `max_rows` rows.
    pub fn to_markdown(&self, max_rows: usize) -> String {
        if self.rows.is_empty() {
            return "(no rows)".to_string();
        }
        let mut builder = Builder::default();
        builder.push_record(self.headers.iter().cloned());
        for r in self.rows.iter().take(max_rows) {
            builder.push_record(r.iter().cloned());
        }
        builder.build().with(Style::markdown()).to_string()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(&self.headers)?;
        for r in &self.rows {
            wtr.write_record(r)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table(title: &str, note: Option<&str>, table: &ReportTable, max_rows: usize) {
    println!("{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", table.to_markdown(max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Cluster")]
        cluster: String,
        #[tabled(rename = "Stores")]
        stores: usize,
    }

    fn sample() -> ReportTable {
        ReportTable::from_rows(&[
            Row {
                cluster: "S1-1-B".into(),
                stores: 3,
            },
            Row {
                cluster: "S1-1-R".into(),
                stores: 1,
            },
        ])
    }

    #[test]
    fn derived_rows_keep_renamed_headers() {
        let table = sample();
        assert_eq!(table.headers, vec!["Cluster", "Stores"]);
        assert_eq!(table.column("Stores"), Some(vec!["3", "1"]));
        assert_eq!(table.column("Region"), None);
    }

    #[test]
    fn markdown_preview_is_truncated() {
        let md = sample().to_markdown(1);
        assert!(md.contains("S1-1-B"));
        assert!(!md.contains("S1-1-R"));
        assert_eq!(ReportTable::new(["Cluster"]).to_markdown(5), "(no rows)");
    }

    #[test]
    fn csv_round_trips_through_disk() {
        let path = std::env::temp_dir().join(format!("kpi_output_{}.csv", std::process::id()));
        sample().write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text, "Cluster,Stores\nS1-1-B,3\nS1-1-R,1\n");
    }
}
