use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

/// Plain-text table with left-aligned columns
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(headers: &[S]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Missing cells render empty; extra cells are dropped
    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn cell<'a>(&self, row: &'a [String], i: usize) -> &'a str {
        row.get(i).map(String::as_str).unwrap_or("")
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, width) in widths.iter_mut().enumerate() {
                *width = (*width).max(self.cell(row, i).chars().count());
            }
        }

        let line = |cells: Vec<&str>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, &width)| format!("{cell:<width$}"))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = Vec::with_capacity(self.rows.len() + 2);
        out.push(line(self.headers.iter().map(String::as_str).collect()));
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &self.rows {
            out.push(line((0..widths.len()).map(|i| self.cell(row, i)).collect()));
        }
        out.join("\n")
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let mut write_row = |cells: Vec<&str>| {
            let escaped: Vec<String> = cells.into_iter().map(csv_field).collect();
            out.push_str(&escaped.join(","));
            out.push('\n');
        };
        write_row(self.headers.iter().map(String::as_str).collect());
        for row in &self.rows {
            write_row((0..self.headers.len()).map(|i| self.cell(row, i)).collect());
        }
        out
    }
}

/// Quote a CSV field when it contains a separator, quote or newline
pub fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Cell text for an extracted field: strings bare, missing and null empty
pub fn value_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize report")
}

/// Write a report as pretty JSON
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = to_pretty_json(value)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Report saved to {}", path.display());
    Ok(())
}

pub fn fmt_pct(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_alignment() {
        let mut table = Table::new(&["Zone", "Count"]);
        table.push(vec!["Core".to_string(), "12".to_string()]);
        table.push(vec!["OuterReach".to_string()]);

        let text = table.render();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Zone        Count");
        assert_eq!(lines[1], "----------  -----");
        assert_eq!(lines[2], "Core        12");
        assert_eq!(lines[3], "OuterReach");
    }

    #[test]
    fn test_csv_escaping() {
        let mut table = Table::new(&["file", "genes.tag"]);
        table.push(vec!["a.bb8".to_string(), "Red, \"fast\"".to_string()]);
        assert_eq!(table.to_csv(), "file,genes.tag\na.bb8,\"Red, \"\"fast\"\"\"\n");
    }

    #[test]
    fn test_value_cell() {
        assert_eq!(value_cell(None), "");
        assert_eq!(value_cell(Some(&json!(null))), "");
        assert_eq!(value_cell(Some(&json!("Red"))), "Red");
        assert_eq!(value_cell(Some(&json!(3.5))), "3.5");
        assert_eq!(value_cell(Some(&json!([1, 2]))), "[1,2]");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(0.126), "0.13");
        assert_eq!(fmt_pct(33.333), "33.3%");
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_json(&path, &json!({ "total": 3 })).unwrap();
        let back: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back["total"], 3);
    }
}
