//! Tabular renderings of results: plain text, CSV, HTML and JSON.
//!
//! Every format is produced from one [`ResultTable`] whose cells are formatted
//! once, so the decimal places chosen by the caller apply everywhere.

use crate::error::{Result, ThToolsError};
use crate::result::ToeholdResult;
use serde::Serialize;
use std::{fmt::Write as _, str::FromStr};

/// Percentage cell of a decimal fraction.
pub fn percent(value: f64, dp: Option<usize>) -> String {
    number(value * 100.0, dp)
}

pub fn number(value: f64, dp: Option<usize>) -> String {
    match dp {
        Some(dp) => format!("{value:.dp$}"),
        None => value.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ResultTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: vec![],
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(ThToolsError::config(format!(
                "Table row has {} cells for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|r| r[index].as_str()).collect())
    }

    fn widths(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                self.rows
                    .iter()
                    .map(|r| r[i].chars().count())
                    .chain(std::iter::once(c.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Boxed, left-aligned text table.
    pub fn to_text(&self) -> String {
        let widths = self.widths();
        let rule = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let rule = format!("+{rule}+");
        let line = |cells: &[String]| {
            let inner = cells
                .iter()
                .zip(&widths)
                .map(|(cell, &w)| format!(" {cell:<w$} "))
                .collect::<Vec<_>>()
                .join("|");
            format!("|{inner}|")
        };
        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "{}", line(&self.columns));
        let _ = writeln!(out, "{rule}");
        for row in &self.rows {
            let _ = writeln!(out, "{}", line(row));
        }
        out.push_str(&rule);
        out
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(vec![]);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from("<table>\n    <thead>\n        <tr>\n");
        for column in &self.columns {
            let _ = writeln!(out, "            <th>{}</th>", escape_html(column));
        }
        out.push_str("        </tr>\n    </thead>\n    <tbody>\n");
        for row in &self.rows {
            out.push_str("        <tr>\n");
            for cell in row {
                let _ = writeln!(out, "            <td>{}</td>", escape_html(cell));
            }
            out.push_str("        </tr>\n");
        }
        out.push_str("    </tbody>\n</table>");
        out
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn meta_csv(pairs: &[(String, String)]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(vec![]);
    for (key, value) in pairs {
        writer.write_record([key, value])?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A result that can be laid out as a table with a metadata header.
pub trait TableExport {
    fn tabulate(&self, dp: Option<usize>) -> Result<ResultTable>;

    fn date(&self) -> String;

    fn meta_pairs(&self) -> Vec<(String, String)>;

    fn pretty_meta(&self) -> String {
        self.meta_pairs()
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Date, metadata and table as plain text.
    fn prettify(&self, dp: Option<usize>) -> Result<String> {
        Ok(format!(
            "{}\n\n{}\n\n{}",
            self.date(),
            self.pretty_meta(),
            self.tabulate(dp)?.to_text()
        ))
    }

    /// Date, metadata rows and table as CSV.
    fn to_csv(&self, dp: Option<usize>) -> Result<String> {
        Ok(format!(
            "{}\n\n{}\n{}",
            self.date(),
            meta_csv(&self.meta_pairs())?,
            self.tabulate(dp)?.to_csv()?
        ))
    }

    fn to_html(&self, dp: Option<usize>) -> Result<String> {
        Ok(self.tabulate(dp)?.to_html())
    }

    fn to_json(&self, dp: Option<usize>) -> Result<String> {
        self.tabulate(dp)?.to_json()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Text,
    Csv,
    Html,
    Json,
}

impl ExportFormat {
    pub fn render<T: TableExport + ?Sized>(&self, item: &T, dp: Option<usize>) -> Result<String> {
        match self {
            Self::Text => item.prettify(dp),
            Self::Csv => item.to_csv(dp),
            Self::Html => item.to_html(dp),
            Self::Json => item.to_json(dp),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ThToolsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(ThToolsError::config(format!(
                "Unknown export format '{other}' (expected text, csv, html or json)"
            ))),
        }
    }
}

pub const NAME_COLUMN: &str = "Name";
pub const SEQUENCE_COLUMN: &str = "Sequence(s)";
pub const ACTIVATION_COLUMN: &str = "Activation %";

impl TableExport for ToeholdResult {
    /// One row per trigger set, highest activation first.
    fn tabulate(&self, dp: Option<usize>) -> Result<ResultTable> {
        let named = self.names().is_some();
        let mut columns = vec![];
        if named {
            columns.push(NAME_COLUMN);
        }
        columns.extend([
            SEQUENCE_COLUMN,
            ACTIVATION_COLUMN,
            "RBS unbinding %",
            "AUG unbinding %",
            "Post-AUG unbinding %",
            "Activation SE %",
        ]);
        let mut table = ResultTable::new(columns);

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.activation()[b].total_cmp(&self.activation()[a]));
        for row in order {
            let mut cells = vec![];
            if named {
                cells.push(self.row_name(row).unwrap_or_default());
            }
            cells.push(self.trigger_set(row).join("+"));
            cells.push(percent(self.activation()[row], dp));
            cells.push(percent(self.rbs_unbinding()[row], dp));
            cells.push(percent(self.aug_unbinding()[row], dp));
            cells.push(percent(self.post_aug_unbinding()[row], dp));
            cells.push(percent(self.activation_se()[row], dp));
            table.push_row(cells)?;
        }
        Ok(table)
    }

    fn date(&self) -> String {
        ToeholdResult::date(self)
    }

    fn meta_pairs(&self) -> Vec<(String, String)> {
        ToeholdResult::meta_pairs(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_meta;
    use crate::tubes::TriggerSets;
    use crate::worker::PerTubeStatistics;

    fn result() -> ToeholdResult {
        let rows = vec![
            vec!["AAAA".to_string()],
            vec!["CCCC".to_string()],
            vec!["GGGG".to_string()],
        ];
        let mut stats = PerTubeStatistics::default();
        for a in [0.1, 0.75, 0.25] {
            stats.activation.push(a);
            stats.rbs_unbinding.push(a);
            stats.aug_unbinding.push(a);
            stats.post_aug_unbinding.push(1.0);
            stats.activation_se.push(0.01);
        }
        ToeholdResult::new(
            TriggerSets::uniform(&rows, 1e-7).unwrap(),
            Some(vec![
                vec!["a<1>".to_string()],
                vec!["c".to_string()],
                vec!["g".to_string()],
            ]),
            stats,
            test_meta(),
        )
        .unwrap()
    }

    #[test]
    fn test_rows_sorted_by_activation() {
        let table = result().tabulate(Some(1)).unwrap();
        assert_eq!(
            table.column(SEQUENCE_COLUMN).unwrap(),
            vec!["CCCC", "GGGG", "AAAA"]
        );
        assert_eq!(
            table.column(ACTIVATION_COLUMN).unwrap(),
            vec!["75.0", "25.0", "10.0"]
        );
        assert_eq!(table.column(NAME_COLUMN).unwrap()[0], "c");
    }

    #[test]
    fn test_text_table_is_aligned() {
        let text = result().tabulate(Some(2)).unwrap().to_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
        assert!(lines[1].contains("Activation %"));
    }

    #[test]
    fn test_csv_has_date_meta_and_table() {
        let result = result();
        let csv = result.to_csv(Some(0)).unwrap();
        let mut sections = csv.split("\n\n");
        assert_eq!(sections.next(), Some(result.date().as_str()));
        let meta = sections.next().unwrap();
        assert!(meta.contains("Target name,c"));
        let table = sections.next().unwrap();
        assert!(table.starts_with("Name,Sequence(s),Activation %"));
        assert!(table.contains("c,CCCC,75,75,75,100,1"));
    }

    #[test]
    fn test_html_and_json_carry_table_only() {
        let result = result();
        let html = result.to_html(None).unwrap();
        assert!(html.starts_with("<table>"));
        assert!(html.contains("<td>a&lt;1&gt;</td>"));
        assert!(!html.contains("Toehold switch"));

        let json: serde_json::Value =
            serde_json::from_str(&result.to_json(Some(1)).unwrap()).unwrap();
        assert_eq!(json["columns"][1], "Sequence(s)");
        assert_eq!(json["rows"][0][2], "75.0");
        assert!(json.get("date").is_none());
    }

    #[test]
    fn test_prettify_sections() {
        let text = result().prettify(None).unwrap();
        assert!(text.contains("Specificity %: "));
        assert!(text.contains("| Name"));
    }

    #[test]
    fn test_formats_parse() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("text".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("xlsx".parse::<ExportFormat>().unwrap_err().is_configuration());
    }

    #[test]
    fn test_row_width_checked() {
        let mut table = ResultTable::new(["a", "b"]);
        assert!(table.push_row(vec!["1".to_string()]).is_err());
        assert!(table.push_row(vec!["1".to_string(), "2".to_string()]).is_ok());
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(percent(0.123456, Some(2)), "12.35");
        assert_eq!(percent(0.5, None), "50");
        assert_eq!(number(f64::INFINITY, Some(3)), "inf");
    }
}
