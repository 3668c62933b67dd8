//! Summaries over a harvested TSV: row counts after filtering, the covered time span,
//! the most frequent values per column and a per-region breakdown by service.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use chrono::{NaiveDateTime, TimeDelta};

use crate::{filter::MessageFilter, Error, Result};

pub const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

const AMBULANCE: &str = "Ambulance";
const FIRE_BRIGADE: &str = "Brandweer";
const POLICE: &str = "Politie";

/// A harvested row with its timestamp parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub timestamp: NaiveDateTime,
    pub service: String,
    pub region: String,
    pub message: String,
}

pub async fn load_dispatches(path: impl AsRef<Path>) -> Result<Vec<Dispatch>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_tsv(&text)
}

/// Parses harvester output. Columns are located by header name, so extra columns are fine.
/// Fields are taken verbatim: there is no quoting in the format.
pub fn parse_tsv(text: &str) -> Result<Vec<Dispatch>> {
    let mut lines = text.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split('\t').collect();
    let column = |name: &'static str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or(Error::MissingColumn(name))
    };
    let ts_col = column("Timestamp")?;
    let service_col = column("Service")?;
    let region_col = column("Region")?;
    let message_col = column("Message")?;
    let expected = header.len();

    let mut dispatches = Vec::new();
    // Line 1 is the header.
    for (line_num, line) in (2..).zip(lines) {
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < expected {
            return Err(Error::MalformedRow {
                line: line_num,
                found: fields.len(),
                expected,
            });
        }
        let timestamp = NaiveDateTime::parse_from_str(fields[ts_col], TIMESTAMP_FORMAT).map_err(
            |_| Error::InvalidTimestamp {
                line: line_num,
                value: fields[ts_col].to_string(),
            },
        )?;
        dispatches.push(Dispatch {
            timestamp,
            service: fields[service_col].to_string(),
            region: fields[region_col].to_string(),
            message: fields[message_col].to_string(),
        });
    }
    Ok(dispatches)
}

/// Most frequent values of one column, highest count first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frequencies {
    pub column: &'static str,
    pub values: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub original_rows: usize,
    pub cleaned_rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    /// How many values per column were asked for. A column may have fewer.
    pub top_n: usize,
    pub top: Vec<Frequencies>,
}

impl Summary {
    pub fn rows_removed(&self) -> usize {
        self.original_rows - self.cleaned_rows
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.last? - self.first?)
    }
}

pub fn clean<'a>(dispatches: &'a [Dispatch], filter: &MessageFilter) -> Vec<&'a Dispatch> {
    dispatches
        .iter()
        .filter(|d| filter.keeps(&d.message))
        .collect()
}

pub fn summarize(dispatches: &[Dispatch], filter: &MessageFilter, top_n: usize) -> Summary {
    let cleaned = clean(dispatches, filter);
    let top = vec![
        Frequencies {
            column: "Service",
            values: top_values(cleaned.iter().map(|d| d.service.as_str()), top_n),
        },
        Frequencies {
            column: "Region",
            values: top_values(cleaned.iter().map(|d| d.region.as_str()), top_n),
        },
        Frequencies {
            column: "Message",
            values: top_values(cleaned.iter().map(|d| d.message.as_str()), top_n),
        },
    ];

    Summary {
        original_rows: dispatches.len(),
        cleaned_rows: cleaned.len(),
        first: cleaned.iter().map(|d| d.timestamp).min(),
        last: cleaned.iter().map(|d| d.timestamp).max(),
        top_n,
        top,
    }
}

/// Ties are ordered by value so the output is stable.
fn top_values<'a>(values: impl Iterator<Item = &'a str>, top_n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut sorted: Vec<_> = counts.into_iter().collect();
    sorted.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted
        .into_iter()
        .take(top_n)
        .map(|(v, n)| (v.to_string(), n))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionRow {
    pub region: String,
    pub ambulance: usize,
    pub firefighters: usize,
    pub police: usize,
}

impl RegionRow {
    pub fn total(&self) -> usize {
        self.ambulance + self.firefighters + self.police
    }
}

/// Calls per region for the three emergency services, busiest region first.
/// Services other than ambulance, fire brigade and police are not counted.
pub fn region_table<'a>(dispatches: impl IntoIterator<Item = &'a Dispatch>) -> Vec<RegionRow> {
    let mut rows: HashMap<&str, RegionRow> = HashMap::new();
    for d in dispatches {
        let row = rows.entry(d.region.as_str()).or_insert_with(|| RegionRow {
            region: d.region.clone(),
            ..RegionRow::default()
        });
        match d.service.as_str() {
            AMBULANCE => row.ambulance += 1,
            FIRE_BRIGADE => row.firefighters += 1,
            POLICE => row.police += 1,
            _ => {}
        }
    }
    let mut rows: Vec<_> = rows.into_values().collect();
    rows.sort_unstable_by(|a, b| {
        b.total()
            .cmp(&a.total())
            .then_with(|| a.region.cmp(&b.region))
    });
    rows
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(40);
        writeln!(f, "Original Rows: {}", self.original_rows)?;
        writeln!(f, "Cleaned Rows:  {}", self.cleaned_rows)?;
        writeln!(f, "Rows Removed:  {}", self.rows_removed())?;
        writeln!(f, "{rule}")?;
        match (self.first, self.last, self.duration()) {
            (Some(first), Some(last), Some(duration)) => {
                writeln!(f, "Start Time: {first}")?;
                writeln!(f, "End Time:   {last}")?;
                writeln!(f, "Duration:   {}", format_duration(duration))?;
            }
            _ => writeln!(f, "No rows left to span a time range.")?,
        }
        writeln!(f, "{rule}")?;
        for freq in &self.top {
            writeln!(f, "\nTop {} frequencies for column: '{}'", self.top_n, freq.column)?;
            for (value, count) in &freq.values {
                writeln!(f, "{count:>8}  {value}")?;
            }
        }
        Ok(())
    }
}

fn format_duration(duration: TimeDelta) -> String {
    let secs = duration.num_seconds();
    format!(
        "{}d {:02}:{:02}:{:02}",
        secs / 86_400,
        secs % 86_400 / 3_600,
        secs % 3_600 / 60,
        secs % 60
    )
}

/// Renders a region table as aligned text columns.
pub struct RegionTable<'a>(pub &'a [RegionRow]);

impl fmt::Display for RegionTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .0
            .iter()
            .map(|r| r.region.chars().count())
            .max()
            .unwrap_or(0)
            .max("Region".len());
        writeln!(
            f,
            "{:<width$}  {:>9}  {:>12}  {:>6}  {:>6}",
            "Region", "Ambulance", "Firefighters", "Police", "Total"
        )?;
        for row in self.0 {
            writeln!(
                f,
                "{:<width$}  {:>9}  {:>12}  {:>6}  {:>6}",
                row.region,
                row.ambulance,
                row.firefighters,
                row.police,
                row.total()
            )?;
        }
        Ok(())
    }
}
