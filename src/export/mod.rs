pub mod csv;
pub mod duplicates;
pub mod html;
pub mod json;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::config::Labels;
use crate::model::{Category, CitationRecord, FacultyRecord, Language};
use crate::stats::AggregateStatistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Csv,
    Html,
    /// `review_unrecognized.csv` and `duplicate_report.txt`.
    Review,
    All,
}

impl Format {
    fn includes(self, other: Format) -> bool {
        self == Format::All || self == other
    }
}

/// Citations of one year within a category; `None` is the unknown-year bucket.
pub type YearGroup<'a> = (Option<i32>, Vec<&'a CitationRecord>);

/// Recognized citations by category, years newest first, unknown year last.
/// Order within a year follows faculty order, then profile order.
pub fn organize(records: &[FacultyRecord]) -> BTreeMap<Category, Vec<YearGroup<'_>>> {
    let mut by_category: BTreeMap<Category, Vec<&CitationRecord>> = BTreeMap::new();
    for c in records.iter().flat_map(FacultyRecord::iter_citations) {
        if c.category.is_recognized() {
            by_category.entry(c.category).or_default().push(c);
        }
    }

    by_category
        .into_iter()
        .map(|(category, citations)| {
            let sorted = citations
                .into_iter()
                .sorted_by(|a, b| newest_first(a.year, b.year));
            let groups = sorted.group_by(|c| c.year);
            let years = groups
                .into_iter()
                .map(|(year, group)| (year, group.collect::<Vec<_>>()))
                .collect::<Vec<_>>();
            (category, years)
        })
        .collect()
}

fn newest_first(a: Option<i32>, b: Option<i32>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Write the requested formats for every language; returns the files written.
pub fn write_all(
    out_dir: &Path,
    records: &[FacultyRecord],
    stats: &AggregateStatistics,
    labels: &Labels,
    languages: &[Language],
    format: Format,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let organized = organize(records);
    let mut written = Vec::new();

    for &language in languages {
        if format.includes(Format::Csv) {
            let path = out_dir.join(format!("citations_{}.csv", language));
            csv::write_citations(&path, &organized, labels, language)?;
            written.push(path);
        }
        if format.includes(Format::Html) {
            let path = out_dir.join(format!("citations_{}.html", language));
            html::write_citations(&path, &organized, labels, language)?;
            written.push(path);
        }
    }

    if format.includes(Format::Review) {
        let path = out_dir.join("review_unrecognized.csv");
        csv::write_review(&path, records)?;
        written.push(path);

        let path = out_dir.join("duplicate_report.txt");
        duplicates::write_report(&path, records, &stats.duplicates)?;
        written.push(path);
    }

    if format.includes(Format::Json) {
        let path = out_dir.join("citations.json");
        json::write(&path, records, stats)?;
        written.push(path);
    }

    Ok(written)
}
