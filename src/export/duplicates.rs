use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::FacultyRecord;
use crate::stats::DuplicateStatistics;

/// Plain-text listing of every dropped duplicate next to the citation kept in its place.
pub fn render(records: &[FacultyRecord], summary: &DuplicateStatistics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "DUPLICATE CITATIONS REPORT");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out);
    let _ = writeln!(out, "Total duplicates removed: {}", summary.removed);
    let _ = writeln!(out, "DOI-based: {}", summary.doi_based);
    let _ = writeln!(out, "Text-based: {}", summary.text_based);
    let _ = writeln!(out, "Strategy: keep_first");

    let sets = records
        .iter()
        .flat_map(|r| r.duplicates.iter().map(move |d| (&r.identity, d)));
    for (i, (owner, dup)) in sets.enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(out, "DUPLICATE SET #{}", i + 1);
        let _ = writeln!(out, "{}", "-".repeat(30));
        let _ = writeln!(out, "AUTHOR: {} <{}>", owner.display_name(), owner.url);
        let _ = writeln!(out, "CATEGORY: {}", dup.category);
        let _ = writeln!(out, "KEPT: {}", dup.kept);
        let _ = writeln!(out, "REMOVED: {}", dup.dropped);
        if dup.doi_match {
            let _ = writeln!(out, "DOI Match: true");
        }
    }
    out
}

pub fn write_report(
    path: &Path,
    records: &[FacultyRecord],
    summary: &DuplicateStatistics,
) -> Result<()> {
    std::fs::write(path, render(records, summary))
        .with_context(|| format!("Failed to write {}", path.display()))
}
