use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::model::{Category, FacultyRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacultySummary {
    pub name: String,
    pub url: String,
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateStatistics {
    pub removed: usize,
    pub doi_based: usize,
    pub text_based: usize,
}

/// Department-wide counts. Unrecognized citations are left out of the
/// per-category figures but still count toward totals and years.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStatistics {
    pub total: usize,
    pub unrecognized: usize,
    pub unknown_year: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub category_year_range: BTreeMap<Category, (i32, i32)>,
    pub by_year: BTreeMap<i32, usize>,
    #[serde(serialize_with = "cells_as_list")]
    pub by_category_year: BTreeMap<(Category, Option<i32>), usize>,
    pub year_range: Option<(i32, i32)>,
    pub duplicates: DuplicateStatistics,
    pub faculty: Vec<FacultySummary>,
}

impl AggregateStatistics {
    pub fn category_total(&self) -> usize {
        self.by_category.values().sum()
    }

    /// Most productive years, ties broken by the more recent year.
    pub fn top_years(&self, n: usize) -> Vec<(i32, usize)> {
        let mut years: Vec<_> = self.by_year.iter().map(|(y, c)| (*y, *c)).collect();
        years.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
        years.truncate(n);
        years
    }

    pub fn top_faculty(&self, n: usize) -> Vec<&FacultySummary> {
        let mut f: Vec<_> = self.faculty.iter().collect();
        f.sort_by(|a, b| b.total.cmp(&a.total).then(a.name.cmp(&b.name)));
        f.truncate(n);
        f
    }
}

/// One pass over every citation; recomputed from scratch, inputs untouched.
pub fn aggregate(records: &[FacultyRecord]) -> AggregateStatistics {
    let mut stats = AggregateStatistics::default();

    for record in records {
        let mut summary = FacultySummary {
            name: record.identity.display_name().to_string(),
            url: record.identity.url.clone(),
            total: 0,
            by_category: BTreeMap::new(),
        };

        for citation in record.iter_citations() {
            stats.total += 1;
            summary.total += 1;
            *summary.by_category.entry(citation.category).or_default() += 1;

            match citation.year {
                Some(year) => {
                    *stats.by_year.entry(year).or_default() += 1;
                    stats.year_range = Some(widen(stats.year_range, year));
                }
                None => stats.unknown_year += 1,
            }

            if !citation.category.is_recognized() {
                stats.unrecognized += 1;
                continue;
            }

            *stats.by_category.entry(citation.category).or_default() += 1;
            *stats
                .by_category_year
                .entry((citation.category, citation.year))
                .or_default() += 1;
            if let Some(year) = citation.year {
                let range = stats.category_year_range.get(&citation.category).copied();
                stats
                    .category_year_range
                    .insert(citation.category, widen(range, year));
            }
        }

        for dup in &record.duplicates {
            stats.duplicates.removed += 1;
            if dup.doi_match {
                stats.duplicates.doi_based += 1;
            } else {
                stats.duplicates.text_based += 1;
            }
        }

        stats.faculty.push(summary);
    }

    stats
}

fn widen(range: Option<(i32, i32)>, year: i32) -> (i32, i32) {
    match range {
        Some((lo, hi)) => (lo.min(year), hi.max(year)),
        None => (year, year),
    }
}

#[derive(Serialize)]
struct Cell {
    category: Category,
    year: Option<i32>,
    count: usize,
}

fn cells_as_list<S: Serializer>(
    cells: &BTreeMap<(Category, Option<i32>), usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(cells.iter().map(|((category, year), count)| Cell {
        category: *category,
        year: *year,
        count: *count,
    }))
}
