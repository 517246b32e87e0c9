use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use super::YearGroup;
use crate::config::Labels;
use crate::model::{Category, FacultyRecord, Language};

/// `Category,Year,Author,Citation`; unknown year is an empty cell.
pub fn write_citations(
    path: &Path,
    organized: &BTreeMap<Category, Vec<YearGroup<'_>>>,
    labels: &Labels,
    language: Language,
) -> Result<()> {
    let mut wtr = ::csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["Category", "Year", "Author", "Citation"])?;

    for (category, years) in organized {
        let label = labels.label(*category, language);
        for (year, citations) in years {
            let year = year.map(|y| y.to_string()).unwrap_or_default();
            for c in citations {
                wtr.write_record([
                    label.as_str(),
                    year.as_str(),
                    c.owner.display_name(),
                    c.text.as_str(),
                ])?;
            }
        }
    }

    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Unrecognized citations for manual review.
pub fn write_review(path: &Path, records: &[FacultyRecord]) -> Result<usize> {
    let mut wtr = ::csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(["Author", "URL", "Language", "Citation"])?;

    let mut n = 0;
    for record in records {
        for c in record.citations.get(&Category::Unrecognized).into_iter().flatten() {
            wtr.write_record([
                c.owner.display_name(),
                c.owner.url.as_str(),
                c.language.tag(),
                c.text.as_str(),
            ])?;
            n += 1;
        }
    }

    wtr.flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::export::{organize, tests::sample};

    fn tmp(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("{}_{}", std::process::id(), name))
    }

    #[test]
    fn citations_csv_rows() {
        let path = tmp("citations_tr.csv");
        let records = sample();
        let labels = Labels::from_settings(&Settings::default().labels).unwrap();
        write_citations(&path, &organize(&records), &labels, Language::Tr).unwrap();

        let mut rdr = ::csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["Category", "Year", "Author", "Citation"]
        );

        let rows: Vec<Vec<String>> = rdr
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        assert_eq!(rows.len(), 5);
        assert_eq!(
            rows[0],
            vec!["Uluslararası Makaleler", "2019", "Ayşe Yılmaz", "Yılmaz, A. (2019). New & shiny."]
        );
        assert_eq!(rows[3][1], "");
        assert_eq!(rows[4][0], "Ulusal Kitaplar");
        assert!(rows.iter().all(|r| !r[3].starts_with("Patent")));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn review_csv_holds_only_unrecognized() {
        let path = tmp("review_unrecognized.csv");
        let n = write_review(&path, &sample()).unwrap();
        assert_eq!(n, 1);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines[0], "Author,URL,Language,Citation");
        assert_eq!(lines[1], "Ayşe Yılmaz,https://x.edu/content/a,en,Patent 42 (2010)");
        std::fs::remove_file(&path).ok();
    }
}
