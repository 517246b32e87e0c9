use std::sync::LazyLock;

use regex::Regex;

use super::year::YearExtractor;
use crate::model::{Category, CitationRecord, FacultyIdentity, Language};

static LEADING_ARTIFACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[•·▪◦●*\-–—>]+\s*|\d{1,3}[.)]\s+)+").unwrap());
static TRAILING_ARTIFACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s•·▪◦●*\-–—,;|]+$").unwrap());
static DOI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(10\.\d{4,9}/[^\s,;)\]]+)").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("malformed citation {0:?}: nothing left after normalization")]
    MalformedCitation(String),
}

/// Validates and normalizes one citation into a record.
#[derive(Debug, Clone, Copy)]
pub struct CitationRecordBuilder {
    years: YearExtractor,
}

impl CitationRecordBuilder {
    pub fn new(years: YearExtractor) -> Self {
        CitationRecordBuilder { years }
    }

    pub fn build(
        &self,
        raw: &str,
        category: Category,
        year: Option<i32>,
        language: Language,
        owner: &FacultyIdentity,
    ) -> Result<CitationRecord, Rejection> {
        let text = normalize(raw);
        if !text.chars().any(char::is_alphanumeric) {
            return Err(Rejection::MalformedCitation(raw.to_string()));
        }

        Ok(CitationRecord {
            category,
            year: year.filter(|y| self.years.contains(*y)),
            language,
            doi: extract_doi(&text),
            text,
            owner: owner.clone(),
        })
    }
}

/// Trim, collapse whitespace runs, strip list bullets/numbering in front and
/// stray separators at the end. Words and sentence punctuation are untouched.
pub fn normalize(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let head = LEADING_ARTIFACT_RE.replace(&collapsed, "");
    TRAILING_ARTIFACT_RE.replace(&head, "").into_owned()
}

pub fn extract_doi(text: &str) -> Option<String> {
    DOI_RE
        .captures(text)
        .map(|c| c[1].trim_end_matches(['.', ',', ';']).to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YearBounds;

    fn builder() -> CitationRecordBuilder {
        CitationRecordBuilder::new(YearExtractor::new(YearBounds { min: 1950, max: 2030 }).unwrap())
    }

    fn owner() -> FacultyIdentity {
        FacultyIdentity {
            url: "https://example.edu/content/jane".into(),
            name: Some("Jane Doe".into()),
            email: None,
        }
    }

    #[test]
    fn reference_citation_survives_verbatim() {
        let raw = "Smith, J. (2019). Title. Venue.";
        let r = builder()
            .build(raw, Category::InternationalArticles, Some(2019), Language::En, &owner())
            .unwrap();
        assert_eq!(r.year, Some(2019));
        assert_eq!(r.category, Category::InternationalArticles);
        assert_eq!(r.language, Language::En);
        assert_eq!(r.text, raw);
        assert!(r.text.contains("Smith, J."));
        assert!(r.text.contains("Title."));
        assert!(r.text.contains("Venue."));
    }

    #[test]
    fn whitespace_only_rejected() {
        let err = builder()
            .build(" \n\t ", Category::NationalArticles, None, Language::En, &owner())
            .unwrap_err();
        assert_eq!(err, Rejection::MalformedCitation(" \n\t ".into()));
    }

    #[test]
    fn bullets_only_rejected() {
        assert!(builder()
            .build("• • –", Category::NationalArticles, None, Language::En, &owner())
            .is_err());
    }

    #[test]
    fn whitespace_collapsed() {
        assert_eq!(normalize("  Doe,\n   J.\t(2001).   A  study. "), "Doe, J. (2001). A study.");
    }

    #[test]
    fn bullets_and_numbering_stripped() {
        assert_eq!(normalize("• Doe, J. (2001). A study."), "Doe, J. (2001). A study.");
        assert_eq!(normalize("12. Doe, J. (2001). A study. ;"), "Doe, J. (2001). A study.");
        assert_eq!(normalize("- Doe, J. (2001). A study. |"), "Doe, J. (2001). A study.");
    }

    #[test]
    fn year_prefix_is_not_numbering() {
        assert_eq!(normalize("2019. Annual report."), "2019. Annual report.");
    }

    #[test]
    fn out_of_range_year_becomes_unknown() {
        let r = builder()
            .build(
                "Proceedings (1899)",
                Category::NationalConferencePapers,
                Some(1899),
                Language::En,
                &owner(),
            )
            .unwrap();
        assert_eq!(r.year, None);
    }

    #[test]
    fn doi_detected() {
        let r = builder()
            .build(
                "Doe, J. (2020). X. Journal, 1, 1-2. https://doi.org/10.1016/J.EJOR.2020.01.001.",
                Category::InternationalArticles,
                Some(2020),
                Language::En,
                &owner(),
            )
            .unwrap();
        assert_eq!(r.doi.as_deref(), Some("10.1016/j.ejor.2020.01.001"));
    }

    #[test]
    fn owner_attached() {
        let r = builder()
            .build("Doe (2001) X", Category::NationalBooks, Some(2001), Language::Tr, &owner())
            .unwrap();
        assert_eq!(r.owner, owner());
    }
}
